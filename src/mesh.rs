//! The mesh collaborator consumed by the assembly engine.
//!
//! The engine only needs a narrow view of the mesh: cell connectivity,
//! node coordinates, node adjacency, an ownership predicate and the boundary
//! faces. Mesh loading and partitioning happen elsewhere; the types here are
//! the handoff format.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::hash::Hash;

use rustc_hash::FxHashMap;

pub mod procedural;

/// The element kind of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellKind {
    Triangle3,
    Tetra4,
}

impl CellKind {
    pub fn dimension(&self) -> usize {
        match self {
            CellKind::Triangle3 => 2,
            CellKind::Tetra4 => 3,
        }
    }

    pub fn nodes_per_cell(&self) -> usize {
        match self {
            CellKind::Triangle3 => 3,
            CellKind::Tetra4 => 4,
        }
    }
}

/// Cell connectivity: the global node indices of one cell.
pub trait Connectivity: Clone + Send + Sync {
    type Face: FaceConnectivity;

    const KIND: CellKind;

    fn vertex_indices(&self) -> &[usize];

    /// The faces of the cell, oriented so that for a positively oriented
    /// cell each face normal points out of the cell.
    fn faces(&self) -> Vec<Self::Face>;
}

/// Connectivity of a cell face (an edge in 2D, a triangle in 3D).
pub trait FaceConnectivity: Clone + Send + Sync {
    /// Orientation-independent identity, used to match faces shared between
    /// cells.
    type Key: Eq + Hash;

    fn vertex_indices(&self) -> &[usize];

    fn key(&self) -> Self::Key;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tri3Connectivity(pub [usize; 3]);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tet4Connectivity(pub [usize; 4]);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge2Connectivity(pub [usize; 2]);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TriFaceConnectivity(pub [usize; 3]);

impl Connectivity for Tri3Connectivity {
    type Face = Edge2Connectivity;

    const KIND: CellKind = CellKind::Triangle3;

    fn vertex_indices(&self) -> &[usize] {
        &self.0
    }

    fn faces(&self) -> Vec<Edge2Connectivity> {
        let [a, b, c] = self.0;
        vec![
            Edge2Connectivity([a, b]),
            Edge2Connectivity([b, c]),
            Edge2Connectivity([c, a]),
        ]
    }
}

impl Connectivity for Tet4Connectivity {
    type Face = TriFaceConnectivity;

    const KIND: CellKind = CellKind::Tetra4;

    fn vertex_indices(&self) -> &[usize] {
        &self.0
    }

    fn faces(&self) -> Vec<TriFaceConnectivity> {
        let [a, b, c, d] = self.0;
        vec![
            TriFaceConnectivity([b, c, d]),
            TriFaceConnectivity([a, d, c]),
            TriFaceConnectivity([a, b, d]),
            TriFaceConnectivity([a, c, b]),
        ]
    }
}

impl FaceConnectivity for Edge2Connectivity {
    type Key = (usize, usize);

    fn vertex_indices(&self) -> &[usize] {
        &self.0
    }

    fn key(&self) -> (usize, usize) {
        let [a, b] = self.0;
        (a.min(b), a.max(b))
    }
}

impl FaceConnectivity for TriFaceConnectivity {
    type Key = [usize; 3];

    fn vertex_indices(&self) -> &[usize] {
        &self.0
    }

    fn key(&self) -> [usize; 3] {
        let mut sorted = self.0;
        sorted.sort_unstable();
        sorted
    }
}

/// An index-based conforming mesh with per-node ownership.
///
/// Coordinates are stored as 3D points regardless of dimensionality; 2D
/// meshes simply leave `z` at zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mesh<C> {
    vertices: Vec<Point3<f64>>,
    connectivity: Vec<C>,
    owned: Vec<bool>,
}

pub type TriangleMesh = Mesh<Tri3Connectivity>;
pub type TetMesh = Mesh<Tet4Connectivity>;

impl<C: Connectivity> Mesh<C> {
    /// Constructs a mesh where every node is locally owned.
    pub fn from_vertices_and_connectivity(vertices: Vec<Point3<f64>>, connectivity: Vec<C>) -> Self {
        let owned = vec![true; vertices.len()];
        Self {
            vertices,
            connectivity,
            owned,
        }
    }

    pub fn vertices(&self) -> &[Point3<f64>] {
        &self.vertices
    }

    pub fn connectivity(&self) -> &[C] {
        &self.connectivity
    }

    pub fn num_nodes(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_cells(&self) -> usize {
        self.connectivity.len()
    }

    pub fn dimension(&self) -> usize {
        C::KIND.dimension()
    }

    pub fn cell_kind(&self) -> CellKind {
        C::KIND
    }

    /// Whether the node belongs to the local subdomain. Only owners write a
    /// node's matrix row.
    pub fn is_owned(&self, node: usize) -> bool {
        self.owned[node]
    }

    /// Marks nodes as ghosts of a neighboring subdomain.
    pub fn set_unowned_nodes(&mut self, nodes: &[usize]) {
        for &node in nodes {
            self.owned[node] = false;
        }
    }

    /// Node-to-node adjacency: two nodes are adjacent iff they share a cell.
    /// The self-relation is excluded; neighbors appear in first-encounter
    /// order over the cell list, which is deterministic for a given mesh.
    pub fn node_node_adjacency(&self) -> Adjacency {
        let mut neighbors: Vec<Vec<usize>> = vec![Vec::new(); self.num_nodes()];
        for cell in &self.connectivity {
            let indices = cell.vertex_indices();
            for &a in indices {
                for &b in indices {
                    if a != b && !neighbors[a].contains(&b) {
                        neighbors[a].push(b);
                    }
                }
            }
        }
        Adjacency::from_lists(&neighbors)
    }

    /// Node-to-cell adjacency: the cells touching each node, in cell order.
    pub fn node_cell_adjacency(&self) -> Adjacency {
        let mut cells: Vec<Vec<usize>> = vec![Vec::new(); self.num_nodes()];
        for (cell_index, cell) in self.connectivity.iter().enumerate() {
            for &node in cell.vertex_indices() {
                cells[node].push(cell_index);
            }
        }
        Adjacency::from_lists(&cells)
    }

    /// The faces that belong to exactly one cell, in that cell's orientation.
    pub fn boundary_faces(&self) -> Vec<C::Face> {
        let mut counts: FxHashMap<<C::Face as FaceConnectivity>::Key, usize> = FxHashMap::default();
        for cell in &self.connectivity {
            for face in cell.faces() {
                *counts.entry(face.key()).or_insert(0) += 1;
            }
        }
        let mut boundary = Vec::new();
        for cell in &self.connectivity {
            for face in cell.faces() {
                if counts[&face.key()] == 1 {
                    boundary.push(face);
                }
            }
        }
        boundary
    }

    /// Boundary faces whose centroid satisfies the predicate. This is how
    /// named surface groups of the input deck are resolved geometrically.
    pub fn boundary_faces_where(&self, predicate: impl Fn(&Point3<f64>) -> bool) -> Vec<C::Face> {
        self.boundary_faces()
            .into_iter()
            .filter(|face| {
                let indices = face.vertex_indices();
                let mut centroid = Point3::origin();
                for &node in indices {
                    centroid.coords += self.vertices[node].coords;
                }
                centroid.coords /= indices.len() as f64;
                predicate(&centroid)
            })
            .collect()
    }

    /// The distinct nodes of a face group, each listed once.
    pub fn nodes_of_faces(&self, faces: &[C::Face]) -> Vec<usize> {
        let mut nodes = Vec::new();
        for face in faces {
            for &node in face.vertex_indices() {
                if !nodes.contains(&node) {
                    nodes.push(node);
                }
            }
        }
        nodes
    }
}

/// A flattened one-to-many relation between mesh entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adjacency {
    offsets: Vec<usize>,
    indices: Vec<usize>,
}

impl Adjacency {
    fn from_lists(lists: &[Vec<usize>]) -> Self {
        let mut offsets = Vec::with_capacity(lists.len() + 1);
        let mut indices = Vec::new();
        offsets.push(0);
        for list in lists {
            indices.extend_from_slice(list);
            offsets.push(indices.len());
        }
        Self { offsets, indices }
    }

    pub fn num_entities(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn neighbors(&self, entity: usize) -> &[usize] {
        &self.indices[self.offsets[entity]..self.offsets[entity + 1]]
    }

    pub fn count(&self, entity: usize) -> usize {
        self.offsets[entity + 1] - self.offsets[entity]
    }
}
