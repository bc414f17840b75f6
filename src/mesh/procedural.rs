//! Procedurally generated meshes, mainly for tests and examples.

use super::{Mesh, Tet4Connectivity, TetMesh, Tri3Connectivity, TriangleMesh};
use nalgebra::Point3;

/// Two counter-clockwise triangles sharing the edge (1, 2):
///
/// ```text
/// 2 ---- 3
/// | \    |
/// |   \  |
/// 0 ---- 1
/// ```
pub fn two_triangle_strip() -> TriangleMesh {
    let vertices = vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
        Point3::new(1.0, 1.0, 0.0),
    ];
    let connectivity = vec![
        Tri3Connectivity([0, 1, 2]),
        Tri3Connectivity([1, 3, 2]),
    ];
    Mesh::from_vertices_and_connectivity(vertices, connectivity)
}

/// A triangulation of the unit square with `nx` by `ny` quads, each split
/// along its diagonal into two counter-clockwise triangles.
pub fn unit_square_triangles(nx: usize, ny: usize) -> TriangleMesh {
    assert!(nx > 0 && ny > 0);
    let node = |i: usize, j: usize| j * (nx + 1) + i;
    let mut vertices = Vec::with_capacity((nx + 1) * (ny + 1));
    for j in 0..=ny {
        for i in 0..=nx {
            vertices.push(Point3::new(
                i as f64 / nx as f64,
                j as f64 / ny as f64,
                0.0,
            ));
        }
    }
    let mut connectivity = Vec::with_capacity(2 * nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            let (n00, n10) = (node(i, j), node(i + 1, j));
            let (n01, n11) = (node(i, j + 1), node(i + 1, j + 1));
            connectivity.push(Tri3Connectivity([n00, n10, n11]));
            connectivity.push(Tri3Connectivity([n00, n11, n01]));
        }
    }
    Mesh::from_vertices_and_connectivity(vertices, connectivity)
}

/// The unit cube split into six positively oriented tetrahedra sharing the
/// main diagonal (Kuhn decomposition).
pub fn unit_cube_tetrahedra() -> TetMesh {
    // Node index encodes coordinates bitwise: node = x + 2y + 4z.
    let vertices: Vec<Point3<f64>> = (0..8)
        .map(|i| {
            Point3::new(
                (i & 1) as f64,
                ((i >> 1) & 1) as f64,
                ((i >> 2) & 1) as f64,
            )
        })
        .collect();
    // Each tet walks from node 0 to node 7 along one axis permutation.
    let paths = [
        [1, 3, 7],
        [1, 5, 7],
        [2, 3, 7],
        [2, 6, 7],
        [4, 5, 7],
        [4, 6, 7],
    ];
    let connectivity: Vec<Tet4Connectivity> = paths
        .iter()
        .map(|&[a, b, c]| orient_positive(Tet4Connectivity([0, a, b, c]), &vertices))
        .collect();
    Mesh::from_vertices_and_connectivity(vertices, connectivity)
}

fn orient_positive(tet: Tet4Connectivity, vertices: &[Point3<f64>]) -> Tet4Connectivity {
    let [a, b, c, d] = tet.0;
    let e1 = vertices[b] - vertices[a];
    let e2 = vertices[c] - vertices[a];
    let e3 = vertices[d] - vertices[a];
    if e1.cross(&e2).dot(&e3) < 0.0 {
        Tet4Connectivity([a, c, b, d])
    } else {
        tet
    }
}
