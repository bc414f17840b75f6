//! Per-cell element matrix kernels and the small geometric primitives they
//! are built from.
//!
//! A kernel is a pure function of the cell's corner coordinates, returning a
//! stack-allocated dense matrix. The assemblers accept any [`ElementKernel`]
//! implementation, including closures via [`FnKernel`], so the PDE being
//! discretized is injected rather than baked into the assembly loop.

use crate::error::AssemblyError;
use crate::mesh::{Connectivity, Mesh};
use eyre::eyre;
use nalgebra::{Point3, SMatrix, Vector2};

/// Computes the local stiffness contribution of one cell with `N` nodes.
pub trait ElementKernel<const N: usize>: Sync {
    fn element_matrix(&self, corners: &[Point3<f64>; N]) -> eyre::Result<SMatrix<f64, N, N>>;
}

/// Lifts any callable with the kernel signature into an [`ElementKernel`],
/// so a PDE can be injected without defining a new type.
#[derive(Debug, Clone, Copy)]
pub struct FnKernel<F>(pub F);

impl<F, const N: usize> ElementKernel<N> for FnKernel<F>
where
    F: Fn(&[Point3<f64>; N]) -> eyre::Result<SMatrix<f64, N, N>> + Sync,
{
    fn element_matrix(&self, corners: &[Point3<f64>; N]) -> eyre::Result<SMatrix<f64, N, N>> {
        (self.0)(corners)
    }
}

/// The Laplace stiffness kernel for linear triangles.
///
/// Builds the 2x3 gradient matrix from the rotated edge vectors and returns
/// `B^T B * area`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LaplaceTri3;

impl ElementKernel<3> for LaplaceTri3 {
    fn element_matrix(&self, corners: &[Point3<f64>; 3]) -> eyre::Result<SMatrix<f64, 3, 3>> {
        let [m0, m1, m2] = corners;
        let area = triangle_area(m0, m1, m2);
        if area == 0.0 {
            return Err(eyre!("Degenerate triangle with zero area encountered"));
        }

        let d_phi = [
            Vector2::new(m1.y - m2.y, m2.x - m1.x),
            Vector2::new(m2.y - m0.y, m0.x - m2.x),
            Vector2::new(m0.y - m1.y, m1.x - m0.x),
        ];

        let mut b_matrix = SMatrix::<f64, 2, 3>::zeros();
        for (j, grad) in d_phi.iter().enumerate() {
            b_matrix.set_column(j, &(grad / (2.0 * area)));
        }

        Ok(b_matrix.transpose() * b_matrix * area)
    }
}

/// The Laplace stiffness kernel for linear tetrahedra.
///
/// Physical shape function gradients are obtained by mapping the reference
/// gradients through the inverse transpose of the cell Jacobian.
#[derive(Debug, Clone, Copy, Default)]
pub struct LaplaceTet4;

impl ElementKernel<4> for LaplaceTet4 {
    fn element_matrix(&self, corners: &[Point3<f64>; 4]) -> eyre::Result<SMatrix<f64, 4, 4>> {
        let [m0, m1, m2, m3] = corners;
        let jacobian = SMatrix::<f64, 3, 3>::from_columns(&[m1 - m0, m2 - m0, m3 - m0]);
        let volume = jacobian.determinant() / 6.0;
        let j_inv_t = jacobian
            .try_inverse()
            .ok_or_else(|| eyre!("Singular element Jacobian encountered"))?
            .transpose();

        let ref_grads = SMatrix::<f64, 3, 4>::from_columns(&[
            nalgebra::Vector3::new(-1.0, -1.0, -1.0),
            nalgebra::Vector3::new(1.0, 0.0, 0.0),
            nalgebra::Vector3::new(0.0, 1.0, 0.0),
            nalgebra::Vector3::new(0.0, 0.0, 1.0),
        ]);
        let grads = j_inv_t * ref_grads;

        Ok(grads.transpose() * grads * volume)
    }
}

/// Signed area of the triangle `(m0, m1, m2)` in the xy-plane.
pub fn triangle_area(m0: &Point3<f64>, m1: &Point3<f64>, m2: &Point3<f64>) -> f64 {
    0.5 * ((m1.x - m0.x) * (m2.y - m0.y) - (m2.x - m0.x) * (m1.y - m0.y))
}

/// Signed volume of the tetrahedron `(m0, m1, m2, m3)`.
pub fn tetrahedron_volume(
    m0: &Point3<f64>,
    m1: &Point3<f64>,
    m2: &Point3<f64>,
    m3: &Point3<f64>,
) -> f64 {
    (m1 - m0).cross(&(m2 - m0)).dot(&(m3 - m0)) / 6.0
}

/// Length of the edge `(m0, m1)` in the xy-plane.
pub fn edge_length(m0: &Point3<f64>, m1: &Point3<f64>) -> f64 {
    ((m1.x - m0.x) * (m1.x - m0.x) + (m1.y - m0.y) * (m1.y - m0.y)).sqrt()
}

/// Unit normal of the directed boundary edge `(m0, m1)`.
///
/// For counter-clockwise cell winding the boundary edges inherit an
/// orientation that makes this the outward normal.
pub fn edge_outward_normal(m0: &Point3<f64>, m1: &Point3<f64>) -> Vector2<f64> {
    let norm = edge_length(m0, m1);
    Vector2::new((m1.y - m0.y) / norm, (m0.x - m1.x) / norm)
}

/// Unsigned area of a triangle in 3D space.
pub fn triangle_area_3d(m0: &Point3<f64>, m1: &Point3<f64>, m2: &Point3<f64>) -> f64 {
    0.5 * (m1 - m0).cross(&(m2 - m0)).norm()
}

/// Measure (area or volume) of a cell, by element kind.
pub fn cell_measure<C: Connectivity>(mesh: &Mesh<C>, cell: &C) -> f64 {
    let indices = cell.vertex_indices();
    let vertex = |i: usize| &mesh.vertices()[indices[i]];
    match indices.len() {
        3 => triangle_area(vertex(0), vertex(1), vertex(2)),
        4 => tetrahedron_volume(vertex(0), vertex(1), vertex(2), vertex(3)),
        n => panic!("no measure defined for cells with {} nodes", n),
    }
}

/// Measure of a boundary face: edge length in 2D, triangle area in 3D.
pub fn face_measure(vertices: &[Point3<f64>], face_nodes: &[usize]) -> f64 {
    match face_nodes {
        [a, b] => edge_length(&vertices[*a], &vertices[*b]),
        [a, b, c] => triangle_area_3d(&vertices[*a], &vertices[*b], &vertices[*c]),
        _ => panic!("no measure defined for faces with {} nodes", face_nodes.len()),
    }
}

/// Gathers the corner coordinates of a cell, checking that the cell actually
/// has `N` nodes. A mismatch means an element kernel was paired with the
/// wrong mesh and is fatal.
pub fn cell_corners<C: Connectivity, const N: usize>(
    mesh: &Mesh<C>,
    cell: &C,
) -> Result<[Point3<f64>; N], AssemblyError> {
    let indices = cell.vertex_indices();
    if indices.len() != N {
        return Err(AssemblyError::UnsupportedCellType {
            expected: N,
            found: indices.len(),
        });
    }
    Ok(std::array::from_fn(|i| mesh.vertices()[indices[i]]))
}
