//! Fixed-size linear algebra used by every other part of the renderer.
//!
//! Storage and the arithmetic operators come from nalgebra's const-generic `SVector`/`SMatrix`.
//! The cofactor machinery (minors, cofactors, adjugate, inversion through the adjugate) is
//! implemented here on top of it, so the algebra the rasterizer relies on is explicit.

use nalgebra as na;
use na::{DMatrix, SMatrix, SVector};

use crate::error::{RenderError, Result};

pub type Vec2f = SVector<f32, 2>;
pub type Vec3f = SVector<f32, 3>;
pub type Vec4f = SVector<f32, 4>;
pub type Vec2i = SVector<i32, 2>;
pub type Matrix3f = SMatrix<f32, 3, 3>;
pub type Matrix4f = SMatrix<f32, 4, 4>;

/// Inversion gives up below this absolute determinant.
pub const DEGENERATE_EPSILON: f32 = 1e-6;

/// Cross product, only defined for 3 component vectors.
pub fn cross(a: Vec3f, b: Vec3f) -> Vec3f {
    return Vec3f::new(
        a.y * b.z - a.z * b.y,
        a.z * b.x - a.x * b.z,
        a.x * b.y - a.y * b.x,
    );
}

/// Scales `v` to the given length.
/// A zero vector gives non-finite components, callers have to rule that out.
pub fn normalize_to<const N: usize>(v: SVector<f32, N>, length: f32) -> SVector<f32, N> {
    return v * (length / v.norm());
}

/// Embeds a DIM vector into LEN components, padding the tail with `fill`.
/// With `fill = 1.0` this is a point in homogeneous coordinates, with `0.0` a direction.
pub fn embed<const LEN: usize, const DIM: usize>(v: SVector<f32, DIM>, fill: f32) -> SVector<f32, LEN> {
    return SVector::<f32, LEN>::from_fn(|i, _| if i < DIM { v[i] } else { fill });
}

/// Keeps the first LEN components of a DIM vector.
pub fn proj<const LEN: usize, const DIM: usize>(v: SVector<f32, DIM>) -> SVector<f32, LEN> {
    debug_assert!(LEN <= DIM);
    return SVector::<f32, LEN>::from_fn(|i, _| v[i]);
}

/// Rounds to the nearest integer pixel, halves go up.
pub fn round_to_pixel(v: Vec2f) -> Vec2i {
    return Vec2i::new((v.x + 0.5).floor() as i32, (v.y + 0.5).floor() as i32);
}

fn to_dynamic<const N: usize>(m: &SMatrix<f32, N, N>) -> DMatrix<f32> {
    return DMatrix::from_fn(N, N, |r, c| m[(r, c)]);
}

/// Determinant by recursive expansion along the first row.
fn expand_determinant(m: &DMatrix<f32>) -> f32 {
    let n = m.nrows();
    if n == 0 {
        return 1.0;
    }
    if n == 1 {
        return m[(0, 0)];
    }
    let mut det = 0.0;
    for col in 0..n {
        let entry = m[(0, col)];
        if entry == 0.0 {
            continue;
        }
        let sign = if col % 2 == 0 { 1.0 } else { -1.0 };
        let sub = m.clone().remove_row(0).remove_column(col);
        det += sign * entry * expand_determinant(&sub);
    }
    return det;
}

/// The matrix left after removing `row` and `col`.
/// Dynamically sized since `N - 1` can't be named in a const generic yet.
pub fn minor<const N: usize>(m: &SMatrix<f32, N, N>, row: usize, col: usize) -> DMatrix<f32> {
    return to_dynamic(m).remove_row(row).remove_column(col);
}

pub fn determinant<const N: usize>(m: &SMatrix<f32, N, N>) -> f32 {
    return expand_determinant(&to_dynamic(m));
}

/// Signed determinant of the minor at (`row`, `col`).
pub fn cofactor<const N: usize>(m: &SMatrix<f32, N, N>, row: usize, col: usize) -> f32 {
    let sign = if (row + col) % 2 == 0 { 1.0 } else { -1.0 };
    return sign * expand_determinant(&minor(m, row, col));
}

/// Matrix whose (i, j) entry is the (i, j) cofactor.
pub fn cofactor_matrix<const N: usize>(m: &SMatrix<f32, N, N>) -> SMatrix<f32, N, N> {
    return SMatrix::<f32, N, N>::from_fn(|r, c| cofactor(m, r, c));
}

/// Classical adjugate, the transposed cofactor matrix. `m * adjugate(m) = det(m) * I`.
pub fn adjugate<const N: usize>(m: &SMatrix<f32, N, N>) -> SMatrix<f32, N, N> {
    return cofactor_matrix(m).transpose();
}

fn checked_determinant<const N: usize>(m: &SMatrix<f32, N, N>) -> Result<f32> {
    let det = determinant(m);
    if !det.is_finite() || det.abs() < DEGENERATE_EPSILON {
        return Err(RenderError::DegenerateTransform { determinant: det });
    }
    return Ok(det);
}

pub fn invert<const N: usize>(m: &SMatrix<f32, N, N>) -> Result<SMatrix<f32, N, N>> {
    let det = checked_determinant(m)?;
    return Ok(adjugate(m) / det);
}

/// Inverse-transpose, `(m^-1)^T`, which is the cofactor matrix over the determinant.
/// This is the matrix normals go through when positions go through `m`.
pub fn invert_transpose<const N: usize>(m: &SMatrix<f32, N, N>) -> Result<SMatrix<f32, N, N>> {
    let det = checked_determinant(m)?;
    return Ok(cofactor_matrix(m) / det);
}
