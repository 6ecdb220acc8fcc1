//! Small dense 3x3 kernels: singular value decomposition, polar
//! decomposition, Frobenius products, and cofactor algebra.
//!
//! The SVD is a one-sided Jacobi iteration. It needs no QR preconditioning
//! at this size, produces full U and V, and keeps all singular values
//! non-negative, which is exactly what the deformation clamp and the polar
//! rotation need.

use glam::{DMat3, DVec3};

/// Full singular value decomposition `m = u * diag(sigma) * v^T`.
pub struct Svd3 {
    /// Left singular vectors, orthogonal.
    pub u: DMat3,
    /// Singular values, non-negative, sorted descending.
    pub sigma: DVec3,
    /// Right singular vectors, orthogonal.
    pub v: DMat3,
}

const JACOBI_EPS: f64 = 1e-14;
const MAX_SWEEPS: usize = 60;

#[inline]
fn col(m: &DMat3, i: usize) -> DVec3 {
    match i {
        0 => m.x_axis,
        1 => m.y_axis,
        _ => m.z_axis,
    }
}

#[inline]
fn set_col(m: &mut DMat3, i: usize, value: DVec3) {
    match i {
        0 => m.x_axis = value,
        1 => m.y_axis = value,
        _ => m.z_axis = value,
    }
}

/// Applies the plane rotation `(c, s)` to columns `p` and `q` from the right.
#[inline]
fn rotate_cols(m: &mut DMat3, p: usize, q: usize, c: f64, s: f64) {
    let mp = col(m, p);
    let mq = col(m, q);
    set_col(m, p, mp * c - mq * s);
    set_col(m, q, mp * s + mq * c);
}

#[inline]
fn swap_cols(m: &mut DMat3, p: usize, q: usize) {
    let mp = col(m, p);
    let mq = col(m, q);
    set_col(m, p, mq);
    set_col(m, q, mp);
}

/// One-sided Jacobi SVD of a 3x3 matrix.
///
/// Iterates plane rotations that orthogonalize the columns of `w = m * v`;
/// at convergence the column norms of `w` are the singular values and the
/// normalized columns are `u`. Rank-deficient columns of `u` are completed
/// with cross products so `u` stays orthogonal.
pub fn svd3(m: &DMat3) -> Svd3 {
    let mut w = *m;
    let mut v = DMat3::IDENTITY;

    for _ in 0..MAX_SWEEPS {
        let mut rotated = false;
        for (p, q) in [(0usize, 1usize), (0, 2), (1, 2)] {
            let wp = col(&w, p);
            let wq = col(&w, q);
            let dot_pq = wp.dot(wq);
            let norm_p = wp.length_squared();
            let norm_q = wq.length_squared();
            if dot_pq.abs() <= JACOBI_EPS * (norm_p * norm_q).sqrt() {
                continue;
            }
            rotated = true;
            let tau = (norm_q - norm_p) / (2.0 * dot_pq);
            let t = tau.signum() / (tau.abs() + (1.0 + tau * tau).sqrt());
            let c = 1.0 / (1.0 + t * t).sqrt();
            let s = c * t;
            rotate_cols(&mut w, p, q, c, s);
            rotate_cols(&mut v, p, q, c, s);
        }
        if !rotated {
            break;
        }
    }

    let mut sigma = DVec3::new(
        col(&w, 0).length(),
        col(&w, 1).length(),
        col(&w, 2).length(),
    );

    // Sort singular values descending, carrying the U and V columns along.
    let mut order = [0usize, 1, 2];
    for i in 0..2 {
        for j in (i + 1)..3 {
            if sigma[order[j]] > sigma[order[i]] {
                order.swap(i, j);
            }
        }
    }
    if order != [0, 1, 2] {
        let permuted = DVec3::new(sigma[order[0]], sigma[order[1]], sigma[order[2]]);
        let mut wp = DMat3::ZERO;
        let mut vp = DMat3::ZERO;
        for (dst, src) in order.iter().enumerate() {
            set_col(&mut wp, dst, col(&w, *src));
            set_col(&mut vp, dst, col(&v, *src));
        }
        sigma = permuted;
        w = wp;
        v = vp;
    }

    let tiny = f64::EPSILON * sigma.x.max(1.0);
    let mut u = DMat3::ZERO;
    if sigma.x > tiny {
        set_col(&mut u, 0, col(&w, 0) / sigma.x);
    } else {
        set_col(&mut u, 0, DVec3::X);
    }
    if sigma.y > tiny {
        set_col(&mut u, 1, col(&w, 1) / sigma.y);
    } else {
        // Any unit vector orthogonal to the leading column.
        let u0 = col(&u, 0);
        let pick = if u0.x.abs() < 0.9 { DVec3::X } else { DVec3::Y };
        set_col(&mut u, 1, u0.cross(pick).normalize());
    }
    if sigma.z > tiny {
        set_col(&mut u, 2, col(&w, 2) / sigma.z);
    } else {
        let completed = col(&u, 0).cross(col(&u, 1));
        set_col(&mut u, 2, completed.normalize());
    }

    Svd3 { u, sigma, v }
}

/// Rotation factor of the polar decomposition, `u * v^T`.
pub fn polar_rot(m: &DMat3) -> DMat3 {
    let svd = svd3(m);
    svd.u * svd.v.transpose()
}

/// Polar decomposition `m = r * s` with `r` orthogonal and `s` symmetric.
pub fn polar_decompose(m: &DMat3) -> (DMat3, DMat3) {
    let svd = svd3(m);
    let r = svd.u * svd.v.transpose();
    let s = svd.v * DMat3::from_diagonal(svd.sigma) * svd.v.transpose();
    (r, s)
}

/// Frobenius inner product of two matrices.
pub fn ddot(a: &DMat3, b: &DMat3) -> f64 {
    a.x_axis.dot(b.x_axis) + a.y_axis.dot(b.y_axis) + a.z_axis.dot(b.z_axis)
}

/// Outer product `a b^T`.
#[inline]
pub fn outer(a: DVec3, b: DVec3) -> DMat3 {
    DMat3::from_cols(a * b.x, a * b.y, a * b.z)
}

/// Cofactor matrix, `det(f) * f^-T`, written out from the 2x2 minors so it
/// stays well defined for singular `f`.
pub fn cofactor(f: &DMat3) -> DMat3 {
    let e = |r: usize, c: usize| col(f, c)[r];
    DMat3::from_cols(
        DVec3::new(
            e(1, 1) * e(2, 2) - e(1, 2) * e(2, 1),
            e(0, 2) * e(2, 1) - e(0, 1) * e(2, 2),
            e(0, 1) * e(1, 2) - e(0, 2) * e(1, 1),
        ),
        DVec3::new(
            e(1, 2) * e(2, 0) - e(1, 0) * e(2, 2),
            e(0, 0) * e(2, 2) - e(0, 2) * e(2, 0),
            e(0, 2) * e(1, 0) - e(0, 0) * e(1, 2),
        ),
        DVec3::new(
            e(1, 0) * e(2, 1) - e(1, 1) * e(2, 0),
            e(0, 1) * e(2, 0) - e(0, 0) * e(2, 1),
            e(0, 0) * e(1, 1) - e(0, 1) * e(1, 0),
        ),
    )
}

/// Directional derivative of the cofactor matrix along `df`, obtained by
/// product-ruling each 2x2 minor.
pub fn cofactor_differential(f: &DMat3, df: &DMat3) -> DMat3 {
    let e = |r: usize, c: usize| col(f, c)[r];
    let d = |r: usize, c: usize| col(df, c)[r];
    // d(f[a] * f[b]) for minor entries.
    let pd = |ar: usize, ac: usize, br: usize, bc: usize| {
        d(ar, ac) * e(br, bc) + e(ar, ac) * d(br, bc)
    };
    DMat3::from_cols(
        DVec3::new(
            pd(1, 1, 2, 2) - pd(1, 2, 2, 1),
            pd(0, 2, 2, 1) - pd(0, 1, 2, 2),
            pd(0, 1, 1, 2) - pd(0, 2, 1, 1),
        ),
        DVec3::new(
            pd(1, 2, 2, 0) - pd(1, 0, 2, 2),
            pd(0, 0, 2, 2) - pd(0, 2, 2, 0),
            pd(0, 2, 1, 0) - pd(0, 0, 1, 2),
        ),
        DVec3::new(
            pd(1, 0, 2, 1) - pd(1, 1, 2, 0),
            pd(0, 1, 2, 0) - pd(0, 0, 2, 1),
            pd(0, 0, 1, 1) - pd(0, 1, 1, 0),
        ),
    )
}

/// True when every matrix entry is finite.
pub fn mat_is_finite(m: &DMat3) -> bool {
    m.x_axis.is_finite() && m.y_axis.is_finite() && m.z_axis.is_finite()
}
