//! 3 系数加权最小二乘 (及岭回归) 求解核.
//!
//! 给定设计矩阵的三列 `X = [x0, x1, x2]`, 观测值 `y` 与对角权重 `W`,
//! 求解正规方程 `(XᵗWX + diag(h)) b = XᵗWy + diag(h) · prior`.
//! `h` 全为 0 时即普通的加权最小二乘.
//!
//! 求解使用带部分主元的 LU 分解, 不做显式求逆. 求解前会对经过 Jacobi
//! 缩放的系数矩阵做条件数检查.

use nalgebra::{Matrix3, Vector3};
use ndarray::ArrayView1;

use crate::consts::{NUM_COEFFS, RCOND_THRESHOLD};
use crate::{FitResult, NumericalError};

mod normal;

pub use normal::NormalEquations;

/// 单个体素的回归结果.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Fit {
    /// 回归系数 `b`.
    pub coef: [f64; NUM_COEFFS],

    /// 残差方差 `rᵗWr / (T - 3)`.
    pub var: f64,
}

/// 设计矩阵的三列.
pub type Design<'a> = [ArrayView1<'a, f64>; NUM_COEFFS];

/// 加权最小二乘: 求解 `(XᵗWX) b = XᵗWy`, 并计算残差方差.
///
/// 调用者需保证 `x` 的每一列, `y` 与 `w` 长度相同且大于 3.
pub fn wls(x: &Design, y: ArrayView1<f64>, w: ArrayView1<f64>) -> FitResult<Fit> {
    let coef = NormalEquations::new(x, y, w).solve()?;
    let var = residual_variance(x, y, w, &coef);
    Ok(Fit { coef, var })
}

/// 岭回归: 求解 `(XᵗWX + diag(h)) b = XᵗWy + diag(h) · prior`.
///
/// `h` 全为 0 时, 结果与 [`wls`] 的系数逐位相同.
pub fn ridge(
    x: &Design,
    y: ArrayView1<f64>,
    w: ArrayView1<f64>,
    h: &[f64; NUM_COEFFS],
    prior: &[f64; NUM_COEFFS],
) -> FitResult<[f64; NUM_COEFFS]> {
    let mut eq = NormalEquations::new(x, y, w);
    eq.add_penalty(h, prior);
    eq.solve()
}

/// 残差方差 `rᵗWr / (T - 3)`, 其中 `r = y - Xb`.
pub fn residual_variance(
    x: &Design,
    y: ArrayView1<f64>,
    w: ArrayView1<f64>,
    coef: &[f64; NUM_COEFFS],
) -> f64 {
    let dof = (y.len() - NUM_COEFFS) as f64;
    let rss: f64 = (0..y.len())
        .map(|i| {
            let fitted: f64 = (0..NUM_COEFFS).map(|j| x[j][i] * coef[j]).sum();
            let r = y[i] - fitted;
            w[i] * r * r
        })
        .sum();
    rss / dof
}

/// 对称正定 (半定) 矩阵 `a` 经 Jacobi 缩放 `D a D` (`D = diag(1/sqrt(a_ii))`)
/// 之后的倒数条件数 `σ_min / σ_max`.
///
/// 对角线存在非正元素时返回 0.
pub fn scaled_rcond(a: &Matrix3<f64>) -> f64 {
    let d = a.diagonal();
    if d.iter().any(|v| *v <= 0.0) {
        return 0.0;
    }
    let s = d.map(|v| v.sqrt().recip());
    let scaled = Matrix3::from_fn(|i, j| a[(i, j)] * s[i] * s[j]);
    let sv = scaled.singular_values();
    let (min, max) = (sv.min(), sv.max());
    if max > 0.0 {
        min / max
    } else {
        0.0
    }
}

/// 检查条件数, 然后用 LU 分解求解 `a b = rhs`.
fn solve3(a: Matrix3<f64>, rhs: Vector3<f64>) -> FitResult<[f64; NUM_COEFFS]> {
    if a.iter().chain(rhs.iter()).any(|v| !v.is_finite()) {
        return Err(NumericalError::NonFinite);
    }
    let rcond = scaled_rcond(&a);
    if !(rcond >= RCOND_THRESHOLD) {
        return Err(NumericalError::Singular { rcond });
    }
    let b = a.lu().solve(&rhs).ok_or(NumericalError::Singular { rcond })?;
    if b.iter().all(|v| v.is_finite()) {
        Ok([b[0], b[1], b[2]])
    } else {
        Err(NumericalError::NonFinite)
    }
}
