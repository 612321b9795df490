//! 正规方程.

use nalgebra::{Matrix3, Vector3};
use ndarray::ArrayView1;

use super::{solve3, Design};
use crate::consts::NUM_COEFFS;
use crate::FitResult;

/// 3 系数加权正规方程 `A b = rhs`, 其中 `A = XᵗWX`, `rhs = XᵗWy`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NormalEquations {
    a: Matrix3<f64>,
    rhs: Vector3<f64>,
}

impl NormalEquations {
    /// 由设计矩阵的三列 `x`, 观测值 `y` 与对角权重 `w` 构建.
    pub fn new(x: &Design, y: ArrayView1<f64>, w: ArrayView1<f64>) -> Self {
        debug_assert!(x.iter().all(|c| c.len() == y.len()));
        debug_assert_eq!(y.len(), w.len());

        let mut a = Matrix3::zeros();
        let mut rhs = Vector3::zeros();
        for i in 0..NUM_COEFFS {
            for j in i..NUM_COEFFS {
                let v: f64 = (0..w.len()).map(|k| x[i][k] * w[k] * x[j][k]).sum();
                a[(i, j)] = v;
                a[(j, i)] = v;
            }
            rhs[i] = (0..w.len()).map(|k| x[i][k] * w[k] * y[k]).sum();
        }
        Self { a, rhs }
    }

    /// 加入岭回归惩罚项: `A += diag(h)`, `rhs += diag(h) · prior`.
    ///
    /// 为 0 的惩罚分量不会改动方程.
    pub fn add_penalty(&mut self, h: &[f64; NUM_COEFFS], prior: &[f64; NUM_COEFFS]) {
        for (i, (h, p)) in h.iter().zip(prior.iter()).enumerate() {
            if *h != 0.0 {
                self.a[(i, i)] += h;
                self.rhs[i] += h * p;
            }
        }
    }

    /// 系数矩阵 `A`.
    #[inline]
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.a
    }

    /// 右端项.
    #[inline]
    pub fn rhs(&self) -> &Vector3<f64> {
        &self.rhs
    }

    /// 求解方程.
    ///
    /// # 返回值
    ///
    /// - 方程中存在非有限值, 或解不是有限值时, 返回 `Err(NumericalError::NonFinite)`;
    /// - Jacobi 缩放后的倒数条件数低于 [`RCOND_THRESHOLD`](crate::consts::RCOND_THRESHOLD)
    ///   时, 返回 `Err(NumericalError::Singular)`.
    #[inline]
    pub fn solve(&self) -> FitResult<[f64; NUM_COEFFS]> {
        solve3(self.a, self.rhs)
    }
}
