//! 单个体素的 SRTM 线性回归.
//!
//! 两种回归共用同一组曲线:
//!
//! - DVR 回归: `X = [intCref, Cref, -Ct]`, `y = intCt`, 系数为 `[DVR, R1/k2a, 1/k2a]`;
//! - R1 回归: `X = [Cref, intCref, -intCt]`, `y = Ct`, 系数为 `[R1, k2, k2a]`.
//!
//! 权重为各帧持续时间.

use ndarray::{s, ArrayView1, ArrayView4};

use crate::consts::NUM_COEFFS;
use crate::fitting::{self, Fit};
use crate::reference::ReferenceCurve;
use crate::{FitResult, Idx3d, NumericalError};

/// 回归种类.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Regression {
    /// 以 `intCt` 为因变量, 估计 DVR.
    Dvr,

    /// 以 `Ct` 为因变量, 估计 R1.
    R1,
}

/// 回归所需的全部只读数据.
#[derive(Clone, Debug)]
pub(crate) struct Kinetics<'a> {
    cref: ArrayView1<'a, f64>,
    int_cref: ArrayView1<'a, f64>,
    w: ArrayView1<'a, f64>,
    measured: ArrayView4<'a, f64>,
    ct: ArrayView4<'a, f64>,
    int_ct: ArrayView4<'a, f64>,
}

impl<'a> Kinetics<'a> {
    /// `ct` 与 `int_ct` 的最后一维为帧, 长度与 `reference` 及权重 `w` 相同.
    pub fn new(
        reference: &'a ReferenceCurve,
        w: ArrayView1<'a, f64>,
        ct: ArrayView4<'a, f64>,
        int_ct: ArrayView4<'a, f64>,
    ) -> Self {
        debug_assert_eq!(reference.len(), w.len());
        debug_assert_eq!(ct.dim(), int_ct.dim());
        debug_assert_eq!(ct.dim().3, w.len());
        Self {
            cref: reference.values(),
            int_cref: reference.integral(),
            w,
            measured: ct,
            ct,
            int_ct,
        }
    }

    /// 设置未经平滑的测量数据 `measured`, 形状与 `ct` 相同.
    ///
    /// 回归使用 `ct`, 但常数 TAC 的判定同时作用于两者:
    /// 测量 TAC 为常数的体素即使平滑后不再是常数, 也不会参与估计.
    pub fn with_measured(mut self, measured: ArrayView4<'a, f64>) -> Self {
        debug_assert_eq!(measured.dim(), self.ct.dim());
        self.measured = measured;
        self
    }

    /// 体素 `pos` 的 `(Ct, intCt)`. 测量 TAC 或回归用 TAC 在所有帧上为常数时返回 `Err`.
    fn curves(&self, (x, y, z): Idx3d) -> FitResult<(ArrayView1<'a, f64>, ArrayView1<'a, f64>)> {
        let measured = self.measured.slice_move(s![x, y, z, ..]);
        let ct = self.ct.slice_move(s![x, y, z, ..]);
        let int_ct = self.int_ct.slice_move(s![x, y, z, ..]);
        if is_constant(measured) || is_constant(ct) {
            return Err(NumericalError::DegenerateCurve);
        }
        Ok((ct, int_ct))
    }

    /// 在体素 `pos` 上组装 `reg` 的设计矩阵与因变量, 交给 `solve` 求解.
    fn with_design<T, F>(&self, reg: Regression, pos: Idx3d, solve: F) -> FitResult<T>
    where
        F: FnOnce(&fitting::Design<'_>, ArrayView1<f64>) -> FitResult<T>,
    {
        let (ct, int_ct) = self.curves(pos)?;
        match reg {
            Regression::Dvr => {
                let neg = ct.mapv(|v| -v);
                solve(&[self.int_cref.view(), self.cref.view(), neg.view()], int_ct.view())
            }
            Regression::R1 => {
                let neg = int_ct.mapv(|v| -v);
                solve(&[self.cref.view(), self.int_cref.view(), neg.view()], ct.view())
            }
        }
    }

    /// 加权最小二乘.
    pub fn fit(&self, reg: Regression, pos: Idx3d) -> FitResult<Fit> {
        self.with_design(reg, pos, |x, y| {
            let fit = fitting::wls(x, y, self.w)?;
            if fit.var.is_finite() {
                Ok(fit)
            } else {
                Err(NumericalError::NonFinite)
            }
        })
    }

    /// 以 `h` 为惩罚, 向 `prior` 收缩的岭回归.
    pub fn fit_ridge(
        &self,
        reg: Regression,
        pos: Idx3d,
        h: &[f64; NUM_COEFFS],
        prior: &[f64; NUM_COEFFS],
    ) -> FitResult<[f64; NUM_COEFFS]> {
        self.with_design(reg, pos, |x, y| fitting::ridge(x, y, self.w, h, prior))
    }
}

fn is_constant(tac: ArrayView1<f64>) -> bool {
    let first = tac[0];
    tac.iter().all(|v| *v == first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrate;
    use crate::srtm::synthetic::{self, SrtmParams};
    use approx::assert_relative_eq;
    use ndarray::{s, Array4, Axis};

    #[test]
    fn test_fit_recovers_params() {
        let schedule = synthetic::scenario_schedule().unwrap();
        let t = schedule.mid_times();
        let w = schedule.durations();
        let reference = ReferenceCurve::new(synthetic::scenario_reference(), t.view()).unwrap();
        let p = SrtmParams::new(0.8, 1.6, 0.3);
        let tac = synthetic::tissue_curve(&p, reference.values(), t.view()).unwrap();

        let n = tac.len();
        let ct = tac.into_shape((1, 1, 1, n)).unwrap();
        let int_ct = integrate::integrate_frames(ct.view(), t.view()).unwrap();
        let kin = Kinetics::new(&reference, w.view(), ct.view(), int_ct.view());

        let r1 = kin.fit(Regression::R1, (0, 0, 0)).unwrap();
        assert_relative_eq!(r1.coef[0], p.r1, max_relative = 1e-8);
        assert_relative_eq!(r1.coef[1], p.k2, max_relative = 1e-8);
        assert_relative_eq!(r1.coef[2], p.k2a(), max_relative = 1e-8);

        let dvr = kin.fit(Regression::Dvr, (0, 0, 0)).unwrap();
        assert_relative_eq!(dvr.coef[0], p.dvr, max_relative = 1e-8);
        assert_relative_eq!(dvr.coef[1], p.r1 / p.k2a(), max_relative = 1e-8);
        assert_relative_eq!(dvr.coef[2], 1.0 / p.k2a(), max_relative = 1e-8);
    }

    #[test]
    fn test_constant_and_reference_like_curves() {
        let schedule = synthetic::scenario_schedule().unwrap();
        let t = schedule.mid_times();
        let w = schedule.durations();
        let cref = synthetic::scenario_reference();
        let reference = ReferenceCurve::new(cref.clone(), t.view()).unwrap();

        let mut ct = Array4::from_elem((2, 1, 1, cref.len()), 50.0);
        ct.index_axis_mut(Axis(0), 1).assign(&cref);
        let int_ct = integrate::integrate_frames(ct.view(), t.view()).unwrap();
        let kin = Kinetics::new(&reference, w.view(), ct.view(), int_ct.view());

        assert_eq!(
            kin.fit(Regression::R1, (0, 0, 0)),
            Err(NumericalError::DegenerateCurve)
        );
        assert_eq!(
            kin.fit_ridge(Regression::Dvr, (0, 0, 0), &[1.0; 3], &[1.0; 3]),
            Err(NumericalError::DegenerateCurve)
        );
        // 与参考曲线相同的 TAC 使 `intCref` 与 `-intCt` 共线.
        assert!(matches!(
            kin.fit(Regression::R1, (1, 0, 0)),
            Err(NumericalError::Singular { .. })
        ));
    }

    #[test]
    fn test_constant_measured_curve() {
        let schedule = synthetic::scenario_schedule().unwrap();
        let t = schedule.mid_times();
        let w = schedule.durations();
        let reference = ReferenceCurve::new(synthetic::scenario_reference(), t.view()).unwrap();
        let p = SrtmParams::new(0.8, 1.6, 0.3);
        let tac = synthetic::tissue_curve(&p, reference.values(), t.view()).unwrap();

        let n = tac.len();
        let mut measured = Array4::zeros((2, 1, 1, n));
        measured.index_axis_mut(Axis(0), 0).fill(50.0);
        measured.slice_mut(s![1, 0, 0, ..]).assign(&tac);
        // 回归用的曲线两个体素都正常.
        let mut ct = Array4::zeros((2, 1, 1, n));
        ct.slice_mut(s![0, 0, 0, ..]).assign(&tac);
        ct.slice_mut(s![1, 0, 0, ..]).assign(&tac);
        let int_ct = integrate::integrate_frames(ct.view(), t.view()).unwrap();

        let kin = Kinetics::new(&reference, w.view(), ct.view(), int_ct.view());
        assert!(kin.fit(Regression::R1, (0, 0, 0)).is_ok());

        let kin = kin.with_measured(measured.view());
        assert_eq!(
            kin.fit(Regression::R1, (0, 0, 0)),
            Err(NumericalError::DegenerateCurve)
        );
        assert_eq!(
            kin.fit_ridge(Regression::Dvr, (0, 0, 0), &[0.0; 3], &[0.0; 3]),
            Err(NumericalError::DegenerateCurve)
        );
        let r1 = kin.fit(Regression::R1, (1, 0, 0)).unwrap();
        assert_relative_eq!(r1.coef[0], p.r1, max_relative = 1e-8);
    }
}
