//! 第二阶段所需的空间先验与岭惩罚权重.
//!
//! 1. 对第一阶段系数图逐通道做高斯平滑, 得到先验 `B_sc`;
//! 2. 逐体素逐系数计算惩罚 `H = m * var / (B - B_sc)^2` (见 [`PenaltyPolicy`]);
//! 3. 再对 `H` 做高斯平滑, 得到 `HH`.

use ndarray::{Array4, ArrayView4};

use super::wlr::{CoefMaps, Stage1};
use super::PenaltyPolicy;
use crate::consts::NUM_COEFFS;
use crate::smooth::smooth_channels;
use crate::Idx3d;

/// 一种回归的空间先验与惩罚权重.
#[derive(Debug, Clone)]
pub struct Priors {
    b_sc: Array4<f64>,
    h: Array4<f64>,
    hh: Array4<f64>,
}

impl Priors {
    /// 由第一阶段结果构建. 只有 `positions` 中成功拟合的体素会得到非零惩罚.
    fn build(maps: &CoefMaps, positions: &[Idx3d], sigma: [f64; 3], policy: &PenaltyPolicy) -> Self {
        let b = maps.coef();
        let var = maps.var();
        let fitted = maps.fitted();

        let b_sc = smooth_channels(b, sigma);
        let mut h = Array4::zeros(b.raw_dim());
        for &(x, y, z) in positions {
            if !fitted[(x, y, z)] {
                continue;
            }
            for c in 0..NUM_COEFFS {
                h[[x, y, z, c]] = policy.penalty(var[(x, y, z)], b[[x, y, z, c]], b_sc[[x, y, z, c]]);
            }
        }
        let hh = smooth_channels(h.view(), sigma);
        Self { b_sc, h, hh }
    }

    /// 平滑后的系数 `B_sc`.
    #[inline]
    pub fn b_sc(&self) -> ArrayView4<'_, f64> {
        self.b_sc.view()
    }

    /// 平滑前的惩罚 `H`.
    #[inline]
    pub fn h(&self) -> ArrayView4<'_, f64> {
        self.h.view()
    }

    /// 平滑后的惩罚 `HH`.
    #[inline]
    pub fn hh(&self) -> ArrayView4<'_, f64> {
        self.hh.view()
    }

    /// 体素 `pos` 处的 `(HH, B_sc)`.
    pub fn at(&self, (x, y, z): Idx3d) -> ([f64; NUM_COEFFS], [f64; NUM_COEFFS]) {
        let hh = std::array::from_fn(|c| self.hh[[x, y, z, c]]);
        let b_sc = std::array::from_fn(|c| self.b_sc[[x, y, z, c]]);
        (hh, b_sc)
    }

    /// 所有惩罚清零. 第二阶段因此退化为第一阶段的加权最小二乘.
    pub fn without_penalty(mut self) -> Self {
        self.h.fill(0.0);
        self.hh.fill(0.0);
        self
    }

    pub(crate) fn into_parts(self) -> (Array4<f64>, Array4<f64>) {
        (self.b_sc, self.hh)
    }
}

/// 第二阶段的全部输入: R1 回归的先验, 以及 (可选的) DVR 回归的先验.
///
/// 只能由 [`Stage1`] 构建, 因此第二阶段不可能先于第一阶段运行.
#[derive(Debug, Clone)]
pub struct SpatialPriors {
    r1: Priors,
    dvr: Option<Priors>,
}

impl SpatialPriors {
    /// 平滑第一阶段结果并计算惩罚. `regularize_dvr` 为 `true` 时也为 DVR 回归构建先验.
    pub fn build(
        stage1: &Stage1,
        positions: &[Idx3d],
        sigma: [f64; 3],
        policy: &PenaltyPolicy,
        regularize_dvr: bool,
    ) -> Self {
        let r1 = Priors::build(stage1.r1(), positions, sigma, policy);
        let dvr = regularize_dvr.then(|| Priors::build(stage1.dvr(), positions, sigma, policy));
        Self { r1, dvr }
    }

    /// R1 回归的先验.
    #[inline]
    pub fn r1(&self) -> &Priors {
        &self.r1
    }

    /// DVR 回归的先验.
    #[inline]
    pub fn dvr(&self) -> Option<&Priors> {
        self.dvr.as_ref()
    }

    /// 所有惩罚清零.
    pub fn without_penalty(self) -> Self {
        Self {
            r1: self.r1.without_penalty(),
            dvr: self.dvr.map(Priors::without_penalty),
        }
    }

    pub(crate) fn into_parts(self) -> (Priors, Option<Priors>) {
        (self.r1, self.dvr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrate;
    use crate::reference::ReferenceCurve;
    use crate::srtm::model::Kinetics;
    use crate::srtm::synthetic::{self, SrtmParams};
    use ndarray::Array4;

    fn stage1_of_line(n: usize) -> (Stage1, Vec<Idx3d>) {
        let schedule = synthetic::scenario_schedule().unwrap();
        let t = schedule.mid_times();
        let w = schedule.durations();
        let reference = ReferenceCurve::new(synthetic::scenario_reference(), t.view()).unwrap();

        let mut ct = Array4::zeros((n, 1, 1, t.len()));
        for x in 0..n {
            let p = SrtmParams::new(1.0 + 0.1 * x as f64, 1.5, 0.4);
            let tac = synthetic::tissue_curve(&p, reference.values(), t.view()).unwrap();
            ct.slice_mut(ndarray::s![x, 0, 0, ..]).assign(&tac);
        }
        // 最后一个体素拟合失败.
        ct.slice_mut(ndarray::s![n - 1, 0, 0, ..]).fill(1.0);
        let int_ct = integrate::integrate_frames(ct.view(), t.view()).unwrap();
        let kin = Kinetics::new(&reference, w.view(), ct.view(), int_ct.view());
        let positions: Vec<Idx3d> = (0..n).map(|x| (x, 0, 0)).collect();
        (Stage1::estimate(&kin, (n, 1, 1), &positions), positions)
    }

    #[test]
    fn test_priors() {
        let (s1, positions) = stage1_of_line(6);
        let policy = PenaltyPolicy::default();
        let sigma = [1.0, 0.0, 0.0];
        let priors = SpatialPriors::build(&s1, &positions, sigma, &policy, false);
        assert!(priors.dvr().is_none());

        let p = priors.r1();
        let expected = smooth_channels(s1.r1().coef(), sigma);
        assert_eq!(p.b_sc(), expected);
        for x in 0..5 {
            for c in 0..NUM_COEFFS {
                let h = policy.penalty(
                    s1.r1().var()[(x, 0, 0)],
                    s1.r1().coef()[[x, 0, 0, c]],
                    expected[[x, 0, 0, c]],
                );
                assert_eq!(p.h()[[x, 0, 0, c]], h);
                assert!(h >= 0.0);
            }
        }
        // 失败体素的惩罚为 0, 但平滑后会从邻居得到惩罚.
        assert!(p.h().slice(ndarray::s![5, 0, 0, ..]).iter().all(|v| *v == 0.0));
        assert_eq!(p.hh(), smooth_channels(p.h(), sigma));

        let (hh, b_sc) = p.at((2, 0, 0));
        assert_eq!(hh[1], p.hh()[[2, 0, 0, 1]]);
        assert_eq!(b_sc[0], p.b_sc()[[2, 0, 0, 0]]);
    }

    #[test]
    fn test_dvr_priors_and_zero_penalty() {
        let (s1, positions) = stage1_of_line(4);
        let priors = SpatialPriors::build(&s1, &positions, [0.7; 3], &PenaltyPolicy::default(), true);
        assert!(priors.dvr().is_some());

        let zero = priors.without_penalty();
        assert!(zero.r1().hh().iter().all(|v| *v == 0.0));
        assert!(zero.dvr().unwrap().hh().iter().all(|v| *v == 0.0));
    }
}
