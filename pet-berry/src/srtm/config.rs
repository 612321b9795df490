//! 运行配置.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_DEVIATION_TOLERANCE, DEFAULT_MIN_COUNT, NUM_COEFFS};
use crate::reference::check_proportion;
use crate::{InputError, InputResult};

/// 岭惩罚权重 `H = m * var / (B - B_sc)^2` 的退化处理策略.
///
/// 当估计值与其平滑先验 (在相对容差 `deviation_tolerance` 内) 相等, 或商不是有限值时,
/// 惩罚取 `zero_deviation_penalty`. 所有惩罚都不会超过 `max_penalty`.
///
/// 默认策略下, 两者相等时惩罚为 0, 即 "不需要岭修正".
///
/// 注意默认的 `max_penalty` 为 `f64::MAX`: 偏差刚好落在容差带外时,
/// 惩罚会从 0 跳到约 `3 * var / (tol * B)^2`. 容差不为 0 时建议设置有限的 `max_penalty`.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PenaltyPolicy {
    deviation_tolerance: f64,
    zero_deviation_penalty: f64,
    max_penalty: f64,
}

impl Default for PenaltyPolicy {
    fn default() -> Self {
        Self {
            deviation_tolerance: DEFAULT_DEVIATION_TOLERANCE,
            zero_deviation_penalty: 0.0,
            max_penalty: f64::MAX,
        }
    }
}

impl PenaltyPolicy {
    /// 创建策略. 参数非法时返回 `Err(InputError::InvalidConfig)`.
    pub fn new(
        deviation_tolerance: f64,
        zero_deviation_penalty: f64,
        max_penalty: f64,
    ) -> InputResult<Self> {
        let p = Self {
            deviation_tolerance,
            zero_deviation_penalty,
            max_penalty,
        };
        p.validate()?;
        Ok(p)
    }

    /// 判定 "偏差为 0" 的相对容差.
    #[inline]
    pub fn deviation_tolerance(&self) -> f64 {
        self.deviation_tolerance
    }

    /// 偏差为 0 时使用的惩罚.
    #[inline]
    pub fn zero_deviation_penalty(&self) -> f64 {
        self.zero_deviation_penalty
    }

    /// 惩罚上限.
    #[inline]
    pub fn max_penalty(&self) -> f64 {
        self.max_penalty
    }

    /// 检查各参数.
    pub fn validate(&self) -> InputResult<()> {
        if !(self.deviation_tolerance.is_finite() && self.deviation_tolerance >= 0.0) {
            return Err(InputError::InvalidConfig(
                "deviation tolerance must be finite and non-negative",
            ));
        }
        if !(self.max_penalty >= 0.0) {
            return Err(InputError::InvalidConfig("max penalty must be non-negative"));
        }
        if !(self.zero_deviation_penalty.is_finite()
            && (0.0..=self.max_penalty).contains(&self.zero_deviation_penalty))
        {
            return Err(InputError::InvalidConfig(
                "zero-deviation penalty must be finite and lie in [0, max penalty]",
            ));
        }
        Ok(())
    }

    /// 对单个系数计算惩罚. `var` 为该体素的残差方差, `b` 与 `b_sc`
    /// 分别为原始估计与平滑后的先验.
    pub fn penalty(&self, var: f64, b: f64, b_sc: f64) -> f64 {
        let d = b - b_sc;
        if d.abs() <= self.deviation_tolerance * b.abs().max(b_sc.abs()) {
            return self.zero_deviation_penalty;
        }
        let h = NUM_COEFFS as f64 * var / (d * d);
        if h.is_finite() {
            h.min(self.max_penalty)
        } else {
            self.zero_deviation_penalty
        }
    }
}

/// `Srtm2` 的运行配置.
///
/// 除 `fwhm` 外, 各项均有默认值, 可以用 `with_*` 方法逐项修改:
///
/// | 配置项 | 默认值 |
/// |---|---|
/// | `proportion_to_cut` | 0 (普通均值) |
/// | `min_count` | [`DEFAULT_MIN_COUNT`] |
/// | `smooth_tac` | `true` |
/// | `regularize_dvr` | `false` |
/// | `penalty` | [`PenaltyPolicy::default`] |
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SrtmConfig {
    fwhm: f64,
    proportion_to_cut: f64,
    min_count: f64,
    smooth_tac: bool,
    regularize_dvr: bool,
    penalty: PenaltyPolicy,
}

impl SrtmConfig {
    /// 以平滑核半高宽 `fwhm` (与体素尺寸单位相同) 创建默认配置.
    pub fn new(fwhm: f64) -> Self {
        Self {
            fwhm,
            proportion_to_cut: 0.0,
            min_count: DEFAULT_MIN_COUNT,
            smooth_tac: true,
            regularize_dvr: false,
            penalty: PenaltyPolicy::default(),
        }
    }

    /// 参考区域截尾均值两端各去掉的比例, 应在 `[0, 0.5)` 内.
    #[inline]
    pub fn with_proportion_to_cut(mut self, proportion: f64) -> Self {
        self.proportion_to_cut = proportion;
        self
    }

    /// 最大强度投影的最小计数阈值.
    #[inline]
    pub fn with_min_count(mut self, min_count: f64) -> Self {
        self.min_count = min_count;
        self
    }

    /// 回归前是否先对每一帧做空间平滑.
    #[inline]
    pub fn with_smooth_tac(mut self, smooth_tac: bool) -> Self {
        self.smooth_tac = smooth_tac;
        self
    }

    /// 是否对 DVR 回归也做第二阶段的岭回归.
    #[inline]
    pub fn with_regularize_dvr(mut self, regularize_dvr: bool) -> Self {
        self.regularize_dvr = regularize_dvr;
        self
    }

    /// 岭惩罚退化处理策略.
    #[inline]
    pub fn with_penalty(mut self, penalty: PenaltyPolicy) -> Self {
        self.penalty = penalty;
        self
    }

    /// 平滑核半高宽.
    #[inline]
    pub fn fwhm(&self) -> f64 {
        self.fwhm
    }

    /// 截尾比例.
    #[inline]
    pub fn proportion_to_cut(&self) -> f64 {
        self.proportion_to_cut
    }

    /// 最小计数阈值.
    #[inline]
    pub fn min_count(&self) -> f64 {
        self.min_count
    }

    /// 是否平滑 TAC.
    #[inline]
    pub fn smooth_tac(&self) -> bool {
        self.smooth_tac
    }

    /// 是否正则化 DVR.
    #[inline]
    pub fn regularize_dvr(&self) -> bool {
        self.regularize_dvr
    }

    /// 岭惩罚策略.
    #[inline]
    pub fn penalty(&self) -> &PenaltyPolicy {
        &self.penalty
    }

    /// 检查配置.
    ///
    /// # 返回值
    ///
    /// - `fwhm` 不为正或不是有限值时, 返回 `Err(InputError::InvalidFwhm)`;
    /// - 截尾比例不在 `[0, 0.5)` 内时, 返回 `Err(InputError::InvalidProportion)`;
    /// - `min_count` 为 NaN, 或惩罚策略非法时, 返回 `Err(InputError::InvalidConfig)`.
    pub fn validate(&self) -> InputResult<()> {
        if !(self.fwhm.is_finite() && self.fwhm > 0.0) {
            return Err(InputError::InvalidFwhm(self.fwhm));
        }
        check_proportion(self.proportion_to_cut)?;
        if self.min_count.is_nan() {
            return Err(InputError::InvalidConfig("min count must not be NaN"));
        }
        self.penalty.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let c = SrtmConfig::new(6.0);
        assert_eq!(c.fwhm(), 6.0);
        assert_eq!(c.proportion_to_cut(), 0.0);
        assert_eq!(c.min_count(), 1.0);
        assert!(c.smooth_tac());
        assert!(!c.regularize_dvr());
        assert_eq!(c.penalty(), &PenaltyPolicy::default());
        assert_eq!(c.penalty().deviation_tolerance(), DEFAULT_DEVIATION_TOLERANCE);
        assert_eq!(c.penalty().zero_deviation_penalty(), 0.0);
        assert_eq!(c.penalty().max_penalty(), f64::MAX);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_config_validate() {
        assert_eq!(
            SrtmConfig::new(0.0).validate(),
            Err(InputError::InvalidFwhm(0.0))
        );
        assert_eq!(
            SrtmConfig::new(4.0).with_proportion_to_cut(0.5).validate(),
            Err(InputError::InvalidProportion(0.5))
        );
        assert!(matches!(
            SrtmConfig::new(4.0).with_min_count(f64::NAN).validate(),
            Err(InputError::InvalidConfig(_))
        ));
        assert!(PenaltyPolicy::new(-1.0, 0.0, 1.0).is_err());
        assert!(PenaltyPolicy::new(0.0, 2.0, 1.0).is_err());
        assert!(PenaltyPolicy::new(0.0, 1.0, 1.0).is_ok());
    }

    #[test]
    fn test_penalty() {
        let p = PenaltyPolicy::default();
        assert_eq!(p.penalty(0.5, 2.0, 1.5), 3.0 * 0.5 / 0.25);
        // 完全相等与舍入误差级别的偏差都视作 "无需修正".
        assert_eq!(p.penalty(0.5, 1.0, 1.0), 0.0);
        assert_eq!(p.penalty(0.5, 1.0, 1.0 + 1e-14), 0.0);
        assert_eq!(p.penalty(f64::NAN, 2.0, 1.0), 0.0);

        let capped = PenaltyPolicy::new(1e-10, 7.0, 100.0).unwrap();
        assert_eq!(capped.penalty(0.5, 1.0, 1.0), 7.0);
        assert_eq!(capped.penalty(1e6, 2.0, 1.0), 100.0);
        assert_eq!(capped.penalty(f64::INFINITY, 2.0, 1.0), 7.0);

        // 容差带边缘的跳变被上限截断.
        let edge = 1.0 + 2e-10;
        assert_eq!(p.penalty(0.5, edge, 1.0), 3.0 * 0.5 / ((edge - 1.0) * (edge - 1.0)));
        assert!(p.penalty(0.5, edge, 1.0) > 1e18);
        assert_eq!(capped.penalty(0.5, edge, 1.0), 100.0);
    }
}
