//! 运行时错误.

use crate::Idx3d;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 整体级别的非法输入. 一旦出现, 在处理任何体素之前就返回给调用者.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    /// 两个数组的形状不一致.
    ///
    /// `what` 描述发生不一致的对象, 其余两个参数依次为期望与实际的形状.
    #[error("shape mismatch for {what}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// 发生不一致的对象.
        what: &'static str,
        /// 期望的形状.
        expected: Vec<usize>,
        /// 实际的形状.
        actual: Vec<usize>,
    },

    /// 两个序列的长度不一致.
    #[error("length mismatch for {what}: expected {expected}, got {actual}")]
    LengthMismatch {
        /// 发生不一致的对象.
        what: &'static str,
        /// 期望长度.
        expected: usize,
        /// 实际长度.
        actual: usize,
    },

    /// 采样点不足以做积分.
    ///
    /// 第一个参数代表目前已有的点, 第二个参数代表需要的最少点数.
    #[error("too few samples: got {0}, need at least {1}")]
    TooFewSamples(usize, usize),

    /// 帧数不足以做 3 系数回归.
    #[error("too few frames: got {0}, need at least {1}")]
    TooFewFrames(usize, usize),

    /// 时间轴不是严格递增的. 参数为第一个违例位置.
    #[error("time axis is not strictly increasing at index {0}")]
    NonMonotonicTime(usize),

    /// 某帧持续时间不为正. 参数为帧索引.
    #[error("frame {0} has a non-positive duration")]
    NonPositiveDuration(usize),

    /// 第 `i` 帧与第 `i + 1` 帧时间上重叠. 参数为 `i`.
    #[error("frame {0} overlaps the next frame")]
    OverlappingFrames(usize),

    /// 掩膜没有选中任何体素.
    #[error("mask `{0}` selects no voxel")]
    EmptyMask(&'static str),

    /// 体素尺寸不为正 (或非有限值).
    #[error("voxel spacing must be positive and finite, got {0:?}")]
    NonPositiveSpacing([f64; 3]),

    /// 平滑核半高宽不为正 (或非有限值).
    #[error("fwhm must be positive and finite, got {0}")]
    InvalidFwhm(f64),

    /// 截尾比例不在 `[0, 0.5)` 内.
    #[error("trim proportion must lie in [0, 0.5), got {0}")]
    InvalidProportion(f64),

    /// 参考区域在某帧上没有任何有限值. 参数为帧索引.
    #[error("reference region has no finite value in frame {0}")]
    NoFiniteReference(usize),

    /// 其他配置项非法.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// 单个体素回归时的数值错误. 只影响该体素, 不会中断整体运行.
#[derive(Debug, Copy, Clone, PartialEq, Error)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NumericalError {
    /// 正规方程奇异或严重病态. 参数为 Jacobi 缩放后的倒数条件数估计.
    #[error("normal equations are singular (rcond = {rcond:e})")]
    Singular {
        /// 倒数条件数.
        rcond: f64,
    },

    /// 体素 TAC 在所有帧上为常数, 无法区分回归变量.
    #[error("time-activity curve is constant over all frames")]
    DegenerateCurve,

    /// 求解结果或残差方差不是有限值.
    #[error("solution is not finite")]
    NonFinite,
}

/// 整体输入检查结果.
pub type InputResult<T> = Result<T, InputError>;

/// 单体素回归结果.
pub type FitResult<T> = Result<T, NumericalError>;

/// 带位置信息的单体素失败记录.
pub type VoxelError = (Idx3d, NumericalError);
