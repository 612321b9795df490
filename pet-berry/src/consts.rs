//! 通用常量.

/// 每个 SRTM 线性回归的系数个数 (也是岭惩罚权重公式中的自由度常数 `m`).
pub const NUM_COEFFS: usize = 3;

/// 默认的最小计数阈值. 最大强度投影低于该值的体素不参与估计.
pub const DEFAULT_MIN_COUNT: f64 = 1.0;

/// 高斯核截断半径, 以 sigma 为单位.
pub const GAUSSIAN_TRUNCATE: f64 = 4.0;

/// `FWHM = FWHM_PER_SIGMA * sigma`, 即 `2 * sqrt(2 * ln 2)`.
pub const FWHM_PER_SIGMA: f64 = 2.354_820_045_030_949_3;

/// 正规方程 (Jacobi 缩放后) 的倒数条件数下限. 低于它就当作奇异矩阵.
pub const RCOND_THRESHOLD: f64 = 1e-13;

/// 判定 "估计值等于其平滑先验" 的默认相对容差.
pub const DEFAULT_DEVIATION_TOLERANCE: f64 = 1e-10;

/// 回归所需的最少帧数. 残差方差的分母 `T - NUM_COEFFS` 必须为正.
pub const MIN_FRAMES: usize = NUM_COEFFS + 1;

/// 系数通道语义.
pub mod coeff {
    /// DVR 回归 (`B0`) 中 DVR 所在的通道.
    pub const DVR: usize = 0;

    /// R1 回归 (`B1`) 中 R1 所在的通道.
    pub const R1: usize = 0;

    /// R1 回归 (`B1`) 中 k2 所在的通道.
    pub const K2: usize = 1;

    /// R1 回归 (`B1`) 中 k2a 所在的通道.
    pub const K2A: usize = 2;
}
