#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 提供动态 PET 扫描的简化参考组织模型 (SRTM2, Zhou 2003)
//! 参数成像算法: 从 4D 动态扫描和参考区域时间-活度曲线估计
//! DVR (distribution volume ratio) 与 R1 (relative delivery) 参数图.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 该 crate 不负责任何文件读写 (nifti, 帧时间表格等).
//!   调用者需要自行把数据加载为 `ndarray` 数组, 按 `(x, y, z, frame)` 组织.
//! 2. 整体级别的非法输入 (形状不一致, 时间轴不单调, 空掩膜等) 会在处理任何体素之前以
//!   [`InputError`] 返回; 单个体素的数值问题 (奇异设计矩阵等) 不会中断运行,
//!   而是记录在 [`VoxelFailures`] 中.
//!
//! # 开发计划
//!
//! ### 时间积分 (累积梯形 + 首帧三角形修正) ✅
//!
//! 实现位于 `pet-berry/src/integrate.rs`.
//!
//! ### 参考区域 TAC (截尾均值) ✅
//!
//! 实现位于 `pet-berry/src/reference.rs`.
//!
//! ### 三维高斯平滑 (FWHM -> 各轴体素 sigma) ✅
//!
//! 实现位于 `pet-berry/src/smooth.rs`.
//!
//! ### 加权最小二乘 / 岭回归求解核 ✅
//!
//! 3 系数正规方程, 带条件数检查. 不做显式求逆.
//!
//! 实现位于 `pet-berry/src/fitting`.
//!
//! ### 第一阶段 WLR, 先验与惩罚权重, 第二阶段 LRSC ✅
//!
//! 参考论文: "Linear regression with spatial constraint to generate
//! parametric images of ligand-receptor dynamic PET studies with a simplified
//! reference tissue model" (Zhou et al., NeuroImage 2003).
//!
//! 实现位于 `pet-berry/src/srtm`.
//!
//! ### DVR 的第二阶段正则化 ✅
//!
//! 原论文流程只对 R1 做岭回归. DVR 分支结构上完全对称,
//! 通过 [`SrtmConfig::with_regularize_dvr`] 打开.
//!
//! ### 并行 ✅
//!
//! 两个逐体素估计阶段在 `rayon` feature 下并行.

/// 三维索引 `(x, y, z)`, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

pub mod consts;

mod error;

pub use error::{FitResult, InputError, InputResult, NumericalError, VoxelError};

/// 动态扫描数据模型: 帧时间表, 4D 扫描视图, 掩膜.
mod data;

pub use data::{DynamicScan, FrameSchedule, VoxelMask, VoxelSpacing};

pub use data::mask;

pub mod fitting;

pub mod integrate;

pub mod reference;

pub mod smooth;

pub mod srtm;

pub use srtm::{PenaltyPolicy, Srtm2, SrtmConfig, SrtmMaps, VoxelFailures};

pub use srtm::synthetic;

pub mod prelude;
