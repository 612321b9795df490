//! SRTM2 参数成像流水线 (Zhou et al., NeuroImage 2003).
//!
//! 流水线严格按以下顺序执行, 没有回路:
//!
//! 1. 时间积分与参考曲线: 由参考区域掩膜得到 `Cref`, 并对 `Cref` 与每个体素的 TAC 积分;
//! 2. 第一阶段 [`Stage1`]: 逐体素加权线性回归;
//! 3. 空间先验 [`SpatialPriors`]: 平滑系数图, 计算并平滑岭惩罚;
//! 4. 第二阶段 [`Stage2`]: 逐体素岭回归.
//!
//! 所有整体级别的输入检查都在处理任何体素之前完成.

use log::{debug, info, warn};

use crate::consts::MIN_FRAMES;
use crate::reference::ReferenceCurve;
use crate::{integrate, smooth};
use crate::{DynamicScan, FrameSchedule, Idx3d, InputError, InputResult, VoxelMask};

mod config;
mod lrsc;
mod maps;
mod model;
mod prior;
pub mod synthetic;
mod wlr;

pub use config::{PenaltyPolicy, SrtmConfig};
pub use lrsc::{RidgeMaps, Stage2};
pub use maps::{SrtmMaps, VoxelFailures};
pub use prior::{Priors, SpatialPriors};
pub use wlr::{CoefMaps, Stage1};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
    }
}

/// 对 `positions` 中每个体素调用 `op`, 结果与 `positions` 一一对应.
///
/// 启用 `rayon` feature 时并行执行. 各体素之间没有共享的可变状态.
fn map_voxels<T, F>(positions: &[Idx3d], op: F) -> Vec<T>
where
    T: Send,
    F: Fn(Idx3d) -> T + Sync + Send,
{
    cfg_if::cfg_if! {
        if #[cfg(feature = "rayon")] {
            positions.par_iter().map(|pos| op(*pos)).collect()
        } else {
            positions.iter().map(|pos| op(*pos)).collect()
        }
    }
}

/// 两阶段 SRTM2 估计器.
///
/// # 示例
///
/// ```
/// use pet_berry::synthetic::Phantom;
/// use pet_berry::{Srtm2, SrtmConfig, VoxelSpacing};
///
/// let phantom = Phantom::scenario().unwrap();
/// let scan = phantom.scan(VoxelSpacing::isotropic(2.0).unwrap());
/// let maps = Srtm2::new(SrtmConfig::new(4.0))
///     .run(&scan, phantom.schedule(), &phantom.reference_mask())
///     .unwrap();
/// assert_eq!(maps.r1_lrsc().dim(), (10, 11, 12));
/// ```
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Srtm2 {
    config: SrtmConfig,
}

impl Srtm2 {
    /// 以配置 `config` 创建估计器.
    #[inline]
    pub fn new(config: SrtmConfig) -> Self {
        Self { config }
    }

    /// 运行配置.
    #[inline]
    pub fn config(&self) -> &SrtmConfig {
        &self.config
    }

    /// 在动态扫描 `scan` 上运行完整流水线.
    ///
    /// `schedule` 为各帧时间, `ref_mask` 为参考区域掩膜.
    ///
    /// # 返回值
    ///
    /// 任何整体级别的非法输入 (配置非法, 帧数不一致或不足, 掩膜形状不一致,
    /// 没有可处理的体素, 参考区域为空等) 都会在处理体素之前以 `Err` 返回.
    /// 单个体素的数值失败不会中断运行, 而是记录在 [`SrtmMaps::failures`] 中.
    pub fn run(
        &self,
        scan: &DynamicScan,
        schedule: &FrameSchedule,
        ref_mask: &VoxelMask,
    ) -> InputResult<SrtmMaps> {
        let config = &self.config;
        config.validate()?;
        scan.check_schedule(schedule)?;
        let frames = scan.frames();
        if frames < MIN_FRAMES {
            return Err(InputError::TooFewFrames(frames, MIN_FRAMES));
        }
        let shape = scan.shape();
        ref_mask.check_shape("reference mask", shape)?;
        let sigma = smooth::fwhm_to_sigma(config.fwhm(), scan.spacing())?;

        let t = schedule.mid_times();
        let w = schedule.durations();
        let mask = scan.count_mask(config.min_count());
        if mask.is_empty() {
            return Err(InputError::EmptyMask("count"));
        }
        let reference =
            ReferenceCurve::from_scan(scan, ref_mask, config.proportion_to_cut(), t.view())?;
        let positions = mask.positions();
        info!(
            "SRTM2: {frames} frames, {} of {} voxels masked, sigma = {sigma:?} voxels",
            positions.len(),
            scan.size()
        );
        debug!("reference curve: {}", reference.values());

        let raw = scan.data();
        let smoothed;
        let ct = if config.smooth_tac() {
            smoothed = smooth::smooth_channels(raw, sigma);
            smoothed.view()
        } else {
            raw.view()
        };
        let int_ct = integrate::integrate_frames(ct, t.view())?;
        let kin = model::Kinetics::new(&reference, w.view(), ct, int_ct.view())
            .with_measured(raw.view());

        let stage1 = Stage1::estimate(&kin, shape, &positions);
        info!(
            "stage 1 (WLR) done: {} DVR / {} R1 fits failed",
            stage1.dvr().failures().len(),
            stage1.r1().failures().len()
        );

        let priors = SpatialPriors::build(
            &stage1,
            &positions,
            sigma,
            config.penalty(),
            config.regularize_dvr(),
        );
        debug!("spatial priors built (regularize DVR: {})", config.regularize_dvr());

        let stage2 = Stage2::estimate(&kin, &priors, &positions);
        info!(
            "stage 2 (LRSC) done: {} R1 fits failed",
            stage2.r1().failures().len()
        );

        let maps = assemble(mask, stage1, priors, stage2);
        let failures = maps.failures();
        if !failures.is_empty() {
            warn!(
                "{} voxels failed regression ({} records: stage 1 DVR {}, stage 1 R1 {}, stage 2 R1 {}, stage 2 DVR {})",
                failures.failed_mask().count(),
                failures.total(),
                failures.stage1_dvr().len(),
                failures.stage1_r1().len(),
                failures.stage2_r1().len(),
                failures.stage2_dvr().len(),
            );
        }
        Ok(maps)
    }
}

/// 收集各阶段输出.
fn assemble(mask: VoxelMask, stage1: Stage1, priors: SpatialPriors, stage2: Stage2) -> SrtmMaps {
    let shape = mask.shape();
    let (dvr, r1) = stage1.into_parts();
    let (b0_wlr, var_b0, stage1_dvr) = dvr.into_parts();
    let (b1_wlr, var_b1, stage1_r1) = r1.into_parts();
    let (r1_priors, _) = priors.into_parts();
    let (b1_sc, hh1) = r1_priors.into_parts();
    let (r1_lrsc, dvr_lrsc) = stage2.into_parts();
    let (b1_lrsc, stage2_r1) = r1_lrsc.into_parts();
    let (b0_lrsc, stage2_dvr) = match dvr_lrsc.map(RidgeMaps::into_parts) {
        Some((b, f)) => (Some(b), f),
        None => (None, Vec::new()),
    };

    SrtmMaps {
        mask,
        b0_wlr,
        var_b0,
        b1_wlr,
        var_b1,
        b1_sc,
        hh1,
        b1_lrsc,
        b0_lrsc,
        failures: VoxelFailures::new(shape, stage1_dvr, stage1_r1, stage2_r1, stage2_dvr),
    }
}
