//! 合成数据: 离散 SRTM 正向模型与测试体模.
//!
//! 正向模型与估计器使用同一种时间积分 (累积梯形 + 首帧三角形修正),
//! 因此生成的曲线严格满足
//! `Ct = R1 * Cref + k2 * intCref - k2a * intCt`, 无噪声时估计器可以恢复原参数.

use ndarray::{Array1, Array3, Array4, ArrayView1, ArrayView4, Axis};

use crate::{integrate, DynamicScan, FrameSchedule, Idx3d, InputResult, VoxelMask, VoxelSpacing};

/// SRTM 动力学参数.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SrtmParams {
    /// 相对输送率 R1.
    pub r1: f64,

    /// 分布容积比 DVR.
    pub dvr: f64,

    /// 组织清除速率 k2 (1/min).
    pub k2: f64,
}

impl SrtmParams {
    /// 创建参数.
    #[inline]
    pub const fn new(r1: f64, dvr: f64, k2: f64) -> Self {
        Self { r1, dvr, k2 }
    }

    /// 表观清除速率 `k2a = k2 / DVR`.
    #[inline]
    pub fn k2a(&self) -> f64 {
        self.k2 / self.dvr
    }
}

/// 由参考曲线 `cref` 生成组织 TAC, `t` 为帧中点时间.
///
/// 逐帧求解离散模型. 第 `i` 帧的积分只依赖前面各帧与本帧的值, 整理后
/// `Ct[i] * (1 + k2a * h / 2)` 为已知量, 其中 `h` 为相邻中点时间间隔
/// (第 0 帧为 `t[0]`).
pub fn tissue_curve(
    params: &SrtmParams,
    cref: ArrayView1<f64>,
    t: ArrayView1<f64>,
) -> InputResult<Array1<f64>> {
    let int_cref = integrate::integrate_curve(cref, t)?;
    let SrtmParams { r1, k2, .. } = *params;
    let k2a = params.k2a();

    let mut c = Array1::zeros(t.len());
    c[0] = (r1 * cref[0] + k2 * int_cref[0]) / (1.0 + k2a * t[0] / 2.0);
    let triangle = t[0] * c[0] / 2.0;
    let mut acc = 0.0;
    for i in 1..t.len() {
        let h = t[i] - t[i - 1];
        let known = triangle + acc + h * c[i - 1] / 2.0;
        c[i] = (r1 * cref[i] + k2 * int_cref[i] - k2a * known) / (1.0 + k2a * h / 2.0);
        acc += h * (c[i] + c[i - 1]) / 2.0;
    }
    Ok(c)
}

/// 测试场景的空间形状.
pub const SCENARIO_SHAPE: Idx3d = (10, 11, 12);

/// 测试场景各帧开始时间 (min).
pub const SCENARIO_FRAME_START: [f64; 7] = [0.0, 5.0, 10.0, 20.0, 30.0, 40.0, 50.0];

/// 测试场景各帧结束时间 (min).
pub const SCENARIO_FRAME_END: [f64; 7] = [5.0, 10.0, 20.0, 30.0, 40.0, 50.0, 60.0];

/// 测试场景的参考曲线.
pub const SCENARIO_REFERENCE: [f64; 7] = [0.0, 100.0, 200.0, 160.0, 140.0, 120.0, 120.0];

/// 测试场景组织区域的动力学参数.
pub const SCENARIO_PARAMS: SrtmParams = SrtmParams::new(1.0, 1.2, 1.1);

/// 测试场景的帧时间表.
#[inline]
pub fn scenario_schedule() -> InputResult<FrameSchedule> {
    FrameSchedule::new(SCENARIO_FRAME_START.to_vec(), SCENARIO_FRAME_END.to_vec())
}

/// 测试场景的参考曲线.
#[inline]
pub fn scenario_reference() -> Array1<f64> {
    Array1::from(SCENARIO_REFERENCE.to_vec())
}

/// 合成 4D 体模.
///
/// 每个体素要么属于参考区域 (TAC 即参考曲线), 要么属于某个组织区域
/// (TAC 由 [`tissue_curve`] 生成).
#[derive(Debug, Clone)]
pub struct Phantom {
    data: Array4<f64>,
    schedule: FrameSchedule,
    params: Array3<Option<SrtmParams>>,
}

impl Phantom {
    /// 由区域函数 `region` 构建体模. `region(pos)` 返回 `None` 代表参考区域体素.
    ///
    /// `cref` 长度与 `schedule` 不一致时返回 `Err`.
    pub fn from_fn<F>(
        shape: Idx3d,
        schedule: FrameSchedule,
        cref: ArrayView1<f64>,
        region: F,
    ) -> InputResult<Self>
    where
        F: Fn(Idx3d) -> Option<SrtmParams>,
    {
        let t = schedule.mid_times();
        integrate::integrate_curve(cref, t.view())?;

        let params = Array3::from_shape_fn(shape, region);
        let (x, y, z) = shape;
        let mut data = Array4::zeros((x, y, z, schedule.len()));
        for (pos, p) in params.indexed_iter() {
            let mut tac = data.slice_mut(ndarray::s![pos.0, pos.1, pos.2, ..]);
            match p {
                None => tac.assign(&cref),
                Some(p) => tac.assign(&tissue_curve(p, cref, t.view())?),
            }
        }
        Ok(Self {
            data,
            schedule,
            params,
        })
    }

    /// 沿 `z` 轴对半分的体模: 前一半为参考区域, 后一半为参数 `params` 的组织.
    pub fn two_region(
        shape: Idx3d,
        schedule: FrameSchedule,
        cref: ArrayView1<f64>,
        params: SrtmParams,
    ) -> InputResult<Self> {
        let half = shape.2 / 2;
        Self::from_fn(shape, schedule, cref, |(_, _, z)| {
            (z >= half).then_some(params)
        })
    }

    /// 标准测试场景: 形状 `(10, 11, 12, 7)`, 参考曲线为 [`SCENARIO_REFERENCE`],
    /// `z >= 6` 的组织体素参数为 [`SCENARIO_PARAMS`].
    pub fn scenario() -> InputResult<Self> {
        Self::two_region(
            SCENARIO_SHAPE,
            scenario_schedule()?,
            scenario_reference().view(),
            SCENARIO_PARAMS,
        )
    }

    /// 4D 数据.
    #[inline]
    pub fn data(&self) -> ArrayView4<'_, f64> {
        self.data.view()
    }

    /// 可变 4D 数据, 用于加噪声或篡改个别体素.
    #[inline]
    pub fn data_mut(&mut self) -> &mut Array4<f64> {
        &mut self.data
    }

    /// 帧时间表.
    #[inline]
    pub fn schedule(&self) -> &FrameSchedule {
        &self.schedule
    }

    /// 体素 `pos` 的真实参数. 参考区域体素为 `None`.
    #[inline]
    pub fn params(&self, pos: Idx3d) -> Option<SrtmParams> {
        self.params[pos]
    }

    /// 参考区域掩膜.
    pub fn reference_mask(&self) -> VoxelMask {
        VoxelMask::new(self.params.mapv(|p| p.is_none()))
    }

    /// 组织区域掩膜.
    pub fn tissue_mask(&self) -> VoxelMask {
        VoxelMask::new(self.params.mapv(|p| p.is_some()))
    }

    /// 以体素尺寸 `spacing` 查看为动态扫描.
    #[inline]
    pub fn scan(&self, spacing: VoxelSpacing) -> DynamicScan<'_> {
        DynamicScan::new(self.data.view(), spacing)
    }

    /// 帧数.
    #[inline]
    pub fn frames(&self) -> usize {
        self.data.len_of(Axis(3))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_tissue_curve_satisfies_model() {
        let t = scenario_schedule().unwrap().mid_times();
        let cref = scenario_reference();
        let p = SCENARIO_PARAMS;
        let ct = tissue_curve(&p, cref.view(), t.view()).unwrap();
        let int_cref = integrate::integrate_curve(cref.view(), t.view()).unwrap();
        let int_ct = integrate::integrate_curve(ct.view(), t.view()).unwrap();
        for i in 0..t.len() {
            let rhs = p.r1 * cref[i] + p.k2 * int_cref[i] - p.k2a() * int_ct[i];
            assert_abs_diff_eq!(ct[i], rhs, epsilon = 1e-9);
        }
        // 首帧参考值为 0, 组织也从 0 开始.
        assert_eq!(ct[0], 0.0);
    }

    #[test]
    fn test_scenario_phantom() {
        let ph = Phantom::scenario().unwrap();
        assert_eq!(ph.data().dim(), (10, 11, 12, 7));
        assert_eq!(ph.frames(), 7);
        assert_eq!(ph.reference_mask().count(), 10 * 11 * 6);
        assert_eq!(ph.tissue_mask().count(), 10 * 11 * 6);
        assert_eq!(ph.params((0, 0, 5)), None);
        assert_eq!(ph.params((9, 10, 6)), Some(SCENARIO_PARAMS));

        let scan = ph.scan(VoxelSpacing::isotropic(2.0).unwrap());
        assert_eq!(scan.tac((3, 4, 2)), scenario_reference());
        assert_eq!(scan.tac((3, 4, 8)), scan.tac((0, 0, 11)));
    }

    #[test]
    fn test_phantom_length_mismatch() {
        let r = Phantom::two_region(
            (2, 2, 2),
            scenario_schedule().unwrap(),
            ndarray::arr1(&[1.0, 2.0]).view(),
            SCENARIO_PARAMS,
        );
        assert!(r.is_err());
    }
}
