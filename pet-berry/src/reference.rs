//! 参考区域时间-活度曲线.

use ndarray::{Array1, ArrayView1, ArrayView3, Zip};
use ordered_float::NotNan;

use crate::{integrate, DynamicScan, InputError, InputResult, VoxelMask};

/// 截尾均值: 排序后从两端各去掉 `floor(proportion * n)` 个值, 对剩余部分求平均.
///
/// `values` 中的 NaN 会被忽略. `proportion` 应在 `[0, 0.5)` 内.
/// 没有可用的值时返回 `None`.
///
/// 当只有一个值时, 截尾对结果没有影响.
pub fn trim_mean(values: &[f64], proportion: f64) -> Option<f64> {
    debug_assert!((0.0..0.5).contains(&proportion));
    let mut sorted: Vec<NotNan<f64>> = values
        .iter()
        .filter_map(|v| NotNan::new(*v).ok())
        .collect();
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    let cut = (proportion * n as f64).floor() as usize;
    if cut != 0 {
        sorted.sort_unstable();
    }
    let kept = &sorted[cut..n - cut];
    Some(kept.iter().map(|v| v.into_inner()).sum::<f64>() / kept.len() as f64)
}

/// 检查截尾比例.
#[inline]
pub fn check_proportion(proportion: f64) -> InputResult<()> {
    if (0.0..0.5).contains(&proportion) {
        Ok(())
    } else {
        Err(InputError::InvalidProportion(proportion))
    }
}

/// 参考区域时间-活度曲线及其时间积分. 每次运行只计算一次, 之后不可变.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceCurve {
    values: Array1<f64>,
    integral: Array1<f64>,
}

impl ReferenceCurve {
    /// 直接从已知曲线构建, 并在时间轴 `t` 上积分.
    pub fn new(values: Array1<f64>, t: ArrayView1<f64>) -> InputResult<Self> {
        let integral = integrate::integrate_curve(values.view(), t)?;
        Ok(Self { values, integral })
    }

    /// 从 `scan` 中由 `ref_mask` 选中的体素计算参考曲线, 并在时间轴 `t` 上积分.
    ///
    /// 每一帧的值是该帧中所有被选中的有限体素值的截尾均值.
    pub fn from_scan(
        scan: &DynamicScan,
        ref_mask: &VoxelMask,
        proportion: f64,
        t: ArrayView1<f64>,
    ) -> InputResult<Self> {
        let values = reference_curve(scan, ref_mask, proportion)?;
        Self::new(values, t)
    }

    /// 曲线 `Cref`.
    #[inline]
    pub fn values(&self) -> ArrayView1<'_, f64> {
        self.values.view()
    }

    /// 曲线积分 `intCref`.
    #[inline]
    pub fn integral(&self) -> ArrayView1<'_, f64> {
        self.integral.view()
    }

    /// 帧数.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// 是否为空?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// 收集 `frame` 中被 `mask` 选中的有限值.
fn masked_finite(frame: ArrayView3<f64>, mask: ArrayView3<bool>, buf: &mut Vec<f64>) {
    buf.clear();
    Zip::from(frame).and(mask).for_each(|v, m| {
        if *m && v.is_finite() {
            buf.push(*v);
        }
    });
}

/// 计算参考区域时间-活度曲线: 对每一帧, 取 `ref_mask` 选中体素中有限值的截尾均值.
///
/// # 返回值
///
/// - `ref_mask` 与扫描的空间形状不一致时, 返回 `Err(InputError::ShapeMismatch)`;
/// - `ref_mask` 没有选中任何体素时, 返回 `Err(InputError::EmptyMask)`;
/// - `proportion` 不在 `[0, 0.5)` 内时, 返回 `Err(InputError::InvalidProportion)`;
/// - 某一帧选中的体素全都不是有限值时, 返回 `Err(InputError::NoFiniteReference)`.
pub fn reference_curve(
    scan: &DynamicScan,
    ref_mask: &VoxelMask,
    proportion: f64,
) -> InputResult<Array1<f64>> {
    ref_mask.check_shape("reference mask", scan.shape())?;
    check_proportion(proportion)?;
    let selected = ref_mask.count();
    if selected == 0 {
        return Err(InputError::EmptyMask("reference"));
    }

    let mut buf = Vec::with_capacity(selected);
    let mut curve = Array1::zeros(scan.frames());
    for (i, frame) in scan.frame_iter().enumerate() {
        masked_finite(frame, ref_mask.data(), &mut buf);
        curve[i] = trim_mean(&buf, proportion).ok_or(InputError::NoFiniteReference(i))?;
    }
    Ok(curve)
}
