use ndarray::{s, Array3, ArrayView1, ArrayView3, ArrayView4, Axis};

use crate::{Idx3d, InputError, InputResult};

pub mod mask;
mod schedule;

pub use mask::VoxelMask;
pub use schedule::FrameSchedule;

/// 体素尺寸 (物理单位, 一般为毫米), 依次对应 `x`, `y`, `z` 三个轴.
///
/// 该结构是只读的. 若要修改体素尺寸, 你应该创建新的实例.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VoxelSpacing([f64; 3]);

impl VoxelSpacing {
    /// 构建体素尺寸. 任一分量不为正或不是有限值时返回 `Err`.
    pub fn new(spacing: [f64; 3]) -> InputResult<Self> {
        if spacing.iter().all(|v| v.is_finite() && *v > 0.0) {
            Ok(Self(spacing))
        } else {
            Err(InputError::NonPositiveSpacing(spacing))
        }
    }

    /// 构建各向同性的体素尺寸.
    #[inline]
    pub fn isotropic(size: f64) -> InputResult<Self> {
        Self::new([size; 3])
    }

    /// 获取三个轴的尺寸.
    #[inline]
    pub fn get(&self) -> [f64; 3] {
        self.0
    }

}

/// 4D 动态扫描的只读视图, 按 `(x, y, z, frame)` 组织, 并附带体素尺寸.
///
/// 底层数据归外部图像容器所有, 本结构只借用它.
#[derive(Debug, Clone)]
pub struct DynamicScan<'a> {
    data: ArrayView4<'a, f64>,
    spacing: VoxelSpacing,
}

impl<'a> DynamicScan<'a> {
    /// 从 4D 视图和体素尺寸创建.
    #[inline]
    pub fn new(data: ArrayView4<'a, f64>, spacing: VoxelSpacing) -> Self {
        Self { data, spacing }
    }

    /// 获取空间形状 `(x, y, z)`.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        let (x, y, z, _) = self.data.dim();
        (x, y, z)
    }

    /// 获取帧数.
    #[inline]
    pub fn frames(&self) -> usize {
        self.data.len_of(Axis(3))
    }

    /// 获取空间体素个数.
    #[inline]
    pub fn size(&self) -> usize {
        let (x, y, z) = self.shape();
        x * y * z
    }

    /// 体素尺寸.
    #[inline]
    pub fn spacing(&self) -> VoxelSpacing {
        self.spacing
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView4<'a, f64> {
        self.data.clone()
    }

    /// 获取体素 `pos` 的时间-活度曲线. 越界时 panic.
    #[inline]
    pub fn tac(&self, (x, y, z): Idx3d) -> ArrayView1<'_, f64> {
        self.data.slice(s![x, y, z, ..])
    }

    /// 获取能按升序迭代各帧 3D 视图的迭代器.
    #[inline]
    pub fn frame_iter(&self) -> impl ExactSizeIterator<Item = ArrayView3<'_, f64>> {
        self.data.axis_iter(Axis(3))
    }

    /// 检查帧时间表与扫描的帧数是否一致.
    pub fn check_schedule(&self, schedule: &FrameSchedule) -> InputResult<()> {
        if schedule.len() == self.frames() {
            Ok(())
        } else {
            Err(InputError::LengthMismatch {
                what: "frame schedule",
                expected: self.frames(),
                actual: schedule.len(),
            })
        }
    }

    /// 沿时间轴的最大强度投影 (maximum intensity projection).
    ///
    /// 与 numpy 的 `amax` 一致: 只要曲线中有 NaN, 该体素的投影就是 NaN.
    pub fn mip(&self) -> Array3<f64> {
        self.data.map_axis(Axis(3), |tac| {
            tac.iter().copied().fold(f64::NEG_INFINITY, |acc, v| {
                if acc.is_nan() || v.is_nan() {
                    f64::NAN
                } else {
                    acc.max(v)
                }
            })
        })
    }

    /// 获得最大强度投影不低于 `min_count` 的体素掩膜.
    #[inline]
    pub fn count_mask(&self, min_count: f64) -> VoxelMask {
        VoxelMask::from_mip(self.mip().view(), min_count)
    }
}

impl<'a> From<(ArrayView4<'a, f64>, VoxelSpacing)> for DynamicScan<'a> {
    #[inline]
    fn from((data, spacing): (ArrayView4<'a, f64>, VoxelSpacing)) -> Self {
        Self::new(data, spacing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    #[test]
    fn test_spacing_invalid_input() {
        assert!(VoxelSpacing::new([1.0, 0.0, 1.0]).is_err());
        assert!(VoxelSpacing::new([1.0, 2.0, -1.0]).is_err());
        assert!(VoxelSpacing::new([f64::NAN, 2.0, 1.0]).is_err());
        assert!(VoxelSpacing::new([2.0, 2.0, 3.0]).is_ok());
        assert_eq!(VoxelSpacing::isotropic(1.5).unwrap().get(), [1.5; 3]);
    }

    #[test]
    fn test_mip_and_count_mask() {
        let mut data = Array4::<f64>::zeros((2, 2, 1, 3));
        data[[0, 0, 0, 1]] = 5.0;
        data[[0, 1, 0, 2]] = 0.5;
        data[[1, 0, 0, 0]] = 3.0;
        data[[1, 0, 0, 1]] = f64::NAN;
        data[[1, 1, 0, 2]] = 1.0;
        let scan = DynamicScan::new(data.view(), VoxelSpacing::isotropic(1.0).unwrap());

        let mip = scan.mip();
        assert_eq!(mip[[0, 0, 0]], 5.0);
        assert_eq!(mip[[0, 1, 0]], 0.5);
        assert!(mip[[1, 0, 0]].is_nan());
        assert_eq!(mip[[1, 1, 0]], 1.0);

        let mask = scan.count_mask(1.0);
        assert_eq!(mask.positions(), vec![(0, 0, 0), (1, 1, 0)]);
    }

    #[test]
    fn test_check_schedule() {
        let data = Array4::<f64>::zeros((1, 1, 1, 2));
        let scan = DynamicScan::new(data.view(), VoxelSpacing::isotropic(1.0).unwrap());
        let ok = FrameSchedule::new(vec![0.0, 1.0], vec![1.0, 2.0]).unwrap();
        let bad = FrameSchedule::new(vec![0.0], vec![1.0]).unwrap();
        assert!(scan.check_schedule(&ok).is_ok());
        assert!(matches!(
            scan.check_schedule(&bad),
            Err(InputError::LengthMismatch { expected: 2, actual: 1, .. })
        ));
    }
}
