//! 运行结果.

use ndarray::{Array3, Array4, ArrayView3, ArrayView4, Axis};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::consts::coeff;
use crate::{Idx3d, VoxelError, VoxelMask};

/// 各阶段逐体素数值失败的汇总.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VoxelFailures {
    shape: Idx3d,
    stage1_dvr: Vec<VoxelError>,
    stage1_r1: Vec<VoxelError>,
    stage2_r1: Vec<VoxelError>,
    stage2_dvr: Vec<VoxelError>,
}

impl VoxelFailures {
    pub(crate) fn new(
        shape: Idx3d,
        stage1_dvr: Vec<VoxelError>,
        stage1_r1: Vec<VoxelError>,
        stage2_r1: Vec<VoxelError>,
        stage2_dvr: Vec<VoxelError>,
    ) -> Self {
        Self {
            shape,
            stage1_dvr,
            stage1_r1,
            stage2_r1,
            stage2_dvr,
        }
    }

    /// 第一阶段 DVR 回归失败的体素.
    #[inline]
    pub fn stage1_dvr(&self) -> &[VoxelError] {
        &self.stage1_dvr
    }

    /// 第一阶段 R1 回归失败的体素.
    #[inline]
    pub fn stage1_r1(&self) -> &[VoxelError] {
        &self.stage1_r1
    }

    /// 第二阶段 R1 岭回归失败的体素.
    #[inline]
    pub fn stage2_r1(&self) -> &[VoxelError] {
        &self.stage2_r1
    }

    /// 第二阶段 DVR 岭回归失败的体素. 未开启 DVR 正则化时总为空.
    #[inline]
    pub fn stage2_dvr(&self) -> &[VoxelError] {
        &self.stage2_dvr
    }

    /// 失败记录总数. 同一体素在不同回归中失败会被分别计数.
    pub fn total(&self) -> usize {
        self.stage1_dvr.len() + self.stage1_r1.len() + self.stage2_r1.len() + self.stage2_dvr.len()
    }

    /// 是否没有任何失败?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// 至少在一个回归中失败的体素.
    pub fn failed_mask(&self) -> VoxelMask {
        let mut m = Array3::from_elem(self.shape, false);
        for (pos, _) in self
            .stage1_dvr
            .iter()
            .chain(self.stage1_r1.iter())
            .chain(self.stage2_r1.iter())
            .chain(self.stage2_dvr.iter())
        {
            m[*pos] = true;
        }
        VoxelMask::new(m)
    }
}

/// `Srtm2` 的全部输出. 所有图在掩膜外都为 0.
#[derive(Debug, Clone)]
pub struct SrtmMaps {
    pub(crate) mask: VoxelMask,
    pub(crate) b0_wlr: Array4<f64>,
    pub(crate) var_b0: Array3<f64>,
    pub(crate) b1_wlr: Array4<f64>,
    pub(crate) var_b1: Array3<f64>,
    pub(crate) b1_sc: Array4<f64>,
    pub(crate) hh1: Array4<f64>,
    pub(crate) b1_lrsc: Array4<f64>,
    pub(crate) b0_lrsc: Option<Array4<f64>>,
    pub(crate) failures: VoxelFailures,
}

impl SrtmMaps {
    /// 第一阶段 DVR 图.
    #[inline]
    pub fn dvr_wlr(&self) -> ArrayView3<'_, f64> {
        self.b0_wlr.index_axis(Axis(3), coeff::DVR)
    }

    /// 第一阶段 R1 图.
    #[inline]
    pub fn r1_wlr(&self) -> ArrayView3<'_, f64> {
        self.b1_wlr.index_axis(Axis(3), coeff::R1)
    }

    /// 第一阶段 k2 图.
    #[inline]
    pub fn k2_wlr(&self) -> ArrayView3<'_, f64> {
        self.b1_wlr.index_axis(Axis(3), coeff::K2)
    }

    /// 第一阶段 k2a 图.
    #[inline]
    pub fn k2a_wlr(&self) -> ArrayView3<'_, f64> {
        self.b1_wlr.index_axis(Axis(3), coeff::K2A)
    }

    /// 第二阶段 R1 图.
    #[inline]
    pub fn r1_lrsc(&self) -> ArrayView3<'_, f64> {
        self.b1_lrsc.index_axis(Axis(3), coeff::R1)
    }

    /// 第二阶段 k2 图.
    #[inline]
    pub fn k2_lrsc(&self) -> ArrayView3<'_, f64> {
        self.b1_lrsc.index_axis(Axis(3), coeff::K2)
    }

    /// 第二阶段 DVR 图. 只在开启 DVR 正则化时存在.
    #[inline]
    pub fn dvr_lrsc(&self) -> Option<ArrayView3<'_, f64>> {
        self.b0_lrsc
            .as_ref()
            .map(|b| b.index_axis(Axis(3), coeff::DVR))
    }

    /// DVR 回归系数 `B0`.
    #[inline]
    pub fn b0_wlr(&self) -> ArrayView4<'_, f64> {
        self.b0_wlr.view()
    }

    /// R1 回归系数 `B1`.
    #[inline]
    pub fn b1_wlr(&self) -> ArrayView4<'_, f64> {
        self.b1_wlr.view()
    }

    /// DVR 回归残差方差.
    #[inline]
    pub fn var_b0(&self) -> ArrayView3<'_, f64> {
        self.var_b0.view()
    }

    /// R1 回归残差方差.
    #[inline]
    pub fn var_b1(&self) -> ArrayView3<'_, f64> {
        self.var_b1.view()
    }

    /// 平滑后的 R1 回归系数 `B1_sc`.
    #[inline]
    pub fn b1_sc(&self) -> ArrayView4<'_, f64> {
        self.b1_sc.view()
    }

    /// 平滑后的 R1 回归惩罚 `HH1`.
    #[inline]
    pub fn hh1(&self) -> ArrayView4<'_, f64> {
        self.hh1.view()
    }

    /// 第二阶段 R1 回归系数 `B1_lrsc`.
    #[inline]
    pub fn b1_lrsc(&self) -> ArrayView4<'_, f64> {
        self.b1_lrsc.view()
    }

    /// 第二阶段 DVR 回归系数 `B0_lrsc`.
    #[inline]
    pub fn b0_lrsc(&self) -> Option<ArrayView4<'_, f64>> {
        self.b0_lrsc.as_ref().map(|b| b.view())
    }

    /// 参与估计的体素.
    #[inline]
    pub fn mask(&self) -> &VoxelMask {
        &self.mask
    }

    /// 逐体素失败汇总.
    #[inline]
    pub fn failures(&self) -> &VoxelFailures {
        &self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::VoxelFailures;
    use crate::NumericalError;

    #[test]
    fn test_failures() {
        let f = VoxelFailures::new((2, 2, 1), vec![], vec![], vec![], vec![]);
        assert!(f.is_empty());
        assert!(f.failed_mask().is_empty());

        let e = NumericalError::DegenerateCurve;
        let f = VoxelFailures::new(
            (2, 2, 1),
            vec![((0, 1, 0), e)],
            vec![((0, 1, 0), e)],
            vec![((1, 1, 0), NumericalError::NonFinite)],
            vec![],
        );
        assert_eq!(f.total(), 3);
        assert!(!f.is_empty());
        assert_eq!(f.failed_mask().positions(), vec![(0, 1, 0), (1, 1, 0)]);
    }
}
