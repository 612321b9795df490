//! 第一阶段: 逐体素加权线性回归 (WLR).

use ndarray::{Array3, Array4, ArrayView3, ArrayView4};

use super::map_voxels;
use super::model::{Kinetics, Regression};
use crate::consts::NUM_COEFFS;
use crate::fitting::Fit;
use crate::{FitResult, Idx3d, VoxelError};

/// 一种回归在整个体积上的估计结果.
#[derive(Debug, Clone)]
pub struct CoefMaps {
    coef: Array4<f64>,
    var: Array3<f64>,
    fitted: Array3<bool>,
    failures: Vec<VoxelError>,
}

impl CoefMaps {
    /// 全零初始化.
    fn zeros((x, y, z): Idx3d) -> Self {
        Self {
            coef: Array4::zeros((x, y, z, NUM_COEFFS)),
            var: Array3::zeros((x, y, z)),
            fitted: Array3::from_elem((x, y, z), false),
            failures: Vec::new(),
        }
    }

    /// 写入单个体素的结果.
    fn scatter(&mut self, pos: Idx3d, r: FitResult<Fit>) {
        match r {
            Ok(fit) => {
                let (x, y, z) = pos;
                for (c, v) in fit.coef.iter().enumerate() {
                    self.coef[[x, y, z, c]] = *v;
                }
                self.var[pos] = fit.var;
                self.fitted[pos] = true;
            }
            Err(e) => self.failures.push((pos, e)),
        }
    }

    /// 系数图 `(x, y, z, 3)`.
    #[inline]
    pub fn coef(&self) -> ArrayView4<'_, f64> {
        self.coef.view()
    }

    /// 残差方差图.
    #[inline]
    pub fn var(&self) -> ArrayView3<'_, f64> {
        self.var.view()
    }

    /// 成功拟合的体素.
    #[inline]
    pub fn fitted(&self) -> ArrayView3<'_, bool> {
        self.fitted.view()
    }

    /// 拟合失败的体素及原因, 按体素索引行优先排列.
    #[inline]
    pub fn failures(&self) -> &[VoxelError] {
        &self.failures
    }

    pub(crate) fn into_parts(self) -> (Array4<f64>, Array3<f64>, Vec<VoxelError>) {
        (self.coef, self.var, self.failures)
    }
}

/// 第一阶段的输出: DVR 回归 (`B0`) 与 R1 回归 (`B1`).
///
/// 只能由流水线在整个体积上完成 WLR 后得到.
#[derive(Debug, Clone)]
pub struct Stage1 {
    dvr: CoefMaps,
    r1: CoefMaps,
}

impl Stage1 {
    /// 对 `positions` 中每个体素做两种回归.
    pub(crate) fn estimate(kin: &Kinetics, shape: Idx3d, positions: &[Idx3d]) -> Self {
        let results = map_voxels(positions, |pos| {
            (
                kin.fit(Regression::Dvr, pos),
                kin.fit(Regression::R1, pos),
            )
        });

        let mut dvr = CoefMaps::zeros(shape);
        let mut r1 = CoefMaps::zeros(shape);
        for (pos, (b0, b1)) in positions.iter().zip(results) {
            dvr.scatter(*pos, b0);
            r1.scatter(*pos, b1);
        }
        Self { dvr, r1 }
    }

    /// DVR 回归结果 `B0`, `varB0`.
    #[inline]
    pub fn dvr(&self) -> &CoefMaps {
        &self.dvr
    }

    /// R1 回归结果 `B1`, `varB1`.
    #[inline]
    pub fn r1(&self) -> &CoefMaps {
        &self.r1
    }

    pub(crate) fn into_parts(self) -> (CoefMaps, CoefMaps) {
        (self.dvr, self.r1)
    }
}
