//! 第二阶段: 带空间约束的岭回归 (LRSC).

use ndarray::{Array4, ArrayView4};

use super::map_voxels;
use super::model::{Kinetics, Regression};
use super::prior::{Priors, SpatialPriors};
use crate::consts::NUM_COEFFS;
use crate::{Idx3d, VoxelError};

/// 一种回归的岭回归系数图.
#[derive(Debug, Clone)]
pub struct RidgeMaps {
    coef: Array4<f64>,
    failures: Vec<VoxelError>,
}

impl RidgeMaps {
    fn estimate(kin: &Kinetics, reg: Regression, priors: &Priors, positions: &[Idx3d]) -> Self {
        let results = map_voxels(positions, |pos| {
            let (hh, b_sc) = priors.at(pos);
            kin.fit_ridge(reg, pos, &hh, &b_sc)
        });

        let mut coef = Array4::zeros(priors.b_sc().raw_dim());
        let mut failures = Vec::new();
        for (&(x, y, z), r) in positions.iter().zip(results) {
            match r {
                Ok(b) => {
                    for (c, v) in b.iter().enumerate() {
                        coef[[x, y, z, c]] = *v;
                    }
                }
                Err(e) => failures.push(((x, y, z), e)),
            }
        }
        Self { coef, failures }
    }

    /// 系数图 `(x, y, z, 3)`.
    #[inline]
    pub fn coef(&self) -> ArrayView4<'_, f64> {
        self.coef.view()
    }

    /// 求解失败的体素及原因.
    #[inline]
    pub fn failures(&self) -> &[VoxelError] {
        &self.failures
    }

    /// 体素 `pos` 处的系数.
    pub fn at(&self, (x, y, z): Idx3d) -> [f64; NUM_COEFFS] {
        std::array::from_fn(|c| self.coef[[x, y, z, c]])
    }

    pub(crate) fn into_parts(self) -> (Array4<f64>, Vec<VoxelError>) {
        (self.coef, self.failures)
    }
}

/// 第二阶段的输出.
#[derive(Debug, Clone)]
pub struct Stage2 {
    r1: RidgeMaps,
    dvr: Option<RidgeMaps>,
}

impl Stage2 {
    /// 在 `positions` 的每个体素上, 以 `priors` 为先验做岭回归.
    pub(crate) fn estimate(kin: &Kinetics, priors: &SpatialPriors, positions: &[Idx3d]) -> Self {
        let r1 = RidgeMaps::estimate(kin, Regression::R1, priors.r1(), positions);
        let dvr = priors
            .dvr()
            .map(|p| RidgeMaps::estimate(kin, Regression::Dvr, p, positions));
        Self { r1, dvr }
    }

    /// R1 回归的岭回归结果 `B1_lrsc`.
    #[inline]
    pub fn r1(&self) -> &RidgeMaps {
        &self.r1
    }

    /// DVR 回归的岭回归结果 `B0_lrsc`.
    #[inline]
    pub fn dvr(&self) -> Option<&RidgeMaps> {
        self.dvr.as_ref()
    }

    pub(crate) fn into_parts(self) -> (RidgeMaps, Option<RidgeMaps>) {
        (self.r1, self.dvr)
    }
}
