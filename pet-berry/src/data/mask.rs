//! 体素掩膜.

use std::ops::Index;

use ndarray::{Array3, ArrayView3};

use crate::{Idx3d, InputError, InputResult};

/// 三维布尔体素掩膜. `true` 代表需要处理的体素.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelMask {
    data: Array3<bool>,
}

impl Index<Idx3d> for VoxelMask {
    type Output = bool;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl From<Array3<bool>> for VoxelMask {
    #[inline]
    fn from(data: Array3<bool>) -> Self {
        Self { data }
    }
}

impl VoxelMask {
    /// 直接从布尔数组创建.
    #[inline]
    pub fn new(data: Array3<bool>) -> Self {
        Self { data }
    }

    /// 最大强度投影 `mip` 不低于 `min_count` 的体素记为 `true`.
    /// NaN 总是记为 `false`.
    pub fn from_mip(mip: ArrayView3<f64>, min_count: f64) -> Self {
        Self {
            data: mip.mapv(|v| v >= min_count),
        }
    }

    /// 获取数据形状大小.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.data.dim()
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, bool> {
        self.data.view()
    }

    /// 消费自我, 获得底层数据.
    #[inline]
    pub fn into_inner(self) -> Array3<bool> {
        self.data
    }

    /// 获取 `true` 体素的个数.
    #[inline]
    pub fn count(&self) -> usize {
        self.data.iter().filter(|p| **p).count()
    }

    /// 是否没有任何 `true` 体素?
    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.data.iter().any(|p| *p)
    }

    /// 获取给定位置的值. 越界时返回 `None`.
    #[inline]
    pub fn get(&self, pos: Idx3d) -> Option<bool> {
        self.data.get(pos).copied()
    }

    /// 收集所有 `true` 体素对应的下标, 结果按行优先存储.
    ///
    /// 逐体素估计算法只在该索引列表上迭代.
    pub fn positions(&self) -> Vec<Idx3d> {
        self.data
            .indexed_iter()
            .filter_map(|(pos, p)| (*p).then_some(pos))
            .collect()
    }

    /// 两个掩膜的交集. 形状不一致时返回 `Err`.
    pub fn intersect(&self, other: &Self) -> InputResult<Self> {
        self.check_shape("mask intersection", other.shape())?;
        let mut data = self.data.clone();
        data.zip_mut_with(&other.data, |a, b| *a &= *b);
        Ok(Self { data })
    }

    /// 检查形状是否为 `shape`.
    pub(crate) fn check_shape(&self, what: &'static str, shape: Idx3d) -> InputResult<()> {
        if self.shape() == shape {
            Ok(())
        } else {
            let (x, y, z) = self.shape();
            let (a, b, c) = shape;
            Err(InputError::ShapeMismatch {
                what,
                expected: vec![a, b, c],
                actual: vec![x, y, z],
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::VoxelMask;
    use ndarray::{arr3, Array3};

    #[test]
    fn test_positions_row_major() {
        let mask = VoxelMask::new(arr3(&[
            [[true, false], [false, true]],
            [[false, true], [false, false]],
        ]));
        assert_eq!(mask.count(), 3);
        assert!(!mask.is_empty());
        assert_eq!(mask.positions(), vec![(0, 0, 0), (0, 1, 1), (1, 0, 1)]);
        assert_eq!(mask.get((1, 0, 1)), Some(true));
        assert_eq!(mask.get((2, 0, 0)), None);
    }

    #[test]
    fn test_empty_and_intersect() {
        let a = VoxelMask::new(Array3::from_elem((2, 2, 2), true));
        let b = VoxelMask::new(Array3::from_elem((2, 2, 2), false));
        assert!(b.is_empty());
        assert!(a.intersect(&b).unwrap().is_empty());
        assert_eq!(a.intersect(&a).unwrap().count(), 8);

        let c = VoxelMask::new(Array3::from_elem((2, 2, 1), true));
        assert!(a.intersect(&c).is_err());
    }
}
