//! 三维高斯平滑.
//!
//! 滤波器与 `scipy.ndimage.gaussian_filter(order=0, truncate=4.0)` 的行为一致:
//! 按轴依次做一维相关, 边界使用半采样对称延拓 (`d c b a | a b c d | d c b a`).

use ndarray::{Array3, Array4, ArrayView1, ArrayView3, ArrayView4, ArrayViewMut1, Axis, Zip};

use crate::consts::{FWHM_PER_SIGMA, GAUSSIAN_TRUNCATE};
use crate::{InputError, InputResult, VoxelSpacing};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
    }
}

/// 把物理单位的半高全宽 `fwhm` 换算为各轴以体素为单位的高斯 sigma.
///
/// `sigma[axis] = fwhm / (2 * sqrt(2 * ln 2)) / spacing[axis]`.
///
/// `fwhm` 不为正或不是有限值时, 返回 `Err(InputError::InvalidFwhm)`.
pub fn fwhm_to_sigma(fwhm: f64, spacing: VoxelSpacing) -> InputResult<[f64; 3]> {
    if !(fwhm.is_finite() && fwhm > 0.0) {
        return Err(InputError::InvalidFwhm(fwhm));
    }
    let sigma_mm = fwhm / FWHM_PER_SIGMA;
    Ok(spacing.get().map(|s| sigma_mm / s))
}

/// 截断半径 `floor(4 * sigma + 0.5)`.
#[inline]
pub fn kernel_radius(sigma: f64) -> usize {
    (GAUSSIAN_TRUNCATE * sigma + 0.5) as usize
}

/// 归一化的一维高斯核, 长度为 `2 * radius + 1`.
///
/// `sigma` 必须为正.
pub fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    debug_assert!(sigma > 0.0);
    let r = kernel_radius(sigma) as isize;
    let denom = -0.5 / (sigma * sigma);
    let mut kernel: Vec<f64> = (-r..=r).map(|x| (denom * (x * x) as f64).exp()).collect();
    let sum: f64 = kernel.iter().sum();
    kernel.iter_mut().for_each(|w| *w /= sum);
    kernel
}

/// 半采样对称延拓下, 任意整数下标 `i` 在长度为 `n` 的轴上对应的位置.
#[inline]
fn reflect(i: isize, n: usize) -> usize {
    let period = 2 * n as isize;
    let m = i.rem_euclid(period) as usize;
    if m >= n {
        2 * n - 1 - m
    } else {
        m
    }
}

/// 一维相关 `out[i] = Σ_k kernel[k] * src[reflect(i + k - r)]`.
fn correlate1d(src: ArrayView1<f64>, kernel: &[f64], mut out: ArrayViewMut1<f64>) {
    let n = src.len();
    let r = (kernel.len() / 2) as isize;
    for (i, o) in out.iter_mut().enumerate() {
        let base = i as isize - r;
        *o = kernel
            .iter()
            .enumerate()
            .map(|(k, w)| w * src[reflect(base + k as isize, n)])
            .sum();
    }
}

/// 对三维数组做可分离高斯滤波, `sigma` 以体素为单位, 依次对应三个轴.
///
/// `sigma` 为 0 的轴保持不变. 结果是确定性的.
pub fn gaussian_filter(volume: ArrayView3<f64>, sigma: [f64; 3]) -> Array3<f64> {
    debug_assert!(sigma.iter().all(|s| s.is_finite() && *s >= 0.0));

    let mut cur = volume.to_owned();
    if cur.is_empty() {
        return cur;
    }
    let mut out = Array3::zeros(cur.raw_dim());
    for (ax, s) in sigma.iter().enumerate() {
        if *s == 0.0 {
            continue;
        }
        let kernel = gaussian_kernel(*s);
        Zip::from(out.lanes_mut(Axis(ax)))
            .and(cur.lanes(Axis(ax)))
            .for_each(|o, v| correlate1d(v, &kernel, o));
        std::mem::swap(&mut cur, &mut out);
    }
    cur
}

/// 对四维数组沿第 4 维 (帧或系数通道) 的每一个三维切片独立做 [`gaussian_filter`].
///
/// 启用 `rayon` feature 时, 各切片并行处理.
pub fn smooth_channels(volume: ArrayView4<f64>, sigma: [f64; 3]) -> Array4<f64> {
    let mut out = Array4::zeros(volume.raw_dim());

    cfg_if::cfg_if! {
        if #[cfg(feature = "rayon")] {
            out.axis_iter_mut(Axis(3))
                .into_par_iter()
                .zip(volume.axis_iter(Axis(3)).into_par_iter())
                .for_each(|(mut o, v)| o.assign(&gaussian_filter(v, sigma)));
        } else {
            out.axis_iter_mut(Axis(3))
                .zip(volume.axis_iter(Axis(3)))
                .for_each(|(mut o, v)| o.assign(&gaussian_filter(v, sigma)));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr1, Array1};

    #[test]
    fn test_fwhm_to_sigma() {
        let spacing = VoxelSpacing::new([2.0, 2.0, 4.0]).unwrap();
        let s = fwhm_to_sigma(FWHM_PER_SIGMA * 4.0, spacing).unwrap();
        assert_abs_diff_eq!(s[0], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(s[1], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(s[2], 1.0, epsilon = 1e-12);

        assert_eq!(fwhm_to_sigma(0.0, spacing), Err(InputError::InvalidFwhm(0.0)));
        assert_eq!(fwhm_to_sigma(-1.0, spacing), Err(InputError::InvalidFwhm(-1.0)));
        assert!(fwhm_to_sigma(f64::NAN, spacing).is_err());
    }

    #[test]
    fn test_kernel() {
        assert_eq!(kernel_radius(1.0), 4);
        assert_eq!(kernel_radius(0.1), 0);
        assert_eq!(kernel_radius(0.9), 4);
        let k = gaussian_kernel(1.5);
        assert_eq!(k.len(), 2 * 6 + 1);
        assert_abs_diff_eq!(k.iter().sum::<f64>(), 1.0, epsilon = 1e-15);
        for i in 0..k.len() / 2 {
            assert_eq!(k[i], k[k.len() - 1 - i]);
        }
    }

    #[test]
    fn test_reflect() {
        let idx: Vec<usize> = (-5..9).map(|i| reflect(i, 4)).collect();
        assert_eq!(idx, vec![3, 3, 2, 1, 0, 0, 1, 2, 3, 3, 2, 1, 0, 0]);
        assert_eq!(reflect(-3, 1), 0);
    }

    #[test]
    fn test_correlate1d_boundary() {
        // 核 [0.25, 0.5, 0.25], 边界处延拓值等于端点值.
        let src = arr1(&[4.0, 0.0, 0.0, 8.0]);
        let mut out = Array1::zeros(4);
        correlate1d(src.view(), &[0.25, 0.5, 0.25], out.view_mut());
        assert_eq!(out.to_vec(), vec![3.0, 1.0, 2.0, 6.0]);
    }

    #[test]
    fn test_constant_volume_is_preserved() {
        let v = Array3::from_elem((5, 3, 4), 2.5);
        let out = gaussian_filter(v.view(), [1.2, 0.7, 3.0]);
        for x in out.iter() {
            assert_abs_diff_eq!(*x, 2.5, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_mass_is_preserved() {
        let mut v = Array3::zeros((6, 5, 4));
        v[[0, 2, 3]] = 10.0;
        v[[3, 1, 1]] = -4.0;
        let out = gaussian_filter(v.view(), [2.0, 1.0, 0.5]);
        assert_abs_diff_eq!(out.sum(), 6.0, epsilon = 1e-12);
        // 单个脉冲会被扩散到邻居.
        assert!(out[[1, 2, 3]] > 0.0);
    }

    #[test]
    fn test_zero_sigma_is_identity() {
        let v = Array3::from_shape_fn((3, 4, 2), |(x, y, z)| (x * 8 + y * 2 + z) as f64);
        assert_eq!(gaussian_filter(v.view(), [0.0; 3]), v);

        // 只平滑第 1 轴时, 沿其余轴的切片互不影响.
        let out = gaussian_filter(v.view(), [0.0, 1.0, 0.0]);
        let alone = gaussian_filter(
            v.slice(ndarray::s![1..2, .., 1..2]),
            [0.0, 1.0, 0.0],
        );
        assert_eq!(out.slice(ndarray::s![1..2, .., 1..2]), alone);
    }

    #[test]
    fn test_smooth_channels() {
        let v = Array4::from_shape_fn((4, 4, 3, 3), |(x, y, z, c)| {
            ((x + 2 * y + 3 * z) * (c + 1)) as f64
        });
        let sigma = [1.0, 0.5, 0.8];
        let out = smooth_channels(v.view(), sigma);
        for c in 0..3 {
            let expected = gaussian_filter(v.index_axis(Axis(3), c), sigma);
            assert_eq!(out.index_axis(Axis(3), c), expected);
        }
    }
}
