//! 消融实验依赖的通用组件.

use ndarray::{ArrayView3, Axis, Zip};
use pet_berry::synthetic::{self, Phantom, SrtmParams};
use pet_berry::{InputResult, VoxelMask};
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

const SEP: &str = "--------------------------------------------------------";

/// 简单分隔线.
#[inline]
pub fn sep() {
    println!("{SEP}");
}

/// 获得可并行核心数.
pub fn cpus() -> usize {
    std::thread::available_parallelism().map_or_else(|_| num_cpus::get(), usize::from)
}

/// 组织区域 A 的参数.
pub const REGION_A: SrtmParams = SrtmParams::new(1.0, 1.5, 0.3);

/// 组织区域 B 的参数.
pub const REGION_B: SrtmParams = SrtmParams::new(0.7, 2.0, 0.4);

/// 创建双组织区域体模, 并加上高斯噪声.
///
/// `z < 4` 为参考区域; 其余体素中 `x` 在前一半的属于区域 A, 后一半属于区域 B.
/// 第 `f` 帧的噪声标准差为 `level * sqrt(max(v, 0) / duration[f])`.
/// 相同的 `seed` 总是得到相同的体模.
pub fn noisy_phantom(shape: (usize, usize, usize), level: f64, seed: u64) -> InputResult<Phantom> {
    let half = shape.0 / 2;
    let mut phantom = Phantom::from_fn(
        shape,
        synthetic::scenario_schedule()?,
        synthetic::scenario_reference().view(),
        |(x, _, z)| match (z < 4, x < half) {
            (true, _) => None,
            (false, true) => Some(REGION_A),
            (false, false) => Some(REGION_B),
        },
    )?;

    let durations = phantom.schedule().durations();
    let mut rng = StdRng::seed_from_u64(seed);
    for (mut frame, d) in phantom
        .data_mut()
        .axis_iter_mut(Axis(3))
        .zip(durations.iter())
    {
        frame.map_inplace(|v| {
            let sd = level * (v.max(0.0) / d).sqrt();
            let z: f64 = StandardNormal.sample(&mut rng);
            *v += sd * z;
        });
    }
    Ok(phantom)
}

/// `estimate` 与真实参数 `truth` 在 `mask` 上的平均绝对误差. `mask` 为空时返回 `None`.
pub fn mean_abs_error<F>(estimate: ArrayView3<f64>, mask: &VoxelMask, truth: F) -> Option<f64>
where
    F: Fn((usize, usize, usize)) -> f64,
{
    let mut acc = 0.0;
    let mut count = 0usize;
    Zip::indexed(estimate)
        .and(mask.data())
        .for_each(|pos, v, m| {
            if *m {
                acc += (v - truth(pos)).abs();
                count += 1;
            }
        });
    (count != 0).then(|| acc / count as f64)
}
