//! 程序运行函数.

use crate::result::{AblationResult, Profile};
use pet_berry::synthetic::Phantom;
use pet_berry::{Srtm2, SrtmConfig, VoxelSpacing};
use std::thread;
use std::time::Instant;

/// 体模形状.
const SHAPE: (usize, usize, usize) = (24, 24, 16);

/// 噪声水平.
const NOISE: f64 = 0.5;

/// 参与比较的平滑核半高宽 (mm).
const FWHMS: [f64; 4] = [2.0, 4.0, 6.0, 8.0];

/// 在体模上运行一次完整流水线, 统计两个阶段的 R1 误差.
fn profile(phantom: &Phantom, fwhm: f64) -> Profile {
    let spacing = VoxelSpacing::isotropic(2.0).unwrap();
    let scan = phantom.scan(spacing);
    let tissue = phantom.tissue_mask();
    let truth = |pos| phantom.params(pos).map_or(0.0, |p| p.r1);

    let start = Instant::now();
    let maps = Srtm2::new(SrtmConfig::new(fwhm))
        .run(&scan, phantom.schedule(), &phantom.reference_mask())
        .expect("Invalid ablation input");
    let elapsed = start.elapsed();

    let ok = tissue
        .intersect(maps.mask())
        .expect("Mask shape mismatch");
    Profile {
        fwhm,
        wlr: utils::mean_abs_error(maps.r1_wlr(), &ok, truth),
        lrsc: utils::mean_abs_error(maps.r1_lrsc(), &ok, truth),
        failed: maps.failures().failed_mask().count(),
        elapsed,
    }
}

/// 同时运行的线程数, 不超过可用核心数与参与比较的配置数.
fn worker_count(cpus: usize) -> usize {
    cpus.clamp(1, FWHMS.len())
}

/// 实际运行. 每批最多同时运行 `worker_count` 个线程.
pub fn run() -> AblationResult {
    let phantom = utils::noisy_phantom(SHAPE, NOISE, 2003).expect("Phantom building error");
    let workers = worker_count(utils::cpus());
    println!("Running ablation studies on {workers} threads...");

    let p = &phantom;
    let mut profiles = Vec::with_capacity(FWHMS.len());
    for batch in FWHMS.chunks(workers) {
        thread::scope(|s| {
            let handles: Vec<_> = batch
                .iter()
                .map(|&fwhm| s.spawn(move || profile(p, fwhm)))
                .collect();
            profiles.extend(
                handles
                    .into_iter()
                    .map(|th| th.join().expect("Thread joining error")),
            );
        });
    }
    AblationResult::from_iter(profiles)
}

#[cfg(test)]
mod tests {
    use super::{worker_count, FWHMS};

    #[test]
    fn test_worker_count() {
        assert_eq!(worker_count(0), 1);
        assert_eq!(worker_count(1), 1);
        assert_eq!(worker_count(64), FWHMS.len());
        // 每批线程数即为打印出的线程数.
        let batches: Vec<usize> = FWHMS.chunks(worker_count(3)).map(|b| b.len()).collect();
        assert_eq!(batches, vec![3, 1]);
    }
}
