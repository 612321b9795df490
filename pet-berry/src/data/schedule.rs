//! 帧时间表.

use itertools::izip;
use ndarray::Array1;

use crate::{InputError, InputResult};

/// 动态扫描的帧时间表, 由每帧的 `(开始时间, 结束时间)` 组成.
///
/// 时间单位需要前后一致 (一般为分钟). 初始化时保证:
///
/// 1. 每帧持续时间严格为正;
/// 2. 帧开始时间严格递增, 且相邻帧不重叠.
///
/// 该结构是只读的.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSchedule {
    start: Vec<f64>,
    end: Vec<f64>,
}

impl FrameSchedule {
    /// 以每帧开始时间 `start` 和结束时间 `end` 构建时间表.
    ///
    /// # 返回值
    ///
    /// - 两者长度不一致时, 返回 `Err(InputError::LengthMismatch)`;
    /// - 为空时, 返回 `Err(InputError::TooFewSamples)`;
    /// - 某帧持续时间不为正 (或不是有限值) 时, 返回 `Err(InputError::NonPositiveDuration)`;
    /// - 开始时间不严格递增时, 返回 `Err(InputError::NonMonotonicTime)`;
    /// - 相邻帧重叠时, 返回 `Err(InputError::OverlappingFrames)`;
    /// - 其他情况下成功.
    pub fn new(start: Vec<f64>, end: Vec<f64>) -> InputResult<Self> {
        if start.len() != end.len() {
            return Err(InputError::LengthMismatch {
                what: "frame end times",
                expected: start.len(),
                actual: end.len(),
            });
        }
        if start.is_empty() {
            return Err(InputError::TooFewSamples(0, 1));
        }
        for (i, (s, e)) in start.iter().zip(end.iter()).enumerate() {
            let d = e - s;
            if !s.is_finite() || !d.is_finite() || d <= 0.0 {
                return Err(InputError::NonPositiveDuration(i));
            }
        }
        for (i, (s0, s1, e0)) in izip!(&start, &start[1..], &end).enumerate() {
            if s1 <= s0 {
                return Err(InputError::NonMonotonicTime(i + 1));
            }
            if s1 < e0 {
                return Err(InputError::OverlappingFrames(i));
            }
        }
        Ok(Self { start, end })
    }

    /// 以每帧持续时间 `durations` 和结束时间 (即扫描开始后经过的时间) `ends` 构建时间表.
    ///
    /// 帧时间表格通常以这种方式记录, 开始时间为 `end - duration`.
    pub fn from_durations_and_ends(durations: &[f64], ends: &[f64]) -> InputResult<Self> {
        if durations.len() != ends.len() {
            return Err(InputError::LengthMismatch {
                what: "frame durations",
                expected: ends.len(),
                actual: durations.len(),
            });
        }
        let start = izip!(durations, ends).map(|(d, e)| e - d).collect();
        Self::new(start, ends.to_vec())
    }

    /// 帧数.
    #[inline]
    pub fn len(&self) -> usize {
        self.start.len()
    }

    /// 时间表是否为空? 由构造保证, 总是返回 `false`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start.is_empty()
    }

    /// 每帧开始时间.
    #[inline]
    pub fn start(&self) -> &[f64] {
        self.start.as_slice()
    }

    /// 每帧结束时间.
    #[inline]
    pub fn end(&self) -> &[f64] {
        self.end.as_slice()
    }

    /// 第一帧开始时间.
    #[inline]
    pub fn start_time(&self) -> f64 {
        self.start[0]
    }

    /// 最后一帧结束时间.
    #[inline]
    pub fn end_time(&self) -> f64 {
        self.end[self.len() - 1]
    }

    /// 每帧持续时间 `end - start`. 回归中的权重矩阵对角线即为该值.
    pub fn durations(&self) -> Array1<f64> {
        izip!(&self.start, &self.end).map(|(s, e)| e - s).collect()
    }

    /// 每帧中点时间 `(start + end) / 2`.
    pub fn mid_times(&self) -> Array1<f64> {
        izip!(&self.start, &self.end)
            .map(|(s, e)| (s + e) / 2.0)
            .collect()
    }
}
