//! 时间积分.
//!
//! 对时间-活度曲线做累积梯形积分, 并假设信号在第一帧之前从 0 时刻的 0
//! 线性上升到第一帧的值: 这段直角三角形的面积 `t[0] * value[0] / 2`
//! 会被加到每一个积分值上.

use ndarray::{Array1, Array4, ArrayView1, ArrayView4, ArrayViewMut1, Axis, Zip};

use crate::{InputError, InputResult};

/// 检查时间轴: 至少两个点, 严格递增, 全部为有限值.
pub fn check_time_axis(t: ArrayView1<f64>) -> InputResult<()> {
    if t.len() < 2 {
        return Err(InputError::TooFewSamples(t.len(), 2));
    }
    if let Some(i) = t.iter().position(|v| !v.is_finite()) {
        return Err(InputError::NonMonotonicTime(i));
    }
    match t.windows(2).into_iter().position(|w| w[1] <= w[0]) {
        Some(i) => Err(InputError::NonMonotonicTime(i + 1)),
        None => Ok(()),
    }
}

/// 把 `values` 在时间轴 `t` 上的累积积分写入 `out`. 不做检查.
fn integrate_into(values: ArrayView1<f64>, t: ArrayView1<f64>, mut out: ArrayViewMut1<f64>) {
    let triangle = t[0] * values[0] / 2.0;
    let mut acc = 0.0;
    out[0] = triangle;
    for i in 1..values.len() {
        acc += (t[i] - t[i - 1]) * (values[i] + values[i - 1]) / 2.0;
        out[i] = acc + triangle;
    }
}

/// 计算单条曲线 `values` 在时间轴 `t` 上的累积积分 (含首帧三角形修正).
///
/// `t` 一般是帧中点时间. 返回值第 0 项恰为三角形修正项.
///
/// # 返回值
///
/// - `t` 少于两个点时, 返回 `Err(InputError::TooFewSamples)`;
/// - `t` 不严格递增时, 返回 `Err(InputError::NonMonotonicTime)`;
/// - `values` 与 `t` 长度不一致时, 返回 `Err(InputError::LengthMismatch)`.
pub fn integrate_curve(values: ArrayView1<f64>, t: ArrayView1<f64>) -> InputResult<Array1<f64>> {
    check_time_axis(t)?;
    if values.len() != t.len() {
        return Err(InputError::LengthMismatch {
            what: "curve to integrate",
            expected: t.len(),
            actual: values.len(),
        });
    }
    let mut out = Array1::zeros(t.len());
    integrate_into(values, t, out.view_mut());
    Ok(out)
}

/// 沿 4D 体数据 `(x, y, z, frame)` 的时间轴对每个体素做 [`integrate_curve`].
pub fn integrate_frames(volume: ArrayView4<f64>, t: ArrayView1<f64>) -> InputResult<Array4<f64>> {
    check_time_axis(t)?;
    let frames = volume.len_of(Axis(3));
    if frames != t.len() {
        return Err(InputError::LengthMismatch {
            what: "frames to integrate",
            expected: t.len(),
            actual: frames,
        });
    }
    let mut out = Array4::zeros(volume.raw_dim());
    Zip::from(out.lanes_mut(Axis(3)))
        .and(volume.lanes(Axis(3)))
        .for_each(|o, v| integrate_into(v, t, o));
    Ok(out)
}
