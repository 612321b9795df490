//! 实验结果.

use std::io::{self, Write};
use std::time::Duration;

/// 单次运行统计.
pub struct Profile {
    /// 平滑核半高宽.
    pub fwhm: f64,

    /// 第一阶段 R1 平均绝对误差.
    pub wlr: Option<f64>,

    /// 第二阶段 R1 平均绝对误差.
    pub lrsc: Option<f64>,

    /// 拟合失败的体素数.
    pub failed: usize,

    /// 运行耗时.
    pub elapsed: Duration,
}

/// 将 `p` 的结果写进 `w` 中.
fn describe_into<W: Write>(p: &Profile, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    #[inline]
    fn f64_to_display(f: Option<f64>) -> String {
        match f {
            Some(f) => format!("{f:.6}"),
            None => "/".to_string(),
        }
    }

    writeln!(w, "FWHM = {:.1} mm:", p.fwhm)?;
    writeln!(w, "{S4}WLR R1 mean abs error: {}", f64_to_display(p.wlr))?;
    writeln!(w, "{S4}LRSC R1 mean abs error: {}", f64_to_display(p.lrsc))?;
    let gain = match (p.wlr, p.lrsc) {
        (Some(a), Some(b)) if a > 0.0 => Some((a - b) / a * 100.0),
        _ => None,
    };
    writeln!(w, "{S4}Error reduction: {} %", f64_to_display(gain))?;
    writeln!(w, "{S4}Failed voxels: {}", p.failed)?;
    write!(w, "{S4}Total machine time: {} us", p.elapsed.as_micros())?;
    Ok(())
}

/// 消融实验最终结果.
pub struct AblationResult {
    data: Vec<Profile>,
}

impl AblationResult {
    pub fn from_iter<I: IntoIterator<Item = Profile>>(it: I) -> Self {
        Self {
            data: it.into_iter().collect(),
        }
    }

    /// 分析运行结果.
    pub fn analyze(&self) {
        utils::sep();
        let mut buf = Vec::with_capacity(512);

        for profile in self.data.iter() {
            describe_into(profile, &mut buf).unwrap();
            println!("{}", std::str::from_utf8(&buf).unwrap());
            buf.clear();

            utils::sep();
        }
    }
}
