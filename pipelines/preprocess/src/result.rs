//! 运行结果.

use crate::profile::{RunProfile, Stage};
use std::io::{self, Write};

/// 将 `p` 的结果写进 `w` 中.
pub fn describe_into<W: Write>(p: &RunProfile, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    #[inline]
    fn f64_to_display(f: Option<f64>) -> String {
        match f {
            Some(f) => format!("{f:.3}"),
            None => "/".to_string(),
        }
    }

    writeln!(w, "Preprocessing profile:")?;
    writeln!(w, "{S4}Processed patients: {}", p.get_processed())?;
    writeln!(w, "{S4}Skipped patients: {}", p.get_skipped())?;
    for stage in Stage::ALL {
        writeln!(
            w,
            "{S4}Stage `{}`: {} us in total, {} us on average",
            stage.name(),
            p.get_stage_time_us(stage),
            f64_to_display(p.get_avg_stage_time_us(stage))
        )?;
    }
    writeln!(w, "{S4}Total machine time: {} us", p.get_real_time_us())?;
    match p.get_slowest() {
        Some((id, d)) => write!(w, "{S4}Slowest patient `{id}` costs {} us", d.as_micros())?,
        None => write!(w, "{S4}Slowest patient: /")?,
    }
    Ok(())
}

/// 在终端打印运行结果.
pub fn report(p: &RunProfile) -> io::Result<()> {
    let mut buf = Vec::with_capacity(512);
    utils::sep_to(&mut buf)?;
    describe_into(p, &mut buf)?;
    writeln!(&mut buf)?;
    utils::sep_to(&mut buf)?;
    io::stdout().lock().write_all(&buf)
}
