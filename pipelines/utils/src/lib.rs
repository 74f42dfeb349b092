//! 批处理程序依赖的通用组件.

use std::io::{self, Write};

pub mod loader;

const SEP: &str = "--------------------------------------------------------";

/// 简单分隔线.
#[inline]
pub fn sep() {
    println!("{SEP}");
}

/// 简单分隔线.
#[inline]
pub fn sep_to<W: Write>(mut w: W) -> io::Result<()> {
    writeln!(&mut w, "{SEP}")
}

/// 安装终端日志, 默认级别为 `Info`.
///
/// 可以通过 `$RUST_LOG` 调整级别 (如 `RUST_LOG=debug`).
pub fn init_logger() -> anyhow::Result<()> {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .env()
        .init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sep_to() {
        let mut buf = Vec::new();
        sep_to(&mut buf).unwrap();
        assert_eq!(buf.len(), SEP.len() + 1);
        assert!(buf.iter().take(SEP.len()).all(|&b| b == b'-'));
    }
}
