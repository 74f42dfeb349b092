//! 批量预处理: 加载, 校准, 重采样, 分割并保存每个病人的扫描.

mod profile;
mod result;
mod runner;

fn main() -> anyhow::Result<()> {
    utils::init_logger()?;
    let cfg = utils::loader::config_from_env_or_home()?;
    let profile = runner::run(&cfg)?;
    result::report(&profile)?;
    Ok(())
}
