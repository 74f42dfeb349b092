//! 批量绘图: 为每个已预处理的病人生成直方图, 切片, 网格与动画.

mod runner;

fn main() -> anyhow::Result<()> {
    utils::init_logger()?;
    let cfg = utils::loader::config_from_env_or_home()?;
    let (plotted, skipped) = runner::run(&cfg)?;
    utils::sep();
    println!("Plotted patients: {plotted}, skipped: {skipped}");
    utils::sep();
    Ok(())
}
