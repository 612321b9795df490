//! 消融实验: 比较不同平滑核下 WLR 与 LRSC 的 R1 误差.

mod result;
mod runner;

fn main() {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Warn)
        .init()
        .unwrap();

    runner::run().analyze();
}
