//! 预处理运行统计.

use std::time::{Duration, Instant};

/// 累加计时器.
///
/// 该计时器支持 "中途中断" 与 "结束中断, 继续开始计时".
#[derive(Clone, Debug)]
struct AccTimer {
    consumed: Duration,
    since: Instant,
}

impl AccTimer {
    /// 初始化计时器. 初始化时会视为已经开始计时 (`self.start()`).
    #[inline]
    fn new() -> Self {
        Self {
            consumed: Duration::ZERO,
            since: Instant::now(),
        }
    }

    /// 开始计时.
    #[inline]
    fn start(&mut self) {
        self.since = Instant::now();
    }

    /// 结束计时, 并将这一区间的时间累加. 返回本轮计时时长.
    ///
    /// # 注意
    ///
    /// 上一次调用必须是 `self.start()`, 否则计算时间值无意义.
    #[inline]
    fn elapsed(&mut self) -> Duration {
        let d = self.since.elapsed();
        self.consumed += d;
        d
    }

    /// 累计时间 (以微秒为单位).
    #[inline]
    fn get_total_us(&self) -> u64 {
        self.consumed.as_micros() as u64
    }
}

/// 预处理阶段.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Stage {
    Load,
    Calibrate,
    Resample,
    Segment,
    Write,
}

impl Stage {
    /// 按执行顺序排列的全部阶段.
    pub const ALL: [Stage; 5] = [
        Stage::Load,
        Stage::Calibrate,
        Stage::Resample,
        Stage::Segment,
        Stage::Write,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::Calibrate => "calibrate",
            Stage::Resample => "resample",
            Stage::Segment => "segment",
            Stage::Write => "write",
        }
    }

    #[inline]
    const fn index(self) -> usize {
        self as usize
    }
}

/// 一次批处理的数据统计.
#[derive(Clone, Debug)]
pub struct RunProfile {
    /// 成功处理的病人个数.
    processed: u64,

    /// 因错误跳过的病人个数.
    skipped: u64,

    /// 各阶段累计时间 (包括失败病人已经执行的部分).
    stages: [AccTimer; 5],

    /// 整个任务花费的总时间.
    real_time: AccTimer,

    /// 最耗时的病人及其处理时间.
    slowest: Option<(String, Duration)>,
}

impl RunProfile {
    /// 初始化, 并开始总计时.
    pub fn new() -> Self {
        Self {
            processed: 0,
            skipped: 0,
            stages: std::array::from_fn(|_| AccTimer::new()),
            real_time: AccTimer::new(),
            slowest: None,
        }
    }

    /// 执行 `f`, 并将其耗时计入 `stage`.
    pub fn time<T, F: FnOnce() -> T>(&mut self, stage: Stage, f: F) -> T {
        let timer = &mut self.stages[stage.index()];
        timer.start();
        let ans = f();
        timer.elapsed();
        ans
    }

    /// 记录一个成功处理的病人及其总处理时间.
    pub fn count_processed(&mut self, patient_id: &str, took: Duration) {
        self.processed += 1;
        if self.slowest.as_ref().map_or(true, |(_, d)| took > *d) {
            self.slowest = Some((patient_id.to_owned(), took));
        }
    }

    /// 记录一个被跳过的病人.
    #[inline]
    pub fn count_skipped(&mut self) {
        self.skipped += 1;
    }

    /// 结束全部计时.
    #[inline]
    pub fn finish(mut self) -> Self {
        self.real_time.elapsed();
        self
    }

    #[inline]
    pub fn get_processed(&self) -> u64 {
        self.processed
    }

    #[inline]
    pub fn get_skipped(&self) -> u64 {
        self.skipped
    }

    /// 以微秒为单位获得某阶段的累计时间.
    #[inline]
    pub fn get_stage_time_us(&self, stage: Stage) -> u64 {
        self.stages[stage.index()].get_total_us()
    }

    /// 以微秒为单位获得某阶段在每个成功病人上的平均时间.
    pub fn get_avg_stage_time_us(&self, stage: Stage) -> Option<f64> {
        match self.processed {
            0 => None,
            n => Some(self.get_stage_time_us(stage) as f64 / n as f64),
        }
    }

    /// 以微秒为单位获得到目前为止 (或到 [`Self::finish`] 为止) 的总自然时间.
    #[inline]
    pub fn get_real_time_us(&self) -> u64 {
        self.real_time.get_total_us()
    }

    /// 最耗时的病人. 不存在成功病人时返回 `None`.
    #[inline]
    pub fn get_slowest(&self) -> Option<(&str, Duration)> {
        self.slowest.as_ref().map(|(id, d)| (id.as_str(), *d))
    }
}

impl Default for RunProfile {
    fn default() -> Self {
        Self::new()
    }
}
