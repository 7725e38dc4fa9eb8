//! tokioのインターバルタイマーによるホスト側スケジューラと実行ループ

use crate::error::SimResult;
use crate::models::{SimulationState, TickOutcome};
use crate::simulation::{IScheduler, ISnapshotSink, SimulationConfig, SimulationController, TickRegistration};
use std::future::Future;
use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{info, warn};

/// 登録情報のみを保持するスケジューラ
///
/// 実際のタイマーは [`run_until_arrival`] が現在の登録から作成します。
/// 同時に有効な登録は常に1つだけです。
#[derive(Debug, Default)]
pub struct IntervalScheduler {
    next_id: u64,
    active: Option<(TickRegistration, Duration)>,
    no_delay: bool,
}

impl IntervalScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// タイマーを待たずに連続してティックを発火するスケジューラ
    pub fn without_delay() -> Self {
        Self {
            no_delay: true,
            ..Self::default()
        }
    }

    pub fn active(&self) -> Option<(TickRegistration, Duration)> {
        self.active
    }
}

impl IScheduler for IntervalScheduler {
    fn register(&mut self, interval: Duration) -> TickRegistration {
        self.next_id += 1;
        let registration = TickRegistration(self.next_id);
        self.active = Some((registration, interval));
        registration
    }

    fn cancel(&mut self, registration: TickRegistration) {
        if matches!(self.active, Some((active, _)) if active == registration) {
            self.active = None;
        }
    }
}

/// 実行結果
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// 処理したティックの総数（再構築をまたいで累積）
    pub ticks: u64,
    /// 位置変更による再構築の回数
    pub restarts: usize,
    /// 外部からの停止要求で中断したかどうか
    pub cancelled: bool,
    /// 最後に観測した状態
    pub final_state: Option<SimulationState>,
}

/// 到着（または停止要求）までティックを駆動する
///
/// # 引数
///
/// * `controller` - 開始済みのコントローラ
/// * `relocations` - (総ティック数, 新しい入力) の組。総ティック数の昇順
/// * `shutdown` - 完了すると実行を中断する Future（Ctrl-C など）
pub async fn run_until_arrival<R, F>(
    controller: &mut SimulationController<IntervalScheduler, R>,
    relocations: &[(u64, SimulationConfig)],
    shutdown: F,
) -> SimResult<RunReport>
where
    R: ISnapshotSink,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    let mut report = RunReport::default();
    let mut pending = relocations.iter().peekable();

    while let Some((registration, period)) = controller.scheduler().active() {
        let mut timer = (!controller.scheduler().no_delay && !period.is_zero()).then(|| {
            let mut timer = interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            timer
        });

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    report.final_state = controller.state();
                    controller.cancel();
                    report.cancelled = true;
                    info!(ticks = report.ticks, "停止要求によりシミュレーションを中断しました");
                    return Ok(report);
                }
                _ = wait_for_tick(&mut timer) => {}
            }

            let outcome = controller.on_tick(registration);
            report.ticks += 1;
            // 到着時はコントローラ側で登録が解除される
            if outcome == TickOutcome::Finished {
                break;
            }

            if let Some((_, config)) = pending.next_if(|(at_tick, _)| *at_tick <= report.ticks) {
                controller.restart(config.clone())?;
                report.restarts += 1;
                break;
            }
        }
    }

    let skipped = pending.count();
    if skipped > 0 {
        warn!(skipped, "到着後の位置変更イベントは適用されませんでした");
    }

    report.final_state = controller.state();
    Ok(report)
}

async fn wait_for_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => tokio::task::yield_now().await,
    }
}
