//! # Simulation モジュール
//!
//! 合流シミュレーションのライフサイクルを管理するコントローラを提供します。
//!
//! コントローラは、シミュレーション開始時に中央値推定（合流地点の算出）を1回だけ実行し、
//! フェーズシミュレータを構築して、ホスト側の周期スケジューラにティックを登録します。
//! 以降はスケジューラが発火するたびに `on_tick` が呼ばれ、シミュレータを1ティック進めて
//! 新しいスナップショットを描画側（シンク）へ発行します。
//!
//! ## 主要機能
//!
//! - **開始・停止・再開**: `start` / `cancel` / `restart`
//! - **スケジューラ登録管理**: 再開時は必ず旧登録を解除してから新規登録
//! - **スナップショット発行**: 毎ティック完全に更新された状態のみを発行
//! - **経路サマリ**: 到着時に各区間の移動距離と合計を算出
//!
//! ## 並行性
//!
//! 全ての処理はスケジューラから逐次呼ばれる同期処理です。可変状態の所有者は常に
//! アクティブな `PhaseSimulator` ただ1つであり、ロックは不要です。
//!
//! ## 使用例
//!
//! ```rust,ignore
//! use mergesim::simulation::{SimulationConfig, SimulationController};
//!
//! let mut controller = SimulationController::new(scheduler, sink);
//! let registration = controller.start(SimulationConfig::default_delivery())?;
//!
//! // スケジューラが発火するたびに
//! controller.on_tick(registration);
//! ```

use crate::error::{SimError, SimResult};
use crate::models::{
    common::constants::{
        DEFAULT_CONVERGENCE_EPSILON, DEFAULT_MAX_ITERATIONS, DEFAULT_PHASE_INCREMENT, DEFAULT_TICK_INTERVAL_MS,
    },
    haversine_km, Agent, GeoPoint, MedianEstimate, MedianSolver, PhaseSimulator, SimulationState, TickOutcome,
};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// シミュレーション構築時の入力
///
/// 生成時に1度だけ与えられ、以後変更されません。`agents` 以外の値域チェックは
/// 呼び出し側（シナリオ読み込み）の責務です。
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// 各エージェントの開始位置（1件以上）
    pub agents: Vec<GeoPoint>,
    /// 最終目的地
    pub destination: GeoPoint,
    /// ティック間隔（ミリ秒）
    pub tick_interval_ms: u64,
    /// 1ティックあたりの進捗増分 (0, 1]
    pub phase_increment: f64,
    /// 中央値推定の収束しきい値
    pub convergence_epsilon: f64,
    /// 中央値推定の最大反復回数
    pub max_iterations: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            agents: Vec::new(),
            destination: GeoPoint::new(0.0, 0.0),
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            phase_increment: DEFAULT_PHASE_INCREMENT,
            convergence_epsilon: DEFAULT_CONVERGENCE_EPSILON,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl SimulationConfig {
    /// 組み込みの配送シナリオ（ドライバー3名、目的地1箇所）
    pub fn default_delivery() -> Self {
        Self {
            agents: vec![
                GeoPoint::new(23.0375, 72.4949),
                GeoPoint::new(23.0475, 72.5049),
                GeoPoint::new(23.0275, 72.4849),
            ],
            destination: GeoPoint::new(23.129318, 72.544884),
            ..Self::default()
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// スケジューラへのティック登録ハンドル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickRegistration(pub u64);

/// ホスト環境が提供する周期スケジューラのインターフェース
///
/// 登録後は `interval` ごとに、登録ハンドルを添えて
/// [`SimulationController::on_tick`] を呼び出すことが期待されます。
pub trait IScheduler {
    /// 周期ティックを登録
    fn register(&mut self, interval: Duration) -> TickRegistration;

    /// 登録を解除（解除済みのハンドルに対しては何もしない）
    fn cancel(&mut self, registration: TickRegistration);
}

/// スナップショットの受け取り側（描画・記録）のインターフェース
pub trait ISnapshotSink {
    fn publish(&mut self, state: &SimulationState);
}

/// 到着時点の経路サマリ
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteSummary {
    /// 各エージェントの開始位置から合流地点までの距離（km）
    pub agent_legs_km: Vec<f64>,
    /// 合流地点から目的地までの距離（km）
    pub shared_leg_km: f64,
    /// 合流後は1台分として数えた総移動距離（km）
    pub total_km: f64,
    /// 全エージェントが個別に目的地へ直行した場合の総移動距離（km）
    pub direct_total_km: f64,
}

impl RouteSummary {
    pub fn compute(agents: &[GeoPoint], meeting_point: &GeoPoint, destination: &GeoPoint) -> Self {
        let agent_legs_km: Vec<f64> = agents.iter().map(|start| haversine_km(start, meeting_point)).collect();
        let shared_leg_km = haversine_km(meeting_point, destination);
        let total_km = agent_legs_km.iter().sum::<f64>() + shared_leg_km;
        let direct_total_km = agents.iter().map(|start| haversine_km(start, destination)).sum();

        Self {
            agent_legs_km,
            shared_leg_km,
            total_km,
            direct_total_km,
        }
    }
}

/// 実行中（または到着済み）のシミュレーション1件分
struct ActiveSimulation {
    config: SimulationConfig,
    estimate: MedianEstimate,
    simulator: PhaseSimulator,
}

/// シミュレーションのライフサイクル管理
pub struct SimulationController<S: IScheduler, R: ISnapshotSink> {
    scheduler: S,
    sink: R,
    solver: MedianSolver,
    active: Option<ActiveSimulation>,
    registration: Option<TickRegistration>,
}

impl<S: IScheduler, R: ISnapshotSink> SimulationController<S, R> {
    pub fn new(scheduler: S, sink: R) -> Self {
        Self {
            scheduler,
            sink,
            solver: MedianSolver::new(),
            active: None,
            registration: None,
        }
    }

    /// シミュレーションを開始
    ///
    /// 合流地点を算出してシミュレータを構築し、スケジューラへティックを登録します。
    /// 既に実行中の場合は `SimError::AlreadyRunning`、エージェントが空の場合は
    /// `SimError::EmptyInput` を返し、どちらの場合も状態は変更されません。
    pub fn start(&mut self, config: SimulationConfig) -> SimResult<TickRegistration> {
        if self.registration.is_some() {
            return Err(SimError::AlreadyRunning);
        }
        let prepared = self.prepare(config)?;
        // 到着済みのシミュレーションが残っていれば破棄する
        self.cancel();
        Ok(self.install(prepared))
    }

    /// 新しい入力でシミュレーションを作り直す
    ///
    /// 合流地点は新しいエージェント集合のみから再計算され、進捗は全て破棄されます。
    /// 構築に失敗した場合は現在のシミュレーションをそのまま継続します。
    pub fn restart(&mut self, config: SimulationConfig) -> SimResult<TickRegistration> {
        let prepared = self.prepare(config)?;
        self.cancel();
        info!(
            agents = prepared.config.agents.len(),
            "SIMULATION_RESTARTED: 新しいエージェント集合でシミュレーションを再構築します"
        );
        Ok(self.install(prepared))
    }

    /// シミュレーションを停止し、状態を破棄
    ///
    /// # 戻り値
    ///
    /// 破棄したシミュレーションがあった場合は true
    pub fn cancel(&mut self) -> bool {
        if let Some(registration) = self.registration.take() {
            self.scheduler.cancel(registration);
            info!(
                registration = registration.0,
                "SIMULATION_CANCELLED: ティック登録を解除しました"
            );
        }
        self.active.take().is_some()
    }

    /// スケジューラからのティック通知
    ///
    /// 現在の登録と一致しないハンドル（解除済みの古いタイマー）からの通知は無視し、
    /// `TickOutcome::Finished` を返します。
    pub fn on_tick(&mut self, registration: TickRegistration) -> TickOutcome {
        if self.registration != Some(registration) {
            debug!(registration = registration.0, "解除済みの登録からのティックを無視しました");
            return TickOutcome::Finished;
        }
        let Some(active) = self.active.as_mut() else {
            return TickOutcome::Finished;
        };

        let outcome = active.simulator.tick();
        let state = active.simulator.snapshot();
        self.sink.publish(&state);

        if outcome == TickOutcome::Finished {
            self.registration = None;
            self.scheduler.cancel(registration);

            let summary = RouteSummary::compute(&active.config.agents, &state.meeting_point, &state.merged_position);
            info!(
                ticks = state.tick,
                total_km = summary.total_km,
                direct_total_km = summary.direct_total_km,
                "SIMULATION_ARRIVED: シミュレーションが完了しました"
            );
        }

        outcome
    }

    /// 現在状態のスナップショット
    pub fn state(&self) -> Option<SimulationState> {
        self.active.as_ref().map(|active| active.simulator.snapshot())
    }

    /// 合流地点の推定結果
    pub fn meeting_estimate(&self) -> Option<MedianEstimate> {
        self.active.as_ref().map(|active| active.estimate)
    }

    pub fn config(&self) -> Option<&SimulationConfig> {
        self.active.as_ref().map(|active| &active.config)
    }

    /// 経路サマリ（シミュレーションが存在する場合）
    pub fn route_summary(&self) -> Option<RouteSummary> {
        self.active.as_ref().map(|active| {
            RouteSummary::compute(
                &active.config.agents,
                &active.simulator.meeting_point(),
                &active.simulator.destination(),
            )
        })
    }

    /// ティックが登録されている（まだ到着していない）かどうか
    pub fn is_running(&self) -> bool {
        self.registration.is_some()
    }

    pub fn registration(&self) -> Option<TickRegistration> {
        self.registration
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn sink(&self) -> &R {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut R {
        &mut self.sink
    }

    fn prepare(&self, config: SimulationConfig) -> SimResult<ActiveSimulation> {
        if config.agents.is_empty() {
            return Err(SimError::EmptyInput);
        }

        let estimate = self
            .solver
            .solve(&config.agents, config.max_iterations, config.convergence_epsilon)?;
        if !estimate.converged {
            warn!(
                iterations = estimate.iterations,
                "合流地点は収束前の推定値を使用します"
            );
        }

        let simulator = PhaseSimulator::new(
            Agent::from_positions(&config.agents),
            estimate.point,
            config.destination,
            config.phase_increment,
        );

        Ok(ActiveSimulation {
            config,
            estimate,
            simulator,
        })
    }

    fn install(&mut self, prepared: ActiveSimulation) -> TickRegistration {
        let registration = self.scheduler.register(prepared.config.tick_interval());

        info!(
            registration = registration.0,
            agents = prepared.config.agents.len(),
            meeting_latitude = prepared.estimate.point.latitude,
            meeting_longitude = prepared.estimate.point.longitude,
            converged = prepared.estimate.converged,
            iterations = prepared.estimate.iterations,
            tick_interval_ms = prepared.config.tick_interval_ms,
            "SIMULATION_STARTED: シミュレーションを開始しました"
        );

        self.sink.publish(&prepared.simulator.snapshot());
        self.active = Some(prepared);
        self.registration = Some(registration);
        registration
    }
}

impl<S: IScheduler, R: ISnapshotSink> Drop for SimulationController<S, R> {
    fn drop(&mut self) {
        if let Some(registration) = self.registration.take() {
            self.scheduler.cancel(registration);
        }
    }
}
