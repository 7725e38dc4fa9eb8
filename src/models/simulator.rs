use crate::models::{
    agent::Agent,
    common::{constants::PROGRESS_TOLERANCE, GeoPoint},
    traits::IAgent,
};
use serde::Serialize;
use tracing::{info, trace};

/// シミュレーションフェーズ
///
/// 遷移は Approaching → Merged → Arrived の一方向のみで、逆戻りやスキップはありません。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    /// 各エージェントが合流地点へ向かっている
    Approaching,
    /// 合流した1台が目的地へ向かっている
    Merged,
    /// 目的地へ到着済み（終端状態）
    Arrived,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Approaching => "Approaching",
            Phase::Merged => "Merged",
            Phase::Arrived => "Arrived",
        };
        f.write_str(name)
    }
}

/// 1ティック処理後の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// 次のティックが必要
    Continue,
    /// 到着済み。スケジューラの登録を解除してよい
    Finished,
}

/// ティックごとに発行される不変スナップショット
///
/// `phase` が Approaching の間は `agent_positions` が、Merged / Arrived の間は
/// `merged_position` が有効な位置です。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationState {
    pub tick: u64,
    pub phase: Phase,
    pub approach_progress: f64,
    pub home_progress: f64,
    pub meeting_point: GeoPoint,
    pub merged_position: GeoPoint,
    pub agent_positions: Vec<GeoPoint>,
}

impl SimulationState {
    /// 現在のフェーズで表示すべき位置の一覧
    pub fn visible_positions(&self) -> Vec<GeoPoint> {
        match self.phase {
            Phase::Approaching => self.agent_positions.clone(),
            Phase::Merged | Phase::Arrived => vec![self.merged_position],
        }
    }
}

/// 合流シミュレーションの状態機械
///
/// 全ての可変状態を所有し、外部からは `tick()` の呼び出しのみで進行します。
/// 入力（エージェント集合）が変わった場合は、部分更新せずに新しいインスタンスを構築してください。
#[derive(Debug, Clone)]
pub struct PhaseSimulator {
    agents: Vec<Agent>,
    meeting_point: GeoPoint,
    destination: GeoPoint,
    phase_increment: f64,

    phase: Phase,
    approach_progress: f64,
    home_progress: f64,
    merged_position: GeoPoint,
    tick_count: u64,
}

impl PhaseSimulator {
    /// 新しいシミュレータを作成
    ///
    /// # 引数
    ///
    /// * `agents` - 開始位置に配置済みのエージェント
    /// * `meeting_point` - 合流地点（中央値推定の結果）
    /// * `destination` - 最終目的地
    /// * `phase_increment` - 1ティックあたりの進捗増分 (0, 1]
    pub fn new(agents: Vec<Agent>, meeting_point: GeoPoint, destination: GeoPoint, phase_increment: f64) -> Self {
        let agents = agents
            .into_iter()
            .map(|agent| Agent::new(agent.id, agent.start_position))
            .collect();

        Self {
            agents,
            meeting_point,
            destination,
            phase_increment,
            phase: Phase::Approaching,
            approach_progress: 0.0,
            home_progress: 0.0,
            merged_position: meeting_point,
            tick_count: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn meeting_point(&self) -> GeoPoint {
        self.meeting_point
    }

    pub fn destination(&self) -> GeoPoint {
        self.destination
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Arrived
    }

    /// 1ティック進める
    pub fn tick(&mut self) -> TickOutcome {
        match self.phase {
            Phase::Approaching => {
                self.tick_approaching();
                self.tick_count += 1;
                TickOutcome::Continue
            }
            Phase::Merged => {
                self.tick_merged();
                self.tick_count += 1;
                if self.phase == Phase::Arrived {
                    TickOutcome::Finished
                } else {
                    TickOutcome::Continue
                }
            }
            Phase::Arrived => TickOutcome::Finished,
        }
    }

    fn tick_approaching(&mut self) {
        for agent in &mut self.agents {
            agent.move_toward(&self.meeting_point, self.approach_progress);
        }

        self.approach_progress += self.phase_increment;

        if self.approach_progress >= 1.0 - PROGRESS_TOLERANCE {
            self.approach_progress = 1.0;
            for agent in &mut self.agents {
                agent.place_at(self.meeting_point);
            }
            self.home_progress = 0.0;
            self.merged_position = self.meeting_point;
            self.phase = Phase::Merged;

            info!(
                tick = self.tick_count + 1,
                agents = self.agents.len(),
                meeting_latitude = self.meeting_point.latitude,
                meeting_longitude = self.meeting_point.longitude,
                "PHASE_CHANGED: 全エージェントが合流地点に到着し合流しました"
            );
        } else {
            trace!(
                tick = self.tick_count + 1,
                approach_progress = self.approach_progress,
                "合流地点へ移動中"
            );
        }
    }

    fn tick_merged(&mut self) {
        self.merged_position = self.meeting_point.lerp(&self.destination, self.home_progress);

        self.home_progress += self.phase_increment;

        if self.home_progress >= 1.0 - PROGRESS_TOLERANCE {
            self.home_progress = 1.0;
            self.merged_position = self.destination;
            self.phase = Phase::Arrived;

            info!(
                tick = self.tick_count + 1,
                destination_latitude = self.destination.latitude,
                destination_longitude = self.destination.longitude,
                "PHASE_CHANGED: 合流車両が目的地に到着しました"
            );
        } else {
            trace!(
                tick = self.tick_count + 1,
                home_progress = self.home_progress,
                "目的地へ移動中"
            );
        }
    }

    /// 現在状態のスナップショットを作成
    pub fn snapshot(&self) -> SimulationState {
        SimulationState {
            tick: self.tick_count,
            phase: self.phase,
            approach_progress: self.approach_progress,
            home_progress: self.home_progress,
            meeting_point: self.meeting_point,
            merged_position: self.merged_position,
            agent_positions: self.agents.iter().map(|agent| agent.get_position()).collect(),
        }
    }

    /// 1フェーズを完了するのに必要なティック数の見積もり
    pub fn ticks_per_phase(phase_increment: f64) -> u64 {
        if phase_increment <= 0.0 {
            return u64::MAX;
        }
        ((1.0 - PROGRESS_TOLERANCE) / phase_increment).ceil().max(1.0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delivery_agents() -> Vec<Agent> {
        Agent::from_positions(&[
            GeoPoint::new(23.0375, 72.4949),
            GeoPoint::new(23.0475, 72.5049),
            GeoPoint::new(23.0275, 72.4849),
        ])
    }

    fn simulator(increment: f64) -> PhaseSimulator {
        PhaseSimulator::new(
            delivery_agents(),
            GeoPoint::new(23.0375, 72.4949),
            GeoPoint::new(23.129318, 72.544884),
            increment,
        )
    }

    #[test]
    fn test_initial_state() {
        let sim = simulator(0.02);
        let state = sim.snapshot();
        assert_eq!(state.phase, Phase::Approaching);
        assert_eq!(state.approach_progress, 0.0);
        assert_eq!(state.home_progress, 0.0);
        assert_eq!(state.tick, 0);
        assert_eq!(state.agent_positions[1], GeoPoint::new(23.0475, 72.5049));
    }

    #[test]
    fn test_first_tick_interpolates_at_zero_progress() {
        let mut sim = simulator(0.02);
        assert_eq!(sim.tick(), TickOutcome::Continue);
        let state = sim.snapshot();
        assert_eq!(state.agent_positions[1], GeoPoint::new(23.0475, 72.5049));
        assert!((state.approach_progress - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_last_approach_tick_snaps_to_meeting_point() {
        let agents = Agent::from_positions(&[GeoPoint::new(0.0, 0.0)]);
        let mut sim = PhaseSimulator::new(agents, GeoPoint::new(2.0, 4.0), GeoPoint::new(3.0, 3.0), 0.5);
        sim.tick();
        assert_eq!(sim.snapshot().agent_positions[0], GeoPoint::new(0.0, 0.0));
        sim.tick();
        let state = sim.snapshot();
        assert_eq!(state.phase, Phase::Merged);
        assert_eq!(state.agent_positions[0], GeoPoint::new(2.0, 4.0));
    }

    #[test]
    fn test_fifty_ticks_per_phase() {
        let mut sim = simulator(0.02);
        for _ in 0..49 {
            assert_eq!(sim.tick(), TickOutcome::Continue);
            assert_eq!(sim.phase(), Phase::Approaching);
        }
        sim.tick();
        let state = sim.snapshot();
        assert_eq!(state.phase, Phase::Merged);
        assert_eq!(state.approach_progress, 1.0);
        assert!(state.agent_positions.iter().all(|p| *p == state.meeting_point));

        for _ in 0..49 {
            assert_eq!(sim.tick(), TickOutcome::Continue);
            assert_eq!(sim.phase(), Phase::Merged);
        }
        assert_eq!(sim.tick(), TickOutcome::Finished);
        let state = sim.snapshot();
        assert_eq!(state.phase, Phase::Arrived);
        assert_eq!(state.home_progress, 1.0);
        assert_eq!(state.merged_position, GeoPoint::new(23.129318, 72.544884));
        assert_eq!(state.tick, 100);
    }

    #[test]
    fn test_progress_monotonic_and_phases_ordered() {
        let mut sim = simulator(0.07);
        let mut previous = sim.snapshot();
        let mut visited = vec![previous.phase];

        for _ in 0..100 {
            sim.tick();
            let state = sim.snapshot();
            assert!(state.approach_progress >= previous.approach_progress);
            assert!(state.approach_progress <= 1.0);
            assert!(state.home_progress <= 1.0);
            if state.phase == previous.phase && state.phase == Phase::Merged {
                assert!(state.home_progress >= previous.home_progress);
            }
            if visited.last() != Some(&state.phase) {
                visited.push(state.phase);
            }
            previous = state;
        }

        assert_eq!(visited, vec![Phase::Approaching, Phase::Merged, Phase::Arrived]);
    }

    #[test]
    fn test_arrived_is_idempotent() {
        let mut sim = simulator(0.5);
        while sim.tick() == TickOutcome::Continue {}
        let arrived = sim.snapshot();
        for _ in 0..10 {
            assert_eq!(sim.tick(), TickOutcome::Finished);
        }
        assert_eq!(sim.snapshot(), arrived);
    }

    #[test]
    fn test_full_increment_completes_each_phase_in_one_tick() {
        let mut sim = simulator(1.0);
        assert_eq!(sim.tick(), TickOutcome::Continue);
        assert_eq!(sim.phase(), Phase::Merged);
        assert_eq!(sim.tick(), TickOutcome::Finished);
        assert_eq!(sim.phase(), Phase::Arrived);
    }

    #[test]
    fn test_visible_positions_follow_phase() {
        let mut sim = simulator(1.0);
        assert_eq!(sim.snapshot().visible_positions().len(), 3);
        sim.tick();
        assert_eq!(sim.snapshot().visible_positions(), vec![sim.meeting_point()]);
    }

    #[test]
    fn test_ticks_per_phase() {
        assert_eq!(PhaseSimulator::ticks_per_phase(0.02), 50);
        assert_eq!(PhaseSimulator::ticks_per_phase(0.1), 10);
        assert_eq!(PhaseSimulator::ticks_per_phase(0.3), 4);
        assert_eq!(PhaseSimulator::ticks_per_phase(1.0), 1);
    }

    #[test]
    fn test_tenth_increment_needs_exactly_ten_ticks() {
        let mut sim = simulator(0.1);
        for _ in 0..9 {
            sim.tick();
        }
        assert_eq!(sim.phase(), Phase::Approaching);
        sim.tick();
        assert_eq!(sim.phase(), Phase::Merged);
    }
}
