use crate::models::{GeoPoint, MedianSolver, PhaseSimulator};
use crate::models::common::constants::{
    DEFAULT_CONVERGENCE_EPSILON, DEFAULT_MAX_ITERATIONS, DEFAULT_PHASE_INCREMENT, DEFAULT_TICK_INTERVAL_MS,
};
use crate::simulation::{RouteSummary, SimulationConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// シナリオメタデータ
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioMeta {
    pub version: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// ティック・中央値推定の設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimSettings {
    pub tick_interval_ms: u64,
    pub phase_increment: f64,
    pub convergence_epsilon: f64,
    pub max_iterations: u32,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            phase_increment: DEFAULT_PHASE_INCREMENT,
            convergence_epsilon: DEFAULT_CONVERGENCE_EPSILON,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// 上流でエージェント位置が変わったことを表すイベント
///
/// `at_tick` 回のティック後に、新しいエージェント集合でシミュレーションを作り直します。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Relocation {
    pub at_tick: u64,
    pub agents: Vec<GeoPoint>,
}

/// 完全なシナリオ設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioConfig {
    pub meta: ScenarioMeta,
    #[serde(default)]
    pub sim: SimSettings,
    pub agents: Vec<GeoPoint>,
    pub destination: GeoPoint,
    #[serde(default)]
    pub relocations: Vec<Relocation>,
}

impl ScenarioConfig {
    /// YAMLファイルからシナリオ設定を読み込み
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.to_path_buf()));
        }

        let contents = fs::read_to_string(path).map_err(|e| ScenarioError::Io(path.to_path_buf(), e))?;

        let config: ScenarioConfig =
            serde_yaml::from_str(&contents).map_err(|e| ScenarioError::Parse(path.to_path_buf(), e))?;

        config.validate()?;

        Ok(config)
    }

    /// 組み込みの配送デモシナリオ
    pub fn builtin_delivery() -> Self {
        let core = SimulationConfig::default_delivery();
        Self {
            meta: ScenarioMeta {
                version: "1.0".to_string(),
                name: "delivery_merge".to_string(),
                description: "3名のドライバーが合流して1台で配送先へ向かう".to_string(),
            },
            sim: SimSettings {
                tick_interval_ms: core.tick_interval_ms,
                phase_increment: core.phase_increment,
                convergence_epsilon: core.convergence_epsilon,
                max_iterations: core.max_iterations,
            },
            agents: core.agents,
            destination: core.destination,
            relocations: Vec::new(),
        }
    }

    /// 設定の基本的な検証
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.sim.tick_interval_ms == 0 {
            return Err(ScenarioError::Validation("tick_interval_ms must be positive".to_string()));
        }
        if !(self.sim.phase_increment > 0.0 && self.sim.phase_increment <= 1.0) {
            return Err(ScenarioError::Validation(format!(
                "phase_increment must be in (0, 1], got {}",
                self.sim.phase_increment
            )));
        }
        if !(self.sim.convergence_epsilon > 0.0) {
            return Err(ScenarioError::Validation("convergence_epsilon must be positive".to_string()));
        }
        if self.sim.max_iterations == 0 {
            return Err(ScenarioError::Validation("max_iterations must be positive".to_string()));
        }

        Self::validate_agents("agents", &self.agents)?;

        if !self.destination.is_valid() {
            return Err(ScenarioError::Validation(format!(
                "destination {} is out of range",
                self.destination
            )));
        }

        let mut previous_tick = 0;
        for (index, relocation) in self.relocations.iter().enumerate() {
            if relocation.at_tick <= previous_tick {
                return Err(ScenarioError::Validation(format!(
                    "relocations[{}].at_tick must be greater than {}",
                    index, previous_tick
                )));
            }
            Self::validate_agents(&format!("relocations[{}].agents", index), &relocation.agents)?;
            previous_tick = relocation.at_tick;
        }

        Ok(())
    }

    fn validate_agents(field: &str, agents: &[GeoPoint]) -> Result<(), ScenarioError> {
        if agents.is_empty() {
            return Err(ScenarioError::Validation(format!("{} must contain at least one position", field)));
        }
        if let Some((index, point)) = agents.iter().enumerate().find(|(_, p)| !p.is_valid()) {
            return Err(ScenarioError::Validation(format!(
                "{}[{}] {} is out of range",
                field, index, point
            )));
        }
        Ok(())
    }

    /// 初期エージェント集合でのシミュレーション入力
    pub fn simulation_config(&self) -> SimulationConfig {
        self.config_for_agents(self.agents.clone())
    }

    /// 位置変更イベント後のシミュレーション入力
    pub fn relocation_config(&self, relocation: &Relocation) -> SimulationConfig {
        self.config_for_agents(relocation.agents.clone())
    }

    fn config_for_agents(&self, agents: Vec<GeoPoint>) -> SimulationConfig {
        SimulationConfig {
            agents,
            destination: self.destination,
            tick_interval_ms: self.sim.tick_interval_ms,
            phase_increment: self.sim.phase_increment,
            convergence_epsilon: self.sim.convergence_epsilon,
            max_iterations: self.sim.max_iterations,
        }
    }

    /// シナリオの概要を表示
    pub fn print_summary(&self) {
        println!("=== シナリオ情報 ===");
        println!("名前: {}", self.meta.name);
        println!("説明: {}", self.meta.description);
        println!("バージョン: {}", self.meta.version);
        println!();

        let ticks = PhaseSimulator::ticks_per_phase(self.sim.phase_increment);
        println!("=== シミュレーション設定 ===");
        println!("ティック間隔: {}ms", self.sim.tick_interval_ms);
        println!("進捗増分: {} ({}ティック/フェーズ, 約{:.1}秒/フェーズ)",
                 self.sim.phase_increment,
                 ticks,
                 ticks as f64 * self.sim.tick_interval_ms as f64 / 1000.0);
        println!("収束しきい値: {:e}", self.sim.convergence_epsilon);
        println!("最大反復回数: {}", self.sim.max_iterations);
        println!();

        println!("=== エージェント ===");
        for (index, agent) in self.agents.iter().enumerate() {
            println!("  A{:03}: {}", index + 1, agent);
        }
        println!("目的地: {}", self.destination);

        let solver = MedianSolver::new();
        if let Ok(estimate) = solver.solve(&self.agents, self.sim.max_iterations, self.sim.convergence_epsilon) {
            let summary = RouteSummary::compute(&self.agents, &estimate.point, &self.destination);
            println!();
            println!("=== 合流地点 ===");
            println!("座標: {} (収束: {}, 反復: {}回)",
                     estimate.point,
                     if estimate.converged { "済" } else { "未" },
                     estimate.iterations);
            println!("合流地点までの距離合計: {:.3}km", solver.total_distance(&self.agents, &estimate.point));
            println!("総移動距離: {:.3}km (個別直行: {:.3}km)", summary.total_km, summary.direct_total_km);
        }

        if !self.relocations.is_empty() {
            println!();
            println!("=== 位置変更イベント ===");
            for relocation in &self.relocations {
                println!("  {}ティック後: {}名", relocation.at_tick, relocation.agents.len());
            }
        }
    }
}

/// シナリオ読み込みエラー
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("シナリオファイルが見つかりません: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("ファイル読み込みエラー {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("YAML解析エラー {}: {}", .0.display(), .1)]
    Parse(PathBuf, #[source] serde_yaml::Error),

    #[error("設定検証エラー: {0}")]
    Validation(String),
}
