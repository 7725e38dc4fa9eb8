use clap::{Arg, ArgMatches, Command};
use mergesim::logging::{init_logging, parse_log_level, LogConfig, LogOutput};
use mergesim::output::{JsonLinesSink, TracingSink};
use mergesim::runner::{run_until_arrival, IntervalScheduler, RunReport};
use mergesim::scenario::ScenarioConfig;
use mergesim::simulation::{SimulationConfig, SimulationController};
use std::str::FromStr;
use tracing::info;

fn main() {
    let matches = Command::new("mergesim")
        .version("0.1.0")
        .about("合流シミュレーション (Rendezvous Merge Simulation)")
        .long_about("複数ドライバーの最適な合流地点をWeiszfeld法で推定し、\n\
                     合流から目的地到着までをティック駆動で再現します。")
        .arg(
            Arg::new("scenario")
                .short('s')
                .long("scenario")
                .value_name("FILE")
                .help("シナリオファイル(.yaml)のパスを指定")
                .conflicts_with("demo")
        )
        .arg(
            Arg::new("demo")
                .short('d')
                .long("demo")
                .action(clap::ArgAction::SetTrue)
                .help("組み込みの配送シナリオ（ドライバー3名）で実行")
        )
        .arg(
            Arg::new("info")
                .short('i')
                .long("info")
                .action(clap::ArgAction::SetTrue)
                .help("シナリオの情報（合流地点を含む）のみ表示して終了")
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("各ティックのスナップショットをJSON Lines形式で出力")
        )
        .arg(
            Arg::new("no-delay")
                .long("no-delay")
                .action(clap::ArgAction::SetTrue)
                .help("ティック間隔を待たずに連続実行")
        )
        .arg(
            Arg::new("log-output")
                .long("log-output")
                .value_name("TARGET")
                .default_value("console")
                .help("ログ出力先 (console, file, both)")
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .default_value("info")
                .help("ログレベル (trace, debug, info, warn, error)")
        )
        .arg(
            Arg::new("log-dir")
                .long("log-dir")
                .value_name("DIR")
                .default_value("logs")
                .help("ログファイルの出力ディレクトリ")
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(clap::ArgAction::Count)
                .help("詳細出力レベル (-v: 詳細, -vv: トレース)")
        )
        .get_matches();

    println!("合流シミュレーション (Rendezvous Merge Simulation) - mergesim v0.1.0");
    println!();

    let verbose_level = matches.get_count("verbose");

    let _log_guard = match build_log_config(&matches, verbose_level).and_then(init_logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("エラー: ログの初期化に失敗しました: {}", e);
            std::process::exit(1);
        }
    };

    let scenario = if let Some(scenario_path) = matches.get_one::<String>("scenario") {
        match ScenarioConfig::from_file(scenario_path) {
            Ok(scenario) => {
                info!(path = %scenario_path, "シナリオファイル読み込み完了");
                scenario
            }
            Err(e) => {
                eprintln!("エラー: {}", e);
                std::process::exit(1);
            }
        }
    } else if matches.get_flag("demo") {
        ScenarioConfig::builtin_delivery()
    } else {
        show_default_help();
        return;
    };

    if matches.get_flag("info") {
        scenario.print_summary();
        return;
    }

    let output_path = matches.get_one::<String>("output").cloned();
    let no_delay = matches.get_flag("no-delay");

    match execute_scenario(scenario, output_path, no_delay) {
        Ok(report) => {
            if report.cancelled {
                println!("シミュレーションは中断されました ({}ティック)", report.ticks);
            }
        }
        Err(e) => {
            eprintln!("エラー: {}", e);
            std::process::exit(1);
        }
    }
}

fn build_log_config(matches: &ArgMatches, verbose_level: u8) -> Result<LogConfig, Box<dyn std::error::Error>> {
    let output = matches
        .get_one::<String>("log-output")
        .map(|s| LogOutput::from_str(s))
        .transpose()?
        .unwrap_or(LogOutput::Console);
    let level = matches
        .get_one::<String>("log-level")
        .map(|s| parse_log_level(s))
        .unwrap_or(tracing::Level::INFO);
    let log_dir = matches
        .get_one::<String>("log-dir")
        .cloned()
        .unwrap_or_else(|| "logs".to_string());

    Ok(LogConfig {
        level,
        output,
        log_dir,
        ..LogConfig::default()
    }
    .with_verbosity(verbose_level))
}

/// シナリオの実行
fn execute_scenario(
    scenario: ScenarioConfig,
    output_path: Option<String>,
    no_delay: bool,
) -> Result<RunReport, Box<dyn std::error::Error>> {
    scenario.print_summary();
    println!();

    let json_sink = output_path.as_deref().map(JsonLinesSink::create).transpose()?;
    let scheduler = if no_delay {
        IntervalScheduler::without_delay()
    } else {
        IntervalScheduler::new()
    };
    let ticks_per_phase = mergesim::models::PhaseSimulator::ticks_per_phase(scenario.sim.phase_increment);
    let sink = (TracingSink::new((ticks_per_phase / 5).max(1)), json_sink);

    let mut controller = SimulationController::new(scheduler, sink);
    controller.start(scenario.simulation_config())?;

    let relocations: Vec<(u64, SimulationConfig)> = scenario
        .relocations
        .iter()
        .map(|relocation| (relocation.at_tick, scenario.relocation_config(relocation)))
        .collect();

    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    let report = runtime.block_on(run_until_arrival(&mut controller, &relocations, async {
        // シグナル待機に失敗した場合は停止要求として扱わない
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    }))?;

    if !report.cancelled {
        print_result(&controller, &report);
    }

    if let Some(json_sink) = controller.sink_mut().1.as_mut() {
        let written = json_sink.finish()?;
        if let Some(path) = &output_path {
            println!("スナップショット {}件を出力しました: {}", written, path);
        }
    }

    Ok(report)
}

fn print_result<S, R>(controller: &SimulationController<S, R>, report: &RunReport)
where
    S: mergesim::simulation::IScheduler,
    R: mergesim::simulation::ISnapshotSink,
{
    println!();
    println!("=== シミュレーション結果 ===");
    println!("総ティック数: {} (再構築: {}回)", report.ticks, report.restarts);

    if let Some(state) = &report.final_state {
        println!("最終フェーズ: {}", state.phase);
        println!("合流地点: {}", state.meeting_point);
        println!("到着位置: {}", state.merged_position);
    }

    if let Some(summary) = controller.route_summary() {
        for (index, leg) in summary.agent_legs_km.iter().enumerate() {
            println!("  A{:03} → 合流地点: {:.3}km", index + 1, leg);
        }
        println!("  合流地点 → 目的地: {:.3}km", summary.shared_leg_km);
        println!("総移動距離: {:.3}km (個別直行の場合: {:.3}km)", summary.total_km, summary.direct_total_km);
    }
}

/// デフォルトヘルプとシナリオ一覧を表示
fn show_default_help() {
    println!("使用方法:");
    println!("  mergesim [オプション]");
    println!();
    println!("オプション:");
    println!("  -s, --scenario <FILE>  シナリオファイルを指定して実行");
    println!("  -d, --demo             組み込みの配送シナリオで実行");
    println!("  -i, --info             シナリオ情報のみ表示");
    println!("  -o, --output <FILE>    スナップショットをJSON Linesで出力");
    println!("      --no-delay         ティック間隔を待たずに実行");
    println!("  -v, --verbose          詳細出力 (複数指定で詳細レベル上昇)");
    println!("  -h, --help             このヘルプを表示");
    println!();
    println!("利用可能なシナリオファイル:");
    println!("  scenarios/delivery_merge.yaml     - ドライバー3名の基本シナリオ");
    println!("  scenarios/four_drivers.yaml       - ドライバー4名のシナリオ");
    println!("  scenarios/relocation.yaml         - 途中で位置が変わるシナリオ");
    println!();
    println!("例:");
    println!("  mergesim --demo");
    println!("  mergesim -s scenarios/delivery_merge.yaml -v");
    println!("  mergesim -s scenarios/relocation.yaml -o trace.jsonl --no-delay");
    println!("  mergesim -s scenarios/four_drivers.yaml -i");
}
