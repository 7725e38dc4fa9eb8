//! # Logging モジュール
//!
//! 合流シミュレーションのログ管理機能を提供します。
//!
//! tracing-appenderによる非同期ファイル出力と、コンソール出力を組み合わせた
//! ログ基盤を初期化します。ティック処理の周期を乱さないよう、ファイル書き込みは
//! 別スレッドで行われます。
//!
//! ## 設定可能な出力先
//!
//! - `Console`: コンソールのみ（compact形式）
//! - `File`: ファイルのみ（JSON形式、日次ローテーション）
//! - `Both`: コンソールとファイルの両方

use std::str::FromStr;
use tracing::Level;
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// ログ出力先の設定
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogOutput {
    /// コンソールのみ
    Console,
    /// ファイルのみ
    File,
    /// コンソールとファイルの両方
    Both,
}

impl FromStr for LogOutput {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "console" | "stdout" => Ok(LogOutput::Console),
            "file" => Ok(LogOutput::File),
            "both" | "all" => Ok(LogOutput::Both),
            _ => Err(format!("無効な出力先: {}. 利用可能: console, file, both", s)),
        }
    }
}

/// ログ設定構造体
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// ログレベル（RUST_LOG が設定されている場合はそちらが優先）
    pub level: Level,
    /// 出力先
    pub output: LogOutput,
    /// ログファイルのディレクトリ（File / Both の場合）
    pub log_dir: String,
    /// ログファイル名のプレフィックス
    pub file_prefix: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            output: LogOutput::Console,
            log_dir: "logs".to_string(),
            file_prefix: "mergesim".to_string(),
        }
    }
}

impl LogConfig {
    /// `-v` の指定回数からログレベルを決定
    ///
    /// 0: 既定値のまま, 1: DEBUG, 2以上: TRACE
    pub fn with_verbosity(mut self, verbose_level: u8) -> Self {
        self.level = match verbose_level {
            0 => self.level,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        };
        self
    }

    fn writes_file(&self) -> bool {
        matches!(self.output, LogOutput::File | LogOutput::Both)
    }
}

/// ログシステムを初期化
///
/// ファイル出力を行う場合は `WorkerGuard` を返します。ガードが破棄されると
/// 未書き込みのログがフラッシュされるため、プログラム終了まで保持してください。
///
/// # 例
///
/// ```rust,ignore
/// use mergesim::logging::{init_logging, LogConfig, LogOutput};
///
/// let config = LogConfig { output: LogOutput::Both, ..LogConfig::default() };
/// let _guard = init_logging(config)?;
/// ```
pub fn init_logging(config: LogConfig) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.level.to_string()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if config.writes_file() {
        ensure_log_directory(&config.log_dir)?;
    }

    let console_layer = matches!(config.output, LogOutput::Console | LogOutput::Both).then(|| {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
    });

    let (file_layer, guard) = if config.writes_file() {
        let file_appender = rolling::daily(&config.log_dir, &config.file_prefix);
        let (non_blocking_appender, guard) = non_blocking(file_appender);
        let layer = fmt::layer()
            .with_writer(non_blocking_appender)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .json();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    Registry::default()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

/// ログレベルを文字列から解析
///
/// 無効な文字列の場合は INFO を返します。
pub fn parse_log_level(level_str: &str) -> Level {
    match level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!("警告: 無効なログレベル '{}'. INFOを使用します", level_str);
            Level::INFO
        }
    }
}

/// ログディレクトリを作成
pub fn ensure_log_directory(log_dir: &str) -> Result<(), std::io::Error> {
    std::fs::create_dir_all(log_dir)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_output_from_str() {
        assert_eq!(LogOutput::from_str("console"), Ok(LogOutput::Console));
        assert_eq!(LogOutput::from_str("FILE"), Ok(LogOutput::File));
        assert_eq!(LogOutput::from_str("all"), Ok(LogOutput::Both));
        assert!(LogOutput::from_str("syslog").is_err());
    }

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("trace"), Level::TRACE);
        assert_eq!(parse_log_level("WARN"), Level::WARN);
        assert_eq!(parse_log_level("verbose"), Level::INFO);
    }

    #[test]
    fn test_verbosity_overrides_level() {
        assert_eq!(LogConfig::default().with_verbosity(0).level, Level::INFO);
        assert_eq!(LogConfig::default().with_verbosity(1).level, Level::DEBUG);
        assert_eq!(LogConfig::default().with_verbosity(3).level, Level::TRACE);
    }

    #[test]
    fn test_ensure_log_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_log_directory(nested.to_str().unwrap()).unwrap();
        assert!(nested.is_dir());
    }
}
