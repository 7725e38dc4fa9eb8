//! スナップショットの出力先（描画側コラボレータ）の実装

use crate::models::{Phase, SimulationState};
use crate::simulation::ISnapshotSink;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("出力ファイルの書き込みに失敗しました: {0}")]
    Io(#[from] std::io::Error),

    #[error("スナップショットのシリアライズに失敗しました: {0}")]
    Json(#[from] serde_json::Error),
}

/// スナップショットを構造化ログとして出力するシンク
///
/// 毎ティックの状態はDEBUG、`report_every` ティックごとの進行状況はINFOで出力します。
pub struct TracingSink {
    report_every: u64,
    last_phase: Option<Phase>,
}

impl TracingSink {
    pub fn new(report_every: u64) -> Self {
        Self {
            report_every: report_every.max(1),
            last_phase: None,
        }
    }
}

impl ISnapshotSink for TracingSink {
    fn publish(&mut self, state: &SimulationState) {
        let positions = state.visible_positions();
        debug!(
            tick = state.tick,
            phase = %state.phase,
            approach_progress = state.approach_progress,
            home_progress = state.home_progress,
            markers = positions.len(),
            "SNAPSHOT"
        );

        if state.tick % self.report_every == 0 || self.last_phase != Some(state.phase) {
            let lead = positions.first().copied().unwrap_or(state.merged_position);
            info!(
                "進行状況: ティック {} [{}] 合流 {:.0}% / 帰路 {:.0}% 先頭位置 {}",
                state.tick,
                state.phase,
                state.approach_progress * 100.0,
                state.home_progress * 100.0,
                lead
            );
        }
        self.last_phase = Some(state.phase);
    }
}

/// スナップショットを1行1JSONで書き出すシンク
///
/// ティック処理は失敗できないため、書き込みエラーは最初の1件を保持して以降の
/// 書き込みを止め、`finish` で呼び出し元へ返します。
pub struct JsonLinesSink<W: Write> {
    writer: W,
    written: u64,
    error: Option<OutputError>,
}

impl JsonLinesSink<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, OutputError> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            written: 0,
            error: None,
        }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    fn write_state(&mut self, state: &SimulationState) -> Result<(), OutputError> {
        serde_json::to_writer(&mut self.writer, state)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    /// バッファをフラッシュし、保留中のエラーがあれば返す
    pub fn finish(&mut self) -> Result<u64, OutputError> {
        if let Some(error) = self.error.take() {
            return Err(error);
        }
        self.writer.flush()?;
        Ok(self.written)
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ISnapshotSink for JsonLinesSink<W> {
    fn publish(&mut self, state: &SimulationState) {
        if self.error.is_some() {
            return;
        }
        match self.write_state(state) {
            Ok(()) => self.written += 1,
            Err(error) => self.error = Some(error),
        }
    }
}

impl<T: ISnapshotSink> ISnapshotSink for Option<T> {
    fn publish(&mut self, state: &SimulationState) {
        if let Some(sink) = self {
            sink.publish(state);
        }
    }
}

impl<A: ISnapshotSink, B: ISnapshotSink> ISnapshotSink for (A, B) {
    fn publish(&mut self, state: &SimulationState) {
        self.0.publish(state);
        self.1.publish(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeoPoint;

    fn state(tick: u64, phase: Phase) -> SimulationState {
        SimulationState {
            tick,
            phase,
            approach_progress: 0.5,
            home_progress: 0.0,
            meeting_point: GeoPoint::new(1.0, 2.0),
            merged_position: GeoPoint::new(1.0, 2.0),
            agent_positions: vec![GeoPoint::new(0.5, 1.0)],
        }
    }

    #[test]
    fn test_json_lines_one_object_per_snapshot() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.publish(&state(1, Phase::Approaching));
        sink.publish(&state(2, Phase::Merged));
        assert_eq!(sink.finish().unwrap(), 2);

        let output = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["tick"], 1);
        assert_eq!(first["phase"], "Approaching");
        assert_eq!(first["agent_positions"][0]["latitude"], 0.5);
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_error_is_reported_on_finish() {
        let mut sink = JsonLinesSink::new(FailingWriter);
        sink.publish(&state(1, Phase::Approaching));
        sink.publish(&state(2, Phase::Approaching));
        assert_eq!(sink.written(), 0);
        assert!(sink.finish().is_err());
    }

    #[test]
    fn test_tuple_and_option_fan_out() {
        let mut sink = (JsonLinesSink::new(Vec::new()), Some(JsonLinesSink::new(Vec::new())));
        sink.publish(&state(1, Phase::Arrived));
        assert_eq!(sink.0.written(), 1);
        assert_eq!(sink.1.as_ref().map(|s| s.written()), Some(1));

        let mut none: Option<JsonLinesSink<Vec<u8>>> = None;
        none.publish(&state(1, Phase::Arrived));
    }

    #[test]
    fn test_create_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");
        let mut sink = JsonLinesSink::create(&path).unwrap();
        sink.publish(&state(0, Phase::Approaching));
        sink.finish().unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }
}
