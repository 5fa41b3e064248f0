//! Loudness analysis batches run through AnalysisRunner

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use msu_common::{EventBus, ScripterEvent};
use msu_scripter::services::{
    AnalysisRunner, LoudnessAnalyzer, LoudnessMeter, Measurement, MeterError, PcmLoudnessMeter,
    SongLoudness,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Meter that counts calls and reports a fixed level
#[derive(Default)]
struct CountingMeter {
    calls: AtomicUsize,
}

#[async_trait]
impl LoudnessMeter for CountingMeter {
    async fn measure(&self, _path: &Path) -> Result<Measurement, MeterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Measurement {
            average_db: -12.0,
            peak_db: -2.0,
        })
    }
}

fn row(path: PathBuf) -> SongLoudness {
    SongLoudness {
        path,
        ..Default::default()
    }
}

fn msu_pcm(samples: &[i16]) -> Vec<u8> {
    let mut bytes = b"MSU1".to_vec();
    bytes.extend_from_slice(&0u32.to_le_bytes());
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

#[tokio::test]
async fn test_cancelled_before_start_measures_nothing() {
    let meter = Arc::new(CountingMeter::default());
    let bus = EventBus::new(16);
    let mut rx = bus.subscribe();
    let runner = AnalysisRunner::new(meter.clone(), LoudnessAnalyzer::default(), 2).with_events(bus);

    let token = CancellationToken::new();
    token.cancel();
    let rows = vec![row(PathBuf::from("a.pcm")), row(PathBuf::from("b.pcm"))];

    assert!(runner.run(rows, &token).await.is_none());
    assert_eq!(meter.calls.load(Ordering::SeqCst), 0);

    let mut cancelled = None;
    let mut measured = 0;
    while let Ok(event) = rx.try_recv() {
        match event {
            ScripterEvent::AnalysisCancelled {
                completed,
                total_songs,
            } => cancelled = Some((completed, total_songs)),
            ScripterEvent::SongMeasured { .. } => measured += 1,
            _ => {}
        }
    }
    assert_eq!(cancelled, Some((0, 2)));
    assert_eq!(measured, 0);
}

#[tokio::test]
async fn test_pcm_files_on_disk_are_measured() {
    let dir = TempDir::new().unwrap();
    let loud = dir.path().join("pack-1.pcm");
    let broken = dir.path().join("pack-2.pcm");
    fs::write(&loud, msu_pcm(&[i16::MIN; 8])).unwrap();
    fs::write(&broken, b"RIFF not a pcm").unwrap();

    let runner = AnalysisRunner::new(Arc::new(PcmLoudnessMeter), LoudnessAnalyzer::default(), 2);
    let outcome = runner
        .run(vec![row(loud.clone()), row(broken.clone())], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].0, broken);
    assert!(outcome.rows[0].average_db.unwrap().abs() < 1e-9);
    assert_eq!(outcome.rows[1].average_db, None);
    assert_eq!(outcome.summary.average_db, 0.0);
}
