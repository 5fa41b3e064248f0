//! Concurrent loudness analysis batch
//!
//! Songs are measured independently with bounded concurrency. Each task
//! returns its own result and rows are written only after the stream
//! drains, so no aggregate is shared while measuring. Cancellation stops
//! new measurements from starting and skips the aggregation pass.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use msu_common::{EventBus, ScripterEvent};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::loudness_analyzer::{LoudnessAnalyzer, LoudnessSummary, SongLoudness};
use super::loudness_meter::LoudnessMeter;

/// Finished analysis
#[derive(Debug)]
pub struct AnalysisOutcome {
    pub rows: Vec<SongLoudness>,
    pub summary: LoudnessSummary,
    /// Songs that could not be measured
    pub failures: Vec<(PathBuf, String)>,
    pub elapsed_ms: u64,
}

pub struct AnalysisRunner {
    meter: Arc<dyn LoudnessMeter>,
    analyzer: LoudnessAnalyzer,
    max_concurrent: usize,
    events: Option<EventBus>,
}

impl AnalysisRunner {
    pub fn new(meter: Arc<dyn LoudnessMeter>, analyzer: LoudnessAnalyzer, max_concurrent: usize) -> Self {
        Self {
            meter,
            analyzer,
            max_concurrent: max_concurrent.max(1),
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: ScripterEvent) {
        if let Some(events) = &self.events {
            events.emit_lossy(event);
        }
    }

    /// Measure every row and flag outliers
    ///
    /// Returns `None` when `cancel` fired before the batch finished.
    pub async fn run(
        &self,
        mut rows: Vec<SongLoudness>,
        cancel: &CancellationToken,
    ) -> Option<AnalysisOutcome> {
        let start = Instant::now();
        let total_songs = rows.len();
        let completed = Arc::new(AtomicUsize::new(0));

        info!(
            songs = total_songs,
            workers = self.max_concurrent,
            "Starting loudness analysis"
        );
        self.emit(ScripterEvent::AnalysisStarted {
            total_songs,
            timestamp: Utc::now(),
        });

        let jobs: Vec<(usize, PathBuf)> = rows
            .iter()
            .enumerate()
            .map(|(index, row)| (index, row.path.clone()))
            .collect();

        let results: Vec<_> = stream::iter(jobs)
            .map(|(index, path)| {
                let meter = self.meter.clone();
                let cancel = cancel.clone();
                let completed = completed.clone();
                async move {
                    if cancel.is_cancelled() {
                        return (index, path, None);
                    }

                    let result = meter.measure(&path).await;
                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    let (average_db, peak_db) = match &result {
                        Ok(m) => (Some(m.average_db), Some(m.peak_db)),
                        Err(_) => (None, None),
                    };
                    self.emit(ScripterEvent::SongMeasured {
                        path: path.clone(),
                        completed: done,
                        total_songs,
                        average_db,
                        peak_db,
                    });
                    (index, path, Some(result))
                }
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        if cancel.is_cancelled() {
            let done = completed.load(Ordering::Relaxed);
            info!(completed = done, total = total_songs, "Loudness analysis cancelled");
            self.emit(ScripterEvent::AnalysisCancelled {
                completed: done,
                total_songs,
            });
            return None;
        }

        let mut failures = Vec::new();
        for (index, path, result) in results {
            match result {
                Some(Ok(measurement)) => {
                    debug!(file = %path.display(), average_db = measurement.average_db, "Measured song");
                    rows[index].set_measurement(Some(measurement));
                }
                Some(Err(e)) => {
                    warn!(file = %path.display(), error = %e, "Could not measure song");
                    rows[index].set_measurement(None);
                    failures.push((path, e.to_string()));
                }
                None => {}
            }
        }

        let summary = self.analyzer.aggregate(&mut rows);
        let elapsed_ms = start.elapsed().as_millis() as u64;

        info!(
            average_db = summary.average_db,
            average_peak_db = summary.average_peak_db,
            flagged = summary.flagged_songs,
            failed = failures.len(),
            elapsed_ms,
            "Loudness analysis complete"
        );
        self.emit(ScripterEvent::AnalysisCompleted {
            average_db: summary.average_db,
            average_peak_db: summary.average_peak_db,
            flagged_songs: summary.flagged_songs,
            elapsed_ms,
        });

        Some(AnalysisOutcome {
            rows,
            summary,
            failures,
            elapsed_ms,
        })
    }
}
