//! Event types for MSU Scripter progress notifications
//!
//! Long-running operations (loudness analysis batches, PCM relocation during
//! conversion) publish events on an [`EventBus`]. Subscribers are optional:
//! operations never fail because nobody is listening.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::broadcast;

/// How a file was relocated during a conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelocationKind {
    /// Two files traded names
    Swapped,
    /// A file was renamed onto a free path
    Moved,
    /// A hard link was created at the new path
    Linked,
}

/// MSU Scripter event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ScripterEvent {
    /// Loudness analysis batch started
    AnalysisStarted {
        /// Number of songs queued for measurement
        total_songs: usize,
        timestamp: DateTime<Utc>,
    },

    /// One song finished measuring (successfully or not)
    SongMeasured {
        path: PathBuf,
        /// Songs completed so far, including this one
        completed: usize,
        total_songs: usize,
        average_db: Option<f64>,
        peak_db: Option<f64>,
    },

    /// Batch finished and outlier flags were computed
    AnalysisCompleted {
        average_db: f64,
        average_peak_db: f64,
        flagged_songs: usize,
        elapsed_ms: u64,
    },

    /// Batch was cancelled; no aggregation was performed
    AnalysisCancelled { completed: usize, total_songs: usize },

    /// A PCM file changed name on disk
    FileRelocated {
        from: PathBuf,
        to: PathBuf,
        kind: RelocationKind,
    },
}

/// Broadcast event bus
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ScripterEvent>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow subscribers lose the oldest events once `capacity` is exceeded.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<ScripterEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: ScripterEvent,
    ) -> Result<usize, broadcast::error::SendError<ScripterEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ScripterEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers_is_err() {
        let bus = EventBus::new(8);
        let result = bus.emit(ScripterEvent::AnalysisCancelled {
            completed: 0,
            total_songs: 3,
        });
        assert!(result.is_err());
        // Lossy emit must not panic either
        bus.emit_lossy(ScripterEvent::AnalysisCancelled {
            completed: 0,
            total_songs: 3,
        });
    }

    #[tokio::test]
    async fn test_subscriber_receives_relocation() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.emit(ScripterEvent::FileRelocated {
            from: PathBuf::from("pack-1.pcm"),
            to: PathBuf::from("pack-101.pcm"),
            kind: RelocationKind::Moved,
        })
        .unwrap();

        match rx.recv().await.unwrap() {
            ScripterEvent::FileRelocated { to, kind, .. } => {
                assert_eq!(to, PathBuf::from("pack-101.pcm"));
                assert_eq!(kind, RelocationKind::Moved);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let json = serde_json::to_string(&ScripterEvent::AnalysisStarted {
            total_songs: 2,
            timestamp: Utc::now(),
        })
        .unwrap();
        assert!(json.contains("\"type\":\"AnalysisStarted\""));
    }
}
