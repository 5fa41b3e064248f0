//! Loudness outlier detection across a project's songs
//!
//! Aggregation is a single-threaded pass over finished measurements. Means
//! are rounded to 4 decimal places and songs without a measurement are
//! ignored. A song is flagged when its average deviates from the mean
//! average in either direction, or failing that, when its peak is above the
//! mean peak. Peaks below the mean are never flagged.

use std::path::PathBuf;

use super::loudness_meter::Measurement;
use crate::models::Project;

/// One song's row in an analysis
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SongLoudness {
    pub track_number: u32,
    pub track_name: String,
    pub path: PathBuf,
    pub average_db: Option<f64>,
    pub peak_db: Option<f64>,
    pub warning: Option<String>,
}

impl SongLoudness {
    pub fn set_measurement(&mut self, measurement: Option<Measurement>) {
        self.average_db = measurement.map(|m| m.average_db);
        self.peak_db = measurement.map(|m| m.peak_db);
    }
}

/// Project-wide means after a pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoudnessSummary {
    pub average_db: f64,
    pub average_peak_db: f64,
    pub flagged_songs: usize,
}

/// Rows for every song of `project`, ordered by track number
pub fn analysis_rows(project: &Project) -> Vec<SongLoudness> {
    let mut rows: Vec<SongLoudness> = project
        .songs()
        .map(|song| SongLoudness {
            track_number: song.track_number,
            track_name: song.track_name.clone(),
            path: song.output_path.clone(),
            ..Default::default()
        })
        .collect();
    rows.sort_by_key(|r| r.track_number);
    rows
}

/// Mean of the present values rounded to 4 decimals; 0 when none are present
pub fn rounded_mean(values: impl Iterator<Item = Option<f64>>) -> f64 {
    let (sum, count) = values
        .flatten()
        .fold((0.0_f64, 0_usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        return 0.0;
    }
    ((sum / count as f64) * 10_000.0).round() / 10_000.0
}

#[derive(Debug, Clone, Copy)]
pub struct LoudnessAnalyzer {
    threshold_db: f64,
}

impl Default for LoudnessAnalyzer {
    fn default() -> Self {
        Self::new(4.0)
    }
}

impl LoudnessAnalyzer {
    pub fn new(threshold_db: f64) -> Self {
        Self { threshold_db }
    }

    /// Recompute means and every song's warning
    pub fn aggregate(&self, rows: &mut [SongLoudness]) -> LoudnessSummary {
        let average_db = rounded_mean(rows.iter().map(|r| r.average_db));
        let average_peak_db = rounded_mean(rows.iter().map(|r| r.peak_db));

        let mut flagged_songs = 0;
        for row in rows.iter_mut() {
            row.warning = self.check(row, average_db, average_peak_db);
            if row.warning.is_some() {
                flagged_songs += 1;
            }
        }

        LoudnessSummary {
            average_db,
            average_peak_db,
            flagged_songs,
        }
    }

    /// Replace one song's measurement and recompute, since the means shift
    pub fn update_measurement(
        &self,
        rows: &mut [SongLoudness],
        index: usize,
        measurement: Option<Measurement>,
    ) -> Option<LoudnessSummary> {
        rows.get_mut(index)?.set_measurement(measurement);
        Some(self.aggregate(rows))
    }

    fn check(&self, row: &SongLoudness, average_db: f64, average_peak_db: f64) -> Option<String> {
        if let Some(avg) = row.average_db.filter(|a| (a - average_db).abs() > self.threshold_db) {
            return Some(format!(
                "This song's average volume of {} differs greatly from the average volume of all songs, {}",
                avg, average_db
            ));
        }
        if let Some(peak) = row.peak_db.filter(|p| p - average_peak_db > self.threshold_db) {
            return Some(format!(
                "This song's peak volume of {} differs greatly from the average peak volume of all songs, {}",
                peak, average_peak_db
            ));
        }
        None
    }
}
