use std::fs::{self, File};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One row of the persisted trajectory.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    /// Cumulative training wall time in seconds.
    #[serde(rename = "Time")]
    pub time: f64,
    /// Distance estimate after the step.
    #[serde(rename = "EM")]
    pub distance: f64,
}

/// Append-only sequence of `(cumulative time, distance)` pairs, one per
/// outer training step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetricTrajectory {
    records: Vec<MetricRecord>,
}

impl MetricTrajectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            records: Vec::with_capacity(n),
        }
    }

    pub fn push(&mut self, time: f64, distance: f64) {
        debug_assert!(
            self.records.last().map_or(true, |r| r.time <= time),
            "cumulative time went backwards"
        );
        self.records.push(MetricRecord { time, distance });
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn rows(&self) -> &[MetricRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&MetricRecord> {
        self.records.last()
    }

    pub fn times(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.time).collect()
    }

    pub fn distances(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.distance).collect()
    }

    /// Write the trajectory as CSV with a `Time,EM` header, creating parent
    /// directories as needed.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(File::create(path)?);
        writer.write_record(["Time", "EM"])?;
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Load a trajectory previously written by [`MetricTrajectory::write_csv`].
    pub fn read_csv(path: impl AsRef<Path>) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let records = reader.deserialize().collect::<std::result::Result<Vec<MetricRecord>, _>>()?;
        Ok(Self { records })
    }
}
