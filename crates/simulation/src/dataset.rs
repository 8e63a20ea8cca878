//! Replay dataset feed.
//!
//! A CSV with a header row and one row per step:
//!
//! ```text
//! timestamp,grid_status,grid_price,peak_period,house_a_solar,house_a_load,house_b_solar,house_b_load
//! 13:00:00,ON,38.0,OFF_PEAK,5.0,0.5,0.0,1.0
//! ```
//!
//! `peak_period` is optional and informational.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use types::{GridStatus, Price, WorldState};

use crate::error::DatasetError;

/// Grid availability as written in the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum FeedGridStatus {
    #[serde(rename = "ON", alias = "ONLINE")]
    On,
    #[serde(rename = "OFF", alias = "BLACKOUT")]
    Off,
}

impl From<FeedGridStatus> for GridStatus {
    fn from(status: FeedGridStatus) -> Self {
        match status {
            FeedGridStatus::On => GridStatus::Online,
            FeedGridStatus::Off => GridStatus::Blackout,
        }
    }
}

/// One step of inputs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatasetRow {
    pub timestamp: String,
    pub grid_status: FeedGridStatus,
    pub grid_price: f64,
    #[serde(default)]
    pub peak_period: Option<String>,
    pub house_a_solar: f64,
    pub house_a_load: f64,
    pub house_b_solar: f64,
    pub house_b_load: f64,
}

impl DatasetRow {
    fn validate(&self, row: usize) -> Result<(), DatasetError> {
        let fields = [
            ("grid_price", self.grid_price),
            ("house_a_solar", self.house_a_solar),
            ("house_a_load", self.house_a_load),
            ("house_b_solar", self.house_b_solar),
            ("house_b_load", self.house_b_load),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(DatasetError::InvalidRow {
                    row,
                    reason: format!("{name} must be a non-negative number, got {value}"),
                });
            }
        }
        Ok(())
    }

    /// Write this row's inputs into `world`: clock, grid, and both
    /// households' solar and load.
    pub fn apply(&self, world: &mut WorldState) {
        world.simulation.clock = self.timestamp.clone();
        world.grid.set_status(self.grid_status.into());
        world.grid.price_per_unit = Price::from_float(self.grid_price);
        world.house_a.solar_output = self.house_a_solar;
        world.house_a.current_load = self.house_a_load;
        world.house_b.solar_output = self.house_b_solar;
        world.house_b.current_load = self.house_b_load;
    }
}

/// Ordered, finite sequence of dataset rows.
#[derive(Debug, Clone)]
pub struct DatasetFeed {
    rows: Vec<DatasetRow>,
    cursor: usize,
}

impl DatasetFeed {
    /// Load the whole dataset. A missing or empty file is an error.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| DatasetError::NotFound {
            path: path.to_path_buf(),
            source,
        })?;
        let feed = Self::from_reader(file)?;
        if feed.is_empty() {
            return Err(DatasetError::Empty(path.to_path_buf()));
        }
        Ok(feed)
    }

    /// Parse rows from any CSV source. May be empty.
    pub fn from_reader(reader: impl Read) -> Result<Self, DatasetError> {
        let mut csv = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut rows = Vec::new();
        for (i, record) in csv.deserialize::<DatasetRow>().enumerate() {
            let row = record?;
            row.validate(i + 1)?;
            rows.push(row);
        }
        Ok(Self::from_rows(rows))
    }

    pub fn from_rows(rows: Vec<DatasetRow>) -> Self {
        Self { rows, cursor: 0 }
    }

    /// Next row, or `None` once the dataset is exhausted.
    pub fn next_row(&mut self) -> Option<&DatasetRow> {
        let row = self.rows.get(self.cursor)?;
        self.cursor += 1;
        Some(row)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.rows.len() - self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CSV: &str = "\
timestamp,grid_status,grid_price,peak_period,house_a_solar,house_a_load,house_b_solar,house_b_load
13:00:00,ON,38.0,OFF_PEAK,5.0,0.5,0.0,1.0
19:30:00,OFF,0,PEAK,0.0,1.0,0.0,2.5
";

    #[test]
    fn test_parse_rows() {
        let mut feed = DatasetFeed::from_reader(CSV.as_bytes()).unwrap();
        assert_eq!(feed.len(), 2);

        let first = feed.next_row().unwrap().clone();
        assert_eq!(first.grid_status, FeedGridStatus::On);
        assert_eq!(first.peak_period.as_deref(), Some("OFF_PEAK"));

        let second = feed.next_row().unwrap().clone();
        assert_eq!(second.grid_status, FeedGridStatus::Off);
        assert!(feed.next_row().is_none());
        assert_eq!(feed.remaining(), 0);
    }

    #[test]
    fn test_peak_period_is_optional() {
        let csv = "\
timestamp,grid_status,grid_price,house_a_solar,house_a_load,house_b_solar,house_b_load
06:00:00,ON,38,0.3,0.5,0,1
";
        let mut feed = DatasetFeed::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(feed.next_row().unwrap().peak_period, None);
    }

    #[test]
    fn test_apply_sets_inputs() {
        let mut feed = DatasetFeed::from_reader(CSV.as_bytes()).unwrap();
        feed.next_row();
        let row = feed.next_row().unwrap();

        let mut world = WorldState::initial();
        row.apply(&mut world);
        assert_eq!(world.simulation.clock, "19:30:00");
        assert_eq!(world.grid.status, GridStatus::Blackout);
        assert_eq!(world.grid.voltage, 0);
        assert_eq!(world.grid.price_per_unit, Price::ZERO);
        assert_eq!(world.house_b.current_load, 2.5);
        // Core-owned fields are untouched.
        assert_eq!(world.house_a.battery_level, 85.0);
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = DatasetFeed::from_path(dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(err, DatasetError::NotFound { .. }));
    }

    #[test]
    fn test_header_only_file_is_empty() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "timestamp,grid_status,grid_price,house_a_solar,house_a_load,house_b_solar,house_b_load"
        )
        .unwrap();
        let err = DatasetFeed::from_path(file.path()).unwrap_err();
        assert!(matches!(err, DatasetError::Empty(_)));
    }

    #[test]
    fn test_bad_status_is_rejected() {
        let csv = "\
timestamp,grid_status,grid_price,house_a_solar,house_a_load,house_b_solar,house_b_load
06:00:00,MAYBE,38,0.3,0.5,0,1
";
        assert!(matches!(
            DatasetFeed::from_reader(csv.as_bytes()),
            Err(DatasetError::Csv(_))
        ));
    }

    #[test]
    fn test_negative_load_is_rejected() {
        let csv = "\
timestamp,grid_status,grid_price,house_a_solar,house_a_load,house_b_solar,house_b_load
06:00:00,ON,38,0.3,-0.5,0,1
";
        assert!(matches!(
            DatasetFeed::from_reader(csv.as_bytes()),
            Err(DatasetError::InvalidRow { row: 1, .. })
        ));
    }
}
