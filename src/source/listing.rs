//! Input discovery.

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::config::SourceConfig;
use crate::error::StorageError;
use crate::storage::{StorageProvider, list_files_with_suffix};

/// Inclusive day range applied to hourly GH Archive file names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn from_config(config: &SourceConfig) -> Self {
        Self {
            start: config.start_date,
            end: config.end_date,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start.is_none_or(|start| day >= start) && self.end.is_none_or(|end| day <= end)
    }

    /// Whether a listed path falls inside the range.
    ///
    /// Paths without a `YYYY-MM-DD-H` file name only pass an unbounded range.
    pub fn admits(&self, path: &str) -> bool {
        if self.is_unbounded() {
            return true;
        }
        hour_stamp(path).is_some_and(|(day, _)| self.contains(day))
    }
}

/// Parse the day and hour from a file named like `2018-04-01-13.json.gz`.
pub fn hour_stamp(path: &str) -> Option<(NaiveDate, u32)> {
    let name = path.rsplit('/').next()?;
    let stem = name.split('.').next()?;
    let (day, hour) = stem.rsplit_once('-')?;
    let day = NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()?;
    let hour: u32 = hour.parse().ok()?;
    (hour < 24).then_some((day, hour))
}

/// List the input files to process, sorted by path.
pub async fn list_input_files(
    storage: &StorageProvider,
    config: &SourceConfig,
) -> Result<Vec<String>, StorageError> {
    let range = DateRange::from_config(config);
    let listed = list_files_with_suffix(storage, &config.suffix).await?;
    let total = listed.len();

    let files: Vec<String> = listed.into_iter().filter(|p| range.admits(p)).collect();
    if files.len() < total {
        debug!(
            "Date range {:?}..={:?} excluded {} files",
            range.start,
            range.end,
            total - files.len()
        );
    }

    info!(
        "Found {} input files under {}",
        files.len(),
        storage.canonical_url()
    );
    Ok(files)
}
