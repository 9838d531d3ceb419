//! Activity directory loading
//!
//! A directory holds one `<id>.json` metadata file per activity and, when
//! streams were fetched, a matching `<id>.csv`. Activities are extracted in
//! parallel; one that cannot be read or extracted is skipped with a
//! warning and the rest of the window carries on.

use crate::error::{ImportError, Result};
use crate::extractor::StrainExtractor;
use crate::models::{ActivityMetadata, ActivitySample, StrainMetrics};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Accepted CSV header names per stream channel, matched case-insensitively
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamColumns {
    pub time: Vec<String>,
    pub watts: Vec<String>,
    pub heartrate: Vec<String>,
    pub cadence: Vec<String>,
    pub velocity: Vec<String>,
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|n| n.to_string()).collect()
}

impl Default for StreamColumns {
    fn default() -> Self {
        Self {
            time: names(&["time", "elapsed", "seconds"]),
            watts: names(&["watts", "power"]),
            heartrate: names(&["heartrate", "heart_rate", "hr"]),
            cadence: names(&["cadence", "rpm"]),
            velocity: names(&["velocity_smooth", "velocity", "speed"]),
        }
    }
}

impl StreamColumns {
    fn position(candidates: &[String], headers: &csv::StringRecord) -> Option<usize> {
        candidates.iter().find_map(|candidate| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(candidate))
        })
    }
}

/// Parsed stream rows plus the number of cells that were not numbers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedStream {
    pub samples: Vec<ActivitySample>,
    pub coerced_cells: usize,
}

/// Why an activity was left out of the window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedActivity {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of loading a directory
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub total_files: usize,
    pub extracted: usize,
    pub skipped: Vec<SkippedActivity>,
    pub coerced_cells: usize,
    pub duration_ms: u128,
}

impl ImportSummary {
    /// Check if every activity was extracted
    pub fn is_fully_successful(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Loads activities from a directory and extracts their strain metrics
pub struct ActivityLoader {
    extractor: StrainExtractor,
    columns: StreamColumns,
    show_progress: bool,
}

impl ActivityLoader {
    pub fn new(extractor: StrainExtractor, columns: StreamColumns) -> Self {
        Self {
            extractor,
            columns,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Metadata files in the directory, sorted by name
    pub fn discover(dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Err(ImportError::NotADirectory {
                path: dir.to_path_buf(),
            }
            .into());
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .map_or(false, |ext| ext.eq_ignore_ascii_case("json"))
            })
            .collect();
        paths.sort();
        Ok(paths)
    }

    /// Read one activity's metadata file
    pub fn read_metadata(path: &Path) -> Result<ActivityMetadata> {
        let invalid = |reason: String| ImportError::InvalidMetadata {
            path: path.to_path_buf(),
            reason,
        };
        let content = fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        let metadata: ActivityMetadata = serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))?;
        Ok(metadata)
    }

    /// Parse a stream CSV
    ///
    /// Columns are matched by synonym; unknown columns are ignored. Empty
    /// cells are absent values, other non-numeric cells are counted.
    pub fn read_stream<R: Read>(&self, reader: R, path: &Path) -> Result<ParsedStream> {
        let invalid = |reason: String| ImportError::InvalidStream {
            path: path.to_path_buf(),
            reason,
        };

        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = csv_reader
            .headers()
            .map_err(|e| invalid(e.to_string()))?
            .clone();

        let time = StreamColumns::position(&self.columns.time, &headers).ok_or_else(|| {
            ImportError::MissingTimeColumn {
                path: path.to_path_buf(),
            }
        })?;
        let watts = StreamColumns::position(&self.columns.watts, &headers);
        let heartrate = StreamColumns::position(&self.columns.heartrate, &headers);
        let cadence = StreamColumns::position(&self.columns.cadence, &headers);
        let velocity = StreamColumns::position(&self.columns.velocity, &headers);

        let mut parsed = ParsedStream::default();
        for record in csv_reader.records() {
            let record = record.map_err(|e| invalid(e.to_string()))?;
            let mut cell = |column: Option<usize>| -> Option<f64> {
                let raw = record.get(column?)?;
                if raw.is_empty() {
                    return None;
                }
                match raw.parse::<f64>() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        parsed.coerced_cells += 1;
                        None
                    }
                }
            };

            let sample = ActivitySample {
                time_seconds: cell(Some(time)),
                watts: cell(watts),
                heartrate: cell(heartrate),
                cadence: cell(cadence),
                velocity: cell(velocity),
            };
            parsed.samples.push(sample);
        }

        if parsed.coerced_cells > 0 {
            warn!(
                path = %path.display(),
                cells = parsed.coerced_cells,
                "Non-numeric stream cells read as missing"
            );
        }

        Ok(parsed)
    }

    /// Load and extract one activity from its metadata path
    pub fn load_activity(&self, metadata_path: &Path) -> Result<(StrainMetrics, usize)> {
        let metadata = Self::read_metadata(metadata_path)?;

        let stream_path = metadata_path.with_extension("csv");
        let parsed = if stream_path.is_file() {
            let file = fs::File::open(&stream_path).map_err(|e| ImportError::InvalidStream {
                path: stream_path.clone(),
                reason: e.to_string(),
            })?;
            self.read_stream(file, &stream_path)?
        } else {
            debug!(path = %metadata_path.display(), "No stream file for activity");
            ParsedStream::default()
        };

        let metrics = self.extractor.extract(&parsed.samples, &metadata)?;
        Ok((metrics, parsed.coerced_cells))
    }

    /// Extract every activity in the directory
    ///
    /// Metrics come back in file-name order. Activities that fail are listed
    /// in the summary instead.
    pub fn load_directory(&self, dir: &Path) -> Result<(Vec<StrainMetrics>, ImportSummary)> {
        let start_time = Instant::now();
        let paths = Self::discover(dir)?;
        info!(dir = %dir.display(), files = paths.len(), "Loading activities");

        let progress = self.show_progress.then(|| {
            let pb = ProgressBar::new(paths.len() as u64);
            if let Ok(style) =
                ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({msg})")
            {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb
        });

        let outcomes: Vec<(PathBuf, Result<(StrainMetrics, usize)>)> = paths
            .par_iter()
            .map(|path| {
                let outcome = self.load_activity(path);
                if let Some(pb) = &progress {
                    pb.inc(1);
                }
                (path.clone(), outcome)
            })
            .collect();

        if let Some(pb) = progress {
            pb.finish_with_message("Complete");
        }

        let mut summary = ImportSummary {
            total_files: paths.len(),
            ..ImportSummary::default()
        };
        let mut activities = Vec::with_capacity(outcomes.len());

        for (path, outcome) in outcomes {
            match outcome {
                Ok((metrics, coerced)) => {
                    summary.coerced_cells += coerced;
                    activities.push(metrics);
                }
                Err(err) if err.is_per_activity() => {
                    warn!(path = %path.display(), error = %err, "Skipping activity");
                    summary.skipped.push(SkippedActivity {
                        path,
                        reason: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }
        }

        summary.extracted = activities.len();
        summary.duration_ms = start_time.elapsed().as_millis();
        info!(
            extracted = summary.extracted,
            skipped = summary.skipped.len(),
            coerced_cells = summary.coerced_cells,
            duration_ms = summary.duration_ms as u64,
            "Activity directory loaded"
        );

        Ok((activities, summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::ExtractionConfig;
    use crate::error::StrainError;
    use crate::models::{ActivityType, EstimateMethod};
    use tempfile::tempdir;

    fn loader() -> ActivityLoader {
        ActivityLoader::new(
            StrainExtractor::new(&ExtractionConfig::default()),
            StreamColumns::default(),
        )
    }

    #[test]
    fn test_read_stream_with_synonyms() {
        let csv = "Elapsed,Power,HR,extra\n0,100,120,x\n1,abc,121,y\n2,,122,z\n";
        let parsed = loader().read_stream(csv.as_bytes(), Path::new("s.csv")).unwrap();

        assert_eq!(parsed.samples.len(), 3);
        assert_eq!(parsed.coerced_cells, 1);
        assert_eq!(parsed.samples[0].watts, Some(100.0));
        assert_eq!(parsed.samples[1].watts, None);
        assert_eq!(parsed.samples[2].watts, None);
        assert_eq!(parsed.samples[2].heartrate, Some(122.0));
        assert_eq!(parsed.samples[0].cadence, None);
    }

    #[test]
    fn test_stream_without_time_column() {
        let err = loader()
            .read_stream("watts\n100\n".as_bytes(), Path::new("s.csv"))
            .unwrap_err();
        assert!(matches!(
            err,
            StrainError::Import(ImportError::MissingTimeColumn { .. })
        ));
        assert!(err.is_per_activity());
    }

    #[test]
    fn test_load_directory_skips_bad_activities() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("1.json"),
            r#"{"id": 1, "type": "Ride", "start_date_local": "2024-05-01T08:00:00", "ftp": 200}"#,
        )
        .unwrap();
        let mut stream = String::from("time,watts,heartrate\n");
        for t in 0..120 {
            stream.push_str(&format!("{},110,125\n", t));
        }
        fs::write(dir.path().join("1.csv"), stream).unwrap();

        fs::write(dir.path().join("2.json"), "{ not json").unwrap();
        fs::write(
            dir.path().join("3.json"),
            r#"{"id": "3", "type": "Walk", "start_date_local": "2024-05-02T08:00:00"}"#,
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let (activities, summary) = loader().load_directory(dir.path()).unwrap();

        assert_eq!(summary.total_files, 3);
        assert_eq!(activities.len(), 1);
        assert_eq!(summary.skipped.len(), 2);
        assert!(!summary.is_fully_successful());

        let ride = &activities[0];
        assert_eq!(ride.activity_id.as_deref(), Some("1"));
        assert_eq!(ride.activity_type, ActivityType::Ride);
        assert_eq!(ride.date.as_deref(), Some("2024-05-01"));
        assert_eq!(ride.estimate_method, EstimateMethod::PowerStream);
        assert!((ride.intensity_factor.unwrap() - 0.55).abs() < 1e-9);
    }

    #[test]
    fn test_missing_directory() {
        let err = loader().load_directory(Path::new("/no/such/dir")).unwrap_err();
        assert!(matches!(err, StrainError::Import(ImportError::NotADirectory { .. })));
    }
}
