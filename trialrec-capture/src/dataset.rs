//! Dataset folder layout.
//!
//! ```text
//! <root>/
//!   Trial_<n>/frame_<i>.jpg
//!   TrialData_<n>.json
//! ```

use crate::error::{Error, Result};
use crate::event::LogEntry;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const TRIAL_DIR_PREFIX: &str = "Trial_";

#[derive(Debug, Clone)]
pub struct Dataset {
    root: PathBuf,
}

impl Dataset {
    /// Bind `root`, creating it when missing.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        info!("dataset bound at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Trial numbers that have a `Trial_<n>` folder, ascending.
    pub fn scan_trials(&self) -> Result<Vec<u64>> {
        let mut trials = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(n) = entry.file_name().to_str().and_then(parse_trial_dir_name) {
                trials.push(n);
            }
        }
        trials.sort_unstable();
        debug!("found trials {:?} in {}", trials, self.root.display());
        Ok(trials)
    }

    pub fn last_trial(&self) -> Result<Option<u64>> {
        Ok(self.scan_trials()?.last().copied())
    }

    pub fn trial_dir(&self, trial: u64) -> PathBuf {
        self.root.join(format!("{}{}", TRIAL_DIR_PREFIX, trial))
    }

    pub fn log_path(&self, trial: u64) -> PathBuf {
        self.root.join(format!("TrialData_{}.json", trial))
    }

    pub fn create_trial_dir(&self, trial: u64) -> Result<PathBuf> {
        let dir = self.trial_dir(trial);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn write_log(&self, trial: u64, entries: &[LogEntry]) -> Result<PathBuf> {
        let path = self.log_path(trial);
        let mut out = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(&mut out, entries)?;
        out.flush()?;
        info!("wrote {} entries to {}", entries.len(), path.display());
        Ok(path)
    }

    pub fn read_log(&self, trial: u64) -> Result<Vec<LogEntry>> {
        let path = self.log_path(trial);
        if !path.is_file() {
            return Err(Error::TrialNotFound { trial, path });
        }
        let file = File::open(&path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

/// Highest of `trials` plus one, or 0 for an empty dataset.
pub fn next_trial_number(trials: &[u64]) -> u64 {
    trials.iter().max().map_or(0, |n| n + 1)
}

/// `Trial_12` -> `Some(12)`. Anything else, including `Trial_` or `Trial_1a`, is ignored.
pub fn parse_trial_dir_name(name: &str) -> Option<u64> {
    let digits = name.strip_prefix(TRIAL_DIR_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::LogEntry;

    #[test]
    fn parses_only_numbered_trial_dirs() {
        assert_eq!(parse_trial_dir_name("Trial_0"), Some(0));
        assert_eq!(parse_trial_dir_name("Trial_42"), Some(42));
        assert_eq!(parse_trial_dir_name("Trial_"), None);
        assert_eq!(parse_trial_dir_name("Trial_-1"), None);
        assert_eq!(parse_trial_dir_name("Trial_3b"), None);
        assert_eq!(parse_trial_dir_name("trial_3"), None);
        assert_eq!(parse_trial_dir_name("TrialData_3.json"), None);
    }

    #[test]
    fn empty_dataset_starts_at_zero() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = Dataset::open(dir.path().join("new")).unwrap();
        assert!(dataset.root().is_dir());
        assert_eq!(dataset.last_trial().unwrap(), None);
        assert_eq!(next_trial_number(&dataset.scan_trials().unwrap()), 0);
    }

    #[test]
    fn next_trial_skips_gaps_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = Dataset::open(dir.path()).unwrap();
        fs::create_dir(dataset.trial_dir(0)).unwrap();
        fs::create_dir(dataset.trial_dir(2)).unwrap();
        fs::create_dir(dir.path().join("Trial_notes")).unwrap();
        File::create(dir.path().join("Trial_9")).unwrap();

        assert_eq!(dataset.scan_trials().unwrap(), vec![0, 2]);
        assert_eq!(next_trial_number(&dataset.scan_trials().unwrap()), 3);
    }

    #[test]
    fn log_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = Dataset::open(dir.path()).unwrap();
        let entries = vec![
            LogEntry::trial_start(1, 1_700_000_000.123_456),
            LogEntry::trial_end(1, 1_700_000_005.5),
        ];
        let path = dataset.write_log(1, &entries).unwrap();
        assert_eq!(path.file_name().unwrap(), "TrialData_1.json");
        assert_eq!(dataset.read_log(1).unwrap(), entries);
    }

    #[test]
    fn missing_log_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = Dataset::open(dir.path()).unwrap();
        assert!(matches!(
            dataset.read_log(5),
            Err(Error::TrialNotFound { trial: 5, .. })
        ));
    }
}
