use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

const DEFAULT_LOG_ROTATION_MAX_BYTES: u64 = 4 * 1024 * 1024;
const DEFAULT_LOG_ROTATION_MAX_FILES: usize = 3;
const MAX_BYTES_ENV: &str = "AXIS_LOG_ROTATION_MAX_BYTES";
const MAX_FILES_ENV: &str = "AXIS_LOG_ROTATION_MAX_FILES";

/// Size-based rotation settings for append-only NDJSON files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRotationPolicy {
    pub max_bytes: u64,
    pub max_files: usize,
}

impl Default for LogRotationPolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_LOG_ROTATION_MAX_BYTES,
            max_files: DEFAULT_LOG_ROTATION_MAX_FILES,
        }
    }
}

impl LogRotationPolicy {
    /// Reads `AXIS_LOG_ROTATION_MAX_BYTES` / `AXIS_LOG_ROTATION_MAX_FILES`,
    /// keeping defaults for missing, zero, or unparsable values.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_bytes: positive_env_value(MAX_BYTES_ENV).unwrap_or(defaults.max_bytes),
            max_files: positive_env_value(MAX_FILES_ENV)
                .and_then(|value: u64| usize::try_from(value).ok())
                .unwrap_or(defaults.max_files),
        }
    }

    pub fn is_enabled(self) -> bool {
        self.max_bytes > 0 && self.max_files > 0
    }
}

fn positive_env_value(key: &str) -> Option<u64> {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
}

/// Appends one NDJSON line to `path`, rotating first when the line would
/// push the active file past `policy.max_bytes`.
pub fn append_line_with_rotation(path: &Path, line: &str, policy: LogRotationPolicy) -> Result<()> {
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    if policy.is_enabled() && path.exists() {
        let current_size = std::fs::metadata(path)
            .with_context(|| format!("failed to stat {}", path.display()))?
            .len();
        let incoming_size = u64::try_from(line.len().saturating_add(1)).unwrap_or(u64::MAX);
        if current_size.saturating_add(incoming_size) > policy.max_bytes {
            rotate(path, policy)?;
        }
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    writeln!(file, "{line}").with_context(|| format!("failed to append {}", path.display()))?;
    file.flush()
        .with_context(|| format!("failed to flush {}", path.display()))
}

/// Path of the `index`-th rotated backup (`<path>.1` is the newest).
pub fn rotated_backup_path(path: &Path, index: usize) -> PathBuf {
    PathBuf::from(format!("{}.{}", path.display(), index))
}

fn rotate(path: &Path, policy: LogRotationPolicy) -> Result<()> {
    if policy.max_files <= 1 {
        return std::fs::remove_file(path)
            .with_context(|| format!("failed to truncate {}", path.display()));
    }

    let oldest = policy.max_files - 1;
    let oldest_path = rotated_backup_path(path, oldest);
    if oldest_path.exists() {
        std::fs::remove_file(&oldest_path)
            .with_context(|| format!("failed to prune {}", oldest_path.display()))?;
    }
    for index in (1..oldest).rev() {
        let source = rotated_backup_path(path, index);
        if source.exists() {
            let destination = rotated_backup_path(path, index + 1);
            std::fs::rename(&source, &destination).with_context(|| {
                format!(
                    "failed to shift {} to {}",
                    source.display(),
                    destination.display()
                )
            })?;
        }
    }
    let first_backup = rotated_backup_path(path, 1);
    std::fs::rename(path, &first_backup).with_context(|| {
        format!(
            "failed to rotate {} to {}",
            path.display(),
            first_backup.display()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::{append_line_with_rotation, rotated_backup_path, LogRotationPolicy};

    fn read(path: &std::path::Path) -> String {
        std::fs::read_to_string(path).unwrap_or_default()
    }

    #[test]
    fn functional_append_rotates_when_threshold_is_exceeded() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("transcript.jsonl");
        let policy = LogRotationPolicy {
            max_bytes: 24,
            max_files: 3,
        };

        append_line_with_rotation(&path, r#"{"role":"user","n":1}"#, policy).expect("first");
        append_line_with_rotation(&path, r#"{"role":"user","n":2}"#, policy).expect("second");

        assert!(read(&rotated_backup_path(&path, 1)).contains("\"n\":1"));
        assert!(read(&path).contains("\"n\":2"));
    }

    #[test]
    fn regression_append_keeps_at_most_max_files_minus_one_backups() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("transcript.jsonl");
        let policy = LogRotationPolicy {
            max_bytes: 12,
            max_files: 2,
        };

        for seq in 1..=6 {
            append_line_with_rotation(&path, &format!(r#"{{"n":{seq}}}"#), policy)
                .expect("append");
        }

        assert!(rotated_backup_path(&path, 1).exists());
        assert!(!rotated_backup_path(&path, 2).exists());
        assert!(read(&path).contains("\"n\":6"));
        assert!(read(&rotated_backup_path(&path, 1)).contains("\"n\":5"));
    }

    #[test]
    fn unit_disabled_policy_never_rotates() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("transcript.jsonl");
        let policy = LogRotationPolicy {
            max_bytes: 0,
            max_files: 0,
        };
        for seq in 1..=4 {
            append_line_with_rotation(&path, &format!(r#"{{"n":{seq}}}"#), policy)
                .expect("append");
        }
        assert_eq!(read(&path).lines().count(), 4);
        assert!(!rotated_backup_path(&path, 1).exists());
    }
}
