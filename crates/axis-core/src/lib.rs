//! Foundational low-level utilities shared across Axis crates.
//!
//! Provides atomic file-write helpers used by the status mirror and content
//! writer, size-rotated NDJSON appends used by the transcript store, and unix
//! time helpers.

pub mod atomic_io;
pub mod log_rotation;
pub mod time_utils;

pub use atomic_io::write_text_atomic;
pub use log_rotation::{append_line_with_rotation, rotated_backup_path, LogRotationPolicy};
pub use time_utils::{current_unix_timestamp_ms, elapsed_unix_ms_since};

#[cfg(test)]
mod tests {
    use std::fs::read_to_string;

    use super::*;

    #[test]
    fn unit_elapsed_saturates_for_future_start() {
        let now_ms = current_unix_timestamp_ms();
        assert!(now_ms > 0);
        assert_eq!(elapsed_unix_ms_since(now_ms.saturating_add(60_000)), 0);
        assert!(elapsed_unix_ms_since(now_ms.saturating_sub(5)) >= 5);
    }

    #[test]
    fn functional_write_text_atomic_replaces_existing_content() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("status.json");
        write_text_atomic(&path, "first").expect("write first");
        write_text_atomic(&path, "second").expect("write second");
        let contents = read_to_string(&path).expect("read");
        assert_eq!(contents, "second");
    }

    #[test]
    fn regression_write_text_atomic_leaves_no_temp_files_behind() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("nested").join("status.json");
        for index in 0..8 {
            write_text_atomic(&path, &format!("value-{index}")).expect("write");
        }
        let entries = std::fs::read_dir(path.parent().expect("parent"))
            .expect("read dir")
            .count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn regression_write_text_atomic_rejects_directory_destination() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let error = write_text_atomic(tempdir.path(), "x").expect_err("directory destination");
        assert!(error.to_string().contains("is a directory"));
    }
}
