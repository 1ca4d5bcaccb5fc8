//! NDJSON chat transcript: one `{timestamp_unix_ms, role, content}` object per
//! line, size-rotated. It is both the orchestrator's transcript sink and the
//! source of conversational context for the answer providers.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axis_core::{append_line_with_rotation, rotated_backup_path, LogRotationPolicy};
use axis_orchestrator::{ConversationTurn, DisplayRecord, Participants, TranscriptSink};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub timestamp_unix_ms: u64,
    pub role: TranscriptRole,
    pub content: String,
}

#[derive(Debug)]
pub struct JsonlTranscriptStore {
    path: PathBuf,
    policy: LogRotationPolicy,
    write_lock: Mutex<()>,
}

impl JsonlTranscriptStore {
    pub fn new(path: impl Into<PathBuf>, policy: LogRotationPolicy) -> Self {
        Self {
            path: path.into(),
            policy,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append_entry(&self, entry: &TranscriptEntry) -> Result<()> {
        let line = serde_json::to_string(entry).context("failed to encode transcript entry")?;
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("transcript write lock poisoned"))?;
        append_line_with_rotation(&self.path, &line, self.policy)
    }

    /// The newest `limit` entries, oldest first. Reads rotated backups when
    /// the active file holds fewer than `limit`. Unparsable lines are skipped.
    pub fn recent(&self, limit: usize) -> Result<Vec<TranscriptEntry>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut newest_first: Vec<TranscriptEntry> = Vec::new();
        let backups = self.policy.max_files.saturating_sub(1);
        let files = std::iter::once(self.path.clone())
            .chain((1..=backups).map(|index| rotated_backup_path(&self.path, index)));
        for file in files {
            if newest_first.len() >= limit {
                break;
            }
            if !file.exists() {
                continue;
            }
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let entries = raw
                .lines()
                .filter(|line| !line.trim().is_empty())
                .filter_map(|line| serde_json::from_str::<TranscriptEntry>(line).ok())
                .collect::<Vec<_>>();
            newest_first.extend(entries.into_iter().rev());
        }
        newest_first.truncate(limit);
        newest_first.reverse();
        Ok(newest_first)
    }
}

#[async_trait]
impl TranscriptSink for JsonlTranscriptStore {
    async fn append_turn(&self, turn: &ConversationTurn) -> Result<()> {
        self.append_entry(&TranscriptEntry {
            timestamp_unix_ms: turn.started_unix_ms,
            role: TranscriptRole::User,
            content: turn.utterance.clone(),
        })?;
        let reply = turn.answer.clone().or_else(|| turn.error.clone());
        if let Some(content) = reply.filter(|content| !content.trim().is_empty()) {
            self.append_entry(&TranscriptEntry {
                timestamp_unix_ms: axis_core::current_unix_timestamp_ms(),
                role: TranscriptRole::Assistant,
                content,
            })?;
        }
        Ok(())
    }
}

/// Display records for previously logged entries.
pub fn transcript_display_records(
    entries: &[TranscriptEntry],
    participants: Participants<'_>,
) -> Vec<DisplayRecord> {
    entries
        .iter()
        .map(|entry| {
            let speaker = match entry.role {
                TranscriptRole::User => participants.username,
                TranscriptRole::Assistant => participants.assistant_name,
            };
            DisplayRecord::new(speaker, entry.content.as_str())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use axis_core::LogRotationPolicy;
    use axis_orchestrator::{ConversationTurn, Participants, TranscriptSink};

    use super::{
        transcript_display_records, JsonlTranscriptStore, TranscriptEntry, TranscriptRole,
    };

    fn entry(role: TranscriptRole, content: &str) -> TranscriptEntry {
        TranscriptEntry {
            timestamp_unix_ms: 1,
            role,
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn functional_append_turn_writes_user_and_assistant_lines() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = JsonlTranscriptStore::new(
            temp.path().join("chat_log.jsonl"),
            LogRotationPolicy::default(),
        );
        let mut turn = ConversationTurn::new("what time is it");
        turn.answer = Some("It is noon.".to_string());

        store.append_turn(&turn).await.expect("append");

        let recent = store.recent(10).expect("recent");
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].role, TranscriptRole::User);
        assert_eq!(recent[0].content, "what time is it");
        assert_eq!(recent[1].content, "It is noon.");
    }

    #[test]
    fn regression_recent_spans_rotated_backups_and_skips_garbage() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("chat_log.jsonl");
        let store = JsonlTranscriptStore::new(
            &path,
            LogRotationPolicy {
                max_bytes: 120,
                max_files: 3,
            },
        );
        for index in 0..4 {
            store
                .append_entry(&entry(TranscriptRole::User, &format!("message {index}")))
                .expect("append");
        }
        std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .and_then(|mut file| std::io::Write::write_all(&mut file, b"not json\n"))
            .expect("append garbage");

        let recent = store.recent(3).expect("recent");
        let contents: Vec<&str> = recent.iter().map(|entry| entry.content.as_str()).collect();
        assert_eq!(contents, vec!["message 1", "message 2", "message 3"]);
    }

    #[test]
    fn unit_missing_transcript_is_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = JsonlTranscriptStore::new(
            temp.path().join("absent.jsonl"),
            LogRotationPolicy::default(),
        );
        assert!(store.recent(5).expect("recent").is_empty());
        assert!(store.recent(0).expect("recent").is_empty());
    }

    #[test]
    fn unit_display_records_use_participant_names() {
        let records = transcript_display_records(
            &[
                entry(TranscriptRole::User, "hi"),
                entry(TranscriptRole::Assistant, "hello"),
            ],
            Participants {
                username: "Ada",
                assistant_name: "Axis",
            },
        );
        assert_eq!(records[0].rendered(), "Ada : hi");
        assert_eq!(records[1].rendered(), "Axis : hello");
    }
}
