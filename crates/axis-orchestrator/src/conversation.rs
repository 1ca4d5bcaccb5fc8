//! Per-cycle conversation state and the text shaping applied around the
//! answer collaborators.

use serde::Serialize;

use crate::automation_dispatcher::AutomationOutcome;
use crate::intent_router::RoutedIntent;
use crate::status_channel::DisplayRecord;
use axis_core::current_unix_timestamp_ms;

const QUESTION_WORDS: [&str; 13] = [
    "how", "what", "who", "where", "when", "why", "which", "whose", "whom", "can you", "what's",
    "where's", "how's",
];
const SPOKEN_SUMMARY_MIN_FRAGMENTS: usize = 5;
const SPOKEN_SUMMARY_MIN_CHARS: usize = 250;
const SPOKEN_SUMMARY_SENTENCES: usize = 2;
const CONTINUED_ON_SCREEN_NOTICES: [&str; 6] = [
    "The rest of the answer is now on the chat screen.",
    "You can see the rest of the text on the chat screen.",
    "Please check the chat screen for the complete answer.",
    "The remaining part of the text is on the chat screen.",
    "There is more to read on the chat screen.",
    "The chat screen has the rest of the text.",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Participants<'a> {
    pub username: &'a str,
    pub assistant_name: &'a str,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
/// Owned state of one orchestration cycle. Created when an utterance is
/// captured, handed to the transcript collaborator when the cycle ends.
pub struct ConversationTurn {
    pub started_unix_ms: u64,
    pub utterance: String,
    pub records: Vec<DisplayRecord>,
    pub intents: Vec<RoutedIntent>,
    pub automation_outcomes: Vec<AutomationOutcome>,
    pub answer: Option<String>,
    pub error: Option<String>,
}

impl ConversationTurn {
    pub fn new(utterance: impl Into<String>) -> Self {
        Self {
            started_unix_ms: current_unix_timestamp_ms(),
            utterance: utterance.into(),
            records: Vec::new(),
            intents: Vec::new(),
            automation_outcomes: Vec::new(),
            answer: None,
            error: None,
        }
    }

    /// Appends a record and returns a copy for publishing.
    pub fn record(&mut self, speaker: &str, text: &str) -> DisplayRecord {
        let record = DisplayRecord::new(speaker, text);
        self.records.push(record.clone());
        record
    }
}

/// Normalizes a query before it reaches an answer collaborator: lower-case,
/// terminal `?` for questions and `.` otherwise, first letter capitalized.
pub fn modify_query(query: &str) -> String {
    let mut normalized = query.trim().to_lowercase();
    if normalized.is_empty() {
        return normalized;
    }
    let is_question = QUESTION_WORDS
        .iter()
        .any(|word| normalized.contains(&format!("{word} ")));
    if normalized.ends_with(['.', '?', '!']) {
        normalized.pop();
    }
    normalized.push(if is_question { '?' } else { '.' });
    capitalize_first(&normalized)
}

/// Drops blank lines from a collaborator answer.
pub fn modify_answer(answer: &str) -> String {
    answer
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text handed to the speech renderer. Long answers are cut to their first
/// two sentences plus a pointer to the screen; `turn_index` picks the notice.
pub fn speech_text(answer: &str, turn_index: usize) -> String {
    let fragments: Vec<&str> = answer.split('.').collect();
    if fragments.len() < SPOKEN_SUMMARY_MIN_FRAGMENTS
        || answer.chars().count() <= SPOKEN_SUMMARY_MIN_CHARS
    {
        return answer.to_string();
    }
    let lead = fragments[..SPOKEN_SUMMARY_SENTENCES].join(".");
    let notice = CONTINUED_ON_SCREEN_NOTICES[turn_index % CONTINUED_ON_SCREEN_NOTICES.len()];
    format!("{}. {notice}", lead.trim())
}

/// Display records shown at startup when there is no chat history yet.
pub fn default_greeting(participants: Participants<'_>) -> Vec<DisplayRecord> {
    vec![
        DisplayRecord::new(
            participants.username,
            format!("Hello {}, How are you?", participants.assistant_name),
        ),
        DisplayRecord::new(
            participants.assistant_name,
            format!(
                "Welcome {}. I am doing well. How may i help you?",
                participants.username
            ),
        ),
    ]
}

fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
