//! Deterministic collaborators for running without network access.

use anyhow::Result;
use async_trait::async_trait;
use axis_orchestrator::{
    parse_decision_token, AnswerGenerator, ContentWriter, DecisionCategory, IntentClassifier,
};

#[derive(Debug, Clone, Copy, Default)]
/// Splits an utterance on `and`/commas and keeps fragments that already start
/// with a category keyword; anything else becomes `general <fragment>`.
pub struct PrefixIntentClassifier;

impl PrefixIntentClassifier {
    pub fn classify_text(utterance: &str) -> Vec<String> {
        let normalized = utterance.replace(" and ", ",");
        normalized
            .split(',')
            .map(str::trim)
            .filter(|fragment| !fragment.is_empty())
            .map(|fragment| match parse_decision_token(fragment) {
                Some(token) if !matches!(token.category, DecisionCategory::Unrecognized(_)) => {
                    fragment.to_string()
                }
                _ if is_farewell(fragment) => "exit".to_string(),
                _ => format!("general {fragment}"),
            })
            .collect()
    }
}

fn is_farewell(fragment: &str) -> bool {
    matches!(
        fragment
            .trim_end_matches(['.', '!'])
            .to_ascii_lowercase()
            .as_str(),
        "bye" | "goodbye" | "good bye" | "quit"
    )
}

#[async_trait]
impl IntentClassifier for PrefixIntentClassifier {
    async fn classify(&self, utterance: &str) -> Result<Vec<String>> {
        Ok(Self::classify_text(utterance))
    }
}

#[derive(Debug, Clone, Default)]
/// Answers by echoing the query back, tagged with the answer path taken.
pub struct EchoAnswerGenerator {
    pub assistant_name: String,
}

#[async_trait]
impl AnswerGenerator for EchoAnswerGenerator {
    async fn answer_general(&self, query: &str) -> Result<String> {
        Ok(format!("{} heard: {query}", self.assistant_name))
    }

    async fn answer_realtime(&self, query: &str) -> Result<String> {
        Ok(format!(
            "{} has no live data offline. You asked: {query}",
            self.assistant_name
        ))
    }
}

#[async_trait]
impl ContentWriter for EchoAnswerGenerator {
    async fn write_content(&self, topic: &str) -> Result<String> {
        Ok(format!("{topic}\n\nWritten offline by {}.\n", self.assistant_name))
    }
}
