//! Gemini-backed answer, content, and classification collaborators.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axis_orchestrator::{AnswerGenerator, ContentWriter, IntentClassifier};
use chrono::{DateTime, TimeZone};
use tracing::warn;

use crate::gemini_client::{GeminiClient, GeminiTurn};
use crate::transcript_store::{JsonlTranscriptStore, TranscriptRole};
use crate::web_search::WebSearchClient;

const DEFAULT_HISTORY_LIMIT: usize = 12;
const SEARCH_CONTEXT_RESULTS: usize = 5;

const CLASSIFIER_PROMPT: &str = "You are a decision-making model. You never answer the query \
yourself; you only decide what kind of query it is. Reply with a comma-separated list of \
decision tokens and nothing else. Each token starts with one of these words followed by its \
payload:
general <query> - can be answered by a chatbot without live data.
realtime <query> - needs up-to-date information (news, weather, people, prices).
open <app or website>, close <app>, play <song or video>,
system <mute|unmute|volume up|volume down>,
content <topic> - write a letter, essay, code, or other text,
google search <topic>, youtube search <topic>,
generate image <prompt>,
exit - the user says goodbye or wants to end the conversation.
Split multi-part requests into several tokens, for example \
'open chrome and tell me about mahatma gandhi' becomes \
'open chrome, general tell me about mahatma gandhi'. \
If unsure, answer 'general <query>'.";

const CONTENT_PROMPT: &str = "You are a content writer. You write letters, applications, \
essays, notes, songs, poems, and code exactly as requested. Output only the requested text.";

#[derive(Debug, Clone)]
pub struct GeminiAssistant {
    client: GeminiClient,
    username: String,
    assistant_name: String,
    transcript: Option<Arc<JsonlTranscriptStore>>,
    history_limit: usize,
    search: Option<WebSearchClient>,
}

impl GeminiAssistant {
    pub fn new(
        client: GeminiClient,
        username: impl Into<String>,
        assistant_name: impl Into<String>,
    ) -> Self {
        Self {
            client,
            username: username.into(),
            assistant_name: assistant_name.into(),
            transcript: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
            search: None,
        }
    }

    /// Uses the latest transcript entries as conversational context.
    pub fn with_transcript(mut self, transcript: Arc<JsonlTranscriptStore>, limit: usize) -> Self {
        self.transcript = Some(transcript);
        self.history_limit = limit;
        self
    }

    /// Adds search result titles to realtime prompts.
    pub fn with_search(mut self, search: WebSearchClient) -> Self {
        self.search = Some(search);
        self
    }

    fn chat_prompt(&self) -> String {
        format!(
            "Hello, I am {user}, You are a very accurate and advanced AI chatbot named \
{assistant} which also has real-time up-to-date information from the internet.\n\
*** Do not tell time until I ask, do not talk too much, just answer the question. ***\n\
*** Reply in only English, even if the question is in another language. ***\n\
*** Do not provide notes or disclaimers. ***\n\
*** Never mention your training data. ***",
            user = self.username,
            assistant = self.assistant_name,
        )
    }

    fn realtime_prompt(&self) -> String {
        format!(
            "Hello, I am {user}, You are a very accurate and advanced AI chatbot named \
{assistant} which has real-time up-to-date information from the internet.\n\
*** Provide answers in a professional way, with full stops, commas, question marks, and \
proper grammar. ***\n\
*** Just answer the question from the provided data in a professional way. ***",
            user = self.username,
            assistant = self.assistant_name,
        )
    }

    fn history(&self) -> Vec<GeminiTurn> {
        let Some(transcript) = &self.transcript else {
            return Vec::new();
        };
        match transcript.recent(self.history_limit) {
            Ok(entries) => entries
                .into_iter()
                .map(|entry| match entry.role {
                    TranscriptRole::User => GeminiTurn::user(entry.content),
                    TranscriptRole::Assistant => GeminiTurn::model(entry.content),
                })
                .collect(),
            Err(error) => {
                warn!(
                    reason_code = "provider_history_unavailable",
                    error = %format!("{error:#}"),
                    "continuing without conversation history"
                );
                Vec::new()
            }
        }
    }

    async fn search_context(&self, query: &str) -> Option<String> {
        let search = self.search.as_ref()?;
        let block = match search.result_titles(query).await {
            Ok(titles) => {
                let listed = titles
                    .iter()
                    .take(SEARCH_CONTEXT_RESULTS)
                    .map(|title| format!("Title: {title}\n"))
                    .collect::<String>();
                format!("The search results for '{query}' are:\n[start]\n{listed}[end]")
            }
            Err(error) => format!("[start]\nSearch failed for '{query}': {error}\n[end]"),
        };
        Some(block)
    }

    async fn ask(&self, system: String, query: &str) -> Result<String> {
        let mut turns = self.history();
        turns.push(GeminiTurn::user(query));
        self.client
            .generate(&system, &turns)
            .await
            .with_context(|| format!("gemini model '{}' request failed", self.client.model()))
    }
}

/// Date and time block appended to answer prompts.
pub fn realtime_information<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "Use this real-time information if needed:\nDay: {}\nDate: {}\nMonth: {}\nYear: {}\n\
Time: {} hours, {} minutes, {} seconds.",
        now.format("%A"),
        now.format("%d"),
        now.format("%B"),
        now.format("%Y"),
        now.format("%H"),
        now.format("%M"),
        now.format("%S"),
    )
}

/// Splits a classifier reply into raw decision tokens.
pub fn parse_classifier_reply(reply: &str) -> Vec<String> {
    reply
        .split([',', '\n'])
        .map(|token| {
            token
                .trim()
                .trim_start_matches(['-', '*'])
                .trim()
                .trim_end_matches('.')
                .trim()
        })
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl AnswerGenerator for GeminiAssistant {
    async fn answer_general(&self, query: &str) -> Result<String> {
        let system = format!(
            "{}\n\n{}",
            self.chat_prompt(),
            realtime_information(&chrono::Local::now())
        );
        self.ask(system, query).await
    }

    async fn answer_realtime(&self, query: &str) -> Result<String> {
        let mut system = format!(
            "{}\n\n{}",
            self.realtime_prompt(),
            realtime_information(&chrono::Local::now())
        );
        if let Some(context) = self.search_context(query).await {
            system.push_str("\n\n");
            system.push_str(&context);
        }
        self.ask(system, query).await
    }
}

#[async_trait]
impl ContentWriter for GeminiAssistant {
    async fn write_content(&self, topic: &str) -> Result<String> {
        self.client
            .generate(CONTENT_PROMPT, &[GeminiTurn::user(topic)])
            .await
            .context("content generation failed")
    }
}

#[async_trait]
impl IntentClassifier for GeminiAssistant {
    async fn classify(&self, utterance: &str) -> Result<Vec<String>> {
        let reply = self
            .client
            .generate(CLASSIFIER_PROMPT, &[GeminiTurn::user(utterance)])
            .await
            .context("intent classification request failed")?;
        let tokens = parse_classifier_reply(&reply);
        if tokens.is_empty() {
            return Ok(vec![format!("general {utterance}")]);
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axis_core::LogRotationPolicy;
    use axis_orchestrator::{AnswerGenerator, IntentClassifier};
    use chrono::{TimeZone, Utc};
    use httpmock::{Method::POST, MockServer};

    use super::{parse_classifier_reply, realtime_information, GeminiAssistant};
    use crate::gemini_client::{GeminiClient, GeminiConfig};
    use crate::transcript_store::{JsonlTranscriptStore, TranscriptEntry, TranscriptRole};

    fn client(server: &MockServer) -> GeminiClient {
        let mut config = GeminiConfig::new("test-key");
        config.api_base = server.base_url();
        config.model = "gemini-test".to_string();
        GeminiClient::new(config).expect("client")
    }

    fn reply(text: &str) -> serde_json::Value {
        serde_json::json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] })
    }

    #[test]
    fn unit_realtime_information_lists_calendar_fields() {
        let now = Utc
            .with_ymd_and_hms(2026, 10, 16, 9, 5, 7)
            .single()
            .expect("valid timestamp");
        let block = realtime_information(&now);
        assert!(block.contains("Day: Friday"));
        assert!(block.contains("Month: October"));
        assert!(block.contains("Year: 2026"));
        assert!(block.contains("Time: 09 hours, 05 minutes, 07 seconds."));
    }

    #[test]
    fn unit_parse_classifier_reply_splits_and_cleans_tokens() {
        assert_eq!(
            parse_classifier_reply("open chrome, general tell me about gandhi.\n- exit\n"),
            vec!["open chrome", "general tell me about gandhi", "exit"]
        );
        assert!(parse_classifier_reply(" , \n").is_empty());
    }

    #[tokio::test]
    async fn functional_classify_returns_tokens_from_model_reply() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).body_includes("decision-making model");
            then.status(200)
                .json_body_obj(&reply("realtime weather in Paris, open spotify"));
        });
        let assistant = GeminiAssistant::new(client(&server), "Ada", "Axis");

        let tokens = assistant
            .classify("weather in paris and open spotify")
            .await
            .expect("classify");

        assert_eq!(tokens, vec!["realtime weather in Paris", "open spotify"]);
    }

    #[tokio::test]
    async fn integration_general_answer_includes_names_and_history() {
        let server = MockServer::start_async().await;
        let temp = tempfile::tempdir().expect("tempdir");
        let transcript = Arc::new(JsonlTranscriptStore::new(
            temp.path().join("chat_log.jsonl"),
            LogRotationPolicy::default(),
        ));
        transcript
            .append_entry(&TranscriptEntry {
                timestamp_unix_ms: 1,
                role: TranscriptRole::User,
                content: "my favourite colour is teal".to_string(),
            })
            .expect("seed");
        let mock = server.mock(|when, then| {
            when.method(POST)
                .body_includes("named Axis")
                .body_includes("my favourite colour is teal")
                .body_includes("What is my favourite colour?");
            then.status(200).json_body_obj(&reply("Teal."));
        });
        let assistant = GeminiAssistant::new(client(&server), "Ada", "Axis")
            .with_transcript(transcript, 4);

        let answer = assistant
            .answer_general("What is my favourite colour?")
            .await
            .expect("answer");

        mock.assert();
        assert_eq!(answer, "Teal.");
    }

    #[tokio::test]
    async fn regression_answer_failure_carries_context() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST);
            then.status(500).body("boom");
        });
        let assistant = GeminiAssistant::new(client(&server), "Ada", "Axis");

        let error = assistant
            .answer_realtime("weather")
            .await
            .expect_err("500");
        let rendered = format!("{error:#}");
        assert!(rendered.contains("gemini-test"));
        assert!(rendered.contains("500"));
    }
}
