//! Decision-token grammar.
//!
//! The classifier emits free-form strings such as `"realtime weather in Paris"`
//! or `"google search rust async"`. Each string is parsed into a
//! [`DecisionToken`]: a typed [`DecisionCategory`] plus the remaining payload.
//! Unknown leading words stay representable as
//! [`DecisionCategory::Unrecognized`] instead of falling through silently.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
/// Desktop automation verbs understood by the dispatcher.
pub enum AutomationVerb {
    Open,
    Close,
    Play,
    System,
    Content,
    GoogleSearch,
    YoutubeSearch,
}

impl AutomationVerb {
    pub const ALL: [AutomationVerb; 7] = [
        Self::Open,
        Self::Close,
        Self::Play,
        Self::System,
        Self::Content,
        Self::GoogleSearch,
        Self::YoutubeSearch,
    ];

    pub fn keyword(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Close => "close",
            Self::Play => "play",
            Self::System => "system",
            Self::Content => "content",
            Self::GoogleSearch => "google search",
            Self::YoutubeSearch => "youtube search",
        }
    }
}

impl std::fmt::Display for AutomationVerb {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.keyword())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "word")]
pub enum DecisionCategory {
    General,
    Realtime,
    Automation(AutomationVerb),
    ImageGenerate,
    Exit,
    Unrecognized(String),
}

impl DecisionCategory {
    pub fn is_answer(&self) -> bool {
        matches!(self, Self::General | Self::Realtime)
    }

    pub fn label(&self) -> &str {
        match self {
            Self::General => "general",
            Self::Realtime => "realtime",
            Self::Automation(verb) => verb.keyword(),
            Self::ImageGenerate => IMAGE_GENERATE_KEYWORD,
            Self::Exit => "exit",
            Self::Unrecognized(word) => word.as_str(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// One classified fragment of an utterance.
pub struct DecisionToken {
    pub category: DecisionCategory,
    pub payload: String,
}

impl DecisionToken {
    pub fn new(category: DecisionCategory, payload: impl Into<String>) -> Self {
        Self {
            category,
            payload: payload.into(),
        }
    }
}

const IMAGE_GENERATE_KEYWORD: &str = "generate";
const IMAGE_PROMPT_LEAD_WORD: &str = "image";

/// Keywords ordered longest first so `google search` wins over any
/// single-word prefix.
fn category_keywords() -> Vec<(&'static str, DecisionCategory)> {
    let mut keywords = vec![
        ("general", DecisionCategory::General),
        ("realtime", DecisionCategory::Realtime),
        (IMAGE_GENERATE_KEYWORD, DecisionCategory::ImageGenerate),
        ("exit", DecisionCategory::Exit),
    ];
    keywords.extend(
        AutomationVerb::ALL
            .iter()
            .map(|verb| (verb.keyword(), DecisionCategory::Automation(*verb))),
    );
    keywords.sort_by(|left, right| right.0.len().cmp(&left.0.len()));
    keywords
}

/// Parses one raw classifier string. Returns `None` for blank input.
pub fn parse_decision_token(raw: &str) -> Option<DecisionToken> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lowered = trimmed.to_ascii_lowercase();

    for (keyword, category) in category_keywords() {
        let Some(rest) = lowered.strip_prefix(keyword) else {
            continue;
        };
        if !(rest.is_empty() || rest.starts_with(char::is_whitespace)) {
            continue;
        }
        // Slicing the original keeps payload casing; the keyword is ASCII so
        // byte offsets line up.
        let mut payload = trimmed[keyword.len()..].trim().to_string();
        if category == DecisionCategory::ImageGenerate {
            payload = strip_lead_word(&payload, IMAGE_PROMPT_LEAD_WORD);
        }
        return Some(DecisionToken::new(category, payload));
    }

    let (word, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (trimmed, ""),
    };
    Some(DecisionToken::new(
        DecisionCategory::Unrecognized(word.to_ascii_lowercase()),
        rest,
    ))
}

/// Parses a classifier response, dropping blank entries and keeping order.
pub fn parse_decision_tokens<S: AsRef<str>>(raw_tokens: &[S]) -> Vec<DecisionToken> {
    raw_tokens
        .iter()
        .filter_map(|raw| parse_decision_token(raw.as_ref()))
        .collect()
}

/// Finds an image marker inside a token routed elsewhere, e.g. the tail of
/// `open paint and generate image a fox`, and returns the prompt after it.
pub fn embedded_image_prompt(payload: &str) -> Option<String> {
    let lowered = payload.to_ascii_lowercase();
    let mut search_from = 0;
    while let Some(offset) = lowered[search_from..].find(IMAGE_GENERATE_KEYWORD) {
        let start = search_from + offset;
        let end = start + IMAGE_GENERATE_KEYWORD.len();
        search_from = end;
        let at_word_start = lowered[..start]
            .chars()
            .next_back()
            .map_or(true, char::is_whitespace);
        let followed_by_space = lowered[end..].starts_with(char::is_whitespace);
        if !(at_word_start && followed_by_space) {
            continue;
        }
        let prompt = strip_lead_word(payload[end..].trim(), IMAGE_PROMPT_LEAD_WORD);
        if !prompt.is_empty() {
            return Some(prompt);
        }
    }
    None
}

fn strip_lead_word(payload: &str, word: &str) -> String {
    match payload.split_once(char::is_whitespace) {
        Some((first, rest)) if first.eq_ignore_ascii_case(word) => rest.trim().to_string(),
        None if payload.eq_ignore_ascii_case(word) => String::new(),
        _ => payload.to_string(),
    }
}
