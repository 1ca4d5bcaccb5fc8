//! Turns an ordered decision-token sequence into one cycle's routing plan.

use serde::{Deserialize, Serialize};

use crate::decision_token::{
    embedded_image_prompt, parse_decision_tokens, AutomationVerb, DecisionCategory,
    DecisionToken,
};

const MERGED_QUERY_SEPARATOR: &str = " and ";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AutomationCommand {
    pub verb: AutomationVerb,
    pub argument: String,
}

impl AutomationCommand {
    pub fn new(verb: AutomationVerb, argument: impl Into<String>) -> Self {
        Self {
            verb,
            argument: argument.into(),
        }
    }
}

impl std::fmt::Display for AutomationCommand {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{} {}", self.verb, self.argument)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationBatch {
    pub commands: Vec<AutomationCommand>,
}

impl AutomationBatch {
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRequest {
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
/// The single answer-producing intent of a cycle.
pub enum AnswerIntent {
    General(String),
    Realtime(String),
}

impl AnswerIntent {
    pub fn text(&self) -> &str {
        match self {
            Self::General(text) | Self::Realtime(text) => text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum RoutedIntent {
    GeneralQuery { text: String },
    RealtimeQuery { text: String },
    AutomationBatch { commands: Vec<AutomationCommand> },
    ImageRequest { prompt: String },
    ExitRequest,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Everything the orchestration loop must do for one cycle.
///
/// `automation` and `image` are side-channel actions that may coexist with the
/// answer. `exit` is terminal and runs after every other intent.
pub struct RoutePlan {
    pub answer: Option<AnswerIntent>,
    pub automation: Option<AutomationBatch>,
    pub image: Option<ImageRequest>,
    pub exit: bool,
    pub unrecognized: Vec<String>,
}

impl RoutePlan {
    /// True when the cycle has nothing to do (no answer, side intent, or exit).
    pub fn is_empty(&self) -> bool {
        self.answer.is_none() && self.automation.is_none() && self.image.is_none() && !self.exit
    }

    /// Intents in execution order: automation, image, answer, exit last.
    pub fn intents(&self) -> Vec<RoutedIntent> {
        let mut intents = Vec::new();
        if let Some(batch) = &self.automation {
            intents.push(RoutedIntent::AutomationBatch {
                commands: batch.commands.clone(),
            });
        }
        if let Some(image) = &self.image {
            intents.push(RoutedIntent::ImageRequest {
                prompt: image.prompt.clone(),
            });
        }
        match &self.answer {
            Some(AnswerIntent::General(text)) => {
                intents.push(RoutedIntent::GeneralQuery { text: text.clone() })
            }
            Some(AnswerIntent::Realtime(text)) => {
                intents.push(RoutedIntent::RealtimeQuery { text: text.clone() })
            }
            None => {}
        }
        if self.exit {
            intents.push(RoutedIntent::ExitRequest);
        }
        intents
    }
}

/// Routes parsed decision tokens in a single ordered pass.
pub fn route_decision_tokens(tokens: &[DecisionToken]) -> RoutePlan {
    let mut plan = RoutePlan::default();
    let mut merged_parts: Vec<&str> = Vec::new();
    let mut saw_realtime = false;
    let mut saw_general = false;
    let mut commands: Vec<AutomationCommand> = Vec::new();

    for token in tokens {
        if token.category != DecisionCategory::ImageGenerate {
            if let Some(prompt) = embedded_image_prompt(&token.payload) {
                plan.image = Some(ImageRequest { prompt });
            }
        }
        match &token.category {
            DecisionCategory::General | DecisionCategory::Realtime => {
                if token.category == DecisionCategory::Realtime {
                    saw_realtime = true;
                } else {
                    saw_general = true;
                }
                if !token.payload.is_empty() {
                    merged_parts.push(token.payload.as_str());
                }
            }
            DecisionCategory::Automation(verb) => {
                let command = AutomationCommand::new(*verb, token.payload.clone());
                if !commands.contains(&command) {
                    commands.push(command);
                }
            }
            DecisionCategory::ImageGenerate => {
                if !token.payload.is_empty() {
                    plan.image = Some(ImageRequest {
                        prompt: token.payload.clone(),
                    });
                }
            }
            DecisionCategory::Exit => plan.exit = true,
            DecisionCategory::Unrecognized(word) => {
                tracing::debug!(
                    reason_code = "router_unrecognized_category",
                    category = %word,
                    "router skipped decision token with unknown category"
                );
                plan.unrecognized.push(word.clone());
            }
        }
    }

    let merged = merged_parts.join(MERGED_QUERY_SEPARATOR);
    plan.answer = if saw_realtime {
        Some(AnswerIntent::Realtime(merged))
    } else if saw_general {
        Some(AnswerIntent::General(merged))
    } else {
        None
    };
    if !commands.is_empty() {
        plan.automation = Some(AutomationBatch { commands });
    }
    plan
}

/// Parses raw classifier strings and routes them.
pub fn route_raw_tokens<S: AsRef<str>>(raw_tokens: &[S]) -> RoutePlan {
    route_decision_tokens(&parse_decision_tokens(raw_tokens))
}
