//! Intent dispatch and cross-loop orchestration for the axis assistant.
//!
//! The [`OrchestrationLoop`] is the only writer of the status channel; the
//! [`PresentationLoop`] and any external observer read snapshots from it.
//! Collaborators (classification, answers, speech, desktop actions) are
//! reached through the ports in [`collaborators`].

pub mod activation;
pub mod automation_dispatcher;
pub mod collaborators;
pub mod conversation;
pub mod decision_token;
pub mod intent_router;
pub mod orchestration_loop;
pub mod presentation_loop;
pub mod shutdown;
pub mod status_channel;

pub use activation::{read_activation_file, start_activation_source, ActivationFlag, ActivationMode};
pub use automation_dispatcher::{
    content_file_path, AutomationDispatcher, AutomationDispatcherConfig, AutomationOutcome,
    SystemAction,
};
pub use collaborators::{
    AnswerGenerator, Collaborators, ContentWriter, DesktopActions, ImageGenerator,
    IntentClassifier, OrchestrationError, SpeechCapture, SpeechRenderer, TranscriptSink,
};
pub use conversation::{
    default_greeting, modify_answer, modify_query, speech_text, ConversationTurn, Participants,
};
pub use decision_token::{
    embedded_image_prompt, parse_decision_token, parse_decision_tokens, AutomationVerb,
    DecisionCategory, DecisionToken,
};
pub use intent_router::{
    route_decision_tokens, route_raw_tokens, AnswerIntent, AutomationBatch, AutomationCommand,
    ImageRequest, RoutePlan, RoutedIntent,
};
pub use orchestration_loop::{CycleOutcome, OrchestrationConfig, OrchestrationLoop};
pub use presentation_loop::{DisplaySink, PresentationLoop, PresentationTick};
pub use shutdown::{join_with_grace, shutdown_channel, ShutdownController, ShutdownSignal};
pub use status_channel::{
    read_status_mirror, status_channel, AssistantState, DisplayRecord, StatusChannelError,
    StatusMirror, StatusObserver, StatusPublisher, StatusSnapshot,
};
