use thiserror::Error;

#[derive(Debug, Error)]
/// Failures raised by the concrete collaborator adapters.
pub enum ProviderError {
    #[error("missing API key")]
    MissingApiKey,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned non-success status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("invalid command line '{command}': {message}")]
    InvalidCommand { command: String, message: String },
    #[error("command '{program}' failed: {message}")]
    CommandFailed { program: String, message: String },
}

impl ProviderError {
    pub(crate) fn command_failed(program: &str, message: impl Into<String>) -> Self {
        Self::CommandFailed {
            program: program.to_string(),
            message: message.into(),
        }
    }
}
