use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliProvider {
    /// Gemini `generateContent` for answers, content, and classification.
    Gemini,
    /// Deterministic local stand-ins; no network access.
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliActivationMode {
    /// Listen continuously.
    Always,
    /// Listen while the activation file contains `True`.
    File,
}
