//! Operating-system side effects for automation commands, expressed as
//! per-platform command lines run through `tokio::process`.

use std::path::Path;

use async_trait::async_trait;
use axis_orchestrator::{DesktopActions, SystemAction};
use tracing::{debug, warn};

use crate::command_line::CommandLine;
use crate::web_search::WebSearchClient;

const DEFAULT_VIDEO_BASE: &str = "https://www.youtube.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesktopPlatform {
    MacOs,
    Linux,
    Windows,
}

impl DesktopPlatform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(target_os = "windows") {
            Self::Windows
        } else {
            Self::Linux
        }
    }

    pub fn launch_command(self, name: &str) -> CommandLine {
        match self {
            Self::MacOs => CommandLine::new("open", &["-a", name]),
            Self::Linux => CommandLine::new("gtk-launch", &[name]),
            Self::Windows => CommandLine::new("cmd", &["/C", "start", "", name]),
        }
    }

    /// Graceful termination by exact process name only.
    pub fn terminate_command(self, name: &str) -> CommandLine {
        match self {
            Self::MacOs => {
                let script = format!("quit app \"{}\"", name.replace('"', ""));
                CommandLine::new("osascript", &["-e", script.as_str()])
            }
            Self::Linux => CommandLine::new("pkill", &["-x", name]),
            Self::Windows => {
                let image = if name.to_ascii_lowercase().ends_with(".exe") {
                    name.to_string()
                } else {
                    format!("{name}.exe")
                };
                CommandLine::new("taskkill", &["/IM", image.as_str()])
            }
        }
    }

    /// Opens a URL or file with the platform's default handler.
    pub fn open_target_command(self, target: &str) -> CommandLine {
        match self {
            Self::MacOs => CommandLine::new("open", &[target]),
            Self::Linux => CommandLine::new("xdg-open", &[target]),
            Self::Windows => CommandLine::new("cmd", &["/C", "start", "", target]),
        }
    }

    pub fn system_command(self, action: SystemAction) -> Option<CommandLine> {
        match self {
            Self::Linux => {
                let (subcommand, value) = match action {
                    SystemAction::Mute => ("set-sink-mute", "1"),
                    SystemAction::Unmute => ("set-sink-mute", "0"),
                    SystemAction::VolumeUp => ("set-sink-volume", "+10%"),
                    SystemAction::VolumeDown => ("set-sink-volume", "-10%"),
                };
                Some(CommandLine::new(
                    "pactl",
                    &[subcommand, "@DEFAULT_SINK@", value],
                ))
            }
            Self::MacOs => {
                let script = match action {
                    SystemAction::Mute => "set volume with output muted",
                    SystemAction::Unmute => "set volume without output muted",
                    SystemAction::VolumeUp => {
                        "set volume output volume ((output volume of (get volume settings)) + 10)"
                    }
                    SystemAction::VolumeDown => {
                        "set volume output volume ((output volume of (get volume settings)) - 10)"
                    }
                };
                Some(CommandLine::new("osascript", &["-e", script]))
            }
            Self::Windows => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SystemDesktopActions {
    platform: DesktopPlatform,
    search: Option<WebSearchClient>,
}

impl SystemDesktopActions {
    pub fn new(platform: DesktopPlatform, search: Option<WebSearchClient>) -> Self {
        Self { platform, search }
    }

    fn video_base(&self) -> &str {
        self.search
            .as_ref()
            .map(WebSearchClient::video_base)
            .unwrap_or(DEFAULT_VIDEO_BASE)
    }
}

/// `<video_base>/results?search_query=<query>`, query-encoded.
pub fn video_results_url(video_base: &str, query: &str) -> Option<String> {
    let base = format!("{}/results", video_base.trim_end_matches('/'));
    reqwest::Url::parse_with_params(&base, &[("search_query", query)])
        .ok()
        .map(String::from)
}

#[async_trait]
impl DesktopActions for SystemDesktopActions {
    async fn launch_app(&self, name: &str) -> bool {
        self.platform.launch_command(name).run_quietly().await
    }

    async fn terminate_app(&self, name: &str) -> bool {
        self.platform.terminate_command(name).run_quietly().await
    }

    async fn open_search_fallback(&self, name: &str) -> bool {
        let Some(search) = &self.search else {
            debug!(
                reason_code = "desktop_search_fallback_disabled",
                app = %name,
                "no web search client configured"
            );
            return false;
        };
        let links = match search.result_links(name).await {
            Ok(links) => links,
            Err(error) => {
                warn!(
                    reason_code = "desktop_search_fallback_failed",
                    app = %name,
                    error = %error,
                    "web search fallback failed"
                );
                return false;
            }
        };
        match links.first() {
            Some(link) => self.open_url(link).await,
            None => false,
        }
    }

    async fn open_url(&self, url: &str) -> bool {
        self.platform.open_target_command(url).run_quietly().await
    }

    async fn play_media(&self, query: &str) -> bool {
        if let Some(search) = &self.search {
            match search.first_video_url(query).await {
                Ok(Some(video)) => return self.open_url(&video).await,
                Ok(None) => {}
                Err(error) => debug!(
                    reason_code = "desktop_media_lookup_failed",
                    query = %query,
                    error = %error,
                    "media lookup failed; opening results page"
                ),
            }
        }
        match video_results_url(self.video_base(), query) {
            Some(url) => self.open_url(&url).await,
            None => false,
        }
    }

    async fn system_action(&self, action: SystemAction) -> bool {
        match self.platform.system_command(action) {
            Some(command) => command.run_quietly().await,
            None => {
                debug!(
                    reason_code = "desktop_system_action_unsupported",
                    action = ?action,
                    "system action unsupported on this platform"
                );
                false
            }
        }
    }

    async fn open_in_viewer(&self, path: &Path) -> bool {
        self.platform
            .open_target_command(&path.display().to_string())
            .run_quietly()
            .await
    }
}
