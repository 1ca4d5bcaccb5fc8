//! Hand-off of image prompts to an external generator process.
//!
//! Each request rewrites `image_generation.data` as `<prompt>,True` and, when
//! a command is configured, spawns it with the prompt as its last argument.
//! Children are tracked so shutdown can wait for them and then kill them.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axis_core::write_text_atomic;
use axis_orchestrator::ImageGenerator;
use tokio::process::Child;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use crate::command_line::CommandLine;

pub const IMAGE_REQUEST_FILE: &str = "image_generation.data";

pub struct CommandImageGenerator {
    request_path: PathBuf,
    command: Option<CommandLine>,
    children: AsyncMutex<Vec<Child>>,
}

impl CommandImageGenerator {
    pub fn new(state_dir: &Path, command: Option<CommandLine>) -> Self {
        Self {
            request_path: state_dir.join(IMAGE_REQUEST_FILE),
            command,
            children: AsyncMutex::new(Vec::new()),
        }
    }

    pub fn request_path(&self) -> &Path {
        &self.request_path
    }

    pub async fn running_children(&self) -> usize {
        let mut children = self.children.lock().await;
        reap_exited(&mut children);
        children.len()
    }
}

fn reap_exited(children: &mut Vec<Child>) {
    children.retain_mut(|child| matches!(child.try_wait(), Ok(None)));
}

#[async_trait]
impl ImageGenerator for CommandImageGenerator {
    async fn request_image(&self, prompt: &str) -> Result<()> {
        write_text_atomic(&self.request_path, &format!("{prompt},True"))
            .context("failed to record image generation request")?;
        let Some(command) = &self.command else {
            return Ok(());
        };
        let mut process = command.with_trailing_arg(prompt).command();
        process
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        let child = process
            .spawn()
            .with_context(|| format!("failed to spawn image command '{command}'"))?;
        info!(
            reason_code = "image_generation_spawned",
            pid = child.id().unwrap_or_default(),
            "image generation process started"
        );
        let mut children = self.children.lock().await;
        reap_exited(&mut children);
        children.push(child);
        Ok(())
    }

    async fn shutdown(&self, grace: Duration) {
        let mut children = std::mem::take(&mut *self.children.lock().await);
        if children.is_empty() {
            return;
        }
        let deadline = tokio::time::Instant::now() + grace;
        let mut killed = 0usize;
        for child in &mut children {
            if tokio::time::timeout_at(deadline, child.wait()).await.is_ok() {
                continue;
            }
            if let Err(error) = child.kill().await {
                warn!(
                    reason_code = "image_generation_kill_failed",
                    error = %error,
                    "failed to kill image generation process"
                );
            } else {
                killed = killed.saturating_add(1);
            }
        }
        info!(
            reason_code = "image_generation_shutdown",
            tracked = children.len(),
            killed,
            "image generation processes stopped"
        );
    }
}
