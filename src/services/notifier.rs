//! Audible success notifications.
//!
//! Fired only for fully applied intents. Failures to play a sound are
//! logged and never affect the intent outcome.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::NotificationConfig;
use crate::domain::IntentAction;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_success(&self, action: IntentAction);
}

/// Does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify_success(&self, _action: IntentAction) {}
}

/// Plays a system sound per action through an external player
#[derive(Debug, Clone)]
pub struct SoundNotifier {
    command: String,
    sound_dir: PathBuf,
}

impl SoundNotifier {
    pub fn new(command: impl Into<String>, sound_dir: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            sound_dir: sound_dir.into(),
        }
    }

    /// Build the configured notifier; a no-op when disabled.
    pub fn from_config(config: &NotificationConfig) -> Arc<dyn Notifier> {
        if config.enabled {
            info!("Sound notifications enabled ({})", config.command);
            Arc::new(Self::new(config.command.clone(), config.sound_dir.clone()))
        } else {
            Arc::new(NullNotifier)
        }
    }

    pub fn sound_for(action: IntentAction) -> &'static str {
        match action {
            IntentAction::Create => "Glass",
            IntentAction::Update => "Tink",
            IntentAction::Close => "Pop",
        }
    }

    pub fn sound_path(&self, action: IntentAction) -> PathBuf {
        self.sound_dir
            .join(format!("{}.aiff", Self::sound_for(action)))
    }
}

#[async_trait]
impl Notifier for SoundNotifier {
    async fn notify_success(&self, action: IntentAction) {
        let path = self.sound_path(action);
        match Command::new(&self.command).arg(&path).status().await {
            Ok(status) if status.success() => debug!("Played {}", path.display()),
            Ok(status) => warn!("Sound player exited with {} for {}", status, path.display()),
            Err(e) => warn!("Failed to run sound player {}: {}", self.command, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_action_has_its_sound() {
        let n = SoundNotifier::new("afplay", "/System/Library/Sounds");
        assert_eq!(
            n.sound_path(IntentAction::Create),
            PathBuf::from("/System/Library/Sounds/Glass.aiff")
        );
        assert_eq!(SoundNotifier::sound_for(IntentAction::Update), "Tink");
        assert_eq!(SoundNotifier::sound_for(IntentAction::Close), "Pop");
    }

    #[tokio::test]
    async fn missing_player_is_not_fatal() {
        let n = SoundNotifier::new("definitely-not-a-sound-player", "/tmp");
        n.notify_success(IntentAction::Create).await;
    }
}
