//! Mock playback engine for orchestrator tests.

use crate::playback::MediaPlayer;
use async_trait::async_trait;
use tokio::sync::RwLock;
use url::Url;

/// One recorded engine command
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    Load {
        uri: Url,
        subtitle_uri: Option<Url>,
    },
    Play,
    Pause,
    SeekTo(i64),
    SetVolume(f32),
}

/// Mock implementation of the `MediaPlayer` trait.
///
/// Position and duration are test-settable; every command is journaled for
/// assertions.
pub struct MockPlayer {
    position_ms: RwLock<i64>,
    duration_ms: RwLock<i64>,
    commands: RwLock<Vec<PlayerCommand>>,
}

impl MockPlayer {
    pub fn new() -> Self {
        Self {
            position_ms: RwLock::new(0),
            duration_ms: RwLock::new(0),
            commands: RwLock::new(Vec::new()),
        }
    }

    pub async fn set_position(&self, position_ms: i64) {
        *self.position_ms.write().await = position_ms;
    }

    pub async fn set_duration(&self, duration_ms: i64) {
        *self.duration_ms.write().await = duration_ms;
    }

    /// Every recorded command, oldest first
    pub async fn commands(&self) -> Vec<PlayerCommand> {
        self.commands.read().await.clone()
    }

    pub async fn count(&self, command: &PlayerCommand) -> usize {
        self.commands
            .read()
            .await
            .iter()
            .filter(|recorded| *recorded == command)
            .count()
    }
}

impl Default for MockPlayer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaPlayer for MockPlayer {
    async fn load(&self, uri: &Url, subtitle_uri: Option<&Url>) {
        self.commands.write().await.push(PlayerCommand::Load {
            uri: uri.clone(),
            subtitle_uri: subtitle_uri.cloned(),
        });
    }

    async fn play(&self) {
        self.commands.write().await.push(PlayerCommand::Play);
    }

    async fn pause(&self) {
        self.commands.write().await.push(PlayerCommand::Pause);
    }

    async fn seek_to(&self, position_ms: i64) {
        self.commands
            .write()
            .await
            .push(PlayerCommand::SeekTo(position_ms));
    }

    async fn set_volume(&self, level: f32) {
        self.commands
            .write()
            .await
            .push(PlayerCommand::SetVolume(level));
    }

    async fn position_ms(&self) -> i64 {
        *self.position_ms.read().await
    }

    async fn duration_ms(&self) -> i64 {
        *self.duration_ms.read().await
    }
}
