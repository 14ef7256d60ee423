use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::errors::AudioError;
use crate::service::AudioOutput;

/// Environment variable naming a command-line player, e.g.
/// `ffplay -nodisp -autoexit -loglevel quiet`. The clip path is appended.
pub const AUDIO_PLAYER_VAR: &str = "LINGUA_AUDIO_PLAYER";

#[derive(Debug)]
pub struct FileClip {
    path: PathBuf,
    stop: Notify,
}

impl FileClip {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Writes clips into a directory and plays them with an external player.
///
/// With a player command configured, playback runs as a child process that
/// `release` kills and the clip file is removed afterwards. Without one the
/// clip is handed to the system default application, which may still be
/// reading it after `play_to_end` returns and cannot be stopped from here.
/// Those files are pruned on the next `load`, so only the newest stays.
#[derive(Debug, Clone)]
pub struct FileAudioOutput {
    dir: PathBuf,
    player: Option<Vec<String>>,
}

impl FileAudioOutput {
    /// `player` is split on whitespace into program and arguments.
    pub fn new(dir: impl Into<PathBuf>, player: Option<&str>) -> Self {
        let player = player
            .map(|p| p.split_whitespace().map(str::to_string).collect::<Vec<_>>())
            .filter(|args| !args.is_empty());
        Self { dir: dir.into(), player }
    }

    pub fn with_player_args(dir: impl Into<PathBuf>, argv: Vec<String>) -> Self {
        let player = Some(argv).filter(|args| !args.is_empty());
        Self { dir: dir.into(), player }
    }

    pub fn from_env(dir: impl Into<PathBuf>) -> Self {
        Self::new(dir, std::env::var(AUDIO_PLAYER_VAR).ok().as_deref())
    }

    /// Deletes every `.mp3` in the clip directory other than `keep`.
    async fn prune_clips_except(&self, keep: &Path) {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to list clips in {}: {e}", self.dir.display());
                return;
            }
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path == keep || path.extension() != Some(OsStr::new("mp3")) {
                continue;
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!("Removed stale clip {}", path.display()),
                Err(e) => warn!("Failed to remove clip {}: {e}", path.display()),
            }
        }
    }
}

impl AudioOutput for FileAudioOutput {
    type Clip = FileClip;

    async fn load(&self, audio: Vec<u8>) -> Result<FileClip, AudioError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(format!("{}.mp3", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, audio).await?;
        debug!("Wrote clip to {}", path.display());
        if self.player.is_none() {
            self.prune_clips_except(&path).await;
        }
        Ok(FileClip { path, stop: Notify::new() })
    }

    async fn play_to_end(&self, clip: &FileClip) -> Result<(), AudioError> {
        let Some((program, args)) = self.player.as_ref().and_then(|p| p.split_first()) else {
            return open::that_detached(&clip.path)
                .map_err(|e| AudioError::playback(format!("could not open {}: {e}", clip.path.display())));
        };

        let mut child = Command::new(program)
            .args(args)
            .arg(&clip.path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AudioError::playback(format!("could not start {program}: {e}")))?;

        let exited = tokio::select! {
            status = child.wait() => Some(status?),
            _ = clip.stop.notified() => None,
        };
        match exited {
            Some(status) if !status.success() => {
                return Err(AudioError::playback(format!("{program} exited with {status}")));
            }
            Some(_) => {}
            None => {
                debug!("Stopping player for {}", clip.path.display());
                child.kill().await?;
            }
        }
        Ok(())
    }

    fn release(&self, clip: &FileClip) {
        clip.stop.notify_one();
        if self.player.is_some() {
            if let Err(e) = std::fs::remove_file(&clip.path) {
                warn!("Failed to remove clip {}: {e}", clip.path.display());
            }
        }
    }
}
