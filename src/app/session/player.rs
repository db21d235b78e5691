//! Drives real playback for a classified source.
//!
//! Native sources run under the configured player (mpv) with a JSON IPC
//! socket; the poll loop feeds the session machine heartbeats and applies its
//! resume seek. Iframe and embed sources are handed to the system opener and
//! play untracked; there is no control channel into a browser tab.

use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::Command as ProcessCommand;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};

use crate::app::catalog::Lesson;
use crate::source::{PlaybackStrategy, VideoSource};

use super::machine::PlaybackSession;
use super::process::{spawn_interactive_cmd, with_sigint_ignored};
use super::progress::ProgressStore;

#[derive(Debug, Clone)]
pub(crate) struct PlayOutcome {
    pub(crate) success: bool,
    pub(crate) completed: bool,
    pub(crate) tracked: bool,
    pub(crate) last_position_secs: Option<f64>,
    pub(crate) failure_detail: Option<String>,
}

impl PlayOutcome {
    fn untracked() -> Self {
        Self {
            success: true,
            completed: false,
            tracked: false,
            last_position_secs: None,
            failure_detail: None,
        }
    }

    fn failed(detail: String) -> Self {
        Self {
            success: false,
            completed: false,
            tracked: false,
            last_position_secs: None,
            failure_detail: Some(detail),
        }
    }
}

pub(crate) fn play_lesson(
    lesson: &Lesson,
    source: &VideoSource,
    store: &dyn ProgressStore,
    player_bin: &str,
) -> Result<PlayOutcome> {
    match source.strategy {
        PlaybackStrategy::Native => run_native_playback(lesson, &source.payload, store, player_bin),
        PlaybackStrategy::Iframe => {
            open_external(&source.payload)?;
            Ok(PlayOutcome::untracked())
        }
        PlaybackStrategy::Embed => {
            let shell = write_embed_shell(&lesson.id, &lesson.title, &source.payload)?;
            open_external(&shell.display().to_string())?;
            Ok(PlayOutcome::untracked())
        }
    }
}

/// Hand a URL (or file path) to the platform opener.
pub(crate) fn open_external(target: &str) -> Result<()> {
    let opener = if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    };
    let status = ProcessCommand::new(opener)
        .arg(target)
        .status()
        .with_context(|| format!("failed to launch {opener}"))?;
    if !status.success() {
        anyhow::bail!("{opener} exited with status: {status}");
    }
    Ok(())
}

/// Raw embed markup cannot be opened directly; wrap it in a minimal HTML
/// document the browser can load from disk. The file is left behind for the
/// browser to read asynchronously.
fn write_embed_shell(lesson_id: &str, title: &str, markup: &str) -> Result<PathBuf> {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let path = env::temp_dir().join(format!("lessontrack-embed-{lesson_id}-{ts}.html"));
    let document = format!(
        "<!doctype html>\n<html>\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n<body>{markup}</body>\n</html>\n"
    );
    fs::write(&path, document)
        .with_context(|| format!("failed to write embed shell at {}", path.display()))?;
    Ok(path)
}

const IPC_CONNECT_DEADLINE: Duration = Duration::from_secs(10);
const HEARTBEAT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[cfg(unix)]
fn run_native_playback(
    lesson: &Lesson,
    payload: &str,
    store: &dyn ProgressStore,
    player_bin: &str,
) -> Result<PlayOutcome> {
    use self::ipc::{IpcSocketDir, MpvClient};
    use super::machine::ReadyOutcome;

    let mut session = PlaybackSession::new(&lesson.id, PlaybackStrategy::Native);
    let ipc_dir = IpcSocketDir::new()?;
    let socket = ipc_dir.socket_path();

    let mut cmd = ProcessCommand::new(player_bin);
    cmd.arg(payload)
        .arg(format!("--input-ipc-server={}", socket.display()))
        .arg("--keep-open=no");
    for subtitle in &lesson.subtitles {
        cmd.arg(format!("--sub-file={}", subtitle.file_url));
    }

    with_sigint_ignored(|| {
        let mut child = match spawn_interactive_cmd(cmd) {
            Ok(child) => child,
            Err(err) => {
                session.on_error();
                return Ok(PlayOutcome::failed(format!("{player_bin} failed to start: {err}")));
            }
        };

        let mut client = match MpvClient::connect(&socket, &mut child, IPC_CONNECT_DEADLINE) {
            Ok(Some(client)) => client,
            Ok(None) => {
                session.on_error();
                return Ok(PlayOutcome::failed(
                    "player exited before playback started".to_string(),
                ));
            }
            Err(err) => {
                // The player runs fine without its IPC socket; only tracking
                // is lost.
                eprintln!("Warning: player IPC unavailable, progress tracking disabled: {err}");
                let status = child.wait()?;
                let mut outcome = PlayOutcome::untracked();
                outcome.success = status.success();
                return Ok(outcome);
            }
        };

        let mut last_position = None;
        let mut last_duration = lesson.duration_hint_secs.unwrap_or(0.0);
        let mut completed = false;
        let mut announced_ready = false;

        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }

            let position = client.get_property_f64("time-pos");
            let duration = client.get_property_f64("duration");

            if let (Some(position), Some(duration)) = (position, duration) {
                if !announced_ready {
                    announced_ready = true;
                    if let ReadyOutcome::SeekTo(saved) = session.on_ready(store) {
                        client.seek_to(saved);
                    }
                } else if client.get_property_bool("pause").unwrap_or(false) {
                    session.on_pause();
                } else {
                    session.on_heartbeat(position, duration, store);
                }
                last_position = Some(position);
                last_duration = duration;
            }

            if !completed && client.get_property_bool("eof-reached").unwrap_or(false) {
                completed = session.on_ended(last_duration, store);
            }

            std::thread::sleep(HEARTBEAT_POLL_INTERVAL);
        };

        let success = status.success() || completed;
        Ok(PlayOutcome {
            success,
            completed,
            tracked: true,
            last_position_secs: last_position,
            failure_detail: (!success).then(|| format!("player exited with status: {status}")),
        })
    })
}

#[cfg(not(unix))]
fn run_native_playback(
    lesson: &Lesson,
    payload: &str,
    _store: &dyn ProgressStore,
    player_bin: &str,
) -> Result<PlayOutcome> {
    let _ = PlaybackSession::new(&lesson.id, PlaybackStrategy::Native);
    eprintln!("Warning: progress tracking requires a unix IPC socket; playing without tracking");
    let mut cmd = ProcessCommand::new(player_bin);
    cmd.arg(payload);
    for subtitle in &lesson.subtitles {
        cmd.arg(format!("--sub-file={}", subtitle.file_url));
    }
    let status = with_sigint_ignored(|| {
        cmd.status()
            .with_context(|| format!("failed to launch {player_bin}"))
    })?;
    let mut outcome = PlayOutcome::untracked();
    outcome.success = status.success();
    Ok(outcome)
}

#[cfg(unix)]
mod ipc {
    use std::io::{BufRead, BufReader, Write};
    use std::os::unix::net::UnixStream;
    use std::path::{Path, PathBuf};
    use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

    use anyhow::{Context, Result};
    use serde_json::{Value, json};

    use crate::app::session::process::InteractiveChild;

    pub(super) struct IpcSocketDir {
        path: PathBuf,
    }

    impl IpcSocketDir {
        pub(super) fn new() -> Result<Self> {
            let ts = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0);
            let dir = std::env::temp_dir()
                .join(format!("lessontrack-ipc-{}-{ts}", std::process::id()));
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create IPC dir {}", dir.display()))?;
            Ok(Self { path: dir })
        }

        pub(super) fn socket_path(&self) -> PathBuf {
            self.path.join("mpv.sock")
        }
    }

    impl Drop for IpcSocketDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.path);
        }
    }

    pub(super) struct MpvClient {
        reader: BufReader<UnixStream>,
        writer: UnixStream,
        next_request_id: u64,
    }

    impl MpvClient {
        /// Poll for the socket until the player exposes it, the player exits
        /// (`Ok(None)`), or the deadline passes.
        pub(super) fn connect(
            socket: &Path,
            child: &mut InteractiveChild,
            deadline: Duration,
        ) -> Result<Option<Self>> {
            let started = Instant::now();
            loop {
                if child.try_wait()?.is_some() {
                    return Ok(None);
                }
                match UnixStream::connect(socket) {
                    Ok(stream) => {
                        stream
                            .set_read_timeout(Some(Duration::from_millis(500)))
                            .context("failed to set IPC read timeout")?;
                        let writer = stream
                            .try_clone()
                            .context("failed to clone IPC stream")?;
                        return Ok(Some(Self {
                            reader: BufReader::new(stream),
                            writer,
                            next_request_id: 1,
                        }));
                    }
                    Err(_) if started.elapsed() < deadline => {
                        std::thread::sleep(Duration::from_millis(100));
                    }
                    Err(err) => {
                        return Err(err).context("player IPC socket never became available");
                    }
                }
            }
        }

        pub(super) fn get_property_f64(&mut self, name: &str) -> Option<f64> {
            self.get_property(name)?.as_f64()
        }

        pub(super) fn get_property_bool(&mut self, name: &str) -> Option<bool> {
            self.get_property(name)?.as_bool()
        }

        pub(super) fn seek_to(&mut self, position_secs: f64) {
            let msg = json!({ "command": ["seek", position_secs, "absolute"] });
            let _ = writeln!(self.writer, "{msg}");
        }

        fn get_property(&mut self, name: &str) -> Option<Value> {
            let request_id = self.next_request_id;
            self.next_request_id += 1;
            let msg = json!({ "command": ["get_property", name], "request_id": request_id });
            writeln!(self.writer, "{msg}").ok()?;

            // Responses interleave with asynchronous event lines; skip those
            // until our request_id comes back (bounded, in case it never
            // does).
            let mut line = String::new();
            for _ in 0..64 {
                line.clear();
                match self.reader.read_line(&mut line) {
                    Ok(0) => return None,
                    Ok(_) => {
                        let Ok(value) = serde_json::from_str::<Value>(&line) else {
                            continue;
                        };
                        if value.get("request_id").and_then(Value::as_u64) != Some(request_id) {
                            continue;
                        }
                        if value.get("error").and_then(Value::as_str) == Some("success") {
                            return value.get("data").cloned();
                        }
                        return None;
                    }
                    Err(_) => return None,
                }
            }
            None
        }
    }
}
