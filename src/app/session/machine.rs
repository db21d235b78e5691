//! Per-lesson playback state machine.
//!
//! One machine per mounted lesson; switching lessons means building a fresh
//! machine, which is what keeps resume state from one lesson out of the next.
//! The machine is pure with respect to time and cadence: it reacts to the
//! event sequence it is fed (ready, heartbeats, end, error) and talks to
//! persistence only through the `ProgressStore` seam.

use crate::source::PlaybackStrategy;

use super::progress::ProgressStore;
use super::{RESUME_FLOOR_SECS, SAVE_SPACING_SECS};

/// What the caller should do once the player reports ready.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum ReadyOutcome {
    /// Seek to the saved position before handing control to the viewer.
    SeekTo(f64),
    /// No usable saved position; play from the start.
    FromStart,
    /// Strategy has no playback control; nothing to do.
    NotTracked,
}

#[derive(Debug)]
pub(crate) struct PlaybackSession {
    lesson_id: String,
    strategy: PlaybackStrategy,
    ready: bool,
    playing: bool,
    errored: bool,
    has_resumed: bool,
    last_saved_secs: f64,
}

impl PlaybackSession {
    pub(crate) fn new(lesson_id: &str, strategy: PlaybackStrategy) -> Self {
        // Opaque embeds give no readiness signal; treat them as ready now.
        let ready = !strategy.tracks_progress();
        Self {
            lesson_id: lesson_id.to_string(),
            strategy,
            ready,
            playing: false,
            errored: false,
            has_resumed: false,
            last_saved_secs: 0.0,
        }
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.ready
    }

    pub(crate) fn is_playing(&self) -> bool {
        self.playing
    }

    pub(crate) fn is_errored(&self) -> bool {
        self.errored
    }

    pub(crate) fn has_resumed(&self) -> bool {
        self.has_resumed
    }

    /// Player signalled readiness. Loads saved progress at most once per
    /// session; later readiness-adjacent events fall through to `FromStart`.
    pub(crate) fn on_ready(&mut self, store: &dyn ProgressStore) -> ReadyOutcome {
        if self.errored || !self.strategy.tracks_progress() {
            return ReadyOutcome::NotTracked;
        }
        self.ready = true;
        self.playing = true;

        if self.has_resumed {
            return ReadyOutcome::FromStart;
        }
        self.has_resumed = true;

        match store.load(&self.lesson_id) {
            Some(record) if record.position_secs > RESUME_FLOOR_SECS && !record.completed => {
                ReadyOutcome::SeekTo(record.position_secs)
            }
            _ => ReadyOutcome::FromStart,
        }
    }

    /// Periodic position report from the player. Persists only when playback
    /// has moved more than the save spacing past the last persisted position.
    pub(crate) fn on_heartbeat(
        &mut self,
        position_secs: f64,
        duration_secs: f64,
        store: &dyn ProgressStore,
    ) {
        if self.errored || !self.ready || !self.strategy.tracks_progress() {
            return;
        }
        self.playing = true;

        if position_secs - self.last_saved_secs > SAVE_SPACING_SECS {
            store.save(&self.lesson_id, position_secs, duration_secs, false);
            self.last_saved_secs = position_secs;
        }
    }

    pub(crate) fn on_pause(&mut self) {
        self.playing = false;
    }

    /// End of media: persist completion unconditionally, throttle ignored.
    /// Returns true when a completion was recorded so the caller can
    /// auto-advance.
    pub(crate) fn on_ended(&mut self, duration_secs: f64, store: &dyn ProgressStore) -> bool {
        if self.errored || !self.strategy.tracks_progress() {
            return false;
        }
        store.save(&self.lesson_id, duration_secs, duration_secs, true);
        self.last_saved_secs = duration_secs;
        self.playing = false;
        true
    }

    /// Player failure. Terminal for this session: no further saves.
    pub(crate) fn on_error(&mut self) {
        self.errored = true;
        self.playing = false;
        self.ready = false;
    }
}
