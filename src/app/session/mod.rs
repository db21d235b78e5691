mod machine;
mod player;
mod process;
mod progress;

pub(crate) use machine::{PlaybackSession, ReadyOutcome};
pub(crate) use player::{PlayOutcome, open_external, play_lesson};
pub(crate) use progress::{ProgressRecord, ProgressStore, SqliteProgressStore};

/// Saved positions at or below this are treated as "not really started";
/// resuming there would just replay the intro.
pub(crate) const RESUME_FLOOR_SECS: f64 = 5.0;

/// Minimum playback distance between two persisted saves. Heartbeats arrive
/// far more often than this; the throttle keeps writes off the hot path.
pub(crate) const SAVE_SPACING_SECS: f64 = 10.0;
