use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "lessontrack",
    version,
    about = "Play course lessons with resume and watch-progress tracking"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Play a lesson by catalog id, resuming from the saved position
    Play {
        lesson_id: String,
    },
    /// Continue the most recently watched unfinished lesson
    Resume,
    /// List lessons with saved progress
    List,
    /// Show how a video source string would be played
    Classify {
        input: String,
    },
    /// Refresh the local catalog copy from the configured remote URL
    Sync,
    Tui,
}
