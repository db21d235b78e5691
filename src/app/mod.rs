mod catalog;
mod session;
mod tui;


use anyhow::Result;

use crate::cli::{Cli, Command};
use crate::db::Database;
use crate::http::RetryPolicy;
use crate::paths::{catalog_cache_path, database_file_path, settings_file_path};
use crate::settings::{CurrentUser, Settings};
use crate::source::{VideoSource, classify};

use self::catalog::{CatalogCache, Lesson};
use self::session::{PlayOutcome, SqliteProgressStore, play_lesson};

pub fn run(cli: Cli) -> Result<()> {
    let mut env = AppEnv::load()?;

    match cli.command {
        Some(Command::Play { lesson_id }) => run_play(&env, &lesson_id)?,
        Some(Command::Resume) => run_resume(&env)?,
        Some(Command::List) => run_list(&env)?,
        Some(Command::Classify { input }) => run_classify(&input),
        Some(Command::Sync) => run_sync(&env)?,
        Some(Command::Tui) | None => tui::run_tui(&mut env)?,
    }

    Ok(())
}

pub(crate) struct AppEnv {
    pub(crate) db: Database,
    pub(crate) settings: Settings,
    pub(crate) catalog: CatalogCache,
    pub(crate) user: Option<CurrentUser>,
}

impl AppEnv {
    fn load() -> Result<Self> {
        let settings = Settings::load(&settings_file_path()?)?;

        let db = Database::open(&database_file_path()?)?;
        db.migrate()?;

        let (catalog, warnings) = CatalogCache::load_from_storage(&catalog_cache_path()?)?;
        for warning in warnings {
            eprintln!("Warning: {warning}");
        }

        // Two-phase identity: the provisional user from settings/env is
        // usable immediately; the profile row supersedes it once ensured.
        let user = match settings.resolve_user() {
            Some(provisional) => {
                let profile = db.ensure_profile(&provisional.user_id, &provisional.display_name)?;
                Some(CurrentUser {
                    user_id: profile.user_id,
                    display_name: profile.display_name,
                    provisional: false,
                })
            }
            None => None,
        };

        Ok(Self {
            db,
            settings,
            catalog,
            user,
        })
    }
}

fn run_play(env: &AppEnv, lesson_id: &str) -> Result<()> {
    let Some(lesson) = env.catalog.find(lesson_id) else {
        println!("No lesson with id `{lesson_id}` in the catalog. Run `lessontrack sync` first?");
        return Ok(());
    };

    let mut current = lesson.clone();
    loop {
        let Some(outcome) = play_single_lesson(env, &current)? else {
            break;
        };
        let Some(next) =
            autoplay_successor(&env.catalog, &env.settings, &current.id, outcome.completed)
        else {
            if outcome.completed && env.settings.autoplay_next {
                println!("Lesson completed. That was the last lesson in the catalog.");
            }
            break;
        };
        println!("Lesson completed. Next up: {}", next.title);
        current = next.clone();
    }
    Ok(())
}

/// Lesson to chain into after `lesson_id`: the lesson must have completed,
/// `autoplay_next` must be on, and the catalog must have a successor. Both
/// front-ends route their advance decision through here.
pub(crate) fn autoplay_successor<'a>(
    catalog: &'a CatalogCache,
    settings: &Settings,
    lesson_id: &str,
    completed: bool,
) -> Option<&'a Lesson> {
    if completed && settings.autoplay_next {
        catalog.next_after(lesson_id)
    } else {
        None
    }
}

/// Plays one lesson and reports the outcome. `None` means the lesson had no
/// playable source (nothing was attempted).
fn play_single_lesson(env: &AppEnv, lesson: &Lesson) -> Result<Option<PlayOutcome>> {
    let Some(source) = classify(&lesson.video_url) else {
        println!("`{}` has no video source yet.", lesson.title);
        return Ok(None);
    };

    println!("Playing: {} [{}]", lesson.title, source.strategy.label());
    if env.user.is_none() && source.strategy.tracks_progress() {
        println!("No user configured; progress will not be saved.");
    }

    let store = SqliteProgressStore::new(&env.db, env.user.as_ref());
    let outcome = match play_lesson(lesson, &source, &store, &env.settings.player_bin) {
        Ok(outcome) => outcome,
        Err(err) => {
            println!("Player launch failed: {err}");
            print_external_affordance(&source);
            return Ok(None);
        }
    };

    if outcome.success {
        if outcome.completed {
            println!("Finished: {}", lesson.title);
        } else if let Some(position) = outcome.last_position_secs {
            println!(
                "Stopped at {}; progress {}.",
                format_position(position),
                if outcome.tracked && env.user.is_some() {
                    "saved"
                } else {
                    "not tracked"
                }
            );
        }
    } else {
        match outcome.failure_detail.as_deref() {
            Some(detail) => println!("Playback failed: {detail}"),
            None => println!("Playback failed."),
        }
        print_external_affordance(&source);
    }

    Ok(Some(outcome))
}

fn print_external_affordance(source: &VideoSource) {
    println!("You can retry, or open the source directly:");
    println!("  {}", source.payload);
}

fn run_resume(env: &AppEnv) -> Result<()> {
    let Some(user) = env.user.as_ref() else {
        println!("No user configured. Set `user_id` in settings or LESSONTRACK_USER.");
        return Ok(());
    };

    match env.db.last_in_progress(&user.user_id)? {
        Some(row) => {
            println!(
                "Resuming last lesson (saved at {}).",
                format_position(row.position_secs)
            );
            run_play(env, &row.lesson_id)
        }
        None => {
            println!("Nothing to resume. Every started lesson is finished.");
            Ok(())
        }
    }
}

fn run_list(env: &AppEnv) -> Result<()> {
    let lessons = env.catalog.get();
    if lessons.is_empty() {
        println!("Catalog is empty. Run `lessontrack sync` to fetch it.");
        return Ok(());
    }

    let progress_by_lesson: std::collections::HashMap<String, crate::db::ProgressRow> =
        match env.user.as_ref() {
            Some(user) => env
                .db
                .list_progress(&user.user_id)?
                .into_iter()
                .map(|row| (row.lesson_id.clone(), row))
                .collect(),
            None => Default::default(),
        };

    println!("{:<24} {:<40} {:<12} {:<10}", "LESSON ID", "TITLE", "PROGRESS", "STATUS");
    for lesson in lessons {
        let (progress, status) = match progress_by_lesson.get(&lesson.id) {
            Some(row) if row.completed => ("100%".to_string(), "done"),
            Some(row) if row.duration_secs > 0.0 => (
                format!(
                    "{:.0}%",
                    (row.position_secs / row.duration_secs * 100.0).clamp(0.0, 100.0)
                ),
                "started",
            ),
            Some(_) => ("-".to_string(), "started"),
            None => ("-".to_string(), "new"),
        };
        println!(
            "{:<24} {:<40} {:<12} {:<10}",
            truncate(&lesson.id, 24),
            truncate(&lesson.title, 40),
            progress,
            status
        );
    }
    Ok(())
}

fn run_classify(input: &str) {
    match classify(input) {
        Some(source) => {
            println!("strategy: {}", source.strategy.label());
            println!("payload:  {}", source.payload);
        }
        None => println!("empty input: nothing to play"),
    }
}

fn run_sync(env: &AppEnv) -> Result<()> {
    let Some(url) = env.settings.catalog_url.as_deref() else {
        println!("No `catalog_url` configured in settings.");
        return Ok(());
    };

    match CatalogCache::fetch_remote(url, &RetryPolicy::default()) {
        Ok((lessons, raw)) => {
            let count = lessons.len();
            let (mut cache, _) = CatalogCache::load_from_storage(&catalog_cache_path()?)?;
            cache.set_and_persist(lessons, &raw)?;
            println!("Catalog synced: {count} lessons.");
        }
        Err(err) => println!("Catalog sync failed: {err}"),
    }
    Ok(())
}

pub(crate) fn format_position(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{kept}…")
}
