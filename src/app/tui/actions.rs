use anyhow::Result;
use ratatui::widgets::TableState;

use crate::source::{PlaybackStrategy, classify};

use super::super::{AppEnv, autoplay_successor};
use super::super::session::{SqliteProgressStore, open_external, play_lesson};
use super::{LessonRow, TuiAction};

pub(super) fn build_rows(env: &AppEnv) -> Result<Vec<LessonRow>> {
    let mut progress_by_lesson = std::collections::HashMap::new();
    if let Some(user) = env.user.as_ref() {
        for row in env.db.list_progress(&user.user_id)? {
            progress_by_lesson.insert(row.lesson_id.clone(), row);
        }
    }

    Ok(env
        .catalog
        .get()
        .iter()
        .map(|lesson| LessonRow {
            progress: progress_by_lesson.remove(&lesson.id),
            lesson: lesson.clone(),
        })
        .collect())
}

pub(super) fn refresh_rows(
    env: &AppEnv,
    rows: &mut Vec<LessonRow>,
    table_state: &mut TableState,
    preferred_id: Option<&str>,
) -> Result<()> {
    *rows = build_rows(env)?;
    if rows.is_empty() {
        table_state.select(None);
        return Ok(());
    }

    if let Some(id) = preferred_id
        && let Some(idx) = rows.iter().position(|row| row.lesson.id == id)
    {
        table_state.select(Some(idx));
        return Ok(());
    }

    match table_state.selected() {
        Some(selected) => table_state.select(Some(selected.min(rows.len() - 1))),
        None => table_state.select(Some(0)),
    }
    Ok(())
}

pub(super) fn status_info(msg: &str) -> String {
    format!("INFO: {msg}")
}

pub(super) fn status_error(msg: &str) -> String {
    format!("ERROR: {msg}")
}

pub(super) fn run_selected_action(
    env: &AppEnv,
    row: &LessonRow,
    action: TuiAction,
) -> Result<String> {
    match action {
        TuiAction::Play => play_with_resume(env, row),
        TuiAction::Restart => {
            if let Some(user) = env.user.as_ref() {
                env.db.delete_progress(&user.user_id, &row.lesson.id)?;
            }
            play_with_resume(env, row)
        }
        TuiAction::Open => {
            let Some(source) = classify(&row.lesson.video_url) else {
                return Ok(format!("`{}` has no video source yet.", row.lesson.title));
            };
            if source.strategy == PlaybackStrategy::Embed {
                let store = SqliteProgressStore::new(&env.db, None);
                play_lesson(&row.lesson, &source, &store, &env.settings.player_bin)?;
            } else {
                open_external(&source.payload)?;
            }
            Ok(format!("Opened externally: {}", row.lesson.title))
        }
        TuiAction::Complete => {
            let Some(user) = env.user.as_ref() else {
                return Ok("No user configured; progress cannot be saved.".to_string());
            };
            let duration = row
                .progress
                .as_ref()
                .map(|progress| progress.duration_secs)
                .filter(|secs| *secs > 0.0)
                .or(row.lesson.duration_hint_secs)
                .unwrap_or(0.0);
            env.db
                .upsert_progress(&user.user_id, &row.lesson.id, duration, duration, true)?;
            Ok(format!("Marked complete: {}", row.lesson.title))
        }
    }
}

fn play_with_resume(env: &AppEnv, row: &LessonRow) -> Result<String> {
    let mut current = row.lesson.clone();
    loop {
        let Some(source) = classify(&current.video_url) else {
            return Ok(format!("`{}` has no video source yet.", current.title));
        };

        let store = SqliteProgressStore::new(&env.db, env.user.as_ref());
        let outcome = play_lesson(&current, &source, &store, &env.settings.player_bin)?;

        if let Some(next) =
            autoplay_successor(&env.catalog, &env.settings, &current.id, outcome.completed)
        {
            current = next.clone();
            continue;
        }

        return Ok(if outcome.completed {
            format!("Finished: {}", current.title)
        } else if outcome.success {
            match outcome.last_position_secs {
                Some(position) if outcome.tracked && env.user.is_some() => format!(
                    "Stopped at {}; progress saved.",
                    super::super::format_position(position)
                ),
                _ => format!("Playback ended: {}", current.title),
            }
        } else {
            match outcome.failure_detail.as_deref() {
                Some(detail) => format!("Playback failed: {detail}"),
                None => "Playback failed.".to_string(),
            }
        });
    }
}
