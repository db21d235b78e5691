mod actions;
mod render;
mod session;

use std::io;
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::TableState;

use crate::db::ProgressRow;

use super::AppEnv;
use super::catalog::{CatalogCache, CatalogRefreshResult, Lesson};

use self::actions::{
    build_rows, refresh_rows, run_selected_action, status_error, status_info,
};
use self::render::draw_tui;
use self::session::TuiSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TuiAction {
    Play,
    Restart,
    Open,
    Complete,
}

impl TuiAction {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Play => "PLAY",
            Self::Restart => "RESTART",
            Self::Open => "OPEN",
            Self::Complete => "COMPLETE",
        }
    }

    pub(crate) fn move_left(self) -> Self {
        match self {
            Self::Play => Self::Play,
            Self::Restart => Self::Play,
            Self::Open => Self::Restart,
            Self::Complete => Self::Open,
        }
    }

    pub(crate) fn move_right(self) -> Self {
        match self {
            Self::Play => Self::Restart,
            Self::Restart => Self::Open,
            Self::Open => Self::Complete,
            Self::Complete => Self::Complete,
        }
    }
}

#[derive(Debug, Clone)]
pub(super) struct LessonRow {
    pub(super) lesson: Lesson,
    pub(super) progress: Option<ProgressRow>,
}

#[derive(Debug, Clone)]
pub(super) struct PendingDelete {
    pub(super) lesson_id: String,
    pub(super) title: String,
}

pub(crate) fn run_tui(env: &mut AppEnv) -> Result<()> {
    let mut tui_session = TuiSession::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))
        .context("failed to initialize terminal backend")?;
    terminal.clear()?;

    let mut rows = build_rows(env)?;
    let mut table_state = TableState::default();
    table_state.select((!rows.is_empty()).then_some(0));
    let mut action = TuiAction::Play;
    let mut pending_delete = None::<PendingDelete>;
    let (refresh_tx, refresh_rx) = mpsc::channel::<CatalogRefreshResult>();
    let mut sync_in_flight = false;
    let mut status = if rows.is_empty() {
        status_info("Catalog is empty. Press `s` to sync or run `lessontrack sync`.")
    } else {
        status_info("Ready.")
    };

    loop {
        if sync_in_flight
            && let Ok(result) = refresh_rx.try_recv()
        {
            sync_in_flight = false;
            match result.fetched {
                Some((lessons, raw)) => {
                    let count = lessons.len();
                    env.catalog.set_and_persist(lessons, &raw)?;
                    refresh_rows(env, &mut rows, &mut table_state, None)?;
                    status = status_info(&format!("Catalog synced: {count} lessons."));
                }
                None => {
                    let detail = result.warning.unwrap_or_else(|| "unknown error".to_string());
                    status = status_error(&format!("Catalog sync failed: {detail}"));
                }
            }
        }

        terminal.draw(|frame| {
            draw_tui(
                frame,
                env,
                &rows,
                &mut table_state,
                action,
                &status,
                pending_delete.as_ref(),
                sync_in_flight,
            )
        })?;

        if !event::poll(Duration::from_millis(200))? {
            continue;
        }

        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        if let Some(dialog) = pending_delete.as_ref() {
            match key.code {
                KeyCode::Char('y') | KeyCode::Enter => {
                    let deleting_id = dialog.lesson_id.clone();
                    let deleting_title = dialog.title.clone();
                    pending_delete = None;
                    let Some(user) = env.user.as_ref() else {
                        status = status_error("Delete failed: no user configured.");
                        continue;
                    };
                    match env.db.delete_progress(&user.user_id, &deleting_id) {
                        Ok(true) => {
                            status =
                                status_info(&format!("Progress reset for: {deleting_title}"));
                            refresh_rows(env, &mut rows, &mut table_state, None)?;
                        }
                        Ok(false) => {
                            status = status_error("Delete failed: no saved progress.");
                        }
                        Err(err) => status = status_error(&format!("Delete failed: {err}")),
                    }
                }
                KeyCode::Esc | KeyCode::Char('n') => {
                    pending_delete = None;
                    status = status_info("Delete canceled.");
                }
                _ => {}
            }
            continue;
        }

        match key.code {
            KeyCode::Char('q') => break,
            KeyCode::Char('s') => {
                let Some(url) = env.settings.catalog_url.clone() else {
                    status = status_error("No `catalog_url` configured in settings.");
                    continue;
                };
                if !sync_in_flight {
                    sync_in_flight = true;
                    CatalogCache::spawn_refresh(url, refresh_tx.clone());
                    status = status_info("Syncing catalog...");
                }
            }
            KeyCode::Up => {
                if let Some(selected) = table_state.selected() {
                    table_state.select(Some(selected.saturating_sub(1)));
                }
            }
            KeyCode::Down => {
                if let Some(selected) = table_state.selected()
                    && !rows.is_empty()
                {
                    let next = (selected + 1).min(rows.len().saturating_sub(1));
                    table_state.select(Some(next));
                }
            }
            KeyCode::Left => action = action.move_left(),
            KeyCode::Right => action = action.move_right(),
            KeyCode::Char('d') => {
                let Some(selected) = table_state.selected() else {
                    status = status_error("Delete failed: no lesson selected.");
                    continue;
                };
                let Some(row) = rows.get(selected) else {
                    status = status_error("Delete failed: invalid selection.");
                    continue;
                };
                if row.progress.is_none() {
                    status = status_info("No saved progress for that lesson.");
                    continue;
                }
                pending_delete = Some(PendingDelete {
                    lesson_id: row.lesson.id.clone(),
                    title: row.lesson.title.clone(),
                });
                status = status_info("Confirm reset: y/Enter to reset progress, n/Esc to cancel.");
            }
            KeyCode::Enter => {
                let Some(selected) = table_state.selected() else {
                    continue;
                };
                let Some(row) = rows.get(selected).cloned() else {
                    continue;
                };

                tui_session.suspend()?;
                let result = run_selected_action(env, &row, action);
                tui_session.resume()?;
                terminal.clear()?;

                match result {
                    Ok(msg) => status = status_info(&msg),
                    Err(err) => {
                        status = status_error(&format!(
                            "Action failed for {}: {err}",
                            row.lesson.title
                        ));
                    }
                }

                refresh_rows(env, &mut rows, &mut table_state, Some(&row.lesson.id))?;
            }
            _ => {}
        }
    }

    terminal.show_cursor()?;
    tui_session.leave()?;
    Ok(())
}
