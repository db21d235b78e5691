use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, BorderType, Borders, Cell, Clear, Gauge, Padding, Paragraph, Row, Table, TableState,
    Wrap,
};

use crate::source::classify;

use super::super::{AppEnv, format_position, truncate};
use super::{LessonRow, PendingDelete, TuiAction};

struct Labels {
    library: &'static str,
    selected: &'static str,
    progress: &'static str,
    controls: &'static str,
    status: &'static str,
}

fn labels_for(language: &str) -> Labels {
    if language == "ar" {
        Labels {
            library: "الدروس",
            selected: "المحدد",
            progress: "التقدم",
            controls: "الأوامر",
            status: "الحالة",
        }
    } else {
        Labels {
            library: "Lessons",
            selected: "Selected",
            progress: "Progress",
            controls: "Controls",
            status: "Status",
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub(super) fn draw_tui(
    frame: &mut Frame,
    env: &AppEnv,
    rows: &[LessonRow],
    table_state: &mut TableState,
    action: TuiAction,
    status: &str,
    pending_delete: Option<&PendingDelete>,
    sync_in_flight: bool,
) {
    let labels = labels_for(&env.settings.interface_language);

    let bg = Block::default().style(Style::default().bg(Color::Black));
    frame.render_widget(bg, frame.area());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let user_text = match env.user.as_ref() {
        Some(user) => user.display_name.clone(),
        None => "no user".to_string(),
    };
    let sync_text = if sync_in_flight { "syncing..." } else { "" };
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            "LESSONTRACK",
            Style::default()
                .fg(Color::Rgb(110, 170, 255))
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled("   ", Style::default()),
        Span::styled(
            format!("{} lessons", rows.len()),
            Style::default().fg(Color::Rgb(185, 195, 210)),
        ),
        Span::styled("   ", Style::default()),
        Span::styled(user_text, Style::default().fg(Color::Rgb(185, 195, 210))),
        Span::styled("   ", Style::default()),
        Span::styled(action.label(), Style::default().fg(Color::Yellow)),
        Span::styled("   ", Style::default()),
        Span::styled(sync_text, Style::default().fg(Color::Rgb(205, 165, 255))),
    ]))
    .alignment(Alignment::Center)
    .block(panel_block("Dashboard"));
    frame.render_widget(header, chunks[0]);

    let body_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(64), Constraint::Percentage(36)])
        .split(chunks[1]);
    let details_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(8), Constraint::Length(3)])
        .split(body_chunks[1]);

    let table_rows: Vec<Row> = rows
        .iter()
        .map(|row| {
            let source_label = classify(&row.lesson.video_url)
                .map(|source| source.strategy.label())
                .unwrap_or("-");
            Row::new(vec![
                Cell::from(truncate(&row.lesson.title, 44)),
                Cell::from(source_label),
                Cell::from(progress_text(row)),
                Cell::from(last_watched_text(row)),
            ])
        })
        .collect();

    let table = Table::new(
        table_rows,
        [
            Constraint::Percentage(46),
            Constraint::Length(8),
            Constraint::Length(10),
            Constraint::Length(26),
        ],
    )
    .header(
        Row::new(vec!["Title", "Source", "Progress", "Last Watched"]).style(
            Style::default()
                .fg(Color::Rgb(110, 170, 255))
                .add_modifier(Modifier::BOLD),
        ),
    )
    .block(panel_block(labels.library))
    .row_highlight_style(
        Style::default()
            .bg(Color::Rgb(110, 170, 255))
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("▸ ");
    frame.render_stateful_widget(table, body_chunks[0], table_state);

    let (selection_text, gauge) = match table_state.selected().and_then(|idx| rows.get(idx)) {
        Some(row) => {
            let source_label = classify(&row.lesson.video_url)
                .map(|source| source.strategy.label())
                .unwrap_or("none");
            let subtitles_text = if row.lesson.subtitles.is_empty() {
                "-".to_string()
            } else {
                row.lesson
                    .subtitles
                    .iter()
                    .map(|subtitle| subtitle.label.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            let selection_text = format!(
                "Title\n{}\n\nSource\n{}\n\n{}\n{}\n\nSubtitles\n{}\n\nLast Watched\n{}",
                truncate(&row.lesson.title, 40),
                source_label,
                labels.progress,
                progress_detail_text(row),
                truncate(&subtitles_text, 36),
                last_watched_text(row),
            );
            (selection_text, progress_gauge(row))
        }
        None => (
            "Catalog is empty.\n\nPress s to sync lessons from the configured catalog URL."
                .to_string(),
            None,
        ),
    };
    let selection = Paragraph::new(selection_text)
        .style(Style::default().fg(Color::Rgb(230, 230, 230)))
        .block(panel_block(labels.selected))
        .alignment(Alignment::Left);
    frame.render_widget(selection, details_chunks[0]);
    if let Some((ratio, label)) = gauge {
        let progress = Gauge::default()
            .block(panel_block(labels.progress))
            .gauge_style(
                Style::default()
                    .fg(Color::Rgb(130, 190, 255))
                    .bg(Color::Black)
                    .add_modifier(Modifier::BOLD),
            )
            .label(label)
            .ratio(ratio);
        frame.render_widget(progress, details_chunks[1]);
    }

    let action_line = action_selector_line(action);
    let command_bar = Paragraph::new(action_line)
        .alignment(Alignment::Center)
        .block(panel_block(labels.controls));
    frame.render_widget(command_bar, chunks[2]);

    let status_widget = Paragraph::new(status.to_string())
        .style(status_style(status))
        .block(panel_block(labels.status));
    frame.render_widget(status_widget, chunks[3]);

    if let Some(confirm) = pending_delete {
        let popup_text = format!(
            "Reset saved progress?\n\n{}\n\nThis cannot be undone.\n\n[y / Enter] Reset   [n / Esc] Cancel",
            truncate(&confirm.title, 56)
        );
        let popup_area = popup_rect_for_text(frame.area(), &popup_text);
        render_popup_shadow(frame, popup_area);
        frame.render_widget(Clear, popup_area);
        let popup = Paragraph::new(popup_text)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(modal_block("Confirm Reset"));
        frame.render_widget(popup, popup_area);
    }
}

fn progress_text(row: &LessonRow) -> String {
    match row.progress.as_ref() {
        Some(progress) if progress.completed => "100%".to_string(),
        Some(progress) if progress.duration_secs > 0.0 => format!(
            "{:.0}%",
            (progress.position_secs / progress.duration_secs * 100.0).clamp(0.0, 100.0)
        ),
        Some(_) => "-".to_string(),
        None => "-".to_string(),
    }
}

fn progress_detail_text(row: &LessonRow) -> String {
    match row.progress.as_ref() {
        Some(progress) if progress.completed => "completed".to_string(),
        Some(progress) if progress.duration_secs > 0.0 => format!(
            "{} of {}",
            format_position(progress.position_secs),
            format_position(progress.duration_secs)
        ),
        Some(progress) => format_position(progress.position_secs),
        None => "not started".to_string(),
    }
}

fn progress_gauge(row: &LessonRow) -> Option<(f64, String)> {
    let progress = row.progress.as_ref()?;
    if progress.completed {
        return Some((1.0, "100%".to_string()));
    }
    if progress.duration_secs <= 0.0 {
        return None;
    }
    let ratio = (progress.position_secs / progress.duration_secs).clamp(0.0, 1.0);
    Some((ratio, format!("{:.0}%", ratio * 100.0)))
}

fn last_watched_text(row: &LessonRow) -> String {
    match row.progress.as_ref() {
        Some(progress) => progress
            .updated_at
            .split('T')
            .next()
            .unwrap_or(&progress.updated_at)
            .to_string(),
        None => "-".to_string(),
    }
}

fn panel_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Rgb(125, 135, 150)))
        .title(title)
}

fn modal_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(
            Style::default()
                .fg(Color::Rgb(160, 190, 235))
                .add_modifier(Modifier::BOLD),
        )
        .title(title)
        .padding(Padding::new(2, 2, 1, 1))
}

fn pill_active() -> Style {
    Style::default()
        .bg(Color::Rgb(110, 170, 255))
        .fg(Color::Black)
        .add_modifier(Modifier::BOLD)
}

fn pill_inactive() -> Style {
    Style::default()
        .bg(Color::Rgb(72, 82, 96))
        .fg(Color::Rgb(230, 235, 242))
}

fn action_pill_style(action: TuiAction, current: TuiAction) -> Style {
    if action == current {
        pill_active()
    } else {
        pill_inactive()
    }
}

fn action_selector_line(current: TuiAction) -> Line<'static> {
    Line::from(vec![
        Span::styled(" PLAY ", action_pill_style(TuiAction::Play, current)),
        Span::styled(" ", Style::default()),
        Span::styled(" RESTART ", action_pill_style(TuiAction::Restart, current)),
        Span::styled(" ", Style::default()),
        Span::styled(" OPEN ", action_pill_style(TuiAction::Open, current)),
        Span::styled(" ", Style::default()),
        Span::styled(" COMPLETE ", action_pill_style(TuiAction::Complete, current)),
        Span::styled(
            "   ↑/↓ move  ←/→ action  Enter run  s sync  d reset  q quit",
            Style::default().fg(Color::Rgb(185, 195, 210)),
        ),
    ])
}

fn status_style(status: &str) -> Style {
    if status.starts_with("ERROR:") {
        Style::default()
            .fg(Color::Rgb(255, 145, 120))
            .add_modifier(Modifier::BOLD)
    } else if status.starts_with("INFO:") {
        Style::default().fg(Color::Rgb(205, 165, 255))
    } else {
        Style::default().fg(Color::Rgb(230, 235, 242))
    }
}

fn centered_fixed_rect(width: u16, height: u16, area: Rect) -> Rect {
    let clamped_width = width.min(area.width.max(1));
    let clamped_height = height.min(area.height.max(1));
    let x = area.x + area.width.saturating_sub(clamped_width) / 2;
    let y = area.y + area.height.saturating_sub(clamped_height) / 2;
    Rect::new(x, y, clamped_width, clamped_height)
}

fn render_popup_shadow(frame: &mut Frame, popup_area: Rect) {
    let area = frame.area();
    let shadow = Rect::new(
        (popup_area.x + 1).min(area.x + area.width.saturating_sub(1)),
        (popup_area.y + 1).min(area.y + area.height.saturating_sub(1)),
        popup_area.width.saturating_sub(1),
        popup_area.height.saturating_sub(1),
    );
    if shadow.width == 0 || shadow.height == 0 {
        return;
    }
    let shadow_block = Block::default().style(Style::default().bg(Color::Rgb(14, 16, 24)));
    frame.render_widget(shadow_block, shadow);
}

fn popup_rect_for_text(area: Rect, text: &str) -> Rect {
    let max_line_width = text
        .lines()
        .map(|line| line.chars().count() as u16)
        .max()
        .unwrap_or(0);
    let line_count = text.lines().count() as u16;

    let available_width = area.width.saturating_sub(2).max(1);
    let min_width = 48.min(available_width);
    let max_width = 72.min(available_width);
    let desired_width = max_line_width.saturating_add(12);
    let width = desired_width.clamp(min_width, max_width);

    let available_height = area.height.saturating_sub(2).max(1);
    let min_height = 10.min(available_height);
    let max_height = 18.min(available_height);
    let desired_height = line_count.saturating_add(6);
    let height = desired_height.clamp(min_height, max_height);

    centered_fixed_rect(width, height, area)
}
