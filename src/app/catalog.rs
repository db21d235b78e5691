//! Lesson catalog: what the player consumes per lesson.
//!
//! The catalog is a JSON document (`{"lessons": [...]}`) kept as a durable
//! local copy so the UI paints instantly, optionally refreshed from a remote
//! URL in the background. Entries this module cannot make sense of are
//! skipped and counted, never fatal; a half-broken catalog still plays the
//! lessons it can.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::http::{RetryPolicy, fetch_text};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Subtitle {
    pub(crate) language: String,
    pub(crate) label: String,
    pub(crate) file_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Lesson {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) video_url: String,
    pub(crate) duration_hint_secs: Option<f64>,
    pub(crate) subtitles: Vec<Subtitle>,
}

#[derive(Debug)]
pub(crate) struct CatalogRead {
    pub(crate) lessons: Vec<Lesson>,
    pub(crate) skipped: usize,
    pub(crate) warnings: Vec<String>,
}

pub(crate) fn parse_catalog(raw: &str) -> CatalogRead {
    let mut warnings = Vec::new();

    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(err) => {
            warnings.push(format!("catalog is not valid JSON: {err}"));
            return CatalogRead {
                lessons: Vec::new(),
                skipped: 0,
                warnings,
            };
        }
    };

    let Some(items) = value.get("lessons").and_then(Value::as_array) else {
        warnings.push("catalog has no `lessons` array".to_string());
        return CatalogRead {
            lessons: Vec::new(),
            skipped: 0,
            warnings,
        };
    };

    let mut lessons = Vec::new();
    let mut skipped = 0;
    for item in items {
        match parse_lesson(item) {
            Some(lesson) => lessons.push(lesson),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        warnings.push(format!(
            "skipped {skipped} catalog entr{} missing id/title/video_url",
            if skipped == 1 { "y" } else { "ies" }
        ));
    }

    CatalogRead {
        lessons,
        skipped,
        warnings,
    }
}

fn parse_lesson(item: &Value) -> Option<Lesson> {
    let id = string_field(item, "id")?;
    let title = string_field(item, "title")?;
    // video_url may legitimately be empty while a lesson is being authored;
    // classification treats that as the empty sentinel downstream.
    let video_url = item
        .get("video_url")
        .and_then(Value::as_str)
        .map(str::trim)
        .map(str::to_string)?;
    let duration_hint_secs = item
        .get("duration_hint")
        .and_then(Value::as_f64)
        .filter(|secs| *secs >= 0.0);

    let mut subtitles = Vec::new();
    if let Some(entries) = item.get("subtitles").and_then(Value::as_array) {
        for entry in entries {
            let Some(language) = string_field(entry, "language") else {
                continue;
            };
            let Some(file_url) = string_field(entry, "file_url") else {
                continue;
            };
            let label = string_field(entry, "label").unwrap_or_else(|| language.clone());
            subtitles.push(Subtitle {
                language,
                label,
                file_url,
            });
        }
    }

    Some(Lesson {
        id,
        title,
        video_url,
        duration_hint_secs,
        subtitles,
    })
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    let text = value.get(key)?.as_str()?.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

#[derive(Debug)]
pub(crate) struct CatalogRefreshResult {
    /// Parsed lessons plus the raw body they came from, for persistence.
    pub(crate) fetched: Option<(Vec<Lesson>, String)>,
    pub(crate) warning: Option<String>,
}

/// Durable local catalog copy with explicit read-through semantics: load the
/// stored copy for instant paint, refresh from the remote URL when asked, and
/// persist whatever the refresh produced.
pub(crate) struct CatalogCache {
    path: PathBuf,
    lessons: Vec<Lesson>,
}

impl CatalogCache {
    #[cfg(test)]
    pub(crate) fn with_lessons(lessons: Vec<Lesson>) -> Self {
        Self {
            path: PathBuf::new(),
            lessons,
        }
    }

    pub(crate) fn load_from_storage(path: &Path) -> Result<(Self, Vec<String>)> {
        let mut warnings = Vec::new();
        let lessons = if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read catalog at {}", path.display()))?;
            let read = parse_catalog(&raw);
            warnings = read.warnings;
            read.lessons
        } else {
            Vec::new()
        };
        Ok((
            Self {
                path: path.to_path_buf(),
                lessons,
            },
            warnings,
        ))
    }

    pub(crate) fn get(&self) -> &[Lesson] {
        &self.lessons
    }

    pub(crate) fn find(&self, lesson_id: &str) -> Option<&Lesson> {
        self.lessons.iter().find(|lesson| lesson.id == lesson_id)
    }

    /// Lesson after `lesson_id` in catalog order, for auto-advance.
    pub(crate) fn next_after(&self, lesson_id: &str) -> Option<&Lesson> {
        let idx = self
            .lessons
            .iter()
            .position(|lesson| lesson.id == lesson_id)?;
        self.lessons.get(idx + 1)
    }

    pub(crate) fn set_and_persist(&mut self, lessons: Vec<Lesson>, raw: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create catalog directory {}", parent.display())
            })?;
        }
        fs::write(&self.path, raw)
            .with_context(|| format!("failed to write catalog at {}", self.path.display()))?;
        self.lessons = lessons;
        Ok(())
    }

    /// Synchronous remote refresh. Returns the raw body alongside the parsed
    /// lessons so the caller can persist exactly what was fetched.
    pub(crate) fn fetch_remote(url: &str, policy: &RetryPolicy) -> Result<(Vec<Lesson>, String), String> {
        let raw = fetch_text(url, policy)?;
        let read = parse_catalog(&raw);
        if read.lessons.is_empty() && !read.warnings.is_empty() {
            return Err(read.warnings.join(" | "));
        }
        Ok((read.lessons, raw))
    }

    /// Stale-while-revalidate refresh: the cached copy keeps serving while a
    /// background thread fetches, reporting through the channel.
    pub(crate) fn spawn_refresh(url: String, tx: mpsc::Sender<CatalogRefreshResult>) {
        std::thread::spawn(move || {
            let result = match Self::fetch_remote(&url, &RetryPolicy::default()) {
                Ok(fetched) => CatalogRefreshResult {
                    fetched: Some(fetched),
                    warning: None,
                },
                Err(err) => CatalogRefreshResult {
                    fetched: None,
                    warning: Some(err),
                },
            };
            let _ = tx.send(result);
        });
    }
}
