//! Turns an operator-supplied video source string into a playback strategy.
//!
//! Catalog authors paste anything here: platform URLs, direct file links,
//! Drive share links, whole `<iframe>` snippets. Classification must never
//! fail: an unrecognized string degrades to a generic iframe embed instead
//! of blocking the lesson.

/// How a classified source should be played.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PlaybackStrategy {
    /// A player we control directly: seek, pause, progress heartbeats.
    Native,
    /// Embed the URL in a frame; no playback control, no progress tracking.
    Iframe,
    /// Operator-supplied raw markup injected as-is; no tracking.
    Embed,
}

impl PlaybackStrategy {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Iframe => "iframe",
            Self::Embed => "embed",
        }
    }

    /// Progress tracking is exclusive to sources the player controls.
    pub(crate) fn tracks_progress(self) -> bool {
        matches!(self, Self::Native)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct VideoSource {
    pub(crate) strategy: PlaybackStrategy,
    pub(crate) payload: String,
}

const STREAMING_HOSTS: [&str; 3] = ["youtube.com", "youtu.be", "vimeo.com"];
const VIDEO_FILE_EXTENSIONS: [&str; 5] = ["mp4", "webm", "ogg", "mov", "m4v"];

/// Classify a raw source string. Returns `None` for empty/whitespace input so
/// callers can render an empty state rather than a broken player.
///
/// Rules are checked top to bottom and the first match wins; the order is
/// load-bearing (an `<iframe>` wrapping a Drive URL is taken by the Drive rule
/// before the iframe rule is ever reached).
pub(crate) fn classify(raw: &str) -> Option<VideoSource> {
    let input = raw.trim();
    if input.is_empty() {
        return None;
    }

    if STREAMING_HOSTS.iter().any(|host| input.contains(host)) {
        return Some(VideoSource {
            strategy: PlaybackStrategy::Native,
            payload: input.to_string(),
        });
    }

    if input.contains("drive.google.com") {
        return Some(VideoSource {
            strategy: PlaybackStrategy::Iframe,
            payload: rewrite_drive_url(input),
        });
    }

    if input.contains("dropbox.com") {
        return Some(VideoSource {
            strategy: PlaybackStrategy::Native,
            payload: input.replacen("dl=0", "raw=1", 1),
        });
    }

    if has_video_file_extension(input) {
        return Some(VideoSource {
            strategy: PlaybackStrategy::Native,
            payload: input.to_string(),
        });
    }

    if input.contains("<iframe") {
        return Some(match extract_iframe_src(input) {
            Some(src) => VideoSource {
                strategy: PlaybackStrategy::Iframe,
                payload: src,
            },
            None => VideoSource {
                strategy: PlaybackStrategy::Embed,
                payload: input.to_string(),
            },
        });
    }

    Some(VideoSource {
        strategy: PlaybackStrategy::Iframe,
        payload: input.to_string(),
    })
}

fn has_video_file_extension(input: &str) -> bool {
    let path = input.split(['?', '#']).next().unwrap_or(input);
    let lowered = path.to_ascii_lowercase();
    VIDEO_FILE_EXTENSIONS
        .iter()
        .any(|ext| lowered.ends_with(&format!(".{ext}")))
}

/// Drive share links render a viewer page; the embeddable form ends in
/// `/preview`.
fn rewrite_drive_url(url: &str) -> String {
    if let Some(idx) = url.find("/view") {
        return format!("{}/preview", &url[..idx]);
    }
    if let Some(idx) = url.find("/edit") {
        return format!("{}/preview", &url[..idx]);
    }
    if url.contains("/preview") {
        return url.to_string();
    }
    if url.ends_with('/') {
        format!("{url}preview")
    } else {
        format!("{url}/preview")
    }
}

fn extract_iframe_src(markup: &str) -> Option<String> {
    let tag_start = markup.find("<iframe")?;
    let rest = &markup[tag_start..];
    let src_idx = rest.find("src=")?;
    let after = &rest[src_idx + 4..];
    let quote = after.chars().next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    let inner = &after[quote.len_utf8()..];
    let end = inner.find(quote)?;
    let src = inner[..end].trim();
    if src.is_empty() {
        None
    } else {
        Some(src.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classified(input: &str) -> VideoSource {
        classify(input).expect("input should classify")
    }

    #[test]
    fn youtube_and_vimeo_urls_pass_through_as_native() {
        for input in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://vimeo.com/76979871",
        ] {
            let source = classified(input);
            assert_eq!(source.strategy, PlaybackStrategy::Native, "input: {input}");
            assert_eq!(source.payload, input, "payload must be unmutated");
        }
    }

    #[test]
    fn direct_file_urls_are_native_regardless_of_case_and_query() {
        for input in [
            "https://cdn.example.com/lessons/intro.mp4",
            "https://cdn.example.com/lessons/INTRO.MP4",
            "https://cdn.example.com/lessons/intro.webm?token=abc",
            "https://cdn.example.com/a.ogg",
            "https://cdn.example.com/a.mov#t=30",
            "https://cdn.example.com/a.m4v",
        ] {
            assert_eq!(
                classified(input).strategy,
                PlaybackStrategy::Native,
                "input: {input}"
            );
        }
    }

    #[test]
    fn query_string_alone_does_not_make_a_file_url() {
        let source = classified("https://example.com/page?file=intro.mp4.html");
        assert_eq!(source.strategy, PlaybackStrategy::Iframe);
    }

    #[test]
    fn drive_view_suffix_is_rewritten_to_preview() {
        let source = classified("https://drive.google.com/file/d/ABC123/view?usp=sharing");
        assert_eq!(source.strategy, PlaybackStrategy::Iframe);
        assert_eq!(source.payload, "https://drive.google.com/file/d/ABC123/preview");
    }

    #[test]
    fn drive_edit_suffix_is_rewritten_to_preview() {
        let source = classified("https://drive.google.com/file/d/ABC123/edit#heading");
        assert_eq!(source.payload, "https://drive.google.com/file/d/ABC123/preview");
    }

    #[test]
    fn drive_url_without_suffix_gets_preview_appended() {
        assert_eq!(
            classified("https://drive.google.com/file/d/ABC123").payload,
            "https://drive.google.com/file/d/ABC123/preview"
        );
        assert_eq!(
            classified("https://drive.google.com/file/d/ABC123/").payload,
            "https://drive.google.com/file/d/ABC123/preview"
        );
    }

    #[test]
    fn drive_url_already_in_preview_form_is_untouched() {
        let input = "https://drive.google.com/file/d/ABC123/preview";
        assert_eq!(classified(input).payload, input);
    }

    #[test]
    fn dropbox_download_flag_is_rewritten_to_raw_stream() {
        let source = classified("https://www.dropbox.com/s/xyz/video.mkv?dl=0");
        assert_eq!(source.strategy, PlaybackStrategy::Native);
        assert_eq!(source.payload, "https://www.dropbox.com/s/xyz/video.mkv?raw=1");
    }

    #[test]
    fn dropbox_file_link_is_rewritten_before_the_extension_rule() {
        let source = classified("https://www.dropbox.com/s/xyz/video.mp4?dl=0");
        assert_eq!(source.strategy, PlaybackStrategy::Native);
        assert_eq!(source.payload, "https://www.dropbox.com/s/xyz/video.mp4?raw=1");
    }

    #[test]
    fn iframe_with_quoted_src_yields_iframe_strategy_with_extracted_url() {
        let source = classified(
            r#"<iframe width="640" src="https://player.example.net/v/99" allowfullscreen></iframe>"#,
        );
        assert_eq!(source.strategy, PlaybackStrategy::Iframe);
        assert_eq!(source.payload, "https://player.example.net/v/99");
    }

    #[test]
    fn iframe_with_single_quoted_src_is_extracted() {
        let source = classified("<iframe src='https://player.example.net/v/7'></iframe>");
        assert_eq!(source.payload, "https://player.example.net/v/7");
    }

    #[test]
    fn iframe_without_src_degrades_to_raw_embed() {
        let markup = "<iframe sandbox></iframe>";
        let source = classified(markup);
        assert_eq!(source.strategy, PlaybackStrategy::Embed);
        assert_eq!(source.payload, markup);
    }

    #[test]
    fn iframe_wrapping_drive_url_is_captured_by_the_drive_rule() {
        // Pins the documented rule precedence: host checks run before the
        // iframe extraction, so the whole markup is treated as a Drive string.
        let markup = r#"<iframe src="https://drive.google.com/file/d/ABC/view"></iframe>"#;
        let source = classified(markup);
        assert_eq!(source.strategy, PlaybackStrategy::Iframe);
        assert!(source.payload.ends_with("/preview"));
    }

    #[test]
    fn iframe_wrapping_youtube_url_is_captured_by_the_host_rule() {
        let markup = r#"<iframe src="https://www.youtube.com/embed/xyz"></iframe>"#;
        let source = classified(markup);
        assert_eq!(source.strategy, PlaybackStrategy::Native);
        assert_eq!(source.payload, markup);
    }

    #[test]
    fn unrecognized_url_falls_back_to_iframe_unchanged() {
        let source = classified("https://example.com/video");
        assert_eq!(source.strategy, PlaybackStrategy::Iframe);
        assert_eq!(source.payload, "https://example.com/video");
    }

    #[test]
    fn empty_and_whitespace_input_classify_to_none() {
        assert!(classify("").is_none());
        assert!(classify("   \n\t").is_none());
    }

    #[test]
    fn classification_is_deterministic() {
        let input = "https://drive.google.com/file/d/ABC123/view";
        assert_eq!(classify(input), classify(input));
    }
}
