//! Heading detection for section-targeted quiz generation.
//!
//! Best-effort line heuristics; documents without recognizable headings
//! simply yield no sections.

use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Characters of section body shown in [`Section::preview`].
const PREVIEW_CHARS: usize = 200;

/// A detected heading and the span of text it introduces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Stable identifier within one detection run ("h0", "h1", ...)
    pub id: String,

    /// Heading text without markers ("#", "1.2.", trailing ":")
    pub heading: String,

    /// Nesting level, 1 = top level
    pub level: usize,

    /// Byte range of the section body in the source text
    pub span: Range<usize>,

    /// Start of the section body, truncated with "..."
    pub preview: String,

    /// Whitespace-separated words in the body
    pub word_count: usize,
}

impl Section {
    /// Body text of this section within `text`.
    pub fn body<'a>(&self, text: &'a str) -> &'a str {
        text.get(self.span.clone()).unwrap_or("")
    }
}

/// Heading text and level of a heading line.
#[derive(Debug, Clone, PartialEq, Eq)]
struct HeadingMatch {
    text: String,
    level: usize,
}

/// Detect headings in `text` and the sections they introduce.
///
/// A section runs from just after its heading line to the start of the next
/// heading line, or to the end of the text.
pub fn detect_sections(text: &str) -> Vec<Section> {
    let lines: Vec<&str> = text.split('\n').collect();

    // (heading, line start offset, body start offset)
    let mut found: Vec<(HeadingMatch, usize, usize)> = Vec::new();
    let mut offset = 0usize;

    for (i, line) in lines.iter().enumerate() {
        let line_start = offset;
        offset += line.len() + 1;

        if let Some(heading) = detect_heading(&lines, i) {
            found.push((heading, line_start, offset.min(text.len())));
        }
    }

    let mut sections = Vec::with_capacity(found.len());
    for (n, (heading, _, body_start)) in found.iter().enumerate() {
        let body_end = found
            .get(n + 1)
            .map(|(_, next_line_start, _)| *next_line_start)
            .unwrap_or(text.len());

        let body = &text[*body_start..body_end];

        sections.push(Section {
            id: format!("h{}", n),
            heading: heading.text.clone(),
            level: heading.level,
            span: *body_start..body_end,
            preview: preview(body),
            word_count: body.split_whitespace().count(),
        });
    }

    tracing::debug!("Detected {} sections", sections.len());

    sections
}

/// Concatenate the selected sections as `## heading` blocks.
///
/// Sections are emitted in document order; unknown ids are ignored.
pub fn section_content(text: &str, sections: &[Section], ids: &[String]) -> String {
    let parts: Vec<String> = sections
        .iter()
        .filter(|s| ids.iter().any(|id| id == &s.id))
        .map(|s| format!("## {}\n{}\n", s.heading, s.body(text)))
        .collect();

    tracing::debug!(
        "Selected {} of {} sections ({} chars)",
        parts.len(),
        sections.len(),
        parts.iter().map(|p| p.len()).sum::<usize>()
    );

    parts.join("\n")
}

fn preview(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() > PREVIEW_CHARS {
        let cut: String = trimmed.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", cut)
    } else {
        trimmed.to_string()
    }
}

/// Classify line `i` of `lines`; first matching rule wins.
fn detect_heading(lines: &[&str], i: usize) -> Option<HeadingMatch> {
    let line = lines[i].trim();
    if line.is_empty() {
        return None;
    }

    let chars = line.chars().count();
    let words = line.split_whitespace().count();

    // Markdown headers
    if line.starts_with('#') {
        let hashes = line.chars().take_while(|&c| c == '#').count();
        let text = line.trim_start_matches('#').trim();
        if text.is_empty() {
            return None;
        }
        return Some(HeadingMatch {
            text: text.to_string(),
            level: hashes.min(3),
        });
    }

    // Numbered sections: "1. Intro", "2.3. Details"
    if let Some((depth, text)) = numbered_heading(line) {
        return Some(HeadingMatch {
            text: text.to_string(),
            level: depth,
        });
    }

    // ALL CAPS titles
    let has_cased = line.chars().any(|c| c.is_uppercase());
    let has_lower = line.chars().any(|c| c.is_lowercase());
    if has_cased && !has_lower && words >= 3 && chars < 100 {
        return Some(HeadingMatch {
            text: line.to_string(),
            level: 1,
        });
    }

    // Colon-terminated labels
    if line.ends_with(':') && chars < 80 && words >= 2 {
        return Some(HeadingMatch {
            text: line.trim_end_matches(':').trim_end().to_string(),
            level: 2,
        });
    }

    // Short title followed by a long paragraph
    if chars < 80 && !line.ends_with('.') && words <= 10 {
        if let Some(next) = lines.get(i + 1) {
            if next.trim().chars().count() > 100 {
                return Some(HeadingMatch {
                    text: line.to_string(),
                    level: 2,
                });
            }
        }
    }

    None
}

/// Parse `(digits.)+ whitespace text`, returning the group count and text.
fn numbered_heading(line: &str) -> Option<(usize, &str)> {
    let bytes = line.as_bytes();
    let mut pos = 0;
    let mut depth = 0;

    loop {
        let digits = bytes[pos..].iter().take_while(|b| b.is_ascii_digit()).count();
        if digits == 0 || bytes.get(pos + digits) != Some(&b'.') {
            break;
        }
        pos += digits + 1;
        depth += 1;
    }

    if depth == 0 {
        return None;
    }

    let rest = &line[pos..];
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let text = rest.trim();
    if text.is_empty() {
        return None;
    }

    Some((depth, text))
}
