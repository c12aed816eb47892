//! Content-aware diff rendering with token masking.
//!
//! The renderer is pure: no disk I/O, no shared mutable state. Callers pick
//! a [`ContentType`] from a detection's format id, supply both payloads and
//! the tokens to mask, and receive structured hunks or conventional unified
//! diff text.
//!
//! Masking runs on the canonicalized text of both sides, applied to every
//! rendered line before hunks are assembled, so a masked token cannot leak
//! through context lines or through entity-escaped markup. Lines that differ
//! only inside a masked value still render as a change.

mod myers;

use aho_corasick::{AhoCorasick, MatchKind};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::Serialize;

use crate::error::DiffError;
use crate::sample::Sample;
use myers::{Edit, Op};

/// Placeholder substituted for every masked token occurrence.
pub const MASK_PLACEHOLDER: &str = "[REDACTED]";

/// Default number of unchanged context lines around each hunk.
pub const DEFAULT_CONTEXT_LINES: usize = 3;

/// Diff strategy selected from a detection's format id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentType {
    /// Tag-based markup, canonicalized before line diffing.
    Markup,
    /// Plain line-oriented content.
    Lines,
}

impl ContentType {
    /// Maps a format id (as carried by `DetectionMatch::format` or given on
    /// the command line) to a diff strategy.
    ///
    /// Unknown ids are a typed failure; the renderer never guesses.
    pub fn for_format(format: &str) -> Result<Self, DiffError> {
        match format {
            "xml" => Ok(Self::Markup),
            "json" | "yaml" | "ini" | "text" => Ok(Self::Lines),
            other => Err(DiffError::UnsupportedContentType { format: other.into() }),
        }
    }
}

/// Classification of one line within a hunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    /// Unchanged line shown for context.
    Context,
    /// Line present only in the before content.
    Removed,
    /// Line present only in the after content.
    Added,
}

/// One tagged line of a hunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffLine {
    /// Whether the line is context, removed, or added.
    pub kind: LineKind,
    /// The line content, after masking (and canonicalization for markup).
    pub content: String,
}

/// A contiguous group of changes with surrounding context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hunk {
    /// 1-based first line of the hunk in the before content
    /// (0 when the hunk covers zero before-lines).
    pub from_start: usize,
    /// Number of before-lines covered by the hunk.
    pub from_count: usize,
    /// 1-based first line of the hunk in the after content
    /// (0 when the hunk covers zero after-lines).
    pub to_start: usize,
    /// Number of after-lines covered by the hunk.
    pub to_count: usize,
    /// Tagged lines, in order.
    pub lines: Vec<DiffLine>,
}

impl Hunk {
    /// Formats the conventional `@@ -l,s +l,s @@` header.
    ///
    /// A count of exactly 1 is omitted, matching the unified diff grammar.
    #[must_use]
    pub fn header(&self) -> String {
        let from = range_token(self.from_start, self.from_count);
        let to = range_token(self.to_start, self.to_count);
        format!("@@ -{from} +{to} @@")
    }
}

fn range_token(start: usize, count: usize) -> String {
    if count == 1 {
        start.to_string()
    } else {
        format!("{start},{count}")
    }
}

/// A rendered diff between two payloads of the same logical resource.
#[derive(Debug, Clone, Serialize)]
pub struct DiffResult {
    /// Display label of the before side.
    pub from_label: String,
    /// Display label of the after side.
    pub to_label: String,
    /// Strategy the diff was rendered with.
    pub content_type: ContentType,
    /// Hunks in order of appearance; empty when the sides are identical.
    pub hunks: Vec<Hunk>,
    /// Number of distinct mask tokens that occurred in either side.
    pub masked_token_count: usize,
}

impl DiffResult {
    /// Returns `true` when the (canonicalized) sides are identical.
    ///
    /// A change confined to a masked value still counts as a change, even
    /// though both rendered lines show the placeholder.
    #[must_use]
    pub fn is_identical(&self) -> bool {
        self.hunks.is_empty()
    }

    /// Renders conventional unified diff text (`---`/`+++`/`@@`).
    #[must_use]
    pub fn to_unified(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("--- {}\n", self.from_label));
        out.push_str(&format!("+++ {}\n", self.to_label));

        for hunk in &self.hunks {
            out.push_str(&hunk.header());
            out.push('\n');
            for line in &hunk.lines {
                let prefix = match line.kind {
                    LineKind::Context => ' ',
                    LineKind::Removed => '-',
                    LineKind::Added => '+',
                };
                out.push(prefix);
                out.push_str(&line.content);
                out.push('\n');
            }
        }

        out
    }

    /// Reconstructs the after content by replaying the hunks over `before`.
    ///
    /// `before` must be the same (masked, canonicalized) text the diff was
    /// computed from, line for line. Returns `None` when a hunk does not
    /// match. Reconstruction is line-based; the result carries a trailing
    /// newline when non-empty.
    #[must_use]
    pub fn apply(&self, before: &str) -> Option<String> {
        let before_lines: Vec<&str> = before.lines().collect();
        let mut out: Vec<&str> = Vec::new();
        let mut cursor = 0usize;

        for hunk in &self.hunks {
            let hunk_start = if hunk.from_count == 0 {
                hunk.from_start
            } else {
                hunk.from_start.checked_sub(1)?
            };
            if hunk_start < cursor || hunk_start > before_lines.len() {
                return None;
            }

            out.extend_from_slice(&before_lines[cursor..hunk_start]);
            cursor = hunk_start;

            for line in &hunk.lines {
                match line.kind {
                    LineKind::Context | LineKind::Removed => {
                        if before_lines.get(cursor).copied() != Some(line.content.as_str()) {
                            return None;
                        }
                        if line.kind == LineKind::Context {
                            out.push(&line.content);
                        }
                        cursor += 1;
                    }
                    LineKind::Added => out.push(&line.content),
                }
            }
        }

        out.extend_from_slice(&before_lines[cursor..]);

        let mut text = out.join("\n");
        if !out.is_empty() {
            text.push('\n');
        }
        Some(text)
    }
}

/// Renders a structured diff between two payloads.
///
/// Both sides are decoded as text, canonicalized when the content type is
/// markup, and line-diffed with a Myers shortest edit script. Masking runs
/// on the canonicalized text, after alignment but before hunk assembly:
/// canonicalization unescapes markup entities, so an escaped token is
/// caught, and a change confined to a masked value still shows up as a
/// `[REDACTED]`-to-`[REDACTED]` line change rather than vanishing.
/// `context_lines` of 0 is valid and yields change-only hunks.
pub fn render_diff(
    before: &[u8],
    after: &[u8],
    content_type: ContentType,
    from_label: &str,
    to_label: &str,
    mask_tokens: &[String],
    context_lines: usize,
) -> Result<DiffResult, DiffError> {
    let before_text = decode(before, from_label)?;
    let after_text = decode(after, to_label)?;

    let (before_final, after_final) = match content_type {
        ContentType::Markup => canonicalize_pair(&before_text, &after_text),
        ContentType::Lines => (before_text, after_text),
    };

    let masker = build_masker(mask_tokens)?;
    let mut seen_tokens = vec![false; mask_tokens.len()];
    record_tokens(&before_final, masker.as_ref(), &mut seen_tokens);
    record_tokens(&after_final, masker.as_ref(), &mut seen_tokens);
    let masked_token_count = seen_tokens.iter().filter(|seen| **seen).count();

    let before_lines: Vec<&str> = before_final.lines().collect();
    let after_lines: Vec<&str> = after_final.lines().collect();
    let edits = myers::diff_lines(&before_lines, &after_lines);

    Ok(DiffResult {
        from_label: from_label.to_string(),
        to_label: to_label.to_string(),
        content_type,
        hunks: build_hunks(&edits, masker.as_ref(), context_lines),
        masked_token_count,
    })
}

/// Renders unified diff text directly. See [`render_diff`].
pub fn render_unified_diff(
    before: &[u8],
    after: &[u8],
    content_type: ContentType,
    from_label: &str,
    to_label: &str,
    mask_tokens: &[String],
    context_lines: usize,
) -> Result<String, DiffError> {
    render_diff(before, after, content_type, from_label, to_label, mask_tokens, context_lines).map(|d| d.to_unified())
}

fn decode(bytes: &[u8], label: &str) -> Result<String, DiffError> {
    let sample = Sample::from_bytes(bytes, bytes.len());
    sample
        .text()
        .map(|t| t.into_owned())
        .ok_or_else(|| DiffError::Undecodable { label: label.to_string() })
}

fn build_masker(mask_tokens: &[String]) -> Result<Option<AhoCorasick>, DiffError> {
    if mask_tokens.is_empty() {
        return Ok(None);
    }

    AhoCorasick::builder()
        .match_kind(MatchKind::LeftmostLongest)
        .build(mask_tokens)
        .map(Some)
        .map_err(|e| DiffError::InvalidMaskTokens { message: e.to_string() })
}

fn mask(text: &str, masker: Option<&AhoCorasick>) -> String {
    let Some(masker) = masker else {
        return text.to_string();
    };

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for m in masker.find_iter(text) {
        out.push_str(&text[last..m.start()]);
        out.push_str(MASK_PLACEHOLDER);
        last = m.end();
    }
    out.push_str(&text[last..]);
    out
}

/// Marks which mask tokens occur in `text`, for `masked_token_count`.
fn record_tokens(text: &str, masker: Option<&AhoCorasick>, seen_tokens: &mut [bool]) {
    let Some(masker) = masker else {
        return;
    };
    for m in masker.find_iter(text) {
        if let Some(seen) = seen_tokens.get_mut(m.pattern().as_usize()) {
            *seen = true;
        }
    }
}

/// Canonicalizes both markup sides, falling back to the raw text for both
/// when either side is malformed so the two sides stay comparable.
fn canonicalize_pair(before: &str, after: &str) -> (String, String) {
    match (canonicalize_markup(before), canonicalize_markup(after)) {
        (Some(b), Some(a)) => (b, a),
        _ => (before.to_string(), after.to_string()),
    }
}

/// Re-emits markup one node per line with depth indentation and attributes
/// sorted by name. Insignificant whitespace, comments, declarations, and
/// processing instructions are dropped.
fn canonicalize_markup(text: &str) -> Option<String> {
    let mut reader = Reader::from_str(text);
    let mut out = String::new();
    let mut depth = 0usize;

    loop {
        match reader.read_event().ok()? {
            Event::Start(e) => {
                out.push_str(&element_line(&e, depth, false)?);
                depth += 1;
            }
            Event::Empty(e) => out.push_str(&element_line(&e, depth, true)?),
            Event::End(e) => {
                depth = depth.checked_sub(1)?;
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                push_line(&mut out, depth, &format!("</{name}>"));
            }
            Event::Text(t) => {
                let unescaped = t.unescape().ok()?;
                let trimmed = unescaped.trim();
                if !trimmed.is_empty() {
                    push_line(&mut out, depth, trimmed);
                }
            }
            Event::CData(c) => {
                let raw = String::from_utf8_lossy(&c.into_inner()).into_owned();
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    push_line(&mut out, depth, trimmed);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    // Unbalanced documents are malformed even when the parser tolerated them.
    if depth != 0 {
        return None;
    }

    Some(out)
}

fn element_line(element: &BytesStart<'_>, depth: usize, self_closing: bool) -> Option<String> {
    let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();

    let mut attrs: Vec<(String, String)> = Vec::new();
    for attr in element.attributes() {
        let attr = attr.ok()?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().ok()?.into_owned();
        attrs.push((key, value));
    }
    attrs.sort();

    let mut line = format!("{}<{name}", "  ".repeat(depth));
    for (key, value) in attrs {
        line.push_str(&format!(" {key}=\"{value}\""));
    }
    line.push_str(if self_closing { "/>\n" } else { ">\n" });
    Some(line)
}

fn push_line(out: &mut String, depth: usize, content: &str) {
    out.push_str(&"  ".repeat(depth));
    out.push_str(content);
    out.push('\n');
}

/// Groups an edit script into hunks with `context` unchanged lines around
/// each change cluster. Clusters whose context windows touch are merged.
/// Every rendered line, context included, passes through the masker.
fn build_hunks(edits: &[Edit<'_>], masker: Option<&AhoCorasick>, context: usize) -> Vec<Hunk> {
    let change_indices: Vec<usize> = edits
        .iter()
        .enumerate()
        .filter(|(_, e)| e.op != Op::Equal)
        .map(|(i, _)| i)
        .collect();

    if change_indices.is_empty() {
        return Vec::new();
    }

    let mut clusters: Vec<(usize, usize)> = Vec::new();
    let mut start = change_indices[0];
    let mut end = change_indices[0];
    for &i in &change_indices[1..] {
        if i - end <= 2 * context + 1 {
            end = i;
        } else {
            clusters.push((start, end));
            start = i;
            end = i;
        }
    }
    clusters.push((start, end));

    // Prefix counts of before/after lines consumed up to each edit index.
    let mut before_pos = vec![0usize; edits.len() + 1];
    let mut after_pos = vec![0usize; edits.len() + 1];
    for (i, e) in edits.iter().enumerate() {
        before_pos[i + 1] = before_pos[i] + usize::from(e.op != Op::Insert);
        after_pos[i + 1] = after_pos[i] + usize::from(e.op != Op::Delete);
    }

    clusters
        .into_iter()
        .map(|(first, last)| {
            let lo = first.saturating_sub(context);
            let hi = (last + context + 1).min(edits.len());

            let lines = edits[lo..hi]
                .iter()
                .map(|e| DiffLine {
                    kind: match e.op {
                        Op::Equal => LineKind::Context,
                        Op::Delete => LineKind::Removed,
                        Op::Insert => LineKind::Added,
                    },
                    content: mask(e.text, masker),
                })
                .collect();

            let from_count = before_pos[hi] - before_pos[lo];
            let to_count = after_pos[hi] - after_pos[lo];
            Hunk {
                from_start: if from_count == 0 { before_pos[lo] } else { before_pos[lo] + 1 },
                from_count,
                to_start: if to_count == 0 { after_pos[lo] } else { after_pos[lo] + 1 },
                to_count,
                lines,
            }
        })
        .collect()
}
