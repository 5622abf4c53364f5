//! Structure inference: raw OCR text → Markdown.
//!
//! OCR engines return a flat run of lines with no layout metadata. This
//! module rebuilds a plausible document structure from line-local cues only:
//! shouting-case lines become headings, bullet-prefixed lines become list
//! items, and everything else stays a paragraph line.
//!
//! ## Classification Order
//!
//! Each line is tested against an ordered chain of predicates; the first
//! match wins:
//!
//! 1. **Blank**: nothing left after trimming
//! 2. **Heading**: ≥ 3 characters, all ASCII uppercase letters or whitespace
//! 3. **List item**: starts with one of `•`, `-`, `*`, `○`
//! 4. **Paragraph**: anything else
//!
//! The order is load-bearing: `"- OK"` fails the heading test because of the
//! dash and only then becomes a list item.
//!
//! ## List State
//!
//! The only state carried between lines is whether a list is open. It is
//! threaded through a fold rather than kept in a mutable variable. A
//! paragraph line after a list emits one extra blank line to close it; a
//! blank line leaves the list open.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Leading glyphs that mark an unordered list item in OCR output.
pub const BULLET_GLYPHS: [char; 4] = ['•', '-', '*', '○'];

/// Minimum trimmed length (in characters) for a heading candidate.
pub const MIN_HEADING_CHARS: usize = 3;

/// Structural role of a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    Blank,
    Heading,
    ListItem,
    Paragraph,
}

/// One rendered output line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkdownLine {
    pub kind: LineKind,
    /// The Markdown text of this line, without a trailing newline.
    pub text: String,
    /// `true` for the blank separator inserted when a list is closed.
    pub synthetic: bool,
}

impl MarkdownLine {
    fn new(kind: LineKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            synthetic: false,
        }
    }

    fn list_exit() -> Self {
        Self {
            kind: LineKind::Blank,
            text: String::new(),
            synthetic: true,
        }
    }
}

/// Per-kind line counts for one inference run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureSummary {
    pub lines_in: usize,
    pub lines_out: usize,
    pub headings: usize,
    pub list_items: usize,
    pub paragraphs: usize,
    pub blanks: usize,
    pub list_exits: usize,
}

impl StructureSummary {
    pub fn from_lines(lines: &[MarkdownLine]) -> Self {
        let mut summary = lines.iter().fold(Self::default(), |mut acc, line| {
            match (line.kind, line.synthetic) {
                (LineKind::Blank, true) => acc.list_exits += 1,
                (LineKind::Blank, false) => acc.blanks += 1,
                (LineKind::Heading, _) => acc.headings += 1,
                (LineKind::ListItem, _) => acc.list_items += 1,
                (LineKind::Paragraph, _) => acc.paragraphs += 1,
            }
            acc
        });
        summary.lines_out = lines.len();
        summary.lines_in = lines.len() - summary.list_exits;
        summary
    }
}

/// Convert raw OCR text to Markdown.
///
/// Output has one line per input line (split on `'\n'`), plus one blank line
/// for every list that is closed by a paragraph line. Never fails; an empty
/// input yields an empty output.
///
/// ```
/// use edgequake_img2md::pipeline::structure::infer_markdown;
///
/// let md = infer_markdown("• item one\n• item two\nNext paragraph");
/// assert_eq!(md, "- item one\n- item two\n\nNext paragraph");
/// ```
pub fn infer_markdown(raw: &str) -> String {
    render(&infer_lines(raw))
}

/// Classify and render every line of `raw`, keeping the per-line kinds.
pub fn infer_lines(raw: &str) -> Vec<MarkdownLine> {
    let (lines, _in_list) = raw
        .split('\n')
        .fold((Vec::new(), false), |(mut out, in_list), line| {
            let in_list = push_line(&mut out, in_list, line);
            (out, in_list)
        });
    lines
}

/// Join rendered lines with `'\n'`.
pub fn render(lines: &[MarkdownLine]) -> String {
    lines
        .iter()
        .map(|l| l.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Decide the structural role of a single line.
pub fn classify_line(line: &str) -> LineKind {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        LineKind::Blank
    } else if is_heading(trimmed) {
        LineKind::Heading
    } else if is_bullet(trimmed) {
        LineKind::ListItem
    } else {
        LineKind::Paragraph
    }
}

/// Emit the output for one input line and return the new list state.
fn push_line(out: &mut Vec<MarkdownLine>, in_list: bool, line: &str) -> bool {
    let trimmed = line.trim();
    match classify_line(line) {
        LineKind::Blank => {
            out.push(MarkdownLine::new(LineKind::Blank, ""));
            in_list
        }
        LineKind::Heading => {
            out.push(MarkdownLine::new(LineKind::Heading, format!("## {trimmed}")));
            in_list
        }
        LineKind::ListItem => {
            out.push(MarkdownLine::new(LineKind::ListItem, rewrite_bullet(trimmed)));
            true
        }
        LineKind::Paragraph => {
            if in_list {
                out.push(MarkdownLine::list_exit());
            }
            out.push(MarkdownLine::new(LineKind::Paragraph, line));
            false
        }
    }
}

fn is_heading(trimmed: &str) -> bool {
    trimmed.chars().count() >= MIN_HEADING_CHARS
        && trimmed
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_whitespace())
}

fn is_bullet(trimmed: &str) -> bool {
    trimmed.starts_with(BULLET_GLYPHS)
}

// One glyph, then any whitespace after it.
static RE_BULLET_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[•\-*○]\s*").expect("bullet prefix regex is valid"));

fn rewrite_bullet(trimmed: &str) -> String {
    RE_BULLET_PREFIX.replace(trimmed, "- ").into_owned()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn line_count(s: &str) -> usize {
        s.split('\n').count()
    }

    #[test]
    fn empty_input_is_empty_output() {
        assert_eq!(infer_markdown(""), "");
    }

    #[test]
    fn uppercase_line_becomes_heading() {
        assert_eq!(infer_markdown("HELLO WORLD"), "## HELLO WORLD");
    }

    #[test]
    fn heading_is_trimmed() {
        assert_eq!(infer_markdown("   INTRODUCTION  "), "## INTRODUCTION");
    }

    #[test]
    fn two_letter_line_is_not_a_heading() {
        assert_eq!(infer_markdown("OK"), "OK");
        assert_eq!(classify_line("OK"), LineKind::Paragraph);
    }

    #[test]
    fn three_characters_with_space_is_a_heading() {
        assert_eq!(infer_markdown("A B"), "## A B");
    }

    #[test]
    fn digits_or_lowercase_disqualify_heading() {
        assert_eq!(classify_line("CHAPTER 1"), LineKind::Paragraph);
        assert_eq!(classify_line("Hello WORLD"), LineKind::Paragraph);
        assert_eq!(classify_line("ÉCOLE"), LineKind::Paragraph);
    }

    #[test]
    fn bullet_list_then_paragraph_inserts_separator() {
        assert_eq!(
            infer_markdown("• item one\n• item two\nNext paragraph"),
            "- item one\n- item two\n\nNext paragraph"
        );
    }

    #[test]
    fn dash_bullet_is_stripped_and_readded() {
        assert_eq!(infer_markdown("- already dashed"), "- already dashed");
    }

    #[test]
    fn every_bullet_glyph_is_recognised() {
        let md = infer_markdown("• a\n- b\n* c\n○ d");
        assert_eq!(md, "- a\n- b\n- c\n- d");
    }

    #[test]
    fn bullet_without_space_gets_one() {
        assert_eq!(infer_markdown("*starred"), "- starred");
    }

    #[test]
    fn only_one_glyph_is_stripped() {
        assert_eq!(infer_markdown("-- double"), "- - double");
    }

    #[test]
    fn lone_glyph_is_an_empty_item() {
        assert_eq!(infer_markdown("•"), "- ");
    }

    #[test]
    fn heading_check_runs_before_bullet_check() {
        // The dash fails the heading pattern, so the bullet rule applies.
        assert_eq!(classify_line("- OK"), LineKind::ListItem);
        assert_eq!(infer_markdown("- OK"), "- OK");
    }

    #[test]
    fn whitespace_only_line_is_blank() {
        assert_eq!(classify_line(" \t "), LineKind::Blank);
        assert_eq!(infer_markdown("a\n   \nb"), "a\n\nb");
    }

    #[test]
    fn paragraph_keeps_original_whitespace() {
        assert_eq!(infer_markdown("  indented   text  "), "  indented   text  ");
    }

    #[test]
    fn blank_line_does_not_close_list() {
        // The blank is kept, and the paragraph still closes the list.
        assert_eq!(infer_markdown("• a\n\nafter"), "- a\n\n\nafter");
    }

    #[test]
    fn heading_does_not_close_list() {
        assert_eq!(
            infer_markdown("• a\nSECTION\nbody"),
            "- a\n## SECTION\n\nbody"
        );
    }

    #[test]
    fn separator_only_once_per_list() {
        assert_eq!(
            infer_markdown("- a\nfirst\nsecond"),
            "- a\n\nfirst\nsecond"
        );
    }

    #[test]
    fn rerunning_on_output_is_not_a_no_op() {
        let once = infer_markdown("- a\nb");
        assert_eq!(once, "- a\n\nb");
        let twice = infer_markdown(&once);
        assert_eq!(twice, "- a\n\n\nb");
        assert_ne!(once, twice);
    }

    #[test]
    fn line_count_stays_within_bounds() {
        let samples = [
            "",
            "\n",
            "TITLE\n\nSome text\n• one\n• two\nmore text\n- x\ny",
            "* a\n* b\n\n* c\nend\n",
            "plain\nlines\nonly",
            "○ only\n○ bullets",
        ];
        for raw in samples {
            let lines = infer_lines(raw);
            let summary = StructureSummary::from_lines(&lines);
            let md = render(&lines);
            let input = line_count(raw);
            let output = line_count(&md);
            assert!(output >= input, "{raw:?}: {output} < {input}");
            assert!(
                output <= input + summary.list_exits,
                "{raw:?}: {output} > {input} + {}",
                summary.list_exits
            );
            assert_eq!(summary.lines_in, input);
            assert_eq!(summary.lines_out, output);
        }
    }

    #[test]
    fn line_order_is_preserved() {
        let md = infer_markdown("first\nSECOND LINE\nthird");
        let lines: Vec<&str> = md.lines().collect();
        assert_eq!(lines, vec!["first", "## SECOND LINE", "third"]);
    }

    #[test]
    fn trailing_newline_keeps_trailing_blank() {
        assert_eq!(infer_markdown("text\n"), "text\n");
    }

    #[test]
    fn summary_counts_kinds() {
        let lines = infer_lines("TITLE\n• a\n• b\n\nbody\nmore");
        let s = StructureSummary::from_lines(&lines);
        assert_eq!(s.headings, 1);
        assert_eq!(s.list_items, 2);
        assert_eq!(s.blanks, 1);
        assert_eq!(s.list_exits, 1);
        assert_eq!(s.paragraphs, 2);
        assert_eq!(s.lines_in, 6);
        assert_eq!(s.lines_out, 7);
        assert!(lines.iter().filter(|l| l.synthetic).all(|l| l.text.is_empty()));
    }
}
