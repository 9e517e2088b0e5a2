//! Regex-driven markdown to display elements
//!
//! Each pattern runs over the whole text; candidate spans are sorted by start
//! (pattern order breaks ties) and kept greedily when they overlap nothing
//! already kept. Captures are literal text, so formatting never nests.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkdownElement {
    Text(String),
    LineBreak,
    Heading { level: u8, text: String },
    Bold(String),
    Link { text: String, href: String },
    InlineCode(String),
    CodeBlock { language: Option<String>, code: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Heading3,
    Heading2,
    Heading1,
    Bold,
    Link,
    Code,
    CodeBlock,
}

/// Tie-break order for spans starting at the same offset
static PATTERNS: Lazy<Vec<(Kind, Regex)>> = Lazy::new(|| {
    [
        (Kind::Heading3, r"###\s+(.+)"),
        (Kind::Heading2, r"##\s+(.+)"),
        (Kind::Heading1, r"#\s+(.+)"),
        (Kind::Bold, r"\*\*(.+?)\*\*"),
        (Kind::Link, r"\[(.+?)\]\((.+?)\)"),
        (Kind::Code, r"`([^`]+)`"),
        (Kind::CodeBlock, r"(?s)```([A-Za-z0-9_]*)\n(.+?)```"),
    ]
    .into_iter()
    .filter_map(|(kind, pattern)| Regex::new(pattern).ok().map(|re| (kind, re)))
    .collect()
});

struct Span<'t> {
    kind: Kind,
    start: usize,
    end: usize,
    caps: Captures<'t>,
}

/// Render `text` into display elements. Empty input renders nothing.
pub fn render(text: &str) -> Vec<MarkdownElement> {
    let mut elements = Vec::new();
    if text.is_empty() {
        return elements;
    }

    let mut spans: Vec<Span<'_>> = PATTERNS
        .iter()
        .flat_map(|(kind, re)| {
            re.captures_iter(text).filter_map(move |caps| {
                let m = caps.get(0)?;
                Some(Span {
                    kind: *kind,
                    start: m.start(),
                    end: m.end(),
                    caps,
                })
            })
        })
        .collect();

    // Stable: equal starts keep pattern order
    spans.sort_by_key(|s| s.start);

    let mut kept: Vec<Span<'_>> = Vec::new();
    for span in spans {
        if kept.iter().all(|k| span.start >= k.end || span.end <= k.start) {
            kept.push(span);
        }
    }

    let mut cursor = 0;
    for span in &kept {
        if span.start > cursor {
            push_plain(&mut elements, &text[cursor..span.start]);
        }
        elements.push(to_element(span));
        cursor = span.end;
    }
    if cursor < text.len() {
        push_plain(&mut elements, &text[cursor..]);
    }

    elements
}

fn group(caps: &Captures<'_>, i: usize) -> String {
    caps.get(i).map(|m| m.as_str().to_string()).unwrap_or_default()
}

fn to_element(span: &Span<'_>) -> MarkdownElement {
    let caps = &span.caps;
    match span.kind {
        Kind::Heading1 => MarkdownElement::Heading { level: 1, text: group(caps, 1) },
        Kind::Heading2 => MarkdownElement::Heading { level: 2, text: group(caps, 1) },
        Kind::Heading3 => MarkdownElement::Heading { level: 3, text: group(caps, 1) },
        Kind::Bold => MarkdownElement::Bold(group(caps, 1)),
        Kind::Link => MarkdownElement::Link {
            text: group(caps, 1),
            href: group(caps, 2),
        },
        Kind::Code => MarkdownElement::InlineCode(group(caps, 1)),
        Kind::CodeBlock => {
            let language = group(caps, 1);
            MarkdownElement::CodeBlock {
                language: (!language.is_empty()).then_some(language),
                code: group(caps, 2),
            }
        }
    }
}

/// Non-blank lines become text, every newline becomes a break
fn push_plain(elements: &mut Vec<MarkdownElement>, text: &str) {
    let mut lines = text.split('\n').peekable();
    while let Some(line) = lines.next() {
        if !line.trim().is_empty() {
            elements.push(MarkdownElement::Text(line.to_string()));
        }
        if lines.peek().is_some() {
            elements.push(MarkdownElement::LineBreak);
        }
    }
}
