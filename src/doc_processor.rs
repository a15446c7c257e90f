use crate::models::{Chunk, Page};
use scraper::{ElementRef, Html};
use std::borrow::Cow;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// Split points tried in order: paragraph, line, sentence, word, then any character.
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];

/// Strip markup from a page body, keeping paragraph and line breaks.
///
/// Entities are decoded by the HTML parser. Macro bodies stored as CDATA
/// (code and noformat blocks) are kept as text.
pub fn html_to_text(html: &str) -> String {
    let html = escape_cdata(html);
    let fragment = Html::parse_fragment(&html);
    let mut raw = String::new();
    collect_text(fragment.root_element(), &mut raw);
    normalize_whitespace(&raw)
}

/// The HTML parser reads `<![CDATA[...]]>` as a bogus comment, ending at the
/// first `>`, so sections are rewritten as escaped text before parsing.
fn escape_cdata(html: &str) -> Cow<'_, str> {
    const OPEN: &str = "<![CDATA[";
    const CLOSE: &str = "]]>";
    if !html.contains(OPEN) {
        return Cow::Borrowed(html);
    }
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let body = &rest[start + OPEN.len()..];
        let (content, tail) = match body.find(CLOSE) {
            Some(end) => (&body[..end], &body[end + CLOSE.len()..]),
            None => (body, ""),
        };
        for c in content.chars() {
            match c {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                _ => out.push(c),
            }
        }
        rest = tail;
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_element) = ElementRef::wrap(child) {
            let name = child_element.value().name();
            if matches!(name, "script" | "style") {
                continue;
            }
            let (before, after) = block_breaks(name);
            out.push_str(before);
            collect_text(child_element, out);
            out.push_str(after);
        }
    }
}

fn block_breaks(name: &str) -> (&'static str, &'static str) {
    match name {
        "p" | "div" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "table" | "ul" | "ol"
        | "pre" | "blockquote" | "section" | "article" => ("\n\n", "\n\n"),
        "br" => ("\n", ""),
        "li" | "tr" | "dt" | "dd" => ("", "\n"),
        "td" | "th" => ("", " "),
        _ => ("", ""),
    }
}

/// Collapse runs of whitespace inside lines and runs of blank lines into one
/// paragraph break.
fn normalize_whitespace(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_break = false;
    for line in input.lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            pending_break = !out.is_empty();
            continue;
        }
        if !out.is_empty() {
            out.push_str(if pending_break { "\n\n" } else { "\n" });
        }
        out.push_str(&collapsed);
        pending_break = false;
    }
    out
}

/// Split text into overlapping chunks of at most `chunk_size` characters.
///
/// Splits recursively on the coarsest separator present, merging adjacent
/// pieces back up to the size bound and carrying up to `overlap` characters of
/// trailing pieces into the next chunk.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return vec![];
    }
    let chunk_size = chunk_size.max(1);
    let overlap = overlap.min(chunk_size - 1);
    if char_len(text) <= chunk_size {
        return vec![text.to_string()];
    }
    split_recursive(text, SEPARATORS, chunk_size, overlap)
}

fn split_recursive(
    text: &str,
    separators: &[&str],
    chunk_size: usize,
    overlap: usize,
) -> Vec<String> {
    let level = separators
        .iter()
        .position(|sep| sep.is_empty() || text.contains(sep))
        .unwrap_or(separators.len().saturating_sub(1));
    let separator = separators.get(level).copied().unwrap_or("");
    let finer = separators.get(level + 1..).unwrap_or(&[]);

    let pieces: Vec<&str> = if separator.is_empty() {
        text.char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect()
    } else {
        text.split_inclusive(separator).collect()
    };

    let mut chunks = Vec::new();
    let mut window: Vec<(&str, usize)> = Vec::new();
    let mut window_len = 0;

    for piece in pieces {
        let len = char_len(piece);
        if len > chunk_size {
            flush(&window, &mut chunks);
            window.clear();
            window_len = 0;
            if finer.is_empty() {
                push_trimmed(piece, &mut chunks);
            } else {
                chunks.extend(split_recursive(piece, finer, chunk_size, overlap));
            }
            continue;
        }

        if window_len + len > chunk_size && !window.is_empty() {
            flush(&window, &mut chunks);
            while window_len > overlap || (window_len + len > chunk_size && window_len > 0) {
                let (_, dropped) = window.remove(0);
                window_len -= dropped;
            }
        }
        window.push((piece, len));
        window_len += len;
    }
    flush(&window, &mut chunks);
    chunks
}

fn flush(window: &[(&str, usize)], chunks: &mut Vec<String>) {
    if window.is_empty() {
        return;
    }
    let joined: String = window.iter().map(|(piece, _)| *piece).collect();
    push_trimmed(&joined, chunks);
}

fn push_trimmed(text: &str, chunks: &mut Vec<String>) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Normalize and chunk every page, in fetch order.
pub fn chunk_pages(pages: &[Page], chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    pages
        .iter()
        .flat_map(|page| {
            let text = html_to_text(&page.body_html);
            chunk_text(&text, chunk_size, overlap)
                .into_iter()
                .map(move |text| Chunk {
                    text,
                    page_id: Some(page.id.clone()),
                })
        })
        .collect()
}
