//! Footnote-style rendering of grounding citations.
//!
//! Citation offsets count UTF-8 bytes of the response text, not characters,
//! so all slicing happens on the byte encoding.

use banana_core::{BananaError, BananaResult, GroundingChunk, GroundingMetadata, GroundingSupport};
use tracing::warn;

const GCS_SCHEME: &str = "gs://";
const GCS_PUBLIC_HOST: &str = "https://storage.googleapis.com/";
const DEFAULT_SOURCE_TITLE: &str = "Source";

/// A run of response text, ending at `end_byte_offset`, backed by sources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationSpan {
    pub end_byte_offset: usize,
    pub source_indices: Vec<usize>,
}

impl From<&GroundingSupport> for CitationSpan {
    fn from(support: &GroundingSupport) -> Self {
        Self {
            end_byte_offset: support
                .segment
                .as_ref()
                .and_then(|s| s.end_index)
                .unwrap_or(0),
            source_indices: support.grounding_chunk_indices.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Source {
    pub title: Option<String>,
    pub uri: Option<String>,
    pub place_id: Option<String>,
    /// Rendered under the entry, one `    > line` quote per excerpt line
    pub excerpt: Option<String>,
}

impl Source {
    pub fn new(title: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            uri: Some(uri.into()),
            ..Default::default()
        }
    }

    fn usable_uri(&self) -> Option<&str> {
        self.uri.as_deref().filter(|u| !u.trim().is_empty())
    }
}

impl From<&GroundingChunk> for Source {
    fn from(chunk: &GroundingChunk) -> Self {
        match chunk.context() {
            Some(context) => Self {
                title: context.title.clone(),
                uri: context.uri.clone(),
                place_id: context.place_id.clone(),
                excerpt: context.text.clone(),
            },
            None => Self::default(),
        }
    }
}

/// Rewrites `gs://` locations to their public URL and escapes spaces
pub fn public_uri(uri: &str) -> String {
    let escaped = uri.replace(' ', "%20");
    match escaped.strip_prefix(GCS_SCHEME) {
        Some(rest) => format!("{}{}", GCS_PUBLIC_HOST, rest),
        None => escaped,
    }
}

/// Interleaves footnote markers into `text` and appends the numbered sources.
///
/// Never fails: if an offset splits a multi-byte character the raw text is
/// returned with a short note instead.
pub fn render_citations(text: &str, spans: &[CitationSpan], sources: &[Source]) -> String {
    match try_render_citations(text, spans, sources) {
        Ok(rendered) => rendered,
        Err(e) => {
            warn!(error = %e, "Falling back to unannotated response text");
            format!("{}\n\nGrounding information not available: {}", text, e)
        }
    }
}

pub fn try_render_citations(
    text: &str,
    spans: &[CitationSpan],
    sources: &[Source],
) -> BananaResult<String> {
    // Display numbers skip sources without a location.
    let mut next_number = 0;
    let numbers: Vec<Option<usize>> = sources
        .iter()
        .map(|source| {
            source.usable_uri().map(|_| {
                next_number += 1;
                next_number
            })
        })
        .collect();

    let mut out = if spans.is_empty() || text.is_empty() {
        text.to_string()
    } else {
        annotate(text, spans, &numbers)?
    };

    let entries: Vec<String> = sources
        .iter()
        .zip(&numbers)
        .filter_map(|(source, number)| number.map(|n| source_entry(n, source)))
        .collect();

    if !entries.is_empty() {
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(&entries.join("\n"));
    }

    Ok(out)
}

fn annotate(text: &str, spans: &[CitationSpan], numbers: &[Option<usize>]) -> BananaResult<String> {
    let bytes = text.as_bytes();
    let total = bytes.len();
    let mut cursor = 0;
    let mut out = String::with_capacity(total + spans.len() * 4);

    for span in spans {
        let end = span.end_byte_offset.clamp(cursor, total);
        out.push_str(decode_slice(bytes, cursor, end)?);

        let markers: String = span
            .source_indices
            .iter()
            .map(|index| {
                // unlisted sources keep their raw 1-based position
                let n = numbers.get(*index).copied().flatten().unwrap_or(index + 1);
                format!("[{}]", n)
            })
            .collect();
        if !markers.is_empty() {
            out.push(' ');
            out.push_str(&markers);
        }

        cursor = end;
    }

    out.push_str(decode_slice(bytes, cursor, total)?);
    Ok(out)
}

fn decode_slice(bytes: &[u8], start: usize, end: usize) -> BananaResult<&str> {
    std::str::from_utf8(&bytes[start..end]).map_err(|_| {
        BananaError::DecodeError(format!(
            "citation range {}..{} splits a multi-byte character",
            start, end
        ))
    })
}

fn source_entry(number: usize, source: &Source) -> String {
    let title = source
        .title
        .as_deref()
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_SOURCE_TITLE);
    let uri = public_uri(source.usable_uri().unwrap_or_default());

    let mut entry = format!("{}. [{}]({})", number, title, uri);
    if let Some(place_id) = source.place_id.as_deref().filter(|p| !p.is_empty()) {
        entry.push_str(&format!("\n    - Place ID: `{}`", place_id));
    }
    if let Some(excerpt) = source.excerpt.as_deref().filter(|e| !e.trim().is_empty()) {
        for line in excerpt.trim().lines() {
            entry.push_str(&format!("\n    > {}", line));
        }
    }
    entry
}

/// Renders a response's text with everything its grounding metadata carries:
/// citations, sources, and the queries the model ran.
pub fn render_grounding(text: &str, metadata: Option<&GroundingMetadata>) -> String {
    let Some(metadata) = metadata else {
        return text.to_string();
    };

    let spans: Vec<CitationSpan> = metadata
        .grounding_supports
        .iter()
        .map(CitationSpan::from)
        .collect();
    let sources: Vec<Source> = metadata.grounding_chunks.iter().map(Source::from).collect();

    let mut out = render_citations(text, &spans, &sources);

    if !metadata.web_search_queries.is_empty() {
        out.push_str(&format!(
            "\n\n**Web Search Queries:** {}",
            metadata.web_search_queries.join(", ")
        ));
        if let Some(rendered) = metadata
            .search_entry_point
            .as_ref()
            .and_then(|e| e.rendered_content.as_deref())
        {
            out.push_str(&format!("\n\n**Search Entry Point:**\n{}", rendered));
        }
    } else if !metadata.retrieval_queries.is_empty() {
        out.push_str(&format!(
            "\n\n**Retrieval Queries:** {}",
            metadata.retrieval_queries.join(", ")
        ));
    }

    out
}
