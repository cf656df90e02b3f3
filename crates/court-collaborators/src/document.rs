//! Document ingestion and requirement search
//!
//! A document is held as Markdown and chunked on its headings. PDFs are
//! converted to text with `pdftotext` first; standalone title-like lines
//! in that text are promoted to headings so the same chunking applies.

use crate::error::DocumentError;
use async_trait::async_trait;
use pulldown_cmark::{Event, Parser as MdParser, Tag, TagEnd};
use regex::RegexBuilder;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Longest search snippet, in characters
pub const MAX_SNIPPET_CHARS: usize = 700;

/// Longest requirement digest section, in characters
pub const MAX_DIGEST_CHARS: usize = 2000;

/// Returned by [`IngestedDocument::best_snippet`] when nothing matches
pub const NO_MATCH: &str = "No strongly relevant requirement snippet found for the given query.";

/// One heading-delimited chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    /// Heading text, empty for the preamble
    pub title: String,
    /// Heading level, 0 for the preamble
    pub level: u8,
    /// Markdown between this heading and the next
    pub body: String,
}

/// Requirement sections the document analyst always reports
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequirementDigest {
    /// `Objectives` section
    pub objectives: String,
    /// `Deliverables` section
    pub deliverables: String,
    /// `Constraints` section
    pub constraints: String,
}

impl RequirementDigest {
    /// Whether no section was found
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objectives.is_empty() && self.deliverables.is_empty() && self.constraints.is_empty()
    }
}

/// A ranked search result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    /// Section title, `None` for the preamble
    pub section: Option<String>,
    /// Keyword hits plus title bonus
    pub score: usize,
    /// Whitespace-collapsed excerpt
    pub snippet: String,
}

/// A converted document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestedDocument {
    /// Source file
    pub path: PathBuf,
    /// Full Markdown text
    pub markdown: String,
    /// Heading-delimited chunks in document order
    pub sections: Vec<Section>,
}

impl IngestedDocument {
    /// Chunk Markdown text
    #[must_use]
    pub fn from_markdown(path: impl Into<PathBuf>, markdown: impl Into<String>) -> Self {
        let markdown = markdown.into();
        let sections = chunk_sections(&markdown);
        Self {
            path: path.into(),
            markdown,
            sections,
        }
    }

    /// JSON outline of the document
    #[must_use]
    pub fn structured(&self) -> serde_json::Value {
        let outline: Vec<_> = self
            .sections
            .iter()
            .map(|s| serde_json::json!({"title": s.title, "level": s.level, "chars": s.body.chars().count()}))
            .collect();
        serde_json::json!({
            "path": self.path.display().to_string(),
            "markdown_length": self.markdown.chars().count(),
            "sections": outline,
        })
    }

    /// First section whose heading starts with `title` as a whole word
    #[must_use]
    pub fn section(&self, title: &str) -> Option<&Section> {
        let wanted = title.to_lowercase();
        self.sections.iter().find(|section| {
            let heading = section.title.to_lowercase();
            heading.strip_prefix(&wanted).is_some_and(|rest| {
                !rest.starts_with(|c: char| c.is_alphanumeric() || c == '_')
            })
        })
    }

    /// Objectives, deliverables and constraints sections
    #[must_use]
    pub fn requirements(&self) -> RequirementDigest {
        let digest = |title: &str| {
            self.section(title)
                .map(|s| truncate_snippet(&s.body, MAX_DIGEST_CHARS))
                .unwrap_or_default()
        };
        RequirementDigest {
            objectives: digest("objectives"),
            deliverables: digest("deliverables"),
            constraints: digest("constraints"),
        }
    }

    /// Sections ranked by relevance to `query`, best first
    ///
    /// The score counts keyword occurrences (words longer than two
    /// characters) in the section body, plus 3 when the query names the
    /// section title. Sections scoring zero are omitted.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<SearchHit> {
        let query = query.to_lowercase();
        let keywords = keywords(&query);
        let mut hits: Vec<SearchHit> = self
            .sections
            .iter()
            .filter_map(|section| {
                let title = section.title.to_lowercase();
                let mut score = occurrences(&section.body.to_lowercase(), &keywords);
                if !title.is_empty() && query.contains(&title) {
                    score += 3;
                }
                (score > 0).then(|| SearchHit {
                    section: (!section.title.is_empty()).then(|| section.title.clone()),
                    score,
                    snippet: truncate_snippet(&section.body, MAX_SNIPPET_CHARS),
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.cmp(&a.score));
        hits
    }

    /// Single best excerpt for `query`
    ///
    /// Falls back from the best section to the best sentence, then to a
    /// window around a literal match, then to [`NO_MATCH`].
    #[must_use]
    pub fn best_snippet(&self, query: &str) -> String {
        if query.trim().is_empty() {
            return NO_MATCH.to_string();
        }
        if let Some(hit) = self.search(query).into_iter().next() {
            return match hit.section {
                Some(title) => format!("[{}] {}", title.to_uppercase(), hit.snippet),
                None => hit.snippet,
            };
        }

        let lowered = query.to_lowercase();
        let keywords = keywords(&lowered);
        let mut best: Option<(usize, &str)> = None;
        for sentence in sentences(&self.markdown) {
            let score = occurrences(&sentence.to_lowercase(), &keywords);
            if score > 0 && best.map_or(true, |(top, _)| score > top) {
                best = Some((score, sentence));
            }
        }
        if let Some((_, sentence)) = best {
            return truncate_snippet(sentence, MAX_SNIPPET_CHARS);
        }

        let literal = RegexBuilder::new(&regex::escape(query.trim()))
            .case_insensitive(true)
            .build();
        if let Some(found) = literal.ok().and_then(|re| re.find(&self.markdown)) {
            let start = floor_boundary(&self.markdown, found.start().saturating_sub(200));
            let end = floor_boundary(&self.markdown, (found.start() + 400).min(self.markdown.len()));
            return truncate_snippet(&self.markdown[start..end], MAX_SNIPPET_CHARS);
        }

        NO_MATCH.to_string()
    }
}

/// Converts a file into an [`IngestedDocument`]
#[async_trait]
pub trait DocumentIngestor: Send + Sync {
    /// Read and chunk a document
    ///
    /// # Errors
    /// [`DocumentError::NotFound`] for missing files,
    /// [`DocumentError::Unreadable`] when conversion fails.
    async fn ingest(&self, path: &Path) -> Result<IngestedDocument, DocumentError>;
}

/// Reads Markdown and text directly, PDFs through `pdftotext`
#[derive(Debug, Clone)]
pub struct TextDocumentSource {
    pdftotext: String,
}

impl Default for TextDocumentSource {
    fn default() -> Self {
        Self {
            pdftotext: "pdftotext".to_string(),
        }
    }
}

impl TextDocumentSource {
    /// Use the `pdftotext` binary on `PATH`
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific `pdftotext` binary
    #[must_use]
    pub fn with_pdftotext(mut self, binary: impl Into<String>) -> Self {
        self.pdftotext = binary.into();
        self
    }

    async fn pdf_text(&self, path: &Path) -> Result<String, DocumentError> {
        let output = tokio::process::Command::new(&self.pdftotext)
            .arg(path)
            .arg("-")
            .output()
            .await
            .map_err(|e| DocumentError::unreadable(path, format!("cannot run {}: {e}", self.pdftotext)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DocumentError::unreadable(path, stderr.trim()));
        }
        Ok(promote_headings(&String::from_utf8_lossy(&output.stdout)))
    }
}

#[async_trait]
impl DocumentIngestor for TextDocumentSource {
    async fn ingest(&self, path: &Path) -> Result<IngestedDocument, DocumentError> {
        if !path.is_file() {
            return Err(DocumentError::NotFound(path.to_path_buf()));
        }

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let markdown = match extension.as_str() {
            "md" | "markdown" | "txt" => tokio::fs::read_to_string(path)
                .await
                .map_err(|e| DocumentError::unreadable(path, e))?,
            "pdf" => self.pdf_text(path).await?,
            other => {
                return Err(DocumentError::unreadable(
                    path,
                    format!("unsupported document type `{other}`"),
                ))
            }
        };

        if markdown.trim().is_empty() {
            return Err(DocumentError::unreadable(path, "document contains no text"));
        }

        let document = IngestedDocument::from_markdown(path, markdown);
        tracing::debug!(path = %path.display(), sections = document.sections.len(), "document ingested");
        Ok(document)
    }
}

fn chunk_sections(markdown: &str) -> Vec<Section> {
    let mut headings: Vec<(u8, String, std::ops::Range<usize>)> = Vec::new();
    let mut open: Option<(u8, String)> = None;

    for (event, range) in MdParser::new(markdown).into_offset_iter() {
        match event {
            Event::Start(Tag::Heading { level, .. }) => open = Some((level as u8, String::new())),
            Event::Text(text) | Event::Code(text) => {
                if let Some((_, title)) = open.as_mut() {
                    title.push_str(&text);
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, title)) = open.take() {
                    headings.push((level, title.trim().to_string(), range));
                }
            }
            _ => {}
        }
    }

    let mut sections = Vec::with_capacity(headings.len() + 1);
    let preamble_end = headings.first().map_or(markdown.len(), |(_, _, range)| range.start);
    let preamble = markdown[..preamble_end].trim();
    if !preamble.is_empty() {
        sections.push(Section {
            title: String::new(),
            level: 0,
            body: preamble.to_string(),
        });
    }

    for (i, (level, title, range)) in headings.iter().enumerate() {
        let end = headings
            .get(i + 1)
            .map_or(markdown.len(), |(_, _, next)| next.start);
        sections.push(Section {
            title: title.clone(),
            level: *level,
            body: markdown[range.end..end].trim().to_string(),
        });
    }
    sections
}

/// Turn standalone title-like lines of plain text into `##` headings
fn promote_headings(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let blank = |i: Option<&&str>| i.map_or(true, |line| line.trim().is_empty());

    lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let standalone = blank(i.checked_sub(1).and_then(|p| lines.get(p))) && blank(lines.get(i + 1));
            if standalone && looks_like_heading(line.trim()) {
                format!("## {}", line.trim())
            } else {
                (*line).to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn looks_like_heading(line: &str) -> bool {
    let unnumbered = line.trim_start_matches(|c: char| c.is_ascii_digit() || c == '.').trim_start();
    !unnumbered.is_empty()
        && line.chars().count() <= 80
        && unnumbered.starts_with(char::is_uppercase)
        && !line.ends_with(&['.', ',', ';', ':', '!', '?'][..])
}

fn keywords(query: &str) -> Vec<&str> {
    query
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|word| word.len() > 2)
        .collect()
}

fn occurrences(haystack: &str, keywords: &[&str]) -> usize {
    keywords.iter().map(|kw| haystack.matches(kw).count()).sum()
}

/// Split after `.`, `!` or `?` followed by whitespace
fn sentences(text: &str) -> impl Iterator<Item = &str> {
    let mut start = 0;
    let mut cuts = Vec::new();
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') && chars.peek().is_some_and(|(_, next)| next.is_whitespace()) {
            cuts.push(&text[start..i + c.len_utf8()]);
            start = i + c.len_utf8();
        }
    }
    cuts.push(&text[start..]);
    cuts.into_iter().map(str::trim).filter(|s| !s.is_empty())
}

fn floor_boundary(text: &str, mut index: usize) -> usize {
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Collapse whitespace and cap at `max` characters, marking truncation with `...`
#[must_use]
pub fn truncate_snippet(text: &str, max: usize) -> String {
    let clean = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if clean.chars().count() <= max {
        return clean;
    }
    let cut: String = clean.chars().take(max).collect();
    format!("{}...", cut.trim_end())
}
