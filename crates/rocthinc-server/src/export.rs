//! Page export: fetch a shared page, reduce it to plain text, and render
//! it as Markdown and/or LaTeX packaged in a zip archive.
//!
//! HTML reduction is deliberately rough (drop script/style blocks, strip
//! tags, collapse whitespace) and huge pages are truncated so the caller
//! gets a file rather than a multi-megabyte blob. PDF is a placeholder
//! format until a renderer is wired in.

use std::io::{Cursor, Write};
use std::str::FromStr;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Deadline for fetching the page to export.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Pages longer than this (in characters, after HTML reduction) are cut.
const MAX_TEXT_CHARS: usize = 20_000;

const TRUNCATION_MARKER: &str = " … [truncated]";

const PDF_PLACEHOLDER: &str = "PDF export is not implemented yet in this build. \
     Use the LaTeX file to compile a PDF locally.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Md,
    Tex,
    Pdf,
}

/// Formats produced when the request names none.
pub const DEFAULT_FORMATS: &[ExportFormat] = &[ExportFormat::Md, ExportFormat::Tex];

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "md" => Ok(ExportFormat::Md),
            "tex" => Ok(ExportFormat::Tex),
            "pdf" => Ok(ExportFormat::Pdf),
            other => Err(format!("unknown export format '{other}'")),
        }
    }
}

/// Parse a comma-separated format list from a query string, dropping
/// anything unrecognized.
pub fn parse_formats(list: &str) -> Vec<ExportFormat> {
    list.split(',').filter_map(|format| format.trim().parse().ok()).collect()
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("error fetching url: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("fetch failed with status {status}")]
    FetchStatus { status: u16 },
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A page reduced to exportable sections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageExtract {
    pub source: &'static str,
    pub url: String,
    pub exported_at: String,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub speaker: String,
    pub content: String,
}

/// HTTP client configured for page fetching.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .user_agent("rocthinc/1.0")
        .build()
        .expect("static client configuration")
}

pub async fn fetch_page(client: &reqwest::Client, url: &str) -> Result<String, ExportError> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ExportError::FetchStatus { status: status.as_u16() });
    }
    Ok(response.text().await?)
}

/// Reduce fetched HTML to a two-section extract: the shared URL and the
/// page text.
pub fn extract_page(url: &str, html: &str) -> PageExtract {
    let mut text = strip_html_to_text(html);
    if text.chars().count() > MAX_TEXT_CHARS {
        text = text.chars().take(MAX_TEXT_CHARS).collect();
        text.push_str(TRUNCATION_MARKER);
    }

    let source = detect_source(url, &text);
    PageExtract {
        source,
        url: url.to_owned(),
        exported_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        sections: vec![
            Section {
                speaker: "User".to_owned(),
                content: format!("Shared conversation: {url}"),
            },
            Section { speaker: "Assistant".to_owned(), content: text },
        ],
    }
}

fn detect_source(url: &str, text: &str) -> &'static str {
    let url = url.to_ascii_lowercase();
    if url.contains("claude.ai") {
        "claude"
    } else if url.contains("chatgpt.com") || url.contains("openai.com") {
        "chatgpt"
    } else if url.contains("perplexity.ai") {
        "perplexity"
    } else if text.to_ascii_lowercase().contains("assistant") {
        "generic-ai"
    } else {
        "unknown"
    }
}

/// Drop `<tag ...>...</tag>` blocks, case-insensitively. An unterminated
/// block runs to the end of input and is dropped with it.
fn remove_tag_blocks(html: &str, tag: &str) -> String {
    let lower = html.to_ascii_lowercase();
    let open = format!("<{tag}");
    let close = format!("</{tag}");
    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;
    while let Some(start) = lower[cursor..].find(&open) {
        let start = cursor + start;
        out.push_str(&html[cursor..start]);
        let Some(end) = lower[start..].find(&close) else {
            return out;
        };
        let end = start + end;
        let Some(gt) = lower[end..].find('>') else {
            return out;
        };
        cursor = end + gt + 1;
    }
    out.push_str(&html[cursor..]);
    out
}

fn strip_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                text.push(' ');
            }
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    text
}

pub fn strip_html_to_text(html: &str) -> String {
    let html = remove_tag_blocks(html, "script");
    let html = remove_tag_blocks(&html, "style");
    strip_tags(&html).split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn to_markdown(page: &PageExtract) -> String {
    let mut lines = vec![
        "# Conversation Export".to_owned(),
        String::new(),
        format!("**Source:** {}", page.source),
        format!("**URL:** {}", page.url),
        format!("**Exported at:** {}", page.exported_at),
        String::new(),
    ];
    for section in &page.sections {
        lines.push(format!("**{}:** {}", section.speaker, section.content));
        lines.push(String::new());
    }
    lines.join("\n")
}

/// Escape LaTeX special characters. Single pass so replacement text is
/// never re-escaped.
pub fn escape_latex(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str(r"\textbackslash{}"),
            '&' => escaped.push_str(r"\&"),
            '%' => escaped.push_str(r"\%"),
            '$' => escaped.push_str(r"\$"),
            '#' => escaped.push_str(r"\#"),
            '_' => escaped.push_str(r"\_"),
            '{' => escaped.push_str(r"\{"),
            '}' => escaped.push_str(r"\}"),
            '~' => escaped.push_str(r"\textasciitilde{}"),
            '^' => escaped.push_str(r"\textasciicircum{}"),
            other => escaped.push(other),
        }
    }
    escaped
}

pub fn to_latex(page: &PageExtract) -> String {
    let mut parts = vec![
        r"\documentclass{article}".to_owned(),
        r"\usepackage[margin=1in]{geometry}".to_owned(),
        r"\usepackage[T1]{fontenc}".to_owned(),
        r"\usepackage[utf8]{inputenc}".to_owned(),
        r"\begin{document}".to_owned(),
        r"\section*{Conversation Export}".to_owned(),
        String::new(),
        format!(r"\textbf{{Source:}} {}\\", escape_latex(page.source)),
        format!(r"\textbf{{URL:}} {}\\", escape_latex(&page.url)),
        format!(r"\textbf{{Exported at:}} {}\\[1em]", escape_latex(&page.exported_at)),
    ];
    for section in &page.sections {
        parts.push(format!(
            r"\textbf{{{}:}} {}\\[0.75em]",
            escape_latex(&section.speaker),
            escape_latex(&section.content),
        ));
    }
    parts.push(r"\end{document}".to_owned());
    parts.join("\n")
}

/// Package the requested formats into a deflate-compressed zip archive.
pub fn build_zip(page: &PageExtract, formats: &[ExportFormat]) -> Result<Vec<u8>, ExportError> {
    let mut archive = ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    if formats.contains(&ExportFormat::Md) {
        archive.start_file("conversation.md", options)?;
        archive.write_all(to_markdown(page).as_bytes())?;
    }
    if formats.contains(&ExportFormat::Tex) {
        archive.start_file("conversation.tex", options)?;
        archive.write_all(to_latex(page).as_bytes())?;
    }
    if formats.contains(&ExportFormat::Pdf) {
        archive.start_file("README_PDF.txt", options)?;
        archive.write_all(PDF_PLACEHOLDER.as_bytes())?;
    }

    Ok(archive.finish()?.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    fn sample_page() -> PageExtract {
        PageExtract {
            source: "claude",
            url: "https://claude.ai/share/abc".to_owned(),
            exported_at: "2026-08-29T00:00:00Z".to_owned(),
            sections: vec![
                Section {
                    speaker: "User".to_owned(),
                    content: "Shared conversation: https://claude.ai/share/abc".to_owned(),
                },
                Section {
                    speaker: "Assistant".to_owned(),
                    content: "50% of $10 is #5 & change_".to_owned(),
                },
            ],
        }
    }

    #[test]
    fn strip_drops_scripts_styles_and_tags() {
        let html = concat!(
            "<html><head><STYLE>body { color: red }</STYLE>",
            "<script type=\"text/javascript\">alert('x')</script></head>",
            "<body><h1>Title</h1>\n  <p>Some   text</p></body></html>",
        );
        assert_eq!(strip_html_to_text(html), "Title Some text");
    }

    #[test]
    fn unterminated_script_block_is_dropped() {
        let html = "<p>kept</p><script>var secret = 1;";
        assert_eq!(strip_html_to_text(html), "kept");
    }

    #[test]
    fn long_pages_are_truncated_with_marker() {
        let html = "a".repeat(30_000);
        let page = extract_page("https://example.org/page", &html);
        let text = &page.sections[1].content;
        assert!(text.ends_with(TRUNCATION_MARKER));
        assert_eq!(text.chars().count(), 20_000 + TRUNCATION_MARKER.chars().count());
    }

    #[test]
    fn source_detection_by_domain() {
        assert_eq!(extract_page("https://claude.ai/share/x", "").source, "claude");
        assert_eq!(extract_page("https://CHATGPT.com/share/x", "").source, "chatgpt");
        assert_eq!(extract_page("https://perplexity.ai/x", "").source, "perplexity");
        assert_eq!(
            extract_page("https://example.org", "<p>an assistant replied</p>").source,
            "generic-ai"
        );
        assert_eq!(extract_page("https://example.org", "<p>plain page</p>").source, "unknown");
    }

    #[test]
    fn latex_escaping_covers_specials_once() {
        assert_eq!(escape_latex("50% & $5"), r"50\% \& \$5");
        assert_eq!(escape_latex("a_b#c"), r"a\_b\#c");
        assert_eq!(escape_latex("~x^y"), r"\textasciitilde{}x\textasciicircum{}y");
        // Braces inserted by an earlier replacement must not be re-escaped.
        assert_eq!(escape_latex("\\"), r"\textbackslash{}");
        assert_eq!(escape_latex("{}"), r"\{\}");
    }

    #[test]
    fn markdown_lists_header_and_sections() {
        let markdown = to_markdown(&sample_page());
        assert!(markdown.starts_with("# Conversation Export"));
        assert!(markdown.contains("**Source:** claude"));
        assert!(markdown.contains("**User:** Shared conversation:"));
        assert!(markdown.contains("**Assistant:**"));
    }

    #[test]
    fn latex_document_is_wrapped_and_escaped() {
        let latex = to_latex(&sample_page());
        assert!(latex.starts_with(r"\documentclass{article}"));
        assert!(latex.ends_with(r"\end{document}"));
        assert!(latex.contains(r"50\% of \$10 is \#5 \& change\_"));
    }

    #[test]
    fn zip_contains_requested_formats() {
        let bytes =
            build_zip(&sample_page(), &[ExportFormat::Md, ExportFormat::Tex]).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_owned).collect();
        names.sort();
        assert_eq!(names, vec!["conversation.md", "conversation.tex"]);

        let mut markdown = String::new();
        archive.by_name("conversation.md").unwrap().read_to_string(&mut markdown).unwrap();
        assert!(markdown.contains("# Conversation Export"));
    }

    #[test]
    fn pdf_format_packs_a_placeholder() {
        let bytes = build_zip(&sample_page(), &[ExportFormat::Pdf]).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut note = String::new();
        archive.by_name("README_PDF.txt").unwrap().read_to_string(&mut note).unwrap();
        assert!(note.contains("not implemented"));
    }

    #[test]
    fn format_list_parsing_drops_unknown_entries() {
        assert_eq!(parse_formats("md,tex"), vec![ExportFormat::Md, ExportFormat::Tex]);
        assert_eq!(parse_formats(" md , pdf "), vec![ExportFormat::Md, ExportFormat::Pdf]);
        assert_eq!(parse_formats("docx,md"), vec![ExportFormat::Md]);
        assert!(parse_formats("docx").is_empty());
    }
}
