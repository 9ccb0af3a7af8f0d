use anyhow::{Context, Result};
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Document formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
}

impl DocumentKind {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

pub struct TextExtractor;

impl TextExtractor {
    /// Extract plain text from a PDF or DOCX file.
    ///
    /// Never fails: unsupported, unreadable or corrupted files produce an
    /// empty string and a logged warning.
    pub async fn extract(path: &Path) -> String {
        let Some(kind) = DocumentKind::from_path(path) else {
            tracing::warn!(path = %path.display(), "Unsupported file type for extraction");
            return String::new();
        };

        let owned: PathBuf = path.to_path_buf();
        let joined = tokio::task::spawn_blocking(move || match kind {
            DocumentKind::Pdf => extract_pdf(&owned),
            DocumentKind::Docx => extract_docx(&owned),
        })
        .await;

        match joined {
            Ok(Ok(text)) => {
                tracing::debug!(path = %path.display(), chars = text.len(), "Extracted document text");
                text
            }
            Ok(Err(e)) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to extract document text");
                String::new()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Extraction task panicked");
                String::new()
            }
        }
    }
}

fn extract_pdf(path: &Path) -> Result<String> {
    let data = std::fs::read(path).with_context(|| format!("Failed to open PDF: {:?}", path))?;
    pdf_extract::extract_text_from_mem(&data)
        .map_err(|e| anyhow::anyhow!("Failed to read PDF {:?}: {}", path, e))
}

fn extract_docx(path: &Path) -> Result<String> {
    let file = std::fs::File::open(path).with_context(|| format!("Failed to open DOCX: {:?}", path))?;
    let mut archive = zip::ZipArchive::new(file).context("DOCX is not a valid ZIP container")?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .context("DOCX has no word/document.xml part")?
        .read_to_string(&mut xml)
        .context("Failed to read word/document.xml")?;

    docx_body_text(&xml)
}

/// Collects the text runs of a WordprocessingML body, one line per paragraph.
pub(crate) fn docx_body_text(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    // Text boxes nest whole paragraphs inside a run of the outer one.
    let mut depth = 0usize;

    loop {
        match reader.read_event().context("Malformed document.xml")? {
            Event::Start(e) => match e.name().as_ref() {
                b"w:p" => {
                    if depth == 0 {
                        current.clear();
                    } else if !current.is_empty() && !current.ends_with('\n') {
                        current.push('\n');
                    }
                    depth += 1;
                }
                b"w:t" => in_text = true,
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:tab" => current.push('\t'),
                b"w:br" | b"w:cr" => current.push('\n'),
                b"w:p" if depth == 0 => paragraphs.push(String::new()),
                _ => {}
            },
            Event::Text(t) if in_text => {
                let text = t.unescape().context("Invalid text run")?;
                current.push_str(&text);
            }
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" if depth > 0 => {
                    depth -= 1;
                    if depth == 0 {
                        paragraphs.push(std::mem::take(&mut current));
                    } else if !current.ends_with('\n') {
                        current.push('\n');
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs.join("\n"))
}
