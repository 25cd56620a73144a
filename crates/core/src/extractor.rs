use crate::chunking::normalize_whitespace;
use crate::error::IngestError;
use lopdf::Document;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    PlainText,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension().and_then(|ext| ext.to_str())?;
        if extension.eq_ignore_ascii_case("pdf") {
            Some(Self::Pdf)
        } else if extension.eq_ignore_ascii_case("txt") || extension.eq_ignore_ascii_case("md") {
            Some(Self::PlainText)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

pub trait TextExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError>;
}

#[derive(Default)]
pub struct LopdfExtractor;

impl TextExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        let document =
            Document::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| IngestError::PdfParse(error.to_string()))?;

            if !text.trim().is_empty() {
                pages.push(PageText {
                    number: page_no,
                    text,
                });
            }
        }

        if pages.is_empty() {
            return Err(IngestError::PdfParse(format!(
                "pdf had no readable page text: {}",
                path.display()
            )));
        }

        Ok(pages)
    }
}

/// Reads a supported document into one whitespace-normalized string.
/// PDF pages are joined with blank lines.
pub fn load_document_text(path: &Path) -> Result<String, IngestError> {
    match DocumentKind::from_path(path) {
        Some(DocumentKind::Pdf) => {
            let pages = LopdfExtractor.extract_pages(path)?;
            Ok(pages
                .iter()
                .map(|page| normalize_whitespace(&page.text))
                .collect::<Vec<_>>()
                .join("\n\n"))
        }
        Some(DocumentKind::PlainText) => {
            let raw = std::fs::read_to_string(path)?;
            Ok(normalize_whitespace(&raw))
        }
        None => Err(IngestError::UnsupportedFile(path.display().to_string())),
    }
}
