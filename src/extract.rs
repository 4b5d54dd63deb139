//! Plain-text extraction for uploaded documents.
//!
//! Uploads arrive as raw bytes plus a file-type tag derived from the original filename.
//! This module converts the supported formats (PDF, DOCX, TXT, MD) into UTF-8 text for
//! the chunker. Extraction failures propagate to the processing pipeline, which marks
//! the document as failed; they are never swallowed here.

use std::io::Read;
use thiserror::Error;

/// Maximum decompressed bytes read from a single DOCX archive entry.
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Supported upload formats, keyed by file extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// Portable Document Format.
    Pdf,
    /// Office Open XML word-processing document.
    Docx,
    /// Plain UTF-8 text.
    Txt,
    /// Markdown, read verbatim.
    Md,
}

impl FileType {
    /// Parse a file-type tag such as `".pdf"` or `"pdf"`.
    pub fn from_extension(extension: &str) -> Result<Self, ExtractError> {
        match extension.trim_start_matches('.').to_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "docx" => Ok(Self::Docx),
            "txt" => Ok(Self::Txt),
            "md" => Ok(Self::Md),
            other => Err(ExtractError::UnsupportedFormat(format!(".{other}"))),
        }
    }

    /// Resolve the file type from a filename's extension.
    pub fn from_filename(filename: &str) -> Result<Self, ExtractError> {
        let extension = filename
            .rsplit_once('.')
            .map(|(_, extension)| extension)
            .unwrap_or("");
        Self::from_extension(extension)
    }

    /// Canonical extension tag for this file type.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => ".pdf",
            Self::Docx => ".docx",
            Self::Txt => ".txt",
            Self::Md => ".md",
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Errors raised while converting uploaded bytes into plain text.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The file-type tag names a format the extractor does not handle.
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),
    /// PDF parsing or text extraction failed.
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    /// DOCX archive or XML parsing failed.
    #[error("DOCX extraction failed: {0}")]
    Docx(String),
    /// Text input was not valid UTF-8.
    #[error("document is not valid UTF-8")]
    InvalidUtf8,
}

/// Extract UTF-8 plain text from uploaded bytes.
///
/// - PDF: page text in page order, pages separated by newlines.
/// - DOCX: each paragraph's inner text, paragraphs separated by newlines.
/// - TXT/MD: bytes decoded as UTF-8 verbatim.
pub fn extract_text(bytes: &[u8], file_type: FileType) -> Result<String, ExtractError> {
    match file_type {
        FileType::Pdf => extract_pdf(bytes),
        FileType::Docx => extract_docx(bytes),
        FileType::Txt | FileType::Md => std::str::from_utf8(bytes)
            .map(|text| text.to_string())
            .map_err(|_| ExtractError::InvalidUtf8),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|err| ExtractError::Pdf(err.to_string()))
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|err| ExtractError::Docx(err.to_string()))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|err| ExtractError::Docx(err.to_string()))?;

    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|err| ExtractError::Docx(err.to_string()))?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Docx(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }

    extract_paragraph_text(&doc_xml)
}

/// Walk `word/document.xml`, collecting `w:t` runs and closing paragraphs with newlines.
fn extract_paragraph_text(xml: &[u8]) -> Result<String, ExtractError> {
    let mut out = String::new();
    let mut paragraph = String::new();
    let mut in_text_run = false;
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_run = true;
                }
            }
            Ok(quick_xml::events::Event::Text(te)) if in_text_run => {
                let text = te
                    .unescape()
                    .map_err(|err| ExtractError::Docx(err.to_string()))?;
                paragraph.push_str(text.as_ref());
            }
            Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => {
                    if !paragraph.is_empty() {
                        if !out.is_empty() {
                            out.push('\n');
                        }
                        out.push_str(&paragraph);
                        paragraph.clear();
                    }
                }
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(err) => return Err(ExtractError::Docx(err.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if !paragraph.is_empty() {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&paragraph);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_fixture(paragraphs: &[&str]) -> Vec<u8> {
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t>{p}</w:t></w:r></w:p>"))
            .collect();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{body}</w:body></w:document>"
        );

        let mut cursor = std::io::Cursor::new(Vec::new());
        let mut writer = zip::ZipWriter::new(&mut cursor);
        writer
            .start_file(
                "word/document.xml",
                zip::write::SimpleFileOptions::default(),
            )
            .expect("start zip entry");
        writer.write_all(xml.as_bytes()).expect("write zip entry");
        writer.finish().expect("finish zip");
        cursor.into_inner()
    }

    #[test]
    fn parses_known_extensions() {
        assert_eq!(FileType::from_extension(".pdf").unwrap(), FileType::Pdf);
        assert_eq!(FileType::from_extension("MD").unwrap(), FileType::Md);
        let err = FileType::from_extension(".xyz").unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedFormat(tag) if tag == ".xyz"));
    }

    #[test]
    fn resolves_file_type_from_filename() {
        assert_eq!(
            FileType::from_filename("report.PDF").unwrap(),
            FileType::Pdf
        );
        assert_eq!(
            FileType::from_filename("notes.draft.md").unwrap(),
            FileType::Md
        );
        assert!(matches!(
            FileType::from_filename("binary.xyz").unwrap_err(),
            ExtractError::UnsupportedFormat(tag) if tag == ".xyz"
        ));
        assert!(matches!(
            FileType::from_filename("no-extension").unwrap_err(),
            ExtractError::UnsupportedFormat(_)
        ));
    }

    #[test]
    fn reads_plain_text_verbatim() {
        let text = extract_text("hello world".as_bytes(), FileType::Txt).unwrap();
        assert_eq!(text, "hello world");
    }

    #[test]
    fn rejects_invalid_utf8_text() {
        let err = extract_text(&[0xff, 0xfe, 0x41], FileType::Txt).unwrap_err();
        assert!(matches!(err, ExtractError::InvalidUtf8));
    }

    #[test]
    fn invalid_pdf_bytes_fail() {
        let err = extract_text(b"not a pdf", FileType::Pdf).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn invalid_docx_bytes_fail() {
        let err = extract_text(b"not a zip", FileType::Docx).unwrap_err();
        assert!(matches!(err, ExtractError::Docx(_)));
    }

    #[test]
    fn docx_paragraphs_join_with_newlines() {
        let bytes = docx_fixture(&["First paragraph.", "Second paragraph."]);
        let text = extract_text(&bytes, FileType::Docx).unwrap();
        assert_eq!(text, "First paragraph.\nSecond paragraph.");
    }
}
