use std::io::{Read, Seek};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::ProcessError;
use crate::processor::{mime, DocumentProcessor};

pub struct DocxProcessor;

impl DocxProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DocxProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentProcessor for DocxProcessor {
    fn extract(&self, path: &Path) -> Result<String, ProcessError> {
        let _span = tracing::info_span!("processor.docx").entered();

        let file = std::fs::File::open(path).map_err(|e| ProcessError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| ProcessError::DocxProcessing(format!("Failed to open DOCX: {}", e)))?;

        extract_docx_text(&mut archive)
    }

    fn supports(&self, mime_type: &str) -> bool {
        mime_type == mime::DOCX
    }
}

fn extract_docx_text<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
) -> Result<String, ProcessError> {
    let mut document_xml = archive
        .by_name("word/document.xml")
        .map_err(|e| ProcessError::DocxProcessing(format!("Failed to find document.xml: {}", e)))?;

    let mut xml_content = String::new();
    document_xml
        .read_to_string(&mut xml_content)
        .map_err(|e| ProcessError::DocxProcessing(format!("Failed to read document.xml: {}", e)))?;

    parse_docx_xml(&xml_content)
}

/// Collects the text of every `w:p` paragraph, one paragraph per line.
fn parse_docx_xml(xml: &str) -> Result<String, ProcessError> {
    let mut reader = Reader::from_str(xml);

    let mut paragraphs: Vec<String> = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text_element = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"p" => current = Some(String::new()),
                b"t" => in_text_element = true,
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"p" => paragraphs.push(String::new()),
                b"tab" => {
                    if let Some(p) = current.as_mut() {
                        p.push('\t');
                    }
                }
                b"br" => {
                    if let Some(p) = current.as_mut() {
                        p.push('\n');
                    }
                }
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text_element = false,
                b"p" => {
                    if let Some(p) = current.take() {
                        paragraphs.push(p);
                    }
                }
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_text_element {
                    if let Some(p) = current.as_mut() {
                        let decoded = e.unescape().map_err(|err| {
                            ProcessError::DocxProcessing(format!("Bad text entity: {}", err))
                        })?;
                        p.push_str(&decoded);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ProcessError::DocxProcessing(format!(
                    "XML parsing error at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(paragraphs.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use zip::write::SimpleFileOptions;

    const DOC_HEAD: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#;
    const DOC_TAIL: &str = "</w:body></w:document>";

    fn write_docx(body: &str) -> NamedTempFile {
        let temp_file = NamedTempFile::with_suffix(".docx").unwrap();
        let file = std::fs::File::create(temp_file.path()).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file("word/document.xml", SimpleFileOptions::default())
            .unwrap();
        write!(zip, "{}{}{}", DOC_HEAD, body, DOC_TAIL).unwrap();
        zip.finish().unwrap();
        temp_file
    }

    #[test]
    fn test_paragraphs_joined_by_newline() {
        let file = write_docx(
            "<w:p><w:r><w:t>Service Agreement</w:t></w:r></w:p>\
             <w:p><w:r><w:t xml:space=\"preserve\">Party A: </w:t></w:r><w:r><w:t>Acme</w:t></w:r></w:p>",
        );

        let text = DocxProcessor::new().extract(file.path()).unwrap();
        assert_eq!(text, "Service Agreement\nParty A: Acme");
    }

    #[test]
    fn test_empty_paragraph_kept_as_blank_line() {
        let file = write_docx("<w:p><w:r><w:t>one</w:t></w:r></w:p><w:p/><w:p><w:r><w:t>two</w:t></w:r></w:p>");

        let text = DocxProcessor::new().extract(file.path()).unwrap();
        assert_eq!(text, "one\n\ntwo");
    }

    #[test]
    fn test_entities_are_unescaped() {
        let xml = format!(
            "{}<w:p><w:r><w:t>Smith &amp; Sons</w:t></w:r></w:p>{}",
            DOC_HEAD, DOC_TAIL
        );
        assert_eq!(parse_docx_xml(&xml).unwrap(), "Smith & Sons");
    }

    #[test]
    fn test_not_a_zip_is_error() {
        let temp_file = NamedTempFile::with_suffix(".docx").unwrap();
        std::fs::write(temp_file.path(), b"plain bytes").unwrap();

        let result = DocxProcessor::new().extract(temp_file.path());
        assert!(matches!(result, Err(ProcessError::DocxProcessing(_))));
    }

    #[test]
    fn test_zip_without_document_xml_is_error() {
        let temp_file = NamedTempFile::with_suffix(".docx").unwrap();
        let file = std::fs::File::create(temp_file.path()).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file("other.txt", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"x").unwrap();
        zip.finish().unwrap();

        let result = DocxProcessor::new().extract(temp_file.path());
        match result {
            Err(ProcessError::DocxProcessing(msg)) => assert!(msg.contains("document.xml")),
            other => panic!("Expected DocxProcessing error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_supports_docx_only() {
        let processor = DocxProcessor::new();
        assert!(processor.supports(mime::DOCX));
        assert!(!processor.supports(mime::PDF));
    }
}
