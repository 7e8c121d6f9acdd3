//! DOCX document parser using docx-rs
//!
//! Extracts body paragraph text from Microsoft Word documents.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use docx_rs::{read_docx, DocumentChild, Paragraph, ParagraphChild, RunChild};

use crate::{DocumentParser, FileType, ParsedDocument, ParserError, Result};

/// DOCX document parser
pub struct DocxParser;

impl DocxParser {
    /// Create a new DOCX parser
    pub fn new() -> Self {
        Self
    }
}

impl Default for DocxParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Text of a paragraph: its runs, including runs nested in hyperlinks
fn paragraph_text(para: &Paragraph) -> String {
    let mut text = String::new();
    push_children_text(&para.children, &mut text);
    text
}

fn push_children_text(children: &[ParagraphChild], out: &mut String) {
    for child in children {
        match child {
            ParagraphChild::Run(run) => {
                for run_child in &run.children {
                    match run_child {
                        RunChild::Text(text) => out.push_str(&text.text),
                        RunChild::Tab(_) => out.push('\t'),
                        RunChild::Break(_) => out.push('\n'),
                        _ => {}
                    }
                }
            }
            ParagraphChild::Hyperlink(link) => push_children_text(&link.children, out),
            _ => {}
        }
    }
}

impl DocumentParser for DocxParser {
    fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        let mut file = File::open(path).map_err(|e| ParserError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        let mut buf = Vec::new();
        file.read_to_end(&mut buf)
            .map_err(|e| ParserError::IoError {
                path: path.display().to_string(),
                source: e,
            })?;

        let docx = read_docx(&buf).map_err(|e| ParserError::DocxError(e.to_string()))?;

        let mut doc = ParsedDocument::new(path.display().to_string(), FileType::Docx);

        // Only top-level body paragraphs; tables are skipped
        for child in &docx.document.children {
            if let DocumentChild::Paragraph(para) = child {
                doc.push_paragraph(&paragraph_text(para));
            }
        }

        Ok(doc)
    }

    fn supported_types(&self) -> &[FileType] {
        &[FileType::Docx]
    }
}
