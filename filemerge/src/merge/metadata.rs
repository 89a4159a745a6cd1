//! PDF metadata.
//!
//! Reading the Info dictionary of an input, and stamping the Producer entry
//! on merged output. No dates are written so repeated merges of the same
//! inputs produce identical files.

use lopdf::{Dictionary, Document, Object, StringFormat, dictionary};
use serde::{Deserialize, Serialize};

use crate::config::PRODUCER;

/// Metadata of one PDF file. Text fields are `None` when absent or not a
/// string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfInfo {
    /// Number of pages.
    pub page_count: usize,
    /// Document title.
    pub title: Option<String>,
    /// Document author.
    pub author: Option<String>,
    /// Document subject.
    pub subject: Option<String>,
    /// Application that created the original document.
    pub creator: Option<String>,
    /// Application that produced the PDF.
    pub producer: Option<String>,
    /// PDF version from the header.
    pub version: String,
    /// Whether the document carries an encryption dictionary.
    pub encrypted: bool,
}

impl PdfInfo {
    /// Extract metadata from a loaded document.
    pub fn from_document(doc: &Document) -> Self {
        let info = info_dictionary(doc);
        let field = |key: &[u8]| info.and_then(|dict| text_field(dict, key));

        Self {
            page_count: doc.get_pages().len(),
            title: field(b"Title"),
            author: field(b"Author"),
            subject: field(b"Subject"),
            creator: field(b"Creator"),
            producer: field(b"Producer"),
            version: doc.version.clone(),
            encrypted: doc.is_encrypted(),
        }
    }
}

/// Replace the document's Info dictionary with one holding only the
/// Producer entry.
pub fn stamp_producer(doc: &mut Document) {
    let info_id = doc.add_object(dictionary! {
        "Producer" => Object::string_literal(PRODUCER),
    });
    doc.trailer.set("Info", info_id);
}

fn info_dictionary(doc: &Document) -> Option<&Dictionary> {
    match doc.trailer.get(b"Info").ok()? {
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn text_field(dict: &Dictionary, key: &[u8]) -> Option<String> {
    match dict.get(key).ok()? {
        Object::String(bytes, _) => {
            let text = decode_text_string(bytes);
            (!text.is_empty()).then_some(text)
        }
        _ => None,
    }
}

/// Decode a PDF text string: UTF-16BE with byte order mark, UTF-8 with
/// byte order mark, or single-byte PDFDocEncoding.
pub fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Encode `text` as a PDF text string, using UTF-16BE when it is not
/// plain ASCII.
pub fn encode_text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::String(text.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}
