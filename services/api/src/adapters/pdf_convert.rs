//! services/api/src/adapters/pdf_convert.rs
//!
//! This module contains the pure-software HTML-to-PDF converter used for
//! storage-event conversion, where launching a browser per uploaded file
//! would be wasteful. It extracts the block-level text of the document and
//! lays it out on paginated A4 pages.

use async_trait::async_trait;
use grant_assistant_core::ports::{PdfRenderer, PortError, PortResult};
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference};
use scraper::{Html, Selector};

// A4 layout constants, in millimetres.
const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 18.0;
const BODY_LINE_HEIGHT: f32 = 6.0;
const HEADING_LINE_HEIGHT: f32 = 9.0;
const BODY_WRAP_COLUMNS: usize = 90;

//=========================================================================================
// Extracted Block Model
//=========================================================================================

#[derive(Debug, PartialEq)]
enum Block {
    Heading(String),
    Paragraph(String),
}

/// Pulls the visible block-level text out of an HTML document, in document
/// order. Inline markup collapses into its parent block's text.
fn extract_blocks(html: &str) -> Vec<Block> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("h1, h2, h3, h4, p, li").unwrap();

    let mut blocks = Vec::new();
    for element in document.select(&selector) {
        let text = element
            .text()
            .collect::<Vec<_>>()
            .join(" ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        if text.is_empty() {
            continue;
        }
        match element.value().name() {
            "h1" | "h2" | "h3" | "h4" => blocks.push(Block::Heading(text)),
            _ => blocks.push(Block::Paragraph(text)),
        }
    }
    blocks
}

/// Greedy word wrap to a fixed column budget.
fn wrap_text(text: &str, columns: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.len() + 1 + word.len() > columns {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

//=========================================================================================
// Page Layout
//=========================================================================================

struct PageWriter<'a> {
    doc: &'a PdfDocumentReference,
    layer: printpdf::PdfLayerReference,
    cursor_y: f32,
}

impl<'a> PageWriter<'a> {
    fn new(doc: &'a PdfDocumentReference, layer: printpdf::PdfLayerReference) -> Self {
        Self {
            doc,
            layer,
            cursor_y: PAGE_HEIGHT - MARGIN,
        }
    }

    fn ensure_room(&mut self, line_height: f32) {
        if self.cursor_y - line_height < MARGIN {
            let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.cursor_y = PAGE_HEIGHT - MARGIN;
        }
    }

    fn write_line(&mut self, text: &str, size: f32, line_height: f32, font: &IndirectFontRef) {
        self.ensure_room(line_height);
        self.cursor_y -= line_height;
        self.layer
            .use_text(text, size, Mm(MARGIN), Mm(self.cursor_y), font);
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `PdfRenderer` port without any external
/// process: HTML goes in, a text-layout PDF comes out.
#[derive(Clone, Default)]
pub struct SoftwarePdfConverter;

impl SoftwarePdfConverter {
    /// Creates a new `SoftwarePdfConverter`.
    pub fn new() -> Self {
        Self
    }

    fn convert(html: &str) -> Result<Vec<u8>, String> {
        let blocks = extract_blocks(html);

        let (doc, page, layer) =
            PdfDocument::new("Converted Document", Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let body_font = doc
            .add_builtin_font(BuiltinFont::TimesRoman)
            .map_err(|e| e.to_string())?;
        let heading_font = doc
            .add_builtin_font(BuiltinFont::TimesBold)
            .map_err(|e| e.to_string())?;

        let mut writer = PageWriter::new(&doc, doc.get_page(page).get_layer(layer));
        for block in &blocks {
            match block {
                Block::Heading(text) => {
                    for line in wrap_text(text, BODY_WRAP_COLUMNS - 20) {
                        writer.write_line(&line, 14.0, HEADING_LINE_HEIGHT, &heading_font);
                    }
                }
                Block::Paragraph(text) => {
                    for line in wrap_text(text, BODY_WRAP_COLUMNS) {
                        writer.write_line(&line, 11.0, BODY_LINE_HEIGHT, &body_font);
                    }
                    // Paragraph spacing.
                    writer.cursor_y -= BODY_LINE_HEIGHT / 2.0;
                }
            }
        }

        doc.save_to_bytes().map_err(|e| e.to_string())
    }
}

//=========================================================================================
// `PdfRenderer` Trait Implementation
//=========================================================================================

#[async_trait]
impl PdfRenderer for SoftwarePdfConverter {
    async fn render_pdf(&self, html: &str) -> PortResult<Vec<u8>> {
        let html = html.to_string();
        tokio::task::spawn_blocking(move || Self::convert(&html))
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .map_err(PortError::Unexpected)
    }
}
