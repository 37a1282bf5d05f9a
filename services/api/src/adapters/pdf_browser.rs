//! services/api/src/adapters/pdf_browser.rs
//!
//! This module contains the headless-browser PDF renderer. It implements
//! the `PdfRenderer` port by launching a Chromium instance per request,
//! loading the document as a data URL, and printing it to paginated A4.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use grant_assistant_core::ports::{PdfRenderer, PortError, PortResult};
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `PdfRenderer` port with a per-request
/// Chromium instance. Nothing is pooled or reused across invocations.
#[derive(Clone, Default)]
pub struct ChromiumPdfRenderer;

impl ChromiumPdfRenderer {
    /// Creates a new `ChromiumPdfRenderer`.
    pub fn new() -> Self {
        Self
    }

    fn render_blocking(html: &str) -> Result<Vec<u8>, String> {
        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .build()
            .map_err(|e| e.to_string())?;
        let browser = Browser::new(options).map_err(|e| e.to_string())?;
        let tab = browser.new_tab().map_err(|e| e.to_string())?;

        let data_url = format!("data:text/html;base64,{}", STANDARD.encode(html));
        tab.navigate_to(&data_url).map_err(|e| e.to_string())?;
        tab.wait_until_navigated().map_err(|e| e.to_string())?;

        // A4 with the same margins the synthesized stylesheet declares.
        let pdf_options = PrintToPdfOptions {
            print_background: Some(true),
            paper_width: Some(8.27),
            paper_height: Some(11.69),
            margin_top: Some(0.56),
            margin_bottom: Some(0.56),
            margin_left: Some(0.69),
            margin_right: Some(0.69),
            ..Default::default()
        };
        tab.print_to_pdf(Some(pdf_options)).map_err(|e| e.to_string())
    }
}

//=========================================================================================
// `PdfRenderer` Trait Implementation
//=========================================================================================

#[async_trait]
impl PdfRenderer for ChromiumPdfRenderer {
    /// Renders the HTML to PDF bytes. The browser work is synchronous, so it
    /// runs on the blocking pool to keep the async runtime responsive.
    async fn render_pdf(&self, html: &str) -> PortResult<Vec<u8>> {
        let html = html.to_string();
        tokio::task::spawn_blocking(move || Self::render_blocking(&html))
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .map_err(PortError::Unexpected)
    }
}
