//! services/api/src/web/pdf.rs
//!
//! Contains the Axum handler that turns structured draft content into a
//! styled, semantic HTML document and renders it to paginated PDF with the
//! per-request headless browser.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::web::state::AppState;
use grant_assistant_core::ports::PortError;

//=========================================================================================
// Request Types
//=========================================================================================

/// The structured draft content to render.
#[derive(Deserialize, Default, ToSchema)]
pub struct DraftData {
    pub title: Option<String>,
    #[serde(rename = "projectBasics", default)]
    pub project_basics: BTreeMap<String, String>,
    #[serde(default)]
    pub sections: BTreeMap<String, String>,
}

#[derive(Deserialize, ToSchema)]
pub struct GeneratePdfRequest {
    #[serde(rename = "draftData")]
    pub draft_data: Option<DraftData>,
}

//=========================================================================================
// Handler
//=========================================================================================

/// Render a draft to PDF.
///
/// Returns the PDF as a base64-encoded attachment body.
#[utoipa::path(
    post,
    path = "/pdf/generate",
    request_body = GeneratePdfRequest,
    responses(
        (status = 200, description = "Base64-encoded PDF attachment"),
        (status = 400, description = "Missing draftData or sections"),
        (status = 500, description = "Rendering failure")
    )
)]
pub async fn generate_pdf_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GeneratePdfRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload
        .map_err(|e| ApiError::Port(PortError::InvalidInput(e.body_text())))?;

    let draft_data = request
        .draft_data
        .ok_or_else(|| PortError::InvalidInput("draftData is required".to_string()))?;
    if draft_data.sections.is_empty() {
        return Err(PortError::InvalidInput("draftData.sections is required".to_string()).into());
    }

    let html = generate_application_html(&draft_data);
    let pdf = state.browser_renderer.render_pdf(&html).await?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"grant-application.pdf\"",
            ),
        ],
        STANDARD.encode(pdf),
    )
        .into_response())
}

//=========================================================================================
// HTML Synthesis
//=========================================================================================

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Builds the printable HTML document: centered header, project-basics
/// block, a generated table of contents with per-section anchors, then the
/// numbered sections. Section content is inserted as-is since the editor
/// produces markup; titles, labels, and section names are escaped.
pub fn generate_application_html(draft: &DraftData) -> String {
    let title = escape_html(draft.title.as_deref().unwrap_or("Grant Application"));

    let mut basics_html = String::new();
    if !draft.project_basics.is_empty() {
        basics_html.push_str("<div class='project-basics'>");
        for (key, value) in &draft.project_basics {
            if value.is_empty() {
                continue;
            }
            let _ = write!(
                basics_html,
                "<p><strong>{}:</strong> {}</p>",
                escape_html(key),
                escape_html(value)
            );
        }
        basics_html.push_str("</div>");
    }

    let mut toc_html = String::new();
    if !draft.sections.is_empty() {
        toc_html.push_str("<div class='toc'><h2>Table of Contents</h2><ol>");
        for (idx, section_name) in draft.sections.keys().enumerate() {
            let _ = write!(
                toc_html,
                "<li><a href='#section-{}'>{}</a></li>",
                idx + 1,
                escape_html(section_name)
            );
        }
        toc_html.push_str("</ol></div>");
    }

    let mut sections_html = String::new();
    for (idx, (section_name, content)) in draft.sections.iter().enumerate() {
        let _ = write!(
            sections_html,
            "<section id='section-{n}' class='section'>\
                 <h2>{n}. {name}</h2>\
                 <div class='content'>{content}</div>\
             </section>",
            n = idx + 1,
            name = escape_html(section_name),
            content = content,
        );
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>
        @page {{
            size: A4;
            margin: 40pt 50pt;
        }}
        body {{
            font-family: 'Times New Roman', serif;
            font-size: 12pt;
            line-height: 1.6;
            color: #000;
        }}
        h1 {{
            font-size: 18pt;
            text-align: center;
            margin-bottom: 14pt;
            page-break-after: avoid;
        }}
        h2 {{
            font-size: 13pt;
            margin-top: 20pt;
            margin-bottom: 9pt;
            page-break-after: avoid;
        }}
        .subtitle {{
            font-size: 14pt;
            font-weight: normal;
            text-align: center;
        }}
        .project-basics {{
            text-align: center;
            margin-bottom: 20pt;
        }}
        .project-basics p {{
            margin: 8pt 0;
        }}
        .toc {{
            margin: 30pt 0;
            page-break-after: always;
        }}
        .toc ol {{
            list-style: none;
            padding-left: 0;
        }}
        .toc li {{
            margin: 8pt 0;
        }}
        .section {{
            margin-bottom: 20pt;
            page-break-inside: avoid;
        }}
        .content {{
            margin-top: 9pt;
            text-align: justify;
        }}
        .footer {{
            position: fixed;
            bottom: 20pt;
            width: 100%;
            text-align: center;
            font-size: 10pt;
            color: #666;
        }}
    </style>
</head>
<body>
    <header>
        <h1>GRANT APPLICATION</h1>
        <h2 class="subtitle">{title}</h2>
    </header>
    {basics_html}
    {toc_html}
    <main>
        {sections_html}
    </main>
    <footer class="footer">
        Generated by AI. Please review and edit as needed before submission.
    </footer>
</body>
</html>"#
    )
}

//=========================================================================================
// Tests
//=========================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn draft_with_sections(names: &[&str]) -> DraftData {
        DraftData {
            title: Some("Safe Streets".to_string()),
            project_basics: BTreeMap::new(),
            sections: names
                .iter()
                .map(|n| (n.to_string(), format!("<p>{n} content</p>")))
                .collect(),
        }
    }

    #[test]
    fn toc_entries_link_to_numbered_section_anchors() {
        let html = generate_application_html(&draft_with_sections(&["Budget", "Narrative"]));
        assert!(html.contains("<a href='#section-1'>Budget</a>"));
        assert!(html.contains("<a href='#section-2'>Narrative</a>"));
        assert!(html.contains("<section id='section-1'"));
        assert!(html.contains("<h2>1. Budget</h2>"));
        assert!(html.contains("<h2>2. Narrative</h2>"));
    }

    #[test]
    fn section_content_markup_is_preserved() {
        let html = generate_application_html(&draft_with_sections(&["Budget"]));
        assert!(html.contains("<p>Budget content</p>"));
    }

    #[test]
    fn titles_and_labels_are_escaped() {
        let mut draft = draft_with_sections(&["A <b>bold</b> name"]);
        draft.title = Some("Fish & Wildlife".to_string());
        draft
            .project_basics
            .insert("Award <max>".to_string(), "$50,000".to_string());

        let html = generate_application_html(&draft);
        assert!(html.contains("Fish &amp; Wildlife"));
        assert!(html.contains("A &lt;b&gt;bold&lt;/b&gt; name"));
        assert!(html.contains("Award &lt;max&gt;"));
        assert!(!html.contains("<title>Fish & Wildlife</title>"));
    }

    #[test]
    fn empty_basics_and_values_are_omitted() {
        let mut draft = draft_with_sections(&["Budget"]);
        draft
            .project_basics
            .insert("Deadline".to_string(), String::new());
        let html = generate_application_html(&draft);
        assert!(!html.contains("Deadline"));
    }
}
