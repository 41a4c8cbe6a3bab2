//! Streaming HTML sanitization using lol_html
//!
//! Pages submitted for rendering are cleaned before they are parsed and
//! painted: scripts go, inline event handlers go, `javascript:` URLs go.
//! Styles are kept since they affect nothing the anchoring engine reads.

use lol_html::{element, rewrite_str, RewriteStrSettings};

/// Errors during HTML rewriting
#[derive(Debug, thiserror::Error)]
pub enum SanitizeError {
    #[error("HTML rewrite failed: {0}")]
    Rewrite(String),
}

const URL_ATTRIBUTES: &[&str] = &["href", "src", "action", "formaction"];

/// Remove script content and script-bearing attributes
pub fn sanitize_html(html: &str) -> Result<String, SanitizeError> {
    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("script", |el| {
                    el.remove();
                    Ok(())
                }),
                element!("*", |el| {
                    let handlers: Vec<String> = el
                        .attributes()
                        .iter()
                        .map(|attr| attr.name())
                        .filter(|name| name.starts_with("on"))
                        .collect();
                    for name in handlers {
                        el.remove_attribute(&name);
                    }

                    for attr in URL_ATTRIBUTES {
                        if let Some(value) = el.get_attribute(attr) {
                            if value.trim().to_lowercase().starts_with("javascript:") {
                                el.remove_attribute(attr);
                            }
                        }
                    }
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|e| SanitizeError::Rewrite(e.to_string()))
}
