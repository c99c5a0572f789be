//! Handlebars rendering for job command lines and report filenames

use handlebars::Handlebars;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
#[error("Template error in '{template}': {message}")]
pub struct TemplateError {
    pub template: String,
    pub message: String,
}

/// Render without HTML escaping; strict so a misspelled field is an error
pub fn render<T: Serialize>(template: &str, data: &T) -> Result<String, TemplateError> {
    let mut hb = Handlebars::new();
    hb.set_strict_mode(true);
    hb.register_escape_fn(handlebars::no_escape);
    hb.render_template(template, data).map_err(|e| TemplateError {
        template: template.to_string(),
        message: e.to_string(),
    })
}
