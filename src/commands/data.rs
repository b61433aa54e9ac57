use anyhow::{Context, Result, bail};
use log::debug;
use serde_json::Value;
use std::path::Path;

use crate::client::{EmailRequest, TemplateData};
use crate::runtime::Runtime;

/// Template data from `--file` or `--data`, in that order of preference.
///
/// Neither given yields empty data.
pub fn read_template_data<R: Runtime>(
    runtime: &R,
    data: Option<&str>,
    file: Option<&Path>,
) -> Result<TemplateData> {
    if let Some(path) = file {
        if !runtime.exists(path) {
            bail!("Data file not found: {}", path.display());
        }
        debug!("Reading template data from {:?}", path);
        let contents = runtime.read_to_string(path)?;
        return parse_object(&contents)
            .with_context(|| format!("Invalid JSON in file {}", path.display()));
    }

    if let Some(raw) = data {
        return parse_object(raw).context("Invalid JSON data");
    }

    Ok(TemplateData::new())
}

/// Reads a JSON array of emails for a bulk send.
pub fn read_bulk_emails<R: Runtime>(runtime: &R, path: &Path) -> Result<Vec<EmailRequest>> {
    if !runtime.exists(path) {
        bail!("Emails file not found: {}", path.display());
    }
    let contents = runtime.read_to_string(path)?;
    let emails: Vec<EmailRequest> = serde_json::from_str(&contents)
        .with_context(|| format!("Invalid emails file {}", path.display()))?;
    if emails.is_empty() {
        bail!("Emails file {} contains no emails", path.display());
    }
    Ok(emails)
}

fn parse_object(raw: &str) -> Result<TemplateData> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        other => bail!("Template data must be a JSON object, got {}", kind_of(&other)),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
