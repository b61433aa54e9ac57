use anyhow::{Result, bail};
use log::debug;
use serde_json::Value;
use std::path::Path;

use crate::{
    client::{EmailApi, EmailRequest, TemplateValidation},
    config::HuefyConfig,
    error::HuefyError,
    runtime::Runtime,
};

mod data;

pub use data::{read_bulk_emails, read_template_data};

/// Connection settings given on the command line.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout: Option<u64>,
    pub retries: Option<u32>,
}

/// Environment configuration with command line overrides applied.
#[tracing::instrument(skip(runtime, options))]
pub fn load_config<R: Runtime>(runtime: &R, options: &GlobalOptions) -> Result<HuefyConfig> {
    let mut config = HuefyConfig::from_env_with_api_key(runtime, options.api_key.clone())?;

    if let Some(url) = &options.base_url {
        config.base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(secs) = options.timeout {
        config.timeout = std::time::Duration::from_secs(secs);
    }
    if let Some(retries) = options.retries {
        config.retry_attempts = retries;
    }

    debug!("Using API at {}", config.base_url);
    Ok(config)
}

/// Check API health
#[tracing::instrument(skip(api))]
pub async fn health<A: EmailApi>(api: &A) -> Result<()> {
    println!("Checking Huefy API health...");

    let health = api
        .health_check()
        .await
        .map_err(|e| failure("Huefy API health check failed", e))?;

    println!("\nHuefy API is healthy!\n");
    println!("Status:    {}", field(&health, "status", "Unknown"));
    println!("Version:   {}", field(&health, "version", "Unknown"));
    let uptime = health.get("uptime").and_then(Value::as_u64).unwrap_or(0);
    println!("Uptime:    {}", format_uptime(uptime));
    println!("Timestamp: {}", field(&health, "timestamp", "Unknown"));

    if let Some(providers) = health.get("providers").and_then(Value::as_object) {
        println!("\nProviders:");
        for (name, status) in providers {
            let status = status.as_str().unwrap_or("unknown");
            let marker = if status == "healthy" { "+" } else { "-" };
            println!("  {} {}: {}", marker, name, status);
        }
    }

    Ok(())
}

/// List available email providers
#[tracing::instrument(skip(api, default_provider))]
pub async fn providers<A: EmailApi>(api: &A, default_provider: Option<&str>) -> Result<()> {
    println!("Fetching available email providers...");

    let response = api
        .get_providers()
        .await
        .map_err(|e| failure("Failed to fetch providers", e))?;

    let providers = provider_list(&response);
    if providers.is_empty() {
        println!("No providers found.");
        return Ok(());
    }

    println!("\nAvailable email providers:\n");
    for provider in providers {
        let features = provider
            .get("features")
            .and_then(Value::as_array)
            .map(|f| {
                f.iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| "None listed".to_string());

        println!(
            "  {} [{}] {}",
            field(provider, "name", "Unknown"),
            field(provider, "status", "Unknown"),
            field(provider, "description", "No description")
        );
        println!("    Features: {}", features);
    }

    if let Some(default) = default_provider {
        println!("\nDefault provider: {}", default);
    }

    Ok(())
}

/// Send an email using a template
#[tracing::instrument(skip(runtime, api, data, file))]
pub async fn send<R: Runtime, A: EmailApi>(
    runtime: &R,
    api: &A,
    template_key: &str,
    recipient: &str,
    data: Option<&str>,
    file: Option<&Path>,
    provider: Option<&str>,
) -> Result<()> {
    let template_data = read_template_data(runtime, data, file)?;
    if template_data.is_empty() {
        println!("No template data provided. Sending with empty data.");
    }

    println!(
        "Sending email with template '{}' to {}...",
        template_key, recipient
    );

    let mut email = EmailRequest::new(template_key, recipient).data(template_data);
    email.provider = provider.map(str::to_string);

    let response = api
        .send(&email)
        .await
        .map_err(|e| failure("Failed to send email", e))?;

    println!("\nEmail sent successfully!\n");
    println!("Message ID: {}", field(&response, "message_id", "N/A"));
    println!("Provider:   {}", field(&response, "provider", "Unknown"));
    println!("Status:     {}", field(&response, "status", "Unknown"));
    println!("Timestamp:  {}", field(&response, "timestamp", "N/A"));

    Ok(())
}

/// Send every email listed in a JSON file in one request
#[tracing::instrument(skip(runtime, api))]
pub async fn bulk<R: Runtime, A: EmailApi>(runtime: &R, api: &A, file: &Path) -> Result<()> {
    let emails = read_bulk_emails(runtime, file)?;
    println!("Sending {} emails...", emails.len());

    let response = api
        .send_bulk_emails(&emails)
        .await
        .map_err(|e| failure("Failed to send bulk emails", e))?;

    println!("\nBulk request accepted:\n");
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

/// Validate a template with test data
#[tracing::instrument(skip(runtime, api, data, file))]
pub async fn validate<R: Runtime, A: EmailApi>(
    runtime: &R,
    api: &A,
    template_key: &str,
    data: Option<&str>,
    file: Option<&Path>,
) -> Result<()> {
    let test_data = read_template_data(runtime, data, file)?;
    if test_data.is_empty() {
        println!("No test data provided. Validating with empty data.");
    }

    println!("Validating template '{}' with test data...", template_key);

    match api.check_template(template_key, &test_data).await {
        TemplateValidation::Valid => {
            println!("\nTemplate validation successful!");
            println!("The template can be rendered with the provided data.");
            Ok(())
        }
        TemplateValidation::Invalid { response } => {
            if let Some(errors) = response.get("errors") {
                println!("Errors: {}", errors);
            }
            bail!(
                "Template validation failed: '{}' cannot be rendered with the provided data",
                template_key
            )
        }
        TemplateValidation::CheckFailed(e) => Err(failure("Template validation error", e)),
    }
}

/// Humanized uptime: seconds, minutes, hours and minutes, or days and hours.
pub fn format_uptime(seconds: u64) -> String {
    match seconds {
        s if s < 60 => format!("{} seconds", s),
        s if s < 3600 => format!("{} minutes", s / 60),
        s if s < 86_400 => format!("{}h {}m", s / 3600, (s % 3600) / 60),
        s => format!("{}d {}h", s / 86_400, (s % 86_400) / 3600),
    }
}

/// Wraps an API error with the action that failed and its status code.
fn failure(action: &str, error: HuefyError) -> anyhow::Error {
    if let Some(errors) = error.field_errors() {
        for (name, messages) in errors {
            eprintln!("  {}: {}", name, messages.join(", "));
        }
    }

    let context = match error.status() {
        Some(code) => format!("{} (code {})", action, code),
        None => action.to_string(),
    };
    anyhow::Error::new(error).context(context)
}

/// String form of a response field, or `default` when absent.
fn field(value: &Value, key: &str, default: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => default.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Provider entries, whether the API returns a bare array or `{"providers": [...]}`.
fn provider_list(response: &Value) -> Vec<&Value> {
    let list = match response {
        Value::Array(items) => Some(items),
        other => other.get("providers").and_then(Value::as_array),
    };
    list.map(|items| items.iter().collect()).unwrap_or_default()
}
