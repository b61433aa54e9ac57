//! Huefy API operations.
//!
//! Each operation builds a request body and hands it to the
//! [`HttpClient`] request executor, which owns retries and error
//! classification.

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::config::HuefyConfig;
use crate::error::{HuefyError, Result};
use crate::http::{HttpClient, RequestSpec};

/// Template data: any JSON object.
pub type TemplateData = Map<String, Value>;

const SEND_PATH: &str = "/emails/send";
const BULK_PATH: &str = "/emails/bulk";
const HEALTH_PATH: &str = "/health";
const VALIDATE_PATH: &str = "/templates/validate";
const PROVIDERS_PATH: &str = "/providers";

/// One email to send: template, data, recipient and optional provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailRequest {
    pub template_key: String,
    #[serde(default)]
    pub data: TemplateData,
    pub recipient: String,
    #[serde(default, skip_serializing_if = "is_blank")]
    pub provider: Option<String>,
}

fn is_blank(provider: &Option<String>) -> bool {
    provider.as_deref().is_none_or(str::is_empty)
}

impl EmailRequest {
    pub fn new(template_key: impl Into<String>, recipient: impl Into<String>) -> Self {
        Self {
            template_key: template_key.into(),
            data: TemplateData::new(),
            recipient: recipient.into(),
            provider: None,
        }
    }

    pub fn data(mut self, data: TemplateData) -> Self {
        self.data = data;
        self
    }

    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Wire body. `provider` is left out entirely when unset or empty.
    pub fn to_body(&self) -> Map<String, Value> {
        let mut body = Map::new();
        body.insert("template_key".into(), Value::String(self.template_key.clone()));
        body.insert("data".into(), Value::Object(self.data.clone()));
        body.insert("recipient".into(), Value::String(self.recipient.clone()));
        if let Some(provider) = self.provider.as_deref().filter(|p| !p.is_empty()) {
            body.insert("provider".into(), Value::String(provider.to_string()));
        }
        body
    }
}

/// Outcome of a template validation request.
#[derive(Debug)]
pub enum TemplateValidation {
    /// The server rendered the template with the test data.
    Valid,
    /// The server answered, and `valid` was false or missing.
    Invalid { response: Value },
    /// The check itself did not complete.
    CheckFailed(HuefyError),
}

impl TemplateValidation {
    pub fn is_valid(&self) -> bool {
        matches!(self, TemplateValidation::Valid)
    }
}

/// The remote API as seen by adapters and commands.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailApi: Send + Sync {
    /// POST `/emails/send`.
    async fn send(&self, email: &EmailRequest) -> Result<Value>;

    /// POST `/emails/bulk`. Per-item outcomes are left to the caller.
    async fn send_bulk_emails(&self, emails: &[EmailRequest]) -> Result<Value>;

    /// GET `/health`.
    async fn health_check(&self) -> Result<Value>;

    /// POST `/templates/validate`, keeping "invalid" and "could not check" apart.
    async fn check_template(
        &self,
        template_key: &str,
        test_data: &TemplateData,
    ) -> TemplateValidation;

    /// GET `/providers`.
    async fn get_providers(&self) -> Result<Value>;
}

/// Client for the Huefy templated email API.
#[derive(Debug, Clone)]
pub struct HuefyClient {
    http: HttpClient,
    cancel: Option<CancellationToken>,
}

impl HuefyClient {
    pub fn new(http: HttpClient) -> Self {
        Self { http, cancel: None }
    }

    /// Builds the executor from `config`.
    pub fn from_config(config: &HuefyConfig) -> AnyResult<Self> {
        let http = HttpClient::new(&config.api_key, &config.client_options())?;
        Ok(Self::new(http))
    }

    /// A handle whose calls stop retrying once `token` is cancelled.
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            http: self.http.clone(),
            cancel: Some(token),
        }
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    /// Sends one email using a template.
    pub async fn send_email(
        &self,
        template_key: &str,
        data: TemplateData,
        recipient: &str,
        provider: Option<&str>,
    ) -> Result<Value> {
        let mut email = EmailRequest::new(template_key, recipient).data(data);
        email.provider = provider.map(str::to_string);
        self.send(&email).await
    }

    /// Validates a template with test data.
    ///
    /// Never fails: a check that could not be completed reports `false`, the
    /// same as an invalid template. Use [`EmailApi::check_template`] to tell
    /// the two apart.
    pub async fn validate_template(&self, template_key: &str, test_data: &TemplateData) -> bool {
        match self.check_template(template_key, test_data).await {
            TemplateValidation::Valid => true,
            TemplateValidation::Invalid { .. } => false,
            TemplateValidation::CheckFailed(e) => {
                warn!("Validation of template {} could not be completed: {}", template_key, e);
                false
            }
        }
    }

    async fn execute(&self, request: RequestSpec) -> Result<Value> {
        self.http
            .execute_with_cancel(&request, self.cancel.as_ref())
            .await
    }
}

#[async_trait]
impl EmailApi for HuefyClient {
    #[tracing::instrument(skip(self, email), fields(template_key = %email.template_key))]
    async fn send(&self, email: &EmailRequest) -> Result<Value> {
        debug!("Sending template {} to {}", email.template_key, email.recipient);
        self.execute(RequestSpec::post(SEND_PATH, email.to_body()))
            .await
            .map_err(|e| e.with_template_key(&email.template_key))
    }

    #[tracing::instrument(skip(self, emails), fields(count = emails.len()))]
    async fn send_bulk_emails(&self, emails: &[EmailRequest]) -> Result<Value> {
        let items = emails.iter().map(|e| Value::Object(e.to_body())).collect();
        let mut body = Map::new();
        body.insert("emails".into(), Value::Array(items));
        self.execute(RequestSpec::post(BULK_PATH, body)).await
    }

    #[tracing::instrument(skip(self))]
    async fn health_check(&self) -> Result<Value> {
        self.execute(RequestSpec::get(HEALTH_PATH)).await
    }

    #[tracing::instrument(skip(self, test_data))]
    async fn check_template(
        &self,
        template_key: &str,
        test_data: &TemplateData,
    ) -> TemplateValidation {
        let mut body = Map::new();
        body.insert("template_key".into(), Value::String(template_key.to_string()));
        body.insert("test_data".into(), Value::Object(test_data.clone()));

        match self.execute(RequestSpec::post(VALIDATE_PATH, body)).await {
            Ok(response) => {
                if response.get("valid").and_then(Value::as_bool).unwrap_or(false) {
                    TemplateValidation::Valid
                } else {
                    TemplateValidation::Invalid { response }
                }
            }
            Err(e) => TemplateValidation::CheckFailed(e.with_template_key(template_key)),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn get_providers(&self) -> Result<Value> {
        self.execute(RequestSpec::get(PROVIDERS_PATH)).await
    }
}
