//! Mail transport adapter.
//!
//! Turns a generic outbound email into a templated send. The template and
//! its data travel in headers:
//!
//! - `X-Template-Key` - template to render (falls back to the configured default)
//! - `X-Template-Data` - JSON object with the template data
//! - `X-Email-Provider` - provider hint (falls back to the configured default)

use log::{error, info};
use serde_json::Value;
use std::fmt;

use crate::client::{EmailApi, EmailRequest, TemplateData};
use crate::config::{HuefyConfig, LogSettings};
use crate::error::{HuefyError, Result};

pub const TEMPLATE_KEY_HEADER: &str = "X-Template-Key";
pub const TEMPLATE_DATA_HEADER: &str = "X-Template-Data";
pub const PROVIDER_HEADER: &str = "X-Email-Provider";

/// A message handed to the transport by a mailer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: Vec<String>,
    pub headers: Vec<(String, String)>,
}

impl OutboundEmail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to(mut self, address: impl Into<String>) -> Self {
        self.to.push(address.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First header with this name, compared case-insensitively.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Per-recipient outcome of [`HuefyTransport::send_each`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SendReport {
    pub sent: usize,
    pub failed_recipients: Vec<String>,
}

pub struct HuefyTransport<A: EmailApi> {
    api: A,
    default_template_key: Option<String>,
    default_provider: Option<String>,
    logging: LogSettings,
}

impl<A: EmailApi> HuefyTransport<A> {
    pub fn new(
        api: A,
        default_template_key: Option<String>,
        default_provider: Option<String>,
    ) -> Self {
        Self {
            api,
            default_template_key,
            default_provider,
            logging: LogSettings::default(),
        }
    }

    pub fn from_config(api: A, config: &HuefyConfig) -> Self {
        Self::new(
            api,
            config.mail.default_template_key.clone(),
            config.default_provider.clone(),
        )
        .logging(config.logging)
    }

    pub fn logging(mut self, logging: LogSettings) -> Self {
        self.logging = logging;
        self
    }

    /// Sends the message to its first recipient.
    #[tracing::instrument(skip(self, email))]
    pub async fn send(&self, email: &OutboundEmail) -> Result<Value> {
        let template_key = self.template_key(email)?;
        let Some(recipient) = email.to.first() else {
            return Err(HuefyError::invalid_message("No recipient specified."));
        };
        self.send_to(email, &template_key, recipient).await
    }

    /// Sends the message to every recipient separately.
    ///
    /// Failures are collected in the report instead of stopping the loop.
    #[tracing::instrument(skip(self, email))]
    pub async fn send_each(&self, email: &OutboundEmail) -> Result<SendReport> {
        let template_key = self.template_key(email)?;
        if email.to.is_empty() {
            return Err(HuefyError::invalid_message("No recipients specified."));
        }

        let mut report = SendReport::default();
        for recipient in &email.to {
            match self.send_to(email, &template_key, recipient).await {
                Ok(_) => report.sent += 1,
                Err(_) => report.failed_recipients.push(recipient.clone()),
            }
        }
        Ok(report)
    }

    async fn send_to(
        &self,
        email: &OutboundEmail,
        template_key: &str,
        recipient: &str,
    ) -> Result<Value> {
        let mut request = EmailRequest::new(template_key, recipient).data(template_data(email));
        request.provider = self.provider(email);

        match self.api.send(&request).await {
            Ok(response) => {
                if self.logging.log_successful_sends {
                    info!(
                        "Huefy email sent successfully: template_key={} recipient={} message_id={} provider={}",
                        template_key,
                        recipient,
                        response["message_id"],
                        response["provider"]
                    );
                }
                Ok(response)
            }
            Err(e) => {
                if self.logging.log_failed_sends {
                    error!(
                        "Huefy email send failed: template_key={} recipient={} error={} code={:?}",
                        template_key,
                        recipient,
                        e,
                        e.status()
                    );
                }
                Err(e)
            }
        }
    }

    /// A present header wins over the default, even when empty.
    fn template_key(&self, email: &OutboundEmail) -> Result<String> {
        email
            .header_value(TEMPLATE_KEY_HEADER)
            .or(self.default_template_key.as_deref())
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                HuefyError::invalid_message(
                    "No template key specified. Use X-Template-Key header or configure a default.",
                )
            })
    }

    fn provider(&self, email: &OutboundEmail) -> Option<String> {
        email
            .header_value(PROVIDER_HEADER)
            .or(self.default_provider.as_deref())
            .map(str::to_string)
    }
}

impl<A: EmailApi> fmt::Display for HuefyTransport<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("huefy")
    }
}

/// Template data from the `X-Template-Data` header; anything but a JSON object is ignored.
fn template_data(email: &OutboundEmail) -> TemplateData {
    match email
        .header_value(TEMPLATE_DATA_HEADER)
        .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
    {
        Some(Value::Object(map)) => map,
        _ => TemplateData::new(),
    }
}
