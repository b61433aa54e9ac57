//! Notification channel adapter.
//!
//! A [`Notification`] converts itself into a [`HuefyMessage`] for a given
//! [`Notifiable`]; [`HuefyChannel`] resolves the recipient, optionally merges
//! notification metadata into the template data and sends it.

use log::{error, info};
use serde_json::Value;

use crate::client::EmailApi;
use crate::config::{HuefyConfig, LogSettings};
use crate::error::{HuefyError, Result};
use crate::message::HuefyMessage;

/// Something that can receive notifications, typically a user record.
pub trait Notifiable: Send + Sync {
    /// Type name merged into template data as `notifiable_type`.
    fn notifiable_type(&self) -> &str;

    /// Identifier merged into template data as `notifiable_id`.
    fn notifiable_id(&self) -> String;

    /// Address dedicated to Huefy notifications.
    fn route_for_huefy(&self) -> Option<String> {
        None
    }

    /// General mail routing address.
    fn route_for_mail(&self) -> Option<String> {
        None
    }

    fn email(&self) -> Option<String> {
        None
    }
}

pub trait Notification: Send + Sync {
    fn id(&self) -> String;

    fn notification_type(&self) -> &str;

    /// Builds the message for `notifiable`.
    fn to_huefy(&self, notifiable: &dyn Notifiable) -> HuefyMessage;
}

pub struct HuefyChannel<A: EmailApi> {
    api: A,
    default_template_key: Option<String>,
    default_provider: Option<String>,
    include_notification_data: bool,
    logging: LogSettings,
}

impl<A: EmailApi> HuefyChannel<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            default_template_key: None,
            default_provider: None,
            include_notification_data: true,
            logging: LogSettings::default(),
        }
    }

    pub fn from_config(api: A, config: &HuefyConfig) -> Self {
        Self {
            api,
            default_template_key: config.notifications.default_template_key.clone(),
            default_provider: config.default_provider.clone(),
            include_notification_data: config.notifications.include_notification_data,
            logging: config.logging,
        }
    }

    pub fn default_template_key(mut self, key: impl Into<String>) -> Self {
        self.default_template_key = Some(key.into());
        self
    }

    pub fn default_provider(mut self, provider: impl Into<String>) -> Self {
        self.default_provider = Some(provider.into());
        self
    }

    pub fn include_notification_data(mut self, include: bool) -> Self {
        self.include_notification_data = include;
        self
    }

    /// Sends `notification` to `notifiable`.
    #[tracing::instrument(skip_all, fields(notification_id = %notification.id()))]
    pub async fn send(
        &self,
        notifiable: &dyn Notifiable,
        notification: &dyn Notification,
    ) -> Result<Value> {
        let mut message = notification.to_huefy(notifiable);

        if message.recipient().is_none() {
            let Some(recipient) = recipient_for(notifiable) else {
                return Err(HuefyError::invalid_message(
                    "Could not determine recipient email address.",
                ));
            };
            message = message.to(recipient);
        }

        if self.include_notification_data {
            message = message
                .with("notification_id", notification.id())
                .with("notification_type", notification.notification_type())
                .with("notifiable_type", notifiable.notifiable_type())
                .with("notifiable_id", notifiable.notifiable_id());
        }

        let Some(request) = message.to_request(
            self.default_template_key.as_deref(),
            self.default_provider.as_deref(),
        ) else {
            return Err(HuefyError::invalid_message(
                "No template key specified for notification.",
            ));
        };

        match self.api.send(&request).await {
            Ok(response) => {
                if self.logging.log_successful_sends {
                    info!(
                        "Huefy notification sent successfully: notification_id={} type={} template_key={} recipient={} message_id={}",
                        notification.id(),
                        notification.notification_type(),
                        request.template_key,
                        request.recipient,
                        response["message_id"]
                    );
                }
                Ok(response)
            }
            Err(e) => {
                if self.logging.log_failed_sends {
                    error!(
                        "Huefy notification send failed: notification_id={} type={} template_key={} recipient={} error={} code={:?}",
                        notification.id(),
                        notification.notification_type(),
                        request.template_key,
                        request.recipient,
                        e,
                        e.status()
                    );
                }
                Err(e)
            }
        }
    }
}

fn recipient_for(notifiable: &dyn Notifiable) -> Option<String> {
    [
        notifiable.route_for_huefy(),
        notifiable.route_for_mail(),
        notifiable.email(),
    ]
    .into_iter()
    .flatten()
    .find(|address| !address.is_empty())
}
