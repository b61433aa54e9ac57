//! Builder for a templated email, used by notifications.

use serde_json::Value;

use crate::client::{EmailRequest, TemplateData};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HuefyMessage {
    template_key: String,
    data: TemplateData,
    recipient: Option<String>,
    provider: Option<String>,
}

impl HuefyMessage {
    pub fn new(template_key: impl Into<String>) -> Self {
        Self {
            template_key: template_key.into(),
            ..Self::default()
        }
    }

    pub fn template(mut self, template_key: impl Into<String>) -> Self {
        self.template_key = template_key.into();
        self
    }

    /// Replaces the template data.
    pub fn with_data(mut self, data: TemplateData) -> Self {
        self.data = data;
        self
    }

    /// Adds a single data item.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn to(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Template key, or `default` when none was set.
    pub fn template_key_or<'a>(&'a self, default: Option<&'a str>) -> Option<&'a str> {
        Some(self.template_key.as_str())
            .filter(|k| !k.is_empty())
            .or(default.filter(|k| !k.is_empty()))
    }

    pub fn data(&self) -> &TemplateData {
        &self.data
    }

    pub fn recipient(&self) -> Option<&str> {
        self.recipient.as_deref().filter(|r| !r.is_empty())
    }

    /// Provider, or `default` when none was set.
    pub fn provider_or<'a>(&'a self, default: Option<&'a str>) -> Option<&'a str> {
        self.provider
            .as_deref()
            .filter(|p| !p.is_empty())
            .or(default.filter(|p| !p.is_empty()))
    }

    /// Resolves defaults into a sendable request.
    ///
    /// Returns `None` when there is no template key or no recipient.
    pub fn to_request(
        &self,
        default_template: Option<&str>,
        default_provider: Option<&str>,
    ) -> Option<EmailRequest> {
        let template_key = self.template_key_or(default_template)?;
        let recipient = self.recipient()?;
        let mut request = EmailRequest::new(template_key, recipient).data(self.data.clone());
        request.provider = self.provider_or(default_provider).map(str::to_string);
        Some(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder() {
        let message = HuefyMessage::new("welcome")
            .with("name", "Ada")
            .with("count", 3)
            .to("ada@example.com")
            .provider("mailgun");

        assert_eq!(message.template_key_or(None), Some("welcome"));
        assert_eq!(message.data()["name"], "Ada");
        assert_eq!(message.data()["count"], 3);
        assert_eq!(message.recipient(), Some("ada@example.com"));
        assert_eq!(message.provider_or(Some("ses")), Some("mailgun"));
    }

    #[test]
    fn test_data_replaces_previous_items() {
        let mut data = TemplateData::new();
        data.insert("order".into(), json!(42));

        let message = HuefyMessage::new("receipt").with("name", "Ada").with_data(data);
        assert!(!message.data().contains_key("name"));
        assert_eq!(message.data()["order"], 42);
    }

    #[test]
    fn test_defaults() {
        let message = HuefyMessage::default();
        assert_eq!(message.template_key_or(None), None);
        assert_eq!(message.template_key_or(Some("notice")), Some("notice"));
        assert_eq!(message.provider_or(Some("ses")), Some("ses"));
        assert_eq!(message.provider_or(None), None);

        let message = HuefyMessage::new("").template("digest");
        assert_eq!(message.template_key_or(Some("notice")), Some("digest"));
    }

    #[test]
    fn test_to_request() {
        let message = HuefyMessage::new("welcome").to("ada@example.com");
        let request = message.to_request(None, Some("ses")).unwrap();
        assert_eq!(request.template_key, "welcome");
        assert_eq!(request.provider.as_deref(), Some("ses"));

        assert!(HuefyMessage::new("welcome").to_request(None, None).is_none());
        assert!(HuefyMessage::default().to("a@b.c").to_request(None, None).is_none());
    }
}
