//! Webhook channel: one HTTP request per countdown notification.
//!
//! Without a `body_template` the [`Notification`] is posted as JSON. With
//! one, the template is rendered against the notification, which lets a
//! channel speak a chat bot's message format directly.

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Method;

use crate::config::ChannelConfig;
use crate::templating::TemplateRenderer;
use crate::traits::{Notification, Notifier, NotifyError};

#[derive(Debug)]
pub struct WebhookNotifier {
    url: String,
    method: Method,
    headers: HashMap<String, String>,
    body_template: Option<String>,
    renderer: Arc<TemplateRenderer>,
    client: reqwest::Client,
}

impl WebhookNotifier {
    /// Build the channel for `service`. `${VAR}` references in the url and
    /// header values are expanded now, so a missing variable or a broken
    /// body template fails at startup instead of at the first birthday.
    pub fn from_config(
        service: &str,
        config: &ChannelConfig,
        renderer: Arc<TemplateRenderer>,
    ) -> Result<Self, NotifyError> {
        let url = config.url.as_deref().ok_or_else(|| {
            NotifyError::Config(format!("webhook channel '{service}' has no url"))
        })?;

        let method = match config.method.as_deref() {
            None => Method::POST,
            Some(m) => Method::from_bytes(m.to_uppercase().as_bytes())
                .map_err(|_| NotifyError::Config(format!("channel '{service}': bad method {m:?}")))?,
        };

        let headers = config
            .headers
            .iter()
            .flatten()
            .map(|(name, value)| Ok((name.clone(), expand_env(value)?)))
            .collect::<Result<HashMap<_, _>, NotifyError>>()?;

        if let Some(template) = &config.body_template {
            renderer.validate(template).map_err(|e| {
                NotifyError::Config(format!("channel '{service}': body template: {e}"))
            })?;
        }

        Ok(Self {
            url: expand_env(url)?,
            method,
            headers,
            body_template: config.body_template.clone(),
            renderer,
            client: reqwest::Client::new(),
        })
    }

    fn render_body(&self, notification: &Notification) -> Result<String, NotifyError> {
        match &self.body_template {
            Some(template) => self.renderer.render(template, notification),
            None => serde_json::to_string(notification)
                .map_err(|e| NotifyError::Template(e.to_string())),
        }
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let request = self
            .headers
            .iter()
            .fold(
                self.client.request(self.method.clone(), &self.url),
                |req, (name, value)| req.header(name.as_str(), value.as_str()),
            )
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(self.render_body(notification)?);

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            tracing::debug!(service = %notification.service, %status, "Webhook accepted notification");
            return Ok(());
        }

        let reply = response.text().await.unwrap_or_default();
        Err(NotifyError::Rejected(format!("{status}: {reply}")))
    }

    fn channel_name(&self) -> &str {
        "webhook"
    }
}

/// Replace every `${NAME}` with the environment variable `NAME`.
fn expand_env(input: &str) -> Result<String, NotifyError> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .ok_or_else(|| NotifyError::Config(format!("unclosed ${{ in {input:?}")))?;
        let name = &after[..end];
        let value = std::env::var(name)
            .map_err(|_| NotifyError::Config(format!("environment variable {name} is not set")))?;
        out.push_str(&value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
