//! Routes notifications to the channel configured for their service id.
//!
//! Services without a configured channel go to the log, so a directive
//! naming an unknown service is never lost silently.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{ChannelKind, NotifyConfig};
use crate::log::LogNotifier;
use crate::templating::{MessageContext, TemplateRenderer};
use crate::traits::{DispatchResult, Notification, Notifier, NotifyError};
use crate::webhook::WebhookNotifier;

pub struct Dispatcher {
    title: String,
    /// Service id → channel.
    channels: HashMap<String, Box<dyn Notifier>>,
    fallback: Box<dyn Notifier>,
    renderer: Arc<TemplateRenderer>,
}

impl Dispatcher {
    /// A dispatcher that logs every notification.
    pub fn empty() -> Self {
        Self::new(NotifyConfig::default().title)
    }

    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            channels: HashMap::new(),
            fallback: Box::new(LogNotifier),
            renderer: Arc::new(TemplateRenderer::new()),
        }
    }

    /// Build every configured channel. A channel that cannot be built is
    /// a configuration error for the whole dispatcher.
    pub fn from_config(config: &NotifyConfig) -> Result<Self, NotifyError> {
        let mut dispatcher = Self::new(config.title.clone());
        for (service, channel) in &config.channels {
            let notifier: Box<dyn Notifier> = match channel.kind {
                ChannelKind::Log => Box::new(LogNotifier),
                ChannelKind::Webhook => Box::new(WebhookNotifier::from_config(
                    service,
                    channel,
                    Arc::clone(&dispatcher.renderer),
                )?),
            };
            dispatcher.set_channel(service.clone(), notifier);
        }
        Ok(dispatcher)
    }

    pub fn set_channel(&mut self, service: impl Into<String>, channel: Box<dyn Notifier>) {
        self.channels.insert(service.into(), channel);
    }

    pub fn has_channel(&self, service: &str) -> bool {
        self.channels.contains_key(service)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Render `template` and deliver it to `service`'s channel.
    ///
    /// Errors only when the template does not render; a failed delivery is
    /// logged and reported in the result.
    pub async fn dispatch(
        &self,
        service: &str,
        template: &str,
        ctx: &MessageContext,
    ) -> Result<DispatchResult, NotifyError> {
        let notification = Notification {
            service: service.to_string(),
            title: self.title.clone(),
            message: self.renderer.render(template, ctx)?,
        };

        let channel = self.channels.get(service).unwrap_or(&self.fallback);
        if !self.has_channel(service) {
            tracing::debug!(service, "No channel configured, logging notification");
        }

        let start = std::time::Instant::now();
        let result = channel.send(&notification).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let (success, error) = match result {
            Ok(()) => {
                tracing::info!(
                    service,
                    channel = channel.channel_name(),
                    name = %ctx.name,
                    duration_ms,
                    "Notification delivered"
                );
                (true, None)
            }
            Err(e) => {
                tracing::warn!(
                    service,
                    channel = channel.channel_name(),
                    error = %e,
                    duration_ms,
                    "Notification delivery failed"
                );
                (false, Some(e.to_string()))
            }
        };

        Ok(DispatchResult {
            service: service.to_string(),
            channel: channel.channel_name().to_string(),
            success,
            error,
            duration_ms,
        })
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::empty()
    }
}
