//! Notification channel configuration, read from the `[notify]` settings table.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Webhook,
    #[default]
    Log,
}

/// One delivery channel, keyed by service id in [`NotifyConfig::channels`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default)]
    pub kind: ChannelKind,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub body_template: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Title attached to every notification.
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub channels: HashMap<String, ChannelConfig>,
}

fn default_title() -> String {
    "中国老黄历".to_string()
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            channels: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_table_uses_defaults() {
        let config: NotifyConfig = toml::from_str("").unwrap();
        assert_eq!(config, NotifyConfig::default());
        assert_eq!(config.title, "中国老黄历");
    }

    #[test]
    fn channels_by_service_id() {
        let config: NotifyConfig = toml::from_str(
            r#"
            title = "家庭日历"

            [channels.wechat]
            kind = "webhook"
            url = "https://example.com/hook"
            method = "put"

            [channels.console]
            "#,
        )
        .unwrap();
        assert_eq!(config.title, "家庭日历");
        assert_eq!(config.channels["wechat"].kind, ChannelKind::Webhook);
        assert_eq!(config.channels["wechat"].method.as_deref(), Some("put"));
        assert_eq!(config.channels["console"].kind, ChannelKind::Log);
    }
}
