//! Minijinja template rendering for notification messages.
//!
//! Messages are arbitrary strings from configuration (not pre-registered),
//! so a fresh [`minijinja::Environment`] is created per render call.

use crate::traits::NotifyError;

/// Values a message template can refer to.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct MessageContext {
    /// Person or event name.
    pub name: String,
    /// Days until the date; 0 on the day itself.
    pub days: i64,
    /// The date being counted down to, `YYYY-MM-DD`.
    pub date: String,
}

/// Renders message and body templates.
#[derive(Debug, Default)]
pub struct TemplateRenderer {
    _private: (),
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self { _private: () }
    }

    fn build_env() -> minijinja::Environment<'static> {
        let mut env = minijinja::Environment::new();
        env.add_function("env", env_function);
        env
    }

    /// Render a template string with any serializable context.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Template`] if the template is invalid or
    /// rendering fails.
    pub fn render<S: serde::Serialize>(&self, template_str: &str, ctx: &S) -> Result<String, NotifyError> {
        Self::build_env()
            .render_str(template_str, ctx)
            .map_err(|e| NotifyError::Template(e.to_string()))
    }

    /// Validate that a template string parses without evaluating it.
    pub fn validate(&self, template_str: &str) -> Result<(), NotifyError> {
        let env = Self::build_env();
        env.template_from_str(template_str)
            .map_err(|e| NotifyError::Template(e.to_string()))?;
        Ok(())
    }
}

/// Global function: read an environment variable by name, empty if unset.
fn env_function(name: String) -> String {
    match std::env::var(&name) {
        Ok(val) => val,
        Err(_) => {
            tracing::warn!(var = %name, "Environment variable not found, returning empty string");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_context() -> MessageContext {
        MessageContext {
            name: "妈妈".to_string(),
            days: 0,
            date: "2025-10-06".to_string(),
        }
    }

    #[test]
    fn render_message() {
        let renderer = TemplateRenderer::new();
        let result = renderer
            .render("今天是{{ name }}的生日（{{ date }}）", &sample_context())
            .unwrap();
        assert_eq!(result, "今天是妈妈的生日（2025-10-06）");
    }

    #[test]
    fn plain_text_passes_through() {
        let renderer = TemplateRenderer::new();
        assert_eq!(renderer.render("生日快乐", &sample_context()).unwrap(), "生日快乐");
    }

    #[test]
    fn conditionals_on_days() {
        let renderer = TemplateRenderer::new();
        let template = "{% if days == 0 %}就是今天{% else %}还有{{ days }}天{% endif %}";
        assert_eq!(renderer.render(template, &sample_context()).unwrap(), "就是今天");
        let later = MessageContext {
            days: 3,
            ..sample_context()
        };
        assert_eq!(renderer.render(template, &later).unwrap(), "还有3天");
    }

    #[test]
    fn render_env_function() {
        std::env::set_var("ALMANAC_NOTIFY_TEST_VAR", "hello");
        let renderer = TemplateRenderer::new();
        let result = renderer
            .render("{{ env('ALMANAC_NOTIFY_TEST_VAR') }}", &sample_context())
            .unwrap();
        assert_eq!(result, "hello");
        std::env::remove_var("ALMANAC_NOTIFY_TEST_VAR");
    }

    #[test]
    fn invalid_template_produces_error() {
        let renderer = TemplateRenderer::new();
        match renderer.render("{{ unclosed", &sample_context()) {
            Err(NotifyError::Template(msg)) => assert!(!msg.is_empty()),
            other => panic!("Expected Template error, got: {other:?}"),
        }
        assert!(renderer.validate("{{ unclosed").is_err());
        assert!(renderer.validate("{{ name }}").is_ok());
    }
}
