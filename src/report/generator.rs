//! Text generation boundary.
//!
//! `generate` never fails. Every implementation degrades to template text
//! when the backing service is unavailable.

use crate::config::ReportSettings;

/// Characters of the user prompt echoed back by template output.
const TEMPLATE_PROMPT_CHARS: usize = 200;

pub trait TextGenerator: Send {
    fn generate(&self, system_prompt: &str, user_prompt: &str) -> String;
}

fn template_text(tag: &str, user_prompt: &str) -> String {
    let excerpt: String = user_prompt.chars().take(TEMPLATE_PROMPT_CHARS).collect();
    format!("[{}] {}", tag, excerpt)
}

/// Offline generator that echoes the prompt.
#[derive(Clone, Copy, Debug, Default)]
pub struct TemplateGenerator;

impl TextGenerator for TemplateGenerator {
    fn generate(&self, _system_prompt: &str, user_prompt: &str) -> String {
        template_text("template", user_prompt)
    }
}

/// OpenAI-compatible chat completions client.
#[cfg(feature = "report-http")]
pub struct ChatCompletionGenerator {
    api_base: String,
    api_key: Option<String>,
    model_name: String,
    timeout: std::time::Duration,
}

#[cfg(feature = "report-http")]
impl ChatCompletionGenerator {
    pub fn new(settings: &ReportSettings) -> Self {
        let api_key = std::env::var(&settings.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        Self {
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            api_key,
            model_name: settings.model_name.clone(),
            timeout: std::time::Duration::from_secs(settings.timeout_s),
        }
    }

    fn request(
        &self,
        api_key: &str,
        system_prompt: &str,
        user_prompt: &str,
    ) -> anyhow::Result<String> {
        use anyhow::{anyhow, Context};

        let payload = serde_json::json!({
            "model": self.model_name,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt},
            ],
            "temperature": 0.3,
        });
        let response = ureq::post(&format!("{}/chat/completions", self.api_base))
            .timeout(self.timeout)
            .set("Authorization", &format!("Bearer {}", api_key))
            .send_json(payload)
            .context("chat completion request")?;
        let body: serde_json::Value = response.into_json().context("chat completion body")?;
        body["choices"][0]["message"]["content"]
            .as_str()
            .map(|text| text.trim().to_string())
            .ok_or_else(|| anyhow!("chat completion response has no message content"))
    }
}

#[cfg(feature = "report-http")]
impl TextGenerator for ChatCompletionGenerator {
    fn generate(&self, system_prompt: &str, user_prompt: &str) -> String {
        let Some(api_key) = self.api_key.as_deref() else {
            return template_text("no api key, template", user_prompt);
        };
        match self.request(api_key, system_prompt, user_prompt) {
            Ok(text) => text,
            Err(e) => {
                log::warn!("report generation failed, using template: {:#}", e);
                let text = template_text("llm failed, template", user_prompt);
                format!("{} (error: {:#})", text, e)
            }
        }
    }
}

/// Select a generator from the `[report]` section.
pub fn create_generator(settings: &ReportSettings) -> Box<dyn TextGenerator> {
    if !settings.enabled {
        return Box::new(TemplateGenerator);
    }
    match settings.provider.as_str() {
        #[cfg(feature = "report-http")]
        "openai" => Box::new(ChatCompletionGenerator::new(settings)),
        other => {
            log::warn!(
                "report provider '{}' unavailable in this build; using template output",
                other
            );
            Box::new(TemplateGenerator)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_truncates_long_prompts() {
        let prompt = "x".repeat(500);
        let text = TemplateGenerator.generate("sys", &prompt);
        assert_eq!(text, format!("[template] {}", "x".repeat(200)));
    }

    #[test]
    fn disabled_reporting_uses_template() {
        let settings = ReportSettings {
            enabled: false,
            provider: "openai".to_string(),
            api_base: "http://127.0.0.1:1".to_string(),
            api_key_env: "PATROL_TEST_UNSET_KEY".to_string(),
            model_name: "m".to_string(),
            timeout_s: 1,
        };
        let generator = create_generator(&settings);
        assert_eq!(generator.generate("s", "hello"), "[template] hello");
    }
}

#[cfg(all(test, feature = "report-http"))]
mod http_tests {
    use super::*;

    fn settings(api_key_env: &str) -> ReportSettings {
        ReportSettings {
            enabled: true,
            provider: "openai".to_string(),
            // Nothing listens on port 1; the connection is refused.
            api_base: "http://127.0.0.1:1".to_string(),
            api_key_env: api_key_env.to_string(),
            model_name: "gpt-4o-mini".to_string(),
            timeout_s: 1,
        }
    }

    #[test]
    fn missing_api_key_falls_back_to_template() {
        std::env::remove_var("PATROL_TEST_KEY_ABSENT");
        let generator = ChatCompletionGenerator::new(&settings("PATROL_TEST_KEY_ABSENT"));
        let text = generator.generate("sys", "person in zone gate");
        assert_eq!(text, "[no api key, template] person in zone gate");
    }

    #[test]
    fn unreachable_service_falls_back_to_template_with_error() {
        std::env::set_var("PATROL_TEST_KEY_PRESENT", "sk-test");
        let generator = ChatCompletionGenerator::new(&settings("PATROL_TEST_KEY_PRESENT"));
        let text = generator.generate("sys", "person in zone gate");
        assert!(text.starts_with("[llm failed, template] person in zone gate"), "{text}");
        assert!(text.contains("(error: "), "{text}");
    }

    #[test]
    fn enabled_openai_provider_selects_chat_completion() {
        std::env::remove_var("PATROL_TEST_KEY_SELECTED");
        let generator = create_generator(&settings("PATROL_TEST_KEY_SELECTED"));
        let text = generator.generate("sys", "hello");
        assert!(text.starts_with("[no api key, template]"), "{text}");
    }
}
