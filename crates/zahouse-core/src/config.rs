use std::collections::HashMap;

use anyhow::{bail, Result};

/// Which hosted model API answers requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
    Groq,
    Google,
}

impl Provider {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Some(Self::Anthropic),
            "groq" | "llama" => Some(Self::Groq),
            "google" | "gemini" => Some(Self::Google),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::Groq => "groq",
            Self::Google => "google",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Self::Anthropic => "claude-3-5-sonnet-20240620",
            Self::Groq => "llama3-70b-8192",
            Self::Google => "gemini-1.5-flash",
        }
    }

    /// Context window of `default_model`, in tokens.
    pub fn default_context_tokens(self) -> usize {
        match self {
            Self::Anthropic => 200_000,
            Self::Groq => 8_192,
            Self::Google => 1_048_576,
        }
    }
}

/// Tokens kept free beyond prompt and completion; the chars/4 estimate runs low.
const CONTEXT_SLACK_TOKENS: usize = 512;

/// Full application configuration.
/// Values come from the process environment first, then `.env`.
#[derive(Debug, Clone)]
pub struct Config {
    // Web
    pub web_bind: String,
    pub web_port: u16,
    pub public_dir: String,
    pub max_upload_bytes: usize,
    /// Empty disables the `/admin` key check.
    pub admin_key: String,

    // Storage
    pub data_dir: String,
    pub knowledge_dir: String,

    // LLM
    pub provider: Provider,
    pub model: String,
    pub anthropic_api_key: String,
    pub groq_api_key: String,
    pub google_api_key: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Prompt plus completion must fit in this many tokens.
    pub context_tokens: usize,
    pub llm_timeout_s: u64,
    pub thread_history_turns: usize,

    // Prompt budget
    pub max_prompt_tokens: usize,
    pub doc_char_limit: usize,
    pub kb_char_limit: usize,
    pub search_char_limit: usize,

    // Gating
    pub require_email_for_audit: bool,

    // Web search
    pub tavily_api_key: String,
    pub search_max_results: usize,

    // Mail
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: String,
    pub smtp_pass: String,
    pub mail_from: String,
    pub admin_email: String,
}

pub fn parse_dotenv_str(contents: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        if let Some((k, v)) = line.split_once('=') {
            let v = v.trim();
            let v = v
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
                .unwrap_or(v);
            map.insert(k.trim().to_string(), v.to_string());
        }
    }
    map
}

fn parse_dotenv() -> HashMap<String, String> {
    match std::fs::read_to_string(".env") {
        Ok(contents) => parse_dotenv_str(&contents),
        Err(_) => HashMap::new(),
    }
}

fn get(key: &str, dotenv: &HashMap<String, String>) -> Option<String> {
    std::env::var(key)
        .ok()
        .or_else(|| dotenv.get(key).cloned())
        .filter(|v| !v.is_empty())
}

fn get_str(key: &str, dotenv: &HashMap<String, String>, default: &str) -> String {
    get(key, dotenv).unwrap_or_else(|| default.to_string())
}

fn get_bool(key: &str, dotenv: &HashMap<String, String>, default: bool) -> bool {
    match get(key, dotenv).as_deref() {
        Some("true") | Some("1") | Some("yes") => true,
        Some("false") | Some("0") | Some("no") => false,
        Some(_) => default,
        None => default,
    }
}

fn get_parsed<T: std::str::FromStr>(key: &str, dotenv: &HashMap<String, String>, default: T) -> T {
    get(key, dotenv)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_map(&parse_dotenv())
    }

    /// Build a config from `.env`-style values, with the process env taking precedence.
    pub fn from_map(dotenv: &HashMap<String, String>) -> Result<Self> {
        let provider_name = get_str("LLM_PROVIDER", dotenv, "groq");
        let Some(provider) = Provider::parse(&provider_name) else {
            bail!("unknown LLM_PROVIDER {provider_name:?} (expected anthropic, groq or google)");
        };

        let max_tokens: u32 = get_parsed("LLM_MAX_TOKENS", dotenv, 2048);
        let context_tokens = get_parsed("MODEL_CONTEXT_TOKENS", dotenv, provider.default_context_tokens());
        let prompt_ceiling = context_tokens.saturating_sub(max_tokens as usize + CONTEXT_SLACK_TOKENS);
        let max_prompt_tokens = get_parsed("MAX_PROMPT_TOKENS", dotenv, 8000usize).min(prompt_ceiling);

        // The Groq key historically lived under the deployment's vault name.
        let groq_api_key = get("GROQ_API_KEY", dotenv)
            .or_else(|| get("ZAHOUSE_STRATEGIST", dotenv))
            .unwrap_or_default();

        Ok(Config {
            web_bind: get_str("WEB_BIND", dotenv, "0.0.0.0"),
            web_port: get_parsed("PORT", dotenv, 3000),
            public_dir: get_str("PUBLIC_DIR", dotenv, "public"),
            max_upload_bytes: get_parsed("MAX_UPLOAD_BYTES", dotenv, 20 * 1024 * 1024),
            admin_key: get_str("ADMIN_KEY", dotenv, ""),
            data_dir: get_str("DATA_DIR", dotenv, "data"),
            knowledge_dir: get_str("KNOWLEDGE_DIR", dotenv, "knowledge"),
            provider,
            model: get_str("MODEL", dotenv, ""),
            anthropic_api_key: get_str("ANTHROPIC_API_KEY", dotenv, ""),
            groq_api_key,
            google_api_key: get_str("GOOGLE_API_KEY", dotenv, ""),
            temperature: get_parsed("LLM_TEMPERATURE", dotenv, 0.6),
            max_tokens,
            context_tokens,
            llm_timeout_s: get_parsed("LLM_TIMEOUT_S", dotenv, 120),
            thread_history_turns: get_parsed("THREAD_HISTORY_TURNS", dotenv, 10),
            max_prompt_tokens,
            doc_char_limit: get_parsed("DOC_CHAR_LIMIT", dotenv, 20_000),
            kb_char_limit: get_parsed("KB_CHAR_LIMIT", dotenv, 12_000),
            search_char_limit: get_parsed("SEARCH_CHAR_LIMIT", dotenv, 4_000),
            require_email_for_audit: get_bool("REQUIRE_EMAIL_FOR_AUDIT", dotenv, true),
            tavily_api_key: get_str("TAVILY_API_KEY", dotenv, ""),
            search_max_results: get_parsed("SEARCH_MAX_RESULTS", dotenv, 5),
            smtp_host: get_str("SMTP_HOST", dotenv, ""),
            smtp_port: get_parsed("SMTP_PORT", dotenv, 587),
            smtp_user: get_str("SMTP_USER", dotenv, ""),
            smtp_pass: get_str("SMTP_PASS", dotenv, ""),
            mail_from: get_str("MAIL_FROM", dotenv, ""),
            admin_email: get_str("ADMIN_EMAIL", dotenv, ""),
        })
    }

    /// Model override, or the provider's default.
    pub fn provider_model(&self) -> String {
        if self.model.is_empty() {
            self.provider.default_model().to_string()
        } else {
            self.model.clone()
        }
    }

    /// API key for the configured provider.
    pub fn provider_api_key(&self) -> &str {
        match self.provider {
            Provider::Anthropic => &self.anthropic_api_key,
            Provider::Groq => &self.groq_api_key,
            Provider::Google => &self.google_api_key,
        }
    }

    pub fn search_enabled(&self) -> bool {
        !self.tavily_api_key.is_empty()
    }

    pub fn mail_enabled(&self) -> bool {
        !self.smtp_host.is_empty() && !self.mail_from.is_empty()
    }

    pub fn leads_path(&self) -> String {
        format!("{}/leads.json", self.data_dir)
    }

    pub fn inquiries_path(&self) -> String {
        format!("{}/inquiries.json", self.data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn dotenv_skips_comments_and_strips_quotes() {
        let parsed = parse_dotenv_str("# comment\n\nexport MODEL=\"llama3-8b\"\nPORT = 8080\n");
        assert_eq!(parsed.get("MODEL").map(String::as_str), Some("llama3-8b"));
        assert_eq!(parsed.get("PORT").map(String::as_str), Some("8080"));
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn provider_aliases() {
        assert_eq!(Provider::parse("Claude"), Some(Provider::Anthropic));
        assert_eq!(Provider::parse("gemini"), Some(Provider::Google));
        assert_eq!(Provider::parse(" groq "), Some(Provider::Groq));
        assert_eq!(Provider::parse("openai"), None);
    }

    #[test]
    fn provider_model_falls_back_to_default() {
        let mut cfg = Config::from_map(&HashMap::new()).unwrap();
        cfg.provider = Provider::Google;
        cfg.model.clear();
        assert_eq!(cfg.provider_model(), "gemini-1.5-flash");
        cfg.model = "gemini-1.5-pro".into();
        assert_eq!(cfg.provider_model(), "gemini-1.5-pro");
    }

    #[test]
    fn dotenv_values_are_typed_with_fallbacks() {
        let cfg = Config::from_map(&map(&[
            ("KB_CHAR_LIMIT", "500"),
            ("REQUIRE_EMAIL_FOR_AUDIT", "no"),
            ("SEARCH_MAX_RESULTS", "lots"),
            ("ZAHOUSE_STRATEGIST", "vault-key"),
        ]))
        .unwrap();
        assert_eq!(cfg.kb_char_limit, 500);
        assert!(!cfg.require_email_for_audit);
        assert_eq!(cfg.search_max_results, 5);
        assert_eq!(cfg.groq_api_key, "vault-key");
    }

    #[test]
    fn default_budgets_fit_the_default_model() {
        for name in ["groq", "anthropic", "google"] {
            let cfg = Config::from_map(&map(&[("LLM_PROVIDER", name)])).unwrap();
            if !cfg.model.is_empty() {
                continue;
            }
            assert!(
                cfg.max_prompt_tokens + cfg.max_tokens as usize <= cfg.context_tokens,
                "{name}: {} + {} > {}",
                cfg.max_prompt_tokens,
                cfg.max_tokens,
                cfg.context_tokens
            );
        }
    }

    #[test]
    fn prompt_budget_is_clamped_to_the_context_window() {
        let cfg = Config::from_map(&map(&[
            ("MODEL_CONTEXT_TOKENS", "8192"),
            ("LLM_MAX_TOKENS", "4000"),
            ("MAX_PROMPT_TOKENS", "8000"),
        ]))
        .unwrap();
        assert_eq!(cfg.max_prompt_tokens, 8192 - 4000 - CONTEXT_SLACK_TOKENS);

        let roomy = Config::from_map(&map(&[
            ("MODEL_CONTEXT_TOKENS", "128000"),
            ("MAX_PROMPT_TOKENS", "8000"),
        ]))
        .unwrap();
        assert_eq!(roomy.max_prompt_tokens, 8000);
    }

    #[test]
    fn unknown_provider_is_rejected() {
        assert!(Config::from_map(&map(&[("LLM_PROVIDER", "openai")])).is_err());
    }

    #[test]
    fn provider_key_tracks_selected_provider() {
        let mut cfg = Config::from_map(&HashMap::new()).unwrap();
        cfg.groq_api_key = "gsk".into();
        cfg.anthropic_api_key = "sk-ant".into();
        cfg.provider = Provider::Groq;
        assert_eq!(cfg.provider_api_key(), "gsk");
        cfg.provider = Provider::Anthropic;
        assert_eq!(cfg.provider_api_key(), "sk-ant");
    }
}
