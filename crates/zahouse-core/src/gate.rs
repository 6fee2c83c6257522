//! Request classification for `/audit`: which mode to run in, whether an
//! upload needs an email first, and whether to pull live search results.

use thiserror::Error;

use crate::types::Mode;

const SEARCH_TRIGGERS: &[&str] = &[
    "latest",
    "current",
    "news",
    "today",
    "this week",
    "recent",
    "2024",
    "2025",
    "trending",
    "right now",
];

const MAX_EMAIL_LEN: usize = 254;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GateError {
    #[error("No message or file provided.")]
    EmptyRequest,
    #[error("An email address is required before uploading a contract.")]
    EmailRequired,
}

/// Fields of an incoming `/audit` request that drive the gating decisions.
#[derive(Debug, Clone, Default)]
pub struct AuditRequest {
    pub message: Option<String>,
    pub thread_id: Option<String>,
    pub email: Option<String>,
    pub search: Option<bool>,
    pub has_file: bool,
}

impl AuditRequest {
    /// The message with surrounding whitespace removed, if any is left.
    pub fn message(&self) -> Option<&str> {
        self.message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
    }
}

/// An upload always wins; otherwise a non-blank message means chat.
pub fn select_mode(req: &AuditRequest) -> Result<Mode, GateError> {
    if req.has_file {
        Ok(Mode::Audit)
    } else if req.message().is_some() {
        Ok(Mode::Chat)
    } else {
        Err(GateError::EmptyRequest)
    }
}

/// Returns the normalized email when one was supplied and is valid.
///
/// Only audit requests are gated, and only when `require_email` is set.
pub fn check_email_gate(
    mode: Mode,
    email: Option<&str>,
    require_email: bool,
) -> Result<Option<String>, GateError> {
    let normalized = email.map(normalize_email).filter(|e| is_valid_email(e));
    if mode == Mode::Audit && require_email && normalized.is_none() {
        return Err(GateError::EmailRequired);
    }
    Ok(normalized)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    if email.is_empty() || email.len() > MAX_EMAIL_LEN {
        return false;
    }
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|l| !l.is_empty())
}

/// Decide whether to run a live web search for this request.
pub fn should_search(
    mode: Mode,
    message: Option<&str>,
    explicit: Option<bool>,
    search_enabled: bool,
) -> bool {
    if !search_enabled {
        return false;
    }
    if let Some(flag) = explicit {
        return flag;
    }
    if mode != Mode::Chat {
        return false;
    }
    let Some(message) = message else {
        return false;
    };
    let lower = message.to_lowercase();
    SEARCH_TRIGGERS.iter().any(|t| lower.contains(t))
}

/// Echo the caller's thread id, or mint one tagged with the provider name.
pub fn thread_id_or_new(thread_id: Option<&str>, provider: &str) -> String {
    match thread_id.map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => t.to_string(),
        None => format!("{}_{}", provider, chrono::Utc::now().timestamp_millis()),
    }
}
