use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::ProviderError;

/// Send a prepared request and decode a 2xx JSON body.
pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: &'static str,
    timeout_secs: u64,
    request: reqwest::RequestBuilder,
) -> Result<T, ProviderError> {
    let response = match request.send().await {
        Ok(r) => r,
        Err(e) if e.is_timeout() => {
            warn!(provider, timeout_secs, "provider request timed out");
            return Err(ProviderError::Timeout {
                provider,
                secs: timeout_secs,
            });
        },
        Err(e) => {
            warn!(provider, "provider request failed: {}", e);
            return Err(ProviderError::Transport {
                provider,
                message: e.to_string(),
            });
        },
    };

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(provider, status = %status, "provider returned non-2xx: {}", body);
        return Err(ProviderError::Status {
            provider,
            status: status.as_u16(),
            message: error_message(&body),
        });
    }

    let body = response.text().await.map_err(|e| ProviderError::Transport {
        provider,
        message: e.to_string(),
    })?;
    serde_json::from_str(&body).map_err(|e| ProviderError::Parse {
        provider,
        message: e.to_string(),
    })
}

/// All three providers wrap failures as `{"error": {"message": ...}}`.
/// Anything else is passed through as-is.
pub(crate) fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::error_message;

    #[test]
    fn extracts_nested_error_message() {
        let body = r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#;
        assert_eq!(error_message(body), "invalid x-api-key");
    }

    #[test]
    fn falls_back_to_raw_body() {
        assert_eq!(error_message(" upstream overloaded \n"), "upstream overloaded");
        assert_eq!(error_message(r#"{"detail":"nope"}"#), r#"{"detail":"nope"}"#);
    }
}
