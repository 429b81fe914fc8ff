//! Fail-closed wrapper around a moderation backend
//!
//! Every attempt is bounded by a timeout and the whole call by a retry
//! budget. When the budget is spent the caller gets the censorship marker
//! together with the last error, which it is expected to log and move on.

use std::sync::Arc;
use std::time::Duration;

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::moderation::backend::{ModerationBackend, ModerationRequest, SummaryRequest};
use crate::moderation::verdict::{parse_verdict, Verdict};

/// Result of a gateway call. `content` is always safe to broadcast.
#[derive(Debug)]
pub struct Moderated {
    pub content: String,
    /// Set when the marker was substituted because the backend failed
    pub failure: Option<RelayError>,
}

impl Moderated {
    fn ok(content: String) -> Self {
        Self {
            content,
            failure: None,
        }
    }

    pub fn failed_closed(&self) -> bool {
        self.failure.is_some()
    }
}

pub struct ModerationGateway {
    backend: Arc<dyn ModerationBackend>,
    timeout: Duration,
    retries: u32,
    censor_marker: String,
}

impl ModerationGateway {
    pub fn new(
        backend: Arc<dyn ModerationBackend>,
        timeout: Duration,
        retries: u32,
        censor_marker: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            timeout,
            retries,
            censor_marker: censor_marker.into(),
        }
    }

    pub fn from_config(backend: Arc<dyn ModerationBackend>, config: &RelayConfig) -> Self {
        Self::new(
            backend,
            config.moderation_timeout,
            config.moderation_retries,
            config.censor_marker.clone(),
        )
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Judge a chat message. Never fails; see [`Moderated`].
    pub async fn moderate(&self, content: &str) -> Moderated {
        let request = ModerationRequest::Message {
            content: content.to_string(),
        };

        match self.call_with_budget(&request, parse_verdict).await {
            Ok(Verdict::Pass) => Moderated::ok(content.to_string()),
            Ok(Verdict::Rewrite(text)) => Moderated::ok(text),
            Ok(Verdict::Censor(Some(reason))) => {
                Moderated::ok(format!("[Message Censored: {}]", reason))
            }
            Ok(Verdict::Censor(None)) => Moderated::ok(self.censor_marker.clone()),
            Err(e) => self.fail_closed(e),
        }
    }

    /// Recommendation summary for the given event details
    pub async fn summarize(&self, summary: &SummaryRequest) -> Moderated {
        let request = ModerationRequest::Summary(summary.clone());

        let parse = |raw: &str| {
            let text = raw.trim();
            if text.is_empty() {
                Err(RelayError::MalformedVerdict("empty summary".to_string()))
            } else {
                Ok(text.to_string())
            }
        };

        match self.call_with_budget(&request, parse).await {
            Ok(text) => Moderated::ok(text),
            Err(e) => self.fail_closed(e),
        }
    }

    fn fail_closed(&self, error: RelayError) -> Moderated {
        Moderated {
            content: self.censor_marker.clone(),
            failure: Some(error),
        }
    }

    async fn call_with_budget<T, P>(&self, request: &ModerationRequest, parse: P) -> Result<T>
    where
        P: Fn(&str) -> Result<T>,
    {
        let attempts = self.retries + 1;
        let mut last_error = RelayError::ModerationFailure("no attempt made".to_string());

        for attempt in 1..=attempts {
            let outcome = match tokio::time::timeout(self.timeout, self.backend.call(request)).await {
                Ok(Ok(raw)) => parse(&raw),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(RelayError::ModerationTimeout(self.timeout)),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) => {
                    log::warn!(
                        "Moderation attempt {}/{} via {} backend failed: {}",
                        attempt,
                        attempts,
                        self.backend.name(),
                        e
                    );
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const MARKER: &str = "[message restricted]";

    /// Replays scripted responses, repeating the last one
    struct ScriptedBackend {
        responses: Vec<Result<String>>,
        calls: AtomicUsize,
        delay: Option<Duration>,
    }

    impl ScriptedBackend {
        fn new(responses: Vec<Result<String>>) -> Self {
            Self {
                responses,
                calls: AtomicUsize::new(0),
                delay: None,
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::new(vec![Ok("too late".to_string())])
            }
        }
    }

    #[async_trait]
    impl ModerationBackend for ScriptedBackend {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn call(&self, _request: &ModerationRequest) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let index = n.min(self.responses.len() - 1);
            match &self.responses[index] {
                Ok(raw) => Ok(raw.clone()),
                Err(e) => Err(RelayError::ModerationFailure(e.to_string())),
            }
        }
    }

    fn gateway(backend: Arc<ScriptedBackend>) -> ModerationGateway {
        ModerationGateway::new(backend, Duration::from_secs(2), 1, MARKER)
    }

    #[tokio::test]
    async fn test_verdicts_are_applied() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok("hello\n".to_string())]));
        let result = gateway(backend).moderate("hello").await;
        assert_eq!(result.content, "hello");
        assert!(!result.failed_closed());

        let backend = Arc::new(ScriptedBackend::new(vec![Ok("NSFW".to_string())]));
        let result = gateway(backend).moderate("something rude").await;
        assert_eq!(result.content, MARKER);
        assert!(!result.failed_closed());

        let backend = Arc::new(ScriptedBackend::new(vec![Ok(
            r#"{"safe": false, "reason": "threat"}"#.to_string(),
        )]));
        let result = gateway(backend).moderate("something worse").await;
        assert_eq!(result.content, "[Message Censored: threat]");
    }

    #[tokio::test]
    async fn test_single_retry_recovers() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Err(RelayError::ModerationFailure("connection reset".to_string())),
            Ok("fine".to_string()),
        ]));
        let result = gateway(backend.clone()).moderate("fine").await;
        assert_eq!(result.content, "fine");
        assert!(result.failure.is_none());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unreachable_backend_fails_closed() {
        let backend = Arc::new(ScriptedBackend::new(vec![Err(RelayError::ModerationFailure(
            "connection refused".to_string(),
        ))]));
        let result = gateway(backend.clone()).moderate("hello").await;
        assert_eq!(result.content, MARKER);
        assert!(matches!(result.failure, Some(RelayError::ModerationFailure(_))));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_malformed_output_fails_closed() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok("   ".to_string())]));
        let result = gateway(backend).moderate("hello").await;
        assert_eq!(result.content, MARKER);
        assert!(matches!(result.failure, Some(RelayError::MalformedVerdict(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_backend_times_out() {
        let backend = Arc::new(ScriptedBackend::slow(Duration::from_secs(3600)));
        let started = tokio::time::Instant::now();
        let result = gateway(backend.clone()).moderate("hello").await;

        assert_eq!(result.content, MARKER);
        assert!(matches!(result.failure, Some(RelayError::ModerationTimeout(_))));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_summary_mode() {
        let request = SummaryRequest {
            destination: "Homestead".to_string(),
            weather: "heavy rain".to_string(),
            special_notes: "shelter at the high school".to_string(),
            event_type: "flooding".to_string(),
            user_type: "official".to_string(),
        };

        let backend = Arc::new(ScriptedBackend::new(vec![Ok(
            "Flooding in Homestead; shelter open.\n".to_string(),
        )]));
        let result = gateway(backend).summarize(&request).await;
        assert_eq!(result.content, "Flooding in Homestead; shelter open.");

        let backend = Arc::new(ScriptedBackend::new(vec![Ok(String::new())]));
        let result = gateway(backend).summarize(&request).await;
        assert_eq!(result.content, MARKER);
        assert!(result.failed_closed());
    }
}
