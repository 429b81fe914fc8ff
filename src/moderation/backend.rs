//! Moderation backends
//!
//! A backend turns a [`ModerationRequest`] into raw text. Interpreting that
//! text, bounding the call in time and failing closed is the gateway's job.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::process::Command;

use crate::config::ModerationSource;
use crate::error::{RelayError, Result};

/// Inputs for the recommendation summary mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRequest {
    pub destination: String,
    pub weather: String,
    pub special_notes: String,
    pub event_type: String,
    /// `volunteer` or `official`; other values get the generic prompt
    pub user_type: String,
}

/// One call to the moderation capability
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ModerationRequest {
    Message { content: String },
    Summary(SummaryRequest),
}

impl ModerationRequest {
    /// Launcher argv contract: `message <content>` or
    /// `summary <destination> <weather> <special_notes> <event_type> <user_type>`
    pub fn to_args(&self) -> Vec<&str> {
        match self {
            Self::Message { content } => vec!["message", content.as_str()],
            Self::Summary(summary) => vec![
                "summary",
                summary.destination.as_str(),
                summary.weather.as_str(),
                summary.special_notes.as_str(),
                summary.event_type.as_str(),
                summary.user_type.as_str(),
            ],
        }
    }
}

/// Trait for moderation backends
#[async_trait]
pub trait ModerationBackend: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Raw backend output for the request
    async fn call(&self, request: &ModerationRequest) -> Result<String>;
}

/// Runs a launcher program once per request and reads its stdout
pub struct CommandBackend {
    program: String,
}

impl CommandBackend {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl ModerationBackend for CommandBackend {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn call(&self, request: &ModerationRequest) -> Result<String> {
        // The child is killed if the gateway times out and drops this future
        let output = Command::new(&self.program)
            .args(request.to_args())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                RelayError::ModerationFailure(format!("failed to run '{}': {}", self.program, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RelayError::ModerationFailure(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        String::from_utf8(output.stdout).map_err(|e| {
            RelayError::MalformedVerdict(format!("launcher output is not UTF-8: {}", e))
        })
    }
}

/// POSTs the request as JSON and reads the response body
pub struct HttpBackend {
    client: reqwest::Client,
    endpoint: url::Url,
}

impl HttpBackend {
    pub fn new(endpoint: url::Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl ModerationBackend for HttpBackend {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn call(&self, request: &ModerationRequest) -> Result<String> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }
}

/// Approves every message unchanged. Development only.
pub struct PassthroughBackend;

#[async_trait]
impl ModerationBackend for PassthroughBackend {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    async fn call(&self, request: &ModerationRequest) -> Result<String> {
        match request {
            ModerationRequest::Message { content } => Ok(content.clone()),
            ModerationRequest::Summary(_) => Err(RelayError::ModerationFailure(
                "summaries need a moderation command or URL".to_string(),
            )),
        }
    }
}

/// Build the backend selected by configuration
pub fn backend_from_source(source: &ModerationSource) -> Arc<dyn ModerationBackend> {
    match source {
        ModerationSource::Command(program) => Arc::new(CommandBackend::new(program.clone())),
        ModerationSource::Http(endpoint) => Arc::new(HttpBackend::new(endpoint.clone())),
        ModerationSource::Passthrough => Arc::new(PassthroughBackend),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> SummaryRequest {
        SummaryRequest {
            destination: "Key Biscayne".to_string(),
            weather: "tropical storm".to_string(),
            special_notes: "bridge closed".to_string(),
            event_type: "evacuation".to_string(),
            user_type: "volunteer".to_string(),
        }
    }

    #[test]
    fn test_launcher_args() {
        let message = ModerationRequest::Message {
            content: "hello".to_string(),
        };
        assert_eq!(message.to_args(), vec!["message", "hello"]);

        let summary = ModerationRequest::Summary(summary());
        assert_eq!(
            summary.to_args(),
            vec![
                "summary",
                "Key Biscayne",
                "tropical storm",
                "bridge closed",
                "evacuation",
                "volunteer"
            ]
        );
    }

    #[test]
    fn test_http_body_shape() {
        let message = ModerationRequest::Message {
            content: "hello".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            serde_json::json!({"mode": "message", "content": "hello"})
        );

        let body = serde_json::to_value(ModerationRequest::Summary(summary())).unwrap();
        assert_eq!(body["mode"], "summary");
        assert_eq!(body["destination"], "Key Biscayne");
        assert_eq!(body["user_type"], "volunteer");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_backend_reads_stdout() {
        let backend = CommandBackend::new("echo");
        let raw = backend
            .call(&ModerationRequest::Message {
                content: "hello".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(raw.trim(), "message hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_backend_failures() {
        let request = ModerationRequest::Message {
            content: "hello".to_string(),
        };

        let missing = CommandBackend::new("/nonexistent/launcher.sh").call(&request).await;
        assert!(matches!(missing, Err(RelayError::ModerationFailure(_))));

        let failing = CommandBackend::new("false").call(&request).await;
        assert!(matches!(failing, Err(RelayError::ModerationFailure(_))));
    }

    #[tokio::test]
    async fn test_http_backend_posts_json() {
        use warp::Filter;

        let route = warp::post()
            .and(warp::path("check"))
            .and(warp::body::json())
            .map(|body: serde_json::Value| {
                let content = body["content"].as_str().unwrap_or("");
                format!("{{\"safe\": true, \"message\": \"{}!\"}}", content)
            });
        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);

        let endpoint = url::Url::parse(&format!("http://{}/check", addr)).unwrap();
        let raw = HttpBackend::new(endpoint)
            .call(&ModerationRequest::Message {
                content: "hi".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(raw, r#"{"safe": true, "message": "hi!"}"#);
    }

    #[tokio::test]
    async fn test_http_backend_unreachable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let endpoint = url::Url::parse(&format!("http://{}/check", addr)).unwrap();
        let result = HttpBackend::new(endpoint)
            .call(&ModerationRequest::Message {
                content: "hi".to_string(),
            })
            .await;
        assert!(matches!(result, Err(RelayError::ModerationFailure(_))));
    }

    #[tokio::test]
    async fn test_passthrough() {
        let raw = PassthroughBackend
            .call(&ModerationRequest::Message {
                content: "hi".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(raw, "hi");
        assert!(PassthroughBackend
            .call(&ModerationRequest::Summary(summary()))
            .await
            .is_err());
    }
}
