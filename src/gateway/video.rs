use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::config::VideoFeatureConfig;
use crate::error::MirageError;
use crate::poll::{GenerationTask, StatusSource, TaskSnapshot};
use crate::transport::{EndpointPair, GenerationRequest, Transport};

/// Fields for one video task creation. The provider requires a source
/// image; everything else has conventional defaults.
#[derive(Debug, Clone)]
pub struct VideoTaskRequest {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub cfg_scale: f64,
    pub duration: u32,
    pub image_url: String,
    pub image_tail_url: Option<String>,
    pub mode: String,
    pub version: String,
}

impl VideoTaskRequest {
    pub fn new(prompt: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: None,
            cfg_scale: 0.5,
            duration: 5,
            image_url: image_url.into(),
            image_tail_url: None,
            mode: "std".to_string(),
            version: "1.0".to_string(),
        }
    }

    fn to_body(&self) -> Value {
        let mut body = serde_json::json!({
            "prompt": self.prompt,
            "cfg_scale": self.cfg_scale,
            "duration": self.duration,
            "image_url": self.image_url,
            "mode": self.mode,
            "version": self.version,
        });
        if let Some(negative) = &self.negative_prompt {
            body["negative_prompt"] = Value::String(negative.clone());
        }
        if let Some(tail) = &self.image_tail_url {
            body["image_tail_url"] = Value::String(tail.clone());
        }
        body
    }
}

/// Gateway for the asynchronous video feature: creates tasks and serves
/// as the poller's status source. Handles both task-created envelope
/// shapes — bare `{task_id, status}` and wrapped `{code, data, message}`.
pub struct VideoGateway {
    transport: Arc<dyn Transport>,
    create: EndpointPair,
    status: EndpointPair,
    create_timeout: Duration,
    status_timeout: Duration,
}

impl VideoGateway {
    pub fn new(transport: Arc<dyn Transport>, config: VideoFeatureConfig) -> Self {
        Self {
            transport,
            create: config.create,
            status: config.status,
            create_timeout: config.create_timeout,
            status_timeout: config.status_timeout,
        }
    }

    pub async fn create_task(
        &self,
        request: &VideoTaskRequest,
        cancel: CancellationToken,
    ) -> Result<GenerationTask, MirageError> {
        let outbound = GenerationRequest::post_json(
            self.create.clone(),
            request.to_body(),
            self.create_timeout,
            cancel,
        );

        let raw = self.transport.send(&outbound).await?;
        let value = raw.as_json().ok_or_else(|| {
            MirageError::UnexpectedResponse("task creation reply was not JSON".to_string())
        })?;
        let data = unwrap_envelope(value)?;

        let task_id = data
            .get("task_id")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                MirageError::UnexpectedResponse("task creation reply missing task_id".to_string())
            })?;

        tracing::info!(task_id, "video task created");
        Ok(GenerationTask::new(task_id))
    }

    fn status_target(&self, task_id: &str) -> EndpointPair {
        EndpointPair {
            direct: join_path(&self.status.direct, task_id),
            proxy: self
                .status
                .proxy
                .as_deref()
                .map(|proxy| join_path(proxy, task_id)),
        }
    }
}

#[async_trait]
impl StatusSource for VideoGateway {
    async fn fetch_status(&self, task_id: &str) -> Result<TaskSnapshot, MirageError> {
        let outbound = GenerationRequest::get(
            self.status_target(task_id),
            self.status_timeout,
            CancellationToken::new(),
        );

        let raw = self.transport.send(&outbound).await?;
        let value = raw.as_json().ok_or_else(|| {
            MirageError::UnexpectedResponse("status reply was not JSON".to_string())
        })?;
        let data = unwrap_envelope(value)?;

        let status = data.get("status").and_then(Value::as_str).ok_or_else(|| {
            MirageError::UnexpectedResponse("status reply missing status".to_string())
        })?;

        let video_url = data
            .pointer("/output/video_url")
            .and_then(Value::as_str)
            .map(str::to_string);
        let error = data
            .pointer("/error/message")
            .and_then(Value::as_str)
            .or_else(|| data.get("error").and_then(Value::as_str))
            .map(str::to_string);

        Ok(TaskSnapshot {
            status: status.to_string(),
            video_url,
            error,
        })
    }
}

/// Accepts both envelope shapes without special-casing callers: a reply
/// carrying a `code` field is the wrapped form (non-200 means the
/// provider rejected the request), anything else is the bare form.
fn unwrap_envelope(value: &Value) -> Result<&Value, MirageError> {
    let Some(code) = value.get("code").and_then(Value::as_i64) else {
        return Ok(value);
    };

    if code != 200 {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("provider rejected the request")
            .to_string();
        return Err(MirageError::ProviderFailure {
            code: Some(code),
            message,
        });
    }

    value.get("data").ok_or_else(|| {
        MirageError::UnexpectedResponse("envelope carries code 200 but no data".to_string())
    })
}

fn join_path(base: &str, id: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), id)
}
