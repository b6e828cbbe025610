use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::MirageError;
use crate::normalize::{ExtractStrategy, PromptList, normalize};
use crate::transport::{EndpointPair, GenerationRequest, Part, RawBody, Transport};

/// Binary image input for features that accept an uploaded image.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub mime: String,
}

/// Feature inputs for a synchronous-style submission: scalar fields plus
/// an optional image. The presence of the image decides multipart vs JSON.
#[derive(Debug, Clone, Default)]
pub struct PromptInputs {
    fields: Vec<(String, String)>,
    image: Option<ImageInput>,
}

impl PromptInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn image(
        mut self,
        bytes: Vec<u8>,
        filename: impl Into<String>,
        mime: impl Into<String>,
    ) -> Self {
        self.image = Some(ImageInput {
            bytes,
            filename: filename.into(),
            mime: mime.into(),
        });
        self
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }
}

/// Gateway for prompt/analysis generation features: submit inputs, get a
/// [`PromptList`] back. One instance per feature, differing only in
/// endpoint and extraction strategy.
pub struct PromptGateway {
    transport: Arc<dyn Transport>,
    endpoint: EndpointPair,
    strategy: ExtractStrategy,
    timeout: Duration,
    allow_empty: bool,
}

impl PromptGateway {
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoint: EndpointPair,
        strategy: ExtractStrategy,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            endpoint,
            strategy,
            timeout,
            allow_empty: false,
        }
    }

    /// Features whose providers legitimately return nothing (no match
    /// found) opt out of the zero-artifact error.
    pub fn allow_empty(mut self) -> Self {
        self.allow_empty = true;
        self
    }

    pub async fn submit(
        &self,
        inputs: PromptInputs,
        cancel: CancellationToken,
    ) -> Result<PromptList, MirageError> {
        let outbound = match inputs.image {
            Some(image) => {
                let mut parts = vec![Part::bytes("image", image.bytes, image.filename, image.mime)];
                for (name, value) in inputs.fields {
                    parts.push(Part::text(name, value));
                }
                GenerationRequest::post_multipart(self.endpoint.clone(), parts, self.timeout, cancel)
            }
            None => {
                let mut object = serde_json::Map::new();
                for (name, value) in inputs.fields {
                    object.insert(name, Value::String(value));
                }
                GenerationRequest::post_json(
                    self.endpoint.clone(),
                    Value::Object(object),
                    self.timeout,
                    cancel,
                )
            }
        };

        let raw = self.transport.send(&outbound).await?;

        let payload = match raw.body {
            RawBody::Json(value) => value,
            RawBody::Text(text) => Value::String(text),
            RawBody::Binary(_) => {
                return Err(MirageError::UnexpectedResponse(
                    "binary reply where prompt text was expected".to_string(),
                ));
            }
        };

        let prompts = normalize(&payload, &self.strategy);
        if prompts.is_empty() && !self.allow_empty {
            return Err(MirageError::UnexpectedResponse(
                "no prompts found in provider reply".to_string(),
            ));
        }

        tracing::debug!(count = prompts.len(), "prompts extracted");
        Ok(prompts)
    }
}
