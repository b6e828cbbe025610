//! Caller-facing composition: one session per user action, owning the
//! cancellation token and the UI-visible status line. The UI layer only
//! ever sees this type and the watch channels it exposes.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, DEFAULT_POLL_INTERVAL};
use crate::error::MirageError;
use crate::gateway::{PromptGateway, PromptInputs, VideoGateway, VideoTaskRequest};
use crate::normalize::{ExtractStrategy, PromptList};
use crate::poll::{TaskPoller, TaskState};
use crate::transport::Transport;

pub struct GenerationSession {
    prompt: Option<PromptGateway>,
    video: Option<VideoGateway>,
    poller: TaskPoller,
    cancel: CancellationToken,
    status: watch::Sender<String>,
    // Hold the initial receiver so the status sender always has a live
    // receiver; tokio's `watch::Sender::send` is a no-op that leaves the
    // value unchanged when the receiver count is zero.
    _status_keepalive: watch::Receiver<String>,
}

impl GenerationSession {
    pub fn new(config: Config, transport: Arc<dyn Transport>) -> Self {
        let prompt = config.prompt.map(|feature| {
            PromptGateway::new(
                Arc::clone(&transport),
                feature.endpoint,
                ExtractStrategy::default(),
                feature.timeout,
            )
        });

        let poll_interval = config
            .video
            .as_ref()
            .map(|feature| feature.poll_interval)
            .unwrap_or(DEFAULT_POLL_INTERVAL);
        let video = config
            .video
            .map(|feature| VideoGateway::new(Arc::clone(&transport), feature));

        let (status, status_keepalive) = watch::channel("idle".to_string());

        Self {
            prompt,
            video,
            poller: TaskPoller::new(poll_interval),
            cancel: CancellationToken::new(),
            status,
            _status_keepalive: status_keepalive,
        }
    }

    /// Replace the poller, e.g. to inject a timer in tests.
    pub fn with_poller(mut self, poller: TaskPoller) -> Self {
        self.poller = poller;
        self
    }

    /// Subscribe to the UI-visible status line.
    pub fn status(&self) -> watch::Receiver<String> {
        self.status.subscribe()
    }

    /// Abort the in-flight action: stops the transport call (the proxy
    /// fallback never starts) and stops polling within one tick.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn generate_prompts(&self, inputs: PromptInputs) -> Result<PromptList, MirageError> {
        let gateway = self
            .prompt
            .as_ref()
            .ok_or(MirageError::NotConfigured("prompt"))?;

        self.set_status("submitting");
        match gateway.submit(inputs, self.cancel.child_token()).await {
            Ok(prompts) => {
                self.set_status(format!("received {} prompt(s)", prompts.len()));
                Ok(prompts)
            }
            Err(err) => {
                self.set_status(err.user_message());
                Err(err)
            }
        }
    }

    /// Submit a video task and poll it to its terminal state. Returns
    /// `Ok(TaskState::Completed { .. })` on success; a provider-reported
    /// failure and a caller cancellation surface as distinct errors.
    pub async fn generate_video(
        &self,
        request: &VideoTaskRequest,
    ) -> Result<TaskState, MirageError> {
        let gateway = self
            .video
            .as_ref()
            .ok_or(MirageError::NotConfigured("video"))?;

        self.set_status("submitting video task");
        let task = match gateway.create_task(request, self.cancel.child_token()).await {
            Ok(task) => task,
            Err(err) => {
                self.set_status(err.user_message());
                return Err(err);
            }
        };
        self.set_status(status_line(&task.state));

        let (states, mut observed) = watch::channel(task.state.clone());
        let track = async {
            // Moving the sender in lets the bridge loop end when
            // tracking completes and the channel closes.
            let states = states;
            self.poller.track(gateway, &task, &self.cancel, &states).await
        };
        let bridge = async {
            while observed.changed().await.is_ok() {
                let line = status_line(&observed.borrow());
                self.set_status(line);
            }
        };
        let (final_state, ()) = tokio::join!(track, bridge);
        self.set_status(status_line(&final_state));

        match final_state {
            TaskState::Completed { .. } => Ok(final_state),
            TaskState::Cancelled => Err(MirageError::Cancelled),
            TaskState::Failed { reason } => Err(MirageError::ProviderFailure {
                code: None,
                message: reason,
            }),
            other => Err(MirageError::UnexpectedResponse(format!(
                "polling stopped in non-terminal state: {other:?}"
            ))),
        }
    }

    fn set_status(&self, line: impl Into<String>) {
        let _ = self.status.send(line.into());
    }
}

fn status_line(state: &TaskState) -> String {
    match state {
        TaskState::Pending => "waiting for the provider to accept the task".to_string(),
        TaskState::InProgress { status } => format!("generating: {status}"),
        TaskState::Completed { .. } => "generation complete".to_string(),
        TaskState::Failed { reason } => format!("generation failed: {reason}"),
        TaskState::Cancelled => "cancelled".to_string(),
    }
}
