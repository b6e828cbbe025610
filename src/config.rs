use std::env;
use std::time::Duration;

use crate::transport::EndpointPair;

/// Upstream latency bound for task creation — the provider holds the
/// request open while it validates inputs.
pub const DEFAULT_CREATE_TIMEOUT: Duration = Duration::from_secs(55);

/// Latency bound for status queries — these repeat every tick, so keep
/// them tight.
pub const DEFAULT_STATUS_TIMEOUT: Duration = Duration::from_secs(10);

/// Latency bound for synchronous-style prompt submissions.
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(55);

/// Interval between status queries for one task.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct PromptFeatureConfig {
    pub endpoint: EndpointPair,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct VideoFeatureConfig {
    pub create: EndpointPair,
    /// Base status endpoint; the task id is appended per query.
    pub status: EndpointPair,
    pub create_timeout: Duration,
    pub status_timeout: Duration,
    pub poll_interval: Duration,
}

/// Explicit configuration passed into the session at construction —
/// endpoints and timeouts are never module globals.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub prompt: Option<PromptFeatureConfig>,
    pub video: Option<VideoFeatureConfig>,
}

impl Config {
    pub fn from_env() -> Self {
        let prompt = match env::var("MIRAGE_PROMPT_URL") {
            Ok(direct) => Some(PromptFeatureConfig {
                endpoint: EndpointPair {
                    direct,
                    proxy: env::var("MIRAGE_PROMPT_PROXY").ok(),
                },
                timeout: duration_var("MIRAGE_SUBMIT_TIMEOUT_SECS", DEFAULT_SUBMIT_TIMEOUT),
            }),
            Err(_) => {
                tracing::warn!("MIRAGE_PROMPT_URL not set — prompt generation unavailable");
                None
            }
        };

        let video = match (
            env::var("MIRAGE_VIDEO_CREATE_URL"),
            env::var("MIRAGE_VIDEO_STATUS_URL"),
        ) {
            (Ok(create), Ok(status)) => Some(VideoFeatureConfig {
                create: EndpointPair {
                    direct: create,
                    proxy: env::var("MIRAGE_VIDEO_CREATE_PROXY").ok(),
                },
                status: EndpointPair {
                    direct: status,
                    proxy: env::var("MIRAGE_VIDEO_STATUS_PROXY").ok(),
                },
                create_timeout: duration_var("MIRAGE_CREATE_TIMEOUT_SECS", DEFAULT_CREATE_TIMEOUT),
                status_timeout: duration_var("MIRAGE_STATUS_TIMEOUT_SECS", DEFAULT_STATUS_TIMEOUT),
                poll_interval: duration_var("MIRAGE_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL),
            }),
            _ => {
                tracing::warn!(
                    "MIRAGE_VIDEO_CREATE_URL/MIRAGE_VIDEO_STATUS_URL not set — video generation unavailable"
                );
                None
            }
        };

        if prompt.is_none() && video.is_none() {
            tracing::error!("no generation endpoints configured");
        }

        Config { prompt, video }
    }
}

fn duration_var(name: &str, default: Duration) -> Duration {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}
