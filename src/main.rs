use std::sync::Arc;

use anyhow::Context;

use mirage::config::Config;
use mirage::gateway::{PromptInputs, VideoTaskRequest};
use mirage::poll::TaskState;
use mirage::session::GenerationSession;
use mirage::transport::DirectProxyTransport;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    dotenvy::dotenv().ok();

    let mut args = std::env::args().skip(1);
    let mode = args.next().unwrap_or_else(|| "prompts".to_string());

    let config = Config::from_env();
    let transport = Arc::new(DirectProxyTransport::new());
    let session = GenerationSession::new(config, transport);

    match mode.as_str() {
        "prompts" => {
            let prompt = args
                .next()
                .context("usage: mirage prompts <prompt text>")?;
            let prompts = session
                .generate_prompts(PromptInputs::new().field("prompt", prompt))
                .await?;
            for line in prompts.iter() {
                println!("{line}");
            }
        }
        "video" => {
            let prompt = args
                .next()
                .context("usage: mirage video <prompt text> <image url>")?;
            let image_url = args
                .next()
                .context("usage: mirage video <prompt text> <image url>")?;

            let mut status = session.status();
            tokio::spawn(async move {
                while status.changed().await.is_ok() {
                    eprintln!("status: {}", *status.borrow());
                }
            });

            let state = session
                .generate_video(&VideoTaskRequest::new(prompt, image_url))
                .await?;
            if let TaskState::Completed { video_url } = state {
                println!("{video_url}");
            }
        }
        other => anyhow::bail!("unknown mode: {other} (expected 'prompts' or 'video')"),
    }

    Ok(())
}
