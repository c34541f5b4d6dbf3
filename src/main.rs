use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;

use vox_scribe::config::TransportKind;
use vox_scribe::session::TransportFactory;
use vox_scribe::{
    create_router, AppState, Config, HttpTranscriber, LoopbackTransport, OllamaSummarizer,
    SessionRegistry, WebhookPoster,
};

#[derive(Debug, Parser)]
#[command(name = "vox-scribe", about = "Voice session recorder and recap service")]
struct Args {
    /// Config file (without extension, per the config crate)
    #[arg(long, default_value = "config/vox-scribe")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("{} starting", cfg.service.name);
    info!("session artifacts under {}", cfg.storage.sessions_path);

    let transports = transport_factory(&cfg)?;

    let transcriber = Arc::new(HttpTranscriber::new(
        &cfg.transcriber.url,
        Duration::from_secs(cfg.transcriber.timeout_secs),
    )?);
    let summarizer = Arc::new(OllamaSummarizer::new(
        &cfg.summarizer.url,
        &cfg.summarizer.model,
        Duration::from_secs(cfg.summarizer.timeout_secs),
    )?);
    let poster = Arc::new(WebhookPoster::new(
        &cfg.delivery.webhook_url,
        cfg.delivery.message_limit,
    )?);

    let registry = Arc::new(SessionRegistry::new(
        &cfg,
        transports,
        transcriber,
        summarizer,
        poster,
    ));

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;

    info!("listening on {addr}");

    let router = create_router(AppState::new(registry));
    axum::serve(listener, router).await?;

    Ok(())
}

fn transport_factory(cfg: &Config) -> Result<TransportFactory> {
    match cfg.voice.transport {
        TransportKind::Loopback => {
            let fixture = cfg
                .voice
                .loopback_fixture
                .clone()
                .context("voice.loopback_fixture is required for the loopback transport")?;
            let fixture = PathBuf::from(fixture);
            let factory: TransportFactory = Arc::new(move |_room: &str| {
                Ok(Box::new(LoopbackTransport::new(fixture.clone()))
                    as Box<dyn vox_scribe::VoiceTransport>)
            });
            Ok(factory)
        }
        TransportKind::Gateway => {
            bail!(
                "the gateway voice transport requires a platform SDK integration; \
                 set voice.transport = \"loopback\" for local use"
            )
        }
    }
}
