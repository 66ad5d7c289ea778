//! Parlo server — conversational language-practice backend.
//!
//! Wires the concrete providers into the orchestrator and serves the REST API.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use parlo_core::cache::ResponseCache;
use parlo_core::config::ParloConfig;
use parlo_core::gateway::TranscriptionGateway;
use parlo_core::orchestrator::Orchestrator;
use parlo_core::scenario::ScenarioCatalog;
use parlo_core::session::SessionContextStore;
use parlo_hub::api::{self, ApiState};
use parlo_hub::providers::{GoogleTts, LlmTranslator, OpenAiCompletion, WhisperTranscriber};

/// Parlo — practice a language by talking to it.
#[derive(Parser)]
#[command(name = "parlo", version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to the platform config dir).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind host (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Completion provider API key (overrides config).
    #[arg(long, env = "PARLO_API_KEY")]
    api_key: Option<String>,

    /// Model identifier (overrides config).
    #[arg(short, long)]
    model: Option<String>,

    /// Speech-to-text API key; enables the audio input route.
    #[arg(long, env = "PARLO_STT_API_KEY")]
    stt_api_key: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,parlo_core=debug,parlo_hub=debug")),
        )
        .init();

    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(ParloConfig::default_path);
    let mut config = ParloConfig::load(&config_path)?;
    info!("Loaded config from {}", config_path.display());

    if let Some(api_key) = cli.api_key {
        config.provider.api_key = Some(api_key);
    }
    if let Some(model) = cli.model {
        config.provider.model = model;
    }
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(stt_api_key) = cli.stt_api_key {
        let mut stt = config.stt.take().unwrap_or_else(|| parlo_core::config::SttConfig {
            api_key: String::new(),
            model: "whisper-1".to_string(),
            api_base: None,
            language: None,
        });
        stt.api_key = stt_api_key;
        config.stt = Some(stt);
    }

    if config.provider.api_key.is_none() {
        warn!("No completion API key configured; upstream calls will be rejected");
    }

    let completion: Arc<OpenAiCompletion> = Arc::new(OpenAiCompletion::new(config.provider.clone()));
    let translator = LlmTranslator::new(completion.clone());
    let tts = GoogleTts::new(&config.speech.language);

    let orchestrator = Arc::new(Orchestrator::new(
        ScenarioCatalog::with_builtins(),
        completion,
        Arc::new(translator),
        Arc::new(tts),
        SessionContextStore::new(config.session.clone()),
        ResponseCache::new(config.cache.clone()),
        config.conversation.clone(),
    ));

    let transcriber: Option<Arc<dyn TranscriptionGateway>> = config.stt.as_ref().map(|stt| {
        info!("Audio input enabled (model: {})", stt.model);
        Arc::new(WhisperTranscriber::new(stt.clone())) as Arc<dyn TranscriptionGateway>
    });

    let state = ApiState {
        orchestrator,
        transcriber,
    };

    api::start_server(state, &config.server.host, config.server.port).await
}
