//! Shared CLI helpers: config loading and wiring of the assistant.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use sidekick::agent::{ContextBuilder, Orchestrator};
use sidekick::channels::{ReplyTarget, TelegramTransport};
use sidekick::config::Config;
use sidekick::providers::openai::OPENAI_API_URL;
use sidekick::providers::{ChatOptions, LLMProvider, OpenAIProvider};
use sidekick::schedule::ScheduleEngine;
use sidekick::search::{SearchBackend, YandexSearch};
use sidekick::state::{AgentState, FileStore};
use sidekick::tools::{assistant_tools, ToolDeps};
use sidekick::transcription::{Transcriber, TranscriberService};
use sidekick::utils::http::build_http_client;

/// Load config from `path`, or from `~/.sidekick/config.json` when unset.
pub(crate) fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Config::load().with_context(|| "Failed to load configuration"),
    }
}

/// Chat options shared by every model call.
pub(crate) fn chat_options(config: &Config) -> ChatOptions {
    let mut options = ChatOptions::new();
    if let Some(max_tokens) = config.agent.max_tokens {
        options = options.with_max_tokens(max_tokens);
    }
    if let Some(temperature) = config.agent.temperature {
        options = options.with_temperature(temperature);
    }
    options
}

/// Load persisted state from the configured data directory.
pub(crate) async fn load_state(config: &Config) -> Arc<AgentState> {
    let store = Arc::new(FileStore::new(config.data_dir()));
    Arc::new(AgentState::load(store, config.agent.history_window).await)
}

/// Every long-lived collaborator of a running assistant.
pub(crate) struct Assistant {
    pub transport: Arc<TelegramTransport>,
    pub orchestrator: Arc<Orchestrator>,
    pub engine: Arc<ScheduleEngine>,
    pub transcriber: Option<Arc<dyn Transcriber>>,
    pub owner_id: i64,
}

/// Build the assistant from a validated config.
pub(crate) async fn build_assistant(config: &Config) -> Result<Assistant> {
    let api_key = config
        .openai_api_key()
        .context("providers.openai.api_key is not set")?;
    let owner_id = config
        .telegram
        .allow_from
        .context("telegram.allow_from is not set")?;

    let proxy = config.telegram.proxy.as_deref();
    let client = build_http_client(proxy)?;

    let api_base = config
        .providers
        .openai
        .api_base
        .as_deref()
        .unwrap_or(OPENAI_API_URL);
    let provider: Arc<dyn LLMProvider> =
        Arc::new(OpenAIProvider::with_client(api_key, api_base, client.clone()));

    let search = YandexSearch::from_config(config, client.clone())
        .map(|backend| Arc::new(backend) as Arc<dyn SearchBackend>);
    if search.is_none() {
        info!("Search API key not set, search tool disabled");
    }

    let transcriber = TranscriberService::from_config(config, client)
        .map(|service| Arc::new(service) as Arc<dyn Transcriber>);
    if transcriber.is_none() {
        info!("Voice transcription disabled");
    }

    let transport = Arc::new(TelegramTransport::new(&config.telegram.token, proxy)?);
    let state = load_state(config).await;
    let context = ContextBuilder::new();
    let options = chat_options(config);

    let tools = assistant_tools(ToolDeps {
        state: state.clone(),
        provider: provider.clone(),
        search,
        context: context.clone(),
        think_model: config.agent.think_model.clone(),
    });
    info!(tools = ?tools.names(), "Registered tools");

    let orchestrator = Orchestrator::new(
        provider.clone(),
        Arc::new(tools),
        state.clone(),
        &config.agent.model,
    )
    .with_context(context.clone())
    .with_options(options.clone())
    .with_max_tool_rounds(config.agent.max_tool_rounds);

    let engine = ScheduleEngine::new(
        state,
        provider,
        transport.clone(),
        ReplyTarget::chat(owner_id),
        &config.agent.schedule_model,
    )
    .with_interval(Duration::from_secs(config.schedule.interval_secs))
    .with_context(context)
    .with_options(options);

    Ok(Assistant {
        transport,
        orchestrator: Arc::new(orchestrator),
        engine: Arc::new(engine),
        transcriber,
        owner_id,
    })
}

/// Fail with every problem `Config::validate` reports.
pub(crate) fn ensure_valid(config: &Config) -> Result<()> {
    let problems = config.validate();
    if problems.is_empty() {
        return Ok(());
    }
    anyhow::bail!("Configuration is incomplete:\n  - {}", problems.join("\n  - "))
}
