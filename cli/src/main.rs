//! CLI entrypoint for chatline
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chatline_application::{
    ChatRepository, ChatTurnController, ConversationCache, ConversationLogger,
    LoadConversationUseCase, NoConversationLogger, PersistenceGate, ProviderSet,
};
use chatline_domain::{Conversation, ConversationId, ConversationTurn, ModelId, PendingAttachment};
use chatline_infrastructure::{
    ConfigLoader, FileConfig, GeminiAdapter, HttpChatRepository, InMemoryChatRepository,
    InMemoryConversationCache, JsonlConversationLogger, OpenAiAdapter, PersistenceBackend,
    StaticIdentity, load_image,
};
use chatline_presentation::{
    AttachmentSource, ChatRepl, Cli, ConsoleTurnObserver, TerminalViewport,
};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOCAL_USER: &str = "local";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.show_config {
        ConfigLoader::print_config_sources();
        return Ok(());
    }

    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref()).context("Failed to load configuration")?
    };

    let _log_guard = init_logging(&cli, &config);
    info!("Starting chatline");

    check_config(&config)?;

    if cli.no_color || !config.repl.color {
        colored::control::set_override(false);
    }

    // === Dependency Injection ===
    let client = reqwest::Client::new();

    let providers = ProviderSet::new(
        Arc::new(OpenAiAdapter::new(
            client.clone(),
            config.providers.openai.to_settings(),
        )),
        Arc::new(GeminiAdapter::new(
            client.clone(),
            config.providers.gemini.to_settings(),
        )),
    );

    let cache: Arc<dyn ConversationCache> = Arc::new(InMemoryConversationCache::new());
    let user_id = config
        .persistence
        .user_id
        .clone()
        .filter(|u| !u.is_empty());

    let (conversation, repository) = match &cli.conversation {
        Some(id) => {
            let repository = open_repository(&config, client, user_id)?;
            let conversation = LoadConversationUseCase::new(repository.clone(), cache.clone())
                .execute(&ConversationId::new(id.as_str()))
                .await
                .with_context(|| format!("Failed to load conversation {}", id))?;
            (conversation, repository)
        }
        None => {
            // The chat API creates conversations itself; ones started here stay local.
            if config.persistence.backend == PersistenceBackend::Http {
                warn!("New conversations are kept in memory for this session");
            }
            let conversation =
                new_conversation(&cli, user_id.as_deref().unwrap_or(LOCAL_USER))?;
            let repository: Arc<dyn ChatRepository> =
                Arc::new(InMemoryChatRepository::new().with_conversation(conversation.clone()));
            (conversation, repository)
        }
    };

    let logger: Arc<dyn ConversationLogger> = match &config.logging.conversation_log {
        Some(path) => match JsonlConversationLogger::new(path) {
            Some(logger) => Arc::new(logger),
            None => Arc::new(NoConversationLogger),
        },
        None => Arc::new(NoConversationLogger),
    };

    let controller = ChatTurnController::new(
        conversation,
        providers,
        PersistenceGate::new(repository, cache),
        config.stream.to_stream_params(),
    )
    .with_viewport(Arc::new(TerminalViewport))
    .with_observer(Arc::new(ConsoleTurnObserver::new()))
    .with_logger(logger);

    let mut repl = ChatRepl::new(Arc::new(controller)).with_attachments(Arc::new(LocalImages));
    if let Some(path) = &config.repl.history_file {
        repl = repl.with_history_file(Some(PathBuf::from(path)));
    }
    repl.run().await?;

    Ok(())
}

/// Install the `tracing` subscriber.
///
/// `-v` wins over `logging.filter`. With `logging.file` set, output goes to
/// that file through a non-blocking writer whose guard must outlive `main`.
fn init_logging(cli: &Cli, config: &FileConfig) -> Option<WorkerGuard> {
    let filter = if cli.verbose > 0 {
        EnvFilter::new(cli.log_filter())
    } else {
        config
            .logging
            .filter
            .as_deref()
            .and_then(|f| EnvFilter::try_new(f).ok())
            .unwrap_or_else(|| EnvFilter::new(cli.log_filter()))
    };

    let file = config.logging.file.as_deref().map(Path::new);
    match file.and_then(|f| Some((f.parent()?, f.file_name()?))) {
        Some((dir, name)) => {
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}

fn open_repository(
    config: &FileConfig,
    client: reqwest::Client,
    user_id: Option<String>,
) -> Result<Arc<dyn ChatRepository>> {
    match config.persistence.backend {
        PersistenceBackend::Http => {
            let identity = match user_id {
                Some(user) => StaticIdentity::new(user, config.persistence.resolve_token()),
                None => StaticIdentity::anonymous(),
            };
            Ok(Arc::new(HttpChatRepository::new(
                client,
                config.persistence.api_url.clone(),
                Arc::new(identity),
            )))
        }
        // A fresh memory store holds nothing that could be opened by id.
        PersistenceBackend::Memory => bail!(
            "--conversation needs persistence.backend = \"http\"; \
             the memory backend only holds conversations started with --new"
        ),
    }
}

/// Log configuration issues, failing on those that would break every turn.
fn check_config(config: &FileConfig) -> Result<()> {
    let mut fatal = Vec::new();
    for issue in config.validate() {
        if issue.is_fatal() {
            fatal.push(issue.to_string());
        } else {
            warn!("Config: {}", issue);
        }
    }
    if !fatal.is_empty() {
        bail!("Invalid configuration: {}", fatal.join("; "));
    }
    Ok(())
}

/// A conversation started from the command line, seeded with `--new` text.
fn new_conversation(cli: &Cli, user_id: &str) -> Result<Conversation> {
    let model: ModelId = cli.model.parse()?;
    let id = format!("local-{}", chrono::Utc::now().timestamp_millis());
    let mut conversation = Conversation::new(id.as_str(), user_id, model);
    if let Some(text) = cli.new.as_deref().filter(|t| !t.trim().is_empty()) {
        conversation = conversation.with_history(vec![ConversationTurn::user(text)]);
    }
    Ok(conversation)
}

/// Images read from the local filesystem.
struct LocalImages;

#[async_trait]
impl AttachmentSource for LocalImages {
    async fn load(
        &self,
        path: &Path,
        stored_path: Option<String>,
    ) -> Result<PendingAttachment, String> {
        load_image(path, stored_path).await.map_err(|e| e.to_string())
    }
}
