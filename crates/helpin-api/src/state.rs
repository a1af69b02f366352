//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by the REST API.
//! Services are generic over repository/invoker/store traits, but AppState
//! pins them to the concrete infra implementations.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use helpin_core::clock::SystemClock;
use helpin_core::conversation::ConversationStore;
use helpin_core::gateway::{ChatGateway, GatewaySettings};
use helpin_core::llm::BoxModelInvoker;
use helpin_core::quota::{RateLimiter, spawn_sweeper};
use helpin_infra::auth::JwtVerifier;
use helpin_infra::config::load_gateway_config;
use helpin_infra::filesystem::{ensure_data_dir, resolve_data_dir};
use helpin_infra::llm::openai::OpenAiInvoker;
use helpin_infra::llm::unconfigured::UnconfiguredInvoker;
use helpin_infra::secret::EnvSecrets;
use helpin_infra::sqlite::conversation::SqliteConversationRepository;
use helpin_infra::sqlite::pool::{DatabasePool, database_url};
use helpin_types::config::GatewayConfig;

/// Concrete type aliases for the service generics pinned to infra implementations.
pub type ConcreteConversationStore = ConversationStore<SqliteConversationRepository>;

pub type ConcreteGateway = ChatGateway<BoxModelInvoker, SqliteConversationRepository>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<ConcreteGateway>,
    pub limiter: Arc<RateLimiter>,
    pub conversations: Arc<ConcreteConversationStore>,
    pub verifier: Arc<JwtVerifier>,
    pub config: Arc<GatewayConfig>,
    pub data_dir: PathBuf,
    /// Cancelled on server shutdown; every chat stream runs under a child token.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Initialize the application state: load config, connect to DB, wire services.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        ensure_data_dir(&data_dir)
            .await
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let config = load_gateway_config(&data_dir).await;
        let secrets = EnvSecrets::from_env();

        let jwt_secret = secrets
            .jwt_secret
            .context("JWT_SECRET is not set; refusing to serve unauthenticated")?;
        let verifier = JwtVerifier::new(&jwt_secret)?;

        let invoker = match &secrets.model_api_key {
            Some(key) => BoxModelInvoker::new(OpenAiInvoker::new(
                key,
                config.model.model.clone(),
                config.model.base_url.as_deref(),
            )),
            None => {
                tracing::warn!(
                    "no model API key (AI_GATEWAY_API_KEY / OPENAI_API_KEY); chat will return 503"
                );
                BoxModelInvoker::new(UnconfiguredInvoker::new(config.model.model.clone()))
            }
        };

        let db_pool = DatabasePool::new(&database_url(&data_dir)).await?;

        Ok(Self::build(config, invoker, db_pool, verifier, data_dir))
    }

    /// Wire services from already-constructed parts.
    pub fn build(
        config: GatewayConfig,
        invoker: BoxModelInvoker,
        db_pool: DatabasePool,
        verifier: JwtVerifier,
        data_dir: PathBuf,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::in_memory(
            config.quota.max_per_window,
            config.quota.window_minutes,
        ));
        let conversations = Arc::new(ConversationStore::with_clock(
            SqliteConversationRepository::new(db_pool),
            SystemClock,
            config.conversations.max_per_owner,
        ));
        let gateway = ChatGateway::new(
            invoker,
            Arc::clone(&limiter),
            Arc::clone(&conversations),
            GatewaySettings::from(&config.model),
        );

        Self {
            gateway: Arc::new(gateway),
            limiter,
            conversations,
            verifier: Arc::new(verifier),
            config: Arc::new(config),
            data_dir,
            shutdown: CancellationToken::new(),
        }
    }

    /// Start the periodic sweep of expired rate windows. Stops on shutdown.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let every = Duration::from_secs(u64::from(self.config.quota.sweep_interval_minutes) * 60);
        spawn_sweeper(Arc::clone(&self.limiter), every, self.shutdown.clone())
    }
}
