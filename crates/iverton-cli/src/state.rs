//! Application state wiring all stores together.
//!
//! The stores in `iverton-core` are generic over their backing and transport
//! traits; AppState pins them to the concrete infra implementations: SQLite
//! for the durable area, an in-memory map for the volatile (session) area and
//! reqwest for webhooks.

use std::path::PathBuf;
use std::sync::Arc;

use iverton_core::auth::AuthStore;
use iverton_core::automation::AutomationHub;
use iverton_core::clock::{Clock, SystemClock};
use iverton_core::crm::CrmStore;
use iverton_core::generator::DataGenerator;
use iverton_core::notes::NotesStore;
use iverton_core::settings::SettingsStore;
use iverton_core::storage::{KvBacking, MemoryKvStore};
use iverton_core::usage::UsageBatcher;
use iverton_core::webhook::WebhookGateway;
use iverton_core::widget::{WidgetDataService, WidgetGridStore};
use iverton_infra::config::load_config_with_env;
use iverton_infra::crypto::hash::Argon2PasswordHasher;
use iverton_infra::filesystem::{ensure_data_dir, resolve_data_dir};
use iverton_infra::sqlite::kv::SqliteKvStore;
use iverton_infra::sqlite::pool::{DatabasePool, database_url};
use iverton_infra::webhook::ReqwestTransport;
use iverton_types::config::GlobalConfig;

/// Concrete type aliases for the generics pinned to infra implementations.
pub type Transport = Arc<ReqwestTransport>;
pub type ConcreteDataService = WidgetDataService<Transport>;
pub type ConcreteHub = AutomationHub<ConcreteDataService>;
pub type ConcreteAuthStore = AuthStore<SqliteKvStore, MemoryKvStore>;

pub struct AppState {
    pub data_dir: PathBuf,
    pub config: GlobalConfig,
    pub durable: Arc<SqliteKvStore>,
    pub gateway: Arc<WebhookGateway<Transport>>,
    pub usage: Arc<UsageBatcher<Transport>>,
    pub data_service: ConcreteDataService,
    pub grid: WidgetGridStore,
    pub hub: ConcreteHub,
    pub notes: NotesStore,
    pub settings: SettingsStore,
    pub crm: CrmStore,
    pub auth: ConcreteAuthStore,
}

impl AppState {
    /// Initialize the application state: open the database, hydrate every store.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        ensure_data_dir(&data_dir).await?;

        let config = load_config_with_env(&data_dir).await;

        let db_pool = DatabasePool::new(&database_url(&data_dir)).await?;
        let durable = Arc::new(SqliteKvStore::new(db_pool));
        let volatile = Arc::new(MemoryKvStore::new());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let transport = Arc::new(ReqwestTransport::new()?);
        let gateway = Arc::new(WebhookGateway::new(transport, config.webhook.clone()));
        let usage = Arc::new(UsageBatcher::new(
            Arc::clone(&gateway),
            config.usage.clone(),
            Arc::clone(&clock),
        ));

        let data_service = WidgetDataService::new(
            Arc::clone(&gateway),
            DataGenerator::from_entropy(),
            Arc::clone(&clock),
        )
        .with_usage(Arc::clone(&usage));
        let hub_source = WidgetDataService::new(
            Arc::clone(&gateway),
            DataGenerator::from_entropy(),
            Arc::clone(&clock),
        )
        .with_usage(Arc::clone(&usage));

        let grid = WidgetGridStore::open(Arc::clone(&durable)).await;
        let hub = AutomationHub::open(
            Arc::clone(&durable),
            hub_source,
            Arc::clone(&clock),
            &config.automation,
        )
        .await;
        let notes = NotesStore::open(Arc::clone(&durable), Arc::clone(&clock)).await;
        let settings = SettingsStore::open(Arc::clone(&durable)).await;
        let crm = CrmStore::open(Arc::clone(&durable), Arc::clone(&clock)).await;
        let auth = AuthStore::open(
            Arc::clone(&durable),
            volatile,
            Arc::new(Argon2PasswordHasher::new()),
            clock,
            config.session.clone(),
        )
        .await;

        tracing::debug!(
            data_dir = %data_dir.display(),
            webhooks = config.webhook.enabled,
            "application state ready"
        );

        Ok(Self {
            data_dir,
            config,
            durable,
            gateway,
            usage,
            data_service,
            grid,
            hub,
            notes,
            settings,
            crm,
            auth,
        })
    }

    /// Keys currently held in the durable area.
    pub async fn durable_keys(&self) -> Vec<String> {
        match self.durable.list_keys().await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(error = %e, "failed to list stored keys");
                Vec::new()
            }
        }
    }

    /// Sync pending usage and wait for every queued store write.
    pub async fn flush_all(&self) {
        if let Err(e) = self.usage.flush().await {
            tracing::debug!(error = %e, "usage batch kept for next run");
        }
        self.grid.flush().await;
        self.hub.flush().await;
        self.notes.flush().await;
        self.settings.flush().await;
        self.crm.flush().await;
        self.auth.flush().await;
    }
}
