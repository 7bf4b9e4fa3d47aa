use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use cafekiosk_infra::{
    AppConfig, InMemoryStore, LockingPolicy, LoggingMailSendClient, MailSendClient, MailService,
    OrderPlacementProcessor, OrderStatisticsService, PostgresStore, ProductService, Store,
};

pub type SharedStore = Arc<dyn Store>;
pub type SharedMailClient = Arc<dyn MailSendClient>;

/// Services shared by every handler.
pub struct AppServices {
    pub products: ProductService<SharedStore>,
    pub orders: OrderPlacementProcessor<SharedStore>,
    pub statistics: OrderStatisticsService<SharedStore, SharedMailClient>,
}

impl AppServices {
    pub fn new(
        store: SharedStore,
        mail_client: SharedMailClient,
        mail_from: impl Into<String>,
    ) -> Self {
        Self {
            products: ProductService::new(store.clone()),
            orders: OrderPlacementProcessor::new(store.clone()),
            statistics: OrderStatisticsService::new(
                store.clone(),
                MailService::new(store, mail_client),
                mail_from,
            ),
        }
    }

    /// In-memory store and a log-only mail client.
    pub fn in_memory(policy: LockingPolicy, mail_from: impl Into<String>) -> Self {
        Self::new(
            Arc::new(InMemoryStore::new(policy)),
            Arc::new(LoggingMailSendClient),
            mail_from,
        )
    }
}

/// Postgres when `DATABASE_URL` is set, otherwise the in-memory store.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let store: SharedStore = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await?;
            let store = PostgresStore::new(pool, config.locking_policy);
            store.ensure_schema().await?;
            info!("using postgres store");
            Arc::new(store)
        }
        None => {
            warn!("DATABASE_URL not set; using in-memory store");
            Arc::new(InMemoryStore::new(config.locking_policy))
        }
    };

    Ok(AppServices::new(
        store,
        Arc::new(LoggingMailSendClient),
        config.mail_from.clone(),
    ))
}
