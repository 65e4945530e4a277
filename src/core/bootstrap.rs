use std::sync::Arc;

use sqlx::PgPool;
use tokio::task::JoinHandle;

use crate::core::config::Config;
use crate::core::database;
use crate::features::access::AccessPolicy;
use crate::features::categories::CategoryService;
use crate::features::reimbursements::{EventDispatcher, ReimbursementService};
use crate::modules::audit::{AuditRecorder, PgAuditRecorder};
use crate::modules::ledger::{bounded, LedgerStore, PgLedger};
use crate::modules::notifier::Notifier;
use crate::modules::storage::FileStorage;

/// Fully wired services, ready to be called by a transport layer
pub struct App {
    pub pool: PgPool,
    pub policy: Arc<AccessPolicy>,
    pub reimbursements: Arc<ReimbursementService>,
    pub categories: Arc<CategoryService>,
    /// Event dispatcher task; finishes once every service handle is dropped
    pub dispatcher: JoinHandle<()>,
}

impl App {
    /// Connect, migrate, load the access policy and spawn the event dispatcher.
    ///
    /// File storage and notification delivery are supplied by the caller.
    pub async fn build(
        config: Config,
        storage: Arc<dyn FileStorage>,
        notifier: Arc<dyn Notifier>,
    ) -> anyhow::Result<Self> {
        let pool = database::create_pool(&config.database).await?;
        tracing::info!("Database connection pool created");

        tracing::info!("Running database migrations...");
        database::run_migrations(&pool)
            .await
            .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;
        tracing::info!("Database migrations completed successfully");

        let ledger: Arc<dyn LedgerStore> = Arc::new(PgLedger::new(pool.clone()));
        let timeout = config.workflow.store_timeout;

        let pairs = bounded(timeout, ledger.load_role_permissions())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to load role permissions: {}", e))?;
        let policy = Arc::new(AccessPolicy::from_store_or_default(pairs));
        tracing::info!("Access policy loaded");

        let audit: Arc<dyn AuditRecorder> = Arc::new(PgAuditRecorder::new(pool.clone()));
        let (events, receiver) = EventDispatcher::channel(config.workflow.event_queue_capacity);
        let dispatcher = EventDispatcher::new(
            Arc::clone(&ledger),
            Arc::clone(&policy),
            notifier,
            audit,
            timeout,
        );
        let dispatcher = tokio::spawn(dispatcher.run(receiver));
        tracing::info!("Event dispatcher worker spawned");

        let reimbursements = Arc::new(ReimbursementService::new(
            Arc::clone(&ledger),
            Arc::clone(&policy),
            storage,
            events,
            config.workflow.clone(),
            config.attachments.clone(),
        ));
        tracing::info!("Reimbursement service initialized");

        let categories = Arc::new(CategoryService::new(
            Arc::clone(&ledger),
            Arc::clone(&policy),
            timeout,
        ));
        tracing::info!("Category service initialized");

        Ok(Self {
            pool,
            policy,
            reimbursements,
            categories,
            dispatcher,
        })
    }
}
