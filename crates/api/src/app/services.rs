//! Store wiring: in-memory for dev/tests, Postgres when configured.

use std::sync::Arc;

use stockrecon_infra::config::StoreBackend;
use stockrecon_infra::reconcile::ReconcileEngine;
use stockrecon_infra::store::{
    postgres, InMemoryAggregateStore, InMemoryLedgerStore, PostgresAggregateStore,
    PostgresLedgerStore, StoreError,
};

/// Engine over empty process-local stores.
pub fn build_in_memory_engine() -> ReconcileEngine {
    ReconcileEngine::new(
        Arc::new(InMemoryLedgerStore::new()),
        Arc::new(InMemoryAggregateStore::new()),
    )
}

pub async fn build_engine(backend: &StoreBackend) -> Result<ReconcileEngine, StoreError> {
    match backend {
        StoreBackend::InMemory => {
            tracing::info!("using in-memory stores");
            Ok(build_in_memory_engine())
        }
        StoreBackend::Postgres {
            database_url,
            max_connections,
        } => {
            let pool = postgres::connect(database_url, *max_connections).await?;
            postgres::ensure_schema(&pool).await?;
            tracing::info!(max_connections, "using postgres stores");

            Ok(ReconcileEngine::new(
                Arc::new(PostgresLedgerStore::new(pool.clone())),
                Arc::new(PostgresAggregateStore::new(pool)),
            ))
        }
    }
}
