//! # Agent Runtime
//!
//! Wires the store, resolver, gateway and controllers together and serves
//! the route table.
//!
//! ## Startup Sequence
//!
//! 1. Open the configured store
//! 2. Seed the static resolver
//! 3. Build the HTTP gateway
//! 4. Register the default controllers and run `initiate_all`
//! 5. Bind the listener and serve until shutdown is signalled

use std::sync::Arc;

use agent_core::{
    default_controllers, AgentService, ControllerParams, HttpOutboundGateway, InMemoryKVStore,
    KeyValueStore, RecordStore, StaticResolver,
};
use anyhow::{Context, Result};
use axum::Router;
use tokio::sync::watch;
use tracing::info;

use crate::config::{AgentConfig, StorageBackend};
use crate::routes::build_router;

/// The running agent.
pub struct AgentRuntime {
    config: AgentConfig,
    service: Arc<AgentService>,
    records: RecordStore,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl AgentRuntime {
    /// Build and initiate every component. Fails if any controller cannot
    /// initiate.
    pub async fn new(config: AgentConfig) -> Result<Self> {
        info!("[runtime] Creating agent runtime ({})", config.agent.label);

        let store = open_store(&config)?;
        let records = RecordStore::new(store);

        let resolver = StaticResolver::new();
        for entry in &config.resolver.endpoints {
            resolver.register(&entry.did, &entry.service_id, &entry.url);
        }
        info!("[runtime] Resolver seeded with {} endpoints", resolver.len());

        let gateway = HttpOutboundGateway::new(Arc::new(resolver), config.gateway.timeout())
            .context("Failed to build outbound gateway")?;

        let mut service = AgentService::new();
        for controller in default_controllers(records.clone(), Arc::new(gateway)) {
            service.register_controller(controller);
        }
        service
            .initiate_all(&ControllerParams {
                agent_label: config.agent.label.clone(),
            })
            .await
            .context("Failed to initiate controllers")?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            service: Arc::new(service),
            records,
            shutdown_tx,
            shutdown_rx,
        })
    }

    pub fn service(&self) -> Arc<AgentService> {
        Arc::clone(&self.service)
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    pub fn router(&self) -> Router {
        build_router(self.service())
    }

    /// Serve HTTP until `trigger_shutdown` is called.
    pub async fn serve(&self) -> Result<()> {
        let addr = self.config.network.http_addr;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        info!("[runtime] Listening on {}", addr);

        let mut shutdown_rx = self.shutdown_rx.clone();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                while !*shutdown_rx.borrow() {
                    if shutdown_rx.changed().await.is_err() {
                        break;
                    }
                }
            })
            .await
            .context("HTTP server error")
    }

    pub fn trigger_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Stop the controllers once the server has drained.
    pub async fn shutdown(&self) {
        info!("[runtime] Shutting down");
        self.service.shutdown_all().await;
        info!("[runtime] Shutdown complete");
    }
}

fn open_store(config: &AgentConfig) -> Result<Arc<dyn KeyValueStore>> {
    match config.storage.backend {
        StorageBackend::Memory => {
            info!("[runtime] Using in-memory store");
            Ok(Arc::new(InMemoryKVStore::new()))
        }
        #[cfg(feature = "rocksdb")]
        StorageBackend::RocksDb => {
            use crate::adapters::storage::{RocksDbConfig, RocksDbStore};

            let store = RocksDbStore::open(RocksDbConfig {
                path: config.storage.data_dir.to_string_lossy().to_string(),
                ..Default::default()
            })
            .context("Failed to open RocksDB store")?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "rocksdb"))]
        StorageBackend::RocksDb => {
            anyhow::bail!("rocksdb backend requested but the `rocksdb` feature is disabled")
        }
    }
}
