//! # Server Core
//!
//! Owns the listening socket, the worker pool, and the single shared graph
//! session. Binding is the only fatal failure: once `bind` succeeds the
//! server recovers every per-connection error locally.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::config::ServerConfig;
use crate::server::pool::WorkerPool;
use crate::server::session::SharedSession;

pub struct Server {
    config: ServerConfig,
    listener: TcpListener,
    session: Arc<SharedSession>,
}

impl Server {
    /// Bind the listening socket. A bind/listen failure here aborts startup;
    /// there is no partially-started server.
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        let listener = TcpListener::bind(&config.server.address)
            .await
            .with_context(|| format!("failed to bind {}", config.server.address))?;
        info!("server listening on {}", listener.local_addr()?);

        Ok(Self {
            config,
            listener,
            session: Arc::new(SharedSession::new()),
        })
    }

    /// The bound address; useful when the configured port is 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run until the injected `shutdown` future completes, then stop
    /// accepting, close the listening socket, and join every worker before
    /// returning. The joins are never skipped.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let (stop_tx, stop_rx) = watch::channel(false);
        let pool = WorkerPool::spawn(
            self.listener,
            Arc::clone(&self.session),
            &self.config.pool,
            stop_rx,
        );

        shutdown.await;

        info!("server shutting down");
        // Wakes every leader wait and every command loop; the listening
        // socket closes when the last worker drops the pool state.
        let _ = stop_tx.send(true);
        pool.join().await;
        info!("all workers stopped");

        Ok(())
    }
}
