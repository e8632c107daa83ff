//! Server module
//!
//! Accepts TCP connections and hands each one to its own task. Command
//! execution is delegated to the engine task that owns the dispatcher.

mod connection;
mod engine;

pub use connection::{Connection, ConnectionError, ConnectionLimits};
pub use engine::{Engine, EngineClosed, EngineHandle, EngineRequest};

use crate::config::Config;
use crate::dispatch::Dispatcher;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A bound server, ready to run
pub struct Server {
    listener: TcpListener,
    dispatcher: Dispatcher,
    limits: ConnectionLimits,
}

impl Server {
    /// Load persisted state and bind the listener
    pub async fn bind(config: Config) -> Result<Server> {
        let addr = config.bind_addr();
        let limits = ConnectionLimits {
            max_bulk_len: config.max_bulk_len,
            max_multibulk_len: config.max_multibulk_len,
            output_limit: config.client_output_limit,
        };

        let mut dispatcher = Dispatcher::open(config).context("Failed to load the append-only file")?;
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        dispatcher.set_port(listener.local_addr()?.port());

        Ok(Server {
            listener,
            dispatcher,
            limits,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until `shutdown` is cancelled, then flush the log
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let Server {
            listener,
            dispatcher,
            limits,
        } = self;
        info!("FerrumKV listening on {}", listener.local_addr()?);

        let (engine, handle) = Engine::new(dispatcher);
        let engine_task = tokio::spawn(engine.run(shutdown.clone()));

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,

                accepted = listener.accept() => {
                    let (socket, addr) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            // Usually out of file descriptors; back off briefly
                            error!("Failed to accept connection: {}", e);
                            tokio::time::sleep(Duration::from_millis(100)).await;
                            continue;
                        }
                    };
                    if let Err(e) = socket.set_nodelay(true) {
                        debug!("Could not set TCP_NODELAY: {}", e);
                    }

                    let engine = handle.clone();
                    tokio::spawn(async move {
                        let Ok(client_id) = engine.connect(Some(addr)).await else {
                            return;
                        };
                        debug!(client = client_id, "New connection from {}", addr);

                        let mut connection = Connection::new(socket, client_id, limits);
                        match connection.handle(&engine).await {
                            Ok(()) | Err(ConnectionError::EngineClosed(_)) => {}
                            Err(e) => warn!(client = client_id, "Closing connection from {}: {}", addr, e),
                        }
                        engine.disconnect(client_id);
                    });
                }
            }
        }

        info!("No longer accepting connections");
        drop(handle);
        engine_task.await.context("Engine task failed")?;
        info!("Server stopped");
        Ok(())
    }
}
