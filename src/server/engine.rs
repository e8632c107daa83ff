//! The engine loop
//!
//! A single task owns the dispatcher and with it every piece of server
//! state. Connection tasks talk to it over a channel and wait for replies on
//! a oneshot; housekeeping runs on timers in the same loop, so nothing ever
//! touches the store concurrently.

use crate::dispatch::Dispatcher;
use crate::protocol::RespValue;
use bytes::Bytes;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// The engine stopped and no longer accepts requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("engine is shut down")]
pub struct EngineClosed;

/// A request sent to the engine
pub enum EngineRequest {
    /// A connection was accepted; reply with its client id
    Connect {
        addr: Option<SocketAddr>,
        reply: oneshot::Sender<u64>,
    },

    /// Run a pipeline of commands for a client, replies in order
    Execute {
        client_id: u64,
        commands: Vec<Vec<Bytes>>,
        reply: oneshot::Sender<Vec<RespValue>>,
    },

    /// The connection is gone
    Disconnect { client_id: u64 },
}

/// Cheap handle used by connection tasks to reach the engine
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<EngineRequest>,
}

impl EngineHandle {
    pub async fn connect(&self, addr: Option<SocketAddr>) -> Result<u64, EngineClosed> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Connect { addr, reply })
            .map_err(|_| EngineClosed)?;
        rx.await.map_err(|_| EngineClosed)
    }

    pub async fn execute(
        &self,
        client_id: u64,
        commands: Vec<Vec<Bytes>>,
    ) -> Result<Vec<RespValue>, EngineClosed> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Execute {
                client_id,
                commands,
                reply,
            })
            .map_err(|_| EngineClosed)?;
        rx.await.map_err(|_| EngineClosed)
    }

    pub fn disconnect(&self, client_id: u64) {
        let _ = self.tx.send(EngineRequest::Disconnect { client_id });
    }
}

/// The engine task
pub struct Engine {
    dispatcher: Dispatcher,
    rx: mpsc::UnboundedReceiver<EngineRequest>,
}

impl Engine {
    pub fn new(dispatcher: Dispatcher) -> (Engine, EngineHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Engine { dispatcher, rx }, EngineHandle { tx })
    }

    /// Serve requests until `shutdown` fires or every handle is dropped.
    /// Returns the dispatcher once the log has been flushed.
    pub async fn run(mut self, shutdown: CancellationToken) -> Dispatcher {
        let mut sweep = interval(self.dispatcher.config().sweep_interval());
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut fsync = interval(Duration::from_secs(1));
        fsync.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Engine loop starting");
        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Engine shutting down");
                    break;
                }

                // Timers go first so a busy request channel cannot starve them
                _ = sweep.tick() => self.dispatcher.housekeeping(),

                _ = fsync.tick() => self.dispatcher.sync_tick(),

                request = self.rx.recv() => match request {
                    Some(request) => self.handle(request),
                    None => break,
                },
            }
        }

        self.dispatcher.shutdown();
        self.dispatcher
    }

    fn handle(&mut self, request: EngineRequest) {
        match request {
            EngineRequest::Connect { addr, reply } => {
                let id = self.dispatcher.connect(addr);
                if reply.send(id).is_err() {
                    self.dispatcher.disconnect(id);
                }
            }
            EngineRequest::Execute {
                client_id,
                commands,
                reply,
            } => {
                let replies = self.dispatcher.execute_batch(client_id, commands);
                if reply.send(replies).is_err() {
                    debug!(client = client_id, "Client went away before its reply");
                }
            }
            EngineRequest::Disconnect { client_id } => self.dispatcher.disconnect(client_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn cmd(line: &str) -> Vec<Bytes> {
        line.split_whitespace()
            .map(|part| Bytes::copy_from_slice(part.as_bytes()))
            .collect()
    }

    fn memory_only() -> Config {
        Config {
            appendonly: false,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_engine_serves_clients() {
        let (engine, handle) = Engine::new(Dispatcher::new(memory_only()));
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(engine.run(shutdown.clone()));

        let a = handle.connect(None).await.unwrap();
        let b = handle.connect(None).await.unwrap();
        assert_ne!(a, b);

        let replies = handle
            .execute(a, vec![cmd("SET k v"), cmd("GET k")])
            .await
            .unwrap();
        assert_eq!(replies, vec![RespValue::ok(), RespValue::bulk_string("v")]);

        let replies = handle.execute(b, vec![cmd("GET k")]).await.unwrap();
        assert_eq!(replies, vec![RespValue::bulk_string("v")]);

        shutdown.cancel();
        let dispatcher = task.await.unwrap();
        assert_eq!(dispatcher.stats().total_connections, 2);
        assert_eq!(
            handle.execute(a, vec![cmd("PING")]).await,
            Err(EngineClosed)
        );
    }

    #[tokio::test]
    async fn test_housekeeping_runs_before_queued_requests() {
        let mut dispatcher = Dispatcher::new(memory_only());
        let deadline = crate::store::now_ms() + 1;
        dispatcher
            .store_mut()
            .db_mut(0)
            .unwrap()
            .set(Bytes::from("stale"), crate::store::Value::string("v"), Some(deadline));
        std::thread::sleep(Duration::from_millis(5));

        let (engine, handle) = Engine::new(dispatcher);
        // Fill the channel before the loop gets a chance to run
        let mut pending = Vec::new();
        for _ in 0..100 {
            let (reply, rx) = oneshot::channel();
            handle
                .tx
                .send(EngineRequest::Execute {
                    client_id: 1,
                    commands: vec![cmd("DBSIZE")],
                    reply,
                })
                .unwrap();
            pending.push(rx);
        }

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(engine.run(shutdown.clone()));
        // DBSIZE counts unswept keys, so 0 means the sweep ran first
        for rx in pending {
            assert_eq!(rx.await.unwrap(), vec![RespValue::integer(0)]);
        }
        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_engine_stops_when_handles_drop() {
        let (engine, handle) = Engine::new(Dispatcher::new(memory_only()));
        let task = tokio::spawn(engine.run(CancellationToken::new()));
        drop(handle);
        task.await.unwrap();
    }
}
