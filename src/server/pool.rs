//! # Worker Pool — Leader–Follower Scheduler
//!
//! A fixed set of workers admits connections without a dedicated listener
//! thread. Exactly one worker at a time — the leader — waits on the shared
//! listening socket; the wait is bounded by a timeout so the stop flag is
//! re-checked every wakeup. On accept, the leader first hands leadership to
//! any waiting follower, then handles the accepted connection itself as
//! ordinary work, and rejoins the follower pool when the client disconnects.
//!
//! Every worker therefore serves both accept duty and handling duty, which
//! bounds the total worker count to the pool size while keeping accept
//! latency low. There is no ordering guarantee over which follower is
//! promoted next.
//!
//! Coordination is deliberately minimal: one "current leader" cell plus one
//! notification for leader-available, and a watch flag for shutdown. No
//! worker ever compares thread identities beyond that cell.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::config::PoolConfig;
use crate::server::connection::Connection;
use crate::server::handler;
use crate::server::session::SharedSession;

pub type WorkerId = usize;

/// The three roles a worker cycles through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerRole {
    /// Waiting for leadership to become available.
    Follower,
    /// Sole owner of the accept wait on the listening socket.
    Leader,
    /// Driving one client connection to completion.
    Handling,
}

/// State shared by every worker in the pool.
struct PoolShared {
    listener: TcpListener,
    /// The one atomic "current leader" cell. `None` means leadership is up
    /// for grabs.
    leader: Mutex<Option<WorkerId>>,
    /// Signalled each time leadership is released.
    leader_free: Notify,
    accept_timeout: Duration,
    session: Arc<SharedSession>,
}

/// Handle to the running pool; joining it is the only way to shut down
/// cleanly and must never be skipped.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `config.workers` workers over `listener`. The pool runs until
    /// `stop` flips to `true`.
    pub fn spawn(
        listener: TcpListener,
        session: Arc<SharedSession>,
        config: &PoolConfig,
        stop: watch::Receiver<bool>,
    ) -> Self {
        let shared = Arc::new(PoolShared {
            listener,
            leader: Mutex::new(None),
            leader_free: Notify::new(),
            accept_timeout: config.accept_timeout(),
            session,
        });

        let workers = config.workers.max(1);
        let handles = (0..workers)
            .map(|id| {
                let shared = Arc::clone(&shared);
                let stop = stop.clone();
                tokio::spawn(worker_loop(id, shared, stop))
            })
            .collect();

        info!("worker pool started with {workers} workers");
        Self { handles }
    }

    /// Wait for every worker to terminate. Called after the stop flag is
    /// set; returning means no worker is alive and the listening socket is
    /// closed.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(err) = handle.await {
                warn!("worker task ended abnormally: {err}");
            }
        }
    }
}

/// One worker's full lifecycle: follower -> leader -> handling -> follower,
/// until shutdown.
async fn worker_loop(id: WorkerId, shared: Arc<PoolShared>, mut stop: watch::Receiver<bool>) {
    loop {
        let mut role = WorkerRole::Follower;
        debug!("worker {id} entering role {role:?}");

        if !claim_leadership(id, &shared, &mut stop).await {
            break;
        }
        role = WorkerRole::Leader;
        debug!("worker {id} entering role {role:?}");

        let accepted = lead(id, &shared, &mut stop).await;
        // Promote a successor before doing anything else with the
        // connection; this worker never resumes leader duty for it.
        release_leadership(&shared).await;

        let Some((stream, peer)) = accepted else {
            break;
        };
        if *stop.borrow() {
            // Stop raced the accept; drop the connection unhandled.
            break;
        }

        role = WorkerRole::Handling;
        debug!("worker {id} entering role {role:?}");
        info!("worker {id} handling connection from {peer}");

        let conn = Connection::new(stream, peer);
        match handler::run(conn, Arc::clone(&shared.session), stop.clone()).await {
            Ok(()) => info!("worker {id} finished connection from {peer}"),
            Err(err) => warn!("worker {id} closed connection from {peer}: {err}"),
        }
    }
    debug!("worker {id} stopped");
}

/// Block until this worker owns the leader cell, or return `false` on
/// shutdown. A worker that already holds leadership never reaches here, so
/// re-claiming cannot deadlock.
async fn claim_leadership(
    id: WorkerId,
    shared: &PoolShared,
    stop: &mut watch::Receiver<bool>,
) -> bool {
    loop {
        if *stop.borrow() {
            return false;
        }
        {
            let mut cell = shared.leader.lock().await;
            if cell.is_none() {
                *cell = Some(id);
                return true;
            }
        }
        tokio::select! {
            _ = shared.leader_free.notified() => {}
            changed = stop.changed() => {
                if changed.is_err() {
                    return false;
                }
            }
        }
    }
}

async fn release_leadership(shared: &PoolShared) {
    *shared.leader.lock().await = None;
    shared.leader_free.notify_one();
}

/// Leader duty: the timed multiplexed wait on the listening socket.
/// Returns the accepted connection, or `None` when shutting down.
async fn lead(
    id: WorkerId,
    shared: &PoolShared,
    stop: &mut watch::Receiver<bool>,
) -> Option<(TcpStream, std::net::SocketAddr)> {
    loop {
        if *stop.borrow() {
            return None;
        }
        match timeout(shared.accept_timeout, shared.listener.accept()).await {
            // Timed out: loop around and re-check the stop flag.
            Err(_) => continue,
            Ok(Ok((stream, peer))) => {
                debug!("leader {id} accepted connection from {peer}");
                return Some((stream, peer));
            }
            Ok(Err(err)) => {
                warn!("leader {id} accept failed: {err}");
                // Avoid a hot loop on a persistent accept error.
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pool_config() -> PoolConfig {
        PoolConfig {
            workers: 2,
            accept_timeout_ms: 50,
        }
    }

    async fn spawn_pool(workers: usize) -> (std::net::SocketAddr, watch::Sender<bool>, WorkerPool) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = watch::channel(false);
        let config = PoolConfig {
            workers,
            ..test_pool_config()
        };
        let pool = WorkerPool::spawn(listener, Arc::new(SharedSession::new()), &config, stop_rx);
        (addr, stop_tx, pool)
    }

    #[tokio::test]
    async fn pool_stops_and_joins_on_stop_flag() {
        let (_addr, stop_tx, pool) = spawn_pool(3).await;
        stop_tx.send(true).unwrap();
        timeout(Duration::from_secs(2), pool.join())
            .await
            .expect("workers must join promptly after stop");
    }

    #[tokio::test]
    async fn accepts_connections_up_to_pool_size_concurrently() {
        let (addr, stop_tx, pool) = spawn_pool(2).await;

        // Both connections are served at once: each receives the menu.
        let mut clients = Vec::new();
        for _ in 0..2 {
            let stream = TcpStream::connect(addr).await.unwrap();
            clients.push(stream);
        }
        for stream in &mut clients {
            let mut buf = [0u8; 256];
            let n = timeout(Duration::from_secs(2), async {
                use tokio::io::AsyncReadExt;
                stream.read(&mut buf).await
            })
            .await
            .expect("menu should arrive")
            .unwrap();
            assert!(n > 0);
        }

        drop(clients);
        stop_tx.send(true).unwrap();
        timeout(Duration::from_secs(2), pool.join()).await.unwrap();
    }

    #[tokio::test]
    async fn leadership_cell_hands_off_exactly_once() {
        let shared = PoolShared {
            listener: TcpListener::bind("127.0.0.1:0").await.unwrap(),
            leader: Mutex::new(None),
            leader_free: Notify::new(),
            accept_timeout: Duration::from_millis(50),
            session: Arc::new(SharedSession::new()),
        };
        let (_stop_tx, stop_rx) = watch::channel(false);

        let mut stop = stop_rx.clone();
        assert!(claim_leadership(0, &shared, &mut stop).await);
        assert_eq!(*shared.leader.lock().await, Some(0));

        // A second claimant must not steal leadership while it is held.
        let mut stop2 = stop_rx.clone();
        let second = timeout(
            Duration::from_millis(100),
            claim_leadership(1, &shared, &mut stop2),
        )
        .await;
        assert!(second.is_err(), "leadership must stay exclusive");

        release_leadership(&shared).await;
        let mut stop3 = stop_rx;
        assert!(claim_leadership(1, &shared, &mut stop3).await);
        assert_eq!(*shared.leader.lock().await, Some(1));
    }
}
