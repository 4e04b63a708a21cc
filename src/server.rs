//! N3TP listener and connection supervisor.
//!
//! One listener owns one [`SharedSession`]. Every accepted connection gets a
//! [`CommandHandler`]; the first two become the players and any later
//! connection is turned away by its handler. Each handler runs under a
//! supervisor that closes the listener when a seated player's connection
//! ends before the game is decided. The listener also closes once the game
//! is decided. After it closes, running handlers get a grace period to
//! finish on their own before they are aborted.

use crate::config::ServerConfig;
use crate::handler::{CommandHandler, HandlerExit, HandlerReport};
use crate::session::{PlayerNumber, SharedSession};
use derive_more::{Display, Error};
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, instrument, warn};

/// Listener failures. Only binding is fatal.
#[derive(Debug, Display, Error)]
pub enum ServerError {
    /// Port could not be bound.
    #[display("Failed to bind {}: {}", address, source)]
    Bind {
        /// Address requested.
        address: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Why the listener stopped accepting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// A seated player's connection ended mid-game.
    PlayerLeft {
        /// Seat that left.
        seat: PlayerNumber,
        /// How its handler ended.
        exit: HandlerExit,
    },
    /// The session reached a decided state.
    GameDecided,
    /// [`ServerHandle::shutdown`] was called.
    Requested,
}

/// Handle to a running listener.
#[derive(Debug)]
pub struct ServerHandle {
    shutdown: mpsc::Sender<ShutdownReason>,
    task: JoinHandle<ShutdownReason>,
    session: SharedSession,
}

impl ServerHandle {
    /// The session this listener serves.
    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    /// Asks the listener to close, then waits for it to drain.
    pub async fn shutdown(self) -> Option<ShutdownReason> {
        // The loop may already be gone; waiting covers both cases.
        let _ = self.shutdown.send(ShutdownReason::Requested).await;
        self.wait().await
    }

    /// Waits until the listener has closed and its handlers have drained.
    ///
    /// Returns `None` if the listener task panicked.
    pub async fn wait(self) -> Option<ShutdownReason> {
        match self.task.await {
            Ok(reason) => Some(reason),
            Err(e) => {
                error!(error = %e, "Listener task failed");
                None
            }
        }
    }
}

/// Binds the listener and starts accepting in the background.
///
/// Returns the bound address, which matters when the configured port is 0.
#[instrument(skip(config), fields(address = %config.bind_address()))]
pub async fn start_server(config: &ServerConfig) -> Result<(ServerHandle, SocketAddr), ServerError> {
    let address = config.bind_address();
    let bind_error = |source| ServerError::Bind {
        address: address.clone(),
        source,
    };

    let listener = TcpListener::bind(&address).await.map_err(bind_error)?;
    let local = listener.local_addr().map_err(bind_error)?;
    info!(%local, "Waiting for tic-tac-toe clients");

    let session = SharedSession::new();
    let (shutdown_tx, shutdown_rx) = mpsc::channel(4);
    let task = tokio::spawn(accept_loop(
        listener,
        session.clone(),
        shutdown_tx.clone(),
        shutdown_rx,
        config.drain_timeout(),
    ));

    Ok((
        ServerHandle {
            shutdown: shutdown_tx,
            task,
            session,
        },
        local,
    ))
}

/// Binds and serves until the listener closes and handlers have drained.
pub async fn serve(config: &ServerConfig) -> Result<Option<ShutdownReason>, ServerError> {
    let (handle, _) = start_server(config).await?;
    Ok(handle.wait().await)
}

async fn accept_loop(
    listener: TcpListener,
    session: SharedSession,
    shutdown_tx: mpsc::Sender<ShutdownReason>,
    mut shutdown_rx: mpsc::Receiver<ShutdownReason>,
    drain_timeout: Duration,
) -> ShutdownReason {
    let mut handlers = JoinSet::new();

    let reason = loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    info!(%peer, "A tic-tac-toe client has connected");
                    let handler = CommandHandler::new(session.clone(), peer.to_string());
                    handlers.spawn(supervise(peer, handler.serve(stream), shutdown_tx.clone()));
                }
                Err(e) => warn!(error = %e, "Accept failed"),
            },
            Some(reason) = shutdown_rx.recv() => break reason,
            () = session.wait_until(|s| s.outcome().is_some()) => break ShutdownReason::GameDecided,
            Some(joined) = handlers.join_next(), if !handlers.is_empty() => log_joined(joined),
        }
    };

    drop(listener);
    info!(?reason, "Listener closed");
    drain(&mut handlers, drain_timeout).await;
    reason
}

/// Runs a handler and closes the listener if a seated player drops out.
#[instrument(skip(handler, shutdown))]
async fn supervise(
    peer: SocketAddr,
    handler: impl Future<Output = HandlerReport>,
    shutdown: mpsc::Sender<ShutdownReason>,
) -> HandlerReport {
    let report = handler.await;

    match (*report.seat(), *report.exit()) {
        (Some(_), HandlerExit::GameOver(_)) | (None, _) => {
            debug!(?report, "Connection ended normally");
        }
        (Some(seat), exit) => {
            warn!(%seat, ?exit, "Player connection ended mid-game, closing listener");
            // Listener may already be closed; nothing else to do then.
            let _ = shutdown.send(ShutdownReason::PlayerLeft { seat, exit }).await;
        }
    }
    report
}

fn log_joined(joined: Result<HandlerReport, tokio::task::JoinError>) {
    match joined {
        Ok(report) => debug!(?report, "Handler task finished"),
        Err(e) => error!(error = %e, "Handler task failed"),
    }
}

/// Waits for handlers to finish, aborting stragglers after `timeout`.
async fn drain(handlers: &mut JoinSet<HandlerReport>, timeout: Duration) {
    if handlers.is_empty() {
        return;
    }
    info!(remaining = handlers.len(), ?timeout, "Draining handlers");

    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            joined = handlers.join_next() => match joined {
                Some(joined) => log_joined(joined),
                None => break,
            },
            () = &mut deadline => {
                warn!(remaining = handlers.len(), "Drain timed out, aborting handlers");
                handlers.abort_all();
                while handlers.join_next().await.is_some() {}
                break;
            }
        }
    }
}
