//! TCP accept loop (spec §1: "standard plumbing", out of scope for design
//! attention but still has to exist). One task per accepted connection;
//! graceful shutdown on SIGINT/SIGTERM mirrors the teacher's `main.rs`.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::compiler::Compiler;
use crate::config::Config;
use crate::session;

/// Bind the listener and accept connections until SIGINT/SIGTERM, spawning
/// one task per connection. Concurrent sessions are capped at
/// `config.server.max_connections` (the teacher enforces the same cap with
/// `tower::limit::ConcurrencyLimitLayer`; without `tower` in the stack a
/// permit-counted semaphore does the same job).
pub async fn run(config: Config) {
    let listener = TcpListener::bind(&config.server.listen)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {e}", config.server.listen));

    info!("listening on {}", config.server.listen);

    let permits = Arc::new(Semaphore::new(config.server.max_connections));
    let config = Arc::new(config);
    let compiler = Arc::new(Compiler::new(
        config.compiler.binary.clone(),
        config.compiler.std.clone(),
    ));

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((socket, peer)) => {
                        info!(%peer, "accepted connection");
                        let config = Arc::clone(&config);
                        let compiler = Arc::clone(&compiler);
                        let permits = Arc::clone(&permits);
                        tokio::spawn(async move {
                            let Ok(permit) = permits.acquire_owned().await else {
                                return;
                            };
                            session::handle(socket, &config, &compiler).await;
                            drop(permit);
                        });
                    }
                    Err(e) => warn!("accept failed: {e}"),
                }
            }
            () = &mut shutdown => {
                info!("shutting down accept loop");
                break;
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            Ok(s) => s,
            Err(e) => {
                error!("failed to register SIGTERM handler: {e}");
                let _ = ctrl_c.await;
                return;
            }
        };
        tokio::select! {
            _ = ctrl_c => info!("received SIGINT"),
            _ = sigterm.recv() => info!("received SIGTERM"),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
        info!("received SIGINT");
    }
}
