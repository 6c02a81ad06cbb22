use anyhow::Result;
use listenfd::ListenFd;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;
use tokio::signal;
use tracing::{info, warn};

use authproxy_core::BrokerHandle;

/// Takes a systemd-activated socket if one was passed in, otherwise binds `addr`.
pub async fn create_listener(addr: SocketAddr) -> Result<tokio::net::TcpListener> {
    let mut listenfd = ListenFd::from_env();

    if let Some(listener) = listenfd.take_tcp_listener(0)? {
        info!("Using systemd socket activation (fd=3)");
        listener.set_nonblocking(true)?;
        return Ok(tokio::net::TcpListener::from_std(listener)?);
    }

    let domain = if addr.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1024)?;

    Ok(tokio::net::TcpListener::from_std(socket.into())?)
}

/// Resolves on Ctrl+C or SIGTERM, after logging what the broker still holds.
///
/// Polls already parked keep waiting for a completion or their timeout while
/// axum drains connections.
#[allow(
    clippy::expect_used,
    reason = "a process that cannot observe shutdown signals should not start serving"
)]
pub async fn shutdown_signal(broker: BrokerHandle) {
    #[cfg(unix)]
    let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
        .expect("failed to install SIGTERM handler");

    let reason = {
        #[cfg(unix)]
        let terminate = terminate.recv();
        #[cfg(not(unix))]
        let terminate = std::future::pending::<Option<()>>();

        tokio::select! {
            res = signal::ctrl_c() => {
                res.expect("failed to install Ctrl+C handler");
                "Ctrl+C"
            }
            _ = terminate => "SIGTERM",
        }
    };

    match broker.stats().await {
        Ok(stats) => info!(
            signal = reason,
            sessions = stats.sessions,
            waiting_polls = stats.waiting_polls,
            "Shutting down; draining open long-polls"
        ),
        Err(e) => warn!(signal = reason, error = %e, "Shutting down; broker already stopped"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_create_listener_binds_ephemeral_port() {
        let listener = create_listener(SocketAddr::from(([127, 0, 0, 1], 0))).await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_signal_and_holds_broker_open() {
        let (broker, _task) =
            authproxy_core::Broker::spawn(authproxy_core::BrokerConfig::default()).unwrap();
        let shutdown = tokio::spawn(shutdown_signal(broker.clone()));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!shutdown.is_finished());
        assert!(!broker.is_closed());

        shutdown.abort();
    }
}
