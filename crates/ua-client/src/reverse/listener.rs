// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! TCP listener for servers dialing in.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::{ReverseConnection, ReverseHello, WaiterRegistry};
use crate::endpoint::DEFAULT_OPC_TCP_PORT;
use crate::error::{ConfigurationError, UaError, UaResult};

const HELLO_TIMEOUT: Duration = Duration::from_secs(5);

/// Accepts reverse connections and offers them to a waiter registry.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
/// use ua_client::reverse::{ReverseConnectHub, ReverseConnectListener};
///
/// # async fn example() -> ua_client::error::UaResult<()> {
/// let hub = Arc::new(ReverseConnectHub::new());
/// let listener = ReverseConnectListener::bind("opc.tcp://0.0.0.0:65300", 16, hub).await?;
/// let shutdown = CancellationToken::new();
/// tokio::spawn(listener.run(shutdown.clone()));
/// # Ok(())
/// # }
/// ```
pub struct ReverseConnectListener {
    endpoint_url: String,
    listener: TcpListener,
    registry: Arc<dyn WaiterRegistry>,
}

impl ReverseConnectListener {
    /// Binds to the host and port of `endpoint_url`.
    pub async fn bind(
        endpoint_url: &str,
        backlog: u32,
        registry: Arc<dyn WaiterRegistry>,
    ) -> UaResult<Self> {
        let addr = resolve(endpoint_url).await?;

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(|e| UaError::io("creating reverse connect socket", e))?;
        socket
            .set_reuseaddr(true)
            .map_err(|e| UaError::io("configuring reverse connect socket", e))?;
        socket
            .bind(addr)
            .map_err(|e| UaError::io(format!("binding {}", addr), e))?;
        let listener = socket
            .listen(backlog.max(1))
            .map_err(|e| UaError::io(format!("listening on {}", addr), e))?;

        info!(endpoint = %endpoint_url, addr = %addr, "Listening for reverse connections");

        Ok(Self {
            endpoint_url: endpoint_url.to_string(),
            listener,
            registry,
        })
    }

    /// Returns the bound address.
    pub fn local_addr(&self) -> UaResult<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| UaError::io("reading listener address", e))
    }

    /// Accepts connections until `shutdown` fires.
    pub async fn run(self, shutdown: CancellationToken) -> UaResult<()> {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!(endpoint = %self.endpoint_url, "Reverse connect listener stopped");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let registry = Arc::clone(&self.registry);
                        let endpoint_url = self.endpoint_url.clone();
                        tokio::spawn(accept_hello(stream, peer, endpoint_url, registry));
                    }
                    Err(e) => warn!(error = %e, "Accept failed"),
                },
            }
        }
    }
}

async fn accept_hello(
    mut stream: TcpStream,
    peer: SocketAddr,
    endpoint_url: String,
    registry: Arc<dyn WaiterRegistry>,
) {
    let hello = match tokio::time::timeout(HELLO_TIMEOUT, ReverseHello::read_from(&mut stream)).await {
        Ok(Ok(hello)) => hello,
        Ok(Err(e)) => {
            warn!(peer = %peer, error = %e, "Invalid ReverseHello");
            return;
        }
        Err(_) => {
            warn!(peer = %peer, "No ReverseHello received");
            return;
        }
    };

    debug!(
        peer = %peer,
        server_uri = hello.server_uri.as_deref().unwrap_or("<null>"),
        endpoint = hello.endpoint_url.as_deref().unwrap_or("<null>"),
        "ReverseHello received"
    );

    let connection = ReverseConnection::with_stream(endpoint_url, hello, peer, stream);
    if let Err(unmatched) = registry.offer(connection) {
        warn!(
            peer = %peer,
            server_uri = unmatched.server_uri().unwrap_or("<null>"),
            "No waiter for reverse connection, closing"
        );
    }
}

async fn resolve(endpoint_url: &str) -> UaResult<SocketAddr> {
    let url = Url::parse(endpoint_url)
        .map_err(|e| ConfigurationError::invalid_url(endpoint_url, e.to_string()))?;
    let host = url
        .host_str()
        .ok_or_else(|| ConfigurationError::invalid_url(endpoint_url, "missing host"))?
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string();
    let port = url.port().unwrap_or(DEFAULT_OPC_TCP_PORT);

    let resolved = tokio::net::lookup_host((host.as_str(), port))
        .await
        .map_err(|e| UaError::io(format!("resolving {}", endpoint_url), e))?
        .next()
        .ok_or_else(|| {
            ConfigurationError::invalid_url(endpoint_url, "host did not resolve").into()
        });
    resolved
}
