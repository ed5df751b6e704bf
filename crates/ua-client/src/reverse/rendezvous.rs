// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Waiter registry and the bounded wait for an inbound connection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use super::ReverseConnection;
use crate::error::{UaError, UaResult, WaitOutcome};
use crate::telemetry::Telemetry;

// =============================================================================
// WaiterRegistry
// =============================================================================

/// Identifies one registered waiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaiterId(u64);

/// A pending wait for an inbound connection.
#[derive(Debug)]
pub struct WaiterRegistration {
    /// Client URL the connection is expected on.
    pub endpoint_url: String,
    /// Server URI filter, honoured only by strict registries.
    pub server_uri: Option<String>,
    /// Completion channel.
    pub sender: oneshot::Sender<ReverseConnection>,
}

/// Pairs inbound connections with registered waiters.
pub trait WaiterRegistry: Send + Sync {
    /// Registers a waiter.
    fn register(&self, registration: WaiterRegistration) -> WaiterId;

    /// Removes a waiter. Returns `false` if it was already gone.
    fn unregister(&self, id: WaiterId) -> bool;

    /// Hands a connection to the first matching waiter, or gives it back.
    fn offer(&self, connection: ReverseConnection) -> Result<WaiterId, ReverseConnection>;
}

// =============================================================================
// ReverseConnectHub
// =============================================================================

/// In-memory waiter registry.
///
/// The first waiter registered for the listening URL receives the next
/// connection on that URL, whatever server URI the server reports. With
/// strict matching, a waiter's server URI filter must also match.
#[derive(Debug, Default)]
pub struct ReverseConnectHub {
    waiters: Mutex<Vec<(WaiterId, WaiterRegistration)>>,
    next_id: AtomicU64,
    strict_server_uri: bool,
}

impl ReverseConnectHub {
    /// Creates a hub with any-once matching.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a hub that also matches the server URI filter.
    pub fn strict() -> Self {
        Self {
            strict_server_uri: true,
            ..Self::default()
        }
    }

    /// Returns the number of registered waiters.
    pub fn pending(&self) -> usize {
        self.waiters.lock().len()
    }

    fn matches(&self, registration: &WaiterRegistration, connection: &ReverseConnection) -> bool {
        if !same_url(&registration.endpoint_url, connection.listener_url()) {
            return false;
        }
        match (&registration.server_uri, self.strict_server_uri) {
            (Some(expected), true) => connection.server_uri() == Some(expected.as_str()),
            _ => true,
        }
    }
}

impl WaiterRegistry for ReverseConnectHub {
    fn register(&self, registration: WaiterRegistration) -> WaiterId {
        let id = WaiterId(self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!(
            waiter = id.0,
            endpoint = %registration.endpoint_url,
            "Reverse connect waiter registered"
        );
        self.waiters.lock().push((id, registration));
        id
    }

    fn unregister(&self, id: WaiterId) -> bool {
        let mut waiters = self.waiters.lock();
        let before = waiters.len();
        waiters.retain(|(waiter, _)| *waiter != id);
        before != waiters.len()
    }

    fn offer(&self, mut connection: ReverseConnection) -> Result<WaiterId, ReverseConnection> {
        let mut waiters = self.waiters.lock();

        while let Some(index) = waiters
            .iter()
            .position(|(_, registration)| self.matches(registration, &connection))
        {
            let (id, registration) = waiters.remove(index);
            match registration.sender.send(connection) {
                Ok(()) => {
                    debug!(waiter = id.0, "Reverse connection delivered");
                    return Ok(id);
                }
                Err(returned) => connection = returned,
            }
        }

        Err(connection)
    }
}

fn same_url(a: &str, b: &str) -> bool {
    a.trim_end_matches('/')
        .eq_ignore_ascii_case(b.trim_end_matches('/'))
}

// =============================================================================
// wait_for_connection
// =============================================================================

/// One bounded wait.
#[derive(Debug, Clone)]
pub struct RendezvousRequest {
    /// Client URL the server dials.
    pub endpoint_url: String,
    /// Optional server URI filter.
    pub server_uri: Option<String>,
    /// Wait budget.
    pub timeout: Duration,
}

struct Unregister<'a> {
    registry: &'a dyn WaiterRegistry,
    id: WaiterId,
}

impl Drop for Unregister<'_> {
    fn drop(&mut self) {
        self.registry.unregister(self.id);
    }
}

/// Waits for a server to dial in.
///
/// Races the inbound connection against `request.timeout` and `cancel`.
/// The waiter is unregistered on every exit path, including when the
/// returned future is dropped.
pub async fn wait_for_connection(
    registry: &dyn WaiterRegistry,
    request: RendezvousRequest,
    cancel: &CancellationToken,
    telemetry: &Telemetry,
) -> UaResult<ReverseConnection> {
    let span = telemetry.operation_span("reverse_connect_wait");
    async move {
        telemetry.record_rendezvous_wait();

        let (sender, mut receiver) = oneshot::channel();
        let id = registry.register(WaiterRegistration {
            endpoint_url: request.endpoint_url.clone(),
            server_uri: request.server_uri.clone(),
            sender,
        });
        let unregister = Unregister { registry, id };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => WaitOutcome::Cancelled,
            delivered = &mut receiver => {
                return match delivered {
                    Ok(connection) => {
                        info!(
                            endpoint = %request.endpoint_url,
                            server_uri = connection.server_uri().unwrap_or("<null>"),
                            "Server connected"
                        );
                        Ok(connection)
                    }
                    Err(_) => Err(UaError::connection_failed(
                        &request.endpoint_url,
                        "reverse connect registry dropped the waiter",
                    )),
                };
            }
            _ = tokio::time::sleep(request.timeout) => WaitOutcome::Elapsed,
        };

        drop(unregister);
        receiver.close();
        if let Ok(late) = receiver.try_recv() {
            warn!(
                endpoint = %request.endpoint_url,
                server_uri = late.server_uri().unwrap_or("<null>"),
                "Reverse connection arrived after the wait ended, closing"
            );
            drop(late);
        }

        telemetry.record_rendezvous_timeout();
        warn!(
            endpoint = %request.endpoint_url,
            timeout = ?request.timeout,
            outcome = %outcome,
            "No reverse connection"
        );
        Err(UaError::timeout(
            format!("reverse connection on {}", request.endpoint_url),
            request.timeout,
            outcome,
        ))
    }
    .instrument(span)
    .await
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reverse::ReverseHello;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    const LISTEN: &str = "opc.tcp://localhost:65300";

    fn connection(server_uri: &str) -> ReverseConnection {
        ReverseConnection::new(LISTEN, ReverseHello::new(server_uri, "opc.tcp://plc:4840"))
    }

    fn registration(server_uri: Option<&str>) -> (WaiterRegistration, oneshot::Receiver<ReverseConnection>) {
        let (sender, receiver) = oneshot::channel();
        (
            WaiterRegistration {
                endpoint_url: LISTEN.to_string(),
                server_uri: server_uri.map(str::to_string),
                sender,
            },
            receiver,
        )
    }

    fn request(timeout: Duration) -> RendezvousRequest {
        RendezvousRequest {
            endpoint_url: LISTEN.to_string(),
            server_uri: Some("urn:expected".to_string()),
            timeout,
        }
    }

    #[derive(Default)]
    struct CountingRegistry {
        hub: ReverseConnectHub,
        unregistered: AtomicUsize,
    }

    impl WaiterRegistry for CountingRegistry {
        fn register(&self, registration: WaiterRegistration) -> WaiterId {
            self.hub.register(registration)
        }

        fn unregister(&self, id: WaiterId) -> bool {
            self.unregistered.fetch_add(1, Ordering::SeqCst);
            self.hub.unregister(id)
        }

        fn offer(&self, connection: ReverseConnection) -> Result<WaiterId, ReverseConnection> {
            self.hub.offer(connection)
        }
    }

    #[test]
    fn test_first_waiter_wins_regardless_of_server_uri() {
        let hub = ReverseConnectHub::new();
        let (first, mut first_rx) = registration(Some("urn:expected"));
        let (second, mut second_rx) = registration(None);
        hub.register(first);
        hub.register(second);

        assert!(hub.offer(connection("urn:misreported")).is_ok());
        let delivered = first_rx.try_recv().unwrap();
        assert_eq!(delivered.server_uri(), Some("urn:misreported"));
        assert!(second_rx.try_recv().is_err());
        assert_eq!(hub.pending(), 1);
    }

    #[test]
    fn test_strict_hub_filters_server_uri() {
        let hub = ReverseConnectHub::strict();
        let (waiter, _rx) = registration(Some("urn:expected"));
        hub.register(waiter);

        assert!(hub.offer(connection("urn:other")).is_err());
        assert!(hub.offer(connection("urn:expected")).is_ok());
    }

    #[test]
    fn test_offer_without_waiter_returns_connection() {
        let hub = ReverseConnectHub::new();
        let returned = hub.offer(connection("urn:plc")).unwrap_err();
        assert_eq!(returned.server_uri(), Some("urn:plc"));

        let (waiter, rx) = registration(None);
        hub.register(waiter);
        drop(rx);
        assert!(hub.offer(connection("urn:plc")).is_err());
        assert_eq!(hub.pending(), 0);
    }

    #[test]
    fn test_other_listening_url_does_not_match() {
        let hub = ReverseConnectHub::new();
        let (waiter, _rx) = registration(None);
        hub.register(waiter);

        let elsewhere = ReverseConnection::new("opc.tcp://localhost:65301", ReverseHello::default());
        assert!(hub.offer(elsewhere).is_err());
        assert!(hub.offer(ReverseConnection::new("OPC.TCP://LOCALHOST:65300/", ReverseHello::default())).is_ok());
    }

    #[tokio::test]
    async fn test_wait_fulfilled() {
        let hub = Arc::new(ReverseConnectHub::new());
        let telemetry = Telemetry::new("test");
        let cancel = CancellationToken::new();

        let dialer = {
            let hub = Arc::clone(&hub);
            tokio::spawn(async move {
                while hub.pending() == 0 {
                    tokio::task::yield_now().await;
                }
                hub.offer(connection("urn:plc")).is_ok()
            })
        };

        let connection = wait_for_connection(&*hub, request(Duration::from_secs(5)), &cancel, &telemetry)
            .await
            .unwrap();
        assert_eq!(connection.server_uri(), Some("urn:plc"));
        assert!(dialer.await.unwrap());
        assert_eq!(hub.pending(), 0);
        assert_eq!(telemetry.snapshot().rendezvous_timeouts, 0);
    }

    #[tokio::test]
    async fn test_cancel_before_connect_unregisters_once() {
        let registry = CountingRegistry::default();
        let telemetry = Telemetry::new("test");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let error = wait_for_connection(&registry, request(Duration::from_secs(20)), &cancel, &telemetry)
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            UaError::Timeout {
                outcome: WaitOutcome::Cancelled,
                ..
            }
        ));
        assert_eq!(registry.unregistered.load(Ordering::SeqCst), 1);
        assert_eq!(registry.hub.pending(), 0);
        assert_eq!(telemetry.snapshot().rendezvous_timeouts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_elapses() {
        let registry = CountingRegistry::default();
        let telemetry = Telemetry::new("test");
        let cancel = CancellationToken::new();

        let error = wait_for_connection(&registry, request(Duration::from_secs(20)), &cancel, &telemetry)
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            UaError::Timeout {
                outcome: WaitOutcome::Elapsed,
                ..
            }
        ));
        assert_eq!(error.status_code(), crate::types::StatusCode::BAD_TIMEOUT);
        assert_eq!(registry.unregistered.load(Ordering::SeqCst), 1);
        assert_eq!(registry.hub.pending(), 0);
    }

    /// Delivers a connection the moment a waiter registers.
    struct EagerRegistry {
        connection: Mutex<Option<ReverseConnection>>,
        unregistered: AtomicUsize,
    }

    impl WaiterRegistry for EagerRegistry {
        fn register(&self, registration: WaiterRegistration) -> WaiterId {
            if let Some(connection) = self.connection.lock().take() {
                let _ = registration.sender.send(connection);
            }
            WaiterId(0)
        }

        fn unregister(&self, _id: WaiterId) -> bool {
            self.unregistered.fetch_add(1, Ordering::SeqCst);
            true
        }

        fn offer(&self, connection: ReverseConnection) -> Result<WaiterId, ReverseConnection> {
            Err(connection)
        }
    }

    #[tokio::test]
    async fn test_connection_delivered_after_cancel_is_closed() {
        use tokio::io::AsyncReadExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut server_side = tokio::net::TcpStream::connect(listener.local_addr().unwrap())
            .await
            .unwrap();
        let (accepted, peer) = listener.accept().await.unwrap();

        let registry = EagerRegistry {
            connection: Mutex::new(Some(ReverseConnection::with_stream(
                LISTEN,
                ReverseHello::new("urn:late", "opc.tcp://plc:4840"),
                peer,
                accepted,
            ))),
            unregistered: AtomicUsize::new(0),
        };
        let telemetry = Telemetry::new("test");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let error = wait_for_connection(&registry, request(Duration::from_secs(20)), &cancel, &telemetry)
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            UaError::Timeout {
                outcome: WaitOutcome::Cancelled,
                ..
            }
        ));
        assert_eq!(registry.unregistered.load(Ordering::SeqCst), 1);

        let mut buf = [0u8; 8];
        let read = tokio::time::timeout(Duration::from_secs(5), server_side.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read, 0);
    }

    #[tokio::test]
    async fn test_dropped_wait_unregisters() {
        let registry = CountingRegistry::default();
        let telemetry = Telemetry::new("test");
        let cancel = CancellationToken::new();

        {
            let wait = wait_for_connection(&registry, request(Duration::from_secs(20)), &cancel, &telemetry);
            tokio::pin!(wait);
            assert!(futures::poll!(wait.as_mut()).is_pending());
            assert_eq!(registry.hub.pending(), 1);
        }

        assert_eq!(registry.unregistered.load(Ordering::SeqCst), 1);
        assert_eq!(registry.hub.pending(), 0);
    }
}
