// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session establishment.
//!
//! ```text
//!                  ┌─────────────────────────────┐
//!                  │ identity / security checks  │
//!                  │ load application identity   │
//!                  └──────────────┬──────────────┘
//!                 direct          │          reverse
//!          ┌──────────────────────┴──────────────────────┐
//!          ▼                                             ▼
//!   select_endpoint(target)                 wait_for_connection  (1st)
//!          │                                select_endpoint_via(1st)
//!          │                                wait_for_connection  (2nd)
//!          └──────────────────────┬──────────────────────┘
//!                                 ▼
//!                   open_session(endpoint, trust gate)
//! ```
//!
//! In reverse mode the target is the client URL the server dials. The two
//! waits are independent: the first connection is consumed by discovery,
//! the session runs on the second.
//!
//! Every call shape exists as an async method and a `_blocking` twin with
//! the same semantics.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use crate::certificate::{ApplicationIdentity, TrustGate, TrustPolicy};
use crate::config::ClientConfig;
use crate::endpoint::{select_endpoint, select_endpoint_via, SecurityRequest};
use crate::error::{ConfigurationError, UaError, UaResult};
use crate::reverse::{
    wait_for_connection, RendezvousRequest, ReverseConnectHub, ReverseConnectListener,
    ReverseConnection, WaiterRegistry,
};
use crate::runtime::{OpenSessionRequest, SessionChannel, UaRuntime, UaSession};
use crate::services::Services;
use crate::telemetry::Telemetry;
use crate::types::{EndpointDescriptor, UserIdentity};

// =============================================================================
// SessionRequest
// =============================================================================

/// What to connect to and how.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    /// Server URL, or the client listening URL in reverse mode.
    pub target: String,
    /// User identity.
    pub identity: UserIdentity,
    /// Requested endpoint security.
    pub security: SecurityRequest,
    /// Wait for the server to dial in.
    pub reverse_connect: bool,
    /// Session name; the configured name when unset.
    pub session_name: Option<String>,
    /// Server URI filter for strict reverse connect registries.
    pub server_uri: Option<String>,
    /// Trust policy for this call; the factory policy when unset.
    pub trust: Option<TrustPolicy>,
}

impl SessionRequest {
    /// Creates an anonymous request without security.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            identity: UserIdentity::Anonymous,
            security: SecurityRequest::None,
            reverse_connect: false,
            session_name: None,
            server_uri: None,
            trust: None,
        }
    }

    /// Sets the user identity.
    pub fn with_identity(mut self, identity: UserIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Requests the highest available security, or none.
    pub fn with_security(mut self, use_security: bool) -> Self {
        self.security = SecurityRequest::from_use_security(use_security);
        self
    }

    /// Requests a specific endpoint security.
    pub fn with_security_request(mut self, security: SecurityRequest) -> Self {
        self.security = security;
        self
    }

    /// Enables reverse connect.
    pub fn with_reverse_connect(mut self, reverse_connect: bool) -> Self {
        self.reverse_connect = reverse_connect;
        self
    }

    /// Sets the session name.
    pub fn with_session_name(mut self, name: impl Into<String>) -> Self {
        self.session_name = Some(name.into());
        self
    }

    /// Sets the server URI filter.
    pub fn with_server_uri(mut self, server_uri: impl Into<String>) -> Self {
        self.server_uri = Some(server_uri.into());
        self
    }

    /// Sets the trust policy for this call.
    pub fn with_trust_policy(mut self, policy: TrustPolicy) -> Self {
        self.trust = Some(policy);
        self
    }
}

// =============================================================================
// SessionHandle
// =============================================================================

/// An open session.
///
/// Close it with [`close`](Self::close). Dropping an open handle schedules a
/// close on the current tokio runtime, or closes it in place when no runtime
/// is running.
pub struct SessionHandle<S: UaSession> {
    session: Arc<S>,
    endpoint: EndpointDescriptor,
    config: Arc<ClientConfig>,
    closed: bool,
}

impl<S: UaSession> SessionHandle<S> {
    fn new(session: S, endpoint: EndpointDescriptor, config: Arc<ClientConfig>) -> Self {
        Self {
            session: Arc::new(session),
            endpoint,
            config,
            closed: false,
        }
    }

    /// Returns the runtime session.
    pub fn session(&self) -> &S {
        &self.session
    }

    /// Returns the endpoint the session was opened on.
    pub fn endpoint(&self) -> &EndpointDescriptor {
        &self.endpoint
    }

    /// Returns service calls on this session using the configured paging.
    pub fn services<'a>(&'a self, telemetry: &'a Telemetry) -> Services<'a, S> {
        Services::new(self.session.as_ref(), telemetry).with_paging(&self.config.paging)
    }

    /// Closes the session.
    pub async fn close(mut self) -> UaResult<()> {
        self.closed = true;
        let result = self.session.close().await;
        match &result {
            Ok(()) => info!(endpoint = %self.endpoint.endpoint_url, "Session closed"),
            Err(e) => e.log("close session"),
        }
        result
    }

    /// Closes the session from synchronous code.
    pub fn close_blocking(self) -> UaResult<()> {
        block_on("close_blocking", self.close())?
    }
}

impl<S: UaSession> Drop for SessionHandle<S> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        warn!(endpoint = %self.endpoint.endpoint_url, "Session handle dropped without close");
        let session = Arc::clone(&self.session);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(e) = session.close().await {
                        e.log("close dropped session");
                    }
                });
            }
            Err(_) => {
                if let Err(e) = block_on("drop", session.close()).and_then(|closed| closed) {
                    e.log("close dropped session");
                }
            }
        }
    }
}

impl<S: UaSession> std::fmt::Debug for SessionHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("endpoint", &self.endpoint.endpoint_url)
            .field("security_mode", &self.endpoint.security_mode)
            .field("closed", &self.closed)
            .finish()
    }
}

// =============================================================================
// SessionFactory
// =============================================================================

/// Opens sessions through a client runtime.
///
/// # Examples
///
/// ```rust,ignore
/// use tokio_util::sync::CancellationToken;
/// use ua_client::prelude::*;
///
/// let factory = SessionFactory::new(runtime, ClientConfig::default());
/// let telemetry = Telemetry::new("monitor");
///
/// let handle = factory
///     .create_anonymous("opc.tcp://localhost:4850", false, false, &CancellationToken::new(), &telemetry)
///     .await?;
/// ```
pub struct SessionFactory<R: UaRuntime> {
    runtime: R,
    config: Arc<ClientConfig>,
    registry: Option<Arc<dyn WaiterRegistry>>,
    trust: TrustPolicy,
}

impl<R: UaRuntime> SessionFactory<R> {
    /// Creates a factory.
    pub fn new(runtime: R, config: ClientConfig) -> Self {
        Self {
            runtime,
            config: Arc::new(config),
            registry: None,
            trust: TrustPolicy::default(),
        }
    }

    /// Uses an externally fed waiter registry for reverse connect instead
    /// of binding a listener per call.
    pub fn with_registry(mut self, registry: Arc<dyn WaiterRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Sets the default trust policy.
    pub fn with_trust_policy(mut self, policy: TrustPolicy) -> Self {
        self.trust = policy;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the runtime.
    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    // -------------------------------------------------------------------------
    // Call shapes
    // -------------------------------------------------------------------------

    /// Opens an anonymous session.
    pub async fn create_anonymous(
        &self,
        target: &str,
        use_security: bool,
        reverse_connect: bool,
        cancel: &CancellationToken,
        telemetry: &Telemetry,
    ) -> UaResult<SessionHandle<R::Session>> {
        let request = SessionRequest::new(target)
            .with_security(use_security)
            .with_reverse_connect(reverse_connect);
        self.create_session(&request, cancel, telemetry).await
    }

    /// Blocking form of [`create_anonymous`](Self::create_anonymous).
    pub fn create_anonymous_blocking(
        &self,
        target: &str,
        use_security: bool,
        reverse_connect: bool,
        cancel: &CancellationToken,
        telemetry: &Telemetry,
    ) -> UaResult<SessionHandle<R::Session>> {
        block_on(
            "create_anonymous_blocking",
            self.create_anonymous(target, use_security, reverse_connect, cancel, telemetry),
        )?
    }

    /// Opens a session for `request`.
    ///
    /// Fails with a configuration error when a non-anonymous identity is
    /// used without security, and with `CertificateInvalid` when security
    /// is requested but the application certificate is unusable.
    pub async fn create_session(
        &self,
        request: &SessionRequest,
        cancel: &CancellationToken,
        telemetry: &Telemetry,
    ) -> UaResult<SessionHandle<R::Session>> {
        let span = telemetry.operation_span("create_session");
        async {
            let application = self.prepare(request)?;
            let gate = self.trust_gate(request, telemetry);
            let (endpoint, channel) = if request.reverse_connect {
                self.reverse_endpoint(request, cancel, telemetry).await?
            } else {
                let endpoint =
                    select_endpoint(&self.runtime, &request.target, &request.security, telemetry).await?;
                (endpoint, SessionChannel::Direct)
            };
            self.open(request, application.as_ref(), &gate, endpoint, channel, telemetry)
                .await
        }
        .instrument(span)
        .await
    }

    /// Blocking form of [`create_session`](Self::create_session).
    pub fn create_session_blocking(
        &self,
        request: &SessionRequest,
        cancel: &CancellationToken,
        telemetry: &Telemetry,
    ) -> UaResult<SessionHandle<R::Session>> {
        block_on(
            "create_session_blocking",
            self.create_session(request, cancel, telemetry),
        )?
    }

    /// Opens a session on an already selected endpoint, skipping discovery.
    pub async fn create_session_for_endpoint(
        &self,
        endpoint: &EndpointDescriptor,
        request: &SessionRequest,
        telemetry: &Telemetry,
    ) -> UaResult<SessionHandle<R::Session>> {
        let span = telemetry.operation_span("create_session");
        async {
            let application = self.prepare(request)?;
            let gate = self.trust_gate(request, telemetry);
            self.open(
                request,
                application.as_ref(),
                &gate,
                endpoint.clone(),
                SessionChannel::Direct,
                telemetry,
            )
            .await
        }
        .instrument(span)
        .await
    }

    // -------------------------------------------------------------------------
    // Steps
    // -------------------------------------------------------------------------

    fn prepare(&self, request: &SessionRequest) -> UaResult<Option<ApplicationIdentity>> {
        let uses_security = request.security.uses_security();
        if !uses_security && !request.identity.is_anonymous() {
            return Err(ConfigurationError::IdentityRequiresSecurity {
                token_type: request.identity.type_name(),
            }
            .into());
        }

        if !uses_security {
            return Ok(None);
        }
        let identity = ApplicationIdentity::load(&self.config.security)?;
        Ok(Some(identity))
    }

    fn trust_gate<'a>(&'a self, request: &'a SessionRequest, telemetry: &'a Telemetry) -> TrustGate<'a> {
        let policy = request.trust.as_ref().unwrap_or(&self.trust);
        TrustGate::new(policy, &self.config.security, telemetry)
    }

    async fn reverse_endpoint(
        &self,
        request: &SessionRequest,
        cancel: &CancellationToken,
        telemetry: &Telemetry,
    ) -> UaResult<(EndpointDescriptor, SessionChannel)> {
        let scoped;
        let registry: &dyn WaiterRegistry = match &self.registry {
            Some(registry) => registry.as_ref(),
            None => {
                scoped = ScopedListener::start(&request.target, &self.config).await?;
                scoped.hub.as_ref()
            }
        };

        let first = self.rendezvous(registry, request, cancel, telemetry).await?;
        debug!(
            server_uri = first.server_uri().unwrap_or("<null>"),
            "Selecting endpoint over reverse connection"
        );
        let endpoint = select_endpoint_via(&self.runtime, first, &request.security, telemetry).await?;

        let second = self.rendezvous(registry, request, cancel, telemetry).await?;
        Ok((endpoint, SessionChannel::Reverse(second)))
    }

    async fn rendezvous(
        &self,
        registry: &dyn WaiterRegistry,
        request: &SessionRequest,
        cancel: &CancellationToken,
        telemetry: &Telemetry,
    ) -> UaResult<ReverseConnection> {
        debug!(endpoint = %request.target, "Waiting for reverse connection");
        wait_for_connection(
            registry,
            RendezvousRequest {
                endpoint_url: request.target.clone(),
                server_uri: request.server_uri.clone(),
                timeout: self.config.reverse_connect.effective_wait_timeout(),
            },
            cancel,
            telemetry,
        )
        .await
    }

    async fn open(
        &self,
        request: &SessionRequest,
        application: Option<&ApplicationIdentity>,
        gate: &TrustGate<'_>,
        endpoint: EndpointDescriptor,
        channel: SessionChannel,
        telemetry: &Telemetry,
    ) -> UaResult<SessionHandle<R::Session>> {
        let application_uri = match application {
            Some(identity) => identity.application_uri.clone(),
            None => self.config.effective_application_uri(),
        };
        let session_name = if channel.is_reverse() {
            self.config.reverse_connect.reverse_session_name.as_str()
        } else {
            request
                .session_name
                .as_deref()
                .unwrap_or(self.config.session_name.as_str())
        };
        let reverse = channel.is_reverse();

        let session = self
            .runtime
            .open_session(OpenSessionRequest {
                endpoint: &endpoint,
                channel,
                identity: &request.identity,
                application,
                application_uri: &application_uri,
                session_name,
                session_timeout: self.config.session_timeout,
                operation_timeout: self.config.operation_timeout,
                validator: gate,
            })
            .await?;

        telemetry.record_session_opened();
        info!(
            endpoint = %endpoint.endpoint_url,
            mode = %endpoint.security_mode,
            identity = request.identity.type_name(),
            session_name,
            reverse,
            "Session opened"
        );
        Ok(SessionHandle::new(session, endpoint, Arc::clone(&self.config)))
    }
}

impl<R: UaRuntime + std::fmt::Debug> std::fmt::Debug for SessionFactory<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionFactory")
            .field("runtime", &self.runtime)
            .field("config", &self.config)
            .field("external_registry", &self.registry.is_some())
            .field("trust", &self.trust)
            .finish()
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Listener bound for the duration of one establishment call.
struct ScopedListener {
    hub: Arc<ReverseConnectHub>,
    shutdown: CancellationToken,
    _task: JoinHandle<UaResult<()>>,
}

impl ScopedListener {
    async fn start(endpoint_url: &str, config: &ClientConfig) -> UaResult<Self> {
        let hub = Arc::new(if config.reverse_connect.strict_server_uri {
            ReverseConnectHub::strict()
        } else {
            ReverseConnectHub::new()
        });
        let listener = ReverseConnectListener::bind(
            endpoint_url,
            config.reverse_connect.listen_backlog,
            Arc::clone(&hub) as Arc<dyn WaiterRegistry>,
        )
        .await?;
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(listener.run(shutdown.clone()));
        Ok(Self {
            hub,
            shutdown,
            _task: task,
        })
    }
}

impl Drop for ScopedListener {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn block_on<F: Future>(operation: &'static str, future: F) -> UaResult<F::Output> {
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(ConfigurationError::BlockingInRuntime { operation }.into());
    }
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| UaError::io("building runtime for blocking call", e))?;
    Ok(runtime.block_on(future))
}
