// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Endpoint selection.
//!
//! Discovery returns every endpoint a server advertises. Selection keeps the
//! ones whose scheme matches the discovery URL and that satisfy the
//! [`SecurityRequest`], then takes the highest security level (first seen
//! wins ties). The chosen address is rewritten to the host and port used for
//! discovery, since servers behind NAT advertise addresses the client cannot
//! reach.
//!
//! # Examples
//!
//! ```
//! use ua_client::endpoint::rewrite_address;
//!
//! assert_eq!(
//!     rewrite_address("opc.tcp://10.0.0.5:4840/ua/server", "opc.tcp://plant.example.com:14840"),
//!     "opc.tcp://plant.example.com:14840/ua/server"
//! );
//! ```

use std::fmt;

use tracing::{debug, info, Instrument};
use url::Url;

use crate::error::{UaError, UaResult};
use crate::reverse::ReverseConnection;
use crate::runtime::UaRuntime;
use crate::telemetry::Telemetry;
use crate::types::{url_scheme, EndpointDescriptor, SecurityMode, SecurityPolicy};

// =============================================================================
// SecurityRequest
// =============================================================================

/// Requested security of the selected endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecurityRequest {
    /// Mode None with policy None.
    #[default]
    None,
    /// Highest security level among endpoints with a mode other than None.
    Highest,
    /// The given mode, any policy.
    Mode(SecurityMode),
    /// Exactly this mode and policy.
    Exact {
        /// Security mode.
        mode: SecurityMode,
        /// Security policy.
        policy: SecurityPolicy,
    },
}

impl SecurityRequest {
    /// Maps a use-security flag: `true` is [`Highest`](Self::Highest).
    pub fn from_use_security(use_security: bool) -> Self {
        if use_security {
            Self::Highest
        } else {
            Self::None
        }
    }

    /// Returns `true` if the request asks for message security.
    pub fn uses_security(&self) -> bool {
        match self {
            Self::None => false,
            Self::Highest => true,
            Self::Mode(mode) | Self::Exact { mode, .. } => !mode.is_none(),
        }
    }

    /// Returns `true` if `endpoint` satisfies this request.
    pub fn accepts(&self, endpoint: &EndpointDescriptor) -> bool {
        match self {
            Self::None => {
                endpoint.security_mode == SecurityMode::None
                    && SecurityPolicy::None.matches_uri(&endpoint.security_policy_uri)
            }
            Self::Highest => !endpoint.security_mode.is_none(),
            Self::Mode(mode) => endpoint.security_mode == *mode,
            Self::Exact { mode, policy } => {
                endpoint.security_mode == *mode && policy.matches_uri(&endpoint.security_policy_uri)
            }
        }
    }
}

impl fmt::Display for SecurityRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None/None"),
            Self::Highest => write!(f, "highest security"),
            Self::Mode(mode) => write!(f, "{}/any policy", mode),
            Self::Exact { mode, policy } => write!(f, "{}/{}", mode, policy),
        }
    }
}

// =============================================================================
// Selection
// =============================================================================

/// Port of `opc.tcp` URLs that do not name one.
pub const DEFAULT_OPC_TCP_PORT: u16 = 4840;

/// Returns the explicit port of `url`, else the scheme default.
pub(crate) fn effective_port(url: &Url) -> Option<u16> {
    url.port_or_known_default().or_else(|| {
        url.scheme()
            .eq_ignore_ascii_case("opc.tcp")
            .then_some(DEFAULT_OPC_TCP_PORT)
    })
}

/// Adds `/discovery` to non `opc.tcp` URLs that lack it.
pub fn discovery_url(url: &str) -> String {
    if url.starts_with("opc.tcp:") || url.ends_with("/discovery") {
        url.to_string()
    } else {
        format!("{}/discovery", url.trim_end_matches('/'))
    }
}

/// Picks the best endpoint for `request` among those with scheme `scheme`.
///
/// Deterministic: the highest security level wins, the first seen wins ties.
pub fn choose_endpoint<'a>(
    endpoints: &'a [EndpointDescriptor],
    scheme: &str,
    request: &SecurityRequest,
) -> Option<&'a EndpointDescriptor> {
    endpoints
        .iter()
        .filter(|endpoint| endpoint.scheme().eq_ignore_ascii_case(scheme))
        .filter(|endpoint| request.accepts(endpoint))
        .fold(None, |best: Option<&EndpointDescriptor>, endpoint| match best {
            Some(current) if endpoint.security_level <= current.security_level => Some(current),
            _ => Some(endpoint),
        })
}

/// Replaces host and port of `endpoint_url` with those of `reference_url`.
///
/// Leaves the URL untouched when the schemes differ, either URL does not
/// parse, or host and port already match.
pub fn rewrite_address(endpoint_url: &str, reference_url: &str) -> String {
    let (Ok(mut endpoint), Ok(reference)) = (Url::parse(endpoint_url), Url::parse(reference_url))
    else {
        return endpoint_url.to_string();
    };

    if !endpoint.scheme().eq_ignore_ascii_case(reference.scheme()) {
        return endpoint_url.to_string();
    }

    let Some(host) = reference.host_str() else {
        return endpoint_url.to_string();
    };
    let port = effective_port(&reference);

    let same_host = endpoint
        .host_str()
        .is_some_and(|current| current.eq_ignore_ascii_case(host));
    if same_host && effective_port(&endpoint) == port {
        return endpoint_url.to_string();
    }

    if endpoint.set_host(Some(host)).is_err() || endpoint.set_port(port).is_err() {
        return endpoint_url.to_string();
    }
    endpoint.to_string()
}

/// Selects an endpoint through discovery at `url`.
pub async fn select_endpoint<R>(
    runtime: &R,
    url: &str,
    request: &SecurityRequest,
    telemetry: &Telemetry,
) -> UaResult<EndpointDescriptor>
where
    R: UaRuntime + ?Sized,
{
    let discovery = discovery_url(url);
    async {
        debug!(url = %discovery, request = %request, "Discovering endpoints");
        let endpoints = runtime.discover_endpoints(&discovery).await?;
        pick(&endpoints, &discovery, &discovery, request)
    }
    .instrument(telemetry.operation_span("select_endpoint"))
    .await
}

/// Selects an endpoint through a reverse connection.
///
/// The connection is consumed. Addresses are rewritten against the endpoint
/// URL the server reported in its hello.
pub async fn select_endpoint_via<R>(
    runtime: &R,
    connection: ReverseConnection,
    request: &SecurityRequest,
    telemetry: &Telemetry,
) -> UaResult<EndpointDescriptor>
where
    R: UaRuntime + ?Sized,
{
    let Some(reference) = connection.endpoint_url().map(str::to_string) else {
        return Err(UaError::connection_failed(
            connection.listener_url(),
            "server sent no endpoint URL in its ReverseHello",
        ));
    };

    async {
        debug!(url = %reference, request = %request, "Discovering endpoints over reverse connection");
        let endpoints = runtime.discover_endpoints_via(connection, &reference).await?;
        pick(&endpoints, &reference, &reference, request)
    }
    .instrument(telemetry.operation_span("select_endpoint"))
    .await
}

fn pick(
    endpoints: &[EndpointDescriptor],
    discovery: &str,
    reference: &str,
    request: &SecurityRequest,
) -> UaResult<EndpointDescriptor> {
    let scheme = url_scheme(discovery);
    let mut selected = choose_endpoint(endpoints, scheme, request)
        .cloned()
        .ok_or_else(|| UaError::endpoint_not_found(discovery, request))?;

    let rewritten = rewrite_address(&selected.endpoint_url, reference);
    if rewritten != selected.endpoint_url {
        debug!(advertised = %selected.endpoint_url, rewritten = %rewritten, "Rewrote endpoint address");
        selected.endpoint_url = rewritten;
    }

    info!(
        endpoint = %selected.endpoint_url,
        mode = %selected.security_mode,
        policy = %selected.security_policy_uri,
        level = selected.security_level,
        "Endpoint selected"
    );
    Ok(selected)
}

// =============================================================================
// Tests
// =============================================================================
