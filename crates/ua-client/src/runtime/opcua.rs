// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Runtime adapter for the `opcua` crate client.
//!
//! The `opcua` client is synchronous and owns its own executor, so every
//! call is moved to the blocking pool.
//!
//! Server certificates are decided before the client is built: a
//! certificate that is not in the trusted directory is handed to the
//! call's validator, and an accepted certificate is trusted for that one
//! client only.
//!
//! Reverse connect is not available through this runtime.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, info, trace, warn};

use opcua::client::prelude::{
    AttributeService, Client, ClientBuilder, HistoryReadAction, IdentityToken, Session,
    SessionInfo, ViewService,
};
use opcua::sync::RwLock as OpcUaRwLock;
use opcua::types as ua;

use super::{
    BrowseDescription, BrowseResult, HistoryPayload, HistoryReadDetails, HistoryReadResult,
    HistoryReadValueId, OpenSessionRequest, ReadValueId, SessionChannel, UaRuntime, UaSession,
};
use crate::certificate::{CertificateInfo, CertificateValidationEvent, ValidationFailure};
use crate::error::{CertificateError, ConfigurationError, UaError, UaResult};
use crate::reverse::ReverseConnection;
use crate::types::{
    ContinuationPoint, DataValue, EndpointDescriptor, EventFilter, HistoryData, HistoryEvent,
    HistoryEventFieldList, NodeClass, NodeId, NodeIdentifier, QualifiedName, ReferenceDescription,
    SecurityMode, StatusCode, UserIdentity, Variant,
};

// =============================================================================
// OpcUaRuntime
// =============================================================================

/// [`UaRuntime`] backed by the `opcua` crate.
#[derive(Debug, Clone)]
pub struct OpcUaRuntime {
    application_name: String,
}

impl Default for OpcUaRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl OpcUaRuntime {
    /// Creates the runtime.
    pub fn new() -> Self {
        Self {
            application_name: crate::NAME.to_string(),
        }
    }

    /// Sets the application name announced by the underlying client.
    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }

    /// Decides on the server certificate of `endpoint`.
    ///
    /// Returns `true` when the certificate was accepted by the validator and
    /// must be trusted explicitly for this client.
    fn decide_server_certificate(request: &OpenSessionRequest<'_>) -> UaResult<bool> {
        let endpoint = request.endpoint;
        if endpoint.security_mode.is_none() {
            return Ok(false);
        }
        let Some(der) = endpoint.server_certificate.as_deref() else {
            debug!(endpoint = %endpoint.endpoint_url, "Endpoint carries no server certificate");
            return Ok(false);
        };

        let certificate = match CertificateInfo::from_der(der) {
            Ok(certificate) => certificate,
            Err(reason) => {
                warn!(endpoint = %endpoint.endpoint_url, reason = %reason, "Unparseable server certificate");
                return Err(CertificateError::rejected(
                    "<unparseable>",
                    hex::encode(Sha256::digest(der)),
                    StatusCode::BAD_CERTIFICATE_INVALID,
                )
                .into());
            }
        };

        let trusted_dir = request
            .application
            .and_then(|application| application.trusted_dir.as_deref());
        if trusted_dir.is_some_and(|dir| is_trusted(dir, &certificate.thumbprint)) {
            trace!(thumbprint = %certificate.thumbprint, "Server certificate is in the trust list");
            return Ok(false);
        }

        let failure = if certificate.is_valid_at(Utc::now()) {
            ValidationFailure::Untrusted
        } else {
            ValidationFailure::TimeInvalid
        };
        let event = CertificateValidationEvent {
            certificate,
            failure,
        };

        if request.validator.accept(&event) {
            Ok(true)
        } else {
            Err(CertificateError::rejected(
                &event.certificate.subject,
                &event.certificate.thumbprint,
                failure.status_code(),
            )
            .into())
        }
    }
}

fn is_trusted(dir: &Path, thumbprint: &str) -> bool {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return false;
    };
    entries
        .filter_map(Result::ok)
        .filter_map(|entry| std::fs::read(entry.path()).ok())
        .filter_map(|data| CertificateInfo::parse(&data).ok())
        .any(|certificate| certificate.thumbprint == thumbprint)
}

#[async_trait]
impl UaRuntime for OpcUaRuntime {
    type Session = OpcUaSession;

    async fn discover_endpoints(&self, url: &str) -> UaResult<Vec<EndpointDescriptor>> {
        let target = url.to_string();
        let url = target.clone();
        let name = self.application_name.clone();

        let endpoints = run_blocking(&target, "GetEndpoints", move || {
            let client = ClientBuilder::new()
                .application_name(name.as_str())
                .create_sample_keypair(false)
                .session_retry_limit(0)
                .client()
                .ok_or_else(|| UaError::connection_failed(&url, "failed to build discovery client"))?;
            client
                .get_server_endpoints_from_url(url.as_str())
                .map_err(|status| UaError::connection_failed(&url, format!("GetEndpoints failed: {}", status)))
        })
        .await?;

        let descriptors: Vec<EndpointDescriptor> =
            endpoints.iter().filter_map(from_opcua_endpoint).collect();
        debug!(
            advertised = endpoints.len(),
            usable = descriptors.len(),
            "Endpoints discovered"
        );
        Ok(descriptors)
    }

    async fn discover_endpoints_via(
        &self,
        _connection: ReverseConnection,
        _url: &str,
    ) -> UaResult<Vec<EndpointDescriptor>> {
        Err(reverse_unsupported())
    }

    async fn open_session(&self, request: OpenSessionRequest<'_>) -> UaResult<OpcUaSession> {
        if let SessionChannel::Reverse(_) = request.channel {
            return Err(reverse_unsupported());
        }

        let trust_server = Self::decide_server_certificate(&request)?;

        let endpoint = request.endpoint.clone();
        let target = endpoint.endpoint_url.clone();
        let url = target.clone();
        let identity = identity_token(request.identity);
        let application_name = self.application_name.clone();
        let session_name = request.session_name.to_string();
        let application_uri = request.application_uri.to_string();
        let session_timeout = u32::try_from(request.session_timeout.as_millis()).unwrap_or(u32::MAX);
        let application = request.application.map(|application| {
            (
                application.certificate_path.clone(),
                application.private_key_path.clone(),
                application.trusted_dir.clone(),
            )
        });

        let session = run_blocking(&target, "CreateSession", move || {
            let mut builder = ClientBuilder::new()
                .application_name(application_name.as_str())
                .application_uri(application_uri.as_str())
                .session_name(session_name.as_str())
                .session_timeout(session_timeout)
                .session_retry_limit(0)
                .create_sample_keypair(false)
                .trust_server_certs(trust_server);

            if let Some((certificate_path, private_key_path, trusted_dir)) = &application {
                builder = builder
                    .certificate_path(certificate_path)
                    .private_key_path(private_key_path);
                if let Some(pki) = trusted_dir.as_deref().and_then(pki_root) {
                    builder = builder.pki_dir(pki);
                }
            }

            let mut client: Client = builder
                .client()
                .ok_or_else(|| UaError::connection_failed(&url, "failed to build client"))?;

            let advertised = client
                .get_server_endpoints_from_url(url.as_str())
                .map_err(|status| UaError::connection_failed(&url, format!("GetEndpoints failed: {}", status)))?;
            let mut selected = advertised
                .into_iter()
                .find(|candidate| {
                    candidate.security_mode as u32 == endpoint.security_mode.value()
                        && candidate.security_policy_uri.as_ref() == endpoint.security_policy_uri
                })
                .ok_or_else(|| UaError::endpoint_not_found(&url, &endpoint))?;
            selected.endpoint_url = ua::UAString::from(url.as_str());

            let session = client
                .new_session_from_info(SessionInfo {
                    endpoint: selected,
                    user_identity_token: identity,
                    preferred_locales: Vec::new(),
                })
                .map_err(|reason| UaError::connection_failed(&url, reason))?;
            session
                .write()
                .connect_and_activate()
                .map_err(|status| UaError::connection_failed(&url, format!("session activation failed: {}", status)))?;
            Ok(session)
        })
        .await?;

        info!(endpoint = %request.endpoint, trusted_explicitly = trust_server, "opcua session active");
        Ok(OpcUaSession {
            inner: session,
            endpoint_url: request.endpoint.endpoint_url.clone(),
        })
    }
}

fn reverse_unsupported() -> UaError {
    UaError::configuration(ConfigurationError::Unsupported(
        "reverse connect is not available with the opcua runtime".to_string(),
    ))
}

/// `<pki>/trusted/certs` to `<pki>`.
fn pki_root(trusted_dir: &Path) -> Option<&Path> {
    trusted_dir.parent()?.parent()
}

async fn run_blocking<T, F>(target: &str, operation: &'static str, call: F) -> UaResult<T>
where
    F: FnOnce() -> UaResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(call).await.map_err(|e| {
        UaError::connection_failed(target, format!("{} task failed: {}", operation, e))
    })?
}

// =============================================================================
// OpcUaSession
// =============================================================================

/// [`UaSession`] backed by an `opcua` crate session.
pub struct OpcUaSession {
    inner: Arc<OpcUaRwLock<Session>>,
    endpoint_url: String,
}

impl std::fmt::Debug for OpcUaSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpcUaSession")
            .field("endpoint_url", &self.endpoint_url)
            .finish_non_exhaustive()
    }
}

impl OpcUaSession {
    async fn call<T, F>(&self, service: &'static str, call: F) -> UaResult<T>
    where
        F: FnOnce(&Session) -> Result<T, ua::StatusCode> + Send + 'static,
        T: Send + 'static,
    {
        let session = Arc::clone(&self.inner);
        run_blocking(&self.endpoint_url, service, move || {
            let session = session.read();
            call(&session).map_err(|status| UaError::service_failure(service, from_status(status)))
        })
        .await
    }
}

#[async_trait]
impl UaSession for OpcUaSession {
    async fn browse(&self, nodes: &[BrowseDescription]) -> UaResult<Vec<BrowseResult>> {
        // The opcua session fixes the references per node of a Browse request.
        let descriptions: Vec<ua::BrowseDescription> = nodes
            .iter()
            .map(|node| ua::BrowseDescription {
                node_id: to_opcua_node_id(&node.node_id),
                browse_direction: ua::BrowseDirection::Forward,
                reference_type_id: to_opcua_node_id(&node.reference_type_id),
                include_subtypes: node.include_subtypes,
                node_class_mask: node.node_class_mask,
                result_mask: ua::BrowseDescriptionResultMask::all().bits(),
            })
            .collect();

        let results = self
            .call("Browse", move |session| session.browse(&descriptions))
            .await?;
        Ok(results.unwrap_or_default().iter().map(from_browse_result).collect())
    }

    async fn browse_next(
        &self,
        release: bool,
        points: &[ContinuationPoint],
    ) -> UaResult<Vec<BrowseResult>> {
        let points: Vec<ua::ByteString> = points
            .iter()
            .map(|point| ua::ByteString::from(point.as_bytes()))
            .collect();

        let results = self
            .call("BrowseNext", move |session| session.browse_next(release, &points))
            .await?;
        Ok(results.unwrap_or_default().iter().map(from_browse_result).collect())
    }

    async fn read(&self, items: &[ReadValueId]) -> UaResult<Vec<DataValue>> {
        let items: Vec<ua::ReadValueId> = items
            .iter()
            .map(|item| ua::ReadValueId {
                node_id: to_opcua_node_id(&item.node_id),
                attribute_id: item.attribute_id.value(),
                index_range: ua::UAString::null(),
                data_encoding: ua::QualifiedName::null(),
            })
            .collect();

        let values = self
            .call("Read", move |session| {
                session.read(&items, ua::TimestampsToReturn::Both, 0.0)
            })
            .await?;
        Ok(values.iter().map(from_data_value).collect())
    }

    async fn history_read(
        &self,
        details: &HistoryReadDetails,
        release: bool,
        items: &[HistoryReadValueId],
    ) -> UaResult<Vec<HistoryReadResult>> {
        let action = history_action(details);
        let items: Vec<ua::HistoryReadValueId> = items
            .iter()
            .map(|item| ua::HistoryReadValueId {
                node_id: to_opcua_node_id(&item.node_id),
                index_range: ua::UAString::null(),
                data_encoding: ua::QualifiedName::null(),
                continuation_point: item
                    .continuation_point
                    .as_ref()
                    .map(|point| ua::ByteString::from(point.as_bytes()))
                    .unwrap_or_else(ua::ByteString::null),
            })
            .collect();

        let results = self
            .call("HistoryRead", move |session| {
                session.history_read(action, ua::TimestampsToReturn::Both, release, &items)
            })
            .await?;
        Ok(results.iter().map(from_history_result).collect())
    }

    async fn close(&self) -> UaResult<()> {
        let session = Arc::clone(&self.inner);
        run_blocking(&self.endpoint_url, "CloseSession", move || {
            session.read().disconnect();
            Ok(())
        })
        .await
    }
}

// =============================================================================
// Conversions
// =============================================================================

fn from_status(status: ua::StatusCode) -> StatusCode {
    StatusCode(status.bits())
}

fn from_opcua_endpoint(endpoint: &ua::EndpointDescription) -> Option<EndpointDescriptor> {
    let Some(security_mode) = SecurityMode::from_value(endpoint.security_mode as u32) else {
        trace!(url = %endpoint.endpoint_url, "Skipping endpoint with invalid security mode");
        return None;
    };

    let mut descriptor = EndpointDescriptor::new(
        endpoint.endpoint_url.as_ref(),
        security_mode,
        endpoint.security_policy_uri.as_ref(),
        endpoint.security_level,
    );
    let server_uri: &str = endpoint.server.application_uri.as_ref();
    if !server_uri.is_empty() {
        descriptor.server_uri = Some(server_uri.to_string());
    }
    descriptor.server_certificate = endpoint
        .server_certificate
        .value
        .clone()
        .filter(|der| !der.is_empty());
    Some(descriptor)
}

fn identity_token(identity: &UserIdentity) -> IdentityToken {
    match identity {
        UserIdentity::Anonymous => IdentityToken::Anonymous,
        UserIdentity::UserName { username, password } => {
            IdentityToken::UserName(username.clone(), password.clone())
        }
        UserIdentity::Certificate {
            certificate_path,
            private_key_path,
        } => IdentityToken::X509(certificate_path.into(), private_key_path.into()),
    }
}

fn to_opcua_node_id(node_id: &NodeId) -> ua::NodeId {
    match &node_id.identifier {
        NodeIdentifier::Numeric(v) => ua::NodeId::new(node_id.namespace_index, *v),
        NodeIdentifier::String(v) => ua::NodeId::new(node_id.namespace_index, v.clone()),
        NodeIdentifier::Guid(v) => ua::NodeId::new(node_id.namespace_index, ua::Guid::from(*v)),
        NodeIdentifier::Opaque(v) => {
            ua::NodeId::new(node_id.namespace_index, ua::ByteString::from(v.as_slice()))
        }
    }
}

fn from_opcua_node_id(node_id: &ua::NodeId) -> NodeId {
    let namespace_index = node_id.namespace;
    match &node_id.identifier {
        ua::Identifier::Numeric(v) => NodeId::numeric(namespace_index, *v),
        ua::Identifier::String(v) => NodeId::string(namespace_index, v.as_ref()),
        ua::Identifier::Guid(v) => NodeId::guid(namespace_index, uuid::Uuid::from_bytes(*v.as_bytes())),
        ua::Identifier::ByteString(v) => {
            NodeId::opaque(namespace_index, v.value.clone().unwrap_or_default())
        }
    }
}

fn to_opcua_date_time(value: chrono::DateTime<Utc>) -> ua::DateTime {
    ua::DateTime::from(value)
}

fn from_opcua_variant(variant: &ua::Variant) -> Variant {
    match variant {
        ua::Variant::Empty => Variant::Null,
        ua::Variant::Boolean(v) => Variant::Boolean(*v),
        ua::Variant::SByte(v) => Variant::Int32(i32::from(*v)),
        ua::Variant::Byte(v) => Variant::UInt32(u32::from(*v)),
        ua::Variant::Int16(v) => Variant::Int32(i32::from(*v)),
        ua::Variant::UInt16(v) => Variant::UInt32(u32::from(*v)),
        ua::Variant::Int32(v) => Variant::Int32(*v),
        ua::Variant::UInt32(v) => Variant::UInt32(*v),
        ua::Variant::Int64(v) => Variant::Int64(*v),
        ua::Variant::UInt64(v) => Variant::UInt64(*v),
        ua::Variant::Float(v) => Variant::Float(*v),
        ua::Variant::Double(v) => Variant::Double(*v),
        ua::Variant::String(v) => Variant::String(v.as_ref().to_string()),
        ua::Variant::DateTime(v) => Variant::DateTime(v.as_chrono()),
        ua::Variant::ByteString(v) => Variant::ByteString(v.value.clone().unwrap_or_default()),
        ua::Variant::NodeId(v) => Variant::NodeId(from_opcua_node_id(v)),
        ua::Variant::StatusCode(v) => Variant::StatusCode(from_status(*v)),
        ua::Variant::LocalizedText(v) => Variant::String(v.text.as_ref().to_string()),
        ua::Variant::QualifiedName(v) => Variant::String(v.name.as_ref().to_string()),
        ua::Variant::Array(array) => {
            Variant::Array(array.values.iter().map(from_opcua_variant).collect())
        }
        other => Variant::String(format!("{:?}", other)),
    }
}

fn from_data_value(value: &ua::DataValue) -> DataValue {
    DataValue {
        value: value.value.as_ref().map(from_opcua_variant),
        status: value.status.map(from_status).unwrap_or(StatusCode::GOOD),
        source_timestamp: value.source_timestamp.as_ref().map(ua::DateTime::as_chrono),
        server_timestamp: value.server_timestamp.as_ref().map(ua::DateTime::as_chrono),
    }
}

fn from_continuation_point(point: &ua::ByteString) -> Option<ContinuationPoint> {
    point.value.clone().and_then(ContinuationPoint::from_bytes)
}

fn from_reference(reference: &ua::ReferenceDescription) -> Option<ReferenceDescription> {
    let node_class = NodeClass::from_value(reference.node_class as u32)?;
    let type_definition = from_opcua_node_id(&reference.type_definition.node_id);
    Some(ReferenceDescription {
        node_id: from_opcua_node_id(&reference.node_id.node_id),
        browse_name: QualifiedName::new(
            reference.browse_name.namespace_index,
            reference.browse_name.name.as_ref(),
        ),
        display_name: reference.display_name.text.as_ref().to_string(),
        node_class,
        reference_type_id: from_opcua_node_id(&reference.reference_type_id),
        is_forward: reference.is_forward,
        type_definition: (!type_definition.is_null()).then_some(type_definition),
    })
}

fn from_browse_result(result: &ua::BrowseResult) -> BrowseResult {
    BrowseResult {
        status: from_status(result.status_code),
        continuation_point: from_continuation_point(&result.continuation_point),
        references: result
            .references
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter_map(from_reference)
            .collect(),
    }
}

fn to_opcua_event_filter(filter: &EventFilter) -> ua::EventFilter {
    let select_clauses = filter
        .select_clauses
        .iter()
        .map(|clause| ua::SimpleAttributeOperand {
            type_definition_id: to_opcua_node_id(&clause.type_definition_id),
            browse_path: Some(
                clause
                    .browse_path
                    .iter()
                    .map(|name| ua::QualifiedName::new(name.namespace_index, name.name.as_str()))
                    .collect(),
            ),
            attribute_id: clause.attribute_id.value(),
            index_range: ua::UAString::null(),
        })
        .collect();

    ua::EventFilter {
        select_clauses: Some(select_clauses),
        where_clause: ua::ContentFilter { elements: None },
    }
}

fn history_action(details: &HistoryReadDetails) -> HistoryReadAction {
    match details {
        HistoryReadDetails::Raw {
            start,
            end,
            max_values_per_node,
            return_bounds,
        } => HistoryReadAction::ReadRawModifiedDetails(ua::ReadRawModifiedDetails {
            is_read_modified: false,
            start_time: to_opcua_date_time(*start),
            end_time: to_opcua_date_time(*end),
            num_values_per_node: *max_values_per_node,
            return_bounds: *return_bounds,
        }),
        HistoryReadDetails::Processed {
            start,
            end,
            aggregate_type,
            processing_interval,
        } => HistoryReadAction::ReadProcessedDetails(ua::ReadProcessedDetails {
            start_time: to_opcua_date_time(*start),
            end_time: to_opcua_date_time(*end),
            processing_interval: processing_interval.as_secs_f64() * 1000.0,
            aggregate_type: Some(vec![to_opcua_node_id(aggregate_type)]),
            aggregate_configuration: ua::AggregateConfiguration {
                use_server_capabilities_defaults: true,
                treat_uncertain_as_bad: false,
                percent_data_bad: 100,
                percent_data_good: 100,
                use_sloped_extrapolation: false,
            },
        }),
        HistoryReadDetails::Events {
            start,
            end,
            max_values_per_node,
            filter,
        } => HistoryReadAction::ReadEventDetails(ua::ReadEventDetails {
            num_values_per_node: *max_values_per_node,
            start_time: to_opcua_date_time(*start),
            end_time: to_opcua_date_time(*end),
            filter: to_opcua_event_filter(filter),
        }),
    }
}

fn from_history_result(result: &ua::HistoryReadResult) -> HistoryReadResult {
    HistoryReadResult {
        status: from_status(result.status_code),
        continuation_point: from_continuation_point(&result.continuation_point),
        history: decode_history(&result.history_data),
    }
}

fn decode_history(body: &ua::ExtensionObject) -> Option<HistoryPayload> {
    if body.is_null() {
        return None;
    }
    let options = ua::DecodingOptions::default();
    let data_encoding: ua::NodeId = ua::ObjectId::HistoryData_Encoding_DefaultBinary.into();
    let event_encoding: ua::NodeId = ua::ObjectId::HistoryEvent_Encoding_DefaultBinary.into();

    if body.node_id == data_encoding {
        let data = body.decode_inner::<ua::HistoryData>(&options).ok()?;
        let values = data.data_values.unwrap_or_default();
        Some(HistoryPayload::Data(HistoryData::new(
            values.iter().map(from_data_value).collect(),
        )))
    } else if body.node_id == event_encoding {
        let events = body.decode_inner::<ua::HistoryEvent>(&options).ok()?;
        let events = events
            .events
            .unwrap_or_default()
            .into_iter()
            .map(|fields| HistoryEventFieldList {
                event_fields: fields
                    .event_fields
                    .unwrap_or_default()
                    .iter()
                    .map(from_opcua_variant)
                    .collect(),
            })
            .collect();
        Some(HistoryPayload::Events(HistoryEvent::new(events)))
    } else {
        trace!(encoding = %body.node_id, "Unexpected history payload encoding");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_node_id_conversion_keeps_identifier() {
        let ids = [
            NodeId::numeric(0, 2255),
            NodeId::string(2, "Line1.Pump"),
            NodeId::guid(3, Uuid::nil()),
            NodeId::opaque(4, vec![1, 2, 3]),
        ];
        for id in ids {
            assert_eq!(from_opcua_node_id(&to_opcua_node_id(&id)), id);
        }
    }

    #[test]
    fn test_empty_continuation_point_is_none() {
        assert!(from_continuation_point(&ua::ByteString::null()).is_none());
        let point = from_continuation_point(&ua::ByteString::from(&[7u8, 8][..])).unwrap();
        assert_eq!(point.as_bytes(), &[7, 8]);
    }

    #[test]
    fn test_identity_token_mapping() {
        let token = identity_token(&UserIdentity::user_name("operator", "secret"));
        assert!(matches!(token, IdentityToken::UserName(user, _) if user == "operator"));
        assert!(matches!(identity_token(&UserIdentity::Anonymous), IdentityToken::Anonymous));
    }

    #[test]
    fn test_pki_root() {
        let trusted = Path::new("/var/pki/trusted/certs");
        assert_eq!(pki_root(trusted), Some(Path::new("/var/pki")));
    }

    #[tokio::test]
    async fn test_run_blocking_owned_target() {
        let target = "opc.tcp://plc:4840".to_string();
        let url = target.clone();
        let echoed = run_blocking(&target, "Echo", move || Ok(url)).await.unwrap();
        assert_eq!(echoed, target);

        let error = run_blocking::<(), _>(&target, "Panic", || panic!("worker died"))
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            UaError::ConnectionFailed { target: failed, reason }
                if failed == "opc.tcp://plc:4840" && reason.starts_with("Panic task failed")
        ));
    }

    #[test]
    fn test_null_history_payload() {
        assert!(decode_history(&ua::ExtensionObject::null()).is_none());
    }
}
