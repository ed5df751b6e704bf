// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Scripted runtime and session doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use ua_client::certificate::{CertificateInfo, CertificateValidationEvent, ValidationFailure};
use ua_client::reverse::{
    ReverseConnectHub, ReverseConnection, ReverseHello, WaiterId, WaiterRegistration,
    WaiterRegistry,
};
use ua_client::runtime::{
    BrowseDescription, BrowseResult, HistoryPayload, HistoryReadDetails, HistoryReadResult,
    HistoryReadValueId, OpenSessionRequest, ReadValueId, UaRuntime, UaSession,
};
use ua_client::types::{
    ContinuationPoint, DataValue, EndpointDescriptor, HistoryData, HistoryEvent,
    HistoryEventFieldList, NodeClass, NodeId, ReferenceDescription, SecurityMode, SecurityPolicy, StatusCode, Variant,
};
use ua_client::{CertificateError, UaError, UaResult};

pub const SERVER_URL: &str = "opc.tcp://plant-gw:4840";
pub const ADVERTISED_URL: &str = "opc.tcp://10.0.0.5:4840";
pub const LISTEN_URL: &str = "opc.tcp://localhost:4850";
pub const SERVER_URI: &str = "urn:plant:server";

pub const MONITOR_DER: &[u8] = include_bytes!("../../testdata/monitor.der");
pub const MONITOR_KEY: &[u8] = include_bytes!("../../testdata/monitor.key.pem");

// =============================================================================
// Endpoints and PKI
// =============================================================================

/// A None/None endpoint and a SignAndEncrypt endpoint, both on the
/// server's internal address.
pub fn plant_endpoints() -> Vec<EndpointDescriptor> {
    let open = EndpointDescriptor::new(ADVERTISED_URL, SecurityMode::None, SecurityPolicy::None.uri(), 0);
    let mut secure = EndpointDescriptor::new(
        ADVERTISED_URL,
        SecurityMode::SignAndEncrypt,
        SecurityPolicy::Basic256Sha256.uri(),
        3,
    );
    secure.server_certificate = Some(MONITOR_DER.to_vec());
    vec![open, secure]
}

/// Writes a certificate store with the `monitor` application certificate.
pub fn write_pki(root: &Path) {
    let certs = root.join("own").join("certs");
    let private = root.join("own").join("private");
    std::fs::create_dir_all(&certs).unwrap();
    std::fs::create_dir_all(&private).unwrap();
    std::fs::create_dir_all(root.join("trusted").join("certs")).unwrap();
    std::fs::write(certs.join("monitor.der"), MONITOR_DER).unwrap();
    std::fs::write(private.join("monitor.pem"), MONITOR_KEY).unwrap();
}

// =============================================================================
// FakeRuntime
// =============================================================================

/// What the runtime saw when a session was opened.
#[derive(Debug, Clone)]
pub struct OpenedSession {
    pub endpoint: EndpointDescriptor,
    pub reverse: bool,
    pub session_name: String,
    pub application_uri: String,
    pub identity: &'static str,
    pub with_application_certificate: bool,
}

/// Runtime serving scripted endpoints.
///
/// Secured endpoints carrying a server certificate are validated through
/// the call's validator as an untrusted certificate.
#[derive(Default)]
pub struct FakeRuntime {
    pub endpoints: Vec<EndpointDescriptor>,
    pub discovered: Mutex<Vec<String>>,
    pub discovered_via: Mutex<Vec<Option<String>>>,
    pub opened: Mutex<Vec<OpenedSession>>,
    /// Closes across every session this runtime opened.
    pub closed: Arc<AtomicUsize>,
}

impl FakeRuntime {
    pub fn new(endpoints: Vec<EndpointDescriptor>) -> Self {
        Self {
            endpoints,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.discovered.lock().len() + self.discovered_via.lock().len() + self.opened.lock().len()
    }
}

#[async_trait]
impl UaRuntime for FakeRuntime {
    type Session = FakeSession;

    async fn discover_endpoints(&self, url: &str) -> UaResult<Vec<EndpointDescriptor>> {
        self.discovered.lock().push(url.to_string());
        Ok(self.endpoints.clone())
    }

    async fn discover_endpoints_via(
        &self,
        connection: ReverseConnection,
        _url: &str,
    ) -> UaResult<Vec<EndpointDescriptor>> {
        self.discovered_via
            .lock()
            .push(connection.server_uri().map(str::to_string));
        Ok(self.endpoints.clone())
    }

    async fn open_session(&self, request: OpenSessionRequest<'_>) -> UaResult<FakeSession> {
        if !request.endpoint.security_mode.is_none() {
            if let Some(der) = &request.endpoint.server_certificate {
                let event = CertificateValidationEvent {
                    certificate: CertificateInfo::parse(der).unwrap(),
                    failure: ValidationFailure::Untrusted,
                };
                if !request.validator.accept(&event) {
                    return Err(UaError::CertificateInvalid(CertificateError::rejected(
                        &event.certificate.subject,
                        &event.certificate.thumbprint,
                        StatusCode::BAD_CERTIFICATE_UNTRUSTED,
                    )));
                }
            }
        }

        self.opened.lock().push(OpenedSession {
            endpoint: request.endpoint.clone(),
            reverse: request.channel.is_reverse(),
            session_name: request.session_name.to_string(),
            application_uri: request.application_uri.to_string(),
            identity: request.identity.type_name(),
            with_application_certificate: request.application.is_some(),
        });
        Ok(FakeSession {
            closed: Arc::clone(&self.closed),
            ..Default::default()
        })
    }
}

// =============================================================================
// CountingRegistry
// =============================================================================

/// Hub wrapper counting registrations.
#[derive(Default)]
pub struct CountingRegistry {
    pub hub: ReverseConnectHub,
    pub registered: AtomicUsize,
    pub unregistered: AtomicUsize,
}

impl CountingRegistry {
    pub fn registered(&self) -> usize {
        self.registered.load(Ordering::SeqCst)
    }

    pub fn unregistered(&self) -> usize {
        self.unregistered.load(Ordering::SeqCst)
    }
}

impl WaiterRegistry for CountingRegistry {
    fn register(&self, registration: WaiterRegistration) -> WaiterId {
        self.registered.fetch_add(1, Ordering::SeqCst);
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

/// Plays a server that dials in `times` times, each time a waiter exists.
pub fn dial_in(registry: Arc<CountingRegistry>, times: usize) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        for _ in 0..times {
            loop {
                if registry.hub.pending() > 0 {
                    let connection = ReverseConnection::new(
                        LISTEN_URL,
                        ReverseHello::new(SERVER_URI, ADVERTISED_URL),
                    );
                    if registry.offer(connection).is_ok() {
                        break;
                    }
                }
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        }
    })
}

// =============================================================================
// FakeSession
// =============================================================================

/// One scripted round for one node.
#[derive(Debug, Clone)]
pub enum Page<T> {
    Data(T),
    Bad(StatusCode),
}

/// Session serving scripted pages per node.
///
/// Continuation points are opaque counters; the session tracks which are
/// outstanding so tests can assert none leaked.
#[derive(Default)]
pub struct FakeSession {
    pub browse_pages: HashMap<NodeId, Vec<Page<Vec<ReferenceDescription>>>>,
    pub history_pages: HashMap<NodeId, Vec<Page<HistoryData>>>,
    pub event_pages: HashMap<NodeId, Vec<Page<HistoryEvent>>>,
    pub browse_requests: Mutex<Vec<Vec<BrowseDescription>>>,
    pub browse_next_calls: Mutex<Vec<(bool, usize)>>,
    pub history_calls: Mutex<Vec<(bool, Vec<HistoryReadValueId>)>>,
    pub history_details: Mutex<Vec<HistoryReadDetails>>,
    pub released: Mutex<Vec<NodeId>>,
    pub closed: Arc<AtomicUsize>,
    issued: Mutex<HashMap<ContinuationPoint, (NodeId, usize)>>,
    next_point: AtomicUsize,
}

impl FakeSession {
    pub fn with_browse(mut self, node: NodeId, pages: Vec<Page<Vec<ReferenceDescription>>>) -> Self {
        self.browse_pages.insert(node, pages);
        self
    }

    pub fn with_history(mut self, node: NodeId, pages: Vec<Page<HistoryData>>) -> Self {
        self.history_pages.insert(node, pages);
        self
    }

    pub fn with_events(mut self, node: NodeId, pages: Vec<Page<HistoryEvent>>) -> Self {
        self.event_pages.insert(node, pages);
        self
    }

    /// Continuation points handed out and neither resumed nor released.
    pub fn outstanding(&self) -> usize {
        self.issued.lock().len()
    }

    fn page<'a, T>(
        &self,
        pages: &'a HashMap<NodeId, Vec<Page<T>>>,
        node: &NodeId,
        index: usize,
    ) -> (Option<&'a Page<T>>, Option<ContinuationPoint>) {
        let Some(node_pages) = pages.get(node) else {
            return (None, None);
        };
        let page = node_pages.get(index);
        let more = index + 1 < node_pages.len() && !matches!(page, Some(Page::Bad(_)));
        let point = more.then(|| {
            let id = self.next_point.fetch_add(1, Ordering::SeqCst);
            let point = ContinuationPoint::from_bytes(format!("cp-{}", id).into_bytes()).unwrap();
            self.issued.lock().insert(point.clone(), (node.clone(), index + 1));
            point
        });
        (page, point)
    }

    fn resume(&self, point: &ContinuationPoint) -> Option<(NodeId, usize)> {
        self.issued.lock().remove(point)
    }

    fn browse_page(&self, node: &NodeId, index: usize) -> BrowseResult {
        match self.page(&self.browse_pages, node, index) {
            (Some(Page::Data(references)), continuation_point) => BrowseResult {
                status: StatusCode::GOOD,
                continuation_point,
                references: references.clone(),
            },
            (Some(Page::Bad(status)), _) => BrowseResult {
                status: *status,
                ..Default::default()
            },
            (None, _) => BrowseResult {
                status: StatusCode::BAD_NODE_ID_UNKNOWN,
                ..Default::default()
            },
        }
    }

    fn history_page(&self, details: &HistoryReadDetails, node: &NodeId, index: usize) -> HistoryReadResult {
        match details {
            HistoryReadDetails::Events { .. } => {
                let page = self.page(&self.event_pages, node, index);
                history_result(page, HistoryPayload::Events)
            }
            _ => {
                let page = self.page(&self.history_pages, node, index);
                history_result(page, HistoryPayload::Data)
            }
        }
    }
}

fn history_result<T: Clone>(
    page: (Option<&Page<T>>, Option<ContinuationPoint>),
    payload: fn(T) -> HistoryPayload,
) -> HistoryReadResult {
    match page {
        (Some(Page::Data(value)), continuation_point) => HistoryReadResult {
            status: StatusCode::GOOD,
            continuation_point,
            history: Some(payload(value.clone())),
        },
        (Some(Page::Bad(status)), _) => HistoryReadResult {
            status: *status,
            ..Default::default()
        },
        (None, _) => HistoryReadResult {
            status: StatusCode::BAD_NODE_ID_UNKNOWN,
            ..Default::default()
        },
    }
}

#[async_trait]
impl UaSession for FakeSession {
    async fn browse(&self, nodes: &[BrowseDescription]) -> UaResult<Vec<BrowseResult>> {
        self.browse_requests.lock().push(nodes.to_vec());
        Ok(nodes.iter().map(|d| self.browse_page(&d.node_id, 0)).collect())
    }

    async fn browse_next(
        &self,
        release: bool,
        points: &[ContinuationPoint],
    ) -> UaResult<Vec<BrowseResult>> {
        self.browse_next_calls.lock().push((release, points.len()));
        Ok(points
            .iter()
            .map(|point| match self.resume(point) {
                Some((node, _)) if release => {
                    self.released.lock().push(node);
                    BrowseResult::default()
                }
                Some((node, index)) => self.browse_page(&node, index),
                None => BrowseResult {
                    status: StatusCode::BAD_CONTINUATION_POINT_INVALID,
                    ..Default::default()
                },
            })
            .collect())
    }

    async fn read(&self, items: &[ReadValueId]) -> UaResult<Vec<DataValue>> {
        Ok(items
            .iter()
            .map(|item| DataValue::new(Variant::String(item.node_id.to_string())))
            .collect())
    }

    async fn history_read(
        &self,
        details: &HistoryReadDetails,
        release: bool,
        items: &[HistoryReadValueId],
    ) -> UaResult<Vec<HistoryReadResult>> {
        self.history_calls.lock().push((release, items.to_vec()));
        self.history_details.lock().push(details.clone());
        Ok(items
            .iter()
            .map(|item| match &item.continuation_point {
                None => self.history_page(details, &item.node_id, 0),
                Some(point) => match self.resume(point) {
                    Some((node, _)) if release => {
                        self.released.lock().push(node);
                        HistoryReadResult::default()
                    }
                    Some((node, index)) => self.history_page(details, &node, index),
                    None => HistoryReadResult {
                        status: StatusCode::BAD_CONTINUATION_POINT_INVALID,
                        ..Default::default()
                    },
                },
            })
            .collect())
    }

    async fn close(&self) -> UaResult<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// Builders
// =============================================================================

/// `count` object references named `<prefix>-<n>`.
pub fn references(prefix: &str, count: usize) -> Vec<ReferenceDescription> {
    (0..count)
        .map(|n| {
            ReferenceDescription::new(
                NodeId::string(2, format!("{}-{}", prefix, n)),
                format!("{}-{}", prefix, n),
                NodeClass::Object,
            )
        })
        .collect()
}

/// History with values `first..first + count`.
pub fn values(first: i32, count: i32) -> HistoryData {
    HistoryData::new(
        (first..first + count)
            .map(|v| DataValue::new(Variant::Int32(v)))
            .collect(),
    )
}

/// Events whose single field is the text `<prefix>-<n>`.
pub fn events(prefix: &str, count: usize) -> HistoryEvent {
    HistoryEvent::new(
        (0..count)
            .map(|n| HistoryEventFieldList {
                event_fields: vec![Variant::String(format!("{}-{}", prefix, n))],
            })
            .collect(),
    )
}
