// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA value types shared by the establishment and paging layers.
//!
//! - **NodeId**: the four identifier kinds with `ns=..;i=..` parsing
//! - **StatusCode**: status words with severity checks and names
//! - **SecurityMode / SecurityPolicy**: endpoint security settings
//! - **EndpointDescriptor**: one server-advertised way to connect
//! - **UserIdentity**: session identity tokens
//! - **DataValue / Variant**: attribute and history values
//! - **ReferenceDescription / HistoryData / HistoryEvent**: paginated payloads
//! - **ContinuationPoint**: opaque server cursor
//!
//! # Examples
//!
//! ```
//! use ua_client::types::{NodeId, StatusCode};
//!
//! let node: NodeId = "ns=2;s=Line1.Temperature".parse().unwrap();
//! assert_eq!(node.to_string(), "ns=2;s=Line1.Temperature");
//! assert!(StatusCode::BAD_TIMEOUT.is_bad());
//! ```

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ConfigurationError, UaError};

// =============================================================================
// NodeId
// =============================================================================

/// OPC UA node identifier: a namespace index plus an identifier.
///
/// # Examples
///
/// ```
/// use ua_client::types::NodeId;
///
/// let numeric = NodeId::numeric(0, 2255);
/// assert_eq!(numeric.to_string(), "i=2255");
///
/// let parsed: NodeId = "ns=3;i=1001".parse().unwrap();
/// assert_eq!(parsed.namespace_index, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    /// Namespace index (0 = OPC UA standard namespace).
    pub namespace_index: u16,

    /// The node identifier.
    pub identifier: NodeIdentifier,
}

impl NodeId {
    /// Creates a numeric node ID.
    #[inline]
    pub fn numeric(namespace_index: u16, value: u32) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Numeric(value),
        }
    }

    /// Creates a string node ID.
    #[inline]
    pub fn string(namespace_index: u16, value: impl Into<String>) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::String(value.into()),
        }
    }

    /// Creates a GUID node ID.
    #[inline]
    pub fn guid(namespace_index: u16, value: Uuid) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Guid(value),
        }
    }

    /// Creates an opaque (byte string) node ID.
    #[inline]
    pub fn opaque(namespace_index: u16, value: Vec<u8>) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Opaque(value),
        }
    }

    // =========================================================================
    // Standard Node IDs
    // =========================================================================

    /// Root folder (i=84).
    pub const ROOT_FOLDER: NodeId = NodeId::standard(84);

    /// Objects folder (i=85).
    pub const OBJECTS_FOLDER: NodeId = NodeId::standard(85);

    /// Server object (i=2253).
    pub const SERVER: NodeId = NodeId::standard(2253);

    /// Server NamespaceArray property (i=2255).
    pub const NAMESPACE_ARRAY: NodeId = NodeId::standard(2255);

    /// HierarchicalReferences reference type (i=33).
    pub const HIERARCHICAL_REFERENCES: NodeId = NodeId::standard(33);

    /// BaseEventType (i=2041).
    pub const BASE_EVENT_TYPE: NodeId = NodeId::standard(2041);

    const fn standard(value: u32) -> NodeId {
        NodeId {
            namespace_index: 0,
            identifier: NodeIdentifier::Numeric(value),
        }
    }

    /// Returns the null node ID (ns=0, i=0).
    #[inline]
    pub const fn null() -> Self {
        Self::standard(0)
    }

    /// Returns `true` if this is the null node ID.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.namespace_index == 0 && matches!(self.identifier, NodeIdentifier::Numeric(0))
    }

    /// Returns the numeric value if this is a numeric identifier.
    #[inline]
    pub fn as_numeric(&self) -> Option<u32> {
        match &self.identifier {
            NodeIdentifier::Numeric(v) => Some(*v),
            _ => None,
        }
    }

    /// Converts to the OPC UA string format `ns=<namespace>;{i|s|g|b}=<identifier>`.
    pub fn to_opc_string(&self) -> String {
        if self.namespace_index == 0 {
            self.identifier.to_string()
        } else {
            format!("ns={};{}", self.namespace_index, self.identifier)
        }
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_opc_string())
    }
}

impl FromStr for NodeId {
    type Err = UaError;

    /// Parses `ns=2;i=1001`, `ns=2;s=Name`, `ns=2;g=<uuid>`, `ns=2;b=<base64>`
    /// or the same forms without the namespace prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = |reason: String| UaError::configuration(ConfigurationError::invalid_node_id(s, reason));

        let (namespace_index, identifier_part) = match s.strip_prefix("ns=") {
            Some(rest) => {
                let (ns, id) = rest
                    .split_once(';')
                    .ok_or_else(|| invalid("Missing identifier after namespace".to_string()))?;
                let ns: u16 = ns
                    .parse()
                    .map_err(|_| invalid("Invalid namespace index".to_string()))?;
                (ns, id)
            }
            None => (0, s),
        };

        let identifier = if let Some(id) = identifier_part.strip_prefix("i=") {
            NodeIdentifier::Numeric(
                id.parse()
                    .map_err(|_| invalid("Invalid numeric identifier".to_string()))?,
            )
        } else if let Some(id) = identifier_part.strip_prefix("s=") {
            NodeIdentifier::String(id.to_string())
        } else if let Some(id) = identifier_part.strip_prefix("g=") {
            NodeIdentifier::Guid(
                Uuid::parse_str(id).map_err(|e| invalid(format!("Invalid GUID: {}", e)))?,
            )
        } else if let Some(id) = identifier_part.strip_prefix("b=") {
            NodeIdentifier::Opaque(
                BASE64
                    .decode(id)
                    .map_err(|e| invalid(format!("Invalid base64: {}", e)))?,
            )
        } else {
            return Err(invalid(
                "Unknown identifier type. Expected i=, s=, g=, or b=".to_string(),
            ));
        };

        Ok(Self {
            namespace_index,
            identifier,
        })
    }
}

/// OPC UA node identifier kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum NodeIdentifier {
    /// Numeric identifier.
    Numeric(u32),
    /// String identifier.
    String(String),
    /// GUID identifier.
    Guid(Uuid),
    /// Opaque identifier.
    Opaque(Vec<u8>),
}

impl fmt::Display for NodeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(v) => write!(f, "i={}", v),
            Self::String(v) => write!(f, "s={}", v),
            Self::Guid(v) => write!(f, "g={}", v),
            Self::Opaque(v) => write!(f, "b={}", BASE64.encode(v)),
        }
    }
}

// =============================================================================
// StatusCode
// =============================================================================

/// OPC UA status code.
///
/// The top two bits carry the severity: `00` good, `01` uncertain, `10` bad.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(pub u32);

impl StatusCode {
    /// Good.
    pub const GOOD: StatusCode = StatusCode(0x0000_0000);
    /// Uncertain.
    pub const UNCERTAIN: StatusCode = StatusCode(0x4000_0000);
    /// Bad.
    pub const BAD: StatusCode = StatusCode(0x8000_0000);
    /// BadUnexpectedError.
    pub const BAD_UNEXPECTED_ERROR: StatusCode = StatusCode(0x8001_0000);
    /// BadInternalError.
    pub const BAD_INTERNAL_ERROR: StatusCode = StatusCode(0x8002_0000);
    /// BadResourceUnavailable.
    pub const BAD_RESOURCE_UNAVAILABLE: StatusCode = StatusCode(0x8004_0000);
    /// BadCommunicationError.
    pub const BAD_COMMUNICATION_ERROR: StatusCode = StatusCode(0x8005_0000);
    /// BadDecodingError.
    pub const BAD_DECODING_ERROR: StatusCode = StatusCode(0x8007_0000);
    /// BadUnknownResponse.
    pub const BAD_UNKNOWN_RESPONSE: StatusCode = StatusCode(0x8009_0000);
    /// BadTimeout.
    pub const BAD_TIMEOUT: StatusCode = StatusCode(0x800A_0000);
    /// BadServiceUnsupported.
    pub const BAD_SERVICE_UNSUPPORTED: StatusCode = StatusCode(0x800B_0000);
    /// BadShutdown.
    pub const BAD_SHUTDOWN: StatusCode = StatusCode(0x800C_0000);
    /// BadServerNotConnected.
    pub const BAD_SERVER_NOT_CONNECTED: StatusCode = StatusCode(0x800D_0000);
    /// BadTooManyOperations.
    pub const BAD_TOO_MANY_OPERATIONS: StatusCode = StatusCode(0x8010_0000);
    /// BadCertificateInvalid.
    pub const BAD_CERTIFICATE_INVALID: StatusCode = StatusCode(0x8012_0000);
    /// BadSecurityChecksFailed.
    pub const BAD_SECURITY_CHECKS_FAILED: StatusCode = StatusCode(0x8013_0000);
    /// BadCertificateTimeInvalid.
    pub const BAD_CERTIFICATE_TIME_INVALID: StatusCode = StatusCode(0x8014_0000);
    /// BadCertificateHostNameInvalid.
    pub const BAD_CERTIFICATE_HOST_NAME_INVALID: StatusCode = StatusCode(0x8016_0000);
    /// BadCertificateUriInvalid.
    pub const BAD_CERTIFICATE_URI_INVALID: StatusCode = StatusCode(0x8017_0000);
    /// BadCertificateUseNotAllowed.
    pub const BAD_CERTIFICATE_USE_NOT_ALLOWED: StatusCode = StatusCode(0x8018_0000);
    /// BadCertificateUntrusted.
    pub const BAD_CERTIFICATE_UNTRUSTED: StatusCode = StatusCode(0x801A_0000);
    /// BadCertificateRevocationUnknown.
    pub const BAD_CERTIFICATE_REVOCATION_UNKNOWN: StatusCode = StatusCode(0x801B_0000);
    /// BadCertificateRevoked.
    pub const BAD_CERTIFICATE_REVOKED: StatusCode = StatusCode(0x801D_0000);
    /// BadUserAccessDenied.
    pub const BAD_USER_ACCESS_DENIED: StatusCode = StatusCode(0x801F_0000);
    /// BadIdentityTokenInvalid.
    pub const BAD_IDENTITY_TOKEN_INVALID: StatusCode = StatusCode(0x8020_0000);
    /// BadIdentityTokenRejected.
    pub const BAD_IDENTITY_TOKEN_REJECTED: StatusCode = StatusCode(0x8021_0000);
    /// BadSessionIdInvalid.
    pub const BAD_SESSION_ID_INVALID: StatusCode = StatusCode(0x8025_0000);
    /// BadSessionClosed.
    pub const BAD_SESSION_CLOSED: StatusCode = StatusCode(0x8026_0000);
    /// BadRequestCancelledByClient.
    pub const BAD_REQUEST_CANCELLED_BY_CLIENT: StatusCode = StatusCode(0x802C_0000);
    /// BadNodeIdInvalid.
    pub const BAD_NODE_ID_INVALID: StatusCode = StatusCode(0x8033_0000);
    /// BadNodeIdUnknown.
    pub const BAD_NODE_ID_UNKNOWN: StatusCode = StatusCode(0x8034_0000);
    /// BadAttributeIdInvalid.
    pub const BAD_ATTRIBUTE_ID_INVALID: StatusCode = StatusCode(0x8035_0000);
    /// BadNotReadable.
    pub const BAD_NOT_READABLE: StatusCode = StatusCode(0x803A_0000);
    /// BadContinuationPointInvalid.
    pub const BAD_CONTINUATION_POINT_INVALID: StatusCode = StatusCode(0x804A_0000);
    /// BadNoContinuationPoints.
    pub const BAD_NO_CONTINUATION_POINTS: StatusCode = StatusCode(0x804B_0000);
    /// BadSecurityPolicyRejected.
    pub const BAD_SECURITY_POLICY_REJECTED: StatusCode = StatusCode(0x8055_0000);
    /// BadHistoryOperationInvalid.
    pub const BAD_HISTORY_OPERATION_INVALID: StatusCode = StatusCode(0x8071_0000);
    /// BadHistoryOperationUnsupported.
    pub const BAD_HISTORY_OPERATION_UNSUPPORTED: StatusCode = StatusCode(0x8072_0000);
    /// BadConfigurationError.
    pub const BAD_CONFIGURATION_ERROR: StatusCode = StatusCode(0x8089_0000);
    /// BadNotConnected.
    pub const BAD_NOT_CONNECTED: StatusCode = StatusCode(0x808A_0000);
    /// BadNoData.
    pub const BAD_NO_DATA: StatusCode = StatusCode(0x809B_0000);
    /// BadConnectionClosed.
    pub const BAD_CONNECTION_CLOSED: StatusCode = StatusCode(0x80AE_0000);
    /// BadAggregateNotSupported.
    pub const BAD_AGGREGATE_NOT_SUPPORTED: StatusCode = StatusCode(0x80D5_0000);

    const SEVERITY_MASK: u32 = 0xC000_0000;

    /// Returns `true` for good status codes.
    #[inline]
    pub const fn is_good(&self) -> bool {
        self.0 & Self::SEVERITY_MASK == 0
    }

    /// Returns `true` for uncertain status codes.
    #[inline]
    pub const fn is_uncertain(&self) -> bool {
        self.0 & Self::SEVERITY_MASK == 0x4000_0000
    }

    /// Returns `true` for bad status codes.
    #[inline]
    pub const fn is_bad(&self) -> bool {
        self.0 & 0x8000_0000 != 0
    }

    /// Returns the status word without info bits.
    #[inline]
    pub const fn code(&self) -> u32 {
        self.0 & 0xFFFF_0000
    }

    /// Returns `true` if the condition is usually temporary on the server.
    pub fn is_transient(&self) -> bool {
        matches!(
            *self,
            Self::BAD_TIMEOUT
                | Self::BAD_TOO_MANY_OPERATIONS
                | Self::BAD_RESOURCE_UNAVAILABLE
                | Self::BAD_SERVER_NOT_CONNECTED
                | Self::BAD_COMMUNICATION_ERROR
                | Self::BAD_NO_CONTINUATION_POINTS
                | Self::BAD_SHUTDOWN
        )
    }

    /// Returns the symbolic name of well-known codes.
    pub fn name(&self) -> &'static str {
        match StatusCode(self.code()) {
            Self::GOOD => "Good",
            Self::UNCERTAIN => "Uncertain",
            Self::BAD => "Bad",
            Self::BAD_UNEXPECTED_ERROR => "BadUnexpectedError",
            Self::BAD_INTERNAL_ERROR => "BadInternalError",
            Self::BAD_RESOURCE_UNAVAILABLE => "BadResourceUnavailable",
            Self::BAD_COMMUNICATION_ERROR => "BadCommunicationError",
            Self::BAD_DECODING_ERROR => "BadDecodingError",
            Self::BAD_UNKNOWN_RESPONSE => "BadUnknownResponse",
            Self::BAD_TIMEOUT => "BadTimeout",
            Self::BAD_SERVICE_UNSUPPORTED => "BadServiceUnsupported",
            Self::BAD_SHUTDOWN => "BadShutdown",
            Self::BAD_SERVER_NOT_CONNECTED => "BadServerNotConnected",
            Self::BAD_TOO_MANY_OPERATIONS => "BadTooManyOperations",
            Self::BAD_CERTIFICATE_INVALID => "BadCertificateInvalid",
            Self::BAD_SECURITY_CHECKS_FAILED => "BadSecurityChecksFailed",
            Self::BAD_CERTIFICATE_TIME_INVALID => "BadCertificateTimeInvalid",
            Self::BAD_CERTIFICATE_HOST_NAME_INVALID => "BadCertificateHostNameInvalid",
            Self::BAD_CERTIFICATE_URI_INVALID => "BadCertificateUriInvalid",
            Self::BAD_CERTIFICATE_USE_NOT_ALLOWED => "BadCertificateUseNotAllowed",
            Self::BAD_CERTIFICATE_UNTRUSTED => "BadCertificateUntrusted",
            Self::BAD_CERTIFICATE_REVOCATION_UNKNOWN => "BadCertificateRevocationUnknown",
            Self::BAD_CERTIFICATE_REVOKED => "BadCertificateRevoked",
            Self::BAD_USER_ACCESS_DENIED => "BadUserAccessDenied",
            Self::BAD_IDENTITY_TOKEN_INVALID => "BadIdentityTokenInvalid",
            Self::BAD_IDENTITY_TOKEN_REJECTED => "BadIdentityTokenRejected",
            Self::BAD_SESSION_ID_INVALID => "BadSessionIdInvalid",
            Self::BAD_SESSION_CLOSED => "BadSessionClosed",
            Self::BAD_REQUEST_CANCELLED_BY_CLIENT => "BadRequestCancelledByClient",
            Self::BAD_NODE_ID_INVALID => "BadNodeIdInvalid",
            Self::BAD_NODE_ID_UNKNOWN => "BadNodeIdUnknown",
            Self::BAD_ATTRIBUTE_ID_INVALID => "BadAttributeIdInvalid",
            Self::BAD_NOT_READABLE => "BadNotReadable",
            Self::BAD_CONTINUATION_POINT_INVALID => "BadContinuationPointInvalid",
            Self::BAD_NO_CONTINUATION_POINTS => "BadNoContinuationPoints",
            Self::BAD_SECURITY_POLICY_REJECTED => "BadSecurityPolicyRejected",
            Self::BAD_HISTORY_OPERATION_INVALID => "BadHistoryOperationInvalid",
            Self::BAD_HISTORY_OPERATION_UNSUPPORTED => "BadHistoryOperationUnsupported",
            Self::BAD_CONFIGURATION_ERROR => "BadConfigurationError",
            Self::BAD_NOT_CONNECTED => "BadNotConnected",
            Self::BAD_NO_DATA => "BadNoData",
            Self::BAD_CONNECTION_CLOSED => "BadConnectionClosed",
            Self::BAD_AGGREGATE_NOT_SUPPORTED => "BadAggregateNotSupported",
            _ if self.is_good() => "Good",
            _ if self.is_uncertain() => "Uncertain",
            _ => "Bad",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:08X})", self.name(), self.0)
    }
}

impl fmt::Debug for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StatusCode({})", self)
    }
}

impl From<u32> for StatusCode {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

// =============================================================================
// SecurityMode
// =============================================================================

/// OPC UA message security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SecurityMode {
    /// Messages are neither signed nor encrypted.
    #[default]
    None,
    /// Messages are signed.
    Sign,
    /// Messages are signed and encrypted.
    SignAndEncrypt,
}

impl SecurityMode {
    /// Returns the OPC UA enumeration value.
    pub const fn value(&self) -> u32 {
        match self {
            Self::None => 1,
            Self::Sign => 2,
            Self::SignAndEncrypt => 3,
        }
    }

    /// Creates from the OPC UA enumeration value.
    pub fn from_value(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::None),
            2 => Some(Self::Sign),
            3 => Some(Self::SignAndEncrypt),
            _ => Option::None,
        }
    }

    /// Returns `true` if this mode provides no security.
    #[inline]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Returns the display name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Sign => "Sign",
            Self::SignAndEncrypt => "SignAndEncrypt",
        }
    }
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SecurityMode {
    type Err = UaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "none" | "nosecurity" => Ok(Self::None),
            "sign" | "signed" => Ok(Self::Sign),
            "signandencrypt" | "signencrypt" | "encrypted" => Ok(Self::SignAndEncrypt),
            _ => Err(UaError::configuration(ConfigurationError::InvalidSecurityMode(
                s.to_string(),
            ))),
        }
    }
}

// =============================================================================
// SecurityPolicy
// =============================================================================

/// OPC UA security policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SecurityPolicy {
    /// No security policy.
    #[default]
    None,
    /// Basic128Rsa15 (deprecated).
    Basic128Rsa15,
    /// Basic256 (deprecated).
    Basic256,
    /// Basic256Sha256.
    Basic256Sha256,
    /// Aes128_Sha256_RsaOaep.
    Aes128Sha256RsaOaep,
    /// Aes256_Sha256_RsaPss.
    Aes256Sha256RsaPss,
}

impl SecurityPolicy {
    /// Returns the OPC UA policy URI.
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::None => "http://opcfoundation.org/UA/SecurityPolicy#None",
            Self::Basic128Rsa15 => "http://opcfoundation.org/UA/SecurityPolicy#Basic128Rsa15",
            Self::Basic256 => "http://opcfoundation.org/UA/SecurityPolicy#Basic256",
            Self::Basic256Sha256 => "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256",
            Self::Aes128Sha256RsaOaep => {
                "http://opcfoundation.org/UA/SecurityPolicy#Aes128_Sha256_RsaOaep"
            }
            Self::Aes256Sha256RsaPss => {
                "http://opcfoundation.org/UA/SecurityPolicy#Aes256_Sha256_RsaPss"
            }
        }
    }

    /// Returns the short name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Basic128Rsa15 => "Basic128Rsa15",
            Self::Basic256 => "Basic256",
            Self::Basic256Sha256 => "Basic256Sha256",
            Self::Aes128Sha256RsaOaep => "Aes128Sha256RsaOaep",
            Self::Aes256Sha256RsaPss => "Aes256Sha256RsaPss",
        }
    }

    /// Returns `true` if `uri` names this policy, ignoring ASCII case.
    pub fn matches_uri(&self, uri: &str) -> bool {
        self.uri().eq_ignore_ascii_case(uri)
    }

    /// Creates from a policy URI, ignoring ASCII case.
    pub fn from_uri(uri: &str) -> Option<Self> {
        [
            Self::None,
            Self::Basic128Rsa15,
            Self::Basic256,
            Self::Basic256Sha256,
            Self::Aes128Sha256RsaOaep,
            Self::Aes256Sha256RsaPss,
        ]
        .into_iter()
        .find(|policy| policy.matches_uri(uri))
    }
}

impl fmt::Display for SecurityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SecurityPolicy {
    type Err = UaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(policy) = Self::from_uri(s) {
            return Ok(policy);
        }

        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "none" => Ok(Self::None),
            "basic128rsa15" => Ok(Self::Basic128Rsa15),
            "basic256" => Ok(Self::Basic256),
            "basic256sha256" => Ok(Self::Basic256Sha256),
            "aes128sha256rsaoaep" => Ok(Self::Aes128Sha256RsaOaep),
            "aes256sha256rsapss" => Ok(Self::Aes256Sha256RsaPss),
            _ => Err(UaError::configuration(
                ConfigurationError::InvalidSecurityPolicy(s.to_string()),
            )),
        }
    }
}

// =============================================================================
// EndpointDescriptor
// =============================================================================

/// One server-advertised way to connect.
///
/// Immutable once selected; produced by endpoint selection and consumed by
/// session establishment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    /// Endpoint address.
    pub endpoint_url: String,
    /// Message security mode.
    pub security_mode: SecurityMode,
    /// Security policy URI as advertised by the server.
    pub security_policy_uri: String,
    /// Relative security strength; higher is stronger.
    pub security_level: u8,
    /// Server application URI.
    #[serde(default)]
    pub server_uri: Option<String>,
    /// DER encoded server certificate.
    #[serde(default, skip_serializing)]
    pub server_certificate: Option<Vec<u8>>,
}

impl EndpointDescriptor {
    /// Creates a descriptor.
    pub fn new(
        endpoint_url: impl Into<String>,
        security_mode: SecurityMode,
        security_policy_uri: impl Into<String>,
        security_level: u8,
    ) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            security_mode,
            security_policy_uri: security_policy_uri.into(),
            security_level,
            server_uri: None,
            server_certificate: None,
        }
    }

    /// Returns the URL scheme of the endpoint address (`opc.tcp`, `https`, ...).
    pub fn scheme(&self) -> &str {
        url_scheme(&self.endpoint_url)
    }

    /// Returns the known policy, if the URI names one.
    pub fn security_policy(&self) -> Option<SecurityPolicy> {
        SecurityPolicy::from_uri(&self.security_policy_uri)
    }
}

impl fmt::Display for EndpointDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let policy = self
            .security_policy()
            .map(|p| p.name().to_string())
            .unwrap_or_else(|| self.security_policy_uri.clone());
        write!(
            f,
            "{} [{}/{}, level {}]",
            self.endpoint_url, self.security_mode, policy, self.security_level
        )
    }
}

/// Returns the scheme part of a URL, or an empty string.
pub(crate) fn url_scheme(url: &str) -> &str {
    url.split_once("://").map(|(scheme, _)| scheme).unwrap_or("")
}

// =============================================================================
// UserIdentity
// =============================================================================

/// Identity presented when activating a session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum UserIdentity {
    /// Anonymous identity.
    #[default]
    Anonymous,
    /// Username and password.
    UserName {
        /// The username.
        username: String,
        /// The password.
        password: String,
    },
    /// X.509 user certificate.
    Certificate {
        /// Certificate path.
        certificate_path: String,
        /// Private key path.
        private_key_path: String,
    },
}

impl UserIdentity {
    /// Creates a username/password identity.
    pub fn user_name(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::UserName {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Returns `true` for the anonymous identity.
    #[inline]
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    /// Returns the token type name.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Anonymous => "Anonymous",
            Self::UserName { .. } => "UserName",
            Self::Certificate { .. } => "Certificate",
        }
    }
}

impl fmt::Debug for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => write!(f, "Anonymous"),
            Self::UserName { username, .. } => f
                .debug_struct("UserName")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            Self::Certificate {
                certificate_path, ..
            } => f
                .debug_struct("Certificate")
                .field("certificate_path", certificate_path)
                .finish_non_exhaustive(),
        }
    }
}

// =============================================================================
// NodeClass / AttributeId
// =============================================================================

/// OPC UA node class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeClass {
    /// Object node.
    Object,
    /// Variable node.
    Variable,
    /// Method node.
    Method,
    /// Object type node.
    ObjectType,
    /// Variable type node.
    VariableType,
    /// Reference type node.
    ReferenceType,
    /// Data type node.
    DataType,
    /// View node.
    View,
}

impl NodeClass {
    /// Returns the OPC UA bit mask value.
    pub const fn value(&self) -> u32 {
        match self {
            Self::Object => 1,
            Self::Variable => 2,
            Self::Method => 4,
            Self::ObjectType => 8,
            Self::VariableType => 16,
            Self::ReferenceType => 32,
            Self::DataType => 64,
            Self::View => 128,
        }
    }

    /// Creates from the OPC UA value.
    pub fn from_value(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Object),
            2 => Some(Self::Variable),
            4 => Some(Self::Method),
            8 => Some(Self::ObjectType),
            16 => Some(Self::VariableType),
            32 => Some(Self::ReferenceType),
            64 => Some(Self::DataType),
            128 => Some(Self::View),
            _ => None,
        }
    }

    /// Combines node classes into a browse mask.
    pub fn mask(classes: &[NodeClass]) -> u32 {
        classes.iter().fold(0, |mask, class| mask | class.value())
    }
}

/// OPC UA attribute identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AttributeId {
    /// NodeId (1).
    NodeId,
    /// NodeClass (2).
    NodeClass,
    /// BrowseName (3).
    BrowseName,
    /// DisplayName (4).
    DisplayName,
    /// Description (5).
    Description,
    /// EventNotifier (12).
    EventNotifier,
    /// Value (13).
    #[default]
    Value,
    /// DataType (14).
    DataType,
    /// ValueRank (15).
    ValueRank,
    /// AccessLevel (17).
    AccessLevel,
    /// UserAccessLevel (18).
    UserAccessLevel,
    /// Historizing (20).
    Historizing,
}

impl AttributeId {
    /// Returns the OPC UA numeric value.
    pub const fn value(&self) -> u32 {
        match self {
            Self::NodeId => 1,
            Self::NodeClass => 2,
            Self::BrowseName => 3,
            Self::DisplayName => 4,
            Self::Description => 5,
            Self::EventNotifier => 12,
            Self::Value => 13,
            Self::DataType => 14,
            Self::ValueRank => 15,
            Self::AccessLevel => 17,
            Self::UserAccessLevel => 18,
            Self::Historizing => 20,
        }
    }

    /// Creates from the OPC UA numeric value.
    pub fn from_value(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::NodeId),
            2 => Some(Self::NodeClass),
            3 => Some(Self::BrowseName),
            4 => Some(Self::DisplayName),
            5 => Some(Self::Description),
            12 => Some(Self::EventNotifier),
            13 => Some(Self::Value),
            14 => Some(Self::DataType),
            15 => Some(Self::ValueRank),
            17 => Some(Self::AccessLevel),
            18 => Some(Self::UserAccessLevel),
            20 => Some(Self::Historizing),
            _ => None,
        }
    }
}

// =============================================================================
// Variant / DataValue
// =============================================================================

/// An OPC UA value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Variant {
    /// No value.
    Null,
    /// Boolean.
    Boolean(bool),
    /// Signed 32-bit integer.
    Int32(i32),
    /// Unsigned 32-bit integer.
    UInt32(u32),
    /// Signed 64-bit integer.
    Int64(i64),
    /// Unsigned 64-bit integer.
    UInt64(u64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// String.
    String(String),
    /// Timestamp.
    DateTime(DateTime<Utc>),
    /// Byte string.
    ByteString(Vec<u8>),
    /// Node identifier.
    NodeId(NodeId),
    /// Status code.
    StatusCode(StatusCode),
    /// Array of values.
    Array(Vec<Variant>),
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean(v) => write!(f, "{}", v),
            Self::Int32(v) => write!(f, "{}", v),
            Self::UInt32(v) => write!(f, "{}", v),
            Self::Int64(v) => write!(f, "{}", v),
            Self::UInt64(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Double(v) => write!(f, "{}", v),
            Self::String(v) => write!(f, "{}", v),
            Self::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
            Self::ByteString(v) => write!(f, "0x{}", hex::encode(v)),
            Self::NodeId(v) => write!(f, "{}", v),
            Self::StatusCode(v) => write!(f, "{}", v),
            Self::Array(values) => {
                write!(f, "[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// A value with status and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DataValue {
    /// The value, if any.
    pub value: Option<Variant>,
    /// Item status.
    pub status: StatusCode,
    /// Source timestamp.
    pub source_timestamp: Option<DateTime<Utc>>,
    /// Server timestamp.
    pub server_timestamp: Option<DateTime<Utc>>,
}

impl DataValue {
    /// Creates a good value without timestamps.
    pub fn new(value: Variant) -> Self {
        Self {
            value: Some(value),
            ..Default::default()
        }
    }

    /// Creates a good value with a source timestamp.
    pub fn at(value: Variant, source_timestamp: DateTime<Utc>) -> Self {
        Self {
            value: Some(value),
            source_timestamp: Some(source_timestamp),
            ..Default::default()
        }
    }

    /// Creates a value carrying only a status.
    pub fn with_status(status: StatusCode) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }
}

// =============================================================================
// Browse and History Payloads
// =============================================================================

/// A namespace-qualified name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct QualifiedName {
    /// Namespace index.
    pub namespace_index: u16,
    /// Name.
    pub name: String,
}

impl QualifiedName {
    /// Creates a qualified name.
    pub fn new(namespace_index: u16, name: impl Into<String>) -> Self {
        Self {
            namespace_index,
            name: name.into(),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace_index == 0 {
            f.write_str(&self.name)
        } else {
            write!(f, "{}:{}", self.namespace_index, self.name)
        }
    }
}

/// One reference returned by Browse or BrowseNext.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceDescription {
    /// Target node.
    pub node_id: NodeId,
    /// Browse name of the target.
    pub browse_name: QualifiedName,
    /// Display name of the target.
    pub display_name: String,
    /// Node class of the target.
    pub node_class: NodeClass,
    /// Reference type.
    pub reference_type_id: NodeId,
    /// Whether the reference is forward.
    pub is_forward: bool,
    /// Type definition of the target.
    pub type_definition: Option<NodeId>,
}

impl ReferenceDescription {
    /// Creates a forward hierarchical reference.
    pub fn new(node_id: NodeId, browse_name: impl Into<String>, node_class: NodeClass) -> Self {
        let browse_name = browse_name.into();
        Self {
            browse_name: QualifiedName::new(node_id.namespace_index, browse_name.clone()),
            display_name: browse_name,
            node_id,
            node_class,
            reference_type_id: NodeId::HIERARCHICAL_REFERENCES,
            is_forward: true,
            type_definition: None,
        }
    }
}

/// Historical values of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HistoryData {
    /// Values in server order.
    pub data_values: Vec<DataValue>,
}

impl HistoryData {
    /// Creates history data from values.
    pub fn new(data_values: Vec<DataValue>) -> Self {
        Self { data_values }
    }

    /// Appends the values of a later round.
    pub fn append(&mut self, mut later: HistoryData) {
        self.data_values.append(&mut later.data_values);
    }

    /// Returns the number of values.
    pub fn len(&self) -> usize {
        self.data_values.len()
    }

    /// Returns `true` if there are no values.
    pub fn is_empty(&self) -> bool {
        self.data_values.is_empty()
    }
}

/// Selected fields of one historical event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HistoryEventFieldList {
    /// Field values in select-clause order.
    pub event_fields: Vec<Variant>,
}

/// Historical events of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HistoryEvent {
    /// Events in server order.
    pub events: Vec<HistoryEventFieldList>,
}

impl HistoryEvent {
    /// Creates a history event list.
    pub fn new(events: Vec<HistoryEventFieldList>) -> Self {
        Self { events }
    }

    /// Appends the events of a later round.
    pub fn append(&mut self, mut later: HistoryEvent) {
        self.events.append(&mut later.events);
    }

    /// Returns the number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` if there are no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// An event field selected by type definition and browse path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleAttributeOperand {
    /// Event type declaring the field.
    pub type_definition_id: NodeId,
    /// Browse path from the event type to the field.
    pub browse_path: Vec<QualifiedName>,
    /// Attribute to return.
    pub attribute_id: AttributeId,
}

impl SimpleAttributeOperand {
    /// Selects a BaseEventType property by name.
    pub fn base_event_field(name: impl Into<String>) -> Self {
        Self {
            type_definition_id: NodeId::BASE_EVENT_TYPE,
            browse_path: vec![QualifiedName::new(0, name)],
            attribute_id: AttributeId::Value,
        }
    }
}

/// Event filter for event history reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EventFilter {
    /// Fields to return for each event.
    pub select_clauses: Vec<SimpleAttributeOperand>,
}

impl EventFilter {
    /// Selects the common BaseEventType fields.
    pub fn base_fields() -> Self {
        Self {
            select_clauses: ["EventId", "EventType", "SourceName", "Time", "Message", "Severity"]
                .into_iter()
                .map(SimpleAttributeOperand::base_event_field)
                .collect(),
        }
    }
}

// =============================================================================
// ContinuationPoint
// =============================================================================

/// Opaque server cursor meaning "more results exist".
///
/// Scoped to one node within one multi-round operation. A non-null point
/// must be resubmitted or released.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContinuationPoint(Vec<u8>);

impl ContinuationPoint {
    /// Wraps server bytes; empty bytes mean "no more results".
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Option<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            None
        } else {
            Some(Self(bytes))
        }
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for ContinuationPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContinuationPoint({})", hex::encode(&self.0))
    }
}

// =============================================================================
// Tests
// =============================================================================
