// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA client session establishment and paged reads.
//!
//! This crate sits on top of an OPC UA client runtime (see [`runtime`]) and
//! provides the parts with real control flow:
//!
//! - endpoint selection with NAT address rewrite ([`endpoint`])
//! - trust decisions on server certificates ([`certificate`])
//! - reverse connect, where the server dials the client ([`reverse`])
//! - session establishment, direct or reverse, async or blocking ([`session`])
//! - continuation point pagination for browse and history reads ([`paging`], [`services`])
//!
//! # Error Handling
//!
//! ```text
//! UaError
//! ├── EndpointNotFound   - no endpoint matches the requested security
//! ├── CertificateInvalid - application certificate unusable or server certificate rejected
//! ├── ConnectionFailed   - discovery or transport failed
//! ├── Timeout            - reverse connect wait elapsed or was cancelled
//! ├── ServiceFailure     - the whole request failed
//! ├── PerItemFailure     - one node failed while its siblings succeeded
//! ├── Configuration      - invalid settings or call preconditions
//! └── Io                 - local file and socket errors
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use tokio_util::sync::CancellationToken;
//! use ua_client::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::new().load("ua-client.toml")?;
//!     let telemetry = Telemetry::new(&config.application_name);
//!     let factory = SessionFactory::new(OpcUaRuntime::new(), config);
//!
//!     let handle = factory
//!         .create_anonymous("opc.tcp://localhost:4850", false, false, &CancellationToken::new(), &telemetry)
//!         .await?;
//!
//!     let namespaces = handle
//!         .services(&telemetry)
//!         .read_node_values(&[NodeId::NAMESPACE_ARRAY])
//!         .await;
//!     println!("{:?}", namespaces);
//!
//!     handle.close().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod certificate;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod paging;
pub mod result;
pub mod reverse;
pub mod runtime;
pub mod services;
pub mod session;
pub mod telemetry;
pub mod types;

pub use error::{
    CertificateError, ConfigurationError, ErrorCode, ErrorSeverity, UaError, UaErrorContext,
    UaResult, WaitOutcome,
};
pub use result::PerNodeResult;
pub use session::{SessionFactory, SessionHandle, SessionRequest};
pub use telemetry::{Telemetry, TelemetrySnapshot};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

// =============================================================================
// Prelude
// =============================================================================

/// Convenience re-exports for common use cases.
pub mod prelude {
    pub use crate::certificate::{CertificateInfo, TrustPolicy};
    pub use crate::config::{ClientConfig, ConfigLoader};
    pub use crate::endpoint::SecurityRequest;
    pub use crate::error::{UaError, UaResult};
    pub use crate::result::PerNodeResult;
    #[cfg(feature = "opcua-runtime")]
    pub use crate::runtime::opcua::OpcUaRuntime;
    pub use crate::runtime::{UaRuntime, UaSession};
    pub use crate::services::{BrowseOptions, EventReadRequest, ProcessedReadRequest, RawReadRequest};
    pub use crate::session::{SessionFactory, SessionHandle, SessionRequest};
    pub use crate::telemetry::Telemetry;
    pub use crate::types::{NodeId, SecurityMode, SecurityPolicy, UserIdentity};
}
