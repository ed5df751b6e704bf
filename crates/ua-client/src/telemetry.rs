// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Explicitly passed telemetry context.
//!
//! A [`Telemetry`] is created once by the application and handed by
//! reference to every establishment and paging call. It owns the root span
//! all work is entered under and a set of counters.
//!
//! # Examples
//!
//! ```
//! use ua_client::telemetry::Telemetry;
//!
//! let telemetry = Telemetry::new("line-monitor");
//! telemetry.record_round();
//! assert_eq!(telemetry.snapshot().rounds_issued, 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing::Span;
use uuid::Uuid;

/// Telemetry context for one application instance.
#[derive(Debug)]
pub struct Telemetry {
    application: String,
    instance_id: Uuid,
    span: Span,
    counters: Counters,
}

#[derive(Debug, Default)]
struct Counters {
    sessions_opened: AtomicU64,
    rendezvous_waits: AtomicU64,
    rendezvous_timeouts: AtomicU64,
    rounds_issued: AtomicU64,
    continuation_points_released: AtomicU64,
    certificates_accepted: AtomicU64,
    certificates_rejected: AtomicU64,
}

impl Telemetry {
    /// Creates a context for the named application.
    pub fn new(application: impl Into<String>) -> Self {
        let application = application.into();
        let instance_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "ua_client",
            application = %application,
            instance = %instance_id
        );
        Self {
            application,
            instance_id,
            span,
            counters: Counters::default(),
        }
    }

    /// Returns the application name.
    pub fn application(&self) -> &str {
        &self.application
    }

    /// Returns the instance id.
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Returns the root span.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Creates a child span for one operation.
    pub fn operation_span(&self, operation: &'static str) -> Span {
        tracing::debug_span!(parent: &self.span, "operation", name = operation)
    }

    pub(crate) fn record_session_opened(&self) {
        self.counters.sessions_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rendezvous_wait(&self) {
        self.counters.rendezvous_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rendezvous_timeout(&self) {
        self.counters
            .rendezvous_timeouts
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Records one issued paging round.
    pub fn record_round(&self) {
        self.counters.rounds_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_release(&self) {
        self.counters
            .continuation_points_released
            .fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_certificate_decision(&self, accepted: bool) {
        let counter = if accepted {
            &self.counters.certificates_accepted
        } else {
            &self.counters.certificates_rejected
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the current counter values.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        let c = &self.counters;
        TelemetrySnapshot {
            sessions_opened: c.sessions_opened.load(Ordering::Relaxed),
            rendezvous_waits: c.rendezvous_waits.load(Ordering::Relaxed),
            rendezvous_timeouts: c.rendezvous_timeouts.load(Ordering::Relaxed),
            rounds_issued: c.rounds_issued.load(Ordering::Relaxed),
            continuation_points_released: c.continuation_points_released.load(Ordering::Relaxed),
            certificates_accepted: c.certificates_accepted.load(Ordering::Relaxed),
            certificates_rejected: c.certificates_rejected.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the telemetry counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TelemetrySnapshot {
    /// Sessions opened.
    pub sessions_opened: u64,
    /// Reverse connect waits started.
    pub rendezvous_waits: u64,
    /// Reverse connect waits that elapsed or were cancelled.
    pub rendezvous_timeouts: u64,
    /// Service rounds issued by the pagination engine.
    pub rounds_issued: u64,
    /// Continuation points released.
    pub continuation_points_released: u64,
    /// Server certificates accepted by the trust gate.
    pub certificates_accepted: u64,
    /// Server certificates rejected by the trust gate.
    pub certificates_rejected: u64,
}
