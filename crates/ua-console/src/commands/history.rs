// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `history` commands.

use chrono::{DateTime, Utc};
use tracing::debug;
use ua_client::runtime::UaSession;
use ua_client::services::{EventReadRequest, ProcessedReadRequest, RawReadRequest};
use ua_client::types::{EventFilter, HistoryData, HistoryEvent};
use ua_client::{SessionHandle, Telemetry};

use super::output::{data_value_line, emit};
use crate::cli::{EventsArgs, ProcessedArgs, RangeArgs, RawArgs};
use crate::error::{ConsoleError, ConsoleResult};

/// Reads raw history.
pub(crate) async fn raw<S: UaSession>(
    handle: &SessionHandle<S>,
    telemetry: &Telemetry,
    args: &RawArgs,
) -> ConsoleResult<()> {
    let request = raw_request(args)?;
    debug!(nodes = args.nodes.len(), start = %request.start, end = %request.end, "Reading raw history");

    let results = handle
        .services(telemetry)
        .read_history_raw(&args.nodes, &request)
        .await;
    emit(args.format, &args.nodes, &results, data_lines)
}

/// Reads aggregated history.
pub(crate) async fn processed<S: UaSession>(
    handle: &SessionHandle<S>,
    telemetry: &Telemetry,
    args: &ProcessedArgs,
) -> ConsoleResult<()> {
    let (start, end) = range(&args.range)?;
    let request = ProcessedReadRequest {
        start,
        end,
        aggregate: args.aggregate.into(),
        processing_interval: args.interval,
    };

    let results = handle
        .services(telemetry)
        .read_history_processed(&args.nodes, &request)
        .await;
    emit(args.format, &args.nodes, &results, data_lines)
}

/// Reads historical events with the base event fields.
pub(crate) async fn events<S: UaSession>(
    handle: &SessionHandle<S>,
    telemetry: &Telemetry,
    args: &EventsArgs,
) -> ConsoleResult<()> {
    let (start, end) = range(&args.range)?;
    let request = EventReadRequest {
        start,
        end,
        max_values_per_node: args.max_values,
        filter: EventFilter::base_fields(),
    };

    let results = handle
        .services(telemetry)
        .read_history_events(&args.nodes, &request)
        .await;
    emit(args.format, &args.nodes, &results, event_lines)
}

fn raw_request(args: &RawArgs) -> ConsoleResult<RawReadRequest> {
    let (start, end) = range(&args.range)?;
    Ok(RawReadRequest::new(start, end)
        .with_max_values_per_node(args.max_values)
        .with_return_bounds(args.bounds)
        .with_continuation_points(!args.first_round_only))
}

fn range(args: &RangeArgs) -> ConsoleResult<(DateTime<Utc>, DateTime<Utc>)> {
    let end = args.effective_end();
    if args.start > end {
        return Err(ConsoleError::config(format!(
            "history range starts after it ends ({} > {})",
            args.start.to_rfc3339(),
            end.to_rfc3339()
        )));
    }
    Ok((args.start, end))
}

fn data_lines(data: &HistoryData) -> Vec<String> {
    if data.is_empty() {
        return vec!["(no values)".to_string()];
    }
    data.data_values.iter().map(data_value_line).collect()
}

fn event_lines(events: &HistoryEvent) -> Vec<String> {
    if events.events.is_empty() {
        return vec!["(no events)".to_string()];
    }
    events
        .events
        .iter()
        .map(|event| {
            event
                .event_fields
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" | ")
        })
        .collect()
}
