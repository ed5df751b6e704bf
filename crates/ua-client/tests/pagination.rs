// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Browse and history reads across continuation rounds.

mod common;

use std::time::Duration;

use chrono::{TimeZone, Utc};

use common::*;
use ua_client::config::PagingConfig;
use ua_client::runtime::HistoryReadDetails;
use ua_client::services::{
    Aggregate, BrowseOptions, EventReadRequest, ProcessedReadRequest, RawReadRequest, Services,
};
use ua_client::types::{EventFilter, HistoryEvent, NodeId, StatusCode, Variant};
use ua_client::Telemetry;

fn raw_request() -> RawReadRequest {
    RawReadRequest::new(
        Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 3, 2, 0, 0, 0).unwrap(),
    )
}

fn range() -> (chrono::DateTime<Utc>, chrono::DateTime<Utc>) {
    let request = raw_request();
    (request.start, request.end)
}

fn names(events: &HistoryEvent) -> Vec<String> {
    events
        .events
        .iter()
        .map(|event| event.event_fields[0].to_string())
        .collect()
}

fn ints(data: &ua_client::types::HistoryData) -> Vec<i32> {
    data.data_values
        .iter()
        .map(|value| match value.value {
            Some(Variant::Int32(v)) => v,
            ref other => panic!("unexpected value {other:?}"),
        })
        .collect()
}

// =============================================================================
// Browse
// =============================================================================

#[tokio::test]
async fn test_browse_follows_every_round() {
    let root = NodeId::OBJECTS_FOLDER;
    let session = FakeSession::default().with_browse(
        root.clone(),
        vec![
            Page::Data(references("a", 3)),
            Page::Data(references("b", 3)),
            Page::Data(references("c", 1)),
        ],
    );
    let telemetry = Telemetry::new("test");

    let result = Services::new(&session, &telemetry)
        .browse(&root, &BrowseOptions::default())
        .await;

    let references = result.into_result(0, root.to_string()).unwrap();
    assert_eq!(references.len(), 7);
    assert_eq!(references[3].browse_name.name, "b-0");
    assert_eq!(session.browse_next_calls.lock().as_slice(), [(false, 1), (false, 1)]);
    assert_eq!(session.outstanding(), 0);
    assert_eq!(telemetry.snapshot().rounds_issued, 3);
}

#[tokio::test]
async fn test_browse_first_round_requests_max_results() {
    let root = NodeId::OBJECTS_FOLDER;
    let session = FakeSession::default().with_browse(root.clone(), vec![Page::Data(references("a", 2))]);
    let telemetry = Telemetry::new("test");

    let options = BrowseOptions::default().with_max_results(250);
    Services::new(&session, &telemetry).browse(&root, &options).await;

    let request = session.browse_requests.lock()[0][0].clone();
    assert_eq!(request.max_references, 250);
    assert_eq!(request.reference_type_id, NodeId::HIERARCHICAL_REFERENCES);
    assert!(request.include_subtypes);
}

#[tokio::test]
async fn test_capped_browse_returns_exactly_max_and_releases_once() {
    let root = NodeId::OBJECTS_FOLDER;
    let session = FakeSession::default().with_browse(
        root.clone(),
        vec![
            Page::Data(references("a", 4)),
            Page::Data(references("b", 4)),
            Page::Data(references("c", 4)),
        ],
    );
    let telemetry = Telemetry::new("test");

    let options = BrowseOptions::default()
        .with_max_results(6)
        .with_references_per_round(4);
    let references = Services::new(&session, &telemetry)
        .browse(&root, &options)
        .await
        .into_result(0, root.to_string())
        .unwrap();

    assert_eq!(references.len(), 6);
    assert_eq!(references[5].browse_name.name, "b-1");
    assert_eq!(session.browse_next_calls.lock().as_slice(), [(false, 1), (true, 1)]);
    assert_eq!(session.released.lock().as_slice(), [root]);
    assert_eq!(session.outstanding(), 0);
    assert_eq!(telemetry.snapshot().continuation_points_released, 1);
}

#[tokio::test]
async fn test_browse_many_keeps_input_order_and_isolates_failures() {
    let pumps = NodeId::string(2, "Pumps");
    let valves = NodeId::string(2, "Valves");
    let unknown = NodeId::string(2, "Missing");
    let session = FakeSession::default()
        .with_browse(
            pumps.clone(),
            vec![Page::Data(references("p", 2)), Page::Data(references("q", 2))],
        )
        .with_browse(valves.clone(), vec![Page::Data(references("v", 1))]);
    let telemetry = Telemetry::new("test");

    let results = Services::new(&session, &telemetry)
        .browse_many(&[valves, unknown, pumps], &BrowseOptions::default())
        .await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].value().map(Vec::len), Some(1));
    assert_eq!(results[1].status(), StatusCode::BAD_NODE_ID_UNKNOWN);
    assert_eq!(results[2].value().map(Vec::len), Some(4));
    assert_eq!(session.outstanding(), 0);
}

#[tokio::test]
async fn test_browse_failure_mid_pagination_keeps_siblings() {
    let good = NodeId::string(2, "Good");
    let flaky = NodeId::string(2, "Flaky");
    let session = FakeSession::default()
        .with_browse(
            good.clone(),
            vec![Page::Data(references("g", 1)), Page::Data(references("h", 1))],
        )
        .with_browse(
            flaky.clone(),
            vec![
                Page::Data(references("f", 1)),
                Page::Bad(StatusCode::BAD_NO_CONTINUATION_POINTS),
            ],
        );
    let telemetry = Telemetry::new("test");

    let results = Services::new(&session, &telemetry)
        .browse_many(&[good, flaky.clone()], &BrowseOptions::default())
        .await;

    assert_eq!(results[0].value().map(Vec::len), Some(2));
    assert_eq!(results[1].status(), StatusCode::BAD_NO_CONTINUATION_POINTS);
    assert!(results[1].message().unwrap().contains(&flaky.to_string()));
    assert_eq!(session.outstanding(), 0);
}

#[tokio::test]
async fn test_round_limit_releases_pending_points() {
    let root = NodeId::OBJECTS_FOLDER;
    let session = FakeSession::default().with_browse(
        root.clone(),
        vec![
            Page::Data(references("a", 1)),
            Page::Data(references("b", 1)),
            Page::Data(references("c", 1)),
        ],
    );
    let telemetry = Telemetry::new("test");
    let paging = PagingConfig {
        max_rounds: Some(1),
        ..Default::default()
    };

    let result = Services::new(&session, &telemetry)
        .with_paging(&paging)
        .browse(&root, &BrowseOptions::default())
        .await;

    assert_eq!(result.status(), StatusCode::BAD_CONTINUATION_POINT_INVALID);
    assert_eq!(session.released.lock().as_slice(), [root]);
    assert_eq!(session.outstanding(), 0);
}

// =============================================================================
// History
// =============================================================================

#[tokio::test]
async fn test_history_raw_concatenates_rounds_per_node() {
    let a = NodeId::string(2, "A");
    let b = NodeId::string(2, "B");
    let session = FakeSession::default()
        .with_history(a.clone(), vec![Page::Data(values(0, 3)), Page::Data(values(3, 2))])
        .with_history(b.clone(), vec![Page::Data(values(100, 2))]);
    let telemetry = Telemetry::new("test");

    let results = Services::new(&session, &telemetry)
        .read_history_raw(&[a.clone(), b], &raw_request())
        .await;

    assert_eq!(results.len(), 2);
    assert_eq!(ints(results[0].value().unwrap()), vec![0, 1, 2, 3, 4]);
    assert_eq!(ints(results[1].value().unwrap()), vec![100, 101]);

    let calls = session.history_calls.lock();
    assert_eq!(calls.len(), 2);
    assert!(!calls[1].0);
    assert_eq!(calls[1].1.len(), 1);
    assert_eq!(calls[1].1[0].node_id, a);
    assert!(calls[1].1[0].continuation_point.is_some());
    assert_eq!(session.outstanding(), 0);
}

#[tokio::test]
async fn test_history_raw_without_continuation_points_releases() {
    let a = NodeId::string(2, "A");
    let session = FakeSession::default()
        .with_history(a.clone(), vec![Page::Data(values(0, 3)), Page::Data(values(3, 2))]);
    let telemetry = Telemetry::new("test");

    let request = raw_request().with_continuation_points(false);
    let results = Services::new(&session, &telemetry)
        .read_history_raw(&[a.clone()], &request)
        .await;

    assert_eq!(ints(results[0].value().unwrap()), vec![0, 1, 2]);
    let calls = session.history_calls.lock();
    assert_eq!(calls.len(), 2);
    assert!(calls[1].0);
    assert_eq!(session.released.lock().as_slice(), [a]);
    assert_eq!(session.outstanding(), 0);
}

#[tokio::test]
async fn test_history_bad_node_reports_error_reading() {
    let good = NodeId::string(2, "Good");
    let bad = NodeId::string(2, "Bad");
    let session = FakeSession::default()
        .with_history(good.clone(), vec![Page::Data(values(1, 1))])
        .with_history(bad.clone(), vec![Page::Bad(StatusCode::BAD_NOT_READABLE)]);
    let telemetry = Telemetry::new("test");

    let results = Services::new(&session, &telemetry)
        .read_history_raw(&[good, bad.clone()], &raw_request())
        .await;

    assert!(results[0].is_success());
    assert_eq!(results[1].status(), StatusCode::BAD_NOT_READABLE);
    assert!(results[1].message().unwrap().contains(&format!("Error reading node id {}", bad)));
}

#[tokio::test]
async fn test_history_of_many_nodes_keeps_order() {
    let nodes: Vec<NodeId> = (0..25).map(|n| NodeId::numeric(3, n)).collect();
    let session = nodes.iter().enumerate().fold(FakeSession::default(), |session, (i, node)| {
        let pages = (0..=(i % 3))
            .map(|page| Page::Data(values(i as i32 * 10 + page as i32, 1)))
            .collect();
        session.with_history(node.clone(), pages)
    });
    let telemetry = Telemetry::new("test");

    let results = Services::new(&session, &telemetry)
        .read_history_raw(&nodes, &raw_request())
        .await;

    assert_eq!(results.len(), nodes.len());
    for (i, result) in results.iter().enumerate() {
        let data = ints(result.value().unwrap());
        assert_eq!(data.len(), i % 3 + 1);
        assert_eq!(data[0], i as i32 * 10);
    }
    assert_eq!(session.outstanding(), 0);
}

#[tokio::test]
async fn test_history_processed_pages_with_aggregate_details() {
    let flow = NodeId::string(2, "Flow");
    let broken = NodeId::string(2, "Broken");
    let idle = NodeId::string(2, "Idle");
    let session = FakeSession::default()
        .with_history(
            flow.clone(),
            vec![
                Page::Data(values(0, 2)),
                Page::Data(values(2, 2)),
                Page::Data(values(4, 1)),
            ],
        )
        .with_history(broken.clone(), vec![Page::Bad(StatusCode::BAD_AGGREGATE_NOT_SUPPORTED)])
        .with_history(idle.clone(), vec![Page::Data(values(0, 0))]);
    let telemetry = Telemetry::new("test");
    let (start, end) = range();
    let request = ProcessedReadRequest {
        start,
        end,
        aggregate: Aggregate::Average,
        processing_interval: Duration::from_secs(60),
    };

    let results = Services::new(&session, &telemetry)
        .read_history_processed(&[flow, broken.clone(), idle], &request)
        .await;

    assert_eq!(results.len(), 3);
    assert_eq!(ints(results[0].value().unwrap()), vec![0, 1, 2, 3, 4]);
    assert_eq!(results[1].status(), StatusCode::BAD_AGGREGATE_NOT_SUPPORTED);
    assert!(results[1].message().unwrap().contains(&broken.to_string()));
    assert!(results[2].value().unwrap().is_empty());

    let details = session.history_details.lock();
    assert_eq!(details.len(), 3);
    assert!(details.iter().all(|d| matches!(
        d,
        HistoryReadDetails::Processed { aggregate_type, processing_interval, .. }
            if *aggregate_type == NodeId::numeric(0, 2342)
                && *processing_interval == Duration::from_secs(60)
    )));
    assert_eq!(session.outstanding(), 0);
}

#[tokio::test]
async fn test_history_events_concatenate_in_round_order() {
    let pump = NodeId::string(2, "Pump1");
    let offline = NodeId::string(2, "Offline");
    let quiet = NodeId::string(2, "Quiet");
    let session = FakeSession::default()
        .with_events(
            pump.clone(),
            vec![Page::Data(events("first", 2)), Page::Data(events("second", 1))],
        )
        .with_events(offline.clone(), vec![Page::Bad(StatusCode::BAD_NOT_READABLE)])
        .with_events(quiet.clone(), vec![Page::Data(events("none", 0))]);
    let telemetry = Telemetry::new("test");
    let (start, end) = range();
    let request = EventReadRequest {
        start,
        end,
        max_values_per_node: 2,
        filter: EventFilter::base_fields(),
    };

    let results = Services::new(&session, &telemetry)
        .read_history_events(&[pump.clone(), offline.clone(), quiet], &request)
        .await;

    assert_eq!(results.len(), 3);
    assert_eq!(
        names(results[0].value().unwrap()),
        vec!["first-0", "first-1", "second-0"]
    );
    assert_eq!(results[1].status(), StatusCode::BAD_NOT_READABLE);
    assert!(results[1]
        .message()
        .unwrap()
        .contains(&format!("Error reading node id {}", offline)));
    assert!(results[2].value().unwrap().events.is_empty());

    let calls = session.history_calls.lock();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].1.len(), 1);
    assert_eq!(calls[1].1[0].node_id, pump);
    assert!(session
        .history_details
        .lock()
        .iter()
        .all(|d| matches!(d, HistoryReadDetails::Events { max_values_per_node: 2, .. })));
    assert_eq!(session.outstanding(), 0);
}
