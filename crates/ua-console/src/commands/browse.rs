// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `browse` command.

use ua_client::runtime::UaSession;
use ua_client::services::BrowseOptions;
use ua_client::types::ReferenceDescription;
use ua_client::{SessionHandle, Telemetry};

use super::output::emit;
use crate::cli::BrowseArgs;
use crate::error::ConsoleResult;

/// Browses the requested nodes, following continuation points.
pub(crate) async fn browse<S: UaSession>(
    handle: &SessionHandle<S>,
    telemetry: &Telemetry,
    args: &BrowseArgs,
) -> ConsoleResult<()> {
    let roots = args.roots();
    let results = handle
        .services(telemetry)
        .browse_many(&roots, &browse_options(args))
        .await;
    emit(args.format, &roots, &results, |references| {
        references.iter().map(reference_line).collect()
    })
}

fn browse_options(args: &BrowseArgs) -> BrowseOptions {
    let mut options = BrowseOptions::default();
    if let Some(max) = args.max_results {
        options = options.with_max_results(max);
    }
    if let Some(per_round) = args.per_round {
        options = options.with_references_per_round(per_round);
    }
    options
}

fn reference_line(reference: &ReferenceDescription) -> String {
    format!(
        "{:<14} {:<32} {}",
        format!("{:?}", reference.node_class),
        reference.browse_name,
        reference.node_id
    )
}
