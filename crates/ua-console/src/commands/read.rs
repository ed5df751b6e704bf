// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `read` command.

use ua_client::runtime::UaSession;
use ua_client::{SessionHandle, Telemetry};

use super::output::{data_value_line, emit};
use crate::cli::ReadArgs;
use crate::error::ConsoleResult;

/// Reads the values of the requested nodes.
pub(crate) async fn read<S: UaSession>(
    handle: &SessionHandle<S>,
    telemetry: &Telemetry,
    args: &ReadArgs,
) -> ConsoleResult<()> {
    let nodes = args.targets();
    let results = handle.services(telemetry).read_node_values(&nodes).await;
    emit(args.format, &nodes, &results, |value| vec![data_value_line(value)])
}
