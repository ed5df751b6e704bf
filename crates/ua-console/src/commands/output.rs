// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Rendering of per-node results.

use std::fmt::Write as _;

use serde::Serialize;
use ua_client::types::{DataValue, NodeId};
use ua_client::PerNodeResult;

use crate::cli::OutputFormat;
use crate::error::{ConsoleError, ConsoleResult};

#[derive(Serialize)]
struct NodeOutput<'a, T> {
    node_id: String,
    #[serde(flatten)]
    result: &'a PerNodeResult<T>,
}

/// Renders one block per node in input order.
///
/// `text` renders the lines of a successful node.
pub(crate) fn render<T, F>(
    format: OutputFormat,
    nodes: &[NodeId],
    results: &[PerNodeResult<T>],
    text: F,
) -> ConsoleResult<String>
where
    T: Serialize,
    F: Fn(&T) -> Vec<String>,
{
    match format {
        OutputFormat::Json => {
            let output: Vec<_> = nodes
                .iter()
                .zip(results)
                .map(|(node, result)| NodeOutput {
                    node_id: node.to_string(),
                    result,
                })
                .collect();
            Ok(serde_json::to_string_pretty(&output)?)
        }
        OutputFormat::Text => {
            let mut out = String::new();
            for (node, result) in nodes.iter().zip(results) {
                match result {
                    PerNodeResult::Success { value } => {
                        let _ = writeln!(out, "{}", node);
                        for line in text(value) {
                            let _ = writeln!(out, "  {}", line);
                        }
                    }
                    PerNodeResult::Failure { status, message } => {
                        let _ = writeln!(out, "{}: {} ({})", node, status, message);
                    }
                }
            }
            Ok(out)
        }
    }
}

/// Prints the rendering and fails when any node failed.
pub(crate) fn emit<T, F>(
    format: OutputFormat,
    nodes: &[NodeId],
    results: &[PerNodeResult<T>],
    text: F,
) -> ConsoleResult<()>
where
    T: Serialize,
    F: Fn(&T) -> Vec<String>,
{
    print!("{}", render(format, nodes, results, text)?);
    check_failures(results)
}

/// Returns [`ConsoleError::PartialFailure`] when any node failed.
pub(crate) fn check_failures<T>(results: &[PerNodeResult<T>]) -> ConsoleResult<()> {
    let failed = results.iter().filter(|r| r.is_failure()).count();
    if failed == 0 {
        Ok(())
    } else {
        Err(ConsoleError::PartialFailure {
            failed,
            total: results.len(),
        })
    }
}

/// Formats a value as `value [status] @ timestamp`.
pub(crate) fn data_value_line(value: &DataValue) -> String {
    let mut line = match &value.value {
        Some(variant) => variant.to_string(),
        None => "<empty>".to_string(),
    };
    if !value.status.is_good() {
        let _ = write!(line, " [{}]", value.status);
    }
    if let Some(timestamp) = value.source_timestamp.or(value.server_timestamp) {
        let _ = write!(line, " @ {}", timestamp.to_rfc3339());
    }
    line
}
