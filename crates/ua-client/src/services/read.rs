// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Attribute reads.

use tracing::{debug, Instrument};

use super::{batch_failure, Services};
use crate::result::PerNodeResult;
use crate::runtime::{ReadValueId, UaSession};
use crate::types::{AttributeId, DataValue, NodeId, StatusCode, Variant};

impl<S> Services<'_, S>
where
    S: UaSession + ?Sized,
{
    /// Reads every attribute of every node.
    ///
    /// Results are node-major: all attributes of the first node, then all
    /// attributes of the second, and so on. Only good values are successes.
    pub async fn read_attributes(
        &self,
        nodes: &[NodeId],
        attributes: &[AttributeId],
    ) -> Vec<PerNodeResult<Variant>> {
        let items: Vec<ReadValueId> = nodes
            .iter()
            .flat_map(|node| {
                attributes.iter().map(move |attribute| ReadValueId {
                    node_id: node.clone(),
                    attribute_id: *attribute,
                })
            })
            .collect();

        self.read_items(&items)
            .await
            .into_iter()
            .map(|result| match result {
                PerNodeResult::Success { value } if value.status.is_good() => {
                    PerNodeResult::success(value.value.unwrap_or(Variant::Null))
                }
                PerNodeResult::Success { value } => {
                    PerNodeResult::failure(value.status, value.status.to_string())
                }
                PerNodeResult::Failure { status, message } => PerNodeResult::Failure { status, message },
            })
            .collect()
    }

    /// Reads the Value attribute of each node.
    ///
    /// Values with a bad status are failures; uncertain values are kept.
    pub async fn read_node_values(&self, nodes: &[NodeId]) -> Vec<PerNodeResult<DataValue>> {
        let items: Vec<ReadValueId> = nodes
            .iter()
            .map(|node| ReadValueId {
                node_id: node.clone(),
                attribute_id: AttributeId::Value,
            })
            .collect();

        self.read_items(&items)
            .await
            .into_iter()
            .map(|result| match result {
                PerNodeResult::Success { value } if value.status.is_bad() => {
                    PerNodeResult::failure(value.status, value.status.to_string())
                }
                other => other,
            })
            .collect()
    }

    async fn read_items(&self, items: &[ReadValueId]) -> Vec<PerNodeResult<DataValue>> {
        if items.is_empty() {
            return Vec::new();
        }

        let span = self.telemetry.operation_span("read");
        async {
            let values = match self.session.read(items).await {
                Ok(values) => values,
                Err(e) => {
                    e.log("read");
                    return batch_failure(items.len(), &e);
                }
            };

            if values.len() != items.len() {
                debug!(requested = items.len(), returned = values.len(), "Read result count mismatch");
            }

            let mut values = values.into_iter();
            items
                .iter()
                .map(|item| match values.next() {
                    Some(value) => PerNodeResult::success(value),
                    None => PerNodeResult::failure(
                        StatusCode::BAD_UNKNOWN_RESPONSE,
                        format!("No result for node id {}", item.node_id),
                    ),
                })
                .collect()
        }
        .instrument(span)
        .await
    }
}
