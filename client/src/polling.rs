//! Bounded wait for a predicate over query status.

use std::sync::Arc;

use quarry_proto::QueryStatus;
use tracing::debug;

use crate::deadline::Deadline;
use crate::error::{DriverError, Result};
use crate::info_stream::QueryInfoStream;
use crate::session::SessionConfig;
use crate::stub::QueryServiceStub;

/// Waits until the query's status satisfies `predicate`, the query stops
/// producing, or the deadline passes.
///
/// Terminal-producing completion without a satisfying status is an error:
/// nothing later can change the outcome. Transport failures after the
/// deadline are reported as the timeout, with the failure attached as cause.
pub async fn wait_for(
    stub: Arc<dyn QueryServiceStub>,
    config: SessionConfig,
    query_id: &str,
    deadline: Deadline,
    mut predicate: impl FnMut(&QueryStatus) -> bool,
) -> Result<QueryStatus> {
    let mut info = QueryInfoStream::new(stub, config, query_id.to_string(), deadline);
    loop {
        if deadline.has_passed() {
            return Err(timeout(query_id, None));
        }
        match info.next_status().await {
            Ok(Some(status)) => {
                if predicate(&status) {
                    debug!(query_id, "predicate satisfied");
                    return Ok(status);
                }
                if status.completion().is_terminal_producing() {
                    return Err(DriverError::Timeout {
                        message: format!(
                            "Predicate was not satisfied when execution finished. queryId={query_id}"
                        ),
                        source: None,
                    });
                }
            }
            Ok(None) => {
                return Err(DriverError::Timeout {
                    message: format!(
                        "Predicate was not satisfied when execution finished. queryId={query_id}"
                    ),
                    source: None,
                });
            }
            Err(err) => {
                if deadline.has_passed() {
                    return Err(timeout(query_id, Some(err)));
                }
                return Err(err);
            }
        }
    }
}

fn timeout(query_id: &str, source: Option<DriverError>) -> DriverError {
    DriverError::Timeout {
        message: format!("Predicate was not satisfied before timeout. queryId={query_id}"),
        source: source.map(Box::new),
    }
}
