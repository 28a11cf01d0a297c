//! Calling many endpoints at once.

use crate::endpoint::Endpoint;
use crate::error::{BridgeError, BridgeResult};
use futures::future::{join_all, try_join_all};
use futures::FutureExt;
use scriptbridge_types::EndpointId;
use serde_json::Value;

/// Calls `method` on every endpoint and joins all-or-nothing.
///
/// All calls are issued before any is awaited. The join fails as soon as one
/// call fails, with that call's error wrapped in [`BridgeError::Endpoint`];
/// otherwise results come back in the order of `endpoints`.
pub async fn call_all(endpoints: &[Endpoint], method: &str, args: Value) -> BridgeResult<Vec<Value>> {
    let calls = endpoints.iter().map(|endpoint| {
        let name = endpoint.identity().to_string();
        endpoint.call(method, args.clone()).map(move |result| {
            result.map_err(|source| BridgeError::Endpoint {
                endpoint: name,
                source: Box::new(source),
            })
        })
    });
    try_join_all(calls).await
}

/// Calls `method` on every endpoint and reports each outcome separately.
pub async fn call_each(
    endpoints: &[Endpoint],
    method: &str,
    args: Value,
) -> Vec<(EndpointId, BridgeResult<Value>)> {
    let calls = endpoints.iter().map(|endpoint| {
        let id = endpoint.id();
        endpoint.call(method, args.clone()).map(move |result| (id, result))
    });
    join_all(calls).await
}
