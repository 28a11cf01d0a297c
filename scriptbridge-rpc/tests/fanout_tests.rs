use pretty_assertions::assert_eq;
use scriptbridge_rpc::{call_all, call_each, parse_args, Bridge, BridgeError, Connection, Endpoint};
use scriptbridge_types::{ErrorCode, ErrorInfo, Identity, Role};
use serde_json::{json, Value};

/// Attaches `count` client bridges to `server`. Client `fail_at` rejects
/// `eval`; the others answer with their own index.
fn clients(server: &Bridge, count: usize, fail_at: Option<usize>) -> Vec<Bridge> {
    (0..count)
        .map(|index| {
            let client = Bridge::default();
            client.register("eval", move |_ctx, args| async move {
                let code: String = parse_args(args)?;
                if Some(index) == fail_at {
                    return Err(ErrorInfo::eval(format!("client {index} failed on {code}")));
                }
                Ok(json!(index))
            });
            let (a, b) = Connection::pair();
            client.attach(Identity::server(), a);
            server.attach(Identity::client(format!("10.0.0.{}", index + 10)), b);
            client
        })
        .collect()
}

fn client_endpoints(server: &Bridge) -> Vec<Endpoint> {
    server.endpoints_with_role(Role::Client)
}

// ── call_all ─────────────────────────────────────────────────────

#[tokio::test]
async fn call_all_collects_every_result_in_order() {
    let server = Bridge::default();
    let _clients = clients(&server, 3, None);
    let endpoints = client_endpoints(&server);
    assert_eq!(endpoints.len(), 3);

    let results = call_all(&endpoints, "eval", json!("return 1")).await.unwrap();
    assert_eq!(results.len(), 3);
    let mut indices: Vec<u64> = results.iter().map(|v| v.as_u64().unwrap()).collect();
    indices.sort();
    assert_eq!(indices, vec![0, 1, 2]);
}

#[tokio::test]
async fn call_all_fails_with_the_concrete_error() {
    let server = Bridge::default();
    let _clients = clients(&server, 3, Some(1));
    let endpoints = client_endpoints(&server);

    let err = call_all(&endpoints, "eval", json!("boom()")).await.unwrap_err();
    match &err {
        BridgeError::Endpoint { endpoint, .. } => assert_eq!(endpoint, "client@10.0.0.11"),
        other => panic!("expected endpoint context, got {other:?}"),
    }
    assert_eq!(err.remote_code(), Some(ErrorCode::EvalFailed));
    assert!(err.to_string().contains("client 1 failed on boom()"));

    let info = ErrorInfo::from(err);
    assert_eq!(info.code, ErrorCode::EvalFailed);
    assert!(info.message.starts_with("client@10.0.0.11: "));
}

#[tokio::test]
async fn call_all_over_no_endpoints_is_empty() {
    let results = call_all(&[], "eval", Value::Null).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn call_all_reports_a_disconnected_client() {
    let server = Bridge::default();
    let _clients = clients(&server, 2, None);
    let endpoints = client_endpoints(&server);
    endpoints[0].close();

    let err = call_all(&endpoints, "eval", json!("x")).await.unwrap_err();
    assert!(matches!(err.root(), BridgeError::Unreachable));
}

// ── call_each ────────────────────────────────────────────────────

#[tokio::test]
async fn call_each_keeps_partial_results() {
    let server = Bridge::default();
    let _clients = clients(&server, 3, Some(2));
    let endpoints = client_endpoints(&server);

    let outcomes = call_each(&endpoints, "eval", json!("x")).await;
    assert_eq!(outcomes.len(), 3);
    let ok = outcomes.iter().filter(|(_, r)| r.is_ok()).count();
    assert_eq!(ok, 2);
    for (id, _) in &outcomes {
        assert!(endpoints.iter().any(|e| e.id() == *id));
    }
}
