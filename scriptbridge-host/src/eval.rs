//! Running scripts off the async runtime.

use scriptbridge_rpc::HandlerResult;
use scriptbridge_sandbox::{Bindings, EvalSandbox};
use scriptbridge_types::ErrorInfo;
use serde_json::Value;

/// Runs `code` on the blocking pool and maps failures to `eval_failed`.
pub(crate) async fn run_in_sandbox(sandbox: EvalSandbox, code: String, bindings: Bindings) -> HandlerResult {
    tokio::task::spawn_blocking(move || sandbox.run(&code, &bindings))
        .await
        .map_err(|e| ErrorInfo::handler(format!("eval task failed: {e}")))?
        .map_err(|e| ErrorInfo::eval(e.to_string()))
}

/// Joins script arguments the way `print` would.
pub(crate) fn join_args(args: &[Value]) -> String {
    args.iter()
        .map(|arg| match arg {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\t")
}
