//! Services exposed by the server context.

use crate::access::AccessGate;
use crate::config::ServerConfig;
use crate::eval::run_in_sandbox;
use scriptbridge_rpc::{call_all, parse_args, reply, Bridge, CallContext, HandlerResult};
use scriptbridge_sandbox::{Bindings, EvalSandbox};
use scriptbridge_types::methods::{CAN_USE, EVAL, EVAL_ALL_CLIENTS, GET_CONNECTION_INFO};
use scriptbridge_types::{ErrorInfo, ExecTarget, Identity, Role};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// Where a client finds the editor and which key opens it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub endpoint_url: String,
    pub activation_key: u32,
}

/// The server side of the editor.
pub struct ServerHost {
    bridge: Bridge,
    config: ServerConfig,
    gate: AccessGate,
    sandbox: EvalSandbox,
}

impl ServerHost {
    /// Creates the host and registers its handlers on `bridge`.
    pub fn install(bridge: &Bridge, config: ServerConfig) -> Arc<Self> {
        let gate = config.access_gate();
        Self::install_with_gate(bridge, config, gate)
    }

    pub fn install_with_gate(bridge: &Bridge, config: ServerConfig, gate: AccessGate) -> Arc<Self> {
        let host = Arc::new(Self {
            bridge: bridge.clone(),
            config,
            gate,
            sandbox: EvalSandbox::default(),
        });
        host.register();
        host
    }

    fn register(self: &Arc<Self>) {
        let host = Arc::clone(self);
        self.bridge.register(CAN_USE, move |ctx, _args| {
            let host = Arc::clone(&host);
            async move { reply(host.gate.resolve_access(&ctx.caller)) }
        });

        let host = Arc::clone(self);
        self.bridge.register(GET_CONNECTION_INFO, move |ctx, _args| {
            let host = Arc::clone(&host);
            async move { reply(host.connection_info(&ctx.caller)) }
        });

        let host = Arc::clone(self);
        self.bridge.register(EVAL, move |ctx, args| {
            let host = Arc::clone(&host);
            async move {
                host.gate.check(&ctx.caller, ExecTarget::Server)?;
                let code: String = parse_args(args)?;
                host.eval(code).await
            }
        });

        let host = Arc::clone(self);
        self.bridge.register(EVAL_ALL_CLIENTS, move |ctx, args| {
            let host = Arc::clone(&host);
            async move {
                host.gate.check(&ctx.caller, ExecTarget::AllClients)?;
                let code: String = parse_args(args)?;
                host.eval_all_clients(code).await
            }
        });

        let host = Arc::clone(self);
        self.bridge.on(EVAL, move |ctx, args| host.eval_trigger(ctx, args));
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn gate(&self) -> &AccessGate {
        &self.gate
    }

    pub fn connection_info(&self, identity: &Identity) -> ConnectionInfo {
        ConnectionInfo {
            endpoint_url: self.config.endpoint_url_for(identity),
            activation_key: self.config.activation_key,
        }
    }

    /// Runs `code` on the server.
    pub async fn eval(&self, code: String) -> HandlerResult {
        run_in_sandbox(self.sandbox.clone(), code, self.bindings()).await
    }

    /// Runs `code` on every connected client and joins all-or-nothing.
    pub async fn eval_all_clients(&self, code: String) -> HandlerResult {
        let clients = self.bridge.endpoints_with_role(Role::Client);
        info!("Evaluating on {} clients", clients.len());
        let results = call_all(&clients, EVAL, json!(code)).await.map_err(ErrorInfo::from)?;
        Ok(Value::Array(results))
    }

    /// One-way `eval`: failures are logged and go nowhere else.
    fn eval_trigger(&self, ctx: &CallContext, args: Value) {
        if let Err(e) = self.gate.check(&ctx.caller, ExecTarget::Server) {
            warn!("Ignoring eval trigger: {}", e);
            return;
        }
        let code: String = match parse_args(args) {
            Ok(code) => code,
            Err(e) => {
                warn!("Ignoring eval trigger from {}: {}", ctx.caller, e);
                return;
            }
        };
        let sandbox = self.sandbox.clone();
        let bindings = self.bindings();
        let caller = ctx.caller.clone();
        tokio::spawn(async move {
            if let Err(e) = run_in_sandbox(sandbox, code, bindings).await {
                warn!("Swallowed eval failure from {}: {}", caller, e);
            }
        });
    }

    /// Names visible to server scripts.
    fn bindings(&self) -> Bindings {
        let clients = self.bridge.clone();
        let broadcast = self.bridge.clone();
        Bindings::new()
            .with_prelude()
            .function("log", |args| {
                info!(target: "script", "{}", crate::eval::join_args(&args));
                Ok(Value::Null)
            })
            .function("clients", move |_args| {
                let addresses: Vec<Value> = clients
                    .endpoints_with_role(Role::Client)
                    .iter()
                    .map(|endpoint| json!(endpoint.identity().address))
                    .collect();
                Ok(Value::Array(addresses))
            })
            .function("broadcast", move |args| {
                let mut args = args.into_iter();
                let Some(Value::String(event)) = args.next() else {
                    return Err("broadcast(event, payload): event must be a string".to_string());
                };
                let payload = args.next().unwrap_or(Value::Null);
                let clients = broadcast.endpoints_with_role(Role::Client);
                for endpoint in &clients {
                    endpoint.trigger(&event, payload.clone());
                }
                Ok(json!(clients.len()))
            })
    }
}

