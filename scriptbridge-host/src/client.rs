//! Services exposed by a game client.
//!
//! The client owns the script library, runs code locally, relays UI calls to
//! the server and decides when the editor is shown.

use crate::access::check_grant;
use crate::error::{HostError, HostResult};
use crate::eval::{join_args, run_in_sandbox};
use crate::server::ConnectionInfo;
use scriptbridge_rpc::{parse_args, reply, Bridge, CallContext, Endpoint, HandlerResult};
use scriptbridge_sandbox::{Bindings, EvalSandbox};
use scriptbridge_storage::FileStore;
use scriptbridge_types::methods::{
    CALL_SERVER, CAN_USE, DELETE_FILE, EVAL, FILE_EXISTS, FOCUS, GET_CONNECTION_INFO, LIST_FILES,
    LOADED, READ_FILE, SET_ACCESS_GRANT, SET_VISIBLE, WRITE_FILE,
};
use scriptbridge_types::{Access, ErrorInfo, ExecTarget, Role};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct ClientState {
    loaded: bool,
    visible: bool,
    info: Option<ConnectionInfo>,
    /// Grant last pushed to the UI; cleared when the editor is hidden.
    grant: Access,
}

/// Payload of [`CALL_SERVER`].
#[derive(Debug, Deserialize)]
struct RelayRequest {
    method: String,
    #[serde(default)]
    args: Value,
}

/// The client side of the editor.
pub struct ClientHost {
    bridge: Bridge,
    files: Arc<dyn FileStore>,
    sandbox: EvalSandbox,
    state: Mutex<ClientState>,
}

impl ClientHost {
    /// Creates the host and registers its handlers on `bridge`.
    pub fn install(bridge: &Bridge, files: Arc<dyn FileStore>) -> Arc<Self> {
        let host = Arc::new(Self {
            bridge: bridge.clone(),
            files,
            sandbox: EvalSandbox::default(),
            state: Mutex::new(ClientState::default()),
        });
        host.register();
        host
    }

    fn register(self: &Arc<Self>) {
        let host = Arc::clone(self);
        self.bridge.register(EVAL, move |ctx, args| {
            let host = Arc::clone(&host);
            async move {
                host.authorize_local(&ctx)?;
                let code: String = parse_args(args)?;
                host.eval(code).await
            }
        });

        let host = Arc::clone(self);
        self.bridge.on(EVAL, move |ctx, args| host.eval_trigger(ctx, args));

        let host = Arc::clone(self);
        self.bridge.on(LOADED, move |ctx, _args| {
            info!("Editor loaded ({})", ctx.caller);
            host.state().loaded = true;
        });

        let host = Arc::clone(self);
        self.bridge.register(CALL_SERVER, move |_ctx, args| {
            let host = Arc::clone(&host);
            async move {
                let request: RelayRequest = parse_args(args)?;
                let server = host.server().map_err(ErrorInfo::from)?;
                server
                    .call(&request.method, request.args)
                    .await
                    .map_err(ErrorInfo::from)
            }
        });

        self.register_files();
    }

    fn register_files(self: &Arc<Self>) {
        let files = Arc::clone(&self.files);
        self.bridge.register(LIST_FILES, move |_ctx, _args| {
            let files = Arc::clone(&files);
            async move { reply(files.list_files().map_err(storage_error)?) }
        });

        let files = Arc::clone(&self.files);
        self.bridge.register(READ_FILE, move |_ctx, args| {
            let files = Arc::clone(&files);
            async move {
                let name: String = parse_args(args)?;
                reply(files.read_file(&name).map_err(storage_error)?)
            }
        });

        let files = Arc::clone(&self.files);
        self.bridge.register(FILE_EXISTS, move |_ctx, args| {
            let files = Arc::clone(&files);
            async move {
                let name: String = parse_args(args)?;
                reply(files.file_exists(&name).map_err(storage_error)?)
            }
        });

        let files = Arc::clone(&self.files);
        self.bridge.register(WRITE_FILE, move |_ctx, args| {
            let files = Arc::clone(&files);
            async move {
                let (name, content): (String, String) = parse_args(args)?;
                files.write_file(&name, &content).map_err(storage_error)?;
                Ok(Value::Null)
            }
        });

        let files = Arc::clone(&self.files);
        self.bridge.register(DELETE_FILE, move |_ctx, args| {
            let files = Arc::clone(&files);
            async move {
                let name: String = parse_args(args)?;
                reply(files.delete_file(&name).map_err(storage_error)?)
            }
        });
    }

    // ── Peers ────────────────────────────────────────────────────

    pub fn server(&self) -> HostResult<Endpoint> {
        self.bridge
            .first_with_role(Role::Server)
            .ok_or(HostError::NotAttached("server"))
    }

    pub fn ui(&self) -> HostResult<Endpoint> {
        self.bridge
            .first_with_role(Role::UiSurface)
            .ok_or(HostError::NotAttached("ui-surface"))
    }

    /// Fetches connection info from the server and keeps the activation key.
    pub async fn bootstrap(&self) -> HostResult<ConnectionInfo> {
        let info: ConnectionInfo = self.server()?.call_as(GET_CONNECTION_INFO, ()).await?;
        info!("Editor available at {} (key {})", info.endpoint_url, info.activation_key);
        self.state().info = Some(info.clone());
        Ok(info)
    }

    // ── Editor visibility ────────────────────────────────────────

    /// Toggles the editor if `key` is the activation key. Returns whether
    /// the editor is visible afterwards.
    pub async fn on_key(&self, key: u32) -> HostResult<bool> {
        let activation_key = self.state().info.as_ref().map(|info| info.activation_key);
        if activation_key != Some(key) {
            return Ok(self.is_visible());
        }
        self.toggle().await
    }

    /// Hides a visible editor, or asks the server for a grant and shows the
    /// editor if anything is granted. Does nothing before the UI is loaded.
    pub async fn toggle(&self) -> HostResult<bool> {
        let (loaded, visible) = {
            let state = self.state();
            (state.loaded, state.visible)
        };
        if !loaded {
            debug!("Editor toggle ignored: UI not loaded");
            return Ok(false);
        }

        let ui = self.ui()?;
        if visible {
            self.set_visible(&ui, false, Access::None);
            return Ok(false);
        }

        let access: Access = self.server()?.call_as(CAN_USE, ()).await?;
        if !access.any() {
            info!("Editor access refused by server");
            return Ok(false);
        }
        ui.call_as::<_, Value>(SET_ACCESS_GRANT, access).await?;
        self.set_visible(&ui, true, access);
        Ok(true)
    }

    /// Forwards focus to the editor while it is visible.
    pub fn focus(&self) -> HostResult<()> {
        if self.is_visible() {
            self.ui()?.trigger(FOCUS, Value::Null);
        }
        Ok(())
    }

    fn set_visible(&self, ui: &Endpoint, visible: bool, grant: Access) {
        ui.trigger(SET_VISIBLE, json!(visible));
        let mut state = self.state();
        state.visible = visible;
        state.grant = grant;
    }

    pub fn is_loaded(&self) -> bool {
        self.state().loaded
    }

    pub fn is_visible(&self) -> bool {
        self.state().visible
    }

    /// The grant the UI is currently working with.
    pub fn session_grant(&self) -> Access {
        self.state().grant
    }

    pub fn connection_info(&self) -> Option<ConnectionInfo> {
        self.state().info.clone()
    }

    // ── Evaluation ───────────────────────────────────────────────

    pub async fn eval(&self, code: String) -> HandlerResult {
        run_in_sandbox(self.sandbox.clone(), code, self.bindings()).await
    }

    /// The server may always run code here; the UI only within the grant
    /// it was given.
    fn authorize_local(&self, ctx: &CallContext) -> HostResult<()> {
        match ctx.caller.role {
            Role::Server => Ok(()),
            _ => check_grant(&ctx.caller, self.session_grant(), ExecTarget::Local),
        }
    }

    fn eval_trigger(&self, ctx: &CallContext, args: Value) {
        if let Err(e) = self.authorize_local(ctx) {
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

    /// Names visible to client scripts.
    fn bindings(&self) -> Bindings {
        let bridge = self.bridge.clone();
        Bindings::new()
            .with_prelude()
            .function("log", |args| {
                info!(target: "script", "{}", join_args(&args));
                Ok(Value::Null)
            })
            .function("notify_ui", move |args| {
                let mut args = args.into_iter();
                let Some(Value::String(event)) = args.next() else {
                    return Err("notify_ui(event, payload): event must be a string".to_string());
                };
                let Some(ui) = bridge.first_with_role(Role::UiSurface) else {
                    return Ok(Value::Bool(false));
                };
                ui.trigger(&event, args.next().unwrap_or(Value::Null));
                Ok(Value::Bool(true))
            })
    }

    fn state(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn storage_error(err: scriptbridge_storage::StorageError) -> ErrorInfo {
    ErrorInfo::handler(err.to_string())
}
