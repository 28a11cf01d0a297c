//! The editor's UI surface.
//!
//! Holds the tabs, the grant pushed by the client, and the status line. Every
//! execution request is checked against the grant before it is sent; the
//! receiving side checks again.

use crate::access::check_grant;
use crate::editor::EditorTabs;
use crate::error::{HostError, HostResult};
use scriptbridge_rpc::{parse_args, Bridge, Endpoint};
use scriptbridge_types::methods::{
    CALL_SERVER, DELETE_FILE, EVAL, EVAL_ALL_CLIENTS, FILE_EXISTS, FOCUS, LIST_FILES, LOADED,
    READ_FILE, SET_ACCESS_GRANT, SET_VISIBLE, WRITE_FILE,
};
use scriptbridge_types::{Access, ExecTarget, Identity, Role};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

pub const STATUS_RUNNING_LOCAL: &str = "Running Locally...";
pub const STATUS_RUNNING_SERVER: &str = "Running on Server...";
pub const STATUS_RUNNING_ALL_CLIENTS: &str = "Running on All Clients...";
pub const STATUS_SAVING: &str = "Saving...";

pub const NOTICE_OPEN_FAILED: &str = "Couldn't open file";
pub const NOTICE_SAVE_FAILED: &str = "Couldn't save file";
pub const NOTICE_DELETE_FAILED: &str = "Couldn't delete file";
pub const NOTICE_ALREADY_EXISTS: &str = "This file already exists";

/// Result of a save request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Written under this name.
    Saved(String),
    /// The tab was never saved; a name has to be asked for.
    NeedsName,
    /// The name is taken; nothing was written.
    AlreadyExists,
    /// Empty name or no tab selected.
    Rejected,
    /// The client failed to store the file.
    Failed,
}

#[derive(Debug, Default)]
struct UiState {
    visible: bool,
    grant: Access,
    /// In-flight operations, oldest first; the newest one is shown.
    status: Vec<(u64, &'static str)>,
    next_status: u64,
    notifications: Vec<String>,
    focus_requests: u64,
}

/// The UI surface of one client.
pub struct UiHost {
    bridge: Bridge,
    identity: Identity,
    state: Mutex<UiState>,
    tabs: Mutex<EditorTabs>,
}

impl UiHost {
    /// Creates the UI, registers its handlers and opens the first tab.
    pub fn install(bridge: &Bridge) -> Arc<Self> {
        let mut tabs = EditorTabs::new();
        tabs.new_tab();
        let host = Arc::new(Self {
            bridge: bridge.clone(),
            identity: Identity::ui_surface(),
            state: Mutex::new(UiState::default()),
            tabs: Mutex::new(tabs),
        });
        host.register();
        host
    }

    fn register(self: &Arc<Self>) {
        let host = Arc::clone(self);
        self.bridge.register(SET_ACCESS_GRANT, move |_ctx, args| {
            let host = Arc::clone(&host);
            async move {
                let grant: Access = parse_args(args)?;
                debug!("Access grant set to {:?}", grant);
                host.state().grant = grant;
                Ok(Value::Null)
            }
        });

        let host = Arc::clone(self);
        self.bridge.on(SET_VISIBLE, move |_ctx, args| match args.as_bool() {
            Some(visible) => host.state().visible = visible,
            None => warn!("setVisible expects a boolean, got {}", args),
        });

        let host = Arc::clone(self);
        self.bridge.on(FOCUS, move |_ctx, _args| {
            host.state().focus_requests += 1;
        });
    }

    /// Tells the client the editor is ready.
    pub fn mount(&self) -> HostResult<()> {
        self.client()?.trigger(LOADED, Value::Null);
        Ok(())
    }

    pub fn client(&self) -> HostResult<Endpoint> {
        self.bridge
            .first_with_role(Role::Client)
            .ok_or(HostError::NotAttached("client"))
    }

    pub fn grant(&self) -> Access {
        self.state().grant
    }

    pub fn is_visible(&self) -> bool {
        self.state().visible
    }

    pub fn focus_requests(&self) -> u64 {
        self.state().focus_requests
    }

    /// Current status line; `None` when idle.
    pub fn status(&self) -> Option<String> {
        self.state()
            .status
            .last()
            .map(|(_, status)| status.to_string())
    }

    /// Failure notifications shown since the last call.
    pub fn take_notifications(&self) -> Vec<String> {
        std::mem::take(&mut self.state().notifications)
    }

    // ── Execution ────────────────────────────────────────────────

    /// Runs `code` on `target` if the grant allows it.
    pub async fn run(&self, target: ExecTarget, code: String) -> HostResult<Value> {
        check_grant(&self.identity, self.grant(), target)?;
        let client = self.client()?;
        let (status, call) = match target {
            ExecTarget::Local => (STATUS_RUNNING_LOCAL, client.call(EVAL, json!(code))),
            ExecTarget::Server => (
                STATUS_RUNNING_SERVER,
                client.call(CALL_SERVER, json!({ "method": EVAL, "args": code })),
            ),
            ExecTarget::AllClients => (
                STATUS_RUNNING_ALL_CLIENTS,
                client.call(CALL_SERVER, json!({ "method": EVAL_ALL_CLIENTS, "args": code })),
            ),
        };
        let _status = self.show_status(status);
        Ok(call.await?)
    }

    pub async fn run_local(&self, code: impl Into<String>) -> HostResult<Value> {
        self.run(ExecTarget::Local, code.into()).await
    }

    pub async fn run_server(&self, code: impl Into<String>) -> HostResult<Value> {
        self.run(ExecTarget::Server, code.into()).await
    }

    pub async fn run_all_clients(&self, code: impl Into<String>) -> HostResult<Value> {
        self.run(ExecTarget::AllClients, code.into()).await
    }

    /// Runs the selected tab's content.
    pub async fn run_selected(&self, target: ExecTarget) -> HostResult<Value> {
        let code = self
            .tabs()
            .selected()
            .map(|tab| tab.content.clone())
            .unwrap_or_default();
        self.run(target, code).await
    }

    // ── Tabs ─────────────────────────────────────────────────────

    /// Snapshot of the open tabs.
    pub fn tab_list(&self) -> EditorTabs {
        self.tabs().clone()
    }

    pub fn new_tab(&self) -> u64 {
        self.tabs().new_tab()
    }

    pub fn select_tab(&self, idx: usize) -> bool {
        self.tabs().select(idx)
    }

    pub fn close_tab(&self, idx: usize) -> bool {
        self.tabs().close(idx).is_some()
    }

    pub fn edit(&self, content: impl Into<String>) -> bool {
        self.tabs().edit(content)
    }

    // ── Files ────────────────────────────────────────────────────

    pub async fn list_files(&self) -> HostResult<Vec<String>> {
        Ok(self.client()?.call_as(LIST_FILES, ()).await?)
    }

    /// Opens `name` from the client's library into a tab.
    pub async fn open(&self, name: &str) -> HostResult<()> {
        let result = match self.client() {
            Ok(client) => client.call_as::<_, Option<String>>(READ_FILE, name).await.map_err(HostError::from),
            Err(e) => Err(e),
        };
        match result {
            Ok(Some(content)) => {
                self.tabs().open_file(name, &content);
                Ok(())
            }
            Ok(None) => {
                self.notify(NOTICE_OPEN_FAILED);
                Err(HostError::FileNotFound(name.to_string()))
            }
            Err(e) => {
                self.notify(NOTICE_OPEN_FAILED);
                Err(e)
            }
        }
    }

    /// Saves the selected tab under its own name.
    pub async fn save(&self) -> SaveOutcome {
        let Some(tab) = self.tabs().selected().cloned() else {
            return SaveOutcome::Rejected;
        };
        if tab.is_new() {
            return SaveOutcome::NeedsName;
        }
        self.write_tab(tab.id(), &tab.name, &tab.content, false).await
    }

    /// Saves the selected tab under a name picked in the save dialog. A name
    /// already in the library is refused. With `save_as` the tab keeps
    /// pointing at its old file.
    pub async fn save_with_name(&self, name: &str, save_as: bool) -> SaveOutcome {
        if name.is_empty() {
            return SaveOutcome::Rejected;
        }
        let Some(tab) = self.tabs().selected().cloned() else {
            return SaveOutcome::Rejected;
        };
        let client = match self.client() {
            Ok(client) => client,
            Err(e) => {
                warn!("Save failed: {}", e);
                self.notify(NOTICE_SAVE_FAILED);
                return SaveOutcome::Failed;
            }
        };
        match client.call_as::<_, bool>(FILE_EXISTS, name).await {
            Ok(true) => {
                self.notify(NOTICE_ALREADY_EXISTS);
                return SaveOutcome::AlreadyExists;
            }
            Ok(false) => {}
            Err(e) => {
                warn!("Save failed: {}", e);
                self.notify(NOTICE_SAVE_FAILED);
                return SaveOutcome::Failed;
            }
        }
        self.write_tab(tab.id(), name, &tab.content, save_as).await
    }

    async fn write_tab(&self, id: u64, name: &str, content: &str, save_as: bool) -> SaveOutcome {
        let client = match self.client() {
            Ok(client) => client,
            Err(e) => {
                warn!("Save failed: {}", e);
                self.notify(NOTICE_SAVE_FAILED);
                return SaveOutcome::Failed;
            }
        };
        let result = {
            let _status = self.show_status(STATUS_SAVING);
            client.call(WRITE_FILE, json!([name, content])).await
        };
        match result {
            Ok(_) => {
                if !save_as {
                    self.tabs().mark_saved(id, name, content);
                }
                SaveOutcome::Saved(name.to_string())
            }
            Err(e) => {
                warn!("Save of '{}' failed: {}", name, e);
                self.notify(NOTICE_SAVE_FAILED);
                SaveOutcome::Failed
            }
        }
    }

    /// Deletes `name` from the client's library.
    pub async fn delete(&self, name: &str) -> HostResult<bool> {
        let result = match self.client() {
            Ok(client) => client.call_as::<_, bool>(DELETE_FILE, name).await.map_err(HostError::from),
            Err(e) => Err(e),
        };
        if result.is_err() {
            self.notify(NOTICE_DELETE_FAILED);
        }
        result
    }

    fn notify(&self, message: &str) {
        self.state().notifications.push(message.to_string());
    }

    /// Shows `status` until the returned guard is dropped.
    fn show_status(&self, status: &'static str) -> StatusGuard<'_> {
        let mut state = self.state();
        let id = state.next_status;
        state.next_status += 1;
        state.status.push((id, status));
        StatusGuard { host: self, id }
    }

    fn state(&self) -> MutexGuard<'_, UiState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn tabs(&self) -> MutexGuard<'_, EditorTabs> {
        self.tabs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

struct StatusGuard<'a> {
    host: &'a UiHost,
    id: u64,
}

impl Drop for StatusGuard<'_> {
    fn drop(&mut self) {
        self.host.state().status.retain(|(id, _)| *id != self.id);
    }
}
