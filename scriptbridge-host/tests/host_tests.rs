use pretty_assertions::assert_eq;
use scriptbridge_host::{
    ClientHost, HostError, SaveOutcome, ServerConfig, ServerHost, UiHost, NOTICE_ALREADY_EXISTS,
    NOTICE_OPEN_FAILED, STATUS_RUNNING_LOCAL, STATUS_RUNNING_SERVER,
};
use scriptbridge_rpc::{Bridge, BridgeError, Connection};
use scriptbridge_storage::{FileStore, ScriptLibrary};
use scriptbridge_types::methods::{CALL_SERVER, EVAL, GET_CONNECTION_INFO, SET_ACCESS_GRANT};
use scriptbridge_types::{
    Access, CallId, Envelope, ErrorCode, ExecTarget, Identity, Message, Response,
    DEFAULT_NAMESPACE,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// One server, one client, one UI surface, wired in process.
struct World {
    server: Arc<ServerHost>,
    client: Arc<ClientHost>,
    ui: Arc<UiHost>,
    client_bridge: Bridge,
    ui_bridge: Bridge,
    library: ScriptLibrary,
}

fn world(config: ServerConfig, client_address: &str) -> World {
    let server_bridge = Bridge::default();
    let client_bridge = Bridge::default();
    let ui_bridge = Bridge::default();

    let server = ServerHost::install(&server_bridge, config);
    let library = ScriptLibrary::open_in_memory();
    let client = ClientHost::install(&client_bridge, Arc::new(library.clone()));
    let ui = UiHost::install(&ui_bridge);

    let (a, b) = Connection::pair();
    client_bridge.attach(Identity::server(), a);
    server_bridge.attach(Identity::client(client_address), b);

    let (c, d) = Connection::pair();
    client_bridge.attach(Identity::ui_surface(), c);
    ui_bridge.attach(Identity::client(client_address), d);

    World {
        server,
        client,
        ui,
        client_bridge,
        ui_bridge,
        library,
    }
}

fn open_world() -> World {
    world(ServerConfig::default(), "127.0.0.1")
}

async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached");
}

/// Mounts the UI and opens the editor.
async fn open_editor(w: &World) {
    w.ui.mount().unwrap();
    eventually(|| w.client.is_loaded()).await;
    assert!(w.client.toggle().await.unwrap());
    eventually(|| w.ui.is_visible()).await;
}

/// A UI surface with full access, attached to a client the test drives by
/// hand.
async fn ui_with_manual_client() -> (
    Arc<UiHost>,
    mpsc::UnboundedSender<Envelope>,
    mpsc::UnboundedReceiver<Envelope>,
) {
    let bridge = Bridge::default();
    let ui = UiHost::install(&bridge);
    let (local, remote) = Connection::pair();
    bridge.attach(Identity::client("127.0.0.1"), local);
    let (tx, rx) = remote.into_parts();
    tx.send(Envelope::new(
        DEFAULT_NAMESPACE,
        Message::call(CallId::new(), SET_ACCESS_GRANT, json!(true)),
    ))
    .unwrap();
    eventually(|| ui.grant() == Access::Full).await;
    (ui, tx, rx)
}

/// Next call the UI sent, skipping responses.
async fn next_call(rx: &mut mpsc::UnboundedReceiver<Envelope>) -> (CallId, String) {
    loop {
        if let Message::Call { id, method, .. } = rx.recv().await.unwrap().msg {
            return (id, method);
        }
    }
}

fn answer(tx: &mpsc::UnboundedSender<Envelope>, id: CallId) {
    tx.send(Envelope::new(
        DEFAULT_NAMESPACE,
        Message::Response(Response::success(id, json!(1))),
    ))
    .unwrap();
}

// ── Connection info and toggling ─────────────────────────────────

#[tokio::test]
async fn bootstrap_fetches_connection_info() {
    let w = open_world();
    let info = w.client.bootstrap().await.unwrap();
    assert_eq!(info.endpoint_url, "http://localhost:7788");
    assert_eq!(info.activation_key, 113);
    assert_eq!(w.client.connection_info(), Some(info));
}

#[tokio::test]
async fn remote_caller_gets_public_url() {
    let config = ServerConfig {
        public_address: Some("play.example.net".to_string()),
        ..ServerConfig::default()
    };
    let w = world(config, "10.0.0.4");
    let info = w.client.bootstrap().await.unwrap();
    assert_eq!(info.endpoint_url, "http://play.example.net:7788");
    assert_eq!(w.server.connection_info(&Identity::client("127.0.0.1")).endpoint_url, "http://localhost:7788");
}

#[tokio::test]
async fn toggle_before_load_does_nothing() {
    let w = open_world();
    assert!(!w.client.toggle().await.unwrap());
    assert!(!w.client.is_visible());
}

#[tokio::test]
async fn activation_key_opens_and_closes_editor() {
    let w = open_world();
    w.client.bootstrap().await.unwrap();
    w.ui.mount().unwrap();
    eventually(|| w.client.is_loaded()).await;

    assert!(!w.client.on_key(65).await.unwrap());
    assert!(w.client.on_key(113).await.unwrap());
    eventually(|| w.ui.is_visible()).await;
    assert_eq!(w.ui.grant(), Access::Full);
    assert_eq!(w.client.session_grant(), Access::Full);

    assert!(!w.client.on_key(113).await.unwrap());
    eventually(|| !w.ui.is_visible()).await;
    assert_eq!(w.client.session_grant(), Access::None);
}

#[tokio::test]
async fn refused_client_never_sees_the_editor() {
    let config = ServerConfig {
        whitelist_ips: Some(vec!["10.0.0.1".to_string()]),
        ..ServerConfig::default()
    };
    let w = world(config, "10.0.0.66");
    w.ui.mount().unwrap();
    eventually(|| w.client.is_loaded()).await;

    assert!(!w.client.toggle().await.unwrap());
    assert!(!w.client.is_visible());
    assert_eq!(w.ui.grant(), Access::None);
}

#[tokio::test]
async fn focus_is_forwarded_only_while_visible() {
    let w = open_world();
    w.ui.mount().unwrap();
    eventually(|| w.client.is_loaded()).await;

    w.client.focus().unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(w.ui.focus_requests(), 0);

    assert!(w.client.toggle().await.unwrap());
    w.client.focus().unwrap();
    eventually(|| w.ui.focus_requests() == 1).await;
}

// ── Execution ────────────────────────────────────────────────────

#[tokio::test]
async fn run_on_each_target() {
    let w = open_world();
    open_editor(&w).await;

    assert_eq!(w.ui.run_local("return 1 + 1").await.unwrap(), json!(2));
    assert_eq!(w.ui.run_server("return 'server'").await.unwrap(), json!("server"));
    assert_eq!(w.ui.run_all_clients("return 40 + 2").await.unwrap(), json!([42]));
    assert_eq!(w.ui.status(), None);
}

#[tokio::test]
async fn run_selected_uses_tab_content() {
    let w = open_world();
    open_editor(&w).await;

    w.ui.edit("return string.rep('ab', 2)");
    assert_eq!(w.ui.run_selected(ExecTarget::Local).await.unwrap(), json!("abab"));
}

#[tokio::test]
async fn partial_grant_limits_targets_at_the_ui() {
    let config = ServerConfig {
        grants: [(
            "10.0.0.5".to_string(),
            Access::Partial {
                local: true,
                server: false,
                clients: false,
            },
        )]
        .into(),
        ..ServerConfig::default()
    };
    let w = world(config, "10.0.0.5");
    open_editor(&w).await;

    assert_eq!(w.ui.run_local("return 'ok'").await.unwrap(), json!("ok"));
    let err = w.ui.run_server("return 1").await.unwrap_err();
    assert!(matches!(err, HostError::AccessDenied { target: ExecTarget::Server, .. }));
    let err = w.ui.run_all_clients("return 1").await.unwrap_err();
    assert!(matches!(err, HostError::AccessDenied { .. }));
    assert_eq!(w.ui.status(), None);
}

#[tokio::test]
async fn server_revalidates_direct_calls() {
    let config = ServerConfig {
        whitelist_ips: Some(vec!["10.0.0.1".to_string()]),
        ..ServerConfig::default()
    };
    let w = world(config, "10.0.0.66");

    let server = w.client.server().unwrap();
    let err = server.call(EVAL, json!("return 1")).await.unwrap_err();
    assert_eq!(err.remote_code(), Some(ErrorCode::AccessDenied));
}

#[tokio::test]
async fn client_revalidates_ui_eval_against_session_grant() {
    let w = open_world();
    // The editor was never opened, so no grant was pushed.
    let client = w.ui.client().unwrap();
    let err = client.call(EVAL, json!("return 1")).await.unwrap_err();
    assert_eq!(err.remote_code(), Some(ErrorCode::AccessDenied));
}

#[tokio::test]
async fn eval_errors_propagate_and_reset_status() {
    let w = open_world();
    open_editor(&w).await;

    let err = w.ui.run_server("error('kaput')").await.unwrap_err();
    match err {
        HostError::Bridge(BridgeError::Remote(info)) => {
            assert_eq!(info.code, ErrorCode::EvalFailed);
            assert!(info.message.contains("kaput"));
        }
        other => panic!("expected remote eval error, got {other:?}"),
    }
    assert_eq!(w.ui.status(), None);

    let err = w.ui.run_all_clients("while true do end").await.unwrap_err();
    assert!(err.to_string().contains("instruction limit"), "{err}");
}

#[tokio::test]
async fn overlapping_runs_keep_status_until_the_last_finishes() {
    let (ui, tx, mut rx) = ui_with_manual_client().await;

    let local = tokio::spawn({
        let ui = Arc::clone(&ui);
        async move { ui.run_local("return 1").await }
    });
    let server = tokio::spawn({
        let ui = Arc::clone(&ui);
        async move { ui.run_server("return 1").await }
    });
    let first = next_call(&mut rx).await;
    let second = next_call(&mut rx).await;
    let still_running = |method: &str| match method {
        EVAL => STATUS_RUNNING_LOCAL,
        CALL_SERVER => STATUS_RUNNING_SERVER,
        other => panic!("unexpected call {other}"),
    };

    answer(&tx, first.0);
    let finished = if first.1 == EVAL { local } else { server };
    finished.await.unwrap().unwrap();
    assert_eq!(ui.status().as_deref(), Some(still_running(&second.1)));

    answer(&tx, second.0);
    eventually(|| ui.status().is_none()).await;
}

#[tokio::test]
async fn abandoned_run_clears_status() {
    let (ui, _tx, mut rx) = ui_with_manual_client().await;

    let run = tokio::spawn({
        let ui = Arc::clone(&ui);
        async move { ui.run_local("return 1").await }
    });
    next_call(&mut rx).await;
    assert_eq!(ui.status().as_deref(), Some(STATUS_RUNNING_LOCAL));

    run.abort();
    assert!(run.await.unwrap_err().is_cancelled());
    assert_eq!(ui.status(), None);
}

#[tokio::test]
async fn one_way_eval_failures_are_swallowed() {
    let w = open_world();
    let server = w.client.server().unwrap();

    server.trigger(EVAL, json!("error('ignored')"));
    server.trigger(EVAL, json!(17));

    let info: Value = server.call(GET_CONNECTION_INFO, Value::Null).await.unwrap();
    assert_eq!(info["activationKey"], json!(113));
}

// ── Script bindings ──────────────────────────────────────────────

#[tokio::test]
async fn server_script_can_broadcast_to_clients() {
    let w = open_world();
    open_editor(&w).await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    w.client_bridge.on("announce", move |_ctx, args| {
        let _ = tx.send(args);
    });

    let sent = w
        .ui
        .run_server("log('hello') return broadcast('announce', { text = 'hi' })")
        .await
        .unwrap();
    assert_eq!(sent, json!(1));
    let payload = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
    assert_eq!(payload, json!({ "text": "hi" }));

    let clients = w.ui.run_server("return clients()").await.unwrap();
    assert_eq!(clients, json!(["127.0.0.1"]));
}

#[tokio::test]
async fn client_script_can_notify_the_ui() {
    let w = open_world();
    open_editor(&w).await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    w.ui_bridge.on("highlight", move |_ctx, args| {
        let _ = tx.send(args);
    });

    assert_eq!(w.ui.run_local("return notify_ui('highlight', 3)").await.unwrap(), json!(true));
    let payload = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
    assert_eq!(payload, json!(3));
}

// ── Files ────────────────────────────────────────────────────────

#[tokio::test]
async fn new_tab_needs_a_name_before_saving() {
    let w = open_world();
    w.ui.edit("return 1");
    assert_eq!(w.ui.save().await, SaveOutcome::NeedsName);

    assert_eq!(w.ui.save_with_name("one.lua", false).await, SaveOutcome::Saved("one.lua".into()));
    let tabs = w.ui.tab_list();
    let tab = tabs.selected().unwrap();
    assert_eq!(tab.title(), "one.lua");
    assert_eq!(w.library.read_file("one.lua").unwrap(), Some("return 1".to_string()));

    w.ui.edit("return 2");
    assert_eq!(w.ui.save().await, SaveOutcome::Saved("one.lua".into()));
    assert_eq!(w.library.read_file("one.lua").unwrap(), Some("return 2".to_string()));
    assert_eq!(w.ui.status(), None);
}

#[tokio::test]
async fn save_dialog_refuses_existing_name() {
    let w = open_world();
    w.library.write_file("taken.lua", "old").unwrap();
    w.ui.edit("new");

    assert_eq!(w.ui.save_with_name("taken.lua", false).await, SaveOutcome::AlreadyExists);
    assert_eq!(w.ui.take_notifications(), vec![NOTICE_ALREADY_EXISTS.to_string()]);
    assert_eq!(w.library.read_file("taken.lua").unwrap(), Some("old".to_string()));
    assert_eq!(w.ui.save_with_name("", false).await, SaveOutcome::Rejected);
}

#[tokio::test]
async fn save_as_keeps_tab_binding() {
    let w = open_world();
    w.library.write_file("orig.lua", "v1").unwrap();
    w.ui.open("orig.lua").await.unwrap();
    w.ui.edit("v2");

    assert_eq!(w.ui.save_with_name("copy.lua", true).await, SaveOutcome::Saved("copy.lua".into()));
    let tabs = w.ui.tab_list();
    let tab = tabs.selected().unwrap();
    assert_eq!(tab.name, "orig.lua");
    assert!(tab.is_unsaved());
    assert_eq!(w.library.read_file("copy.lua").unwrap(), Some("v2".to_string()));
    assert_eq!(w.library.read_file("orig.lua").unwrap(), Some("v1".to_string()));
}

#[tokio::test]
async fn open_list_and_delete() {
    let w = open_world();
    for name in ["b.lua", "A.lua", "c.lua"] {
        w.library.write_file(name, name).unwrap();
    }
    assert_eq!(w.ui.list_files().await.unwrap(), vec!["A.lua", "b.lua", "c.lua"]);

    w.ui.open("b.lua").await.unwrap();
    assert_eq!(w.ui.tab_list().len(), 1);
    w.ui.open("c.lua").await.unwrap();
    assert_eq!(w.ui.tab_list().len(), 2);

    assert!(w.ui.delete("A.lua").await.unwrap());
    assert!(!w.library.file_exists("A.lua").unwrap());
}

#[tokio::test]
async fn failed_open_notifies_and_leaves_tabs_alone() {
    let w = open_world();
    let err = w.ui.open("missing.lua").await.unwrap_err();
    assert!(matches!(err, HostError::FileNotFound(_)));
    assert_eq!(w.ui.take_notifications(), vec![NOTICE_OPEN_FAILED.to_string()]);
    assert_eq!(w.ui.tab_list().len(), 1);
    assert!(w.ui.tab_list().selected().unwrap().is_blank());
}
