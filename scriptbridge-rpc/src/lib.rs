//! Cross-context call and event bridge.
//!
//! Lets the server, a game client and the editor's UI surface invoke named
//! operations on each other and push one-way events, over any transport
//! that can carry [`Envelope`](scriptbridge_types::Envelope)s.
//!
//! # Components
//!
//! - **Bridge**: one per execution context; owns handlers, listeners and
//!   attached endpoints
//! - **Endpoint**: a connected peer; issues calls and triggers
//! - **MessageRouter**: the per-endpoint pending-call table
//! - **HandlerRegistry**: one handler per method name
//! - **EventBus**: any number of listeners per trigger name
//! - **Transport**: in-process channel pairs and TCP
//!
//! # Example
//!
//! ```
//! use scriptbridge_rpc::{Bridge, BridgeConfig, Connection};
//! use scriptbridge_types::Identity;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let server = Bridge::new(BridgeConfig::default());
//! let client = Bridge::new(BridgeConfig::default());
//! server.register("ping", |_ctx, args| async move { Ok(args) });
//!
//! let (a, b) = Connection::pair();
//! let to_server = client.attach(Identity::server(), a);
//! server.attach(Identity::client("127.0.0.1"), b);
//!
//! let pong = to_server.call("ping", json!(42)).await.unwrap();
//! assert_eq!(pong, json!(42));
//! # });
//! ```

mod bridge;
mod endpoint;
mod error;
mod events;
mod fanout;
mod handler;
mod router;
pub mod transport;

pub use bridge::{Bridge, BridgeConfig};
pub use endpoint::Endpoint;
pub use error::{BridgeError, BridgeResult};
pub use events::{EventBus, Listener, ListenerId};
pub use fanout::{call_all, call_each};
pub use handler::{parse_args, reply, CallContext, HandlerFn, HandlerRegistry, HandlerResult};
pub use router::{MessageRouter, ResponseFuture};
pub use transport::Connection;
