//! Sandboxed script evaluation for the editor bridge.
//!
//! Scripts are Lua. A script sees exactly the names in its [`Bindings`]:
//! data values, host functions, and optionally a prelude of pure language
//! helpers. Errors never escape as panics; they come back as
//! [`SandboxError`].
//!
//! ```
//! use scriptbridge_sandbox::{Bindings, EvalSandbox};
//! use serde_json::json;
//!
//! let sandbox = EvalSandbox::default();
//! let bindings = Bindings::new().value("x", json!(5));
//! assert_eq!(sandbox.run("return x + 1", &bindings).unwrap(), json!(6));
//! ```

mod bindings;
mod error;
mod sandbox;

pub use bindings::{Binding, Bindings, HostFn, PRELUDE};
pub use error::{SandboxError, SandboxResult};
pub use sandbox::{
    EvalOutput, EvalSandbox, SandboxLimits, DEFAULT_MAX_INSTRUCTIONS, DEFAULT_MAX_MEMORY,
    DEFAULT_MAX_OUTPUT_BYTES,
};
