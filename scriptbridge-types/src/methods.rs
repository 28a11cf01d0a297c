//! Method and event names each role exposes.

// Server calls
pub const CAN_USE: &str = "canUse";
pub const GET_CONNECTION_INFO: &str = "getConnectionInfo";
pub const EVAL_ALL_CLIENTS: &str = "evalAllClients";

// Server and client calls, also accepted as a one-way trigger
pub const EVAL: &str = "eval";

// Client calls
pub const LIST_FILES: &str = "listFiles";
pub const READ_FILE: &str = "readFile";
pub const FILE_EXISTS: &str = "fileExists";
pub const WRITE_FILE: &str = "writeFile";
pub const DELETE_FILE: &str = "deleteFile";
/// Forwards `{ "method", "args" }` from the UI surface to the server.
pub const CALL_SERVER: &str = "callServer";

// UI-surface calls
pub const SET_ACCESS_GRANT: &str = "setAccessGrant";

// Triggers
pub const SET_VISIBLE: &str = "setVisible";
pub const FOCUS: &str = "focus";
pub const LOADED: &str = "loaded";
