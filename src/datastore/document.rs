use serde_json::{json, Map, Value};

/// Document is a command or reply exchanged with the datastore. Key order is irrelevant to the
/// datastore for everything we send, except that a command's name must be its first key, which
/// is why every command here is a single-key document.
pub type Document = Map<String, Value>;

pub(crate) const ADMIN_DATABASE: &str = "admin";

pub(crate) const PING: &str = "ping";
pub(crate) const SERVER_STATUS: &str = "serverStatus";
pub(crate) const REPL_SET_GET_STATUS: &str = "replSetGetStatus";
pub(crate) const REPL_SET_GET_CONFIG: &str = "replSetGetConfig";
pub(crate) const REPL_SET_INITIATE: &str = "replSetInitiate";
pub(crate) const REPL_SET_RECONFIG: &str = "replSetReconfig";

/// Builds `{name: 1}`.
pub(crate) fn simple_command(name: &str) -> Document {
    command_with_argument(name, json!(1))
}

/// Builds `{name: argument}`.
pub(crate) fn command_with_argument(name: &str, argument: Value) -> Document {
    let mut command = Document::new();
    command.insert(name.to_string(), argument);
    command
}

/// The name of a command is its first key.
pub fn command_name(command: &Document) -> Option<&str> {
    command.keys().next().map(|k| k.as_str())
}

/// Whether the reply carries the datastore's success marker. The datastore writes `ok` as a
/// double (`1.0`), but older servers and proxies write `1` or `true`.
pub fn reply_ok(reply: &Document) -> bool {
    match reply.get("ok") {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|v| v == 1.0).unwrap_or(false),
        _ => false,
    }
}

/// Error message of a "not ok" reply, if the datastore gave one.
pub fn reply_error_message(reply: &Document) -> Option<&str> {
    reply.get("errmsg").and_then(Value::as_str)
}

/// Reply helpers for anything that answers commands (command server handlers, fakes).
pub fn ok_reply(mut body: Document) -> Document {
    body.insert("ok".to_string(), json!(1.0));
    body
}

pub fn error_reply(message: impl Into<String>) -> Document {
    let mut reply = Document::new();
    reply.insert("ok".to_string(), json!(0.0));
    reply.insert("errmsg".to_string(), Value::String(message.into()));
    reply
}
