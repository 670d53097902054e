use super::Value;

///
/// PathValue
///
/// Dotted-path extraction for record types that can resolve a path to a
/// value at runtime. Powers the path-based attribute factory; typed
/// schemas with closure extractors do not need this.
///

pub trait PathValue {
    /// Resolve a dotted path (`profile.settings.theme`) against the
    /// record. `None` means the path is absent; an explicit null at the
    /// path returns `Some(Value::Null)`.
    fn path_value(&self, path: &str) -> Option<Value>;
}

impl PathValue for serde_json::Value {
    fn path_value(&self, path: &str) -> Option<Value> {
        let mut node = self;
        for segment in path.split('.') {
            node = node.as_object()?.get(segment)?;
        }
        from_json(node)
    }
}

// JSON leaves convert structurally; objects are reachable only through a
// deeper path, so an object leaf is treated as absent.
fn from_json(node: &serde_json::Value) -> Option<Value> {
    match node {
        serde_json::Value::Null => Some(Value::Null),
        serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Value::Int(i))
            } else if let Some(u) = n.as_u64() {
                Some(Value::Uint(u))
            } else {
                n.as_f64().map(Value::Float)
            }
        }
        serde_json::Value::String(s) => Some(Value::Text(s.clone())),
        serde_json::Value::Array(items) => Some(Value::List(
            items.iter().filter_map(from_json).collect(),
        )),
        serde_json::Value::Object(_) => None,
    }
}
