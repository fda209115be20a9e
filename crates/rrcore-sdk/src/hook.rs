use serde_json::Value;

/// The live external call an adapter wraps around: given normalized inputs,
/// perform the real I/O (an HTTP request, a shell command, a model call) and
/// return its outputs. Only invoked in record mode — replay never calls it.
pub trait Hook {
    fn invoke(&self, inputs: &Value) -> std::result::Result<Value, Box<dyn std::error::Error + Send + Sync>>;
}

/// Adapts a plain closure into a `Hook`, for the common case where the live
/// call has no state worth a named type.
impl<F> Hook for F
where
    F: Fn(&Value) -> std::result::Result<Value, Box<dyn std::error::Error + Send + Sync>>,
{
    fn invoke(&self, inputs: &Value) -> std::result::Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        self(inputs)
    }
}
