use serde::Serialize;
use serde_json::{Map, Value};

/// Structured result of one task invocation.
///
/// Serializes flat: `changed`, `messages`, then every task-specific field.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskOutcome {
    pub changed: bool,
    pub messages: Vec<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl TaskOutcome {
    pub fn new(changed: bool) -> Self {
        Self {
            changed,
            ..Self::default()
        }
    }

    pub fn unchanged() -> Self {
        Self::new(false)
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn set_field(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn push_message(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.push_message(message);
        self
    }

    pub fn mark_changed(&mut self, changed: bool) {
        self.changed |= changed;
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}
