//! Cross-turn conversation memory.

use serde_json::{Value, json};
use uuid::Uuid;

/// Input items carried from one turn to the next, in Responses API format.
///
/// A turn's items are only committed once the turn completes, so a failed
/// turn leaves the history as it was.
#[derive(Debug, Clone)]
pub struct Conversation {
    id: String,
    items: Vec<Value>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            items: Vec::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn items(&self) -> &[Value] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Commit the items of a completed turn.
    pub fn commit(&mut self, turn: Vec<Value>) {
        self.items.extend(turn);
    }
}

pub(crate) fn user_message(text: &str) -> Value {
    json!({ "role": "user", "content": text })
}

pub(crate) fn assistant_message(text: &str) -> Value {
    json!({ "role": "assistant", "content": text })
}

pub(crate) fn function_call(call_id: &str, name: &str, arguments: &str) -> Value {
    json!({
        "type": "function_call",
        "call_id": call_id,
        "name": name,
        "arguments": arguments
    })
}

pub(crate) fn function_call_output(call_id: &str, output: &str) -> Value {
    json!({
        "type": "function_call_output",
        "call_id": call_id,
        "output": output
    })
}
