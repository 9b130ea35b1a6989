//! Plain text to rich text encoding for comments
//!
//! Jira Cloud only accepts comment bodies in Atlassian Document Format (ADF).
//! The encoder is a separate trait so a backend can swap it without touching
//! the rules that produce comment text.

use serde_json::{json, Value};

/// Turns plain comment text into a tracker's structured document body
pub trait RichTextEncoder: Send + Sync {
    fn encode(&self, text: &str) -> Value;
}

/// Encodes text as a single-paragraph ADF document (version 1)
#[derive(Debug, Clone, Copy, Default)]
pub struct AdfEncoder;

impl RichTextEncoder for AdfEncoder {
    fn encode(&self, text: &str) -> Value {
        json!({
            "type": "doc",
            "version": 1,
            "content": [
                {
                    "type": "paragraph",
                    "content": [
                        { "type": "text", "text": text }
                    ]
                }
            ]
        })
    }
}

/// Recover the plain text from an ADF document by concatenating its text nodes
pub fn plain_text(doc: &Value) -> String {
    let mut out = String::new();
    collect_text(doc, &mut out);
    out
}

fn collect_text(node: &Value, out: &mut String) {
    if let Some(text) = node.get("text").and_then(Value::as_str) {
        out.push_str(text);
    }
    if let Some(children) = node.get("content").and_then(Value::as_array) {
        for child in children {
            collect_text(child, out);
        }
    }
}
