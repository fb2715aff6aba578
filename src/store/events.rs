//! Server-sent event decoding for the record database's streaming endpoint.
//!
//! The stream carries `put` and `patch` events addressed by a path relative to
//! the subscribed location. They are applied to a local JSON tree, from which
//! a [`RecordSnapshot`] is rebuilt after each change.

use serde::Deserialize;
use serde_json::{Map, Value};

use super::{ImageRecord, RecordSnapshot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Incremental decoder; chunks may split events, lines or UTF-8 sequences.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some((end, separator)) = find_event_boundary(&self.buffer) {
            let block: Vec<u8> = self.buffer.drain(..end + separator).collect();
            if let Some(event) = parse_block(&String::from_utf8_lossy(&block[..end])) {
                events.push(event);
            }
        }
        events
    }
}

fn find_event_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = find(buffer, b"\n\n").map(|i| (i, 2));
    let crlf = find(buffer, b"\r\n\r\n").map(|i| (i, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn parse_block(block: &str) -> Option<SseEvent> {
    let mut event = String::new();
    let mut data: Vec<&str> = Vec::new();

    for line in block.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = value.to_string(),
            "data" => data.push(value),
            _ => {}
        }
    }

    if event.is_empty() && data.is_empty() {
        return None;
    }
    if event.is_empty() {
        event = "message".to_string();
    }
    Some(SseEvent {
        event,
        data: data.join("\n"),
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseEvent {
    Put { path: String, data: Value },
    Patch { path: String, data: Value },
    KeepAlive,
    /// The server closed the stream, e.g. because security rules changed.
    Cancel(String),
    AuthRevoked,
    Other(String),
}

#[derive(Debug, Deserialize)]
struct PathPayload {
    path: String,
    #[serde(default)]
    data: Value,
}

impl DatabaseEvent {
    pub fn from_sse(event: &SseEvent) -> Result<Self, serde_json::Error> {
        Ok(match event.event.as_str() {
            "put" => {
                let payload: PathPayload = serde_json::from_str(&event.data)?;
                DatabaseEvent::Put {
                    path: payload.path,
                    data: payload.data,
                }
            }
            "patch" => {
                let payload: PathPayload = serde_json::from_str(&event.data)?;
                DatabaseEvent::Patch {
                    path: payload.path,
                    data: payload.data,
                }
            }
            "keep-alive" => DatabaseEvent::KeepAlive,
            "cancel" => DatabaseEvent::Cancel(event.data.clone()),
            "auth_revoked" => DatabaseEvent::AuthRevoked,
            other => DatabaseEvent::Other(other.to_string()),
        })
    }
}

/// Replaces the node at `path`; a `null` value deletes it.
pub fn apply_put(root: &mut Value, path: &str, data: Value) {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let Some((last, parents)) = segments.split_last() else {
        *root = data;
        return;
    };

    let mut node = root;
    for segment in parents {
        node = object_mut(node)
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    let object = object_mut(node);
    if data.is_null() {
        object.remove(*last);
    } else {
        object.insert(last.to_string(), data);
    }
}

/// Merges each child of `data` into the node at `path`.
pub fn apply_patch(root: &mut Value, path: &str, data: Value) {
    let Value::Object(children) = data else {
        return;
    };
    let base = path.trim_end_matches('/');
    for (key, value) in children {
        apply_put(root, &format!("{base}/{key}"), value);
    }
}

fn object_mut(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced with an object"),
    }
}

/// Builds an ordered snapshot, skipping children that are not image records.
pub fn snapshot_from_value(value: &Value) -> RecordSnapshot {
    let Value::Object(children) = value else {
        return RecordSnapshot::default();
    };
    let mut entries: Vec<(String, ImageRecord)> = children
        .iter()
        .filter_map(|(key, child)| {
            match serde_json::from_value::<ImageRecord>(child.clone()) {
                Ok(record) => Some((key.clone(), record)),
                Err(e) => {
                    tracing::debug!(%key, error = %e, "skipping malformed image record");
                    None
                }
            }
        })
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    RecordSnapshot { entries }
}
