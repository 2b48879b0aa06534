//! The shared input bag threaded through every tree walk.
//!
//! The bag is a single nested JSON object. Actions communicate exclusively by
//! reading and writing dotted paths in it, namespaced by provider by
//! convention (`azure-bot.botId`, `aad.clientId`, ...). Handles are cheap to
//! clone and all clones observe the same data; every access takes the lock
//! for a short, synchronous critical section so parallel branches never race
//! on the underlying map.

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use serde_json::{Map as JsonMap, Value};

/// Reserved key holding the human-readable step counter.
pub const STEP_KEY: &str = "step";

/// Shared, lock-protected nested key/value store.
#[derive(Clone, Default)]
pub struct InputBag {
    inner: Arc<Mutex<JsonMap<String, Value>>>,
}

impl fmt::Debug for InputBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputBag").field("values", &*self.lock()).finish()
    }
}

impl InputBag {
    /// Creates an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bag seeded with the given map.
    pub fn from_map(map: JsonMap<String, Value>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(map)),
        }
    }

    /// Creates a bag from a JSON value; non-object values yield an empty bag.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::from_map(map),
            _ => Self::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, JsonMap<String, Value>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a copy of the value at `path`, if present.
    pub fn get(&self, path: &str) -> Option<Value> {
        lookup_path(&self.lock(), path).cloned()
    }

    /// Returns the value at `path` when it is a string.
    pub fn get_str(&self, path: &str) -> Option<String> {
        match self.get(path)? {
            Value::String(text) => Some(text),
            _ => None,
        }
    }

    /// Whether a non-null value exists at `path`.
    pub fn contains(&self, path: &str) -> bool {
        lookup_path(&self.lock(), path).is_some_and(|value| !value.is_null())
    }

    /// Writes `value` at the dotted `path`, creating intermediate objects.
    pub fn set(&self, path: &str, value: impl Into<Value>) {
        let segments: Vec<&str> = path.split('.').collect();
        set_segments(&mut self.lock(), &segments, value.into());
    }

    /// Returns a detached copy of the whole bag.
    pub fn snapshot(&self) -> JsonMap<String, Value> {
        self.lock().clone()
    }

    /// Returns the whole bag as a JSON value.
    pub fn to_value(&self) -> Value {
        Value::Object(self.snapshot())
    }

    /// Creates an independent bag holding a copy of the current contents.
    pub fn deep_clone(&self) -> Self {
        Self::from_map(self.snapshot())
    }

    /// Runs `apply` with exclusive access to the underlying map.
    ///
    /// The closure is synchronous; the lock is released when it returns.
    pub fn update<R>(&self, apply: impl FnOnce(&mut JsonMap<String, Value>) -> R) -> R {
        apply(&mut self.lock())
    }

    /// Current step number, initializing the counter to 1 when absent.
    pub fn ensure_step(&self) -> u64 {
        let mut map = self.lock();
        let current = current_step(&map);
        map.insert(STEP_KEY.to_string(), Value::from(current));
        current
    }

    /// Returns the current step number and advances the counter by one.
    pub fn next_step(&self) -> u64 {
        let mut map = self.lock();
        let current = current_step(&map);
        map.insert(STEP_KEY.to_string(), Value::from(current + 1));
        current
    }
}

fn current_step(map: &JsonMap<String, Value>) -> u64 {
    map.get(STEP_KEY)
        .and_then(Value::as_u64)
        .filter(|step| *step > 0)
        .unwrap_or(1)
}

/// Looks up a dotted path in a JSON object.
///
/// At every level the remaining path is first tried as a literal key so flat
/// keys containing dots (`"aad.clientId"`) resolve, then the first segment is
/// descended into. Numeric segments index into arrays.
pub fn lookup_path<'a>(map: &'a JsonMap<String, Value>, path: &str) -> Option<&'a Value> {
    if let Some(value) = map.get(path) {
        return Some(value);
    }
    let (head, rest) = path.split_once('.')?;
    lookup_in_value(map.get(head)?, rest)
}

fn lookup_in_value<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => lookup_path(map, path),
        Value::Array(items) => {
            let (head, rest) = match path.split_once('.') {
                Some((head, rest)) => (head, Some(rest)),
                None => (path, None),
            };
            let item = items.get(head.parse::<usize>().ok()?)?;
            match rest {
                Some(rest) => lookup_in_value(item, rest),
                None => Some(item),
            }
        }
        _ => None,
    }
}

/// Writes `value` under the given key segments, replacing non-object intermediates.
pub(crate) fn set_segments<S: AsRef<str>>(map: &mut JsonMap<String, Value>, segments: &[S], value: Value) {
    let Some((last, parents)) = segments.split_last() else {
        return;
    };
    let mut current = map;
    for segment in parents {
        let entry = current
            .entry(segment.as_ref().to_string())
            .or_insert_with(|| Value::Object(JsonMap::new()));
        if !entry.is_object() {
            *entry = Value::Object(JsonMap::new());
        }
        let Value::Object(next) = entry else {
            return;
        };
        current = next;
    }
    current.insert(last.as_ref().to_string(), value);
}
