//! Lenient scalar types for client-supplied snapshot rows.
//!
//! Snapshot payloads come from a browser store where ids may be numbers, numeric strings
//! or local placeholders, and flags may be strings. These wrappers accept any JSON value
//! and never fail deserialization; an unusable value reads as absent.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

/// Integer view of a JSON value: numbers (floats truncate), trimmed numeric strings and
/// booleans. Everything else is `None`.
pub fn loose_int(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        JsonValue::String(s) => s.trim().parse::<i64>().ok(),
        JsonValue::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

/// Boolean view of a JSON value. `None` only for null.
pub fn loose_bool(value: &JsonValue) -> Option<bool> {
    match value {
        JsonValue::Null => None,
        JsonValue::Bool(b) => Some(*b),
        JsonValue::String(s) => Some(matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )),
        JsonValue::Number(n) => Some(n.as_f64().map(|f| f != 0.0).unwrap_or(false)),
        JsonValue::Array(a) => Some(!a.is_empty()),
        JsonValue::Object(o) => Some(!o.is_empty()),
    }
}

/// Text view used for option labels and other free-form strings.
pub fn loose_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

pub fn clamp_i32(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LooseInt(pub Option<i64>);

impl LooseInt {
    pub fn or(self, default: i64) -> i64 {
        self.0.unwrap_or(default)
    }
}

impl<'de> Deserialize<'de> for LooseInt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = JsonValue::deserialize(deserializer)?;
        Ok(LooseInt(loose_int(&value)))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LooseBool(pub Option<bool>);

impl LooseBool {
    pub fn or(self, default: bool) -> bool {
        self.0.unwrap_or(default)
    }
}

impl<'de> Deserialize<'de> for LooseBool {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = JsonValue::deserialize(deserializer)?;
        Ok(LooseBool(loose_bool(&value)))
    }
}

/// Free-form string that tolerates numbers and null.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LooseString(pub Option<String>);

impl LooseString {
    pub fn or_empty(&self) -> String {
        self.0.clone().unwrap_or_default()
    }
}

impl<'de> Deserialize<'de> for LooseString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = JsonValue::deserialize(deserializer)?;
        Ok(match value {
            JsonValue::Null => LooseString(None),
            other => LooseString(Some(loose_text(&other))),
        })
    }
}

/// A row identifier as the client sent it.
///
/// `token` is the textual form used as a lookup key by rows that reference this one;
/// `id` is the integer the value parses to, if any. Whether that integer names a stored
/// row is decided later against the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientRef {
    pub token: Option<String>,
    pub id: Option<i64>,
}

impl ClientRef {
    pub fn from_value(value: &JsonValue) -> Self {
        let token = match value {
            JsonValue::Null => None,
            JsonValue::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        };
        Self {
            token,
            id: loose_int(value),
        }
    }

    pub fn server(id: i64) -> Self {
        Self {
            token: Some(id.to_string()),
            id: Some(id),
        }
    }
}

impl<'de> Deserialize<'de> for ClientRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = JsonValue::deserialize(deserializer)?;
        Ok(ClientRef::from_value(&value))
    }
}

impl Serialize for ClientRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match (&self.id, &self.token) {
            (Some(id), Some(token)) if token == &id.to_string() => serializer.serialize_i64(*id),
            (_, Some(token)) => serializer.serialize_str(token),
            _ => serializer.serialize_none(),
        }
    }
}

/// Deserializes a list that may be missing, null, or not a list at all into a `Vec`.
/// Items that do not fit `T` are dropped.
pub fn loose_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = JsonValue::deserialize(deserializer)?;
    match value {
        JsonValue::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect()),
        _ => Ok(Vec::new()),
    }
}

/// Deserializes a nested object, falling back to `T::default()` when it does not fit.
pub fn loose_object<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned + Default,
{
    let value = JsonValue::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Distinguishes an explicit `null` from a missing field: missing stays `None` (with
/// `#[serde(default)]`), `null` becomes `Some(None)`.
pub fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
