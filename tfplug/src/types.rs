//! Core type system for tfplug
//!
//! `Dynamic` is the in-memory form of every Terraform value the framework
//! sees: configuration, plans, state. `DynamicValue` wraps it with the msgpack
//! wire codec and path based accessors.

use crate::error::{Result, TfplugError};
use std::collections::HashMap;
use std::fmt::Display;

/// Dynamic represents Terraform values that can be of any type.
/// Prefer the typed accessors on `DynamicValue` over matching directly.
#[derive(Debug, Clone, PartialEq)]
pub enum Dynamic {
    /// Explicit null value
    Null,
    Bool(bool),
    /// All numbers are f64, integral values are written back as integers
    Number(f64),
    String(String),
    /// Lists, sets and tuples
    List(Vec<Dynamic>),
    /// Objects and maps
    Map(HashMap<String, Dynamic>),
    /// Value not yet known (during planning)
    Unknown,
}

impl Dynamic {
    pub fn is_null(&self) -> bool {
        matches!(self, Dynamic::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Dynamic::Unknown)
    }

    /// True when the value and everything nested in it is known.
    pub fn is_wholly_known(&self) -> bool {
        match self {
            Dynamic::Unknown => false,
            Dynamic::List(items) => items.iter().all(Dynamic::is_wholly_known),
            Dynamic::Map(map) => map.values().all(Dynamic::is_wholly_known),
            _ => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Dynamic::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Dynamic::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_f64().map(|n| n as i64)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Dynamic::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Dynamic]> {
        match self {
            Dynamic::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, Dynamic>> {
        match self {
            Dynamic::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Dynamic::Null => "null",
            Dynamic::Bool(_) => "bool",
            Dynamic::Number(_) => "number",
            Dynamic::String(_) => "string",
            Dynamic::List(_) => "list",
            Dynamic::Map(_) => "map",
            Dynamic::Unknown => "unknown",
        }
    }

    /// Converts a JSON document (raw state, API payloads) into a value.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Dynamic::Null,
            serde_json::Value::Bool(b) => Dynamic::Bool(b),
            serde_json::Value::Number(n) => Dynamic::Number(n.as_f64().unwrap_or_default()),
            serde_json::Value::String(s) => Dynamic::String(s),
            serde_json::Value::Array(items) => {
                Dynamic::List(items.into_iter().map(Dynamic::from_json).collect())
            }
            serde_json::Value::Object(map) => Dynamic::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Dynamic::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Converts to JSON. Unknown values have no JSON form.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(match self {
            Dynamic::Null => serde_json::Value::Null,
            Dynamic::Bool(b) => serde_json::Value::Bool(*b),
            Dynamic::Number(n) => {
                if is_integral(*n) {
                    serde_json::Value::from(*n as i64)
                } else {
                    serde_json::Number::from_f64(*n)
                        .map(serde_json::Value::Number)
                        .ok_or_else(|| {
                            TfplugError::EncodingError(format!("number {} has no JSON form", n))
                        })?
                }
            }
            Dynamic::String(s) => serde_json::Value::String(s.clone()),
            Dynamic::List(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(Dynamic::to_json)
                    .collect::<Result<Vec<_>>>()?,
            ),
            Dynamic::Map(map) => {
                let mut object = serde_json::Map::with_capacity(map.len());
                for (k, v) in map {
                    object.insert(k.clone(), v.to_json()?);
                }
                serde_json::Value::Object(object)
            }
            Dynamic::Unknown => {
                return Err(TfplugError::EncodingError(
                    "unknown values cannot be encoded as JSON".to_string(),
                ))
            }
        })
    }
}

impl From<&str> for Dynamic {
    fn from(s: &str) -> Self {
        Dynamic::String(s.to_string())
    }
}

impl From<String> for Dynamic {
    fn from(s: String) -> Self {
        Dynamic::String(s)
    }
}

impl From<bool> for Dynamic {
    fn from(b: bool) -> Self {
        Dynamic::Bool(b)
    }
}

impl From<f64> for Dynamic {
    fn from(n: f64) -> Self {
        Dynamic::Number(n)
    }
}

impl From<i64> for Dynamic {
    fn from(n: i64) -> Self {
        Dynamic::Number(n as f64)
    }
}

impl<T: Into<Dynamic>> From<Option<T>> for Dynamic {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Dynamic::Null)
    }
}

fn is_integral(n: f64) -> bool {
    n.is_finite() && n.fract() == 0.0 && n.abs() < 9.2e18
}

// Extension type cty uses for unknown values; refined unknowns use other
// ext codes and are all read back as plain unknowns.
const UNKNOWN_EXT_TYPE: i8 = 0;

fn encode_err(e: impl Display) -> TfplugError {
    TfplugError::EncodingError(format!("msgpack encoding failed: {}", e))
}

fn decode_err(e: impl Display) -> TfplugError {
    TfplugError::DecodingError(format!("msgpack decoding failed: {}", e))
}

fn write_msgpack(buf: &mut Vec<u8>, value: &Dynamic) -> Result<()> {
    match value {
        Dynamic::Null => rmp::encode::write_nil(buf).map_err(encode_err)?,
        Dynamic::Bool(b) => rmp::encode::write_bool(buf, *b).map_err(encode_err)?,
        Dynamic::Number(n) => {
            if is_integral(*n) {
                rmp::encode::write_sint(buf, *n as i64).map_err(encode_err)?;
            } else {
                rmp::encode::write_f64(buf, *n).map_err(encode_err)?;
            }
        }
        Dynamic::String(s) => rmp::encode::write_str(buf, s).map_err(encode_err)?,
        Dynamic::List(items) => {
            rmp::encode::write_array_len(buf, items.len() as u32).map_err(encode_err)?;
            for item in items {
                write_msgpack(buf, item)?;
            }
        }
        Dynamic::Map(map) => {
            rmp::encode::write_map_len(buf, map.len() as u32).map_err(encode_err)?;
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                rmp::encode::write_str(buf, key).map_err(encode_err)?;
                write_msgpack(buf, &map[key])?;
            }
        }
        Dynamic::Unknown => {
            rmp::encode::write_ext_meta(buf, 1, UNKNOWN_EXT_TYPE).map_err(encode_err)?;
            buf.push(0);
        }
    }
    Ok(())
}

fn take<'a>(rd: &mut &'a [u8], len: usize) -> Result<&'a [u8]> {
    if rd.len() < len {
        return Err(decode_err(format!(
            "unexpected end of input, wanted {} bytes, {} left",
            len,
            rd.len()
        )));
    }
    let (head, rest) = rd.split_at(len);
    *rd = rest;
    Ok(head)
}

fn read_msgpack(rd: &mut &[u8]) -> Result<Dynamic> {
    use rmp::Marker;

    let first = *rd
        .first()
        .ok_or_else(|| decode_err("unexpected end of input"))?;

    match Marker::from_u8(first) {
        Marker::Null => {
            rmp::decode::read_nil(rd).map_err(decode_err)?;
            Ok(Dynamic::Null)
        }
        Marker::True | Marker::False => {
            Ok(Dynamic::Bool(rmp::decode::read_bool(rd).map_err(decode_err)?))
        }
        Marker::U64 => {
            let n: u64 = rmp::decode::read_int(rd).map_err(decode_err)?;
            Ok(Dynamic::Number(n as f64))
        }
        Marker::FixPos(_)
        | Marker::FixNeg(_)
        | Marker::U8
        | Marker::U16
        | Marker::U32
        | Marker::I8
        | Marker::I16
        | Marker::I32
        | Marker::I64 => {
            let n: i64 = rmp::decode::read_int(rd).map_err(decode_err)?;
            Ok(Dynamic::Number(n as f64))
        }
        Marker::F32 => Ok(Dynamic::Number(
            rmp::decode::read_f32(rd).map_err(decode_err)? as f64,
        )),
        Marker::F64 => Ok(Dynamic::Number(rmp::decode::read_f64(rd).map_err(decode_err)?)),
        Marker::FixStr(_) | Marker::Str8 | Marker::Str16 | Marker::Str32 => {
            let len = rmp::decode::read_str_len(rd).map_err(decode_err)? as usize;
            let bytes = take(rd, len)?;
            let s = std::str::from_utf8(bytes).map_err(decode_err)?;
            Ok(Dynamic::String(s.to_string()))
        }
        Marker::Bin8 | Marker::Bin16 | Marker::Bin32 => {
            let len = rmp::decode::read_bin_len(rd).map_err(decode_err)? as usize;
            let bytes = take(rd, len)?;
            Ok(Dynamic::String(String::from_utf8_lossy(bytes).into_owned()))
        }
        Marker::FixArray(_) | Marker::Array16 | Marker::Array32 => {
            let len = rmp::decode::read_array_len(rd).map_err(decode_err)? as usize;
            let mut items = Vec::with_capacity(len.min(1024));
            for _ in 0..len {
                items.push(read_msgpack(rd)?);
            }
            Ok(Dynamic::List(items))
        }
        Marker::FixMap(_) | Marker::Map16 | Marker::Map32 => {
            let len = rmp::decode::read_map_len(rd).map_err(decode_err)? as usize;
            let mut map = HashMap::with_capacity(len.min(1024));
            for _ in 0..len {
                let key = match read_msgpack(rd)? {
                    Dynamic::String(k) => k,
                    other => {
                        return Err(decode_err(format!(
                            "map keys must be strings, got {}",
                            other.type_name()
                        )))
                    }
                };
                let value = read_msgpack(rd)?;
                map.insert(key, value);
            }
            Ok(Dynamic::Map(map))
        }
        Marker::FixExt1
        | Marker::FixExt2
        | Marker::FixExt4
        | Marker::FixExt8
        | Marker::FixExt16
        | Marker::Ext8
        | Marker::Ext16
        | Marker::Ext32 => {
            let meta = rmp::decode::read_ext_meta(rd).map_err(decode_err)?;
            take(rd, meta.size as usize)?;
            Ok(Dynamic::Unknown)
        }
        Marker::Reserved => Err(decode_err(format!("reserved marker 0x{:02x}", first))),
    }
}

/// DynamicValue wraps Dynamic and provides encoding/decoding capabilities.
/// This is what gets passed between Terraform and the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicValue {
    pub value: Dynamic,
}

impl DynamicValue {
    pub fn new(value: Dynamic) -> Self {
        Self { value }
    }

    pub fn null() -> Self {
        Self {
            value: Dynamic::Null,
        }
    }

    pub fn unknown() -> Self {
        Self {
            value: Dynamic::Unknown,
        }
    }

    /// An empty object, the usual starting point for building state.
    pub fn object() -> Self {
        Self {
            value: Dynamic::Map(HashMap::new()),
        }
    }

    pub fn encode_msgpack(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        write_msgpack(&mut buf, &self.value)?;
        Ok(buf)
    }

    /// Decodes a msgpack payload. An empty payload is treated as null.
    pub fn decode_msgpack(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Ok(Self::null());
        }
        let mut rd = data;
        let value = read_msgpack(&mut rd)?;
        if !rd.is_empty() {
            return Err(decode_err(format!("{} trailing bytes", rd.len())));
        }
        Ok(Self { value })
    }

    pub fn encode_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.value.to_json()?)
            .map_err(|e| TfplugError::EncodingError(format!("json encoding failed: {}", e)))
    }

    pub fn decode_json(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Ok(Self::null());
        }
        let value: serde_json::Value = serde_json::from_slice(data)
            .map_err(|e| TfplugError::DecodingError(format!("json decoding failed: {}", e)))?;
        Ok(Self {
            value: Dynamic::from_json(value),
        })
    }

    /// Type-safe accessors. Null, unknown and missing values are errors,
    /// so `.ok()` yields `None` for anything not set.
    pub fn get_string(&self, path: &AttributePath) -> Result<String> {
        let value = self.navigate_path(path)?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| mismatch(path, "string", value))
    }

    pub fn get_number(&self, path: &AttributePath) -> Result<f64> {
        let value = self.navigate_path(path)?;
        value.as_f64().ok_or_else(|| mismatch(path, "number", value))
    }

    pub fn get_i64(&self, path: &AttributePath) -> Result<i64> {
        self.get_number(path).map(|n| n as i64)
    }

    pub fn get_bool(&self, path: &AttributePath) -> Result<bool> {
        let value = self.navigate_path(path)?;
        value.as_bool().ok_or_else(|| mismatch(path, "bool", value))
    }

    pub fn get_list(&self, path: &AttributePath) -> Result<Vec<Dynamic>> {
        let value = self.navigate_path(path)?;
        value
            .as_list()
            .map(<[Dynamic]>::to_vec)
            .ok_or_else(|| mismatch(path, "list", value))
    }

    /// Reads a list of strings, skipping null elements.
    pub fn get_string_list(&self, path: &AttributePath) -> Result<Vec<String>> {
        self.get_list(path)?
            .iter()
            .filter(|item| !item.is_null())
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| mismatch(path, "string", item))
            })
            .collect()
    }

    pub fn get_map(&self, path: &AttributePath) -> Result<HashMap<String, Dynamic>> {
        let value = self.navigate_path(path)?;
        value
            .as_map()
            .cloned()
            .ok_or_else(|| mismatch(path, "map", value))
    }

    /// Reads a map of strings, skipping null values.
    pub fn get_string_map(&self, path: &AttributePath) -> Result<HashMap<String, String>> {
        self.get_map(path)?
            .into_iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| match v {
                Dynamic::String(s) => Ok((k, s)),
                other => Err(mismatch(path, "string", &other)),
            })
            .collect()
    }

    /// Raw lookup. Missing attributes read as `None`.
    pub fn get(&self, path: &AttributePath) -> Option<&Dynamic> {
        self.navigate_path(path).ok()
    }

    /// True when the attribute is absent or null.
    pub fn is_null_at(&self, path: &AttributePath) -> bool {
        self.get(path).map_or(true, Dynamic::is_null)
    }

    pub fn is_unknown_at(&self, path: &AttributePath) -> bool {
        self.get(path).is_some_and(Dynamic::is_unknown)
    }

    pub fn set_string(&mut self, path: &AttributePath, value: impl Into<String>) -> Result<()> {
        self.set_value(path, Dynamic::String(value.into()))
    }

    pub fn set_number(&mut self, path: &AttributePath, value: f64) -> Result<()> {
        self.set_value(path, Dynamic::Number(value))
    }

    pub fn set_i64(&mut self, path: &AttributePath, value: i64) -> Result<()> {
        self.set_value(path, Dynamic::Number(value as f64))
    }

    pub fn set_bool(&mut self, path: &AttributePath, value: bool) -> Result<()> {
        self.set_value(path, Dynamic::Bool(value))
    }

    pub fn set_list(&mut self, path: &AttributePath, value: Vec<Dynamic>) -> Result<()> {
        self.set_value(path, Dynamic::List(value))
    }

    pub fn set_map(&mut self, path: &AttributePath, value: HashMap<String, Dynamic>) -> Result<()> {
        self.set_value(path, Dynamic::Map(value))
    }

    pub fn set_null(&mut self, path: &AttributePath) -> Result<()> {
        self.set_value(path, Dynamic::Null)
    }

    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    pub fn is_unknown(&self) -> bool {
        self.value.is_unknown()
    }

    /// Mark computed values as unknown during planning
    pub fn mark_unknown(&mut self, path: &AttributePath) -> Result<()> {
        self.set_value(path, Dynamic::Unknown)
    }

    fn navigate_path<'a>(&'a self, path: &AttributePath) -> Result<&'a Dynamic> {
        let mut current = &self.value;

        for step in &path.steps {
            current = match (current, step) {
                (Dynamic::Map(m), AttributePathStep::AttributeName(name))
                | (Dynamic::Map(m), AttributePathStep::ElementKeyString(name)) => m
                    .get(name)
                    .ok_or_else(|| TfplugError::PathNotFound(path.to_string()))?,
                (Dynamic::List(l), AttributePathStep::ElementKeyInt(idx)) => l
                    .get(*idx as usize)
                    .ok_or_else(|| TfplugError::PathNotFound(path.to_string()))?,
                _ => return Err(TfplugError::PathNotFound(path.to_string())),
            };
        }

        Ok(current)
    }

    /// Sets a value, creating intermediate objects along the way.
    pub fn set_value(&mut self, path: &AttributePath, new_value: Dynamic) -> Result<()> {
        let Some((last, parents)) = path.steps.split_last() else {
            self.value = new_value;
            return Ok(());
        };

        let mut current = &mut self.value;
        for (idx, step) in parents.iter().enumerate() {
            if matches!(current, Dynamic::Null) {
                *current = Dynamic::Map(HashMap::new());
            }
            current = match (current, step) {
                (Dynamic::Map(m), AttributePathStep::AttributeName(name))
                | (Dynamic::Map(m), AttributePathStep::ElementKeyString(name)) => {
                    let entry = m.entry(name.clone()).or_insert(Dynamic::Null);
                    if entry.is_null() {
                        *entry = match path.steps.get(idx + 1) {
                            Some(AttributePathStep::ElementKeyInt(_)) => Dynamic::List(Vec::new()),
                            _ => Dynamic::Map(HashMap::new()),
                        };
                    }
                    entry
                }
                (Dynamic::List(l), AttributePathStep::ElementKeyInt(i)) => l
                    .get_mut(*i as usize)
                    .ok_or_else(|| TfplugError::PathNotFound(path.to_string()))?,
                _ => return Err(TfplugError::PathNotFound(path.to_string())),
            };
        }

        if matches!(current, Dynamic::Null) {
            *current = Dynamic::Map(HashMap::new());
        }
        match (current, last) {
            (Dynamic::Map(m), AttributePathStep::AttributeName(name))
            | (Dynamic::Map(m), AttributePathStep::ElementKeyString(name)) => {
                m.insert(name.clone(), new_value);
                Ok(())
            }
            (Dynamic::List(l), AttributePathStep::ElementKeyInt(i)) => {
                let slot = l
                    .get_mut(*i as usize)
                    .ok_or_else(|| TfplugError::PathNotFound(path.to_string()))?;
                *slot = new_value;
                Ok(())
            }
            _ => Err(TfplugError::PathNotFound(path.to_string())),
        }
    }
}

fn mismatch(path: &AttributePath, expected: &str, actual: &Dynamic) -> TfplugError {
    TfplugError::TypeMismatch {
        path: path.to_string(),
        expected: expected.to_string(),
        actual: actual.type_name().to_string(),
    }
}

/// AttributePath represents a path to an attribute within a DynamicValue
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributePath {
    pub steps: Vec<AttributePathStep>,
}

impl AttributePath {
    pub fn new(name: &str) -> Self {
        Self {
            steps: vec![AttributePathStep::AttributeName(name.to_string())],
        }
    }

    pub fn root() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn attribute(mut self, name: &str) -> Self {
        self.steps
            .push(AttributePathStep::AttributeName(name.to_string()));
        self
    }

    pub fn index(mut self, idx: i64) -> Self {
        self.steps.push(AttributePathStep::ElementKeyInt(idx));
        self
    }

    pub fn key(mut self, key: &str) -> Self {
        self.steps
            .push(AttributePathStep::ElementKeyString(key.to_string()));
        self
    }
}

impl std::fmt::Display for AttributePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                AttributePathStep::AttributeName(name) if i == 0 => write!(f, "{}", name)?,
                AttributePathStep::AttributeName(name) => write!(f, ".{}", name)?,
                AttributePathStep::ElementKeyString(key) => write!(f, "[{:?}]", key)?,
                AttributePathStep::ElementKeyInt(idx) => write!(f, "[{}]", idx)?,
            }
        }
        Ok(())
    }
}

/// Individual step in an AttributePath
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttributePathStep {
    /// Access attribute by name in object
    AttributeName(String),
    /// Access element by string key (for maps)
    ElementKeyString(String),
    /// Access element by integer index (for lists)
    ElementKeyInt(i64),
}

/// Private state management - Provider-specific data not visible to users.
/// Stored as a msgpack map of byte strings.
#[derive(Debug, Clone, Default)]
pub struct PrivateStateData {
    data: HashMap<String, Vec<u8>>,
}

impl PrivateStateData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_key(&self, key: &str) -> Option<&[u8]> {
        self.data.get(key).map(|v| v.as_slice())
    }

    pub fn set_key(&mut self, key: &str, value: Vec<u8>) {
        self.data.insert(key.to_string(), value);
    }

    pub fn remove_key(&mut self, key: &str) {
        self.data.remove(key);
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.data.is_empty() {
            return Ok(Vec::new());
        }
        rmp_serde::encode::to_vec(&self.data).map_err(|e| {
            TfplugError::EncodingError(format!("private state encoding failed: {}", e))
        })
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Ok(Self::new());
        }
        let data = rmp_serde::decode::from_slice(data).map_err(|e| {
            TfplugError::DecodingError(format!("private state decoding failed: {}", e))
        })?;
        Ok(Self { data })
    }
}

/// Diagnostic represents a warning or error from the provider
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub summary: String,
    pub detail: String,
    pub attribute: Option<AttributePath>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn warning(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn with_attribute(mut self, path: AttributePath) -> Self {
        self.attribute = Some(path);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

/// Returns true if any diagnostic is an error.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

/// Severity level for diagnostics
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DiagnosticSeverity {
    Invalid,
    Error,
    Warning,
}

/// ServerCapabilities indicates provider capabilities
#[derive(Debug, Clone, Default)]
pub struct ServerCapabilities {
    pub plan_destroy: bool,
    pub get_provider_schema_optional: bool,
    pub move_resource_state: bool,
}

/// ClientCapabilities indicates Terraform client capabilities
#[derive(Debug, Clone, Default)]
pub struct ClientCapabilities {
    pub deferral_allowed: bool,
    pub write_only_attributes_allowed: bool,
}

/// Deferred indicates a deferred change
#[derive(Debug, Clone)]
pub struct Deferred {
    pub reason: DeferredReason,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeferredReason {
    Unknown,
    ResourceConfigUnknown,
    ProviderConfigUnknown,
    AbsentPrereq,
}

/// Config represents configuration values
pub type Config = DynamicValue;

/// State represents resource state values
pub type State = DynamicValue;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_value_string_access() {
        let mut dv = DynamicValue::object();
        dv.set_string(&AttributePath::new("name"), "test").unwrap();

        assert_eq!(dv.get_string(&AttributePath::new("name")).unwrap(), "test");
        assert!(dv.get_string(&AttributePath::new("missing")).is_err());
    }

    #[test]
    fn dynamic_value_nested_access() {
        let mut dv = DynamicValue::object();
        let path = AttributePath::new("expires_after").attribute("days");
        dv.set_i64(&path, 7).unwrap();

        assert_eq!(dv.get_i64(&path).unwrap(), 7);
        assert!(dv.get_map(&AttributePath::new("expires_after")).is_ok());
    }

    #[test]
    fn set_value_replaces_null_parent() {
        let mut dv = DynamicValue::object();
        dv.set_null(&AttributePath::new("file_counts")).unwrap();
        dv.set_i64(&AttributePath::new("file_counts").attribute("total"), 3)
            .unwrap();
        assert_eq!(
            dv.get_i64(&AttributePath::new("file_counts").attribute("total"))
                .unwrap(),
            3
        );
    }

    #[test]
    fn null_reads_as_type_mismatch() {
        let mut dv = DynamicValue::object();
        dv.set_null(&AttributePath::new("name")).unwrap();
        let err = dv.get_string(&AttributePath::new("name")).unwrap_err();
        assert!(matches!(err, TfplugError::TypeMismatch { .. }));
        assert!(dv.is_null_at(&AttributePath::new("name")));
        assert!(dv.is_null_at(&AttributePath::new("absent")));
    }

    #[test]
    fn msgpack_preserves_unknown_and_nested_values() {
        let mut dv = DynamicValue::object();
        dv.set_string(&AttributePath::new("name"), "store").unwrap();
        dv.set_value(&AttributePath::new("id"), Dynamic::Unknown)
            .unwrap();
        dv.set_list(
            &AttributePath::new("file_ids"),
            vec!["file-1".into(), "file-2".into()],
        )
        .unwrap();
        dv.set_number(&AttributePath::new("temperature"), 0.5)
            .unwrap();
        dv.set_i64(&AttributePath::new("created_at"), 1_700_000_000)
            .unwrap();

        let bytes = dv.encode_msgpack().unwrap();
        let decoded = DynamicValue::decode_msgpack(&bytes).unwrap();
        assert_eq!(decoded, dv);
        assert!(decoded.is_unknown_at(&AttributePath::new("id")));
    }

    #[test]
    fn unknown_is_encoded_as_extension_zero() {
        let bytes = DynamicValue::unknown().encode_msgpack().unwrap();
        assert_eq!(bytes, vec![0xd4, 0x00, 0x00]);
    }

    #[test]
    fn refined_unknown_extension_decodes_as_unknown() {
        // fixext2 with type 12 carrying a refinement payload
        let decoded = DynamicValue::decode_msgpack(&[0xd5, 0x0c, 0x81, 0x01]).unwrap();
        assert!(decoded.is_unknown());
    }

    #[test]
    fn integral_numbers_are_written_as_integers() {
        let bytes = DynamicValue::new(Dynamic::Number(5.0))
            .encode_msgpack()
            .unwrap();
        assert_eq!(bytes, vec![0x05]);
    }

    #[test]
    fn null_encodes_as_nil_and_empty_decodes_as_null() {
        assert_eq!(DynamicValue::null().encode_msgpack().unwrap(), vec![0xc0]);
        assert!(DynamicValue::decode_msgpack(&[]).unwrap().is_null());
    }

    #[test]
    fn truncated_msgpack_is_an_error() {
        // fixstr of length 5 with only two bytes present
        assert!(DynamicValue::decode_msgpack(&[0xa5, b'a', b'b']).is_err());
    }

    #[test]
    fn json_decoding_builds_objects() {
        let dv = DynamicValue::decode_json(br#"{"id":"asst_1","tools":[],"top_p":1}"#).unwrap();
        assert_eq!(dv.get_string(&AttributePath::new("id")).unwrap(), "asst_1");
        assert_eq!(dv.get_number(&AttributePath::new("top_p")).unwrap(), 1.0);
        assert!(dv.get_list(&AttributePath::new("tools")).unwrap().is_empty());
    }

    #[test]
    fn json_encoding_rejects_unknown() {
        assert!(DynamicValue::unknown().encode_json().is_err());
    }

    #[test]
    fn attribute_path_display() {
        let path = AttributePath::new("tools").index(0).attribute("function");
        assert_eq!(path.to_string(), "tools[0].function");
    }

    #[test]
    fn private_state_encoding() {
        let mut ps = PrivateStateData::new();
        ps.set_key("etag", b"12345".to_vec());

        let encoded = ps.encode().unwrap();
        let decoded = PrivateStateData::decode(&encoded).unwrap();

        assert_eq!(decoded.get_key("etag"), Some(&b"12345"[..]));
        assert!(PrivateStateData::decode(&[]).unwrap().get_key("etag").is_none());
    }
}
