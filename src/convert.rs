//! Typed values and the conversion registry.

use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A resolved parameter value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
}

impl Value {
    /// Convert a JSON value, e.g. a declared default. `null` has no counterpart.
    pub fn from_json(json: &serde_json::Value) -> Option<Value> {
        match json {
            serde_json::Value::Null => None,
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Value::Int(i)),
                None => n.as_f64().map(Value::Float),
            },
            serde_json::Value::String(s) => Some(Value::Str(s.clone())),
            serde_json::Value::Array(items) => {
                Some(Value::List(items.iter().filter_map(Value::from_json).collect()))
            }
            serde_json::Value::Object(map) => Some(Value::Map(
                map.iter()
                    .filter_map(|(k, v)| Value::from_json(v).map(|v| (k.clone(), v)))
                    .collect(),
            )),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

/// Formats with the default delimiters, so scalar output parses back to an
/// equal value.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            Value::Map(map) => {
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}:{}", k, v)?;
                }
                Ok(())
            }
        }
    }
}

/// A conversion target: a registered scalar key, or a list/map nesting of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conversion {
    Scalar(String),
    List(Box<Conversion>),
    Map(Box<Conversion>, Box<Conversion>),
}

impl Conversion {
    /// Decompose a conversion key such as `int`, `int_list`, `list_of_float`
    /// or `map_of_sym_to_int`.
    ///
    /// This never fails; keys naming unregistered scalars are reported when
    /// the conversion is applied.
    pub fn parse(key: &str) -> Conversion {
        let key = key.trim();
        match key {
            "list" | "array" => return Conversion::list_of(Conversion::string()),
            "map" | "hash" => return Conversion::map_of(Conversion::string(), Conversion::string()),
            _ => {}
        }
        if let Some(rest) = key.strip_prefix("list_of_") {
            return Conversion::list_of(Conversion::parse(rest));
        }
        if let Some(rest) = key.strip_prefix("map_of_") {
            if let Some((k, v)) = rest.split_once("_to_") {
                return Conversion::map_of(Conversion::parse(k), Conversion::parse(v));
            }
            return Conversion::map_of(Conversion::string(), Conversion::parse(rest));
        }
        if let Some(inner) = key.strip_suffix("_list") {
            return Conversion::list_of(Conversion::parse(inner));
        }
        if let Some(inner) = key.strip_suffix("_map") {
            return Conversion::map_of(Conversion::string(), Conversion::parse(inner));
        }
        Conversion::Scalar(key.to_string())
    }

    pub fn string() -> Conversion {
        Conversion::Scalar("string".to_string())
    }

    pub fn list_of(inner: Conversion) -> Conversion {
        Conversion::List(Box::new(inner))
    }

    pub fn map_of(key: Conversion, value: Conversion) -> Conversion {
        Conversion::Map(Box::new(key), Box::new(value))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Conversion::List(_))
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Conversion::Map(_, _))
    }
}

impl fmt::Display for Conversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conversion::Scalar(name) => f.write_str(name),
            Conversion::List(inner) => write!(f, "list_of_{}", inner),
            Conversion::Map(k, v) => write!(f, "map_of_{}_to_{}", k, v),
        }
    }
}

/// Errors produced while applying a conversion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("unsupported conversion '{0}'")]
    Unsupported(String),

    #[error("cannot convert value '{value}' into '{target}'")]
    InvalidArgument { value: String, target: String },
}

/// A scalar coercion. `None` means the input is not a valid value.
pub type Converter = Arc<dyn Fn(&str) -> Option<Value> + Send + Sync>;

/// Delimiters used by compound conversions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    /// Separates list elements.
    pub list: String,
    /// Separates map entries.
    pub map: String,
    /// Separates a map entry's key from its value.
    pub pair: String,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            list: ",".to_string(),
            map: ",".to_string(),
            pair: ":".to_string(),
        }
    }
}

/// Maps conversion keys to coercion functions.
///
/// Populate the registry before sharing it; it has no interior locking, so
/// registering conversions requires `&mut self` and parses only ever borrow
/// it immutably.
#[derive(Clone)]
pub struct ConversionRegistry {
    converters: HashMap<String, Converter>,
    delimiters: Delimiters,
}

impl fmt::Debug for ConversionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.converters.keys().collect();
        keys.sort();
        f.debug_struct("ConversionRegistry")
            .field("converters", &keys)
            .field("delimiters", &self.delimiters)
            .finish()
    }
}

impl Default for ConversionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversionRegistry {
    /// A registry with the built-in scalar conversions.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_builtins();
        registry
    }

    /// A registry with no conversions at all.
    pub fn empty() -> Self {
        Self {
            converters: HashMap::new(),
            delimiters: Delimiters::default(),
        }
    }

    pub fn with_delimiters(mut self, delimiters: Delimiters) -> Self {
        self.delimiters = delimiters;
        self
    }

    pub fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }

    fn register_builtins(&mut self) {
        let string: fn(&str) -> Option<Value> = |s| Some(Value::Str(s.to_string()));
        for name in ["string", "str", "sym", "symbol", "path", "pathname"] {
            self.register(name, string);
        }

        let int: fn(&str) -> Option<Value> = |s| s.trim().parse::<i64>().ok().map(Value::Int);
        self.register("int", int);
        self.register("integer", int);

        self.register("float", |s: &str| {
            s.trim().parse::<f64>().ok().map(Value::Float)
        });

        let boolean: fn(&str) -> Option<Value> = |s| parse_bool(s).map(Value::Bool);
        self.register("bool", boolean);
        self.register("boolean", boolean);

        let regexp: fn(&str) -> Option<Value> =
            |s| Regex::new(s).ok().map(|_| Value::Str(s.to_string()));
        self.register("regexp", regexp);
        self.register("regex", regexp);
    }

    /// Register (or replace) a scalar conversion under `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, converter: F)
    where
        F: Fn(&str) -> Option<Value> + Send + Sync + 'static,
    {
        self.converters.insert(name.into(), Arc::new(converter));
    }

    /// Whether every scalar referenced by `conversion` is registered.
    pub fn supports(&self, conversion: &Conversion) -> bool {
        match conversion {
            Conversion::Scalar(name) => self.converters.contains_key(name),
            Conversion::List(inner) => self.supports(inner),
            Conversion::Map(k, v) => self.supports(k) && self.supports(v),
        }
    }

    /// Convert a raw string.
    pub fn convert(&self, conversion: &Conversion, raw: &str) -> Result<Value, ConversionError> {
        if !self.supports(conversion) {
            return Err(ConversionError::Unsupported(conversion.to_string()));
        }
        match conversion {
            Conversion::Scalar(name) => self.convert_scalar(name, raw),
            Conversion::List(inner) => raw
                .split(self.delimiters.list.as_str())
                .map(str::trim)
                .filter(|piece| !piece.is_empty())
                .map(|piece| self.convert(inner, piece))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            Conversion::Map(key_conv, value_conv) => {
                let mut map = IndexMap::new();
                for pair in raw
                    .split(self.delimiters.map.as_str())
                    .map(str::trim)
                    .filter(|pair| !pair.is_empty())
                {
                    let (k, v) = pair.split_once(self.delimiters.pair.as_str()).ok_or_else(|| {
                        ConversionError::InvalidArgument {
                            value: raw.to_string(),
                            target: conversion.to_string(),
                        }
                    })?;
                    let key = self.convert(key_conv, k.trim())?;
                    let value = self.convert(value_conv, v.trim())?;
                    map.insert(key.to_string(), value);
                }
                Ok(Value::Map(map))
            }
        }
    }

    /// Convert an already-typed value.
    ///
    /// Strings are converted as raw input; lists and maps are converted
    /// element-wise; other values go through their display form. Applying a
    /// conversion to its own output yields an equal value.
    pub fn convert_value(
        &self,
        conversion: &Conversion,
        value: &Value,
    ) -> Result<Value, ConversionError> {
        match (conversion, value) {
            (_, Value::Str(raw)) => self.convert(conversion, raw),
            (Conversion::List(inner), Value::List(items)) => items
                .iter()
                .map(|item| self.convert_value(inner, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            (Conversion::Map(key_conv, value_conv), Value::Map(map)) => {
                let mut converted = IndexMap::new();
                for (k, v) in map {
                    let key = self.convert(key_conv, k)?;
                    converted.insert(key.to_string(), self.convert_value(value_conv, v)?);
                }
                Ok(Value::Map(converted))
            }
            (_, other) => self.convert(conversion, &other.to_string()),
        }
    }

    fn convert_scalar(&self, name: &str, raw: &str) -> Result<Value, ConversionError> {
        let converter = self
            .converters
            .get(name)
            .ok_or_else(|| ConversionError::Unsupported(name.to_string()))?;
        converter(raw).ok_or_else(|| ConversionError::InvalidArgument {
            value: raw.to_string(),
            target: name.to_string(),
        })
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "on" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "off" | "0" => Some(false),
        _ => None,
    }
}
