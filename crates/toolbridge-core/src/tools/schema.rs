//! Typed tool arguments
//!
//! Model-supplied arguments are untyped JSON. They are checked against the
//! function's declared parameters before a handler ever sees them, and come
//! out as [`ToolArguments`]: one [`ParamValue`] per declared parameter.

use serde_json::{Map, Number, Value};

use crate::error::{OperationError, OperationResult};
use crate::types::{FunctionSpec, ParamType, ParameterSpec};

/// A validated argument value, tagged with its declared type
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    String(String),
    Number(f64),
    Integer(i64),
    Boolean(bool),
    Array(Vec<Value>),
    Object(Map<String, Value>),
}

impl ParamValue {
    /// Convert `value` if it has type `ty`
    pub fn from_json(ty: ParamType, value: &Value) -> Option<Self> {
        if !ty.matches(value) {
            return None;
        }
        match ty {
            ParamType::String => value.as_str().map(|s| ParamValue::String(s.to_string())),
            ParamType::Number => value.as_f64().map(ParamValue::Number),
            ParamType::Integer => value
                .as_i64()
                .or_else(|| value.as_f64().filter(|f| fits_i64(*f)).map(|f| f as i64))
                .map(ParamValue::Integer),
            ParamType::Boolean => value.as_bool().map(ParamValue::Boolean),
            ParamType::Array => value.as_array().cloned().map(ParamValue::Array),
            ParamType::Object => value.as_object().cloned().map(ParamValue::Object),
        }
    }

    pub fn param_type(&self) -> ParamType {
        match self {
            ParamValue::String(_) => ParamType::String,
            ParamValue::Number(_) => ParamType::Number,
            ParamValue::Integer(_) => ParamType::Integer,
            ParamValue::Boolean(_) => ParamType::Boolean,
            ParamValue::Array(_) => ParamType::Array,
            ParamValue::Object(_) => ParamType::Object,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ParamValue::String(s) => Value::String(s.clone()),
            ParamValue::Number(n) => Number::from_f64(*n).map(Value::Number).unwrap_or(Value::Null),
            ParamValue::Integer(i) => Value::from(*i),
            ParamValue::Boolean(b) => Value::Bool(*b),
            ParamValue::Array(items) => Value::Array(items.clone()),
            ParamValue::Object(map) => Value::Object(map.clone()),
        }
    }
}

/// Validated arguments in parameter declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArguments {
    values: Vec<(String, ParamValue)>,
}

impl ToolArguments {
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            ParamValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            ParamValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numbers and integers both read as `f64`
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            ParamValue::Number(n) => Some(*n),
            ParamValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            ParamValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn get_array(&self, name: &str) -> Option<&[Value]> {
        match self.get(name)? {
            ParamValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn get_object(&self, name: &str) -> Option<&Map<String, Value>> {
        match self.get(name)? {
            ParamValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.values.iter().map(|(n, v)| (n.clone(), v.to_json())).collect())
    }
}

impl FunctionSpec {
    /// Check raw arguments against the declared parameters.
    ///
    /// Missing optional parameters take their default when one is declared.
    /// `null` counts as missing. Undeclared arguments are rejected.
    pub fn validate(&self, arguments: &Value) -> OperationResult<ToolArguments> {
        let empty = Map::new();
        let raw = match arguments {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => {
                return Err(OperationError::validation(format!(
                    "arguments for {} must be a JSON object, got {}",
                    self.name,
                    json_type_name(other)
                )))
            }
        };

        if let Some(unknown) = raw.keys().find(|k| self.parameter(k).is_none()) {
            return Err(OperationError::validation(format!(
                "{} has no parameter named {:?}",
                self.name, unknown
            ))
            .with_suggestion(format!("Use only these parameters: {}", self.parameter_names())));
        }

        let mut values = Vec::with_capacity(self.parameters.len());
        for param in &self.parameters {
            let supplied = raw.get(&param.name).filter(|v| !v.is_null());
            let value = match (supplied, &param.default_value) {
                (Some(v), _) => v,
                (None, Some(default)) => default,
                (None, None) if param.required => {
                    return Err(OperationError::validation(format!(
                        "{} is missing required parameter {:?}",
                        self.name, param.name
                    )));
                }
                (None, None) => continue,
            };
            let typed = ParamValue::from_json(param.param_type, value).ok_or_else(|| {
                if param.param_type.matches(value) {
                    OperationError::validation(format!(
                        "parameter {:?} of {} is out of range for {}: {}",
                        param.name,
                        self.name,
                        param.type_label(),
                        value
                    ))
                } else {
                    OperationError::validation(format!(
                        "parameter {:?} of {} must be {}, got {}",
                        param.name,
                        self.name,
                        param.type_label(),
                        json_type_name(value)
                    ))
                }
            })?;
            values.push((param.name.clone(), typed));
        }
        Ok(ToolArguments { values })
    }

    fn parameter_names(&self) -> String {
        self.parameters
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Representative value for a parameter, by declared type
pub fn example_value(param: &ParameterSpec) -> Value {
    match param.param_type {
        ParamType::Array => Value::Array(vec![placeholder(param.items.unwrap_or(ParamType::String))]),
        ty => placeholder(ty),
    }
}

fn placeholder(ty: ParamType) -> Value {
    match ty {
        ParamType::String => Value::String("example".to_string()),
        ParamType::Number => serde_json::json!(1.5),
        ParamType::Integer => Value::from(42),
        ParamType::Boolean => Value::Bool(true),
        ParamType::Array => Value::Array(vec![Value::String("example".to_string())]),
        ParamType::Object => Value::Object(Map::new()),
    }
}

/// Integral floats that convert to i64 without saturating
fn fits_i64(f: f64) -> bool {
    f >= i64::MIN as f64 && f < i64::MAX as f64
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
