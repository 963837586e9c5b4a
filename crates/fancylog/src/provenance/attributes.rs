use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::logger::{LoggerError, LoggerResult};

/// Named snapshot of an object's public attributes.
///
/// Fields are kept in alphabetical order, so rendering is stable regardless
/// of how the snapshot was built.
#[derive(Debug, Clone, PartialEq)]
pub struct Attributes {
    name: String,
    fields: BTreeMap<String, Value>,
}

impl Attributes {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Adds a field and returns the snapshot.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Snapshots a serializable struct or map under `name`.
    ///
    /// # Errors
    /// [`LoggerError::NotAnObject`] if `value` does not serialize to a map.
    ///
    /// # Examples
    /// ```
    /// use fancylog::{Attributes, format_attributes};
    ///
    /// #[derive(serde::Serialize)]
    /// struct Params {
    ///     epochs: u32,
    ///     name: &'static str,
    /// }
    ///
    /// let attrs = Attributes::from_serialize("Params", &Params { epochs: 3, name: "run" }).unwrap();
    /// assert_eq!(format_attributes(&attrs, &[]), "epochs: 3\nname: run");
    /// ```
    pub fn from_serialize<T>(name: impl Into<String>, value: &T) -> LoggerResult<Self>
    where
        T: Serialize + ?Sized,
    {
        let name = name.into();
        match serde_json::to_value(value)? {
            Value::Object(map) => Ok(Self {
                name,
                fields: map.into_iter().collect(),
            }),
            _ => Err(LoggerError::NotAnObject(name)),
        }
    }

    /// Like [`Attributes::from_serialize`], named after the type of `value`.
    pub fn of<T: Serialize>(value: &T) -> LoggerResult<Self> {
        Self::from_serialize(short_type_name::<T>(), value)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Renders one `name: value` line per public attribute, skipping `exclude`
/// and names starting with `_`. No trailing newline.
pub fn format_attributes(attrs: &Attributes, exclude: &[&str]) -> String {
    attrs
        .iter()
        .filter(|(field, _)| !field.starts_with('_') && !exclude.contains(field))
        .map(|(field, value)| format!("{field}: {}", render_value(value)))
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `my_crate::config::Params<u8>` -> `Params`.
fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let path = full.split('<').next().unwrap_or(full);
    path.rsplit("::").next().unwrap_or(path)
}
