//! Declared parameter shapes.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    /// JSON Schema type name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamField {
    pub json_key: String,
    pub param_type: ParamType,
    pub required: bool,
    #[serde(default)]
    pub description: String,
}

/// Ordered set of parameter fields accepted by an intent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamShape {
    fields: Vec<ParamField>,
}

impl ParamShape {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(
        self,
        json_key: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        self.with_field(ParamField {
            json_key: json_key.into(),
            param_type,
            required: true,
            description: description.into(),
        })
    }

    pub fn optional(
        self,
        json_key: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        self.with_field(ParamField {
            json_key: json_key.into(),
            param_type,
            required: false,
            description: description.into(),
        })
    }

    /// Add a field, replacing any earlier field with the same key.
    pub fn with_field(mut self, field: ParamField) -> Self {
        self.fields.retain(|f| f.json_key != field.json_key);
        self.fields.push(field);
        self
    }

    pub fn fields(&self) -> &[ParamField] {
        &self.fields
    }

    pub fn field(&self, json_key: &str) -> Option<&ParamField> {
        self.fields.iter().find(|f| f.json_key == json_key)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Render as a JSON Schema object for the model's tool list.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for field in &self.fields {
            let mut prop = json!({ "type": field.param_type.as_str() });
            if !field.description.is_empty() {
                prop["description"] = Value::String(field.description.clone());
            }
            properties.insert(field.json_key.clone(), prop);
            if field.required {
                required.push(Value::String(field.json_key.clone()));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_lists_required_fields() {
        let shape = ParamShape::new()
            .required("bookingRef", ParamType::String, "Booking reference")
            .optional("confirm", ParamType::Boolean, "");

        let schema = shape.to_json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["bookingRef"]["type"], "string");
        assert_eq!(
            schema["properties"]["bookingRef"]["description"],
            "Booking reference"
        );
        assert!(schema["properties"]["confirm"].get("description").is_none());
        assert_eq!(schema["required"], json!(["bookingRef"]));
    }

    #[test]
    fn redeclaring_a_key_replaces_it() {
        let shape = ParamShape::new()
            .optional("n", ParamType::String, "")
            .required("n", ParamType::Integer, "");
        assert_eq!(shape.fields().len(), 1);
        assert_eq!(shape.field("n").map(|f| f.param_type), Some(ParamType::Integer));
    }
}
