use serde::{Deserialize, Serialize};

/// Runtime value produced by thinc evaluation and carried by routed writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    Number(f64),
    Text(String),
    Tag(String),
    List(Vec<Value>),
    Unit,
}

impl Value {
    pub const TRUE: &'static str = "True";
    pub const FALSE: &'static str = "False";

    pub fn bool_tag(value: bool) -> Self {
        Value::Tag(if value { Self::TRUE } else { Self::FALSE }.to_owned())
    }

    /// One-word description used in type mismatch errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::Tag(_) => "tag",
            Value::List(_) => "list",
            Value::Unit => "unit",
        }
    }

    /// Convert value to display string for text interpolation and consoles.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Number(number) => number.to_string(),
            Value::Text(text) => text.clone(),
            Value::Tag(tag) => tag.clone(),
            Value::List(items) => {
                let items: Vec<String> = items.iter().map(Value::to_display_string).collect();
                format!("[{}]", items.join(", "))
            }
            Value::Unit => String::new(),
        }
    }

    /// Convert value to JSON for CLI output.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;
        match self {
            Value::Number(number) => json!(number),
            Value::Text(text) => json!(text),
            Value::Tag(tag) => json!(tag),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Unit => json!(null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_string_for_list() {
        let value = Value::List(vec![
            Value::Number(1.0),
            Value::Text("two".to_owned()),
            Value::Tag("Three".to_owned()),
        ]);
        assert_eq!(value.to_display_string(), "[1, two, Three]");
    }

    #[test]
    fn json_conversion() {
        assert_eq!(Value::Number(2.5).to_json(), serde_json::json!(2.5));
        assert_eq!(Value::Unit.to_json(), serde_json::Value::Null);
        assert_eq!(
            Value::bool_tag(true).to_json(),
            serde_json::json!("True")
        );
    }

    #[test]
    fn serde_round_trip_is_unambiguous() {
        let value = Value::List(vec![Value::Text("True".to_owned()), Value::Tag("True".to_owned())]);
        let encoded = serde_json::to_string(&value).unwrap();
        let decoded: Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, value);
    }
}
