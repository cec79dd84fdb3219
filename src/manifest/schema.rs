//! Declarative field schemas.
//!
//! A `FieldSchema` is the manifest form of a `$jsonSchema` node. It renders
//! to the validator document the server enforces, and can check a document
//! locally with the same semantics for the keywords it supports.

use std::collections::BTreeMap;

use mongodb::bson::{doc, Bson, Document};
use serde::Deserialize;

/// BSON type aliases accepted by `$jsonSchema`'s `bsonType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BsonType {
    String,
    /// Any numeric type: int, long, double or decimal.
    Number,
    Int,
    Long,
    Double,
    Decimal,
    Bool,
    Date,
    Object,
    Array,
    ObjectId,
    Null,
}

impl BsonType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BsonType::String => "string",
            BsonType::Number => "number",
            BsonType::Int => "int",
            BsonType::Long => "long",
            BsonType::Double => "double",
            BsonType::Decimal => "decimal",
            BsonType::Bool => "bool",
            BsonType::Date => "date",
            BsonType::Object => "object",
            BsonType::Array => "array",
            BsonType::ObjectId => "objectId",
            BsonType::Null => "null",
        }
    }

    pub fn matches(&self, value: &Bson) -> bool {
        match self {
            BsonType::String => matches!(value, Bson::String(_)),
            BsonType::Number => matches!(
                value,
                Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_)
            ),
            BsonType::Int => matches!(value, Bson::Int32(_)),
            BsonType::Long => matches!(value, Bson::Int64(_)),
            BsonType::Double => matches!(value, Bson::Double(_)),
            BsonType::Decimal => matches!(value, Bson::Decimal128(_)),
            BsonType::Bool => matches!(value, Bson::Boolean(_)),
            BsonType::Date => matches!(value, Bson::DateTime(_)),
            BsonType::Object => matches!(value, Bson::Document(_)),
            BsonType::Array => matches!(value, Bson::Array(_)),
            BsonType::ObjectId => matches!(value, Bson::ObjectId(_)),
            BsonType::Null => matches!(value, Bson::Null),
        }
    }
}

fn type_name(value: &Bson) -> &'static str {
    match value {
        Bson::String(_) => "string",
        Bson::Int32(_) => "int",
        Bson::Int64(_) => "long",
        Bson::Double(_) => "double",
        Bson::Decimal128(_) => "decimal",
        Bson::Boolean(_) => "bool",
        Bson::DateTime(_) => "date",
        Bson::Document(_) => "object",
        Bson::Array(_) => "array",
        Bson::ObjectId(_) => "objectId",
        Bson::Null => "null",
        _ => "other",
    }
}

fn numeric(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        Bson::Decimal128(d) => d.to_string().parse::<f64>().ok().filter(|n| !n.is_nan()),
        _ => None,
    }
}

/// One failed constraint, located by dotted path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Schema node for a document or field.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FieldSchema {
    #[serde(rename = "type")]
    pub bson_type: Option<BsonType>,
    pub description: Option<String>,
    /// Fields that must be present when the value is an object.
    pub required: Vec<String>,
    pub properties: BTreeMap<String, FieldSchema>,
    /// Schema for every element when the value is an array.
    pub items: Option<Box<FieldSchema>>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    #[serde(rename = "enum")]
    pub allowed: Vec<String>,
}

impl FieldSchema {
    /// Render as a `$jsonSchema` node.
    pub fn to_document(&self) -> Document {
        let mut schema = Document::new();

        if let Some(bson_type) = self.bson_type {
            schema.insert("bsonType", bson_type.as_str());
        }
        if !self.required.is_empty() {
            schema.insert("required", self.required.clone());
        }
        if !self.allowed.is_empty() {
            schema.insert("enum", self.allowed.clone());
        }
        if let Some(minimum) = self.minimum {
            schema.insert("minimum", minimum);
        }
        if let Some(maximum) = self.maximum {
            schema.insert("maximum", maximum);
        }
        if !self.properties.is_empty() {
            let mut properties = Document::new();
            for (name, field) in &self.properties {
                properties.insert(name.clone(), field.to_document());
            }
            schema.insert("properties", properties);
        }
        if let Some(items) = &self.items {
            schema.insert("items", items.to_document());
        }
        if let Some(description) = &self.description {
            schema.insert("description", description.clone());
        }

        schema
    }

    /// Render as a collection validator.
    pub fn validator(&self) -> Document {
        doc! { "$jsonSchema": self.to_document() }
    }

    /// Check a value against this schema, collecting every violation.
    pub fn check(&self, value: &Bson) -> Vec<Violation> {
        let mut violations = Vec::new();
        self.check_at("", value, &mut violations);
        violations
    }

    /// Check a whole document.
    pub fn check_document(&self, document: &Document) -> Vec<Violation> {
        self.check(&Bson::Document(document.clone()))
    }

    fn check_at(&self, path: &str, value: &Bson, out: &mut Vec<Violation>) {
        let mut fail = |message: String| {
            out.push(Violation {
                path: path.to_string(),
                message,
            })
        };

        if let Some(bson_type) = self.bson_type {
            if !bson_type.matches(value) {
                fail(format!(
                    "expected {}, found {}",
                    bson_type.as_str(),
                    type_name(value)
                ));
                return;
            }
        }

        if !self.allowed.is_empty() {
            let permitted = match value {
                Bson::String(s) => self.allowed.contains(s),
                _ => false,
            };
            if !permitted {
                fail(format!("{} is not one of {:?}", value, self.allowed));
            }
        }

        let bounded = self.minimum.is_some() || self.maximum.is_some();
        match numeric(value) {
            Some(n) => {
                if let Some(minimum) = self.minimum {
                    if n < minimum {
                        fail(format!("{} is less than the minimum of {}", n, minimum));
                    }
                }
                if let Some(maximum) = self.maximum {
                    if n > maximum {
                        fail(format!("{} is greater than the maximum of {}", n, maximum));
                    }
                }
            }
            None if bounded && matches!(value, Bson::Decimal128(_)) => {
                fail(format!("decimal {} cannot be compared against declared bounds", value));
            }
            None => {}
        }

        match value {
            Bson::Document(document) => {
                for field in &self.required {
                    if !document.contains_key(field) {
                        out.push(Violation {
                            path: join(path, field),
                            message: "required field is missing".to_string(),
                        });
                    }
                }
                for (name, field) in &self.properties {
                    if let Some(child) = document.get(name) {
                        field.check_at(&join(path, name), child, out);
                    }
                }
            }
            Bson::Array(elements) => {
                if let Some(items) = &self.items {
                    for (i, element) in elements.iter().enumerate() {
                        items.check_at(&format!("{}[{}]", path, i), element, out);
                    }
                }
            }
            _ => {}
        }
    }
}

fn join(path: &str, field: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", path, field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{DateTime, Decimal128};

    /// Decimal128 holding a small integer, built from its BID encoding.
    fn decimal(n: i64) -> Bson {
        let sign: u128 = if n < 0 { 1 << 127 } else { 0 };
        let bits = sign | (0x3040u128 << 112) | u128::from(n.unsigned_abs());
        Bson::Decimal128(Decimal128::from_bytes(bits.to_le_bytes()))
    }

    fn product_schema() -> FieldSchema {
        serde_yaml::from_str(
            r#"
type: object
required: [name, sku, price]
properties:
  name: { type: string }
  sku: { type: string }
  price: { type: number, minimum: 0 }
  status: { enum: [draft, published] }
  reviews:
    type: array
    items:
      type: object
      properties:
        rating: { type: number, minimum: 1, maximum: 5 }
        date: { type: date }
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_validator_document_shape() {
        let validator = product_schema().validator();
        let schema = validator.get_document("$jsonSchema").unwrap();

        assert_eq!(schema.get_str("bsonType").unwrap(), "object");
        let required: Vec<&str> = schema
            .get_array("required")
            .unwrap()
            .iter()
            .filter_map(|b| b.as_str())
            .collect();
        assert_eq!(required, vec!["name", "sku", "price"]);

        let price = schema
            .get_document("properties")
            .unwrap()
            .get_document("price")
            .unwrap();
        assert_eq!(price.get_str("bsonType").unwrap(), "number");
        assert_eq!(price.get_f64("minimum").unwrap(), 0.0);

        let rating = schema
            .get_document("properties")
            .unwrap()
            .get_document("reviews")
            .unwrap()
            .get_document("items")
            .unwrap()
            .get_document("properties")
            .unwrap()
            .get_document("rating")
            .unwrap();
        assert_eq!(rating.get_f64("maximum").unwrap(), 5.0);
    }

    #[test]
    fn test_enum_without_type_renders_enum_only() {
        let schema = product_schema();
        let status = schema.properties["status"].to_document();
        assert!(status.get("bsonType").is_none());
        assert_eq!(status.get_array("enum").unwrap().len(), 2);
    }

    #[test]
    fn test_valid_document_passes() {
        let document = doc! {
            "name": "Phone",
            "sku": "PHONE-001",
            "price": 899.99,
            "reviews": [ { "rating": 5, "date": DateTime::now() } ],
        };
        assert!(product_schema().check_document(&document).is_empty());
    }

    #[test]
    fn test_negative_price_rejected() {
        let document = doc! { "name": "Phone", "sku": "P", "price": -1 };
        let violations = product_schema().check_document(&document);

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "price");
    }

    #[test]
    fn test_decimal_values_are_range_checked() {
        let mut document = doc! { "name": "Phone", "sku": "P" };
        document.insert("price", decimal(-1));
        let violations = product_schema().check_document(&document);

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "price");
        assert_eq!(violations[0].message, "-1 is less than the minimum of 0");

        document.insert("price", decimal(25));
        assert!(product_schema().check_document(&document).is_empty());
    }

    #[test]
    fn test_rating_out_of_range_rejected() {
        let document = doc! {
            "name": "Phone", "sku": "P", "price": 1,
            "reviews": [ { "rating": 4 }, { "rating": 6 } ],
        };
        let violations = product_schema().check_document(&document);

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "reviews[1].rating");
    }

    #[test]
    fn test_unknown_enum_value_rejected() {
        let document = doc! { "name": "A", "sku": "S", "price": 1, "status": "deleted" };
        let violations = product_schema().check_document(&document);

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "status");
    }

    #[test]
    fn test_missing_required_and_wrong_type_reported() {
        let document = doc! { "name": 42, "price": "free" };
        let violations = product_schema().check_document(&document);

        let paths: Vec<&str> = violations.iter().map(|v| v.path.as_str()).collect();
        assert!(paths.contains(&"sku"));
        assert!(paths.contains(&"name"));
        assert!(paths.contains(&"price"));
    }

    #[test]
    fn test_number_accepts_all_numeric_types() {
        for value in [Bson::Int32(1), Bson::Int64(1), Bson::Double(1.5), decimal(1)] {
            assert!(BsonType::Number.matches(&value));
        }
        assert!(!BsonType::Number.matches(&Bson::String("1".to_string())));
    }

    #[test]
    fn test_unknown_schema_keyword_rejected() {
        let parsed: Result<FieldSchema, _> = serde_yaml::from_str("type: string\npattern: x");
        assert!(parsed.is_err());
    }
}
