//! Conversion of gateway JSON results into [`Field`]s and [`Row`]s.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ClientError, Result};
use crate::statement::ColumnSchema;
use crate::types::{Field, FieldType, OperationKind, Row};

/// Column type as described by the gateway's result schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeSpec {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_type: Option<Box<TypeSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_type: Option<Box<TypeSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<Box<TypeSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<RowFieldSpec>>,
}

/// Named member of a `ROW` type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowFieldSpec {
    pub name: String,
    pub field_type: TypeSpec,
}

fn default_nullable() -> bool {
    true
}

impl TypeSpec {
    pub fn atomic(field_type: FieldType) -> Self {
        Self {
            type_name: field_type.to_string(),
            nullable: true,
            element_type: None,
            key_type: None,
            value_type: None,
            fields: None,
        }
    }

    pub fn array(element: TypeSpec) -> Self {
        Self {
            element_type: Some(Box::new(element)),
            ..Self::atomic(FieldType::Array)
        }
    }

    pub fn map(key: TypeSpec, value: TypeSpec) -> Self {
        Self {
            key_type: Some(Box::new(key)),
            value_type: Some(Box::new(value)),
            ..Self::atomic(FieldType::Map)
        }
    }

    pub fn row(fields: Vec<(&str, TypeSpec)>) -> Self {
        Self {
            fields: Some(
                fields
                    .into_iter()
                    .map(|(name, field_type)| RowFieldSpec {
                        name: name.to_string(),
                        field_type,
                    })
                    .collect(),
            ),
            ..Self::atomic(FieldType::Row)
        }
    }

    pub fn field_type(&self) -> FieldType {
        FieldType::from_name(&self.type_name)
    }
}

/// Convert one positional JSON row against the column schema.
pub fn json_to_row(columns: &[ColumnSchema], operation: OperationKind, values: &[Value]) -> Result<Row> {
    if values.len() != columns.len() {
        return Err(ClientError::Conversion(format!(
            "row has {} values but the schema has {} columns",
            values.len(),
            columns.len()
        )));
    }

    let fields = columns
        .iter()
        .zip(values)
        .map(|(column, value)| json_to_field(&column.type_spec, value))
        .collect::<Result<Vec<_>>>()?;
    Ok(Row::new(operation, fields))
}

/// Convert a single JSON value of the given type.
pub fn json_to_field(spec: &TypeSpec, value: &Value) -> Result<Field> {
    let field_type = spec.field_type();
    if value.is_null() {
        return Ok(Field::null(field_type));
    }

    match field_type {
        FieldType::Array | FieldType::Multiset => {
            let element_spec = child(spec.element_type.as_deref(), "elementType", spec)?;
            let items = expect_array(value, spec)?;
            let elements = items
                .iter()
                .map(|item| json_to_field(element_spec, item))
                .collect::<Result<Vec<_>>>()?;
            Ok(Field::Array {
                element_type: element_spec.field_type(),
                elements,
            })
        }
        FieldType::Map => {
            let key_spec = child(spec.key_type.as_deref(), "keyType", spec)?;
            let value_spec = child(spec.value_type.as_deref(), "valueType", spec)?;
            let entries = match value {
                Value::Object(object) => object
                    .iter()
                    .map(|(k, v)| -> Result<(Field, Field)> {
                        Ok((
                            json_to_field(key_spec, &Value::String(k.clone()))?,
                            json_to_field(value_spec, v)?,
                        ))
                    })
                    .collect::<Result<Vec<_>>>()?,
                _ => expect_array(value, spec)?
                    .iter()
                    .map(|pair| -> Result<(Field, Field)> {
                        match pair.as_array().map(Vec::as_slice) {
                            Some([k, v]) => {
                                Ok((json_to_field(key_spec, k)?, json_to_field(value_spec, v)?))
                            }
                            _ => Err(ClientError::Conversion(format!(
                                "MAP entry must be a [key, value] pair, got {}",
                                pair
                            ))),
                        }
                    })
                    .collect::<Result<Vec<_>>>()?,
            };
            Ok(Field::Map {
                key_type: key_spec.field_type(),
                value_type: value_spec.field_type(),
                entries,
            })
        }
        FieldType::Row => {
            let member_specs = spec.fields.as_deref().ok_or_else(|| {
                ClientError::Conversion("ROW type is missing its fields".to_string())
            })?;
            let items = expect_array(value, spec)?;
            if items.len() != member_specs.len() {
                return Err(ClientError::Conversion(format!(
                    "ROW value has {} members but the type declares {}",
                    items.len(),
                    member_specs.len()
                )));
            }
            let fields = member_specs
                .iter()
                .zip(items)
                .map(|(member, item)| -> Result<(String, Field)> {
                    Ok((member.name.clone(), json_to_field(&member.field_type, item)?))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Field::Row { fields })
        }
        other => {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                composite => composite.to_string(),
            };
            Ok(Field::atomic(other, text))
        }
    }
}

fn child<'a>(child: Option<&'a TypeSpec>, what: &str, parent: &TypeSpec) -> Result<&'a TypeSpec> {
    child.ok_or_else(|| {
        ClientError::Conversion(format!("{} type is missing its {}", parent.type_name, what))
    })
}

fn expect_array<'a>(value: &'a Value, spec: &TypeSpec) -> Result<&'a Vec<Value>> {
    value.as_array().ok_or_else(|| {
        ClientError::Conversion(format!(
            "expected a JSON array for {}, got {}",
            spec.type_name, value
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn column(name: &str, type_spec: TypeSpec) -> ColumnSchema {
        ColumnSchema {
            name: name.to_string(),
            type_spec,
        }
    }

    #[test]
    fn test_atomic_values() {
        let int = TypeSpec::atomic(FieldType::Integer);
        assert_eq!(json_to_field(&int, &json!(42)).unwrap().to_string(), "42");

        let text = TypeSpec::atomic(FieldType::Varchar);
        assert_eq!(json_to_field(&text, &json!("hello")).unwrap().to_string(), "hello");

        let flag = TypeSpec::atomic(FieldType::Boolean);
        assert_eq!(json_to_field(&flag, &json!(true)).unwrap().to_string(), "true");

        let null = json_to_field(&int, &Value::Null).unwrap();
        assert_eq!(null, Field::null(FieldType::Integer));
    }

    #[test]
    fn test_nested_array() {
        let spec = TypeSpec::array(TypeSpec::array(TypeSpec::atomic(FieldType::Integer)));
        let field = json_to_field(&spec, &json!([[1, 2], [], null])).unwrap();
        assert_eq!(field.to_string(), "[[1, 2], [], NULL]");
        assert_eq!(field.field_type(), FieldType::Array);
    }

    #[test]
    fn test_map_from_pairs_keeps_order_and_duplicates() {
        let spec = TypeSpec::map(
            TypeSpec::atomic(FieldType::Varchar),
            TypeSpec::atomic(FieldType::BigInt),
        );
        let field = json_to_field(&spec, &json!([["b", 2], ["a", 1], ["b", 3]])).unwrap();
        assert_eq!(field.to_string(), "{b=2, a=1, b=3}");

        let from_object = json_to_field(&spec, &json!({"k": 7})).unwrap();
        assert_eq!(from_object.to_string(), "{k=7}");

        assert!(json_to_field(&spec, &json!([["only-key"]])).is_err());
    }

    #[test]
    fn test_row_value() {
        let spec = TypeSpec::row(vec![
            ("id", TypeSpec::atomic(FieldType::Integer)),
            ("tags", TypeSpec::array(TypeSpec::atomic(FieldType::Varchar))),
        ]);
        let field = json_to_field(&spec, &json!([1, ["x", "y"]])).unwrap();
        assert_eq!(field.to_string(), "(1, [x, y])");

        let err = json_to_field(&spec, &json!([1])).unwrap_err();
        assert!(matches!(err, ClientError::Conversion(_)));
    }

    #[test]
    fn test_row_arity_mismatch() {
        let columns = vec![
            column("id", TypeSpec::atomic(FieldType::Integer)),
            column("name", TypeSpec::atomic(FieldType::Varchar)),
        ];
        let row = json_to_row(&columns, OperationKind::UpdateAfter, &[json!(1), json!("a")]).unwrap();
        assert_eq!(row.operation, OperationKind::UpdateAfter);
        assert_eq!(row.rendered(), vec!["1", "a"]);

        assert!(json_to_row(&columns, OperationKind::Insert, &[json!(1)]).is_err());
    }

    #[test]
    fn test_type_spec_wire_format() {
        let spec: TypeSpec = serde_json::from_value(json!({
            "type": "MAP",
            "keyType": {"type": "STRING"},
            "valueType": {"type": "ROW", "nullable": false, "fields": [
                {"name": "n", "fieldType": {"type": "INT"}}
            ]}
        }))
        .unwrap();

        assert_eq!(spec.field_type(), FieldType::Map);
        assert!(spec.nullable);
        let value = spec.value_type.as_ref().unwrap();
        assert!(!value.nullable);
        assert_eq!(value.fields.as_ref().unwrap()[0].field_type.field_type(), FieldType::Integer);
    }
}
