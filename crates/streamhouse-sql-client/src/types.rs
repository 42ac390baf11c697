//! Result value model: typed fields, change operations and rows.

use std::fmt;

/// SQL type tag attached to every [`Field`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    Char,
    Varchar,
    Boolean,
    Binary,
    Varbinary,
    Decimal,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Float,
    Double,
    Date,
    Time,
    Timestamp,
    TimestampLtz,
    Interval,
    Array,
    Map,
    Row,
    Multiset,
    Null,
    /// A type name this client does not know about; rendered as-is.
    Other(String),
}

impl FieldType {
    /// Parse a SQL type name as reported by the gateway.
    ///
    /// Unknown names are preserved in [`FieldType::Other`].
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "CHAR" => Self::Char,
            "VARCHAR" | "STRING" => Self::Varchar,
            "BOOLEAN" => Self::Boolean,
            "BINARY" => Self::Binary,
            "VARBINARY" | "BYTES" => Self::Varbinary,
            "DECIMAL" => Self::Decimal,
            "TINYINT" => Self::TinyInt,
            "SMALLINT" => Self::SmallInt,
            "INTEGER" | "INT" => Self::Integer,
            "BIGINT" => Self::BigInt,
            "FLOAT" => Self::Float,
            "DOUBLE" => Self::Double,
            "DATE" => Self::Date,
            "TIME" | "TIME_WITHOUT_TIME_ZONE" => Self::Time,
            "TIMESTAMP" | "TIMESTAMP_WITHOUT_TIME_ZONE" => Self::Timestamp,
            "TIMESTAMP_LTZ" | "TIMESTAMP_WITH_LOCAL_TIME_ZONE" => Self::TimestampLtz,
            "INTERVAL" | "INTERVAL_DAY_TIME" | "INTERVAL_YEAR_MONTH" => Self::Interval,
            "ARRAY" => Self::Array,
            "MAP" => Self::Map,
            "ROW" => Self::Row,
            "MULTISET" => Self::Multiset,
            "NULL" => Self::Null,
            _ => Self::Other(name.to_string()),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Char => "CHAR",
            Self::Varchar => "VARCHAR",
            Self::Boolean => "BOOLEAN",
            Self::Binary => "BINARY",
            Self::Varbinary => "VARBINARY",
            Self::Decimal => "DECIMAL",
            Self::TinyInt => "TINYINT",
            Self::SmallInt => "SMALLINT",
            Self::Integer => "INTEGER",
            Self::BigInt => "BIGINT",
            Self::Float => "FLOAT",
            Self::Double => "DOUBLE",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::Timestamp => "TIMESTAMP",
            Self::TimestampLtz => "TIMESTAMP_LTZ",
            Self::Interval => "INTERVAL",
            Self::Array => "ARRAY",
            Self::Map => "MAP",
            Self::Row => "ROW",
            Self::Multiset => "MULTISET",
            Self::Null => "NULL",
            Self::Other(name) => name,
        };
        f.write_str(name)
    }
}

/// A single immutable result cell.
///
/// `Display` produces the canonical rendering, which is used both for
/// output and for row identity (see [`RowKey`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    /// A primitive value carried as its string encoding.
    Atomic { field_type: FieldType, value: String },
    /// SQL NULL; renders as `NULL` but never equals a `'NULL'` string.
    Null { field_type: FieldType },
    Array {
        element_type: FieldType,
        elements: Vec<Field>,
    },
    /// Entries keep their wire order; duplicate keys are allowed.
    Map {
        key_type: FieldType,
        value_type: FieldType,
        entries: Vec<(Field, Field)>,
    },
    /// Named sub-fields in declaration order.
    Row { fields: Vec<(String, Field)> },
}

impl Field {
    pub fn atomic(field_type: FieldType, value: impl Into<String>) -> Self {
        Field::Atomic {
            field_type,
            value: value.into(),
        }
    }

    pub fn varchar(value: impl Into<String>) -> Self {
        Self::atomic(FieldType::Varchar, value)
    }

    /// SQL NULL of the given type.
    pub fn null(field_type: FieldType) -> Self {
        Field::Null { field_type }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Field::Null { .. })
    }

    /// The type tag of this field. Composite fields report their composite
    /// type (`ARRAY`, `MAP`, `ROW`).
    pub fn field_type(&self) -> FieldType {
        match self {
            Field::Atomic { field_type, .. } | Field::Null { field_type } => field_type.clone(),
            Field::Array { .. } => FieldType::Array,
            Field::Map { .. } => FieldType::Map,
            Field::Row { .. } => FieldType::Row,
        }
    }

    /// Number of characters in the canonical rendering.
    pub fn display_width(&self) -> usize {
        self.to_string().chars().count()
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Atomic { value, .. } => f.write_str(value),
            Field::Null { .. } => f.write_str("NULL"),
            Field::Array { elements, .. } => {
                f.write_str("[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", element)?;
                }
                f.write_str("]")
            }
            Field::Map { entries, .. } => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}={}", key, value)?;
                }
                f.write_str("}")
            }
            Field::Row { fields } => {
                f.write_str("(")?;
                for (i, (_, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Change operation carried by every result row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Insert = 0,
    UpdateBefore = 1,
    UpdateAfter = 2,
    Delete = 3,
}

impl OperationKind {
    /// Decode the numeric wire code (`0..=3`).
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Insert),
            1 => Some(Self::UpdateBefore),
            2 => Some(Self::UpdateAfter),
            3 => Some(Self::Delete),
            _ => None,
        }
    }

    /// Short changelog notation (`+I`, `-U`, `+U`, `-D`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "+I",
            Self::UpdateBefore => "-U",
            Self::UpdateAfter => "+U",
            Self::Delete => "-D",
        }
    }

    /// `true` for events that add or replace a row in the table view.
    /// `UPDATE_BEFORE` and `DELETE` are retractions.
    pub fn is_upsert(&self) -> bool {
        matches!(self, Self::Insert | Self::UpdateAfter)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One result row tagged with its change operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub operation: OperationKind,
    pub fields: Vec<Field>,
}

impl Row {
    pub fn new(operation: OperationKind, fields: Vec<Field>) -> Self {
        Self { operation, fields }
    }

    pub fn insert(fields: Vec<Field>) -> Self {
        Self::new(OperationKind::Insert, fields)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Identity of the logical entity this row describes.
    pub fn key(&self) -> RowKey {
        RowKey::from_fields(&self.fields)
    }

    /// Canonical rendering of every field, in column order.
    pub fn rendered(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.to_string()).collect()
    }

    /// Copy of this row with the operation prepended as a `VARCHAR` column.
    pub(crate) fn with_operation_column(&self) -> Row {
        let mut fields = Vec::with_capacity(self.fields.len() + 1);
        fields.push(Field::varchar(self.operation.as_str()));
        fields.extend(self.fields.iter().cloned());
        Row {
            operation: self.operation,
            fields,
        }
    }
}

/// Row identity used to pair upserts with their retractions.
///
/// Each field is written as a one-letter tag followed by its payload:
/// atomics as `<len>:<value>`, NULL as a bare tag, and composites as an
/// element count followed by their encoded children. The rendering used
/// for display is never part of the key, so `("ab", "c")` and
/// `("a", "bc")`, `NULL` and `'NULL'`, or `['a, b']` and `['a', 'b']`
/// all produce different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowKey(String);

impl RowKey {
    pub fn from_fields(fields: &[Field]) -> Self {
        let mut key = String::new();
        for field in fields {
            encode_key(field, &mut key);
        }
        RowKey(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn encode_key(field: &Field, key: &mut String) {
    match field {
        Field::Atomic { value, .. } => {
            key.push('s');
            key.push_str(&value.len().to_string());
            key.push(':');
            key.push_str(value);
        }
        Field::Null { .. } => key.push('n'),
        Field::Array { elements, .. } => {
            key.push('a');
            key.push_str(&elements.len().to_string());
            key.push(':');
            for element in elements {
                encode_key(element, key);
            }
        }
        Field::Map { entries, .. } => {
            key.push('m');
            key.push_str(&entries.len().to_string());
            key.push(':');
            for (k, v) in entries {
                encode_key(k, key);
                encode_key(v, key);
            }
        }
        Field::Row { fields } => {
            key.push('r');
            key.push_str(&fields.len().to_string());
            key.push(':');
            for (_, value) in fields {
                encode_key(value, key);
            }
        }
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(v: i64) -> Field {
        Field::atomic(FieldType::Integer, v.to_string())
    }

    #[test]
    fn test_atomic_rendering() {
        assert_eq!(int(42).to_string(), "42");
        assert_eq!(Field::varchar("hello").to_string(), "hello");
        assert_eq!(Field::null(FieldType::BigInt).to_string(), "NULL");
    }

    #[test]
    fn test_composite_rendering() {
        let array = Field::Array {
            element_type: FieldType::Integer,
            elements: vec![int(1), int(2), int(3)],
        };
        assert_eq!(array.to_string(), "[1, 2, 3]");

        let map = Field::Map {
            key_type: FieldType::Varchar,
            value_type: FieldType::Integer,
            entries: vec![
                (Field::varchar("b"), int(2)),
                (Field::varchar("a"), int(1)),
                (Field::varchar("b"), int(3)),
            ],
        };
        // wire order and duplicates are preserved
        assert_eq!(map.to_string(), "{b=2, a=1, b=3}");

        let row = Field::Row {
            fields: vec![
                ("id".to_string(), int(7)),
                ("tags".to_string(), array),
            ],
        };
        assert_eq!(row.to_string(), "(7, [1, 2, 3])");
        assert_eq!(row.field_type(), FieldType::Row);
    }

    #[test]
    fn test_operation_kind_strings() {
        assert_eq!(OperationKind::Insert.as_str(), "+I");
        assert_eq!(OperationKind::UpdateBefore.as_str(), "-U");
        assert_eq!(OperationKind::UpdateAfter.as_str(), "+U");
        assert_eq!(OperationKind::Delete.as_str(), "-D");
    }

    #[test]
    fn test_operation_kind_upsert_classification() {
        assert!(OperationKind::Insert.is_upsert());
        assert!(OperationKind::UpdateAfter.is_upsert());
        assert!(!OperationKind::UpdateBefore.is_upsert());
        assert!(!OperationKind::Delete.is_upsert());
    }

    #[test]
    fn test_operation_kind_from_code() {
        assert_eq!(OperationKind::from_code(0), Some(OperationKind::Insert));
        assert_eq!(OperationKind::from_code(3), Some(OperationKind::Delete));
        assert_eq!(OperationKind::from_code(4), None);
    }

    #[test]
    fn test_row_key_is_unambiguous() {
        let left = Row::insert(vec![Field::varchar("ab"), Field::varchar("c")]);
        let right = Row::insert(vec![Field::varchar("a"), Field::varchar("bc")]);
        assert_ne!(left.key(), right.key());
        assert_eq!(left.key().as_str(), "s2:abs1:c");
    }

    #[test]
    fn test_row_key_distinguishes_null_from_text() {
        let null = Row::insert(vec![Field::null(FieldType::Varchar)]);
        let text = Row::insert(vec![Field::varchar("NULL")]);
        assert_eq!(null.rendered(), text.rendered());
        assert_ne!(null.key(), text.key());
        assert!(null.fields[0].is_null());
        assert_eq!(null.fields[0].field_type(), FieldType::Varchar);
    }

    #[test]
    fn test_row_key_encodes_nested_elements() {
        let joined = Field::Array {
            element_type: FieldType::Varchar,
            elements: vec![Field::varchar("a, b")],
        };
        let split = Field::Array {
            element_type: FieldType::Varchar,
            elements: vec![Field::varchar("a"), Field::varchar("b")],
        };
        assert_eq!(joined.to_string(), split.to_string());
        assert_ne!(
            Row::insert(vec![joined]).key(),
            Row::insert(vec![split]).key()
        );

        let map = |k: &str, v: &str| Field::Map {
            key_type: FieldType::Varchar,
            value_type: FieldType::Varchar,
            entries: vec![(Field::varchar(k), Field::varchar(v))],
        };
        assert_eq!(map("a=b", "c").to_string(), map("a", "b=c").to_string());
        assert_ne!(
            Row::insert(vec![map("a=b", "c")]).key(),
            Row::insert(vec![map("a", "b=c")]).key()
        );
    }

    #[test]
    fn test_row_key_ignores_operation() {
        let insert = Row::new(OperationKind::Insert, vec![int(5)]);
        let delete = Row::new(OperationKind::Delete, vec![int(5)]);
        assert_eq!(insert.key(), delete.key());
    }

    #[test]
    fn test_with_operation_column() {
        let row = Row::new(OperationKind::UpdateAfter, vec![int(1), Field::varchar("x")]);
        let decorated = row.with_operation_column();
        assert_eq!(decorated.rendered(), vec!["+U", "1", "x"]);
        assert_eq!(decorated.fields[0].field_type(), FieldType::Varchar);
        assert_eq!(row.len(), 2);
    }

    #[test]
    fn test_field_type_names() {
        assert_eq!(FieldType::from_name("integer"), FieldType::Integer);
        assert_eq!(FieldType::from_name("TIMESTAMP_LTZ"), FieldType::TimestampLtz);
        assert_eq!(
            FieldType::from_name("GEOMETRY"),
            FieldType::Other("GEOMETRY".to_string())
        );
        assert_eq!(FieldType::TimestampLtz.to_string(), "TIMESTAMP_LTZ");
        assert_eq!(FieldType::Other("GEOMETRY".to_string()).to_string(), "GEOMETRY");
    }

    #[test]
    fn test_display_width_counts_chars() {
        assert_eq!(Field::varchar("héllo").display_width(), 5);
    }
}
