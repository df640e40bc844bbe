//! Tuples: schema-described byte sequences with a stable locator.

use vellum_common::types::Rid;
use vellum_storage::page::TupleMetaRaw;

use crate::schema::Schema;
use crate::value::Value;

/// Per-tuple metadata kept by the table heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TupleMeta {
    /// Transaction timestamp; opaque to the executor runtime.
    pub ts: u64,
    /// Logical deletion flag.
    pub is_deleted: bool,
}

impl From<TupleMeta> for TupleMetaRaw {
    fn from(meta: TupleMeta) -> Self {
        TupleMetaRaw {
            ts: meta.ts,
            is_deleted: meta.is_deleted,
        }
    }
}

impl From<TupleMetaRaw> for TupleMeta {
    fn from(raw: TupleMetaRaw) -> Self {
        TupleMeta {
            ts: raw.ts,
            is_deleted: raw.is_deleted,
        }
    }
}

/// A tuple: encoded column values plus the rid it was fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    data: Vec<u8>,
    rid: Rid,
}

impl Default for Tuple {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            rid: Rid::INVALID,
        }
    }
}

impl Tuple {
    /// Builds a tuple by encoding `values` in schema order.
    pub fn from_values(values: &[Value], schema: &Schema) -> Self {
        debug_assert_eq!(values.len(), schema.column_count());
        let mut data = Vec::new();
        for value in values {
            value.serialize_into(&mut data);
        }
        Self {
            data,
            rid: Rid::INVALID,
        }
    }

    /// Wraps already-encoded bytes.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            data,
            rid: Rid::INVALID,
        }
    }

    /// The raw encoded bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The rid this tuple was fetched from, `Rid::INVALID` for derived
    /// tuples.
    #[inline]
    pub fn rid(&self) -> Rid {
        self.rid
    }

    /// Sets the rid.
    #[inline]
    pub fn set_rid(&mut self, rid: Rid) {
        self.rid = rid;
    }

    /// Decodes the value of column `index`.
    pub fn value_at(&self, schema: &Schema, index: usize) -> Value {
        let mut offset = 0;
        for i in 0..index {
            let (_, consumed) =
                Value::deserialize_from(&self.data[offset..], schema.column(i).data_type);
            offset += consumed;
        }
        Value::deserialize_from(&self.data[offset..], schema.column(index).data_type).0
    }

    /// Decodes every column value.
    pub fn values(&self, schema: &Schema) -> Vec<Value> {
        let mut offset = 0;
        (0..schema.column_count())
            .map(|i| {
                let (value, consumed) =
                    Value::deserialize_from(&self.data[offset..], schema.column(i).data_type);
                offset += consumed;
                value
            })
            .collect()
    }

    /// Projects this tuple onto an index key schema via the key attrs.
    pub fn key_from_tuple(&self, schema: &Schema, key_schema: &Schema, key_attrs: &[usize]) -> Tuple {
        debug_assert_eq!(key_schema.column_count(), key_attrs.len());
        let values: Vec<Value> = key_attrs.iter().map(|&i| self.value_at(schema, i)).collect();
        Tuple::from_values(&values, key_schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;
    use crate::value::DataType;
    use vellum_common::types::PageId;

    fn schema() -> Schema {
        Schema::new(vec![
            Column::new("id", DataType::Integer),
            Column::new("name", DataType::Varchar),
            Column::new("active", DataType::Boolean),
        ])
    }

    #[test]
    fn values_round_trip() {
        let schema = schema();
        let values = vec![
            Value::Integer(42),
            Value::Varchar("ada".into()),
            Value::Boolean(true),
        ];
        let tuple = Tuple::from_values(&values, &schema);
        assert_eq!(tuple.values(&schema), values);
        assert_eq!(tuple.value_at(&schema, 1), Value::Varchar("ada".into()));
    }

    #[test]
    fn nulls_round_trip() {
        let schema = schema();
        let values = vec![Value::Null, Value::Null, Value::Boolean(false)];
        let tuple = Tuple::from_values(&values, &schema);
        assert_eq!(tuple.values(&schema), values);
    }

    #[test]
    fn key_projection() {
        let schema = schema();
        let key_schema = Schema::new(vec![Column::new("id", DataType::Integer)]);
        let tuple = Tuple::from_values(
            &[Value::Integer(9), Value::Varchar("x".into()), Value::Boolean(false)],
            &schema,
        );
        let key = tuple.key_from_tuple(&schema, &key_schema, &[0]);
        assert_eq!(key.value_at(&key_schema, 0), Value::Integer(9));
    }

    #[test]
    fn rid_travels_with_the_tuple() {
        let mut tuple = Tuple::from_bytes(vec![1, 2, 3, 4, 5]);
        assert!(!tuple.rid().is_valid());
        tuple.set_rid(Rid::new(PageId::new(3), 7));
        assert_eq!(tuple.rid().slot, 7);
    }
}
