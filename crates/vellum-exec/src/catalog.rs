//! Catalog: tables and their secondary indexes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;
use vellum_common::constants::DEFAULT_TOMBSTONE_CAPACITY;
use vellum_common::types::{Oid, Rid, TxnId};
use vellum_storage::btree::{BPlusTree, IndexIterator, IndexKey};
use vellum_storage::buffer::BufferPoolManager;

use crate::heap::TableHeap;
use crate::schema::Schema;
use crate::tuple::Tuple;
use crate::value::Value;

/// Tombstone capacity used by catalog-managed indexes.
const INDEX_TOMBSTONES: usize = DEFAULT_TOMBSTONE_CAPACITY;

/// Sizing for catalog-managed indexes.
const INDEX_LEAF_MAX: usize = 64;
const INDEX_INTERNAL_MAX: usize = 64;

/// A table known to the catalog.
pub struct TableInfo {
    /// Table oid.
    pub oid: Oid,
    /// Table name.
    pub name: String,
    /// Tuple layout.
    pub schema: Schema,
    /// Backing heap.
    pub table: TableHeap,
}

/// A secondary index over a table.
pub struct IndexInfo {
    /// Index oid.
    pub oid: Oid,
    /// Index name.
    pub name: String,
    /// Name of the indexed table.
    pub table_name: String,
    /// Schema of the key tuples.
    pub key_schema: Schema,
    key_attrs: Vec<usize>,
    index: BPlusTree<{ INDEX_TOMBSTONES }>,
}

impl IndexInfo {
    /// The table columns this index projects as its key.
    pub fn get_key_attrs(&self) -> &[usize] {
        &self.key_attrs
    }

    /// Inserts an entry mapping `key` to `rid`.
    pub fn insert_entry(&self, key: &Tuple, rid: Rid, _txn: TxnId) -> bool {
        self.index.insert(self.encode_key(key), rid)
    }

    /// Deletes the entry for `key`.
    pub fn delete_entry(&self, key: &Tuple, _rid: Rid, _txn: TxnId) -> bool {
        self.index.remove(self.encode_key(key))
    }

    /// Appends every rid matching `key` to `rids`.
    pub fn scan_key(&self, key: &Tuple, rids: &mut Vec<Rid>, _txn: TxnId) {
        if let Some(rid) = self.index.get_value(self.encode_key(key)) {
            rids.push(rid);
        }
    }

    /// Forward iterator over the whole index.
    pub fn iter(&self) -> IndexIterator<{ INDEX_TOMBSTONES }> {
        self.index.iter()
    }

    /// Packs an integer key tuple into the tree's key space.
    ///
    /// One column packs directly; two columns pack as (high, low) halves.
    /// Order is preserved for the single-column case the optimizer targets.
    fn encode_key(&self, key: &Tuple) -> IndexKey {
        let values = key.values(&self.key_schema);
        match values.as_slice() {
            [Value::Integer(a)] => *a as IndexKey,
            [Value::Integer(a), Value::Integer(b)] => {
                ((*a as i64) << 32) | (*b as u32 as i64)
            }
            other => panic!("unsupported index key shape: {other:?}"),
        }
    }
}

/// The catalog of tables and indexes.
pub struct Catalog {
    bpm: Arc<BufferPoolManager>,
    tables: RwLock<HashMap<Oid, Arc<TableInfo>>>,
    table_names: RwLock<HashMap<String, Oid>>,
    indexes: RwLock<HashMap<Oid, Arc<IndexInfo>>>,
    table_indexes: RwLock<HashMap<String, Vec<Oid>>>,
    next_oid: AtomicU32,
}

impl Catalog {
    /// Creates an empty catalog over the given buffer pool.
    pub fn new(bpm: Arc<BufferPoolManager>) -> Self {
        Self {
            bpm,
            tables: RwLock::new(HashMap::new()),
            table_names: RwLock::new(HashMap::new()),
            indexes: RwLock::new(HashMap::new()),
            table_indexes: RwLock::new(HashMap::new()),
            next_oid: AtomicU32::new(0),
        }
    }

    /// Creates a table. Returns `None` if the name is taken or the heap
    /// cannot be allocated.
    pub fn create_table(&self, name: &str, schema: Schema) -> Option<Arc<TableInfo>> {
        let mut names = self.table_names.write();
        if names.contains_key(name) {
            return None;
        }
        let oid = Oid::new(self.next_oid.fetch_add(1, Ordering::Relaxed));
        let table = TableHeap::new(Arc::clone(&self.bpm)).ok()?;
        let info = Arc::new(TableInfo {
            oid,
            name: name.to_string(),
            schema,
            table,
        });
        names.insert(name.to_string(), oid);
        self.tables.write().insert(oid, Arc::clone(&info));
        self.table_indexes.write().entry(name.to_string()).or_default();
        debug!(table = name, oid = %oid, "created table");
        Some(info)
    }

    /// Looks up a table by oid.
    pub fn get_table(&self, oid: Oid) -> Option<Arc<TableInfo>> {
        self.tables.read().get(&oid).cloned()
    }

    /// Looks up a table by name.
    pub fn get_table_by_name(&self, name: &str) -> Option<Arc<TableInfo>> {
        let oid = *self.table_names.read().get(name)?;
        self.get_table(oid)
    }

    /// Creates an index over `table_name`, backfilling it from the live
    /// tuples already in the heap.
    pub fn create_index(
        &self,
        index_name: &str,
        table_name: &str,
        key_schema: Schema,
        key_attrs: Vec<usize>,
    ) -> Option<Arc<IndexInfo>> {
        let table_info = self.get_table_by_name(table_name)?;
        let oid = Oid::new(self.next_oid.fetch_add(1, Ordering::Relaxed));
        let index = BPlusTree::new(
            Arc::clone(&self.bpm),
            INDEX_LEAF_MAX,
            INDEX_INTERNAL_MAX,
        )
        .ok()?;

        let info = Arc::new(IndexInfo {
            oid,
            name: index_name.to_string(),
            table_name: table_name.to_string(),
            key_schema,
            key_attrs,
            index,
        });

        for (rid, meta, tuple) in table_info.table.iter() {
            if meta.is_deleted {
                continue;
            }
            let key = tuple.key_from_tuple(
                &table_info.schema,
                &info.key_schema,
                &info.key_attrs,
            );
            info.insert_entry(&key, rid, TxnId::INVALID);
        }

        self.indexes.write().insert(oid, Arc::clone(&info));
        self.table_indexes
            .write()
            .entry(table_name.to_string())
            .or_default()
            .push(oid);
        debug!(index = index_name, table = table_name, oid = %oid, "created index");
        Some(info)
    }

    /// Looks up an index by oid.
    pub fn get_index(&self, oid: Oid) -> Option<Arc<IndexInfo>> {
        self.indexes.read().get(&oid).cloned()
    }

    /// Every index defined on `table_name`.
    pub fn get_table_indexes(&self, table_name: &str) -> Vec<Arc<IndexInfo>> {
        let oids = self
            .table_indexes
            .read()
            .get(table_name)
            .cloned()
            .unwrap_or_default();
        let indexes = self.indexes.read();
        oids.iter().filter_map(|oid| indexes.get(oid).cloned()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;
    use crate::tuple::TupleMeta;
    use crate::value::DataType;
    use vellum_common::types::PageId;
    use vellum_storage::disk::MemoryDiskManager;

    fn setup() -> Catalog {
        let disk = Arc::new(MemoryDiskManager::new());
        let bpm = Arc::new(BufferPoolManager::with_pool_size(64, disk).unwrap());
        Catalog::new(bpm)
    }

    fn two_int_schema() -> Schema {
        Schema::new(vec![
            Column::new("a", DataType::Integer),
            Column::new("b", DataType::Integer),
        ])
    }

    #[test]
    fn table_lifecycle() {
        let catalog = setup();
        let info = catalog.create_table("t", two_int_schema()).unwrap();
        assert_eq!(catalog.get_table(info.oid).unwrap().name, "t");
        assert!(catalog.get_table_by_name("t").is_some());
        // Duplicate names are rejected.
        assert!(catalog.create_table("t", two_int_schema()).is_none());
    }

    #[test]
    fn index_backfills_from_existing_tuples() {
        let catalog = setup();
        let info = catalog.create_table("t", two_int_schema()).unwrap();
        for i in 0..10 {
            let tuple = Tuple::from_values(
                &[Value::Integer(i), Value::Integer(i * 10)],
                &info.schema,
            );
            info.table.insert_tuple(TupleMeta::default(), &tuple).unwrap();
        }

        let key_schema = Schema::new(vec![Column::new("a", DataType::Integer)]);
        let index = catalog
            .create_index("t_a", "t", key_schema.clone(), vec![0])
            .unwrap();

        let mut rids = Vec::new();
        let key = Tuple::from_values(&[Value::Integer(4)], &key_schema);
        index.scan_key(&key, &mut rids, TxnId::INVALID);
        assert_eq!(rids.len(), 1);

        let (_, tuple) = info.table.get_tuple(rids[0]).unwrap();
        assert_eq!(tuple.value_at(&info.schema, 1), Value::Integer(40));
    }

    #[test]
    fn index_entry_delete_and_reinsert() {
        let catalog = setup();
        catalog.create_table("t", two_int_schema()).unwrap();
        let key_schema = Schema::new(vec![Column::new("a", DataType::Integer)]);
        let index = catalog
            .create_index("t_a", "t", key_schema.clone(), vec![0])
            .unwrap();

        let key = Tuple::from_values(&[Value::Integer(1)], &key_schema);
        let rid = Rid::new(PageId::new(7), 3);
        assert!(index.insert_entry(&key, rid, TxnId::INVALID));
        assert!(index.delete_entry(&key, rid, TxnId::INVALID));

        let mut rids = Vec::new();
        index.scan_key(&key, &mut rids, TxnId::INVALID);
        assert!(rids.is_empty());

        assert!(index.insert_entry(&key, rid, TxnId::INVALID));
        index.scan_key(&key, &mut rids, TxnId::INVALID);
        assert_eq!(rids, vec![rid]);
    }

    #[test]
    fn table_indexes_enumerates_all() {
        let catalog = setup();
        catalog.create_table("t", two_int_schema()).unwrap();
        let ks = Schema::new(vec![Column::new("a", DataType::Integer)]);
        catalog.create_index("i1", "t", ks.clone(), vec![0]).unwrap();
        catalog.create_index("i2", "t", ks, vec![1]).unwrap();

        let indexes = catalog.get_table_indexes("t");
        assert_eq!(indexes.len(), 2);
        assert!(catalog.get_table_indexes("missing").is_empty());
    }
}
