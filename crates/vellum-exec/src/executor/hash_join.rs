//! GRACE hash join.
//!
//! Both inputs are first partitioned by key hash into chains of
//! intermediate-result pages, so neither side has to fit in memory at once.
//! Per partition, the right side builds an in-memory hash table and the
//! left side probes it. Left joins emit null-padded rows for unmatched
//! probe tuples. Spill pages are deleted on re-init and drop.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tracing::debug;
use vellum_common::constants::{BATCH_SIZE, HASH_JOIN_PARTITIONS};
use vellum_common::types::{PageId, Rid};
use vellum_storage::page::IntermediateView;

use crate::plan::{HashJoinPlan, JoinType};
use crate::schema::Schema;
use crate::tuple::Tuple;
use crate::value::Value;

use super::{Executor, ExecutorContext};

/// Partitioned, disk-spilling hash join. Inner and left joins only.
pub struct HashJoinExecutor {
    ctx: Arc<ExecutorContext>,
    plan: HashJoinPlan,
    left: Box<dyn Executor>,
    right: Box<dyn Executor>,

    /// Spill chains, one per partition and side.
    left_partitions: Vec<Vec<PageId>>,
    right_partitions: Vec<Vec<PageId>>,

    current_partition: usize,
    hash_table: HashMap<Vec<Value>, Vec<Tuple>>,
    probe_tuples: Vec<Tuple>,
    probe_idx: usize,
    current_matches: Vec<Tuple>,
    match_idx: usize,
    matched: bool,
}

impl HashJoinExecutor {
    /// Creates a hash join.
    ///
    /// # Panics
    ///
    /// Panics for join types other than inner and left.
    pub fn new(
        ctx: Arc<ExecutorContext>,
        plan: HashJoinPlan,
        left: Box<dyn Executor>,
        right: Box<dyn Executor>,
    ) -> Self {
        assert!(
            matches!(plan.join_type, JoinType::Inner | JoinType::Left),
            "join type {:?} not supported",
            plan.join_type
        );
        Self {
            ctx,
            plan,
            left,
            right,
            left_partitions: vec![Vec::new(); HASH_JOIN_PARTITIONS],
            right_partitions: vec![Vec::new(); HASH_JOIN_PARTITIONS],
            current_partition: 0,
            hash_table: HashMap::new(),
            probe_tuples: Vec::new(),
            probe_idx: 0,
            current_matches: Vec::new(),
            match_idx: 0,
            matched: false,
        }
    }

    fn partition_of(key: &[Value]) -> usize {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % HASH_JOIN_PARTITIONS
    }

    fn left_key(&self, tuple: &Tuple) -> Vec<Value> {
        self.plan
            .left_keys
            .iter()
            .map(|expr| expr.evaluate(tuple, self.left.output_schema()))
            .collect()
    }

    fn right_key(&self, tuple: &Tuple) -> Vec<Value> {
        self.plan
            .right_keys
            .iter()
            .map(|expr| expr.evaluate(tuple, self.right.output_schema()))
            .collect()
    }

    /// Appends a tuple to a partition's spill chain, growing it by a page
    /// when the tail fills up.
    fn append_to_partition(&self, partition: &mut Vec<PageId>, tuple: &Tuple) {
        if let Some(&last) = partition.last() {
            let mut guard = self
                .ctx
                .bpm
                .write_page(last)
                .expect("spill page stays reachable");
            let mut page = IntermediateView::new(guard.data_mut());
            if page.insert_tuple(tuple.data()) {
                return;
            }
        }

        let mut guard = self.ctx.bpm.new_page().expect("spill page allocation");
        let page_id = guard.page_id();
        let mut page = IntermediateView::init(guard.data_mut());
        let fits = page.insert_tuple(tuple.data());
        assert!(fits, "tuple exceeds a whole spill page");
        partition.push(page_id);
    }

    /// Drains both children into the partition spill chains.
    fn partition_inputs(&mut self) {
        let mut tuples = Vec::new();
        let mut rids = Vec::new();

        while self.left.next(&mut tuples, &mut rids, BATCH_SIZE) {
            for tuple in &tuples {
                let key = self.left_key(tuple);
                let idx = Self::partition_of(&key);
                let mut chain = std::mem::take(&mut self.left_partitions[idx]);
                self.append_to_partition(&mut chain, tuple);
                self.left_partitions[idx] = chain;
            }
        }
        while self.right.next(&mut tuples, &mut rids, BATCH_SIZE) {
            for tuple in &tuples {
                let key = self.right_key(tuple);
                let idx = Self::partition_of(&key);
                let mut chain = std::mem::take(&mut self.right_partitions[idx]);
                self.append_to_partition(&mut chain, tuple);
                self.right_partitions[idx] = chain;
            }
        }
        debug!(
            partitions = HASH_JOIN_PARTITIONS,
            "hash join partitioning complete"
        );
    }

    fn load_partition(&self, chain: &[PageId]) -> Vec<Tuple> {
        let mut tuples = Vec::new();
        for &page_id in chain {
            let guard = self
                .ctx
                .bpm
                .read_page(page_id)
                .expect("spill page stays reachable");
            let page = IntermediateView::new(guard.data());
            for i in 0..page.num_tuples() {
                tuples.push(Tuple::from_bytes(page.tuple(i).to_vec()));
            }
        }
        tuples
    }

    /// Builds the hash table for the next partition with probe input.
    fn prepare_next_partition(&mut self) -> bool {
        while self.current_partition < HASH_JOIN_PARTITIONS {
            let idx = self.current_partition;
            self.current_partition += 1;

            self.hash_table.clear();
            let build_tuples = self.load_partition(&self.right_partitions[idx]);
            for tuple in build_tuples {
                let key = self.right_key(&tuple);
                self.hash_table.entry(key).or_default().push(tuple);
            }

            self.probe_tuples = self.load_partition(&self.left_partitions[idx]);
            if !self.probe_tuples.is_empty() {
                self.probe_idx = 0;
                self.match_idx = 0;
                self.matched = false;
                self.current_matches.clear();
                return true;
            }
        }
        false
    }

    fn cleanup_partitions(&mut self) {
        for chain in self
            .left_partitions
            .iter_mut()
            .chain(self.right_partitions.iter_mut())
        {
            for page_id in chain.drain(..) {
                let _ = self.ctx.bpm.delete_page(page_id);
            }
        }
    }

    fn join_row(&self, probe: &Tuple, build: Option<&Tuple>) -> Tuple {
        let mut values = probe.values(self.left.output_schema());
        match build {
            Some(build) => values.extend(build.values(self.right.output_schema())),
            None => values.extend(
                std::iter::repeat(Value::Null)
                    .take(self.right.output_schema().column_count()),
            ),
        }
        Tuple::from_values(&values, &self.plan.output_schema)
    }
}

impl Executor for HashJoinExecutor {
    fn init(&mut self) {
        self.left.init();
        self.right.init();

        self.cleanup_partitions();
        self.partition_inputs();

        self.current_partition = 0;
        self.hash_table.clear();
        self.probe_tuples.clear();
        self.probe_idx = 0;
        self.current_matches.clear();
        self.match_idx = 0;
        self.matched = false;

        self.prepare_next_partition();
    }

    fn next(&mut self, tuples: &mut Vec<Tuple>, rids: &mut Vec<Rid>, batch_size: usize) -> bool {
        tuples.clear();
        rids.clear();

        while tuples.len() < batch_size {
            if self.probe_idx >= self.probe_tuples.len() {
                if !self.prepare_next_partition() {
                    break;
                }
            }

            let probe_tuple = self.probe_tuples[self.probe_idx].clone();

            if self.match_idx == 0 {
                let key = self.left_key(&probe_tuple);
                // A key with NULLs never matches anything.
                if !key.iter().any(Value::is_null) {
                    if let Some(matches) = self.hash_table.get(&key) {
                        self.current_matches = matches.clone();
                        self.matched = true;
                    } else {
                        self.current_matches.clear();
                        self.matched = false;
                    }
                } else {
                    self.current_matches.clear();
                    self.matched = false;
                }
            }

            if self.match_idx < self.current_matches.len() {
                let build_tuple = self.current_matches[self.match_idx].clone();
                tuples.push(self.join_row(&probe_tuple, Some(&build_tuple)));
                rids.push(Rid::INVALID);
                self.match_idx += 1;
            } else {
                if !self.matched && self.plan.join_type == JoinType::Left {
                    tuples.push(self.join_row(&probe_tuple, None));
                    rids.push(Rid::INVALID);
                }
                self.probe_idx += 1;
                self.match_idx = 0;
                self.matched = false;
            }
        }

        !tuples.is_empty()
    }

    fn output_schema(&self) -> &Schema {
        &self.plan.output_schema
    }
}

impl Drop for HashJoinExecutor {
    fn drop(&mut self) {
        self.cleanup_partitions();
    }
}
