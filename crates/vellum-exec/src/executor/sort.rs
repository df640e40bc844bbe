//! External merge sort.
//!
//! Initial runs are single intermediate-result pages of sorted tuples; runs
//! are then merged pairwise into longer page chains until one remains. The
//! operator owns its intermediate pages and deletes them on re-init and
//! drop.

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::debug;
use vellum_common::constants::{BATCH_SIZE, PAGE_SIZE};
use vellum_common::types::{PageId, Rid};
use vellum_storage::page::{IntermediateView, INTERMEDIATE_HEADER_SIZE};

use crate::plan::SortPlan;
use crate::schema::Schema;
use crate::tuple::Tuple;
use crate::value::Value;

use super::{compare_sort_keys, generate_sort_key, Executor, ExecutorContext};

/// A sorted sequence of intermediate pages.
type Run = Vec<PageId>;

/// Cursor over one run.
struct RunCursor {
    pages: Run,
    page_idx: usize,
    tuple_idx: usize,
}

impl RunCursor {
    fn new(pages: Run) -> Self {
        Self {
            pages,
            page_idx: 0,
            tuple_idx: 0,
        }
    }

    fn next(&mut self, ctx: &ExecutorContext) -> Option<Tuple> {
        loop {
            let &page_id = self.pages.get(self.page_idx)?;
            let guard = ctx.bpm.read_page(page_id).ok()?;
            let page = IntermediateView::new(guard.data());
            if self.tuple_idx < page.num_tuples() {
                let tuple = Tuple::from_bytes(page.tuple(self.tuple_idx).to_vec());
                self.tuple_idx += 1;
                return Some(tuple);
            }
            self.page_idx += 1;
            self.tuple_idx = 0;
        }
    }
}

/// Two-way external merge sort.
pub struct ExternalMergeSortExecutor {
    ctx: Arc<ExecutorContext>,
    plan: SortPlan,
    child: Box<dyn Executor>,
    final_run: Option<Run>,
    cursor: Option<RunCursor>,
}

impl ExternalMergeSortExecutor {
    /// Creates an external merge sort.
    pub fn new(ctx: Arc<ExecutorContext>, plan: SortPlan, child: Box<dyn Executor>) -> Self {
        Self {
            ctx,
            plan,
            child,
            final_run: None,
            cursor: None,
        }
    }

    fn sort_key(&self, tuple: &Tuple) -> Vec<Value> {
        generate_sort_key(tuple, &self.plan.order_bys, self.child.output_schema())
    }

    /// Writes `tuples` (already sorted) as a single-page run.
    fn write_run(&self, tuples: &[Tuple]) -> Run {
        let mut guard = self.ctx.bpm.new_page().expect("run page allocation");
        let page_id = guard.page_id();
        let mut page = IntermediateView::init(guard.data_mut());
        for tuple in tuples {
            let fits = page.insert_tuple(tuple.data());
            assert!(fits, "tuple fits in an initial run page by construction");
        }
        vec![page_id]
    }

    /// Merges two runs into a fresh page chain, deleting the inputs.
    fn merge_runs(&self, a: Run, b: Run) -> Run {
        let mut merged = Vec::new();
        let mut out_guard = self.ctx.bpm.new_page().expect("merge page allocation");
        merged.push(out_guard.page_id());
        IntermediateView::init(out_guard.data_mut());

        let mut cursor_a = RunCursor::new(a.clone());
        let mut cursor_b = RunCursor::new(b.clone());
        let mut head_a = cursor_a.next(&self.ctx);
        let mut head_b = cursor_b.next(&self.ctx);
        let mut key_a = head_a.as_ref().map(|t| self.sort_key(t));
        let mut key_b = head_b.as_ref().map(|t| self.sort_key(t));

        while head_a.is_some() || head_b.is_some() {
            let take_a = match (&key_a, &key_b) {
                (Some(ka), Some(kb)) => {
                    compare_sort_keys(ka, kb, &self.plan.order_bys) != Ordering::Greater
                }
                (Some(_), None) => true,
                (None, _) => false,
            };

            let tuple = if take_a {
                let t = head_a.take().expect("take side has a head");
                head_a = cursor_a.next(&self.ctx);
                key_a = head_a.as_ref().map(|t| self.sort_key(t));
                t
            } else {
                let t = head_b.take().expect("take side has a head");
                head_b = cursor_b.next(&self.ctx);
                key_b = head_b.as_ref().map(|t| self.sort_key(t));
                t
            };

            let inserted = {
                let mut page = IntermediateView::new(out_guard.data_mut());
                page.insert_tuple(tuple.data())
            };
            if !inserted {
                drop(out_guard);
                out_guard = self.ctx.bpm.new_page().expect("merge page allocation");
                merged.push(out_guard.page_id());
                let mut page = IntermediateView::init(out_guard.data_mut());
                let fits = page.insert_tuple(tuple.data());
                assert!(fits, "tuple fits in a fresh page");
            }
        }
        drop(out_guard);

        for page_id in a.into_iter().chain(b) {
            let _ = self.ctx.bpm.delete_page(page_id);
        }
        merged
    }

    fn delete_final_run(&mut self) {
        if let Some(run) = self.final_run.take() {
            for page_id in run {
                let _ = self.ctx.bpm.delete_page(page_id);
            }
        }
        self.cursor = None;
    }
}

impl Executor for ExternalMergeSortExecutor {
    fn init(&mut self) {
        self.child.init();
        self.delete_final_run();

        // Phase 1: cut the input into sorted single-page runs.
        let mut runs: Vec<Run> = Vec::new();
        let mut pending: Vec<Tuple> = Vec::new();
        let mut pending_bytes = 0usize;

        let create_run =
            |tuples: &mut Vec<Tuple>, bytes: &mut usize, runs: &mut Vec<Run>, this: &Self| {
                if tuples.is_empty() {
                    return;
                }
                let mut entries: Vec<(Vec<Value>, Tuple)> = tuples
                    .drain(..)
                    .map(|t| (this.sort_key(&t), t))
                    .collect();
                entries.sort_by(|(ka, _), (kb, _)| {
                    compare_sort_keys(ka, kb, &this.plan.order_bys)
                });
                let sorted: Vec<Tuple> = entries.into_iter().map(|(_, t)| t).collect();
                runs.push(this.write_run(&sorted));
                *bytes = 0;
            };

        let mut batch = Vec::new();
        let mut rids = Vec::new();
        while self.child.next(&mut batch, &mut rids, BATCH_SIZE) {
            for tuple in batch.drain(..) {
                let needed = IntermediateView::<&[u8]>::space_needed(tuple.data().len());
                if INTERMEDIATE_HEADER_SIZE + pending_bytes + needed > PAGE_SIZE {
                    create_run(&mut pending, &mut pending_bytes, &mut runs, self);
                }
                pending_bytes += needed;
                pending.push(tuple);
            }
        }
        create_run(&mut pending, &mut pending_bytes, &mut runs, self);
        debug!(initial_runs = runs.len(), "sort run formation complete");

        // Phase 2: merge runs pairwise until one remains.
        while runs.len() > 1 {
            let mut next_runs = Vec::new();
            let mut iter = runs.into_iter();
            while let Some(a) = iter.next() {
                match iter.next() {
                    Some(b) => next_runs.push(self.merge_runs(a, b)),
                    None => next_runs.push(a),
                }
            }
            runs = next_runs;
        }

        if let Some(run) = runs.pop() {
            self.cursor = Some(RunCursor::new(run.clone()));
            self.final_run = Some(run);
        }
    }

    fn next(&mut self, tuples: &mut Vec<Tuple>, rids: &mut Vec<Rid>, batch_size: usize) -> bool {
        tuples.clear();
        rids.clear();

        let Some(cursor) = self.cursor.as_mut() else {
            return false;
        };
        while tuples.len() < batch_size {
            let Some(tuple) = cursor.next(&self.ctx) else {
                break;
            };
            rids.push(tuple.rid());
            tuples.push(tuple);
        }

        !tuples.is_empty()
    }

    fn output_schema(&self) -> &Schema {
        &self.plan.output_schema
    }
}

impl Drop for ExternalMergeSortExecutor {
    fn drop(&mut self) {
        self.delete_final_run();
    }
}
