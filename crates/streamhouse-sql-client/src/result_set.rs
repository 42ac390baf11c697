//! Materialized result cache for one statement.
//!
//! Holds two live views over the same stream of change events:
//!
//! - **Table**: the compacted current state (upserts added, retracts removed)
//! - **Changelog**: every retained event, shown with a leading `Operation`
//!   column
//!
//! Switching between them is a flag flip; nothing is copied or recomputed.
//! All state sits behind one `RwLock`. Writers (`append`, `set_mode`) take it
//! exclusively, readers and cursors take it shared for a single call.

use std::num::NonZeroUsize;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::cursor::{decorate, ResultCursor};
use crate::dual_list::{EvictingDualList, View};
use crate::types::Row;

/// Name of the synthetic first column in changelog mode.
pub const OPERATION_COLUMN: &str = "Operation";

pub(crate) struct ResultSetState {
    pub(crate) list: EvictingDualList,
    table_mode: bool,
}

impl ResultSetState {
    fn view(&self) -> View {
        if self.table_mode {
            View::Table
        } else {
            View::Changelog
        }
    }
}

/// Bounded, concurrently readable cache of a statement's result rows.
pub struct MaterializedResultSet {
    headers: Vec<String>,
    state: Arc<RwLock<ResultSetState>>,
}

impl MaterializedResultSet {
    /// Create an empty result set in table mode.
    ///
    /// `headers` fixes the column count for the lifetime of the set.
    pub fn new(headers: Vec<String>, max_capacity: NonZeroUsize) -> Self {
        Self {
            headers,
            state: Arc::new(RwLock::new(ResultSetState {
                list: EvictingDualList::new(max_capacity),
                table_mode: true,
            })),
        }
    }

    /// Append rows in order.
    ///
    /// Rows whose field count differs from the header count are skipped.
    /// Returns `true` only if every row was accepted.
    pub fn append<I>(&self, rows: I) -> bool
    where
        I: IntoIterator<Item = Row>,
    {
        let mut state = self.state.write();
        let mut rejected = 0usize;
        for row in rows {
            if row.len() != self.headers.len() {
                rejected += 1;
                continue;
            }
            state.list.append(row);
        }

        if rejected > 0 {
            debug!(
                rejected,
                columns = self.headers.len(),
                "Skipped rows with mismatched column count"
            );
        }
        rejected == 0
    }

    /// `true` shows the table view, `false` the changelog.
    pub fn set_mode(&self, table_mode: bool) {
        self.state.write().table_mode = table_mode;
    }

    /// Flip between table and changelog mode; returns the new mode.
    pub fn toggle_mode(&self) -> bool {
        let mut state = self.state.write();
        state.table_mode = !state.table_mode;
        state.table_mode
    }

    pub fn is_table_mode(&self) -> bool {
        self.state.read().table_mode
    }

    /// Row count of the active view.
    pub fn size(&self) -> usize {
        let state = self.state.read();
        state.list.len(state.view())
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Column names of the active view; changelog mode prepends
    /// [`OPERATION_COLUMN`].
    pub fn headers(&self) -> Vec<String> {
        if self.is_table_mode() {
            self.headers.clone()
        } else {
            let mut headers = Vec::with_capacity(self.headers.len() + 1);
            headers.push(OPERATION_COLUMN.to_string());
            headers.extend(self.headers.iter().cloned());
            headers
        }
    }

    /// Cursor at the front (or back) of the active view. The view is fixed
    /// when the cursor is created.
    pub fn iterator(&self, from_back: bool) -> ResultCursor {
        let view = self.state.read().view();
        ResultCursor::new(Arc::clone(&self.state), view, from_back)
    }

    /// Visit every row of the active view front to back with its index.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(usize, &Row),
    {
        for (index, row) in self.iterator(false).enumerate() {
            f(index, &row);
        }
    }

    /// Row at `index` in the active view.
    pub fn row_at(&self, index: usize) -> Option<Row> {
        let state = self.state.read();
        let view = state.view();
        let row = state.list.rows(view).nth(index)?;
        Some(decorate(view, row))
    }

    /// Up to `limit` rows of the active view starting at `offset`.
    pub fn rows(&self, offset: usize, limit: usize) -> Vec<Row> {
        let state = self.state.read();
        let view = state.view();
        state
            .list
            .rows(view)
            .skip(offset)
            .take(limit)
            .map(|row| decorate(view, row))
            .collect()
    }

    /// Widest rendering per column of the active view, header included.
    pub fn max_column_widths(&self) -> Vec<usize> {
        let state = self.state.read();
        let view = state.view();

        let mut widths: Vec<usize> = Vec::with_capacity(self.headers.len() + 1);
        if view == View::Changelog {
            widths.push(OPERATION_COLUMN.chars().count());
        }
        widths.extend(self.headers.iter().map(|h| h.chars().count()));

        let offset = usize::from(view == View::Changelog);
        for row in state.list.rows(view) {
            if offset == 1 {
                widths[0] = widths[0].max(row.operation.as_str().len());
            }
            for (i, field) in row.fields.iter().enumerate() {
                let width = &mut widths[i + offset];
                *width = (*width).max(field.display_width());
            }
        }
        widths
    }

    /// Configured changelog capacity.
    pub fn capacity(&self) -> usize {
        self.state.read().list.max_capacity()
    }

    pub fn changelog_len(&self) -> usize {
        self.state.read().list.len(View::Changelog)
    }

    pub fn table_len(&self) -> usize {
        self.state.read().list.len(View::Table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Field, FieldType, OperationKind};

    fn int_row(op: OperationKind, v: i64) -> Row {
        Row::new(op, vec![Field::atomic(FieldType::Integer, v.to_string())])
    }

    fn single_column(capacity: usize) -> MaterializedResultSet {
        MaterializedResultSet::new(
            vec!["value".to_string()],
            NonZeroUsize::new(capacity).unwrap(),
        )
    }

    fn collect(rs: &MaterializedResultSet) -> Vec<Vec<String>> {
        let mut rows = Vec::new();
        rs.for_each(|_, row| rows.push(row.rendered()));
        rows
    }

    #[test]
    fn test_update_scenario_without_eviction() {
        let rs = single_column(100);
        assert!(rs.append((0..10).map(|v| int_row(OperationKind::Insert, v))));
        assert_eq!(rs.size(), 10);

        assert!(rs.append([
            int_row(OperationKind::UpdateBefore, 5),
            int_row(OperationKind::UpdateAfter, 99),
        ]));
        assert_eq!(rs.size(), 10);

        let table: Vec<String> = collect(&rs).into_iter().map(|r| r[0].clone()).collect();
        assert!(!table.contains(&"5".to_string()));
        assert!(table.contains(&"99".to_string()));

        rs.set_mode(false);
        let changelog = collect(&rs);
        assert_eq!(changelog.len(), 12);
        assert_eq!(changelog[10], vec!["-U", "5"]);
        assert_eq!(changelog[11], vec!["+U", "99"]);
    }

    #[test]
    fn test_update_scenario_at_capacity_ten() {
        let rs = single_column(10);
        rs.append((0..10).map(|v| int_row(OperationKind::Insert, v)));
        rs.append([
            int_row(OperationKind::UpdateBefore, 5),
            int_row(OperationKind::UpdateAfter, 99),
        ]);

        // the two oldest inserts were evicted together with their table rows
        assert_eq!(rs.changelog_len(), 10);
        let table: Vec<String> = collect(&rs).into_iter().map(|r| r[0].clone()).collect();
        assert_eq!(table, vec!["2", "3", "4", "6", "7", "8", "9", "99"]);
    }

    #[test]
    fn test_capacity_one_scenario() {
        let rs = single_column(1);
        rs.append([int_row(OperationKind::Insert, 1)]);
        rs.append([
            int_row(OperationKind::UpdateBefore, 1),
            int_row(OperationKind::Insert, 2),
        ]);

        assert_eq!(rs.size(), 1);
        assert_eq!(collect(&rs), vec![vec!["2"]]);
        assert_eq!(rs.changelog_len(), 1);
        rs.set_mode(false);
        assert_eq!(collect(&rs), vec![vec!["+I", "2"]]);
    }

    #[test]
    fn test_schema_mismatch_rows_are_dropped() {
        let rs = MaterializedResultSet::new(
            vec!["a".to_string(), "b".to_string()],
            NonZeroUsize::new(10).unwrap(),
        );
        let good = Row::insert(vec![Field::varchar("x"), Field::varchar("y")]);
        let short = Row::insert(vec![Field::varchar("x")]);
        let long = Row::insert(vec![
            Field::varchar("x"),
            Field::varchar("y"),
            Field::varchar("z"),
        ]);

        assert!(!rs.append(vec![good.clone(), short, long]));
        assert_eq!(rs.size(), 1);
        assert_eq!(rs.changelog_len(), 1);
        assert!(rs.append(vec![good]));
        assert_eq!(rs.size(), 1);
        assert_eq!(rs.changelog_len(), 2);
    }

    #[test]
    fn test_headers_follow_mode() {
        let rs = MaterializedResultSet::new(
            vec!["id".to_string(), "name".to_string()],
            NonZeroUsize::new(10).unwrap(),
        );
        assert!(rs.is_table_mode());
        assert_eq!(rs.headers(), vec!["id", "name"]);

        assert!(!rs.toggle_mode());
        assert_eq!(rs.headers(), vec!["Operation", "id", "name"]);

        assert!(rs.toggle_mode());
        assert_eq!(rs.headers(), vec!["id", "name"]);
    }

    #[test]
    fn test_mode_round_trip_preserves_size() {
        let rs = single_column(10);
        rs.append([
            int_row(OperationKind::Insert, 1),
            int_row(OperationKind::Insert, 2),
            int_row(OperationKind::Delete, 1),
        ]);
        let table_size = rs.size();
        rs.toggle_mode();
        assert_eq!(rs.size(), 3);
        rs.toggle_mode();
        assert_eq!(rs.size(), table_size);
        assert_eq!(table_size, 1);
    }

    #[test]
    fn test_max_column_widths() {
        let rs = MaterializedResultSet::new(
            vec!["id".to_string(), "description".to_string()],
            NonZeroUsize::new(10).unwrap(),
        );
        rs.append([
            Row::insert(vec![
                Field::atomic(FieldType::BigInt, "123456"),
                Field::varchar("short"),
            ]),
            Row::insert(vec![
                Field::atomic(FieldType::BigInt, "7"),
                Field::varchar("a considerably longer text"),
            ]),
        ]);

        assert_eq!(rs.max_column_widths(), vec![6, 26]);
        rs.set_mode(false);
        assert_eq!(rs.max_column_widths(), vec![9, 6, 26]);
    }

    #[test]
    fn test_row_at_and_rows() {
        let rs = single_column(10);
        rs.append((0..5).map(|v| int_row(OperationKind::Insert, v)));

        assert_eq!(rs.row_at(3).unwrap().rendered(), vec!["3"]);
        assert!(rs.row_at(5).is_none());

        let page: Vec<Vec<String>> = rs.rows(1, 2).iter().map(|r| r.rendered()).collect();
        assert_eq!(page, vec![vec!["1"], vec!["2"]]);
        assert!(rs.rows(10, 2).is_empty());

        rs.set_mode(false);
        assert_eq!(rs.row_at(0).unwrap().rendered(), vec!["+I", "0"]);
    }

    #[test]
    fn test_for_each_indices() {
        let rs = single_column(10);
        rs.append((0..3).map(|v| int_row(OperationKind::Insert, v)));
        let mut indices = Vec::new();
        rs.for_each(|i, _| indices.push(i));
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_concurrent_append_and_read() {
        let rs = Arc::new(single_column(50));
        let writer = {
            let rs = Arc::clone(&rs);
            std::thread::spawn(move || {
                for v in 0..500 {
                    rs.append([int_row(OperationKind::Insert, v)]);
                }
            })
        };

        for _ in 0..200 {
            let mut cursor = rs.iterator(false);
            let mut seen = 0;
            while cursor.next().is_some() {
                seen += 1;
                assert!(seen <= 500);
            }
            assert!(rs.size() <= 50);
        }
        writer.join().unwrap();

        assert_eq!(rs.size(), 50);
        assert_eq!(rs.capacity(), 50);
        assert_eq!(rs.table_len(), rs.changelog_len());
    }
}
