//! Bidirectional cursor over one view of a [`MaterializedResultSet`].
//!
//! A cursor stores a `(slot, generation)` position, never a reference, and
//! takes the result set's read lock for the duration of each call only.
//! If the element under the cursor is evicted or retracted, the generation
//! stops matching and the cursor reports itself as past the end.
//!
//! [`MaterializedResultSet`]: crate::MaterializedResultSet

use std::sync::Arc;

use parking_lot::RwLock;

use crate::dual_list::{SlotRef, View};
use crate::result_set::ResultSetState;
use crate::types::Row;

/// Cursor over either the table or the changelog view.
///
/// Forward iteration is available through [`Iterator`]; `next()` returns
/// the current row and then advances.
pub struct ResultCursor {
    state: Arc<RwLock<ResultSetState>>,
    view: View,
    position: Option<SlotRef>,
}

impl ResultCursor {
    pub(crate) fn new(state: Arc<RwLock<ResultSetState>>, view: View, from_back: bool) -> Self {
        let position = {
            let guard = state.read();
            if from_back {
                guard.list.back(view)
            } else {
                guard.list.front(view)
            }
        };
        Self {
            state,
            view,
            position,
        }
    }

    /// Whether this cursor decorates rows with the operation column.
    pub fn is_changelog(&self) -> bool {
        self.view == View::Changelog
    }

    /// Row at the current position, or `None` past either end.
    pub fn value(&self) -> Option<Row> {
        let guard = self.state.read();
        self.value_locked(&guard)
    }

    /// Return the current row, then step backwards. Stepping before the
    /// first row leaves the cursor past the end for good.
    pub fn prev(&mut self) -> Option<Row> {
        let guard = self.state.read();
        let value = self.value_locked(&guard);
        if let Some(position) = self.position {
            self.position = guard.list.prev(self.view, position);
        }
        value
    }

    /// `true` once the cursor has moved past either boundary (or its row
    /// was removed underneath it).
    pub fn at_end(&self) -> bool {
        let guard = self.state.read();
        self.live_position(&guard).is_none()
    }

    /// Move `steps` rows forward (positive) or backward (negative) and
    /// return the row landed on.
    ///
    /// Movement stops on the first or last row when there are fewer rows
    /// left than requested. A cursor already past the end stays there.
    pub fn move_by(&mut self, steps: isize) -> Option<Row> {
        let guard = self.state.read();
        let Some(mut position) = self.live_position(&guard) else {
            self.position = None;
            return None;
        };

        for _ in 0..steps.unsigned_abs() {
            let neighbour = if steps > 0 {
                guard.list.next(self.view, position)
            } else {
                guard.list.prev(self.view, position)
            };
            match neighbour {
                Some(slot) => position = slot,
                None => break,
            }
        }

        self.position = Some(position);
        self.value_locked(&guard)
    }

    fn live_position(&self, guard: &ResultSetState) -> Option<SlotRef> {
        self.position
            .filter(|slot| guard.list.row(self.view, *slot).is_some())
    }

    fn value_locked(&self, guard: &ResultSetState) -> Option<Row> {
        let row = guard.list.row(self.view, self.position?)?;
        Some(decorate(self.view, row))
    }
}

impl Iterator for ResultCursor {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        let guard = self.state.read();
        let value = self.value_locked(&guard);
        if let Some(position) = self.position {
            self.position = guard.list.next(self.view, position);
        }
        value
    }
}

/// Changelog rows carry their operation as a leading `VARCHAR` column.
pub(crate) fn decorate(view: View, row: &Row) -> Row {
    match view {
        View::Table => row.clone(),
        View::Changelog => row.with_operation_column(),
    }
}
