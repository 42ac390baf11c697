//! Capacity-bounded changelog paired with a compacted table view.
//!
//! ## Structure
//!
//! ```text
//!   changelog (append-only, bounded)          table (current state)
//!   ┌────┐   ┌────┐   ┌────┐   ┌────┐         ┌────┐   ┌────┐
//!   │ +I │ ⇄ │ +I │ ⇄ │ -U │ ⇄ │ +U │         │ r0 │ ⇄ │ r3 │
//!   └─┬──┘   └────┘   └────┘   └─┬──┘         └────┘   └────┘
//!     └── table_slot ────────────┼──────────────┘         ▲
//!                                └── table_slot ──────────┘
//!
//!   index: RowKey → table slot (one live entry per key)
//! ```
//!
//! Both lists live in slabs with index-based links, so handles are plain
//! `(slot, generation)` pairs. Freeing a slot bumps its generation; a stale
//! handle simply stops resolving instead of pointing at a recycled element.
//!
//! Every changelog entry remembers the table slot it created. Evicting the
//! changelog head removes exactly that table element, never a newer entry
//! that happens to share the same key, which keeps `table.len() <=
//! changelog.len()` at all times.

use std::collections::HashMap;
use std::num::NonZeroUsize;

use crate::types::{Row, RowKey};

/// Stable handle to an element of a [`SlotList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SlotRef {
    index: u32,
    generation: u32,
}

struct Node<T> {
    value: T,
    prev: Option<u32>,
    next: Option<u32>,
}

struct Slot<T> {
    generation: u32,
    node: Option<Node<T>>,
}

/// Slab-backed doubly linked list with generation-checked handles.
pub(crate) struct SlotList<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    head: Option<u32>,
    tail: Option<u32>,
    len: usize,
}

impl<T> SlotList<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Append a value at the tail and return its handle.
    pub(crate) fn push_back(&mut self, value: T) -> SlotRef {
        let node = Node {
            value,
            prev: self.tail,
            next: None,
        };
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index as usize].node = Some(node);
                index
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                index
            }
        };

        match self.tail {
            Some(tail) => self.node_mut(tail).next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        self.len += 1;
        self.handle(index)
    }

    /// Remove and return the head value.
    pub(crate) fn pop_front(&mut self) -> Option<T> {
        let head = self.head?;
        self.unlink(head)
    }

    /// Remove the element behind `slot`. Returns `None` for stale handles.
    pub(crate) fn remove(&mut self, slot: SlotRef) -> Option<T> {
        if !self.contains(slot) {
            return None;
        }
        self.unlink(slot.index)
    }

    pub(crate) fn contains(&self, slot: SlotRef) -> bool {
        self.slots
            .get(slot.index as usize)
            .map(|s| s.generation == slot.generation && s.node.is_some())
            .unwrap_or(false)
    }

    pub(crate) fn get(&self, slot: SlotRef) -> Option<&T> {
        self.live_node(slot).map(|n| &n.value)
    }

    pub(crate) fn get_mut(&mut self, slot: SlotRef) -> Option<&mut T> {
        let s = self.slots.get_mut(slot.index as usize)?;
        if s.generation != slot.generation {
            return None;
        }
        s.node.as_mut().map(|n| &mut n.value)
    }

    pub(crate) fn front(&self) -> Option<SlotRef> {
        self.head.map(|i| self.handle(i))
    }

    pub(crate) fn back(&self) -> Option<SlotRef> {
        self.tail.map(|i| self.handle(i))
    }

    /// Handle of the element after `slot`, if `slot` is live and has one.
    pub(crate) fn next(&self, slot: SlotRef) -> Option<SlotRef> {
        let next = self.live_node(slot)?.next?;
        Some(self.handle(next))
    }

    /// Handle of the element before `slot`, if `slot` is live and has one.
    pub(crate) fn prev(&self, slot: SlotRef) -> Option<SlotRef> {
        let prev = self.live_node(slot)?.prev?;
        Some(self.handle(prev))
    }

    /// Iterate from head to tail.
    pub(crate) fn iter(&self) -> SlotListIter<'_, T> {
        SlotListIter {
            list: self,
            current: self.head,
        }
    }

    // -- internal helpers --

    fn handle(&self, index: u32) -> SlotRef {
        SlotRef {
            index,
            generation: self.slots[index as usize].generation,
        }
    }

    fn live_node(&self, slot: SlotRef) -> Option<&Node<T>> {
        let s = self.slots.get(slot.index as usize)?;
        if s.generation != slot.generation {
            return None;
        }
        s.node.as_ref()
    }

    fn node_mut(&mut self, index: u32) -> &mut Node<T> {
        self.slots[index as usize]
            .node
            .as_mut()
            .expect("linked slot is vacant")
    }

    fn unlink(&mut self, index: u32) -> Option<T> {
        let slot = &mut self.slots[index as usize];
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);

        match node.prev {
            Some(prev) => self.node_mut(prev).next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => self.node_mut(next).prev = node.prev,
            None => self.tail = node.prev,
        }

        self.free.push(index);
        self.len -= 1;
        Some(node.value)
    }
}

impl<T> Default for SlotList<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) struct SlotListIter<'a, T> {
    list: &'a SlotList<T>,
    current: Option<u32>,
}

impl<'a, T> Iterator for SlotListIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.current?;
        let node = self.list.slots[index as usize].node.as_ref()?;
        self.current = node.next;
        Some(&node.value)
    }
}

/// Which of the two lists a reader is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum View {
    Table,
    Changelog,
}

struct ChangelogEntry {
    row: Row,
    key: RowKey,
    /// Table element this event inserted, if it was an upsert.
    table_slot: Option<SlotRef>,
}

/// Changelog + compacted table + row index, with capacity-driven eviction.
pub(crate) struct EvictingDualList {
    changelog: SlotList<ChangelogEntry>,
    table: SlotList<Row>,
    index: HashMap<RowKey, SlotRef>,
    max_capacity: NonZeroUsize,
}

impl EvictingDualList {
    pub(crate) fn new(max_capacity: NonZeroUsize) -> Self {
        Self {
            changelog: SlotList::new(),
            table: SlotList::new(),
            index: HashMap::new(),
            max_capacity,
        }
    }

    pub(crate) fn max_capacity(&self) -> usize {
        self.max_capacity.get()
    }

    /// Push, apply and evict in one step.
    pub(crate) fn append(&mut self, row: Row) {
        let handle = self.push_changelog(row);
        self.apply_to_table(handle);
        self.evict();
    }

    /// Append to the changelog tail and return the new element's handle.
    pub(crate) fn push_changelog(&mut self, row: Row) -> SlotRef {
        let key = row.key();
        self.changelog.push_back(ChangelogEntry {
            row,
            key,
            table_slot: None,
        })
    }

    /// Fold the changelog event behind `handle` into the table.
    ///
    /// Upserts replace any live entry for the same key and land at the
    /// table tail. Retracts remove the live entry for their key; a retract
    /// with no live entry is a no-op.
    pub(crate) fn apply_to_table(&mut self, handle: SlotRef) {
        let (row, key) = match self.changelog.get(handle) {
            Some(entry) => (entry.row.clone(), entry.key.clone()),
            None => return,
        };

        if row.operation.is_upsert() {
            if let Some(previous) = self.index.remove(&key) {
                self.table.remove(previous);
            }
            let slot = self.table.push_back(row);
            self.index.insert(key, slot);
            if let Some(entry) = self.changelog.get_mut(handle) {
                entry.table_slot = Some(slot);
            }
        } else if let Some(slot) = self.index.remove(&key) {
            self.table.remove(slot);
        }
    }

    /// Drop changelog heads until the capacity bound holds again, taking
    /// the table rows they created with them. Returns the number evicted.
    pub(crate) fn evict(&mut self) -> usize {
        let mut evicted = 0;
        while self.changelog.len() > self.max_capacity.get() {
            let Some(entry) = self.changelog.pop_front() else {
                break;
            };
            if let Some(slot) = entry.table_slot {
                if self.table.remove(slot).is_some()
                    && self.index.get(&entry.key) == Some(&slot)
                {
                    self.index.remove(&entry.key);
                }
            }
            evicted += 1;
        }
        evicted
    }

    pub(crate) fn len(&self, view: View) -> usize {
        match view {
            View::Table => self.table.len(),
            View::Changelog => self.changelog.len(),
        }
    }

    pub(crate) fn front(&self, view: View) -> Option<SlotRef> {
        match view {
            View::Table => self.table.front(),
            View::Changelog => self.changelog.front(),
        }
    }

    pub(crate) fn back(&self, view: View) -> Option<SlotRef> {
        match view {
            View::Table => self.table.back(),
            View::Changelog => self.changelog.back(),
        }
    }

    pub(crate) fn next(&self, view: View, slot: SlotRef) -> Option<SlotRef> {
        match view {
            View::Table => self.table.next(slot),
            View::Changelog => self.changelog.next(slot),
        }
    }

    pub(crate) fn prev(&self, view: View, slot: SlotRef) -> Option<SlotRef> {
        match view {
            View::Table => self.table.prev(slot),
            View::Changelog => self.changelog.prev(slot),
        }
    }

    pub(crate) fn row(&self, view: View, slot: SlotRef) -> Option<&Row> {
        match view {
            View::Table => self.table.get(slot),
            View::Changelog => self.changelog.get(slot).map(|e| &e.row),
        }
    }

    /// Rows of `view` from front to back.
    pub(crate) fn rows(&self, view: View) -> Box<dyn Iterator<Item = &Row> + '_> {
        match view {
            View::Table => Box::new(self.table.iter()),
            View::Changelog => Box::new(self.changelog.iter().map(|e| &e.row)),
        }
    }

    #[cfg(test)]
    fn index_len(&self) -> usize {
        self.index.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Field, FieldType, OperationKind};

    fn row(op: OperationKind, v: i64) -> Row {
        Row::new(op, vec![Field::atomic(FieldType::Integer, v.to_string())])
    }

    fn values(list: &EvictingDualList, view: View) -> Vec<String> {
        list.rows(view).map(|r| r.fields[0].to_string()).collect()
    }

    fn capacity(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    // ---------------------------------------------------------------
    // SlotList
    // ---------------------------------------------------------------

    #[test]
    fn test_slot_list_push_and_iterate() {
        let mut list = SlotList::new();
        list.push_back(1);
        list.push_back(2);
        list.push_back(3);
        assert_eq!(list.len(), 3);
        assert_eq!(list.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_slot_list_remove_middle_relinks() {
        let mut list = SlotList::new();
        let a = list.push_back("a");
        let b = list.push_back("b");
        let c = list.push_back("c");

        assert_eq!(list.remove(b), Some("b"));
        assert_eq!(list.next(a), Some(c));
        assert_eq!(list.prev(c), Some(a));
        assert_eq!(list.iter().copied().collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[test]
    fn test_slot_list_stale_handle_after_reuse() {
        let mut list = SlotList::new();
        let a = list.push_back(10);
        assert_eq!(list.pop_front(), Some(10));
        assert_eq!(list.len(), 0);

        // the freed slot is recycled with a new generation
        let b = list.push_back(20);
        assert!(!list.contains(a));
        assert!(list.contains(b));
        assert_eq!(list.get(a), None);
        assert_eq!(list.remove(a), None);
        assert_eq!(list.get(b), Some(&20));
    }

    #[test]
    fn test_slot_list_front_back_tracking() {
        let mut list = SlotList::new();
        assert!(list.front().is_none());
        let a = list.push_back(1);
        let b = list.push_back(2);
        assert_eq!(list.front(), Some(a));
        assert_eq!(list.back(), Some(b));
        list.remove(b);
        assert_eq!(list.back(), Some(a));
        list.remove(a);
        assert!(list.front().is_none());
        assert!(list.back().is_none());
    }

    // ---------------------------------------------------------------
    // Compaction
    // ---------------------------------------------------------------

    #[test]
    fn test_upsert_appends_and_retract_removes() {
        let mut list = EvictingDualList::new(capacity(100));
        list.append(row(OperationKind::Insert, 1));
        list.append(row(OperationKind::Insert, 2));
        list.append(row(OperationKind::UpdateBefore, 1));
        list.append(row(OperationKind::UpdateAfter, 3));

        assert_eq!(values(&list, View::Table), vec!["2", "3"]);
        assert_eq!(values(&list, View::Changelog), vec!["1", "2", "1", "3"]);
    }

    #[test]
    fn test_retract_of_unknown_key_is_noop() {
        let mut list = EvictingDualList::new(capacity(10));
        list.append(row(OperationKind::Insert, 1));
        list.append(row(OperationKind::Delete, 42));
        assert_eq!(values(&list, View::Table), vec!["1"]);
        assert_eq!(list.len(View::Changelog), 2);
    }

    #[test]
    fn test_repeated_upsert_keeps_one_row_per_key() {
        let mut list = EvictingDualList::new(capacity(10));
        list.append(row(OperationKind::Insert, 1));
        list.append(row(OperationKind::Insert, 2));
        list.append(row(OperationKind::Insert, 1));
        assert_eq!(values(&list, View::Table), vec!["2", "1"]);

        list.append(row(OperationKind::Delete, 1));
        assert_eq!(values(&list, View::Table), vec!["2"]);
        assert_eq!(list.index_len(), 1);
    }

    // ---------------------------------------------------------------
    // Eviction
    // ---------------------------------------------------------------

    #[test]
    fn test_eviction_takes_table_row_along() {
        let mut list = EvictingDualList::new(capacity(3));
        for v in 0..5 {
            list.append(row(OperationKind::Insert, v));
        }
        assert_eq!(values(&list, View::Changelog), vec!["2", "3", "4"]);
        assert_eq!(values(&list, View::Table), vec!["2", "3", "4"]);
        assert_eq!(list.index_len(), 3);
    }

    #[test]
    fn test_eviction_spares_newer_entry_with_same_key() {
        let mut list = EvictingDualList::new(capacity(2));
        list.append(row(OperationKind::Insert, 7));
        list.append(row(OperationKind::Insert, 8));
        // re-insert of key 7 replaces the first table entry
        list.append(row(OperationKind::Insert, 7));

        // the evicted head (first +I 7) no longer owns a live table row,
        // so the newer 7 must survive
        assert_eq!(values(&list, View::Changelog), vec!["8", "7"]);
        assert_eq!(values(&list, View::Table), vec!["8", "7"]);
        assert_eq!(list.index_len(), 2);
    }

    #[test]
    fn test_retract_then_eviction_of_original_insert() {
        let mut list = EvictingDualList::new(capacity(1));
        list.append(row(OperationKind::Insert, 1));
        list.append(row(OperationKind::UpdateBefore, 1));
        list.append(row(OperationKind::Insert, 2));

        assert_eq!(values(&list, View::Changelog), vec!["2"]);
        assert_eq!(values(&list, View::Table), vec!["2"]);
    }

    #[test]
    fn test_capacity_bound_holds_for_mixed_stream() {
        for cap in 1..6 {
            let mut list = EvictingDualList::new(capacity(cap));
            for i in 0..50i64 {
                let op = match i % 4 {
                    0 | 1 => OperationKind::Insert,
                    2 => OperationKind::UpdateBefore,
                    _ => OperationKind::UpdateAfter,
                };
                list.append(row(op, i % 7));
                assert!(list.len(View::Changelog) <= cap);
                assert!(list.len(View::Table) <= list.len(View::Changelog));
            }
        }
    }

    #[test]
    fn test_evict_reports_count() {
        let mut list = EvictingDualList::new(capacity(2));
        list.push_changelog(row(OperationKind::Insert, 1));
        list.push_changelog(row(OperationKind::Insert, 2));
        list.push_changelog(row(OperationKind::Insert, 3));
        list.push_changelog(row(OperationKind::Insert, 4));
        assert_eq!(list.evict(), 2);
        assert_eq!(list.evict(), 0);
        assert_eq!(list.max_capacity(), 2);
    }
}
