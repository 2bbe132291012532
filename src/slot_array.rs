//! Fixed-capacity array with embedded logical ordering.
//!
//! A `SlotArray<T, N>` stores up to `N` payload values inline and keeps their
//! logical order in a [`SlotQueue`](crate::slot_queue::SlotQueue) rather than
//! by physical position. Payloads never shift on insert; removal swaps the
//! last occupied cell into the freed one so occupied cells are always the
//! prefix `0..len`. That "no holes" invariant means a new value can always go
//! in cell `len` without scanning for a free spot.
//!
//! Tree nodes embed two of these: branches for `(child, length)` pairs and
//! leaves for piece entries.

use crate::slot_queue::{SlotQueue, is_valid};

#[derive(Clone, Debug)]
pub(crate) struct SlotArray<T, const N: usize> {
    items: [T; N],
    queue: SlotQueue<N>,
}

impl<T: Copy + Default, const N: usize> SlotArray<T, N> {
    pub(crate) fn new() -> SlotArray<T, N> {
        return SlotArray {
            items: [T::default(); N],
            queue: SlotQueue::new(),
        };
    }

    #[inline(always)]
    pub(crate) fn capacity(&self) -> usize {
        return N;
    }

    #[inline(always)]
    pub(crate) fn len(&self) -> usize {
        return self.queue.len() as usize;
    }

    #[inline(always)]
    pub(crate) fn is_empty(&self) -> bool {
        return self.queue.is_empty();
    }

    #[inline(always)]
    pub(crate) fn is_full(&self) -> bool {
        return self.len() == N;
    }

    /// Slot id of the first element in logical order, or `None` when empty.
    #[inline(always)]
    pub(crate) fn head_id(&self) -> Option<u8> {
        let id = self.queue.head();
        return if is_valid(id) { Some(id) } else { None };
    }

    /// Slot id of the element after `id`, or `None` at the tail.
    #[inline(always)]
    pub(crate) fn next_id(&self, id: u8) -> Option<u8> {
        let next = self.queue.next(id);
        return if is_valid(next) { Some(next) } else { None };
    }

    /// Payload access by slot id.
    #[inline(always)]
    pub(crate) fn get(&self, id: u8) -> &T {
        debug_assert!((id as usize) < self.len());
        return &self.items[id as usize];
    }

    /// Mutable payload access by slot id.
    #[inline(always)]
    pub(crate) fn get_mut(&mut self, id: u8) -> &mut T {
        debug_assert!((id as usize) < self.len());
        return &mut self.items[id as usize];
    }

    /// Payload at logical position `nth` (O(n) walk).
    #[allow(dead_code)]
    pub(crate) fn nth(&self, nth: usize) -> &T {
        let id = self.queue.nth(nth as u8);
        return &self.items[id as usize];
    }

    /// Mutable payload at logical position `nth` (O(n) walk).
    pub(crate) fn nth_mut(&mut self, nth: usize) -> &mut T {
        let id = self.queue.nth(nth as u8);
        return &mut self.items[id as usize];
    }

    /// First element in logical order.
    pub(crate) fn first(&self) -> &T {
        debug_assert!(!self.is_empty());
        return &self.items[self.queue.head() as usize];
    }

    /// Insert `value` at logical position `nth`.
    ///
    /// Precondition: not full. The payload lands in cell `len`, the first
    /// free cell under the no-holes invariant.
    pub(crate) fn insert(&mut self, nth: usize, value: T) {
        debug_assert!(!self.is_full());
        debug_assert!(nth <= self.len());

        let cell = self.queue.len();
        self.items[cell as usize] = value;
        self.queue.insert(nth as u8, cell);
    }

    /// Prepend `value`.
    pub(crate) fn push_head(&mut self, value: T) {
        debug_assert!(!self.is_full());

        let cell = self.queue.len();
        self.items[cell as usize] = value;
        self.queue.push_head(cell);
    }

    /// Remove and return the element at logical position `nth`.
    ///
    /// To keep occupied cells contiguous, the payload in the last occupied
    /// cell is swapped into the freed cell and its ordering record relinked.
    pub(crate) fn remove(&mut self, nth: usize) -> T {
        let id = self.queue.pop_nth(nth as u8);
        let value = self.items[id as usize];
        let last = self.queue.len();

        if id < last {
            self.items[id as usize] = self.items[last as usize];
            self.queue.move_slot(last, id);
        }

        return value;
    }

    /// Remove and return the logically last element.
    pub(crate) fn pop_tail(&mut self) -> T {
        debug_assert!(!self.is_empty());
        return self.remove(self.len() - 1);
    }

    /// Move the logically later half into a fresh array, preserving order.
    ///
    /// `len / 2` elements move; on odd counts this side keeps the larger
    /// half.
    pub(crate) fn split(&mut self) -> SlotArray<T, N> {
        let mut right = SlotArray::new();
        let mid = self.len() / 2;
        for _ in 0..mid {
            right.push_head(self.pop_tail());
        }
        return right;
    }

    /// Iterate payload refs in logical order.
    pub(crate) fn iter(&self) -> Iter<'_, T, N> {
        return Iter { array: self, cur: self.queue.head() };
    }

    /// Confirm the embedded ordering chain is intact.
    pub(crate) fn check_links(&self) {
        self.queue.check_links();
    }
}

/// Forward iterator over payloads in logical order.
pub(crate) struct Iter<'a, T, const N: usize> {
    array: &'a SlotArray<T, N>,
    cur: u8,
}

impl<'a, T: Copy + Default, const N: usize> Iterator for Iter<'a, T, N> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        if !is_valid(self.cur) {
            return None;
        }
        let item = &self.array.items[self.cur as usize];
        self.cur = self.array.queue.next(self.cur);
        return Some(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    struct Count {
        negative: i32,
        positive: i32,
    }

    #[test]
    fn fill_and_split() {
        let mut array: SlotArray<Count, 32> = SlotArray::new();

        for i in 0..32 {
            assert!(!array.is_full());
            array.insert(i, Count { negative: -(i as i32), positive: i as i32 });
        }
        assert!(array.is_full());

        for count in array.iter() {
            assert_eq!(count.negative, -count.positive);
        }

        let split = array.split();

        assert_eq!(array.len(), 16);
        assert_eq!(split.len(), 16);

        let left: Vec<i32> = array.iter().map(|c| c.positive).collect();
        let right: Vec<i32> = split.iter().map(|c| c.positive).collect();
        assert_eq!(left, (0..16).collect::<Vec<i32>>());
        assert_eq!(right, (16..32).collect::<Vec<i32>>());

        array.check_links();
        split.check_links();
    }

    #[test]
    fn split_odd_keeps_larger_half() {
        let mut array: SlotArray<i64, 8> = SlotArray::new();
        for i in 0..5 {
            array.insert(i, i as i64);
        }

        let right = array.split();
        assert_eq!(array.len(), 3);
        assert_eq!(right.len(), 2);
        assert_eq!(array.iter().copied().collect::<Vec<i64>>(), vec![0, 1, 2]);
        assert_eq!(right.iter().copied().collect::<Vec<i64>>(), vec![3, 4]);
    }

    #[test]
    fn remove_compacts_cells() {
        let mut array: SlotArray<i64, 8> = SlotArray::new();
        for i in 0..6 {
            array.insert(i, i as i64 * 10);
        }

        assert_eq!(array.remove(2), 20);
        assert_eq!(array.len(), 5);
        assert_eq!(
            array.iter().copied().collect::<Vec<i64>>(),
            vec![0, 10, 30, 40, 50],
        );

        // The freed cell was back-filled, so the next insert still lands in
        // the first free cell without scanning.
        array.insert(0, -1);
        assert_eq!(
            array.iter().copied().collect::<Vec<i64>>(),
            vec![-1, 0, 10, 30, 40, 50],
        );
        array.check_links();
    }

    #[test]
    fn remove_head_and_tail() {
        let mut array: SlotArray<i64, 8> = SlotArray::new();
        for i in 0..4 {
            array.insert(i, i as i64);
        }

        assert_eq!(array.remove(0), 0);
        assert_eq!(array.pop_tail(), 3);
        assert_eq!(array.iter().copied().collect::<Vec<i64>>(), vec![1, 2]);
    }

    #[test]
    fn insert_reorders_not_cells() {
        let mut array: SlotArray<i64, 8> = SlotArray::new();
        array.insert(0, 1);
        array.insert(1, 3);
        array.insert(1, 2);

        assert_eq!(array.iter().copied().collect::<Vec<i64>>(), vec![1, 2, 3]);
        assert_eq!(*array.nth(1), 2);
        assert_eq!(*array.first(), 1);
    }

    #[test]
    fn id_walk_matches_logical_order() {
        let mut array: SlotArray<i64, 8> = SlotArray::new();
        for i in 0..5 {
            array.insert(i, i as i64 + 100);
        }

        let mut seen = Vec::new();
        let mut cur = array.head_id();
        while let Some(id) = cur {
            seen.push(*array.get(id));
            cur = array.next_id(id);
        }
        assert_eq!(seen, vec![100, 101, 102, 103, 104]);
    }
}
