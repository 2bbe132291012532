//! Intrusive ordering over a fixed set of slots.
//!
//! A `SlotQueue<N>` keeps a logical ordering of up to `N` slot ids without
//! ever moving payload data: each slot carries `prev`/`next` ids forming a
//! doubly-linked chain through the slot space. Pushing or popping at either
//! end is O(1); inserting or removing at an arbitrary logical position is an
//! O(n) walk to locate the slot plus an O(1) splice.
//!
//! Slot ids are `u8`, with `u8::MAX` reserved as the invalid sentinel, which
//! caps the capacity at 254. That is plenty for the fanout-26 tree nodes
//! built on top of this, and keeps a link record at two bytes.

/// Sentinel id meaning "no slot".
pub(crate) const INVALID: u8 = u8::MAX;

/// Returns whether `id` names a real slot.
#[inline(always)]
pub(crate) fn is_valid(id: u8) -> bool {
    return id != INVALID;
}

/// Link record embedded per slot.
#[derive(Clone, Copy, Debug)]
struct Link {
    prev: u8,
    next: u8,
}

/// A fixed-capacity doubly-linked ordering of slot ids.
#[derive(Clone, Debug)]
pub(crate) struct SlotQueue<const N: usize> {
    len: u8,
    head: u8,
    tail: u8,
    links: [Link; N],
}

impl<const N: usize> SlotQueue<N> {
    /// Slot ids must fit in a `u8` with one value left over for the sentinel.
    const CAPACITY_OK: () = assert!(N <= 0xFE, "SlotQueue capacity must be <= 254");

    pub(crate) fn new() -> SlotQueue<N> {
        let () = Self::CAPACITY_OK;
        return SlotQueue {
            len: 0,
            head: INVALID,
            tail: INVALID,
            links: [Link { prev: INVALID, next: INVALID }; N],
        };
    }

    #[inline(always)]
    pub(crate) fn len(&self) -> u8 {
        return self.len;
    }

    #[inline(always)]
    pub(crate) fn is_empty(&self) -> bool {
        return self.len == 0;
    }

    #[inline(always)]
    pub(crate) fn head(&self) -> u8 {
        return self.head;
    }

    #[inline(always)]
    #[allow(dead_code)]
    pub(crate) fn tail(&self) -> u8 {
        return self.tail;
    }

    /// Successor of `id` in logical order, or `INVALID` at the tail.
    #[inline(always)]
    pub(crate) fn next(&self, id: u8) -> u8 {
        return self.links[id as usize].next;
    }

    /// Predecessor of `id` in logical order, or `INVALID` at the head.
    #[inline(always)]
    #[allow(dead_code)]
    pub(crate) fn prev(&self, id: u8) -> u8 {
        return self.links[id as usize].prev;
    }

    /// Link `id` in as the new head.
    pub(crate) fn push_head(&mut self, id: u8) {
        debug_assert!((self.len as usize) < N);
        self.links[id as usize].prev = INVALID;
        self.links[id as usize].next = self.head;
        if is_valid(self.head) {
            self.links[self.head as usize].prev = id;
        }
        self.head = id;
        if !is_valid(self.tail) {
            self.tail = id;
        }
        self.len += 1;
        self.debug_check_links();
    }

    /// Link `id` in as the new tail.
    pub(crate) fn push_tail(&mut self, id: u8) {
        debug_assert!((self.len as usize) < N);
        self.links[id as usize].prev = self.tail;
        self.links[id as usize].next = INVALID;
        if is_valid(self.tail) {
            self.links[self.tail as usize].next = id;
        }
        self.tail = id;
        if !is_valid(self.head) {
            self.head = id;
        }
        self.len += 1;
        self.debug_check_links();
    }

    /// Walk to the slot at logical position `nth`.
    ///
    /// Precondition: `nth < len`. Head and tail are O(1); anything else walks
    /// forward from the head.
    pub(crate) fn nth(&self, nth: u8) -> u8 {
        debug_assert!(nth < self.len);
        if nth == 0 {
            return self.head;
        }
        if nth == self.len - 1 {
            return self.tail;
        }
        let mut iter = self.head;
        for _ in 0..nth {
            iter = self.links[iter as usize].next;
        }
        return iter;
    }

    /// Splice `id` in at logical position `nth` (`0..=len`).
    pub(crate) fn insert(&mut self, nth: u8, id: u8) {
        debug_assert!(nth <= self.len);
        debug_assert!((self.len as usize) < N);

        if nth == 0 {
            self.push_head(id);
        } else if nth == self.len {
            self.push_tail(id);
        } else {
            let at = self.nth(nth);
            let before = self.links[at as usize].prev;
            debug_assert!(is_valid(before));
            self.links[id as usize].prev = before;
            self.links[id as usize].next = at;
            self.links[before as usize].next = id;
            self.links[at as usize].prev = id;
            self.len += 1;
            self.debug_check_links();
        }
    }

    /// Unlink and return the slot at logical position `nth`.
    ///
    /// Precondition: `nth < len`.
    pub(crate) fn pop_nth(&mut self, nth: u8) -> u8 {
        let id = self.nth(nth);
        let Link { prev, next } = self.links[id as usize];

        if is_valid(prev) {
            self.links[prev as usize].next = next;
        }
        if is_valid(next) {
            self.links[next as usize].prev = prev;
        }
        if self.head == id {
            self.head = next;
        }
        if self.tail == id {
            self.tail = prev;
        }
        self.links[id as usize] = Link { prev: INVALID, next: INVALID };
        self.len -= 1;
        self.debug_check_links();
        return id;
    }

    /// Relocate the link record from slot `old` to slot `new`, fixing up both
    /// neighbors and the head/tail if either endpoint moved. The caller moves
    /// the payload; this moves the ordering.
    pub(crate) fn move_slot(&mut self, old: u8, new: u8) {
        let link = self.links[old as usize];
        self.links[new as usize] = link;
        if is_valid(link.prev) {
            self.links[link.prev as usize].next = new;
        }
        if is_valid(link.next) {
            self.links[link.next as usize].prev = new;
        }
        if self.head == old {
            self.head = new;
        }
        if self.tail == old {
            self.tail = new;
        }
        self.debug_check_links();
    }

    /// Iterate slot ids in logical order.
    pub(crate) fn iter(&self) -> SlotIds<'_, N> {
        return SlotIds { queue: self, cur: self.head };
    }

    /// Walk the chain both ways and confirm it covers exactly `len` slots.
    pub(crate) fn check_links(&self) {
        let mut count = 0u8;
        let mut iter = self.head;
        while is_valid(iter) {
            count += 1;
            iter = self.links[iter as usize].next;
        }
        assert_eq!(count, self.len, "head chain length mismatch");

        count = 0;
        iter = self.tail;
        while is_valid(iter) {
            count += 1;
            iter = self.links[iter as usize].prev;
        }
        assert_eq!(count, self.len, "tail chain length mismatch");
    }

    #[inline(always)]
    fn debug_check_links(&self) {
        #[cfg(debug_assertions)]
        self.check_links();
    }
}

/// Forward iterator over slot ids.
pub(crate) struct SlotIds<'a, const N: usize> {
    queue: &'a SlotQueue<N>,
    cur: u8,
}

impl<'a, const N: usize> Iterator for SlotIds<'a, N> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        if !is_valid(self.cur) {
            return None;
        }
        let id = self.cur;
        self.cur = self.queue.next(id);
        return Some(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_head() {
        let mut q: SlotQueue<32> = SlotQueue::new();
        assert_eq!(q.len(), 0);

        q.push_head(10);
        q.push_head(12);
        q.push_head(14);
        assert_eq!(q.len(), 3);

        assert_eq!(q.pop_nth(0), 14);
        assert_eq!(q.pop_nth(0), 12);
        assert_eq!(q.pop_nth(0), 10);
        assert_eq!(q.len(), 0);
        assert!(q.is_empty());
    }

    #[test]
    fn push_pop_tail() {
        let mut q: SlotQueue<32> = SlotQueue::new();

        q.push_tail(10);
        q.push_tail(12);
        q.push_tail(14);
        assert_eq!(q.len(), 3);

        assert_eq!(q.pop_nth(q.len() - 1), 14);
        assert_eq!(q.pop_nth(q.len() - 1), 12);
        assert_eq!(q.pop_nth(q.len() - 1), 10);
        assert_eq!(q.len(), 0);
    }

    #[test]
    fn head_tail_links() {
        let mut q: SlotQueue<32> = SlotQueue::new();

        q.push_head(10);
        assert_eq!(q.head(), 10);
        assert_eq!(q.tail(), 10);
        assert_eq!(q.prev(10), INVALID);
        assert_eq!(q.next(10), INVALID);

        let id = q.pop_nth(q.len() - 1);
        assert_eq!(id, 10);
        assert_eq!(q.head(), INVALID);
        assert_eq!(q.tail(), INVALID);

        q.push_head(10);
        q.push_head(12);
        assert_eq!(q.head(), 12);
        assert_eq!(q.tail(), 10);
        assert_eq!(q.next(12), 10);
        assert_eq!(q.prev(10), 12);

        let id = q.pop_nth(q.len() - 1);
        assert_eq!(id, 10);
        assert_eq!(q.head(), 12);
        assert_eq!(q.tail(), 12);
    }

    #[test]
    fn insert_middle() {
        let mut q: SlotQueue<8> = SlotQueue::new();

        q.push_tail(0);
        q.push_tail(1);
        q.push_tail(2);
        q.insert(1, 3);

        let order: Vec<u8> = q.iter().collect();
        assert_eq!(order, vec![0, 3, 1, 2]);
        q.check_links();
    }

    #[test]
    fn insert_at_ends_uses_fast_paths() {
        let mut q: SlotQueue<8> = SlotQueue::new();

        q.insert(0, 5);
        q.insert(0, 4);
        q.insert(2, 6);

        let order: Vec<u8> = q.iter().collect();
        assert_eq!(order, vec![4, 5, 6]);
    }

    #[test]
    fn pop_middle_relinks() {
        let mut q: SlotQueue<8> = SlotQueue::new();

        for id in 0..5 {
            q.push_tail(id);
        }
        assert_eq!(q.pop_nth(2), 2);

        let order: Vec<u8> = q.iter().collect();
        assert_eq!(order, vec![0, 1, 3, 4]);
        assert_eq!(q.next(1), 3);
        assert_eq!(q.prev(3), 1);
    }

    #[test]
    fn move_slot_fixes_neighbors_and_ends() {
        let mut q: SlotQueue<8> = SlotQueue::new();

        q.push_tail(0);
        q.push_tail(1);
        q.push_tail(2);

        // Relocate the middle slot's ordering record to slot 7.
        q.move_slot(1, 7);
        let order: Vec<u8> = q.iter().collect();
        assert_eq!(order, vec![0, 7, 2]);

        // Relocate the head.
        q.move_slot(0, 6);
        assert_eq!(q.head(), 6);
        let order: Vec<u8> = q.iter().collect();
        assert_eq!(order, vec![6, 7, 2]);

        // Relocate the tail.
        q.move_slot(2, 5);
        assert_eq!(q.tail(), 5);
        let order: Vec<u8> = q.iter().collect();
        assert_eq!(order, vec![6, 7, 5]);
        q.check_links();
    }
}
