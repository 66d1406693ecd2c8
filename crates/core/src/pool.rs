//! `TextPool`: the open-addressing hash table Thusly uses to intern every
//! text literal and every text value produced at runtime (concatenation
//! results included), so that equal text always ends up as the same
//! heap object.

use std::rc::Rc;

use crate::value::{TextObject, fnv1a_hash};

const MIN_CAPACITY: usize = 10;
const MAX_LOAD_FACTOR: f64 = 0.75;

#[derive(Clone)]
enum Slot {
    Empty,
    Tombstone,
    Occupied(Rc<TextObject>),
}

/// A hash set of interned [`TextObject`]s, keyed by content.
///
/// Collisions are resolved by linear probing; deletions leave a
/// tombstone behind so probe chains past a removed entry stay intact.
/// The table doubles in capacity (starting from a minimum of
/// [`MIN_CAPACITY`]) whenever occupancy, counting tombstones, would
/// exceed 75% load.
pub struct TextPool {
    slots: Vec<Slot>,
    // live entries, not counting tombstones
    len: usize,
    // live entries plus tombstones — what load factor is computed against
    used: usize,
}

impl TextPool {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            len: 0,
            used: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Interns `chars`, returning the existing `TextObject` if the same
    /// content is already present, or a freshly allocated one otherwise.
    pub fn intern(&mut self, chars: &str) -> Rc<TextObject> {
        if self.slots.is_empty() || (self.used + 1) as f64 > self.capacity() as f64 * MAX_LOAD_FACTOR
        {
            self.grow();
        }

        let hash = fnv1a_hash(chars.as_bytes());
        let mut index = (hash as usize) % self.capacity();
        let mut first_tombstone: Option<usize> = None;

        loop {
            match &self.slots[index] {
                Slot::Empty => {
                    let insert_at = first_tombstone.unwrap_or(index);
                    let object = Rc::new(TextObject::new(chars.to_string(), hash));
                    if matches!(self.slots[insert_at], Slot::Empty) {
                        self.used += 1;
                    }
                    self.slots[insert_at] = Slot::Occupied(Rc::clone(&object));
                    self.len += 1;
                    return object;
                }
                Slot::Tombstone => {
                    if first_tombstone.is_none() {
                        first_tombstone = Some(index);
                    }
                }
                Slot::Occupied(existing) => {
                    if existing.hash == hash && existing.chars == chars {
                        return Rc::clone(existing);
                    }
                }
            }
            index = (index + 1) % self.capacity();
        }
    }

    /// Removes an entry by content, leaving a tombstone. Thusly never
    /// calls this at the language level (there is no way to un-intern a
    /// string), but it completes the table abstraction and is exercised
    /// directly in tests.
    pub fn remove(&mut self, chars: &str) -> bool {
        if self.slots.is_empty() {
            return false;
        }
        let hash = fnv1a_hash(chars.as_bytes());
        let mut index = (hash as usize) % self.capacity();
        let start = index;
        loop {
            match &self.slots[index] {
                Slot::Empty => return false,
                Slot::Occupied(existing) if existing.hash == hash && existing.chars == chars => {
                    self.slots[index] = Slot::Tombstone;
                    self.len -= 1;
                    return true;
                }
                _ => {}
            }
            index = (index + 1) % self.capacity();
            if index == start {
                return false;
            }
        }
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn grow(&mut self) {
        let new_capacity = if self.slots.is_empty() {
            MIN_CAPACITY
        } else {
            self.slots.len() * 2
        };
        let old_slots = std::mem::replace(&mut self.slots, {
            let mut v = Vec::with_capacity(new_capacity);
            v.resize_with(new_capacity, || Slot::Empty);
            v
        });
        self.used = 0;
        self.len = 0;
        for slot in old_slots {
            if let Slot::Occupied(object) = slot {
                self.reinsert(object);
            }
        }
    }

    fn reinsert(&mut self, object: Rc<TextObject>) {
        let mut index = (object.hash as usize) % self.capacity();
        loop {
            if matches!(self.slots[index], Slot::Empty) {
                self.slots[index] = Slot::Occupied(object);
                self.len += 1;
                self.used += 1;
                return;
            }
            index = (index + 1) % self.capacity();
        }
    }
}

impl Default for TextPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_the_same_content_returns_the_same_object() {
        let mut pool = TextPool::new();
        let a = pool.intern("hello");
        let b = pool.intern("hello");
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn distinct_content_gets_distinct_objects() {
        let mut pool = TextPool::new();
        let a = pool.intern("hello");
        let b = pool.intern("world");
        assert!(!Rc::ptr_eq(&a, &b));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn grows_past_load_factor_without_losing_entries() {
        let mut pool = TextPool::new();
        let words: Vec<String> = (0..200).map(|i| format!("word-{i}")).collect();
        for w in &words {
            pool.intern(w);
        }
        assert_eq!(pool.len(), words.len());
        for w in &words {
            let interned = pool.intern(w);
            assert_eq!(interned.chars, *w);
        }
    }

    #[test]
    fn remove_leaves_probe_chain_intact() {
        let mut pool = TextPool::new();
        pool.intern("a");
        pool.intern("b");
        pool.intern("c");
        assert!(pool.remove("b"));
        assert_eq!(pool.len(), 2);
        let c = pool.intern("c");
        assert_eq!(c.chars, "c");
    }
}
