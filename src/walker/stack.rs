//! Traversal stack
//!
//! Holds the directories on the current walk path, root at the bottom.
//! Nodes live in fixed-capacity chunks kept in an index-addressed arena.
//! A chunk emptied by `pop` goes onto a free list and is reused by the next
//! `push` that needs one, so walking a tree repeatedly to the same depth
//! allocates chunks only once.

use std::collections::TryReserveError;

/// Nodes per chunk
pub const CHUNK_CAPACITY: usize = 8;

/// Chunked arena stack
pub struct TraversalStack<T> {
    /// Every chunk ever allocated
    chunks: Vec<Vec<T>>,

    /// Indices of chunks holding nodes, bottom to top
    active: Vec<usize>,

    /// Indices of empty chunks ready for reuse
    free: Vec<usize>,

    len: usize,
}

impl<T> TraversalStack<T> {
    pub fn new() -> Self {
        Self {
            chunks: Vec::new(),
            active: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Number of nodes on the stack
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of chunks allocated over the stack's lifetime
    pub fn chunks_allocated(&self) -> usize {
        self.chunks.len()
    }

    /// Push a node, growing by one chunk if the top chunk is full
    ///
    /// On allocation failure the node is dropped and the stack is unchanged.
    pub fn push(&mut self, node: T) -> Result<(), TryReserveError> {
        let top_has_room = self
            .active
            .last()
            .is_some_and(|&index| self.chunks[index].len() < CHUNK_CAPACITY);

        if !top_has_room {
            let index = self.acquire_chunk()?;
            self.active.push(index);
        }

        if let Some(&index) = self.active.last() {
            self.chunks[index].push(node);
            self.len += 1;
        }
        Ok(())
    }

    /// Remove and return the top node
    pub fn pop(&mut self) -> Option<T> {
        let &index = self.active.last()?;
        let node = self.chunks[index].pop();

        if self.chunks[index].is_empty() {
            self.active.pop();
            // Capacity for every chunk was reserved when it was allocated
            self.free.push(index);
        }

        if node.is_some() {
            self.len -= 1;
        }
        node
    }

    /// Top node
    pub fn top(&self) -> Option<&T> {
        self.active
            .last()
            .and_then(|&index| self.chunks[index].last())
    }

    /// Top node, mutably
    pub fn top_mut(&mut self) -> Option<&mut T> {
        match self.active.last() {
            Some(&index) => self.chunks[index].last_mut(),
            None => None,
        }
    }

    /// Nodes from the root up to the top
    pub fn iter_bottom_up(&self) -> impl DoubleEndedIterator<Item = &T> + '_ {
        self.active
            .iter()
            .flat_map(move |&index| self.chunks[index].iter())
    }

    /// Nodes from the top down to the root
    pub fn iter_top_down(&self) -> impl Iterator<Item = &T> + '_ {
        self.iter_bottom_up().rev()
    }

    fn acquire_chunk(&mut self) -> Result<usize, TryReserveError> {
        self.active.try_reserve(1)?;

        if let Some(index) = self.free.pop() {
            return Ok(index);
        }

        let mut chunk = Vec::new();
        chunk.try_reserve_exact(CHUNK_CAPACITY)?;
        self.chunks.try_reserve(1)?;
        self.free.try_reserve(self.chunks.len() + 1)?;
        self.chunks.push(chunk);
        Ok(self.chunks.len() - 1)
    }
}

impl<T> Default for TraversalStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop_order() {
        let mut stack = TraversalStack::new();
        for i in 0..20 {
            stack.push(i).unwrap();
        }
        assert_eq!(stack.len(), 20);
        assert_eq!(stack.top(), Some(&19));

        for expected in (0..20).rev() {
            assert_eq!(stack.pop(), Some(expected));
        }
        assert!(stack.is_empty());
        assert_eq!(stack.pop(), None);
        assert_eq!(stack.top(), None);
    }

    #[test]
    fn test_iteration_orders() {
        let mut stack = TraversalStack::new();
        for i in 0..19 {
            stack.push(i).unwrap();
        }

        let bottom_up: Vec<i32> = stack.iter_bottom_up().copied().collect();
        assert_eq!(bottom_up, (0..19).collect::<Vec<_>>());

        let top_down: Vec<i32> = stack.iter_top_down().copied().collect();
        assert_eq!(top_down, (0..19).rev().collect::<Vec<_>>());
    }

    #[test]
    fn test_empty_iteration() {
        let stack: TraversalStack<u8> = TraversalStack::new();
        assert_eq!(stack.iter_bottom_up().count(), 0);
        assert_eq!(stack.iter_top_down().count(), 0);
        assert_eq!(stack.chunks_allocated(), 0);
    }

    #[test]
    fn test_chunks_reused_across_cycles() {
        for depth in [1usize, 7, 8, 9, 16, 17, 100] {
            let mut stack = TraversalStack::new();
            for _ in 0..5 {
                for i in 0..depth {
                    stack.push(i).unwrap();
                }
                while stack.pop().is_some() {}
            }
            assert_eq!(stack.chunks_allocated(), depth.div_ceil(CHUNK_CAPACITY));
        }
    }

    #[test]
    fn test_sawtooth_does_not_grow() {
        let mut stack = TraversalStack::new();
        for i in 0..8 {
            stack.push(i).unwrap();
        }
        // Crossing a chunk boundary back and forth
        for i in 0..50 {
            stack.push(100 + i).unwrap();
            assert_eq!(stack.pop(), Some(100 + i));
        }
        assert_eq!(stack.chunks_allocated(), 2);
        assert_eq!(stack.top(), Some(&7));
    }

    #[test]
    fn test_top_mut() {
        let mut stack = TraversalStack::new();
        stack.push(String::from("root")).unwrap();
        stack.push(String::from("child")).unwrap();
        stack.top_mut().unwrap().push_str("-renamed");

        assert_eq!(stack.pop().as_deref(), Some("child-renamed"));
        assert_eq!(stack.top().map(String::as_str), Some("root"));
    }
}
