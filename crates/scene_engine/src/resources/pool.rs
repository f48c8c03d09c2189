//! Name-keyed reference counting shared by the GPU caches

use std::collections::HashMap;

/// Outcome of releasing one reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// Last reference dropped; the resource was destroyed
    Destroyed,
    /// Other references remain
    Retained(usize),
    /// The handle does not match the cached resource of that name
    Stale,
    /// No resource of that name is cached
    Missing,
}

#[derive(Debug)]
struct Entry<H> {
    handle: H,
    refs: usize,
}

/// Map from resource name to handle plus reference count
#[derive(Debug)]
pub(crate) struct RefPool<H> {
    entries: HashMap<String, Entry<H>>,
}

impl<H> Default for RefPool<H> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<H: Copy + PartialEq> RefPool<H> {
    /// Take a reference to an existing entry
    pub(crate) fn acquire(&mut self, name: &str) -> Option<H> {
        let entry = self.entries.get_mut(name)?;
        entry.refs += 1;
        Some(entry.handle)
    }

    /// Add a new entry holding one reference
    pub(crate) fn insert(&mut self, name: &str, handle: H) {
        self.entries.insert(name.to_string(), Entry { handle, refs: 1 });
    }

    /// Drop one reference; the entry is removed when the count reaches zero
    pub(crate) fn release(&mut self, name: &str, handle: H) -> Release {
        let Some(entry) = self.entries.get_mut(name) else {
            return Release::Missing;
        };
        if entry.handle != handle {
            return Release::Stale;
        }
        entry.refs -= 1;
        if entry.refs == 0 {
            self.entries.remove(name);
            Release::Destroyed
        } else {
            Release::Retained(entry.refs)
        }
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Reverse lookup of a handle
    pub(crate) fn find(&self, handle: H) -> Option<String> {
        self.entries
            .iter()
            .find(|(_, entry)| entry.handle == handle)
            .map(|(name, _)| name.clone())
    }

    pub(crate) fn refcount(&self, name: &str) -> usize {
        self.entries.get(name).map_or(0, |entry| entry.refs)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Remove every entry, returning the handles still referenced
    pub(crate) fn drain(&mut self) -> Vec<(String, H)> {
        self.entries
            .drain()
            .map(|(name, entry)| (name, entry.handle))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_down_to_destroy() {
        let mut pool = RefPool::default();
        pool.insert("basic", 7u64);
        assert_eq!(pool.acquire("basic"), Some(7));
        assert_eq!(pool.refcount("basic"), 2);

        assert_eq!(pool.release("basic", 8), Release::Stale);
        assert_eq!(pool.release("basic", 7), Release::Retained(1));
        assert_eq!(pool.release("basic", 7), Release::Destroyed);
        assert_eq!(pool.release("basic", 7), Release::Missing);
        assert!(!pool.contains("basic"));
        assert_eq!(pool.acquire("basic"), None);
    }

    #[test]
    fn test_find_by_handle() {
        let mut pool = RefPool::default();
        pool.insert("a", 1u64);
        pool.insert("b", 2u64);
        assert_eq!(pool.find(2).as_deref(), Some("b"));
        assert_eq!(pool.find(3), None);
        assert_eq!(pool.len(), 2);
    }
}
