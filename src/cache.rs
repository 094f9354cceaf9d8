use mini_moka::unsync::Cache;
use std::cell::{Cell, RefCell};
use std::fmt;

use crate::markdown::RenderedMarkdown;

/// Memoises rendered markdown for the lifetime of a page. Unbounded by
/// default; with a capacity, entries are evicted by the cache's admission
/// policy once it is full.
pub struct ContentCache {
    entries: RefCell<Cache<String, RenderedMarkdown>>,
    hits: Cell<u64>,
    misses: Cell<u64>,
}

impl ContentCache {
    pub fn new() -> Self {
        Self::from_cache(Cache::builder().build())
    }

    pub fn with_capacity(max_capacity: u64) -> Self {
        Self::from_cache(Cache::builder().max_capacity(max_capacity).build())
    }

    fn from_cache(cache: Cache<String, RenderedMarkdown>) -> Self {
        Self {
            entries: RefCell::new(cache),
            hits: Cell::new(0),
            misses: Cell::new(0),
        }
    }

    pub fn get_or_insert_with(
        &self,
        key: &str,
        render: impl FnOnce() -> RenderedMarkdown,
    ) -> RenderedMarkdown {
        let key = key.to_string();
        let cached = self.entries.borrow_mut().get(&key).cloned();
        if let Some(cached) = cached {
            self.hits.set(self.hits.get() + 1);
            return cached;
        }
        self.misses.set(self.misses.get() + 1);

        // Rendering may recurse into this cache for nested content.
        let rendered = render();
        self.entries.borrow_mut().insert(key, rendered.clone());
        rendered
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().invalidate_all();
    }

    pub fn len(&self) -> u64 {
        self.entries.borrow().entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> u64 {
        self.hits.get()
    }

    pub fn misses(&self) -> u64 {
        self.misses.get()
    }
}

impl Default for ContentCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ContentCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentCache")
            .field("entries", &self.len())
            .field("hits", &self.hits.get())
            .field("misses", &self.misses.get())
            .finish()
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    fn rendered(html: &str) -> RenderedMarkdown {
        RenderedMarkdown {
            html: html.to_string(),
            tooltips: Vec::new(),
        }
    }

    #[test]
    fn get_or_insert_with__should_render_once_per_key() {
        // Given
        let cache = ContentCache::new();
        let mut calls = 0;

        // When
        let first = cache.get_or_insert_with("k", || {
            calls += 1;
            rendered("<p>x</p>")
        });
        let second = cache.get_or_insert_with("k", || rendered("<p>other</p>"));

        // Then
        assert_eq!(calls, 1);
        assert_eq!(first, second);
        assert_eq!((cache.hits(), cache.misses()), (1, 1));
    }

    #[test]
    fn get_or_insert_with__should_stay_within_capacity() {
        // Given
        let cache = ContentCache::with_capacity(2);

        // When
        let results: Vec<_> = ["a", "b", "c", "d"]
            .into_iter()
            .map(|key| cache.get_or_insert_with(key, || rendered(key)))
            .collect();

        // Then
        assert!(cache.len() <= 2);
        assert_eq!(results[3], rendered("d"));
    }

    #[test]
    fn clear__should_empty_the_cache() {
        // Given
        let cache = ContentCache::new();
        cache.get_or_insert_with("a", || rendered("a"));

        // When
        cache.clear();

        // Then
        assert!(cache.is_empty());
        assert_eq!(cache.misses(), 1);
    }
}
