//! Server cursor cache keyed by SQL text.
//!
//! A cached entry lets a repeated statement skip the parse: the request is
//! sent with the open cursor id and the columns seen at its first describe.
//! Cursors that fall out of the cache must be closed on the server, so every
//! eviction hands the cursor id back to the caller.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use crate::protocol::{ColumnMetadata, StatementKind};

/// An open server cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedStatement {
    pub cursor_id: u16,
    pub columns: Option<Arc<[ColumnMetadata]>>,
}

/// LRU of open cursors. Capacity 0 disables caching.
#[derive(Debug)]
pub struct StatementCache {
    entries: Option<LruCache<String, CachedStatement>>,
}

impl StatementCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(LruCache::new),
        }
    }

    /// Whether statements of this kind keep their cursor between executions.
    pub fn is_cacheable(kind: StatementKind) -> bool {
        matches!(kind, StatementKind::Query | StatementKind::Dml | StatementKind::PlSql)
    }

    pub fn get(&mut self, sql: &str) -> Option<CachedStatement> {
        self.entries.as_mut()?.get(sql).cloned()
    }

    /// Remember a cursor. Returns the cursor id that must now be closed, if any.
    pub fn insert(&mut self, sql: &str, statement: CachedStatement) -> Option<u16> {
        let Some(entries) = self.entries.as_mut() else {
            return Some(statement.cursor_id);
        };
        let cursor_id = statement.cursor_id;
        match entries.push(sql.to_string(), statement) {
            Some((_, old)) if old.cursor_id != cursor_id => Some(old.cursor_id),
            _ => None,
        }
    }

    /// Forget a cursor, returning its id for closing.
    pub fn remove(&mut self, sql: &str) -> Option<u16> {
        self.entries.as_mut()?.pop(sql).map(|entry| entry.cursor_id)
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, LruCache::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns (current_size, max_capacity).
    pub fn stats(&self) -> (usize, usize) {
        (
            self.len(),
            self.entries.as_ref().map_or(0, |entries| entries.cap().get()),
        )
    }
}
