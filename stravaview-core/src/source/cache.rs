//! Session-scoped raw table cache

use crate::error::Result;
use crate::types::RawTable;

use super::ActivitySource;

/// Fetches the raw table on first use and reuses it until invalidated.
///
/// Filter and unit changes rebuild charts from the cached table; only an
/// explicit [`CachedSource::invalidate`] triggers another fetch. A failed
/// fetch caches nothing.
pub struct CachedSource<S> {
    source: S,
    table: Option<RawTable>,
    loads: usize,
}

impl<S: ActivitySource> CachedSource<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            table: None,
            loads: 0,
        }
    }

    /// The raw table, fetching it if not yet cached.
    pub fn table(&mut self) -> Result<&RawTable> {
        if self.table.is_none() {
            tracing::debug!(source = %self.source.describe(), "Fetching raw activities");
            let table = self.source.load()?;
            self.loads += 1;
            self.table = Some(table);
        }
        Ok(self.table.get_or_insert_with(RawTable::new))
    }

    /// Drop the cached table so the next access refetches.
    pub fn invalidate(&mut self) {
        if self.table.take().is_some() {
            tracing::debug!(source = %self.source.describe(), "Invalidated raw table cache");
        }
    }

    pub fn is_cached(&self) -> bool {
        self.table.is_some()
    }

    /// Number of successful fetches so far
    pub fn load_count(&self) -> usize {
        self.loads
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::RawValue;
    use std::cell::Cell;

    struct CountingSource {
        calls: Cell<usize>,
        fail_first: bool,
    }

    impl CountingSource {
        fn new(fail_first: bool) -> Self {
            Self {
                calls: Cell::new(0),
                fail_first,
            }
        }
    }

    impl ActivitySource for CountingSource {
        fn load(&self) -> Result<RawTable> {
            let n = self.calls.get() + 1;
            self.calls.set(n);
            if self.fail_first && n == 1 {
                return Err(Error::Source("unavailable".to_string()));
            }
            Ok(RawTable::new().with_column("Distance", vec![RawValue::from(n as f64)]))
        }

        fn describe(&self) -> String {
            "counting".to_string()
        }
    }

    #[test]
    fn test_fetches_once() {
        let mut cache = CachedSource::new(CountingSource::new(false));
        assert!(!cache.is_cached());

        let first = cache.table().unwrap().clone();
        let second = cache.table().unwrap().clone();
        assert_eq!(first, second);
        assert_eq!(cache.load_count(), 1);
        assert_eq!(cache.source().calls.get(), 1);
        assert!(cache.is_cached());
    }

    #[test]
    fn test_invalidate_refetches() {
        let mut cache = CachedSource::new(CountingSource::new(false));
        cache.table().unwrap();
        cache.invalidate();
        assert!(!cache.is_cached());

        let table = cache.table().unwrap();
        assert_eq!(table.column("Distance").unwrap()[0], RawValue::Number(2.0));
        assert_eq!(cache.load_count(), 2);
    }

    #[test]
    fn test_failed_fetch_is_not_cached() {
        let mut cache = CachedSource::new(CountingSource::new(true));
        assert!(cache.table().is_err());
        assert!(!cache.is_cached());
        assert!(cache.table().is_ok());
        assert_eq!(cache.load_count(), 1);
    }
}
