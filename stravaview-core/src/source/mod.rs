//! Raw activity sources
//!
//! A source produces a [`RawTable`] exactly as the upstream store holds it:
//! header names untouched, cells untyped. All interpretation happens in
//! [`crate::normalize`].
//!
//! Two sources ship with the library:
//! - [`FileSource`]: a local CSV export
//! - [`SheetSource`]: a Google Sheets worksheet via the Sheets v4 API
//!
//! [`CachedSource`] wraps either one so the raw table is fetched once per
//! session and reused across chart rebuilds.

mod cache;
mod file;
mod sheet;

pub use cache::CachedSource;
pub use file::FileSource;
pub use sheet::{SheetClient, SheetSource, SheetValues};

use crate::config::{SourceConfig, SourceKind};
use crate::error::Result;
use crate::types::RawTable;

/// Trait implemented by all raw activity sources.
pub trait ActivitySource {
    /// Fetch the full raw table.
    fn load(&self) -> Result<RawTable>;

    /// Human-readable description for logs and status output.
    fn describe(&self) -> String;
}

impl<T: ActivitySource + ?Sized> ActivitySource for Box<T> {
    fn load(&self) -> Result<RawTable> {
        (**self).load()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Build the configured source.
pub fn from_config(config: &SourceConfig) -> Result<Box<dyn ActivitySource>> {
    match config.kind {
        SourceKind::File => Ok(Box::new(FileSource::new(&config.path))),
        SourceKind::Sheet => Ok(Box::new(SheetSource::new(config.sheet.clone())?)),
    }
}
