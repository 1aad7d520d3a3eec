//! lsg - ls with many more columns, sorted, aligned and treed
//!
//! A listing pass walks each root into a batch of [`Entry`] values, orders and
//! limits the batch, resolves every requested field concurrently, pads the
//! columns and hands the result to a printer.

pub mod align;
pub mod config;
pub mod entry;
pub mod error;
pub mod fs;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod pool;
pub mod resolvers;
pub mod sort;
pub mod style;
pub mod tree;
pub mod walk;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use align::{AlignConfig, WidthTable, align_batch};
pub use config::{FileConfig, ListingConfig, Mode, OutputConfig};
pub use entry::{Entry, Field};
pub use error::{Error, Result, Severity};
pub use fs::{DirListing, FileSystem, NativeFs};
pub use pipeline::{Pipeline, PipelineBuilder, ResolveSummary};
pub use pool::WorkerPool;
pub use sort::{SortKey, SortSpec, Sorter};
pub use tree::{GlyphSet, Tree, assemble};
pub use walk::{EntryFilter, WalkOutcome, Walker, WalkerConfig};
