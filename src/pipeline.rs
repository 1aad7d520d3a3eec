//! Attribute resolution engine
//!
//! A [`Pipeline`] is frozen from a [`PipelineBuilder`] during single-threaded
//! setup. [`Pipeline::run`] orders and limits a batch, then resolves every
//! entry: all resolvers of one entry run in registration order inside a single
//! task, while different entries are processed concurrently on the pool. The
//! call returns only once every (entry, resolver) pair has finished, so shared
//! accumulators may be read right after it.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::entry::Entry;
use crate::error::{ResolveError, Severity};
use crate::fs::FileSystem;
use crate::pool::WorkerPool;
use crate::resolvers::mime::detect_into_cache;
use crate::resolvers::size::prepare_recursive_size;
use crate::resolvers::{Collector, Resolver};
use crate::sort::{Comparator, Prerequisite, Sorter};

/// Rendered in place of a field whose resolver panicked.
pub const PANIC_SENTINEL: &str = "?";

#[derive(Default)]
pub struct PipelineBuilder {
    resolvers: Vec<Box<dyn Resolver>>,
    collectors: Vec<Box<dyn Collector>>,
    sorter: Sorter,
    limit: Option<usize>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a field resolver. Registration order is display order.
    pub fn resolver(mut self, resolver: impl Resolver + 'static) -> Self {
        self.resolvers.push(Box::new(resolver));
        self
    }

    pub fn collector(mut self, collector: impl Collector + 'static) -> Self {
        self.collectors.push(Box::new(collector));
        self
    }

    pub fn sorter(mut self, sorter: Sorter) -> Self {
        self.sorter = sorter;
        self
    }

    /// Keep at most `limit` entries after sorting. 0 means unlimited.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = (limit > 0).then_some(limit);
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            prerequisites: self.sorter.prerequisites(),
            comparator: self.sorter.build(),
            resolvers: self.resolvers,
            collectors: self.collectors,
            limit: self.limit,
        }
    }
}

/// Immutable, shareable run plan.
pub struct Pipeline {
    resolvers: Vec<Box<dyn Resolver>>,
    collectors: Vec<Box<dyn Collector>>,
    comparator: Option<Comparator>,
    prerequisites: Vec<Prerequisite>,
    limit: Option<usize>,
}

/// Per-field failures counted during one resolution pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveSummary {
    /// Fields rendered from an I/O or detection error.
    pub failed: usize,
    /// Fields whose resolver panicked.
    pub panicked: usize,
}

impl ResolveSummary {
    pub fn severity(&self) -> Severity {
        if self.failed + self.panicked > 0 {
            Severity::Minor
        } else {
            Severity::Ok
        }
    }
}

impl Pipeline {
    /// Field names in display order.
    pub fn field_names(&self) -> Vec<&str> {
        self.resolvers.iter().map(|r| r.field()).collect()
    }

    /// Prerequisites, stable sort, limit, then resolution.
    pub fn run(&self, entries: &mut Vec<Entry>, fs: &dyn FileSystem, pool: &WorkerPool) -> ResolveSummary {
        self.order(entries, fs, pool);
        self.resolve(entries, fs, pool)
    }

    /// Sort and limit only.
    pub fn order(&self, entries: &mut Vec<Entry>, fs: &dyn FileSystem, pool: &WorkerPool) {
        if let Some(cmp) = &self.comparator {
            for prerequisite in &self.prerequisites {
                debug!(?prerequisite, entries = entries.len(), "running sort prerequisite");
                pool.install(|| {
                    entries.par_iter_mut().for_each(|entry| match *prerequisite {
                        Prerequisite::RecursiveSize { depth } => {
                            prepare_recursive_size(entry, fs, depth);
                        }
                        Prerequisite::Mime => {
                            // A failed detection leaves the slot empty; it sorts last.
                            let _ = detect_into_cache(entry, fs);
                        }
                    });
                });
            }
            pool.install(|| entries.par_sort_by(|a, b| cmp(a, b)));
        }
        if let Some(limit) = self.limit {
            entries.truncate(limit);
        }
    }

    /// Run every resolver and collector over every entry.
    pub fn resolve(&self, entries: &mut [Entry], fs: &dyn FileSystem, pool: &WorkerPool) -> ResolveSummary {
        debug!(
            entries = entries.len(),
            resolvers = self.resolvers.len(),
            workers = pool.threads(),
            "resolving batch"
        );
        let failed = AtomicUsize::new(0);
        let panicked = AtomicUsize::new(0);
        pool.install(|| {
            entries.par_iter_mut().for_each(|entry| {
                self.resolve_one(entry, fs, &failed, &panicked);
            });
        });
        ResolveSummary {
            failed: failed.into_inner(),
            panicked: panicked.into_inner(),
        }
    }

    fn resolve_one(&self, entry: &mut Entry, fs: &dyn FileSystem, failed: &AtomicUsize, panicked: &AtomicUsize) {
        for (order, resolver) in self.resolvers.iter().enumerate() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| resolver.resolve(entry, fs)));
            let value = match outcome {
                Ok(Ok(value)) => value,
                Ok(Err(ResolveError::Unavailable)) => ResolveError::Unavailable.sentinel(),
                Ok(Err(e)) => {
                    debug!(path = %entry.path.display(), field = resolver.field(), error = %e, "field failed");
                    failed.fetch_add(1, Ordering::Relaxed);
                    e.sentinel()
                }
                Err(_) => {
                    warn!(path = %entry.path.display(), field = resolver.field(), "resolver panicked");
                    panicked.fetch_add(1, Ordering::Relaxed);
                    PANIC_SENTINEL.to_string()
                }
            };
            entry.set_field(resolver.field(), value, order);
        }
        for collector in &self.collectors {
            if panic::catch_unwind(AssertUnwindSafe(|| collector.collect(entry, fs))).is_err() {
                warn!(path = %entry.path.display(), collector = collector.name(), "collector panicked");
                panicked.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::NAME_FIELD;
    use crate::resolvers::{
        ChecksumKind, ChecksumResolver, MimeResolver, NameResolver, PermissionResolver,
        SizeResolver, SizeTotal, SizeUnit,
    };
    use crate::sort::SortSpec;
    use crate::style::{Plain, SharedStyle};
    use crate::test_utils::MemoryFs;
    use std::path::Path;
    use std::sync::Arc;

    fn style() -> SharedStyle {
        Arc::new(Plain)
    }

    fn full_pipeline() -> Pipeline {
        PipelineBuilder::new()
            .resolver(SizeResolver::new(style(), SizeUnit::Auto))
            .resolver(PermissionResolver::new(style()))
            .resolver(MimeResolver::new(style()))
            .resolver(ChecksumResolver::new(style(), vec![ChecksumKind::Sha256]))
            .resolver(NameResolver::new(style()))
            .build()
    }

    fn fixture(count: usize) -> (MemoryFs, Vec<Entry>) {
        let fs = MemoryFs::new();
        fs.add_dir("/d/sub");
        for i in 0..count {
            let content = if i % 3 == 0 {
                b"\x89PNG\r\n\x1a\n".repeat(i + 1)
            } else {
                format!("file number {i}\n").repeat(i).into_bytes()
            };
            fs.add_file(format!("/d/f{i:03}"), content);
        }
        let entries = fs
            .read_dir(Path::new("/d"))
            .unwrap()
            .children
            .iter()
            .map(|p| Entry::from_path(&fs, p).unwrap())
            .collect();
        (fs, entries)
    }

    #[test]
    fn test_concurrent_matches_single() {
        let (fs, mut batch) = fixture(200);
        let pipeline = full_pipeline();
        pipeline.resolve(&mut batch, &fs, &WorkerPool::new(8));

        let single_pool = WorkerPool::new(1);
        for entry in &batch {
            let mut alone = vec![Entry::from_path(&fs, &entry.path).unwrap()];
            pipeline.resolve(&mut alone, &fs, &single_pool);
            assert_eq!(alone[0].fields(), entry.fields(), "{}", entry.path.display());
        }
    }

    #[test]
    fn test_fields_in_registration_order() {
        let (fs, mut batch) = fixture(3);
        let pipeline = full_pipeline();
        pipeline.resolve(&mut batch, &fs, &WorkerPool::new(2));
        assert_eq!(
            batch[0].field_names_by_order(),
            vec!["Size", "Permissions", "Mime-type", "Sum(sha256)", NAME_FIELD]
        );
        assert_eq!(pipeline.field_names().last(), Some(&NAME_FIELD));
    }

    struct Exploding;

    impl Resolver for Exploding {
        fn field(&self) -> &str {
            "Boom"
        }

        fn resolve(&self, entry: &mut Entry, _fs: &dyn FileSystem) -> Result<String, ResolveError> {
            if entry.name.ends_with('1') {
                panic!("boom");
            }
            Ok("ok".to_string())
        }
    }

    #[test]
    fn test_panic_degrades_one_field() {
        let (fs, mut batch) = fixture(4);
        let pipeline = PipelineBuilder::new()
            .resolver(Exploding)
            .resolver(NameResolver::new(style()))
            .build();
        let summary = pipeline.resolve(&mut batch, &fs, &WorkerPool::new(2));
        assert_eq!(summary.panicked, 1);
        assert_eq!(summary.severity(), Severity::Minor);
        let f1 = batch.iter().find(|e| e.name == "f001").unwrap();
        assert_eq!(f1.value("Boom"), Some(PANIC_SENTINEL));
        assert_eq!(f1.value(NAME_FIELD), Some("f001"));
        let f2 = batch.iter().find(|e| e.name == "f002").unwrap();
        assert_eq!(f2.value("Boom"), Some("ok"));
    }

    #[test]
    fn test_io_failure_sentinel() {
        let fs = MemoryFs::new();
        let mut batch = vec![Entry::new("/gone", crate::fs::Stat::default())];
        let pipeline = PipelineBuilder::new()
            .resolver(MimeResolver::new(style()))
            .build();
        let summary = pipeline.resolve(&mut batch, &fs, &WorkerPool::new(1));
        assert_eq!(batch[0].value("Mime-type"), Some("not_found"));
        assert_eq!(summary.failed, 1);
    }

    #[test]
    fn test_sort_limit_and_total() {
        let (fs, mut batch) = fixture(10);
        let total = SizeTotal::default();
        let mut sorter = Sorter::new();
        sorter.add("S".parse::<SortSpec>().unwrap());
        let pipeline = PipelineBuilder::new()
            .resolver(SizeResolver::new(style(), SizeUnit::Byte).with_total(total.clone()))
            .sorter(sorter)
            .limit(3)
            .build();
        pipeline.run(&mut batch, &fs, &WorkerPool::new(4));

        assert_eq!(batch.len(), 3);
        let sizes: Vec<u64> = batch.iter().map(|e| e.stat.size).collect();
        assert!(sizes.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(total.get(), sizes.iter().sum::<u64>());
    }

    #[test]
    fn test_recursive_size_prerequisite_runs_before_sort() {
        let fs = MemoryFs::new();
        fs.add_file("/r/small/a", vec![0; 10]);
        fs.add_file("/r/big/a", vec![0; 100]);
        fs.add_file("/r/big/b", vec![0; 100]);
        let mut batch: Vec<Entry> = ["/r/small", "/r/big"]
            .iter()
            .map(|p| Entry::from_path(&fs, Path::new(p)).unwrap())
            .collect();
        let mut sorter = Sorter::new();
        sorter.add("recursive-size:desc".parse().unwrap());
        let pipeline = PipelineBuilder::new().sorter(sorter).build();
        pipeline.run(&mut batch, &fs, &WorkerPool::new(2));
        assert_eq!(batch[0].name, "big");
        assert_eq!(batch[0].cache_u64(crate::entry::cache_keys::RECURSIVE_SIZE), Some(200));
    }

    #[test]
    fn test_size_column_ignores_recursive_sort() {
        let fs = MemoryFs::new();
        fs.add_file("/r/d/a", vec![0; 10]);
        fs.add_file("/r/d/sub/b", vec![0; 1000]);
        let depth = 0;

        let mut rendered = Vec::new();
        for with_sort in [false, true] {
            let mut batch = vec![Entry::from_path(&fs, Path::new("/r/d")).unwrap()];
            let mut sorter = Sorter::new();
            sorter.recursive_depth(depth);
            if with_sort {
                sorter.add("rsize".parse().unwrap());
            }
            let pipeline = PipelineBuilder::new()
                .resolver(SizeResolver::new(style(), SizeUnit::Byte).with_recursive(depth))
                .sorter(sorter)
                .build();
            pipeline.run(&mut batch, &fs, &WorkerPool::new(2));
            rendered.push(batch[0].value("Size").map(str::to_string));
        }
        assert_eq!(rendered, vec![Some("10 B".to_string()), Some("10 B".to_string())]);
    }
}
