//! CLI entry point for lsg

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::{self, BufWriter, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::SystemTime;

use clap::{CommandFactory, FromArgMatches, Parser, ValueEnum};
use tracing::{debug, warn};

use lsg::config::parse_age;
use lsg::error::{ConfigError, Error};
use lsg::fs::TimeKind;
use lsg::output::{JsonListing, write_duplicates, write_json, write_lines, write_total, write_tree};
use lsg::resolvers::size::format_size;
use lsg::resolvers::{
    BlocksResolver, CharsetResolver, ChecksumKind, ChecksumResolver, DuplicateDetector,
    GitResolver, GitStatusCache, GroupResolver, IdNames, InodeResolver, LinkResolver,
    MimeResolver, NameResolver, OctalResolver, OwnerResolver, PermissionResolver, SizeResolver,
    SizeTotal, SizeUnit, SymlinkTargetAnnotator, TimeFormat, TimeResolver,
};
use lsg::style::{self, SharedStyle};
use lsg::{
    AlignConfig, Entry, EntryFilter, FileConfig, FileSystem, GlyphSet, ListingConfig, Mode,
    NativeFs, OutputConfig, Pipeline, PipelineBuilder, Severity, SortSpec, Sorter, Tree,
    WalkerConfig, Walker, WorkerPool, align_batch, assemble, logging,
};

/// Color output mode
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum ColorMode {
    /// Color when stdout is a terminal
    #[default]
    Auto,
    Always,
    Never,
}

fn should_use_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => {
            if std::env::var_os("NO_COLOR").is_some() {
                return false;
            }
            if std::env::var_os("FORCE_COLOR").is_some() {
                return true;
            }
            if std::env::var("TERM").is_ok_and(|t| t == "dumb") {
                return false;
            }
            io::stdout().is_terminal()
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "lsg")]
#[command(about = "ls with many more columns, sorted, aligned and treed")]
#[command(version)]
struct Args {
    /// Files or directories to list
    #[arg(default_value = ".")]
    paths: Vec<PathBuf>,

    /// Show entries whose names start with '.'
    #[arg(short, long)]
    all: bool,

    /// List directories only
    #[arg(short = 'D', long = "dirs-only")]
    dirs_only: bool,

    /// List subdirectories recursively
    #[arg(short = 'R', long = "recurse", conflicts_with = "tree")]
    recurse: bool,

    /// Draw the listing as a tree
    #[arg(short = 'T', long = "tree")]
    tree: bool,

    /// Descend only N levels deep (recurse and tree modes)
    #[arg(short = 'L', long = "level", value_parser = clap::value_parser!(u32).range(1..))]
    level: Option<u32>,

    /// Long listing: permissions, links, owner, group, size and time
    #[arg(short = 'l', long = "long")]
    long: bool,

    /// Show sizes
    #[arg(short = 's', long = "size")]
    size: bool,

    /// Size unit: auto, bit, B, KB, MB, GB, TB, PB, EB
    #[arg(long = "size-unit", value_name = "UNIT", default_value = "auto")]
    size_unit: String,

    /// Show directory sizes as the total size of their contents
    #[arg(long = "recursive-size")]
    recursive_size: bool,

    /// Show the sum of every listed size
    #[arg(long = "total-size")]
    total_size: bool,

    /// Show owners
    #[arg(long = "owner")]
    owner: bool,

    /// Show groups
    #[arg(long = "group")]
    group: bool,

    /// Show numeric uid and gid instead of names
    #[arg(long = "numeric")]
    numeric: bool,

    /// Show permission strings
    #[arg(long = "perm")]
    perm: bool,

    /// Show octal permissions
    #[arg(long = "octal")]
    octal: bool,

    /// Show inode numbers
    #[arg(short = 'i', long = "inode")]
    inode: bool,

    /// Show hard link counts
    #[arg(long = "link")]
    link: bool,

    /// Show allocated block counts
    #[arg(long = "blocks")]
    blocks: bool,

    /// Show modification times
    #[arg(long = "time")]
    time: bool,

    /// Timestamps to show: mod, access, create (implies --time)
    #[arg(long = "time-type", value_name = "TYPE", value_delimiter = ',')]
    time_type: Vec<String>,

    /// Time style: default, full-iso, long-iso, iso, locale, relative or +FORMAT
    #[arg(long = "time-style", value_name = "STYLE")]
    time_style: Option<String>,

    /// Show mime types
    #[arg(long = "mime")]
    mime: bool,

    /// Show only the top-level part of mime types
    #[arg(long = "mime-parent")]
    mime_parent: bool,

    /// Show text charsets
    #[arg(long = "charset")]
    charset: bool,

    /// Show checksums: md5, sha1, sha224, sha256, sha384, sha512
    #[arg(long = "checksum", value_name = "ALGO", value_delimiter = ',')]
    checksum: Vec<String>,

    /// Show git status
    #[arg(long = "git-status")]
    git_status: bool,

    /// Append a type indicator (/ * @ | =) to names
    #[arg(short = 'F', long = "classify")]
    classify: bool,

    /// Show full paths instead of names
    #[arg(long = "full-path")]
    full_path: bool,

    /// Report files with identical contents
    #[arg(long = "duplicate")]
    duplicate: bool,

    /// Hash every byte when looking for duplicates
    #[arg(long = "thorough", requires = "duplicate")]
    thorough: bool,

    /// Sort keys, applied in order (e.g. name, size:desc, t, version, none)
    #[arg(long = "sort", value_name = "KEY", value_delimiter = ',')]
    sort: Vec<String>,

    /// Reverse the sort order
    #[arg(short = 'r', long = "reverse")]
    reverse: bool,

    /// List directories before files
    #[arg(long = "dir-first")]
    dir_first: bool,

    /// Show at most N entries per root (ignored in tree mode)
    #[arg(short = 'n', long = "limit", value_name = "N", default_value = "0")]
    limit: usize,

    /// Print a title row above the listing
    #[arg(long = "header")]
    header: bool,

    /// Print a title row below the listing
    #[arg(long = "footer")]
    footer: bool,

    /// Output JSON
    #[arg(long = "json")]
    json: bool,

    /// Tree glyphs: unicode, ascii, rectangle
    #[arg(long = "tree-style", value_name = "STYLE")]
    tree_style: Option<String>,

    /// Control color output: auto, always, never
    #[arg(long = "color", value_name = "WHEN", default_value = "auto")]
    color: ColorMode,

    /// Number of worker threads (0 = available parallelism)
    #[arg(short = 'j', long = "jobs", default_value = "0")]
    jobs: usize,

    /// Ignore names matching pattern (can be used multiple times)
    #[arg(short = 'I', long = "ignore")]
    ignore: Vec<String>,

    /// Skip paths matched by .gitignore files
    #[arg(long = "git-ignore")]
    git_ignore: bool,

    /// Only show files modified after AGE (duration like 2h or a timestamp)
    #[arg(long = "newer", value_name = "AGE")]
    newer: Option<String>,

    /// Only show files modified before AGE
    #[arg(long = "older", value_name = "AGE")]
    older: Option<String>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,

    /// Ignore the config file
    #[arg(long = "no-config")]
    no_config: bool,
}

/// Field options validated before any listing starts.
struct FieldConfig {
    size: bool,
    size_unit: SizeUnit,
    times: Vec<TimeKind>,
    time_format: TimeFormat,
    checksums: Vec<ChecksumKind>,
    owner: bool,
    group: bool,
    perm: bool,
    link: bool,
}

impl FieldConfig {
    fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let mut times = args
            .time_type
            .iter()
            .map(|t| t.parse())
            .collect::<Result<Vec<TimeKind>, _>>()?;
        if times.is_empty() && (args.time || args.long) {
            times.push(TimeKind::Modified);
        }
        let time_format = match &args.time_style {
            Some(style) => TimeFormat::parse_style(style)?,
            None => TimeFormat::default(),
        };
        Ok(Self {
            size: args.size || args.long || args.recursive_size,
            size_unit: args.size_unit.parse()?,
            times,
            time_format,
            checksums: args
                .checksum
                .iter()
                .map(|c| c.parse())
                .collect::<Result<_, _>>()?,
            owner: args.owner || args.long,
            group: args.group || args.long,
            perm: args.perm || args.long,
            link: args.link || args.long,
        })
    }
}

fn listing_config(args: &Args, now: SystemTime) -> Result<ListingConfig, ConfigError> {
    let mode = if args.tree {
        Mode::Tree
    } else if args.recurse {
        Mode::Recurse
    } else {
        Mode::List
    };
    Ok(ListingConfig {
        mode,
        depth: args.level.map_or(-1, |level| i64::from(level) - 1),
        limit: args.limit,
        sort: args
            .sort
            .iter()
            .map(|s| s.parse())
            .collect::<Result<Vec<SortSpec>, _>>()?,
        reverse: args.reverse,
        dir_first: args.dir_first,
        jobs: args.jobs,
        walker: WalkerConfig {
            show_all: args.all,
            dirs_only: args.dirs_only,
            ignore_patterns: args.ignore.clone(),
            git_ignore: args.git_ignore,
            newer_than: args.newer.as_deref().map(|s| parse_age(s, now)).transpose()?,
            older_than: args.older.as_deref().map(|s| parse_age(s, now)).transpose()?,
        },
    })
}

/// Shared state of one listing run.
struct Context<'a> {
    args: &'a Args,
    fields: FieldConfig,
    listing: ListingConfig,
    output: OutputConfig,
    style: SharedStyle,
    names: Arc<IdNames>,
    fs: &'a dyn FileSystem,
}

/// One fully resolved root.
struct Batch {
    root: PathBuf,
    entries: Vec<Entry>,
    tree: Option<Tree>,
    titles: Option<Vec<String>>,
    total: Option<String>,
    duplicates: Vec<Vec<PathBuf>>,
}

impl Context<'_> {
    fn pipeline(
        &self,
        git: Option<&GitStatusCache>,
        total: &SizeTotal,
        duplicates: Option<Arc<DuplicateDetector>>,
    ) -> Pipeline {
        let args = self.args;
        let fields = &self.fields;
        let style = &self.style;
        let mut builder = PipelineBuilder::new();

        if args.inode {
            builder = builder.resolver(InodeResolver::new(style.clone()));
        }
        if fields.perm {
            builder = builder.resolver(PermissionResolver::new(style.clone()));
        }
        if args.octal {
            builder = builder.resolver(OctalResolver::new(style.clone()));
        }
        if fields.link {
            builder = builder.resolver(LinkResolver::new(style.clone()));
        }
        if fields.owner {
            builder = builder
                .resolver(OwnerResolver::new(style.clone(), self.names.clone()).numeric(args.numeric));
        }
        if fields.group {
            builder = builder
                .resolver(GroupResolver::new(style.clone(), self.names.clone()).numeric(args.numeric));
        }
        if fields.size {
            let mut size = SizeResolver::new(style.clone(), fields.size_unit).with_total(total.clone());
            if args.recursive_size {
                size = size.with_recursive(self.listing.depth);
            }
            builder = builder.resolver(size);
        }
        if args.blocks {
            builder = builder.resolver(BlocksResolver::new(style.clone()));
        }
        for &kind in &fields.times {
            builder = builder.resolver(TimeResolver::new(
                style.clone(),
                kind,
                fields.time_format.clone(),
            ));
        }
        if args.git_status {
            builder = builder.resolver(GitResolver::new(style.clone(), git.cloned()));
        }
        if args.mime || args.mime_parent {
            builder = builder.resolver(MimeResolver::new(style.clone()).parent_only(args.mime_parent));
        }
        if args.charset {
            builder = builder.resolver(CharsetResolver::new(style.clone()));
        }
        if !fields.checksums.is_empty() {
            builder = builder.resolver(ChecksumResolver::new(style.clone(), fields.checksums.clone()));
        }
        builder = builder.resolver(
            NameResolver::new(style.clone())
                .with_classify(args.classify)
                .with_full_path(args.full_path),
        );

        if let Some(detector) = duplicates {
            builder = builder.collector(detector);
        }
        builder = builder.collector(SymlinkTargetAnnotator::new(style.clone()));

        let mut sorter = Sorter::new().with_names(self.names.clone());
        sorter.recursive_depth(self.listing.depth);
        for spec in &self.listing.sort {
            sorter.add(spec.clone());
        }
        if self.listing.reverse {
            sorter.reverse();
        }
        if self.listing.dir_first {
            sorter.dir_first();
        }
        let limit = match self.listing.mode {
            Mode::Tree => 0,
            _ => self.listing.limit,
        };
        builder.sorter(sorter).limit(limit).build()
    }

    /// Walk one root and resolve it into batches: one per root, or one per
    /// directory read in recurse mode.
    fn list_root(&self, root: &Path, pool: &WorkerPool) -> Result<(Vec<Batch>, Severity), Error> {
        let mut severity = Severity::Ok;
        let filter = EntryFilter::new(&self.listing.walker, root)?;
        let walker = Walker::new(self.fs, filter, pool);
        let outcome = match self.listing.mode {
            Mode::List => walker.list(root)?,
            Mode::Recurse | Mode::Tree => walker.walk(root, self.listing.depth)?,
        };
        for error in &outcome.errors {
            eprintln!("lsg: {error}");
            severity.escalate(Severity::Minor);
        }

        let sections = match self.listing.mode {
            Mode::Recurse => recurse_sections(root, outcome.entries, self.listing.depth),
            _ => vec![(root.to_path_buf(), outcome.entries)],
        };
        let git = self
            .args
            .git_status
            .then(|| GitStatusCache::discover(root))
            .flatten();
        let duplicates = self
            .args
            .duplicate
            .then(|| Arc::new(DuplicateDetector::new(self.args.thorough)));

        let mut batches = Vec::with_capacity(sections.len());
        for (dir, entries) in sections {
            let (batch, section_severity) =
                self.resolve_section(dir, entries, git.as_ref(), duplicates.clone(), pool)?;
            severity.escalate(section_severity);
            batches.push(batch);
        }
        if let (Some(detector), Some(last)) = (duplicates, batches.last_mut()) {
            last.duplicates = detector.result();
        }
        debug!(root = %root.display(), sections = batches.len(), "root listed");
        Ok((batches, severity))
    }

    fn resolve_section(
        &self,
        dir: PathBuf,
        mut entries: Vec<Entry>,
        git: Option<&GitStatusCache>,
        duplicates: Option<Arc<DuplicateDetector>>,
        pool: &WorkerPool,
    ) -> Result<(Batch, Severity), Error> {
        let total = SizeTotal::default();
        let pipeline = self.pipeline(git, &total, duplicates);
        let summary = pipeline.run(&mut entries, self.fs, pool);
        if summary.panicked > 0 {
            warn!(dir = %dir.display(), panicked = summary.panicked, "resolvers panicked");
        }

        let mut titles = None;
        if !self.output.json {
            let config = AlignConfig::default();
            let mut table = align_batch(&mut entries, &config);
            if self.output.header || self.output.footer {
                let names: Vec<String> = pipeline.field_names().iter().map(|n| n.to_string()).collect();
                titles = Some(table.header_row(&mut entries, &config, &names));
            }
        }

        let tree = match self.listing.mode {
            Mode::Tree => Some(assemble(&entries)?),
            _ => None,
        };

        let total = self.output.total_size.then(|| {
            let bytes = if self.fields.size {
                total.get()
            } else {
                entries.iter().filter(|e| !e.is_dir()).map(|e| e.stat.size).sum()
            };
            format_size(bytes, self.fields.size_unit)
        });

        Ok((
            Batch {
                root: dir,
                entries,
                tree,
                titles,
                total,
                duplicates: Vec::new(),
            },
            summary.severity(),
        ))
    }

    fn print<W: Write>(&self, out: &mut W, batch: &Batch, titled: bool) -> io::Result<()> {
        if titled {
            writeln!(out, "{}:", batch.root.display())?;
        }
        match &batch.tree {
            Some(tree) => write_tree(
                out,
                &batch.entries,
                tree,
                &self.output.glyphs,
                batch.titles.as_deref().filter(|_| self.output.header),
                self.style.as_ref(),
            )?,
            None => write_lines(
                out,
                &batch.entries,
                batch.titles.as_deref(),
                self.output.header,
                self.output.footer,
                self.style.as_ref(),
            )?,
        }
        if let Some(total) = &batch.total {
            write_total(out, total)?;
        }
        write_duplicates(out, &batch.duplicates)
    }
}

/// Split a recursive walk into one section per directory that was read, keyed
/// by that directory: the root first, then every subdirectory depth-first.
/// A directory that was read but holds nothing visible keeps an empty section.
fn recurse_sections(root: &Path, entries: Vec<Entry>, depth: i64) -> Vec<(PathBuf, Vec<Entry>)> {
    let mut entries = entries.into_iter();
    let Some(root_entry) = entries.next() else {
        return Vec::new();
    };
    if !root_entry.is_dir() {
        return vec![(root.to_path_buf(), vec![root_entry])];
    }
    let mut sections: BTreeMap<PathBuf, Vec<Entry>> = BTreeMap::new();
    sections.insert(root.to_path_buf(), Vec::new());
    for entry in entries {
        let was_read = entry
            .depth
            .is_some_and(|d| depth < 0 || d as i64 <= depth);
        if entry.is_dir() && was_read {
            sections.entry(entry.path.clone()).or_default();
        }
        if let Some(parent) = entry.parent.clone() {
            sections.entry(parent).or_default().push(entry);
        }
    }
    sections.into_iter().collect()
}

fn run(args: &Args, file_config: &FileConfig) -> Result<Severity, Error> {
    let use_color = should_use_color(args.color) && !args.json;
    let glyphs = match &args.tree_style {
        Some(name) => name.parse::<GlyphSet>()?,
        None => file_config.tree_style.clone().unwrap_or_default(),
    };
    let fs = NativeFs;
    let ctx = Context {
        args,
        fields: FieldConfig::from_args(args)?,
        listing: listing_config(args, SystemTime::now())?,
        output: OutputConfig {
            use_color,
            json: args.json,
            header: args.header,
            footer: args.footer,
            total_size: args.total_size,
            glyphs,
        },
        style: style::shared(use_color),
        names: Arc::new(IdNames::new()),
        fs: &fs,
    };
    let pool = WorkerPool::new(ctx.listing.jobs);
    debug!(threads = pool.threads(), roots = args.paths.len(), "starting");

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut severity = Severity::Ok;
    let mut batches = Vec::new();
    let multiple_roots = args.paths.len() > 1 && ctx.listing.mode != Mode::Tree;
    let mut printed = false;

    for root in &args.paths {
        let (root_batches, root_severity) = match ctx.list_root(root, &pool) {
            Ok(listed) => listed,
            Err(e @ Error::Root { .. }) => {
                out.flush()?;
                eprintln!("lsg: {e}");
                severity.escalate(Severity::Serious);
                continue;
            }
            Err(e) => return Err(e),
        };
        severity.escalate(root_severity);
        if args.json {
            batches.extend(root_batches);
            continue;
        }
        let titled = multiple_roots || root_batches.len() > 1;
        for batch in &root_batches {
            if printed && titled {
                writeln!(out)?;
            }
            ctx.print(&mut out, batch, titled)?;
            printed = true;
        }
    }

    if args.json {
        let listings: Vec<JsonListing<'_>> = batches
            .iter()
            .map(|b| {
                let mut listing =
                    JsonListing::new(b.root.display().to_string(), &b.entries, b.tree.as_ref());
                listing.total = b.total.clone();
                listing.duplicates = b
                    .duplicates
                    .iter()
                    .map(|g| g.iter().map(|p| p.display().to_string()).collect())
                    .collect();
                listing
            })
            .collect();
        write_json(&mut out, &listings)?;
    }
    out.flush()?;
    Ok(severity)
}

fn main() {
    let argv: Vec<OsString> = std::env::args_os().collect();
    let no_config = argv.iter().skip(1).any(|a| a == "--no-config");
    let file_config = FileConfig::discover(no_config).unwrap_or_else(|e| {
        eprintln!("lsg: {e}");
        process::exit(2);
    });

    let matches = Args::command().get_matches_from(file_config.merge_args(argv));
    let args = Args::from_arg_matches(&matches).unwrap_or_else(|e| {
        eprintln!("lsg: argument parsing error: {e}");
        process::exit(2);
    });
    logging::init(args.verbose);

    let code = match run(&args, &file_config) {
        Ok(severity) => severity.exit_code(),
        Err(Error::Io(e)) if e.kind() == io::ErrorKind::BrokenPipe => 0,
        Err(e) => {
            eprintln!("lsg: {e}");
            Severity::Serious.exit_code()
        }
    };
    process::exit(code);
}
