//! Packaged-artifact inspection and comparison tools.
//!
//! Reads and compares the contents of tar archives, Debian `.deb` packages,
//! RPM packages, and macOS `.pkg`/`.dmg` installers without shelling out to
//! any external tool, and can synthesize RPM packages from a directory tree.
//!
//! # Comparing two trees
//! ```bash
//! $ pkginspect compare reference.tar got.tar
//! ```
//!
//! # Building an RPM
//! ```bash
//! $ pkginspect rpm-build --name demo --version 1.0 --release 1 \
//!     --arch x86_64 --license MIT --summary "demo package" \
//!     --group Applications/System --root ./payload --out demo.rpm
//! ```
//!
//! # Inspecting an RPM
//! ```bash
//! $ pkginspect rpm-info --analyze --list demo.rpm
//! ```
use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

mod binreader;
mod compare;
mod compress;
mod cpio;
mod deb_reader;
mod dmg_reader;
mod error;
mod fileinfo;
mod fs_walk;
mod hfsplus;
mod open_tree;
mod pipe;
mod rpm_header;
mod rpm_reader;
mod rpm_tags;
mod rpm_writer;
mod saved_tree;
mod tar_reader;
mod tree_reader;
mod udif;
mod xar;

use compare::CompareFlags;
use compress::Compression as PayloadCompression;
use rpm_reader::RpmFile;
use rpm_writer::{PackageMeta, RpmWriter};

/// Packaged-artifact inspection and comparison tools.
#[doc(hidden)]
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[doc(hidden)]
#[derive(Subcommand)]
enum Commands {
    /// Compare a reference tree against an observed tree.
    Compare {
        /// Reference tree: tar/deb/rpm/pkg/dmg, or a saved-tree `.json`.
        #[clap(value_parser)]
        expected: PathBuf,

        /// Observed tree in the same set of formats.
        #[clap(value_parser)]
        got: PathBuf,

        /// Only consider paths matching at least one of these regexes.
        #[clap(long = "include")]
        include: Vec<String>,

        /// Exclude paths matching any of these regexes.
        #[clap(long = "exclude")]
        exclude: Vec<String>,

        /// Absolute byte increase allowed before a size change fails (0 = disabled).
        #[clap(long, default_value_t = 0)]
        max_abs_increase: u64,

        /// Percent increase allowed before a size change fails.
        #[clap(long, default_value_t = 100.0)]
        max_pct_increase: f64,

        /// Treat size decreases as passing regardless of threshold.
        #[clap(long)]
        no_show_decreases: bool,

        /// Files smaller than this on both sides always pass the size check.
        #[clap(long, default_value_t = 0)]
        min_compare_size: u64,

        /// Ignore uid/gid differences when classifying metadata changes.
        #[clap(long)]
        no_compare_uid_gid: bool,
    },

    /// Synthesize an RPM package from a directory tree.
    RpmBuild {
        #[clap(long)]
        name: String,
        #[clap(long)]
        version: String,
        #[clap(long)]
        release: String,
        #[clap(long)]
        arch: String,
        #[clap(long)]
        license: String,
        #[clap(long)]
        summary: String,
        #[clap(long, default_value = "")]
        description: String,
        #[clap(long)]
        group: String,
        #[clap(long, value_parser, default_value = "gzip")]
        compression: String,

        /// Directory whose contents become the package payload.
        #[clap(value_parser)]
        root: PathBuf,

        /// Output `.rpm` path.
        #[clap(long)]
        out: PathBuf,
    },

    /// Inspect an RPM's lead, signature, header, and payload.
    RpmInfo {
        #[clap(value_parser)]
        path: PathBuf,

        /// Print a one-line summary (name/version/release/arch).
        #[clap(short, long)]
        analyze: bool,

        /// Print the full list of header tags.
        #[clap(short = 'H', long)]
        headers: bool,

        /// List the payload's files.
        #[clap(short, long)]
        list: bool,

        /// Print only the advisory tag-name table.
        #[clap(short, long)]
        names: bool,

        /// Write the raw main header bytes to a file.
        #[clap(short = 'x', long)]
        extract_header: Option<PathBuf>,

        #[clap(short, long)]
        verbose: bool,
    },

    /// Report cumulative size per top-level directory in a tar archive.
    TarSize {
        #[clap(value_parser)]
        path: PathBuf,
    },
}

fn run_compare(
    expected: PathBuf,
    got: PathBuf,
    include: Vec<String>,
    exclude: Vec<String>,
    max_abs_increase: u64,
    max_pct_increase: f64,
    no_show_decreases: bool,
    min_compare_size: u64,
    no_compare_uid_gid: bool,
) -> Result<()> {
    let expected_entries =
        open_tree::open_tree(&expected).with_context(|| format!("opening {:?}", expected))?;
    let mut got_entries = saved_tree::SavedTreeReader::new(
        open_tree::open_tree(&got).with_context(|| format!("opening {:?}", got))?,
    );

    let flags = CompareFlags {
        max_allowed_absolute_increase: max_abs_increase,
        max_allowed_percent_increase: max_pct_increase,
        show_decreases: !no_show_decreases,
        minimum_compare_size: min_compare_size,
        include_patterns: include,
        exclude_patterns: exclude,
        compare_uid_gid: !no_compare_uid_gid,
    };

    let result = compare::stream_compare(expected_entries, &mut got_entries, &flags)?;

    for f in &result.only_in_expected {
        println!("only in expected: {}", f.path);
    }
    for f in &result.only_in_got {
        println!("only in got: {}", f.path);
    }
    for (path, old, new) in &result.symlink_target_changed {
        println!("symlink target changed: {} ({} -> {})", path, old, new);
    }
    for (path, _, _) in &result.metadata_changed {
        println!("metadata changed: {}", path);
    }
    for change in &result.size_changed {
        let verdict = if change.passed { "pass" } else { "FAIL" };
        println!(
            "size changed: {} ({} -> {} bytes) [{}] {}",
            change.path, change.old_size, change.new_size, verdict, change.message
        );
    }

    if result.has_differences() {
        std::process::exit(1);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_rpm_build(
    name: String,
    version: String,
    release: String,
    arch: String,
    license: String,
    summary: String,
    description: String,
    group: String,
    compression: String,
    root: PathBuf,
    out: PathBuf,
) -> Result<()> {
    let compression = match compression.as_str() {
        "gzip" => PayloadCompression::Gzip,
        "xz" => PayloadCompression::Xz,
        "bzip2" => PayloadCompression::Bzip2,
        "none" => PayloadCompression::None,
        other => anyhow::bail!("unsupported rpm-build compression {:?}", other),
    };

    let entries = fs_walk::walk_directory(&root).with_context(|| format!("walking {:?}", root))?;

    let mut writer = RpmWriter::new(PackageMeta {
        name,
        version,
        release,
        arch,
        license,
        summary,
        description,
        group,
        build_host: hostname(),
        build_time: 0,
        compression,
    });

    for entry in entries {
        match entry.kind {
            rpm_writer::EntryKind::Directory => {
                writer.add_directory(entry.path, entry.mode, entry.uid, entry.gid)
            }
            rpm_writer::EntryKind::File { content } => {
                writer.add_file(entry.path, content, entry.mode, entry.uid, entry.gid)
            }
            rpm_writer::EntryKind::Symlink { target } => {
                writer.add_symlink(entry.path, target, entry.mode, entry.uid, entry.gid)
            }
        }
    }

    let bytes = writer.write()?;
    std::fs::write(&out, &bytes).with_context(|| format!("writing {:?}", out))?;
    println!("wrote {:?}, size = {} bytes", out, bytes.len());
    Ok(())
}

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

fn run_rpm_info(
    path: PathBuf,
    analyze: bool,
    headers: bool,
    list: bool,
    names: bool,
    extract_header: Option<PathBuf>,
    verbose: bool,
) -> Result<()> {
    let buf = std::fs::read(&path).with_context(|| format!("reading {:?}", path))?;
    let rpm = RpmFile::parse(&buf).with_context(|| format!("parsing {:?}", path))?;

    if names || (!analyze && !headers && !list && extract_header.is_none()) {
        for (tag, name) in rpm_tags::TAG_NAMES {
            println!("{}\t{}", tag, name);
        }
    }

    if analyze {
        println!(
            "{}-{}-{} {} ({})",
            rpm.string_tag(rpm_tags::NAME).unwrap_or_default(),
            rpm.string_tag(rpm_tags::VERSION).unwrap_or_default(),
            rpm.string_tag(rpm_tags::RELEASE).unwrap_or_default(),
            rpm.string_tag(rpm_tags::ARCH).unwrap_or_default(),
            rpm.lead.name,
        );
    }

    if headers {
        println!(
            "lead: major={} minor={} os={} sig_type={}",
            rpm.lead.major, rpm.lead.minor, rpm.lead.os, rpm.lead.signature_type
        );
        if verbose {
            for (tag, name) in rpm_tags::TAG_NAMES {
                if let Some(value) = rpm.header.get(*tag) {
                    println!("  {} ({}): {:?}", name, tag, value);
                }
            }
        }
    }

    if let Some(out_path) = extract_header {
        std::fs::write(&out_path, rpm.header.build())
            .with_context(|| format!("writing {:?}", out_path))?;
    }

    if list {
        for f in rpm.list()? {
            println!("{:o}\t{}\t{}", f.mode, f.size, f.path);
        }
    }

    Ok(())
}

fn run_tar_size(path: PathBuf) -> Result<()> {
    let entries = open_tree::open_tree(&path).with_context(|| format!("opening {:?}", path))?;

    let mut by_top: BTreeMap<String, u64> = BTreeMap::new();
    for entry in &entries {
        if entry.is_dir {
            continue;
        }
        let top = entry
            .path
            .split('/')
            .next()
            .unwrap_or(&entry.path)
            .to_string();
        *by_top.entry(top).or_insert(0) += entry.size;
    }

    let mut sorted: Vec<(String, u64)> = by_top.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1));
    for (name, size) in sorted {
        println!("{}\t{}", size, name);
    }
    Ok(())
}

#[doc(hidden)]
fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Compare {
            expected,
            got,
            include,
            exclude,
            max_abs_increase,
            max_pct_increase,
            no_show_decreases,
            min_compare_size,
            no_compare_uid_gid,
        } => run_compare(
            expected,
            got,
            include,
            exclude,
            max_abs_increase,
            max_pct_increase,
            no_show_decreases,
            min_compare_size,
            no_compare_uid_gid,
        ),
        Commands::RpmBuild {
            name,
            version,
            release,
            arch,
            license,
            summary,
            description,
            group,
            compression,
            root,
            out,
        } => run_rpm_build(
            name, version, release, arch, license, summary, description, group, compression, root, out,
        ),
        Commands::RpmInfo {
            path,
            analyze,
            headers,
            list,
            names,
            extract_header,
            verbose,
        } => run_rpm_info(path, analyze, headers, list, names, extract_header, verbose),
        Commands::TarSize { path } => run_tar_size(path),
    }
}
