//! USD dependency inspection CLI.
//!
//! Walks a root layer and prints every file it depends on: sublayers,
//! references, payloads (including those inside unselected variants) and value
//! clip sequences. With `--batch` every root under a directory is walked in
//! parallel and only missing dependencies are summarized.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use walkdir::WalkDir;

use usd_depgraph::{DependencyGraph, DependencyWalker, LogReporter, WalkError, WalkOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
    Dot,
}

/// Discover the file dependencies of a USD asset.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Root layer to walk, or a directory with --batch.
    #[arg(value_name = "PATH")]
    path: PathBuf,

    /// Output format for the graph.
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Only list dependencies whose file is missing.
    #[arg(long)]
    offline_only: bool,

    /// List nodes whose name matches a substring or glob (case-insensitive).
    #[arg(long, value_name = "PATTERN")]
    find: Option<String>,

    /// Print the file path of a node.
    #[arg(long, value_name = "NODE")]
    print_path: Option<String>,

    /// Print the text of a .usda node.
    #[arg(long, value_name = "NODE")]
    view: Option<String>,

    /// Treat a layer as muted (can be specified multiple times).
    #[arg(long = "mute", value_name = "ID")]
    muted: Vec<String>,

    /// Extra directory to resolve search-path asset paths against (can be specified multiple times).
    #[arg(long = "search-path", value_name = "DIR")]
    search_paths: Vec<PathBuf>,

    /// TOML file with walk options.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Keep layers that were only discovered through the layer walk unconnected.
    #[arg(long)]
    no_repair: bool,

    /// Walk every .usd/.usda root under PATH in parallel.
    #[arg(long)]
    batch: bool,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp(None)
        .format_module_path(false)
        .init();
}

fn walk_options(args: &Args) -> Result<WalkOptions> {
    let mut options = match &args.config {
        Some(path) => WalkOptions::load(path)?,
        None => WalkOptions::default(),
    };
    options.apply_env_overrides();

    for id in &args.muted {
        options = options.with_muted(id.clone());
    }
    for dir in &args.search_paths {
        options = options.with_search_path(dir.clone());
    }
    if args.no_repair {
        options.repair_connectivity = false;
    }
    Ok(options)
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);
    let start = Instant::now();

    let result = if args.batch {
        run_batch(&args)
    } else {
        run_single(&args)
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("Error: {err:#}");
            std::process::exit(1);
        }
    }

    if args.batch {
        println!("\nTime elapsed: {:.2}s", start.elapsed().as_secs_f64());
    }
}

fn run_single(args: &Args) -> Result<bool> {
    let options = walk_options(args)?;
    let graph = DependencyWalker::new(&args.path, options)
        .with_reporter(LogReporter)
        .start()?;

    if let Some(pattern) = &args.find {
        for node in graph.find_nodes(pattern)? {
            println!("{}", node.key);
        }
        return Ok(true);
    }

    if let Some(key) = &args.print_path {
        let key = lookup(&graph, key)?;
        match graph.node_path(&key) {
            Some(path) => println!("{path}"),
            None => bail!("unknown node {key}"),
        }
        return Ok(true);
    }

    if let Some(key) = &args.view {
        let key = lookup(&graph, key)?;
        print!("{}", graph.read_ascii(&key)?);
        return Ok(true);
    }

    if args.offline_only {
        for node in graph.offline_nodes() {
            println!("[{}] {}", node.kind.as_str(), node.key);
        }
        return Ok(true);
    }

    match args.format {
        Format::Text => print_text(&graph),
        Format::Json => println!("{}", graph.to_json().context("Failed to serialize graph")?),
        Format::Dot => print!("{}", graph.to_dot()),
    }
    Ok(true)
}

/// Accept either a full node key or a unique display label.
fn lookup(graph: &DependencyGraph, name: &str) -> Result<String> {
    if graph.contains_node(name) {
        return Ok(name.to_owned());
    }
    let matches: Vec<&str> = graph
        .nodes()
        .iter()
        .filter(|node| graph.display_label(&node.key) == name)
        .map(|node| node.key.as_str())
        .collect();
    match matches.as_slice() {
        [key] => Ok((*key).to_owned()),
        [] => bail!("no node named {name}"),
        _ => bail!("{name} is ambiguous, use the full path: {}", matches.join(", ")),
    }
}

fn print_text(graph: &DependencyGraph) {
    println!("Root: {}", graph.root());
    println!();
    println!("Nodes ({}):", graph.nodes().len());
    for node in graph.nodes() {
        let mut flags = String::new();
        if let Some(marker) = graph.offline_marker(node) {
            flags.push_str(&format!(" {marker}"));
        }
        if node.muted {
            flags.push_str(" MUTED");
        }
        println!("  [{:<9}] {}{}", node.kind.as_str(), node.key, flags);
    }
    println!();
    println!("Edges ({}):", graph.edges().len());
    for edge in graph.edges() {
        println!("  {} -[{}]-> {}", edge.from, edge.ty.as_str(), edge.to);
    }
}

fn collect_roots(dir: &Path) -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .filter(|p| {
            let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
            matches!(ext.to_lowercase().as_str(), "usda" | "usd")
        })
        .collect();
    roots.sort();
    roots
}

fn run_batch(args: &Args) -> Result<bool> {
    if !args.path.is_dir() {
        bail!("{} is not a directory", args.path.display());
    }
    let options = walk_options(args)?;
    let roots = collect_roots(&args.path);
    if roots.is_empty() {
        bail!("No USD files found in: {}", args.path.display());
    }

    println!("Walking {} USD roots...\n", roots.len());

    let progress = ProgressBar::new(roots.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let results: Vec<(PathBuf, Result<DependencyGraph, WalkError>)> = roots
        .par_iter()
        .map(|root| {
            let result = DependencyWalker::new(root, options.clone())
                .with_reporter(LogReporter)
                .start();
            progress.inc(1);
            (root.clone(), result)
        })
        .collect();
    progress.finish_and_clear();

    let mut failed = 0;
    let mut with_missing = 0;
    for (root, result) in &results {
        let rel_path = root.strip_prefix(&args.path).unwrap_or(root);
        match result {
            Ok(graph) => {
                let offline: Vec<_> = graph.offline_nodes().collect();
                if offline.is_empty() {
                    println!("[ OK ] {} ({} dependencies)", rel_path.display(), graph.nodes().len() - 1);
                } else {
                    with_missing += 1;
                    println!("[MISS] {} ({} missing)", rel_path.display(), offline.len());
                    for node in offline {
                        println!("         - [{}] {}", node.kind.as_str(), node.key);
                    }
                }
            }
            Err(err) => {
                failed += 1;
                println!("[FAIL] {}", rel_path.display());
                println!("       Error: {err}");
            }
        }
    }

    println!();
    println!("================================================================================");
    println!("Summary");
    println!("================================================================================");
    println!("Roots walked:          {}", results.len());
    println!("With missing files:    {with_missing}");
    println!("Failed to open:        {failed}");

    Ok(failed == 0)
}
