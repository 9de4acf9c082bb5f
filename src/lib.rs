//! `usd-depgraph` discovers the file dependency graph of a USD asset.
//!
//! Starting from a root layer it follows sublayers, references, payloads
//! (including those inside unselected variants) and value clips, and records
//! every file it finds as a node along with how it was reached.
//!
//! # Modules
//!
//! - `sdf` - Scene description data: paths, values, specs and list ops
//! - `usda` - Text format (.usda) reader
//! - `layer` - Parsed layers and the per-walk layer registry
//! - `resolver` - Asset path resolution and existence checks
//! - `stage` - Minimal composition producing prim stacks
//! - `clips` - Value clip sets and sequence naming
//! - `graph` - The dependency graph and its JSON/DOT output
//! - `walker` - The dependency walk itself
//! - `report` - Walk progress events
//! - `config` - Walk options and their TOML/env loading
//!
//! ```no_run
//! use usd_depgraph::{DependencyWalker, WalkOptions};
//!
//! let graph = DependencyWalker::new("shot.usda", WalkOptions::default()).start()?;
//! for node in graph.offline_nodes() {
//!     println!("missing: {}", node.key);
//! }
//! # Ok::<(), usd_depgraph::WalkError>(())
//! ```

pub mod clips;
pub mod config;
pub mod error;
pub mod graph;
pub mod layer;
pub mod report;
pub mod resolver;
pub mod sdf;
pub mod stage;
pub mod usda;
pub mod walker;

pub use config::WalkOptions;
pub use error::WalkError;
pub use graph::{DependencyGraph, Edge, EdgeType, Node, NodeKind};
pub use report::{LogReporter, Reporter, WalkEvent};
pub use resolver::{AssetResolver, DefaultResolver};
pub use walker::DependencyWalker;
