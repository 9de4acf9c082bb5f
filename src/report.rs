//! Walk progress reporting.
//!
//! The walker never logs on its own: callers hand it a [`Reporter`] and decide where
//! events end up.

use std::fmt;
use std::sync::Mutex;

use crate::graph::{EdgeType, Node};
use crate::sdf;

/// Log target used by [`LogReporter`].
pub const LOG_TARGET: &str = "usd_depgraph";

#[derive(Debug, Clone, Copy)]
pub enum WalkEvent<'a> {
    WalkStarted {
        root: &'a str,
    },
    LayerVisited {
        identifier: &'a str,
        depth: usize,
    },
    LayerUnavailable {
        identifier: &'a str,
        reason: &'a str,
    },
    NodeAdded {
        node: &'a Node,
    },
    /// `ty` is `None` for untyped layer discovery edges.
    EdgeAdded {
        from: &'a str,
        to: &'a str,
        ty: Option<EdgeType>,
    },
    ClipSkipped {
        prim: &'a sdf::Path,
        clip_set: &'a str,
        reason: &'a str,
    },
    ArcSkipped {
        prim: &'a sdf::Path,
        asset_path: &'a str,
        reason: &'a str,
    },
    WalkFinished {
        nodes: usize,
        edges: usize,
        repaired: usize,
    },
}

impl WalkEvent<'_> {
    /// Severity when forwarded to `log`.
    pub fn level(&self) -> log::Level {
        match self {
            WalkEvent::WalkStarted { .. } | WalkEvent::WalkFinished { .. } => log::Level::Info,
            WalkEvent::LayerUnavailable { .. } | WalkEvent::ClipSkipped { .. } | WalkEvent::ArcSkipped { .. } => {
                log::Level::Warn
            }
            WalkEvent::LayerVisited { .. } => log::Level::Debug,
            WalkEvent::NodeAdded { .. } | WalkEvent::EdgeAdded { .. } => log::Level::Trace,
        }
    }
}

impl fmt::Display for WalkEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalkEvent::WalkStarted { root } => write!(f, "walk started root={root}"),
            WalkEvent::LayerVisited { identifier, depth } => {
                write!(f, "layer visited identifier={identifier} depth={depth}")
            }
            WalkEvent::LayerUnavailable { identifier, reason } => {
                write!(f, "layer unavailable identifier={identifier} reason={reason}")
            }
            WalkEvent::NodeAdded { node } => write!(
                f,
                "node added key={} kind={} online={} muted={}",
                node.key,
                node.kind.as_str(),
                node.online,
                node.muted
            ),
            WalkEvent::EdgeAdded { from, to, ty } => write!(
                f,
                "edge added from={from} to={to} type={}",
                ty.as_ref().map(EdgeType::as_str).unwrap_or("layer")
            ),
            WalkEvent::ClipSkipped { prim, clip_set, reason } => {
                write!(f, "clip skipped prim={prim} set={clip_set} reason={reason}")
            }
            WalkEvent::ArcSkipped { prim, asset_path, reason } => {
                write!(f, "arc skipped prim={prim} asset={asset_path} reason={reason}")
            }
            WalkEvent::WalkFinished { nodes, edges, repaired } => {
                write!(f, "walk finished nodes={nodes} edges={edges} repaired={repaired}")
            }
        }
    }
}

pub trait Reporter: Send + Sync {
    fn report(&self, event: &WalkEvent<'_>);
}

/// Forwards events to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&self, event: &WalkEvent<'_>) {
        log::log!(target: LOG_TARGET, event.level(), "{event}");
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn report(&self, _event: &WalkEvent<'_>) {}
}

/// Keeps rendered events in memory.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Events whose rendered text starts with `prefix`, e.g. `"clip skipped"`.
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|event| event.starts_with(prefix))
            .collect()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, event: &WalkEvent<'_>) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.to_string());
        }
    }
}

impl<R: Reporter + ?Sized> Reporter for std::sync::Arc<R> {
    fn report(&self, event: &WalkEvent<'_>) {
        (**self).report(event)
    }
}
