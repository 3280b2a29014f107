pub mod analyser;
pub mod bands;
pub mod capture;
pub mod context;
pub mod filter;
pub mod gain;
pub mod graph;
pub mod media;
pub mod output;
pub mod tap;

pub use analyser::AnalyserNode;
pub use bands::{compute_band_metrics, BandMetrics};
pub use capture::LiveInput;
pub use context::{AnalysisContext, ContextState, ResumeOutcome};
pub use filter::{BiquadFilter, FilterKind};
pub use gain::GainNode;
pub use graph::{AudioGraph, NodeId, NodeRole};
pub use media::{DecodedMedia, MediaElement, MediaHandle, MediaSource};
pub use output::{AudioOutput, NullOutput, RodioOutput};
pub use tap::{AudioLink, LinkState, SignalTap};

/// Which analyser view a snapshot captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotDomain {
    Frequency,
    TimeDomain,
}
