//! Multi-stream genotype concordance: a k-way merge feeding a windowed
//! comparator that reports through a pluggable matcher.

pub mod matcher;
pub mod merge;
pub mod window;

pub use matcher::{
    ConcordanceSink, ExactGroup, ExactMatcher, FuzzyMatcher, GenotypeMatcher, LocusAllele,
    LocusGroup, MatchGroup, MatchStrategy, StreamHits,
};
pub use merge::StreamMerger;
pub use window::{EngineOptions, Window, WindowState, WindowStats};
