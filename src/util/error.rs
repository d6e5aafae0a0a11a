//! Error types for propgen.

use thiserror::Error;

/// Result alias for propgen operations.
pub type ProposalResult<T> = std::result::Result<T, ProposalError>;

/// Errors that can occur when validating inputs or running the pipeline.
///
/// All variants are detected eagerly at call entry; the numeric stages
/// themselves never fail.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProposalError {
    /// A tensor buffer is shorter than its declared shape requires.
    #[error("buffer too small for {context}: needed {needed} elements, got {got}")]
    BufferTooSmall {
        needed: usize,
        got: usize,
        context: &'static str,
    },
    /// The deltas blob size does not match the size the anchor grid implies.
    #[error("deltas blob holds {got} elements, anchors and batch imply {expected}")]
    AnchorsDeltasMismatch { expected: usize, got: usize },
    /// The scores blob size is not a quarter of the deltas blob size.
    #[error("scores blob holds {got} elements, deltas imply {expected} (deltas = 4 x scores)")]
    DeltasScoresMismatch { expected: usize, got: usize },
    /// One of the declared grid dimensions is zero.
    #[error("invalid grid shape: {height}x{width} with {anchors} anchor shapes")]
    InvalidShape {
        height: usize,
        width: usize,
        anchors: usize,
    },
    /// The per-image info record has an unsupported length.
    #[error("image info must hold 3 or 4 values per image, got {0}")]
    InvalidImageInfo(usize),
    /// The image info blob does not split evenly across the batch.
    #[error("image info blob holds {len} values, not divisible across {batch} images")]
    RaggedImageInfo { len: usize, batch: usize },
    /// A configuration value is out of its accepted domain.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}
