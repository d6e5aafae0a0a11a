//! Propgen generates region proposals for two-stage object detectors.
//!
//! Given a fixed anchor grid, per-anchor regression deltas, and per-anchor
//! foreground scores, the pipeline decodes refined candidate boxes, clips
//! them to the image, keeps the top-K by score, removes near-duplicates with
//! greedy non-maximum suppression, and gathers the surviving regions into
//! contiguous batch outputs with per-image counts. A portable scalar kernel
//! is the reference; the `simd` feature swaps in an 8-lane implementation
//! with the same semantics, and the `rayon` feature parallelizes across
//! images and spatial rows.

mod candidate;
pub mod kernel;
pub mod pipeline;
pub mod tensor;
mod trace;
pub mod util;

pub use candidate::nms::greedy_nms;
pub use candidate::topk::{select_topk, Proposal, TopkBoxes};
pub use kernel::{refine_image, Kernel, RefineParams, MAX_DELTA_LOG_WH};
pub use pipeline::{
    GenerateProposals, ProposalConfig, ProposalInputs, ProposalOutput, RoiCountType, RoiCounts,
};
pub use tensor::{AnchorGrid, DeltaMap, ImageInfo, ScoreMap};
pub use util::{ProposalError, ProposalResult};
