//! Candidate selection and suppression.
//!
//! Includes deterministic top-K selection over decoded proposals and the
//! greedy IoU suppression loop.

pub(crate) mod nms;
pub(crate) mod topk;
