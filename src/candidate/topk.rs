//! Top-K selection over decoded proposals.

use std::cmp::Ordering;

/// Decoded candidate box for one anchor.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Proposal {
    /// Left edge after clipping.
    pub x0: f32,
    /// Top edge after clipping.
    pub y0: f32,
    /// Right edge after clipping.
    pub x1: f32,
    /// Bottom edge after clipping.
    pub y1: f32,
    /// Foreground score.
    pub score: f32,
    /// Flattened `(h, w, anchor)` index; deterministic tie-break key.
    pub anchor: usize,
    /// Both post-clip sides reached the configured minimum size.
    pub valid: bool,
}

fn proposal_cmp_desc(a: &Proposal, b: &Proposal) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.anchor.cmp(&b.anchor))
}

/// Partially sorts `proposals` so the first `min(k, len)` entries are the
/// best candidates in descending score order.
///
/// Equal scores are ordered by ascending original anchor index, which makes
/// the selected subset identical across kernels and thread counts. Entries
/// beyond the prefix are left in unspecified order.
pub fn select_topk(proposals: &mut [Proposal], k: usize) {
    let k = k.min(proposals.len());
    if k == 0 {
        return;
    }
    if k < proposals.len() {
        proposals.select_nth_unstable_by(k - 1, proposal_cmp_desc);
    }
    proposals[..k].sort_unstable_by(proposal_cmp_desc);
}

/// Planar column layout of the top-K candidates.
///
/// The suppression inner loop reads one coordinate column at a time, so
/// candidates are unpacked from the array-of-structs decode output into
/// field-major buffers before NMS.
#[derive(Clone, Debug, Default)]
pub struct TopkBoxes {
    /// Left edges.
    pub x0: Vec<f32>,
    /// Top edges.
    pub y0: Vec<f32>,
    /// Right edges.
    pub x1: Vec<f32>,
    /// Bottom edges.
    pub y1: Vec<f32>,
    /// Foreground scores.
    pub score: Vec<f32>,
    /// Per-candidate validity seeded from the decode minimum-size check.
    pub valid: Vec<bool>,
}

impl TopkBoxes {
    /// Unpacks a score-ordered proposal prefix into planar columns.
    pub fn from_proposals(proposals: &[Proposal]) -> Self {
        let mut boxes = Self {
            x0: Vec::with_capacity(proposals.len()),
            y0: Vec::with_capacity(proposals.len()),
            x1: Vec::with_capacity(proposals.len()),
            y1: Vec::with_capacity(proposals.len()),
            score: Vec::with_capacity(proposals.len()),
            valid: Vec::with_capacity(proposals.len()),
        };
        for p in proposals {
            boxes.x0.push(p.x0);
            boxes.y0.push(p.y0);
            boxes.x1.push(p.x1);
            boxes.y1.push(p.y1);
            boxes.score.push(p.score);
            boxes.valid.push(p.valid);
        }
        boxes
    }

    /// Number of candidates.
    pub fn len(&self) -> usize {
        self.score.len()
    }

    /// Returns true if no candidates are held.
    pub fn is_empty(&self) -> bool {
        self.score.is_empty()
    }

    /// Corner coordinates `(x0, y0, x1, y1)` of candidate `i`.
    #[inline]
    pub fn corners(&self, i: usize) -> [f32; 4] {
        [self.x0[i], self.y0[i], self.x1[i], self.y1[i]]
    }
}
