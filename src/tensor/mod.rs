//! Borrowed views over the flattened input tensors.
//!
//! All inputs are caller-owned `&[f32]` buffers in the layouts the detector
//! head produces: anchors `[H, W, A, 4]`, per-image deltas `[A*4, H, W]`,
//! per-image scores `[A, H, W]`. The views validate buffer sizes at
//! construction and expose typed accessors; no data is copied.

use crate::util::{ProposalError, ProposalResult};

fn required_len(dims: &[usize], context: &'static str, got: usize) -> ProposalResult<usize> {
    let mut needed = 1usize;
    for &d in dims {
        needed = needed
            .checked_mul(d)
            .ok_or(ProposalError::BufferTooSmall {
                needed: usize::MAX,
                got,
                context,
            })?;
    }
    Ok(needed)
}

fn check_shape(height: usize, width: usize, anchors: usize) -> ProposalResult<()> {
    if height == 0 || width == 0 || anchors == 0 {
        return Err(ProposalError::InvalidShape {
            height,
            width,
            anchors,
        });
    }
    Ok(())
}

/// Static anchor grid, laid out `[H, W, A, 4]`.
#[derive(Copy, Clone)]
pub struct AnchorGrid<'a> {
    data: &'a [f32],
    height: usize,
    width: usize,
    anchors: usize,
}

impl<'a> AnchorGrid<'a> {
    /// Creates a view over a flattened `[H, W, A, 4]` buffer.
    pub fn new(
        data: &'a [f32],
        height: usize,
        width: usize,
        anchors: usize,
    ) -> ProposalResult<Self> {
        check_shape(height, width, anchors)?;
        let needed = required_len(&[height, width, anchors, 4], "anchors", data.len())?;
        if data.len() < needed {
            return Err(ProposalError::BufferTooSmall {
                needed,
                got: data.len(),
                context: "anchors",
            });
        }
        Ok(Self {
            data,
            height,
            width,
            anchors,
        })
    }

    /// Grid height in spatial positions.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Grid width in spatial positions.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of anchor shapes per spatial position.
    pub fn anchors(&self) -> usize {
        self.anchors
    }

    /// Total number of anchor boxes on the grid.
    pub fn len(&self) -> usize {
        self.height * self.width * self.anchors
    }

    /// Returns true if the grid holds no anchors.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Corner coordinates `(x0, y0, x1, y1)` of one anchor.
    #[inline]
    pub fn corners(&self, h: usize, w: usize, anchor: usize) -> [f32; 4] {
        debug_assert!(h < self.height && w < self.width && anchor < self.anchors);
        let base = ((h * self.width + w) * self.anchors + anchor) * 4;
        [
            self.data[base],
            self.data[base + 1],
            self.data[base + 2],
            self.data[base + 3],
        ]
    }

    /// Flattened element count expected from a matching per-image deltas blob.
    pub(crate) fn flat_len(&self) -> usize {
        self.height * self.width * self.anchors * 4
    }
}

/// One image's regression deltas, laid out `[A*4, H, W]`.
#[derive(Copy, Clone)]
pub struct DeltaMap<'a> {
    data: &'a [f32],
    height: usize,
    width: usize,
    anchors: usize,
}

impl<'a> DeltaMap<'a> {
    /// Creates a view over a flattened per-image `[A*4, H, W]` buffer.
    pub fn new(
        data: &'a [f32],
        anchors: usize,
        height: usize,
        width: usize,
    ) -> ProposalResult<Self> {
        check_shape(height, width, anchors)?;
        let needed = required_len(&[anchors, 4, height, width], "deltas", data.len())?;
        if data.len() < needed {
            return Err(ProposalError::BufferTooSmall {
                needed,
                got: data.len(),
                context: "deltas",
            });
        }
        Ok(Self {
            data,
            height,
            width,
            anchors,
        })
    }

    /// The four delta channels `(dx, dy, d_log_w, d_log_h)` for one anchor.
    #[inline]
    pub fn at(&self, anchor: usize, h: usize, w: usize) -> [f32; 4] {
        let plane = self.height * self.width;
        let base = anchor * 4 * plane + h * self.width + w;
        [
            self.data[base],
            self.data[base + plane],
            self.data[base + 2 * plane],
            self.data[base + 3 * plane],
        ]
    }

    /// Contiguous row of one delta channel, length `W`.
    ///
    /// Channel index is 0..4 for `(dx, dy, d_log_w, d_log_h)`.
    #[inline]
    pub fn channel_row(&self, anchor: usize, channel: usize, h: usize) -> &'a [f32] {
        debug_assert!(channel < 4);
        let plane = self.height * self.width;
        let start = (anchor * 4 + channel) * plane + h * self.width;
        &self.data[start..start + self.width]
    }
}

/// One image's foreground scores, laid out `[A, H, W]`.
#[derive(Copy, Clone)]
pub struct ScoreMap<'a> {
    data: &'a [f32],
    height: usize,
    width: usize,
    anchors: usize,
}

impl<'a> ScoreMap<'a> {
    /// Creates a view over a flattened per-image `[A, H, W]` buffer.
    pub fn new(
        data: &'a [f32],
        anchors: usize,
        height: usize,
        width: usize,
    ) -> ProposalResult<Self> {
        check_shape(height, width, anchors)?;
        let needed = required_len(&[anchors, height, width], "scores", data.len())?;
        if data.len() < needed {
            return Err(ProposalError::BufferTooSmall {
                needed,
                got: data.len(),
                context: "scores",
            });
        }
        Ok(Self {
            data,
            height,
            width,
            anchors,
        })
    }

    /// Foreground score of one anchor.
    #[inline]
    pub fn at(&self, anchor: usize, h: usize, w: usize) -> f32 {
        self.data[(anchor * self.height + h) * self.width + w]
    }

    /// Contiguous score row for one anchor shape, length `W`.
    #[inline]
    pub fn row(&self, anchor: usize, h: usize) -> &'a [f32] {
        let start = (anchor * self.height + h) * self.width;
        &self.data[start..start + self.width]
    }
}

/// Per-image size and scale record.
///
/// Parsed from an `image_info` row of 3 values `[H, W, scale]` (uniform
/// scale) or 4 values `[H, W, scale_h, scale_w]`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ImageInfo {
    /// Input image height in pixels.
    pub height: f32,
    /// Input image width in pixels.
    pub width: f32,
    /// Height scale factor applied to the minimum box size.
    pub scale_h: f32,
    /// Width scale factor applied to the minimum box size.
    pub scale_w: f32,
}

impl ImageInfo {
    /// Parses one image's info record.
    pub fn from_slice(info: &[f32]) -> ProposalResult<Self> {
        match info.len() {
            3 => Ok(Self {
                height: info[0],
                width: info[1],
                scale_h: info[2],
                scale_w: info[2],
            }),
            4 => Ok(Self {
                height: info[0],
                width: info[1],
                scale_h: info[2],
                scale_w: info[3],
            }),
            n => Err(ProposalError::InvalidImageInfo(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AnchorGrid, DeltaMap, ImageInfo, ScoreMap};
    use crate::util::ProposalError;

    #[test]
    fn anchor_grid_indexing_matches_layout() {
        // 1x2 grid, 2 anchor shapes: [h][w][a][4]
        let data: Vec<f32> = (0..16).map(|v| v as f32).collect();
        let grid = AnchorGrid::new(&data, 1, 2, 2).unwrap();
        assert_eq!(grid.corners(0, 0, 0), [0.0, 1.0, 2.0, 3.0]);
        assert_eq!(grid.corners(0, 0, 1), [4.0, 5.0, 6.0, 7.0]);
        assert_eq!(grid.corners(0, 1, 0), [8.0, 9.0, 10.0, 11.0]);
    }

    #[test]
    fn delta_map_gathers_channel_planes() {
        // 1 anchor, 2x2 grid: channels are HW planes
        let data: Vec<f32> = (0..16).map(|v| v as f32).collect();
        let deltas = DeltaMap::new(&data, 1, 2, 2).unwrap();
        assert_eq!(deltas.at(0, 0, 0), [0.0, 4.0, 8.0, 12.0]);
        assert_eq!(deltas.at(0, 1, 1), [3.0, 7.0, 11.0, 15.0]);
        assert_eq!(deltas.channel_row(0, 2, 1), &[10.0, 11.0]);
    }

    #[test]
    fn score_map_rows_are_contiguous() {
        let data: Vec<f32> = (0..8).map(|v| v as f32).collect();
        let scores = ScoreMap::new(&data, 2, 2, 2).unwrap();
        assert_eq!(scores.at(1, 0, 1), 5.0);
        assert_eq!(scores.row(1, 1), &[6.0, 7.0]);
    }

    #[test]
    fn image_info_broadcasts_uniform_scale() {
        let info = ImageInfo::from_slice(&[600.0, 800.0, 2.0]).unwrap();
        assert_eq!(info.scale_h, 2.0);
        assert_eq!(info.scale_w, 2.0);

        let err = ImageInfo::from_slice(&[1.0, 2.0]).err().unwrap();
        assert_eq!(err, ProposalError::InvalidImageInfo(2));
    }
}
