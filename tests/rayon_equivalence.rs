#![cfg(feature = "rayon")]

//! Sequential and parallel execution must produce identical outputs: rows
//! and images are fully independent, so parallelism reorders work, never
//! arithmetic.

use propgen::kernel::rayon::refine_image_par;
use propgen::kernel::scalar::ScalarKernel;
use propgen::{
    refine_image, AnchorGrid, DeltaMap, GenerateProposals, Proposal, ProposalConfig,
    ProposalInputs, RefineParams, ScoreMap, MAX_DELTA_LOG_WH,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_data(
    seed: u64,
    batch: usize,
    num_anchors: usize,
    height: usize,
    width: usize,
) -> (Vec<f32>, Vec<f32>, Vec<f32>, Vec<f32>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut anchors = Vec::with_capacity(height * width * num_anchors * 4);
    for _ in 0..height * width * num_anchors {
        let x0 = rng.random_range(0.0..100.0);
        let y0 = rng.random_range(0.0..100.0);
        anchors.extend_from_slice(&[
            x0,
            y0,
            x0 + rng.random_range(2.0..30.0),
            y0 + rng.random_range(2.0..30.0),
        ]);
    }
    let deltas = (0..batch * num_anchors * 4 * height * width)
        .map(|_| rng.random_range(-1.0..1.0))
        .collect();
    let scores = (0..batch * num_anchors * height * width)
        .map(|_| rng.random_range(0.0..1.0))
        .collect();
    let mut image_info = Vec::new();
    for _ in 0..batch {
        image_info.extend_from_slice(&[120.0f32, 120.0, 1.0]);
    }
    (anchors, deltas, scores, image_info)
}

#[test]
fn row_parallel_refinement_matches_sequential() {
    let (anchors, deltas, scores, _) = random_data(21, 1, 3, 11, 7);
    let grid = AnchorGrid::new(&anchors, 11, 7, 3).unwrap();
    let delta_map = DeltaMap::new(&deltas, 3, 11, 7).unwrap();
    let score_map = ScoreMap::new(&scores, 3, 11, 7).unwrap();
    let params = RefineParams {
        img_h: 120.0,
        img_w: 120.0,
        min_box_h: 1.0,
        min_box_w: 1.0,
        max_delta_log_wh: MAX_DELTA_LOG_WH,
        coordinates_offset: 1.0,
    };

    let mut seq = vec![Proposal::default(); grid.len()];
    let mut par = vec![Proposal::default(); grid.len()];
    refine_image::<ScalarKernel>(&grid, &delta_map, &score_map, &params, &mut seq);
    refine_image_par::<ScalarKernel>(&grid, &delta_map, &score_map, &params, &mut par);
    assert_eq!(seq, par);
}

#[test]
fn parallel_pipeline_matches_sequential() {
    let (anchors, deltas, scores, image_info) = random_data(22, 4, 3, 10, 10);
    let grid = AnchorGrid::new(&anchors, 10, 10, 3).unwrap();

    let base = ProposalConfig {
        nms_threshold: 0.6,
        pre_nms_topn: 120,
        post_nms_topn: 40,
        ..ProposalConfig::default()
    };
    let sequential = GenerateProposals::new(ProposalConfig {
        parallel: false,
        ..base.clone()
    })
    .unwrap();
    let parallel = GenerateProposals::new(ProposalConfig {
        parallel: true,
        ..base
    })
    .unwrap();

    let inputs = ProposalInputs {
        anchors: grid,
        deltas: &deltas,
        scores: &scores,
        image_info: &image_info,
        batch: 4,
    };
    assert_eq!(
        sequential.execute(&inputs).unwrap(),
        parallel.execute(&inputs).unwrap()
    );
}
