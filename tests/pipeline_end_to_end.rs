use propgen::{
    AnchorGrid, GenerateProposals, ProposalConfig, ProposalInputs, RoiCountType, RoiCounts,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_inputs(rng: &mut StdRng, batch: usize, anchors: usize, h: usize, w: usize) -> (Vec<f32>, Vec<f32>, Vec<f32>, Vec<f32>) {
    let mut anchor_data = Vec::with_capacity(h * w * anchors * 4);
    for _ in 0..h * w * anchors {
        let x0 = rng.random_range(0.0..80.0);
        let y0 = rng.random_range(0.0..80.0);
        anchor_data.extend_from_slice(&[
            x0,
            y0,
            x0 + rng.random_range(4.0..40.0),
            y0 + rng.random_range(4.0..40.0),
        ]);
    }
    let deltas: Vec<f32> = (0..batch * anchors * 4 * h * w)
        .map(|_| rng.random_range(-0.5..0.5))
        .collect();
    let scores: Vec<f32> = (0..batch * anchors * h * w)
        .map(|_| rng.random_range(0.0..1.0))
        .collect();
    let mut image_info = Vec::with_capacity(batch * 3);
    for _ in 0..batch {
        image_info.extend_from_slice(&[100.0, 100.0, 1.0]);
    }
    (anchor_data, deltas, scores, image_info)
}

#[test]
fn zero_deltas_reproduce_the_anchor_grid() {
    // 2x2 grid, one anchor shape, well-separated boxes: decoding with zero
    // deltas is the identity and nothing overlaps, so the output is the
    // anchors themselves in descending-score order.
    let anchors: Vec<f32> = vec![
        0.0, 0.0, 4.0, 4.0, //
        10.0, 0.0, 14.0, 4.0, //
        0.0, 10.0, 4.0, 14.0, //
        10.0, 10.0, 14.0, 14.0,
    ];
    let deltas = vec![0.0f32; 16];
    let scores = vec![0.9f32, 0.8, 0.7, 0.6];
    let image_info = vec![20.0f32, 20.0, 1.0];

    let generator = GenerateProposals::new(ProposalConfig {
        min_box_size: 0.0,
        nms_threshold: 0.7,
        pre_nms_topn: 100,
        post_nms_topn: 100,
        normalized_coordinates: true,
        ..ProposalConfig::default()
    })
    .unwrap();

    let output = generator
        .execute(&ProposalInputs {
            anchors: AnchorGrid::new(&anchors, 2, 2, 1).unwrap(),
            deltas: &deltas,
            scores: &scores,
            image_info: &image_info,
            batch: 1,
        })
        .unwrap();

    assert_eq!(output.total_rois(), 4);
    assert_eq!(output.roi_counts.value(0), Some(4));
    for (i, roi) in output.rois.chunks(4).enumerate() {
        for (got, want) in roi.iter().zip(&anchors[i * 4..i * 4 + 4]) {
            assert!((got - want).abs() < 1e-4, "roi {i}: {got} vs {want}");
        }
    }
    assert_eq!(output.scores, scores);
}

#[test]
fn identical_boxes_keep_only_the_higher_score() {
    // Two coincident anchors: IoU 1.0 > 0.5 suppresses the 0.5-score copy.
    let anchors: Vec<f32> = vec![
        0.0, 0.0, 10.0, 10.0, //
        0.0, 0.0, 10.0, 10.0,
    ];
    let deltas = vec![0.0f32; 8];
    let scores = vec![0.9f32, 0.5];
    let image_info = vec![20.0f32, 20.0, 1.0];

    let generator = GenerateProposals::new(ProposalConfig {
        nms_threshold: 0.5,
        pre_nms_topn: 100,
        post_nms_topn: 100,
        ..ProposalConfig::default()
    })
    .unwrap();

    let output = generator
        .execute(&ProposalInputs {
            anchors: AnchorGrid::new(&anchors, 1, 1, 2).unwrap(),
            deltas: &deltas,
            scores: &scores,
            image_info: &image_info,
            batch: 1,
        })
        .unwrap();

    assert_eq!(output.total_rois(), 1);
    assert_eq!(output.scores, vec![0.9]);
    assert_eq!(output.rois, vec![0.0, 0.0, 10.0, 10.0]);
}

#[test]
fn repeated_runs_are_deterministic() {
    let mut rng = StdRng::seed_from_u64(7);
    let (anchors, deltas, scores, image_info) = random_inputs(&mut rng, 2, 3, 8, 8);
    let grid = AnchorGrid::new(&anchors, 8, 8, 3).unwrap();

    let generator = GenerateProposals::new(ProposalConfig {
        nms_threshold: 0.6,
        pre_nms_topn: 50,
        post_nms_topn: 20,
        ..ProposalConfig::default()
    })
    .unwrap();

    let inputs = ProposalInputs {
        anchors: grid,
        deltas: &deltas,
        scores: &scores,
        image_info: &image_info,
        batch: 2,
    };
    let first = generator.execute(&inputs).unwrap();
    let second = generator.execute(&inputs).unwrap();
    assert_eq!(first, second);
}

#[test]
fn batch_outputs_concatenate_per_image_slices() {
    let mut rng = StdRng::seed_from_u64(11);
    let (anchors, deltas, scores, image_info) = random_inputs(&mut rng, 3, 2, 6, 6);
    let grid = AnchorGrid::new(&anchors, 6, 6, 2).unwrap();

    let config = ProposalConfig {
        nms_threshold: 0.5,
        pre_nms_topn: 40,
        post_nms_topn: 10,
        roi_count_type: RoiCountType::I32,
        ..ProposalConfig::default()
    };
    let generator = GenerateProposals::new(config.clone()).unwrap();
    let batched = generator
        .execute(&ProposalInputs {
            anchors: grid,
            deltas: &deltas,
            scores: &scores,
            image_info: &image_info,
            batch: 3,
        })
        .unwrap();

    // The batch result equals each image run on its own, concatenated.
    let delta_item = deltas.len() / 3;
    let score_item = scores.len() / 3;
    let mut offset = 0usize;
    for n in 0..3 {
        let single = GenerateProposals::new(config.clone())
            .unwrap()
            .execute(&ProposalInputs {
                anchors: grid,
                deltas: &deltas[n * delta_item..(n + 1) * delta_item],
                scores: &scores[n * score_item..(n + 1) * score_item],
                image_info: &image_info[n * 3..(n + 1) * 3],
                batch: 1,
            })
            .unwrap();

        let count = single.total_rois();
        assert_eq!(batched.roi_counts.value(n), Some(count as i64));
        assert_eq!(
            &batched.scores[offset..offset + count],
            &single.scores[..]
        );
        assert_eq!(
            &batched.rois[offset * 4..(offset + count) * 4],
            &single.rois[..]
        );
        offset += count;
    }
    assert_eq!(batched.total_rois(), offset);

    match &batched.roi_counts {
        RoiCounts::I32(counts) => assert_eq!(counts.len(), 3),
        RoiCounts::I64(_) => panic!("expected 32-bit counts"),
    }
}
