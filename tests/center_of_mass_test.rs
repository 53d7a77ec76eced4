mod common;

use approx::assert_relative_eq;
use bonefit::anatomical_structure::{SegmentComDefinition, SegmentConnection};
use bonefit::biomechanics::CenterOfMassEngine;
use bonefit::constants::{Position, TOTAL_BODY_COM_MARKER};
use bonefit::trajectory::Trajectory;

use common::{assert_position_close, leg_structure, leg_trajectory};

#[test]
fn test_segment_com_lies_on_segment() {
    let structure = leg_structure();
    let trajectory = leg_trajectory(40);
    let definitions = structure.center_of_mass_definitions().unwrap();
    let segments = structure.segment_connections().unwrap();

    let output = CenterOfMassEngine::new(definitions)
        .compute(&trajectory, segments)
        .unwrap();

    assert_eq!(output.segment_com.marker_names(), &["left_thigh", "left_shank"]);
    assert_eq!(output.segment_com.num_frames(), 40);

    for definition in definitions {
        let segment = structure.segment_connection(&definition.segment).unwrap();
        let proximal = trajectory.marker(&segment.proximal).unwrap();
        let distal = trajectory.marker(&segment.distal).unwrap();
        let com = output.segment_com.marker(&definition.segment).unwrap();

        for frame in 0..trajectory.num_frames() {
            let p = proximal.get(frame).unwrap();
            let d = distal.get(frame).unwrap();
            let expected = p + (d - p) * definition.length;
            assert_position_close(com.get(frame).unwrap(), &expected, 1e-12);
        }
    }
}

#[test]
fn test_total_body_com_two_segments() {
    let trajectory = Trajectory::new(
        "3d_xyz",
        vec![
            Position::new(0.0, 0.0, 0.0),
            Position::new(2.0, 0.0, 0.0),
            Position::new(0.0, 4.0, 0.0),
            Position::new(0.0, 0.0, 1.0),
            Position::new(2.0, 0.0, 1.0),
            Position::new(0.0, 4.0, 1.0),
        ],
        vec!["a".into(), "b".into(), "c".into()],
        2,
    )
    .unwrap();
    let segments = vec![
        SegmentConnection::new("ab", "a", "b"),
        SegmentConnection::new("ac", "a", "c"),
    ];
    let definitions = vec![
        SegmentComDefinition::new("ab", 0.5, 0.6),
        SegmentComDefinition::new("ac", 0.5, 0.4),
    ];

    let output = CenterOfMassEngine::new(&definitions)
        .compute(&trajectory, &segments)
        .unwrap();

    // ab_com = (1, 0, z), ac_com = (0, 2, z) → 0.6·ab_com + 0.4·ac_com
    let total = output.total_body_com.marker(TOTAL_BODY_COM_MARKER).unwrap();
    assert_position_close(total.get(0).unwrap(), &Position::new(0.6, 0.8, 0.0), 1e-12);
    assert_position_close(total.get(1).unwrap(), &Position::new(0.6, 0.8, 1.0), 1e-12);

    let segment_com = output.segment_com.as_slice();
    for frame in 0..2 {
        let expected = segment_com[2 * frame] * 0.6 + segment_com[2 * frame + 1] * 0.4;
        assert_relative_eq!(output.total_body_com.as_slice()[frame], expected, epsilon = 1e-12);
    }
}

#[test]
fn test_com_ignores_segments_without_definition() {
    let structure = leg_structure();
    let trajectory = leg_trajectory(3);
    let definitions = vec![SegmentComDefinition::new("left_shank", 0.0, 1.0)];

    let output = CenterOfMassEngine::new(&definitions)
        .compute(&trajectory, structure.segment_connections().unwrap())
        .unwrap();

    assert_eq!(output.segment_com.num_markers(), 1);
    // length 0 puts the COM on the proximal marker, with the full body mass.
    let knee = trajectory.marker("left_knee").unwrap().to_vec();
    assert_eq!(output.total_body_com.as_slice(), knee.as_slice());
}
