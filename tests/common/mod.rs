#![allow(dead_code)]

use approx::assert_relative_eq;
use bonefit::anatomical_structure::{
    AnatomicalStructure, AnatomicalStructureBuilder, JointHierarchy, SegmentComDefinition,
    SegmentConnection, VirtualMarkerDefinition,
};
use bonefit::constants::Position;
use bonefit::trajectory::Trajectory;

pub fn assert_position_close(actual: &Position, expected: &Position, epsilon: f64) {
    assert_relative_eq!(actual.x, expected.x, epsilon = epsilon);
    assert_relative_eq!(actual.y, expected.y, epsilon = epsilon);
    assert_relative_eq!(actual.z, expected.z, epsilon = epsilon);
}

/// Hip → knee → ankle leg plus a pelvis virtual marker, with a 0.6 / 0.4 mass split.
pub fn leg_structure() -> AnatomicalStructure {
    AnatomicalStructureBuilder::new()
        .with_tracked_points(["left_hip", "right_hip", "left_knee", "left_ankle"])
        .unwrap()
        .with_virtual_markers(vec![VirtualMarkerDefinition::new(
            "hips_center",
            [("left_hip", 0.5), ("right_hip", 0.5)],
        )])
        .unwrap()
        .with_segment_connections(vec![
            SegmentConnection::new("left_thigh", "left_hip", "left_knee"),
            SegmentConnection::new("left_shank", "left_knee", "left_ankle"),
        ])
        .unwrap()
        .with_center_of_mass(vec![
            SegmentComDefinition::new("left_thigh", 0.4, 0.6),
            SegmentComDefinition::new("left_shank", 0.5, 0.4),
        ])
        .unwrap()
        .with_joint_hierarchy(
            JointHierarchy::new("hips_center")
                .joint("hips_center", ["left_hip", "right_hip"])
                .joint("left_hip", ["left_knee"])
                .joint("left_knee", ["left_ankle"]),
        )
        .unwrap()
        .build()
        .unwrap()
}

/// Deterministic walking-like leg motion with frame-to-frame length jitter.
pub fn leg_frames(num_frames: usize) -> Vec<Vec<Position>> {
    (0..num_frames)
        .map(|frame| {
            let t = frame as f64 * 0.1;
            let jitter = 0.02 * (3.7 * t).sin();
            let swing = 0.4 * t.sin();

            let left_hip = Position::new(0.1, 0.0, 1.0);
            let right_hip = Position::new(-0.1, 0.0, 1.0);
            let left_knee =
                left_hip + Position::new(0.0, swing.sin(), -swing.cos()) * (0.45 + jitter);
            let left_ankle =
                left_knee + Position::new(0.0, 0.5 * swing.sin(), -1.0).normalize() * (0.4 - jitter);

            vec![left_hip, right_hip, left_knee, left_ankle]
        })
        .collect()
}

pub fn leg_trajectory(num_frames: usize) -> Trajectory {
    Trajectory::from_tracked_points("3d_xyz", &leg_frames(num_frames), &leg_structure()).unwrap()
}
