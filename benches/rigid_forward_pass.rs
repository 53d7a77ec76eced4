use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use bonefit::anatomical_structure::JointHierarchy;
use bonefit::biomechanics::RigidBoneEngine;
use bonefit::constants::Position;
use bonefit::trajectory::Trajectory;

const NUM_MARKERS: usize = 33;
const NUM_FRAMES: usize = 2_000;

/// Binary tree over `m0 … m{n-1}` rooted at `m0`.
fn tree_hierarchy(num_markers: usize) -> JointHierarchy {
    (0..num_markers).fold(JointHierarchy::new("m0"), |hierarchy, parent| {
        let children: Vec<String> = [2 * parent + 1, 2 * parent + 2]
            .into_iter()
            .filter(|&child| child < num_markers)
            .map(|child| format!("m{child}"))
            .collect();
        if children.is_empty() {
            hierarchy
        } else {
            hierarchy.joint(format!("m{parent}"), children)
        }
    })
}

/// Markers jittered around a fixed pose, with a few NaN gaps.
fn noisy_trajectory(rng: &mut StdRng) -> Trajectory {
    let pose: Vec<Position> = (0..NUM_MARKERS)
        .map(|idx| Position::new(idx as f64 * 0.1, (idx % 5) as f64 * 0.2, 1.0))
        .collect();

    let positions = (0..NUM_FRAMES)
        .flat_map(|_| pose.iter().copied())
        .map(|p| {
            if rng.random::<f64>() < 1e-3 {
                Position::repeat(f64::NAN)
            } else {
                p + Position::new(
                    rng.random_range(-0.01..0.01),
                    rng.random_range(-0.01..0.01),
                    rng.random_range(-0.01..0.01),
                )
            }
        })
        .collect();

    let names = (0..NUM_MARKERS).map(|idx| format!("m{idx}")).collect();
    Trajectory::new("3d_xyz", positions, names, NUM_FRAMES).expect("valid benchmark trajectory")
}

fn bench_rigid_bones(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0xB0E5);
    let hierarchy = tree_hierarchy(NUM_MARKERS);
    let engine = RigidBoneEngine::new(&hierarchy).expect("binary tree hierarchy");

    c.bench_function("rigid_bones/bone_statistics", |b| {
        b.iter_batched(
            || noisy_trajectory(&mut rng),
            |trajectory| black_box(engine.bone_statistics(&trajectory).unwrap()),
            BatchSize::LargeInput,
        )
    });

    let trajectory = noisy_trajectory(&mut rng);
    let statistics = engine.bone_statistics(&trajectory).unwrap();

    c.bench_function("rigid_bones/forward_pass", |b| {
        b.iter(|| black_box(engine.forward_pass(black_box(&trajectory), &statistics).unwrap()))
    });
}

criterion_group!(benches, bench_rigid_bones);
criterion_main!(benches);
