//! End-to-end reduction tests against a live arithmetic worker.
//!
//! These need the external worker; they skip silently when
//! `EPSFORM_ENGINE` is not set so the suite stays green on machines
//! without one.

use std::fs;
use std::path::PathBuf;

use epsform_core::{SingPoint, System, SystemConfig};
use epsform_engine::Engine;

fn engine() -> Option<Engine> {
    let path = std::env::var("EPSFORM_ENGINE").ok()?;
    let engine = Engine::start(&path, &[]).ok()?;
    engine.add_symbol("ep").ok()?;
    engine.add_symbol("t").ok()?;
    Some(engine)
}

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("epsform-tests-{}", std::process::id()));
    fs::create_dir_all(&dir).expect("scratch dir");
    dir.join(name)
}

/// 2×2 with simple poles at x = 0 and x = 1; eigenvalues {0, 1} at 0 and
/// {0, ε} at 1.
const TWO_BY_TWO: &str = "A[0,0]:  [[0,0],[0,1]]\nA[1,0]:  [[ep,0],[0,0]]\n";

fn load_two_by_two(engine: &Engine) -> System {
    let path = scratch("two_by_two.txt");
    fs::write(&path, TWO_BY_TWO).expect("write system file");
    System::load(
        engine,
        path.to_str().expect("utf-8 path"),
        0,
        None,
        SystemConfig::default(),
    )
    .expect("load system")
}

#[test]
fn simple_pole_system_is_fuchsian_on_load() {
    let Some(engine) = engine() else { return };
    let mut system = load_two_by_two(&engine);

    for (point, pr) in system.singularities() {
        assert!(pr.rank_c <= 0, "rankC > 0 at {point}");
    }

    // Already Fuchsian: fuchsify must be a no-op with an empty log.
    system.fuchsify().expect("fuchsify");
    assert!(system.queue().is_empty());
}

#[test]
fn residue_at_infinity_is_minus_sum_of_finite_residues() {
    let Some(engine) = engine() else { return };
    let system = load_two_by_two(&engine);

    let inf = system
        .a(&SingPoint::Infinity, 0)
        .expect("residue at infinity");
    let zero = system
        .a(&SingPoint::parse(&engine, "0").unwrap(), 0)
        .unwrap();
    let one = system
        .a(&SingPoint::parse(&engine, "1").unwrap(), 0)
        .unwrap();

    let sum = inf.c.add(&zero.c).unwrap().add(&one.c).unwrap();
    assert!(sum.is_zero().unwrap());
}

#[test]
fn normalize_shifts_integer_eigenvalues_away() {
    let Some(engine) = engine() else { return };
    let mut system = load_two_by_two(&engine);

    system.normalize().expect("normalize");

    let points: Vec<SingPoint> = system.singularities().keys().cloned().collect();
    for point in points {
        let evs = system.eigen(&point).expect("eigenvalues").clone();
        for ev in evs.keys() {
            assert!(
                num_traits::Zero::is_zero(&ev.u),
                "eigenvalue {ev} at {point} kept an integer part"
            );
        }
    }
}

#[test]
fn replay_reproduces_the_reduced_system() {
    let Some(engine) = engine() else { return };

    let queue_path = scratch("replay.queue");
    let reduced_path = scratch("replay_reduced.txt");
    let replayed_path = scratch("replay_replayed.txt");

    let mut system = load_two_by_two(&engine);
    system
        .queue()
        .set_file(queue_path.to_str().unwrap(), false)
        .expect("queue file");
    system.normalize().expect("normalize");
    system
        .write(reduced_path.to_str().unwrap())
        .expect("write reduced");

    let mut fresh = load_two_by_two(&engine);
    fresh
        .queue()
        .load(queue_path.to_str().unwrap())
        .expect("load queue");
    fresh.replay().expect("replay");
    fresh
        .write(replayed_path.to_str().unwrap())
        .expect("write replayed");

    let reduced = fs::read_to_string(&reduced_path).unwrap();
    let replayed = fs::read_to_string(&replayed_path).unwrap();
    assert_eq!(reduced, replayed);
}

#[test]
fn export_fuchs_returns_one_residue_per_stored_pole() {
    let Some(engine) = engine() else { return };
    let system = load_two_by_two(&engine);

    let fuchs = system.export_fuchs().expect("system has only simple poles");
    assert_eq!(fuchs.len(), 2);
    for (point, residue) in &fuchs {
        assert!(!point.is_infinity());
        assert!(!residue.is_zero().unwrap(), "zero residue at {point}");
    }
}

/// 3×3 with the active block [2,3] coupled to a 1×1 left block through a
/// second-order pole at x = 0.
const LEFT_COUPLED: &str = "A[0,1]:  [[0,0,0],[1,0,0],[0,0,0]]\n\
                            A[0,0]:  [[1,0,0],[0,2,0],[0,0,3]]\n";

#[test]
fn left_reduce_clears_the_highest_coupling_order() {
    let Some(engine) = engine() else { return };

    let path = scratch("left_coupled.txt");
    fs::write(&path, LEFT_COUPLED).expect("write system file");
    let mut system = System::load(
        &engine,
        path.to_str().expect("utf-8 path"),
        1,
        None,
        SystemConfig::default(),
    )
    .expect("load system");

    let zero = SingPoint::parse(&engine, "0").unwrap();
    let new_rank = system.left_reduce(&zero).expect("left reduce");

    assert!(new_rank <= 0, "coupling still has a pole of order {new_rank}");
    assert!(system.a(&zero, 1).unwrap().b.is_zero().unwrap());
    assert_eq!(system.queue().len(), 1);
}

#[test]
fn balance_is_self_inverse() {
    let Some(engine) = engine() else { return };

    let before_path = scratch("balance_before.txt");
    let after_path = scratch("balance_after.txt");

    let mut system = load_two_by_two(&engine);
    system.write(before_path.to_str().unwrap()).unwrap();

    let p = epsform_engine::Matrix::parse(&engine, "[[1,0],[0,0]]").unwrap();
    let x1 = SingPoint::parse(&engine, "0").unwrap();
    let x2 = SingPoint::Infinity;

    system.balance(&p, &x1, &x2).expect("balance");
    system.balance(&p, &x2, &x1).expect("inverse balance");
    system.write(after_path.to_str().unwrap()).unwrap();

    let before = fs::read_to_string(&before_path).unwrap();
    let after = fs::read_to_string(&after_path).unwrap();
    assert_eq!(before, after);
}
