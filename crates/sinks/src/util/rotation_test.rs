//! Tests for the rotation policy

use super::*;
use std::fs;
use tempfile::TempDir;

fn write(path: &Path, content: &str) {
    fs::write(path, content).unwrap();
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

// ============================================================================
// Threshold Tests
// ============================================================================

#[test]
fn test_should_rotate_threshold() {
    assert!(!should_rotate(0, 100));
    assert!(!should_rotate(99, 100));
    assert!(should_rotate(100, 100));
    assert!(should_rotate(101, 100));
}

#[test]
fn test_rotates_before_projected_size() {
    let policy = RotationPolicy::new("x.log", 100, 3);

    assert!(!policy.rotates_before(40, 59));
    assert!(policy.rotates_before(40, 60));
    assert!(policy.rotates_before(40, 70));
}

#[test]
fn test_oversized_record_goes_into_empty_file() {
    let policy = RotationPolicy::new("x.log", 100, 3);

    assert!(!policy.rotates_before(0, 500));
    // ...and the next record triggers rotation
    assert!(policy.rotates_before(500, 1));
}

// ============================================================================
// Plan Tests
// ============================================================================

#[test]
fn test_generation_paths() {
    let path = Path::new("/var/log/herald.log");
    assert_eq!(generation_path(path, 0), PathBuf::from("/var/log/herald.log"));
    assert_eq!(generation_path(path, 1), PathBuf::from("/var/log/herald.log.1"));
    assert_eq!(generation_path(path, 12), PathBuf::from("/var/log/herald.log.12"));
}

#[test]
fn test_plan_oldest_first() {
    let plan = plan_rotation(Path::new("a.log"), 3);

    assert_eq!(
        plan,
        vec![
            RotationStep::Delete(PathBuf::from("a.log.2")),
            RotationStep::Rename {
                from: PathBuf::from("a.log.1"),
                to: PathBuf::from("a.log.2"),
            },
            RotationStep::Rename {
                from: PathBuf::from("a.log"),
                to: PathBuf::from("a.log.1"),
            },
        ]
    );
}

#[test]
fn test_plan_single_file_deletes_primary() {
    let plan = plan_rotation(Path::new("a.log"), 1);
    assert_eq!(plan, vec![RotationStep::Delete(PathBuf::from("a.log"))]);
}

#[test]
fn test_plan_zero_files_treated_as_one() {
    assert_eq!(plan_rotation(Path::new("a.log"), 0).len(), 1);
}

// ============================================================================
// Execution Tests
// ============================================================================

#[test]
fn test_execute_skips_missing_sources() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bot.log");
    write(&path, "current");

    let report = execute(&plan_rotation(&path, 3)).unwrap();

    assert_eq!(report.applied, 1);
    assert_eq!(report.skipped, 2);
    assert!(!path.exists());
    assert_eq!(read(&generation_path(&path, 1)), "current");
}

#[test]
fn test_execute_shifts_full_chain() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bot.log");
    write(&path, "gen0");
    write(&generation_path(&path, 1), "gen1");
    write(&generation_path(&path, 2), "gen2");

    let policy = RotationPolicy::new(&path, 10, 3);
    let report = policy.rotate().unwrap();

    assert_eq!(report.applied, 3);
    assert!(!path.exists());
    assert_eq!(read(&generation_path(&path, 1)), "gen0");
    assert_eq!(read(&generation_path(&path, 2)), "gen1");
    assert!(!generation_path(&path, 3).exists());
}

#[test]
fn test_execute_single_generation_deletes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bot.log");
    write(&path, "old content");

    RotationPolicy::new(&path, 10, 1).rotate().unwrap();

    assert!(!path.exists());
    assert!(!generation_path(&path, 1).exists());
}

#[test]
fn test_chain_is_bounded_after_many_rotations() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bot.log");
    let policy = RotationPolicy::new(&path, 10, 3);

    for i in 0..6 {
        write(&path, &format!("round {i}"));
        policy.rotate().unwrap();
    }
    write(&path, "round 6");

    let count = fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(count, 3);
    assert_eq!(read(&path), "round 6");
    assert_eq!(read(&generation_path(&path, 1)), "round 5");
    assert_eq!(read(&generation_path(&path, 2)), "round 4");
}

#[cfg(unix)]
#[test]
fn test_execute_continues_after_failure() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bot.log");
    write(&path, "gen0");
    // A non-empty directory where the oldest generation should be cannot be
    // removed with remove_file
    let blocker = generation_path(&path, 2);
    fs::create_dir(&blocker).unwrap();
    fs::write(blocker.join("keep"), "x").unwrap();

    let err = execute(&plan_rotation(&path, 3)).unwrap_err();

    assert_eq!(err.op, "delete");
    assert_eq!(err.path, blocker);
    assert_eq!(err.failed, 1);
    // The primary was still shifted
    assert_eq!(read(&generation_path(&path, 1)), "gen0");
}
