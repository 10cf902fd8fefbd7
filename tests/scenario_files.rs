//! Runs every scenario under tests/scenarios

use std::fs;
use std::path::{Path, PathBuf};

use ledgewalker::testing::{SCENARIOS_DIR, TestResult, parser::parse_test_file, runner::run_test};
use ledgewalker::tuning::{NAV_TUNING_FILE, NavTuning};

fn collect(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect(&path, out);
        } else if path.extension().is_some_and(|e| e == "toml") {
            out.push(path);
        }
    }
}

#[test]
fn test_all_scenarios_pass() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join(SCENARIOS_DIR);
    let mut files = Vec::new();
    collect(&root, &mut files);
    files.sort();
    assert!(!files.is_empty(), "no scenarios under {}", root.display());

    let mut failures = Vec::new();
    for path in &files {
        let name = path.strip_prefix(&root).unwrap_or(path).display().to_string();
        let def = match parse_test_file(path) {
            Ok(def) => def,
            Err(e) => {
                failures.push(format!("{}: {}", name, e));
                continue;
            }
        };
        match run_test(&def) {
            TestResult::Pass { .. } => {}
            TestResult::Fail { error } => failures.push(format!("{}: {}", name, error)),
            TestResult::Error { message } => failures.push(format!("{}: {}", name, message)),
        }
    }

    assert!(failures.is_empty(), "{} scenario(s) failed:\n{}", failures.len(), failures.join("\n"));
}

#[test]
fn test_shipped_tuning_matches_defaults() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(NAV_TUNING_FILE);
    let shipped = NavTuning::load_from_file(&path).unwrap();
    let defaults = NavTuning::default();
    assert_eq!(shipped.movement.move_speed, defaults.movement.move_speed);
    assert_eq!(shipped.jump.jump_force, defaults.jump.jump_force);
    assert_eq!(shipped.climb.gravity_reset_delay, defaults.climb.gravity_reset_delay);
    assert_eq!(shipped.route.preference_threshold, defaults.route.preference_threshold);
    assert_eq!(shipped.state.path_planning_pause, defaults.state.path_planning_pause);
    assert_eq!(shipped.layers, defaults.layers);
}
