//! Navigation scenario runner CLI
//!
//! Usage:
//!   cargo run --bin test-scenarios                     # Run all scenarios
//!   cargo run --bin test-scenarios -- climbing/        # Run category
//!   cargo run --bin test-scenarios -- walking/walk_to_target
//!   cargo run --bin test-scenarios -- --list           # List without running
//!   cargo run --bin test-scenarios -- --verbose        # Show details on failure
//!   cargo run --bin test-scenarios -- --parallel 4     # Agent ticks on 4 threads

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use ledgewalker::simulation::init_parallel;
use ledgewalker::testing::{SCENARIOS_DIR, TestResult, parser::parse_test_file, runner::run_test};

fn main() -> ExitCode {
    let mut verbose = false;
    let mut list_only = false;
    let mut filter: Option<String> = None;
    let mut threads = 0;

    let args: Vec<String> = env::args().skip(1).collect();
    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        match arg.as_str() {
            "--verbose" | "-v" => verbose = true,
            "--list" | "-l" => list_only = true,
            "--parallel" => {
                if i + 1 < args.len() {
                    threads = args[i + 1].parse().unwrap_or(0);
                    i += 1;
                }
            }
            _ if !arg.starts_with('-') => filter = Some(arg.clone()),
            _ => eprintln!("Ignoring unknown flag {}", arg),
        }
        i += 1;
    }

    init_parallel(threads);

    println!("Navigation Scenarios");
    println!("====================\n");

    let scenarios_path = Path::new(SCENARIOS_DIR);
    if !scenarios_path.exists() {
        println!("No scenarios directory found at {}", SCENARIOS_DIR);
        return ExitCode::FAILURE;
    }

    let tests = discover_tests(scenarios_path, filter.as_deref());
    if tests.is_empty() {
        println!("No scenario files found.");
        if let Some(f) = filter {
            println!("Filter: {}", f);
        }
        return ExitCode::FAILURE;
    }

    if list_only {
        for test_path in &tests {
            let rel_path = test_path.strip_prefix(scenarios_path).unwrap_or(test_path);
            println!("  {}", rel_path.display());
        }
        return ExitCode::SUCCESS;
    }

    let mut passed = 0;
    let mut failed = 0;
    let mut errors = 0;
    let mut current_category = String::new();

    for test_path in &tests {
        let rel_path = test_path.strip_prefix(scenarios_path).unwrap_or(test_path);

        // Category header
        if let Some(parent) = rel_path.parent() {
            let category = parent.to_string_lossy().to_string();
            if category != current_category && !category.is_empty() {
                if !current_category.is_empty() {
                    println!();
                }
                println!("{}/", category);
                current_category = category;
            }
        }

        let test_name = rel_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let test_def = match parse_test_file(test_path) {
            Ok(def) => def,
            Err(e) => {
                print_result(&test_name, &TestResult::Error { message: e }, verbose);
                errors += 1;
                continue;
            }
        };

        let result = run_test(&test_def);
        match &result {
            TestResult::Pass { .. } => passed += 1,
            TestResult::Fail { .. } => failed += 1,
            TestResult::Error { .. } => errors += 1,
        }

        print_result(&test_name, &result, verbose);
        if verbose
            && !matches!(result, TestResult::Pass { .. })
            && let Some(description) = &test_def.description
        {
            println!("    ({})", description);
        }
    }

    println!("\n====================");
    println!("Results: {} passed, {} failed, {} errors", passed, failed, errors);

    if failed > 0 || errors > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn discover_tests(base: &Path, filter: Option<&str>) -> Vec<PathBuf> {
    let mut tests = Vec::new();
    discover_tests_recursive(base, base, filter, &mut tests);
    tests.sort();
    tests
}

fn discover_tests_recursive(base: &Path, current: &Path, filter: Option<&str>, tests: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(current) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();

        if path.is_dir() {
            discover_tests_recursive(base, &path, filter, tests);
        } else if path.extension().is_some_and(|e| e == "toml") {
            if let Some(f) = filter {
                let rel = path.strip_prefix(base).unwrap_or(&path).to_string_lossy();
                if !rel.contains(f) {
                    continue;
                }
            }
            tests.push(path);
        }
    }
}

fn print_result(name: &str, result: &TestResult, verbose: bool) {
    let dots = ".".repeat(40 - name.len().min(39));

    match result {
        TestResult::Pass { frames } => {
            println!("  {} {} PASS ({} frames)", name, dots, frames);
        }
        TestResult::Fail { error } => {
            println!("  {} {} FAIL", name, dots);
            if verbose {
                println!("    {}", error);
            } else {
                println!("    {}", error.message);
            }
        }
        TestResult::Error { message } => {
            println!("  {} {} ERROR", name, dots);
            println!("    {}", message);
        }
    }
}
