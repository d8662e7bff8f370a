//! Source hygiene checks for the library and binary.
//!
//! Each pattern has a budget, normally zero. Lines in `*_test.rs` files are
//! exempt. Raising a budget means removing an existing hit first.

use std::fs;
use std::path::{Path, PathBuf};

/// Pattern, human label, allowed count.
const BUDGETS: &[(&str, &str, usize)] = &[
    (".unwrap()", "unwrap", 0),
    (".expect(", "expect", 0),
    ("panic!(", "panic", 0),
    ("unreachable!(", "unreachable", 0),
    ("todo!(", "todo", 0),
    ("unimplemented!(", "unimplemented", 0),
    ("let _ =", "silent discard", 0),
    (".ok()", "ok() discard", 0),
    ("#[allow(dead_code)]", "dead code allowance", 0),
];

fn production_sources(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for path in entries.flatten().map(|entry| entry.path()) {
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().is_some_and(|ext| ext == "rs")
                && !path.to_string_lossy().ends_with("_test.rs")
            {
                out.push(path);
            }
        }
    }
    out.sort();
    out
}

fn hits(pattern: &str) -> Vec<String> {
    let mut found = Vec::new();
    for root in ["src", "frames/src"] {
        for path in production_sources(Path::new(root)) {
            let Ok(content) = fs::read_to_string(&path) else {
                continue;
            };
            for (number, line) in content.lines().enumerate() {
                if line.contains(pattern) {
                    found.push(format!("  {}:{}: {}", path.display(), number + 1, line.trim()));
                }
            }
        }
    }
    found
}

#[test]
fn sources_are_found() {
    assert!(!production_sources(Path::new("src")).is_empty());
    assert!(!production_sources(Path::new("frames/src")).is_empty());
}

#[test]
fn pattern_budgets_hold() {
    let mut failures = Vec::new();
    for (pattern, label, budget) in BUDGETS {
        let found = hits(pattern);
        if found.len() > *budget {
            failures.push(format!("{label}: found {}, max {budget}\n{}", found.len(), found.join("\n")));
        }
    }
    assert!(failures.is_empty(), "hygiene budgets exceeded:\n{}", failures.join("\n"));
}
