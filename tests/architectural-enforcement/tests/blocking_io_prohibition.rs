//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: async functions in the HMI crates MUST NOT use blocking I/O.
//! **Required**: `tokio::net`, `reqwest` async clients and `tokio-tungstenite`,
//! never `std::net` or `reqwest::blocking`.
//!
//! Plain functions may touch the filesystem: the token slot and the config
//! file are small and read through synchronous helpers.

use architectural_enforcement::{
    code_part, is_in_async_function, is_in_non_async_function, production_sources,
};

/// Test that production code does not use blocking I/O
#[test]
fn test_no_blocking_io_in_production_code() {
    let mut violations = Vec::new();

    for file in production_sources() {
        for (idx, line) in file.lines.iter().enumerate() {
            let code = code_part(line);
            let location = format!("{}:{}", file.path.display(), idx + 1);

            if code.contains("reqwest::blocking") {
                violations.push(format!("{location} - Blocking HTTP client: {}", line.trim()));
            }

            if code.contains("std::net::") || code.trim_start().starts_with("use std::net") {
                violations.push(format!("{location} - Blocking network I/O: {}", line.trim()));
            }

            if code.contains("std::process::Command") {
                violations.push(format!("{location} - Blocking process I/O: {}", line.trim()));
            }

            if code.trim_start().starts_with("use std::fs") {
                violations.push(format!(
                    "{location} - Module-wide std::fs import: {}",
                    line.trim()
                ));
            }

            if code.contains("std::fs::") && !is_in_non_async_function(&file.lines, idx) {
                violations.push(format!("{location} - Blocking file I/O: {}", line.trim()));
            }

            if (code.contains("std::io::stdin()") || code.contains("std::io::stdout()"))
                && is_in_async_function(&file.lines, idx)
            {
                violations.push(format!(
                    "{location} - Blocking stdin/stdout in async: {}",
                    line.trim()
                ));
            }
        }
    }

    if !violations.is_empty() {
        eprintln!("\n❌ Blocking I/O calls found in production code!\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ ACCEPTABLE blocking I/O:");
        eprintln!("  - Non-async functions (token slot, config file)");
        eprintln!("  - The dedicated stdin thread of the line console");
        eprintln!("  - Test modules");
        panic!(
            "\nFound {} blocking I/O violation(s) in production code.",
            violations.len()
        );
    }
}

#[test]
fn test_sources_are_found() {
    let files = production_sources();
    assert!(
        files.iter().any(|f| f.path.ends_with("session.rs")),
        "scanner should see hmi/core/src/session.rs"
    );
    assert!(files.iter().any(|f| f.path.ends_with("main.rs")));
}
