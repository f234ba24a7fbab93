//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code in the HMI crates MUST NOT call sleep methods.
//! Periodic work uses `tokio::time::interval`; waiting uses channels and I/O.
//! **Exception**: the telemetry reconnect timer, which sleeps once for the
//! fixed reconnect delay inside `schedule_reconnect`.

use architectural_enforcement::{code_part, enclosing_fn, production_sources};

/// Test that production code does not contain sleep() calls
#[test]
fn test_no_sleep_in_production_code() {
    let mut violations = Vec::new();

    for file in production_sources() {
        for (idx, line) in file.lines.iter().enumerate() {
            let code = code_part(line);
            if !(code.contains("::sleep(") || code.contains(".sleep(")) {
                continue;
            }
            if is_reconnect_timer(&file.lines, idx) {
                continue;
            }
            violations.push(format!("{}:{} - {}", file.path.display(), idx + 1, line.trim()));
        }
    }

    if !violations.is_empty() {
        eprintln!("\n❌ Sleep calls found in production code!\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ ACCEPTABLE:");
        eprintln!("  - The fixed-delay telemetry reconnect timer");
        eprintln!("  - Periodic tasks using tokio::time::interval()");
        eprintln!("  - Test modules");
        panic!("\nFound {} sleep violation(s) in production code.", violations.len());
    }
}

/// Sleep inside the reconnect scheduler is the one allowed timer
fn is_reconnect_timer(lines: &[String], idx: usize) -> bool {
    enclosing_fn(lines, idx).is_some_and(|sig| sig.contains("fn schedule_reconnect"))
}

#[test]
fn test_reconnect_timer_detection() {
    let code: Vec<String> = [
        "    fn schedule_reconnect(&mut self) {",
        "        self.reconnect = Some(tokio::spawn(async move {",
        "            tokio::time::sleep(delay).await;",
        "        }));",
    ]
    .iter()
    .map(ToString::to_string)
    .collect();
    assert!(is_reconnect_timer(&code, 2));

    let polling: Vec<String> = [
        "    async fn poll_loop(&self) {",
        "        loop {",
        "            tokio::time::sleep(delay).await;",
    ]
    .iter()
    .map(ToString::to_string)
    .collect();
    assert!(!is_reconnect_timer(&polling, 2));
}
