// Integration tests for incremental log tailing through the profile registry:
// a play session written line by line, client restarts, and concurrent triggers.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use acts_overlay::config::ProfileConfig;
use acts_overlay::notes::NoteBook;
use acts_overlay::registry::{ProfileRegistry, UpdateOutcome};

fn append(path: &Path, text: &str) {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .unwrap();
    file.write_all(text.as_bytes()).unwrap();
}

fn registry(log_path: &Path) -> ProfileRegistry {
    ProfileRegistry::new(
        vec![ProfileConfig {
            id: "stand_alone".into(),
            log_path: log_path.to_path_buf(),
        }],
        NoteBook::builtin().unwrap(),
    )
}

fn scanned_lines(outcome: UpdateOutcome) -> usize {
    match outcome {
        UpdateOutcome::Scanned(summary) => summary.lines,
        UpdateOutcome::Coalesced => panic!("expected a scan"),
    }
}

#[test]
fn test_session_written_line_by_line() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("Client.txt");
    let registry = registry(&log);

    // Game not launched yet.
    assert!(registry.update("stand_alone").unwrap_err().is_retryable());

    append(&log, "2024/03/01 20:00:00 ***** LOG FILE OPENING *****\n");
    append(&log, "2024/03/01 20:01:00 [INFO Client 1] : You have entered The Coast.\n");
    let state = registry.update("stand_alone").unwrap().state;
    assert_eq!(state.zone, "The Coast");
    assert_eq!(state.level, 0);

    append(&log, "2024/03/01 20:02:00 [INFO Client 1] : Witchy (Witch) is now level 5\n");
    append(&log, "2024/03/01 20:03:00 [INFO Client 1] : You have entered The Ledge.\n");
    let report = registry.update("stand_alone").unwrap();
    assert_eq!(scanned_lines(report.outcome), 2);
    assert_eq!(report.state.zone, "The Ledge");
    assert_eq!(report.state.level, 5);

    // Writer is mid-line.
    let before = registry.byte_offset("stand_alone").unwrap();
    append(&log, "2024/03/01 20:04:00 [INFO Client 1] : Witchy (Witch) is now lev");
    let report = registry.update("stand_alone").unwrap();
    assert_eq!(scanned_lines(report.outcome), 0);
    assert_eq!(registry.byte_offset("stand_alone").unwrap(), before);
    assert_eq!(report.state.level, 5);

    append(&log, "el 6\n");
    let report = registry.update("stand_alone").unwrap();
    assert_eq!(scanned_lines(report.outcome), 1);
    assert_eq!(report.state.level, 6);
    let line_len = "2024/03/01 20:04:00 [INFO Client 1] : Witchy (Witch) is now level 6\n".len();
    assert_eq!(
        registry.byte_offset("stand_alone").unwrap(),
        before + line_len as u64
    );

    // Nothing new.
    let offset = registry.byte_offset("stand_alone").unwrap();
    let again = registry.update("stand_alone").unwrap();
    assert_eq!(scanned_lines(again.outcome), 0);
    assert_eq!(again.state, report.state);
    assert_eq!(registry.byte_offset("stand_alone").unwrap(), offset);
}

#[test]
fn test_replaced_log_is_read_from_the_start() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("Client.txt");
    let registry = registry(&log);

    append(
        &log,
        "2024/03/01 20:00:00 ***** LOG FILE OPENING *****\n\
         You have entered The Docks.\n\
         Witchy is now level 33\n",
    );
    registry.update("stand_alone").unwrap();

    std::fs::write(
        &log,
        "2024/03/02 18:00:00 ***** LOG FILE OPENING *****\nYou have entered The Coast.\n",
    )
    .unwrap();
    let report = registry.update("stand_alone").unwrap();
    match report.outcome {
        UpdateOutcome::Scanned(summary) => {
            assert!(summary.rotated);
            assert_eq!(summary.lines, 2);
        }
        UpdateOutcome::Coalesced => panic!("expected a scan"),
    }
    assert_eq!(report.state.zone, "The Coast");
    // Level carries over; the new file has not reported one yet.
    assert_eq!(report.state.level, 33);
}

#[test]
fn test_concurrent_triggers_consume_each_line_once() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("Client.txt");
    let registry = Arc::new(registry(&log));

    let mut text = String::from("header\n");
    for level in 1..=200 {
        text.push_str(&format!("Witchy is now level {level}\n"));
    }
    append(&log, &text);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            std::thread::spawn(move || registry.update("stand_alone").unwrap())
        })
        .collect();
    let total: usize = handles
        .into_iter()
        .map(|h| match h.join().unwrap().outcome {
            UpdateOutcome::Scanned(summary) => summary.lines,
            UpdateOutcome::Coalesced => 0,
        })
        .sum();

    assert_eq!(total, 201);
    assert_eq!(registry.byte_offset("stand_alone").unwrap(), text.len() as u64);
    assert_eq!(registry.snapshot("stand_alone").unwrap().level, 200);
}
