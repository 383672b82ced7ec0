use scan_core::settings::{ActivationMode, ScanConfig};

use super::*;
use crate::Scanner;

fn step_scanner(confirm_window_ms: u64) -> Scanner {
    let cfg = ScanConfig {
        confirm_window_ms,
        ..config(1000, ActivationMode::Step, 3)
    };
    Scanner::new(abc_tree(), cfg).unwrap()
}

#[test]
fn test_activate_advances_and_resets_dwell() {
    let mut s = step_scanner(300);
    s.start(0);
    let events = s.handle(activate(400), 400);
    assert_eq!(highlighted(&events), vec!["B"]);
    assert!(selected(&events).is_empty());
    assert_eq!(s.next_deadline(), Some(1400));
}

#[test]
fn test_second_activate_in_window_selects() {
    let mut s = step_scanner(300);
    s.start(0);
    s.handle(activate(400), 400);
    let events = s.handle(activate(650), 650);
    assert_eq!(selected(&events), vec!["B"]);
    assert_eq!(highlighted(&events), vec!["A"]);
}

#[test]
fn test_activate_after_window_advances_again() {
    let mut s = step_scanner(300);
    s.start(0);
    s.handle(activate(400), 400);
    let events = s.handle(activate(800), 800);
    assert!(selected(&events).is_empty());
    assert_eq!(highlighted(&events), vec!["C"]);
}

#[test]
fn test_tick_closes_confirm_window() {
    let mut s = step_scanner(900);
    s.start(0);
    s.handle(activate(400), 400); // B, next tick at 1400
    s.poll(1400); // C
    let events = s.handle(activate(1500), 1500);
    assert!(selected(&events).is_empty());
    assert_eq!(highlighted(&events), vec!["A"]);
}

#[test]
fn test_manual_advance_does_not_pause() {
    let cfg = ScanConfig {
        confirm_window_ms: 100,
        ..config(1000, ActivationMode::Step, 1)
    };
    let mut s = Scanner::new(abc_tree(), cfg).unwrap();
    s.start(0);
    // Manual wraps are user activity, not idle passes.
    for t in [200, 400, 600, 800] {
        s.handle(activate(t), t);
    }
    assert_eq!(s.state(), crate::ScanState::Scanning);
}

#[test]
fn test_switching_to_release_mode_live() {
    let mut s = step_scanner(300);
    s.start(0);
    s.update_config(config(1000, ActivationMode::SelectOnRelease, 3))
        .unwrap();
    let events = s.handle(activate(100), 100);
    assert_eq!(selected(&events), vec!["A"]);
}
