use super::*;

const PREPARE_MS: Millis = 10_000;

fn machine() -> SessionMachine {
    SessionMachine::new(
        SessionConfig {
            prepare_duration_ms: PREPARE_MS,
        },
        0,
    )
}

fn focusing_at(now: Millis) -> SessionMachine {
    let mut session = machine();
    session.apply(SessionCommand::Start, now - PREPARE_MS);
    session.tick(now, false).unwrap();
    session
}

#[test]
fn start_enters_preparing_then_focusing_automatically() {
    let mut session = machine();

    let change = session.apply(SessionCommand::Start, 1_000).unwrap();
    assert_eq!(change.previous, SessionState::Idle);
    assert_eq!(change.current, SessionState::Preparing);
    assert_eq!(change.total_focus_time_ms, None);
    assert_eq!(session.entered_at_ms(), 1_000);

    assert_eq!(session.tick(10_999, false), None);
    assert_eq!(session.prepare_remaining_ms(10_999), Some(1));

    let change = session.tick(11_000, false).unwrap();
    assert_eq!(change.current, SessionState::Focusing);
    assert_eq!(session.state(), SessionState::Focusing);
    assert_eq!(session.prepare_remaining_ms(11_000), None);
}

#[test]
fn open_lid_while_focusing_is_a_violation_with_focus_time() {
    let mut session = focusing_at(20_000);

    assert_eq!(session.tick(25_000, false), None);
    let change = session.tick(27_500, true).unwrap();
    assert_eq!(change.previous, SessionState::Focusing);
    assert_eq!(change.current, SessionState::Violation);
    assert_eq!(change.total_focus_time_ms, Some(7_500));

    // Lid stays open: no second event.
    assert_eq!(session.tick(28_000, true), None);
}

#[test]
fn open_lid_outside_focusing_is_ignored() {
    let mut session = machine();
    assert_eq!(session.tick(100, true), None);

    session.apply(SessionCommand::Start, 200);
    assert_eq!(session.tick(300, true), None);
    assert_eq!(session.state(), SessionState::Preparing);
}

#[test]
fn focus_time_excludes_paused_time() {
    let mut session = focusing_at(10_000);

    session.apply(SessionCommand::Pause, 14_000).unwrap();
    assert_eq!(session.total_focus_time_ms(), 4_000);
    assert_eq!(session.session_clock_ms(60_000), 4_000);

    session.apply(SessionCommand::Resume, 60_000).unwrap();
    assert_eq!(session.session_clock_ms(61_000), 5_000);

    let change = session.tick(63_000, true).unwrap();
    assert_eq!(change.current, SessionState::Violation);
    assert_eq!(change.total_focus_time_ms, Some(7_000));
}

#[test]
fn acknowledge_violation_returns_to_idle_and_resets_clock() {
    let mut session = focusing_at(10_000);
    let violation = session.tick(12_000, true).unwrap();
    assert_eq!(violation.total_focus_time_ms, Some(2_000));

    let change = session.apply(SessionCommand::Acknowledge, 13_000).unwrap();
    assert_eq!(change.previous, SessionState::Violation);
    assert_eq!(change.current, SessionState::Idle);
    assert_eq!(change.total_focus_time_ms, Some(0));
    assert_eq!(session.total_focus_time_ms(), 0);
    assert_eq!(session.session_clock_ms(14_000), 0);
}

#[test]
fn stop_from_focusing_reports_reset_total() {
    let mut session = focusing_at(10_000);

    let change = session.apply(SessionCommand::Stop, 16_000).unwrap();
    assert_eq!(change.current, SessionState::Idle);
    assert_eq!(change.total_focus_time_ms, Some(0));
    assert_eq!(session.total_focus_time_ms(), 0);
}

#[test]
fn stop_from_paused_reports_reset_total() {
    let mut session = focusing_at(10_000);
    let paused = session.apply(SessionCommand::Pause, 14_000).unwrap();
    assert_eq!(paused.total_focus_time_ms, Some(4_000));

    let change = session.apply(SessionCommand::Stop, 20_000).unwrap();
    assert_eq!(change.previous, SessionState::Paused);
    assert_eq!(change.total_focus_time_ms, Some(0));
}

#[test]
fn stop_escapes_every_active_state() {
    let mut preparing = machine();
    preparing.apply(SessionCommand::Start, 0);
    let mut paused = focusing_at(10_000);
    paused.apply(SessionCommand::Pause, 11_000);
    let mut violation = focusing_at(10_000);
    violation.tick(11_000, true);

    for mut session in [preparing, focusing_at(10_000), paused, violation] {
        let from = session.state();
        assert_ne!(from, SessionState::Idle);

        let change = session.apply(SessionCommand::Stop, 12_000).unwrap();
        assert_eq!(change.previous, from);
        assert_eq!(change.current, SessionState::Idle);
        assert!(change.total_focus_time_ms.is_some());
    }
}

#[test]
fn stop_beats_same_tick_prepare_expiry() {
    let mut session = machine();
    session.apply(SessionCommand::Start, 0);

    // Timer is due, but the command is applied first within the tick.
    session.apply(SessionCommand::Stop, PREPARE_MS + 5).unwrap();
    assert_eq!(session.tick(PREPARE_MS + 5, false), None);
    assert_eq!(session.state(), SessionState::Idle);
}

#[test]
fn unmatched_commands_are_dropped() {
    let mut session = focusing_at(10_000);

    assert_eq!(session.apply(SessionCommand::Start, 11_000), None);
    assert_eq!(session.apply(SessionCommand::Resume, 11_000), None);
    assert_eq!(session.apply(SessionCommand::Acknowledge, 11_000), None);
    assert_eq!(session.state(), SessionState::Focusing);

    let mut idle = machine();
    assert_eq!(idle.apply(SessionCommand::Pause, 5), None);
    assert_eq!(idle.apply(SessionCommand::Stop, 5), None);
}

#[test]
fn self_transition_changes_nothing() {
    let mut session = focusing_at(10_000);
    let entered = session.entered_at_ms();
    let clock = session.session_clock_ms(15_000);

    assert_eq!(session.transition_to(SessionState::Focusing, 15_000), None);
    assert_eq!(session.entered_at_ms(), entered);
    assert_eq!(session.session_clock_ms(15_000), clock);
    assert_eq!(session.previous(), SessionState::Preparing);
}

#[test]
fn restart_after_idle_counts_from_zero() {
    let mut session = focusing_at(10_000);
    session.apply(SessionCommand::Stop, 20_000);

    session.apply(SessionCommand::Start, 30_000);
    session.tick(40_000, false).unwrap();
    let change = session.apply(SessionCommand::Pause, 41_000).unwrap();
    assert_eq!(change.total_focus_time_ms, Some(1_000));
}

#[test]
fn wire_names_are_upper_case() {
    assert_eq!(SessionState::Idle.as_str(), "IDLE");
    assert_eq!(SessionState::Preparing.as_str(), "PREPARING");
    assert_eq!(SessionState::Error.as_str(), "ERROR");
}

#[test]
fn error_ignores_everything_but_stop() {
    let mut session = machine();
    session.transition_to(SessionState::Error, 100).unwrap();

    for command in [
        SessionCommand::Start,
        SessionCommand::Pause,
        SessionCommand::Resume,
        SessionCommand::Acknowledge,
    ] {
        assert_eq!(session.apply(command, 200), None);
    }
    assert_eq!(session.tick(300, true), None);

    let change = session.apply(SessionCommand::Stop, 400).unwrap();
    assert_eq!(change.previous, SessionState::Error);
    assert_eq!(change.current, SessionState::Idle);
}
