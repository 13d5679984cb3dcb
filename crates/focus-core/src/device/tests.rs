use super::*;
use crate::link::fake::ScriptedLink;

const START: &str = r#"{"command":"START"}"#;

fn identity() -> DeviceIdentity {
    DeviceIdentity::new("DEV_1", "0.1.0", "ESP32-S3", "lid,lcd,radar")
}

fn device(cell: &EdgeCell) -> FocusDevice<'_, ScriptedLink> {
    FocusDevice::new(
        DeviceConfig::default(),
        identity(),
        cell,
        ScriptedLink::up(),
        0,
        false,
    )
}

fn closed() -> SensorInputs {
    SensorInputs::default()
}

fn open() -> SensorInputs {
    SensorInputs {
        lid_open_raw: true,
        ..SensorInputs::default()
    }
}

/// Connected device that entered FOCUSING at 10_100, with the outbox cleared.
fn focusing(cell: &EdgeCell) -> FocusDevice<'_, ScriptedLink> {
    let mut device = device(cell);
    device.tick(0, &closed());
    device.link_mut().push_inbound(START);
    device.tick(100, &closed());
    device.tick(10_100, &closed());
    assert_eq!(device.state(), SessionState::Focusing);
    device.link_mut().take_sent();
    device
}

fn state_changes_into(link: &ScriptedLink, state: &str) -> usize {
    let needle = format!(r#""current_state":"{state}""#);
    link.sent
        .iter()
        .filter(|frame| frame.starts_with(r#"["state_change""#) && frame.contains(&needle))
        .count()
}

#[test]
fn hardware_connect_precedes_any_telemetry() {
    let cell = EdgeCell::new();
    let mut device = device(&cell);

    device.tick(0, &closed());
    assert_eq!(device.connection_state(), ConnectionState::Connected);
    assert_eq!(device.link().sent_types(), ["hardware_connect", "sensor_data"]);
    assert!(device.link().sent[0].contains(r#""features":"lid,lcd,radar""#));
}

#[test]
fn start_prepares_then_focuses_without_further_commands() {
    let cell = EdgeCell::new();
    let mut device = device(&cell);
    device.tick(0, &closed());
    device.link_mut().take_sent();

    device.link_mut().push_inbound(START);
    let outcome = device.tick(100, &closed());
    assert!(outcome.render_requested);
    assert_eq!(device.state(), SessionState::Preparing);
    assert_eq!(device.machine().entered_at_ms(), 100);
    assert_eq!(state_changes_into(device.link(), "PREPARING"), 1);

    device.tick(10_099, &closed());
    assert_eq!(device.state(), SessionState::Preparing);
    device.tick(10_100, &closed());
    assert_eq!(device.state(), SessionState::Focusing);
    assert_eq!(state_changes_into(device.link(), "FOCUSING"), 1);
}

#[test]
fn settled_open_lid_is_one_violation_reported_in_the_same_tick() {
    let cell = EdgeCell::new();
    let mut device = focusing(&cell);

    cell.on_raw_edge(12_000);
    device.tick(12_100, &open());

    assert_eq!(device.state(), SessionState::Violation);
    assert_eq!(device.link().sent_types(), ["state_change", "sensor_data"]);
    assert!(device.link().sent[0].contains(r#""total_focus_time_ms":2000"#));
    assert!(device.link().sent[1].contains(r#""state":"VIOLATION","box_open":true"#));

    for now in (12_200..15_000).step_by(100) {
        device.tick(now, &open());
    }
    assert_eq!(state_changes_into(device.link(), "VIOLATION"), 1);
}

#[test]
fn lid_bounce_inside_the_window_is_not_a_violation() {
    let cell = EdgeCell::new();
    let mut device = focusing(&cell);

    cell.on_raw_edge(12_000);
    device.tick(12_010, &open());
    cell.on_raw_edge(12_020);
    device.tick(12_030, &closed());
    cell.on_raw_edge(12_040);
    device.tick(12_060, &open());
    cell.on_raw_edge(12_070);

    for now in (12_100..13_000).step_by(50) {
        device.tick(now, &closed());
    }
    assert_eq!(device.state(), SessionState::Focusing);
    assert!(!device.lid_open());
    assert_eq!(state_changes_into(device.link(), "VIOLATION"), 0);
}

#[test]
fn short_outage_reconnects_without_restart() {
    let cell = EdgeCell::new();
    let mut device = device(&cell);
    device.tick(0, &closed());

    device.link_mut().network = false;
    device.link_mut().session = false;
    device.link_mut().take_sent();

    let mut restarts = 0;
    for now in (1_000..20_000).step_by(100) {
        restarts += u32::from(device.tick(now, &closed()).restart_requested);
    }
    assert_eq!(device.connection_state(), ConnectionState::Connecting);
    assert!(device.link().sent.is_empty());

    device.link_mut().network = true;
    device.link_mut().session = true;
    restarts += u32::from(device.tick(20_000, &closed()).restart_requested);

    assert_eq!(restarts, 0);
    assert_eq!(device.connection_state(), ConnectionState::Connected);
    assert_eq!(device.link().sent_types(), ["hardware_connect", "sensor_data"]);
}

#[test]
fn long_outage_requests_restart_exactly_once() {
    let cell = EdgeCell::new();
    let mut device = device(&cell);
    device.tick(0, &closed());

    device.link_mut().network = false;
    device.link_mut().session = false;

    let mut restart_ticks = Vec::new();
    for now in (1_000..45_000).step_by(500) {
        if device.tick(now, &closed()).restart_requested {
            restart_ticks.push(now);
        }
    }
    assert_eq!(restart_ticks, [31_500]);
}

#[test]
fn acknowledge_clears_violation_and_focus_time() {
    let cell = EdgeCell::new();
    let mut device = focusing(&cell);
    cell.on_raw_edge(12_000);
    device.tick(12_100, &open());

    device
        .link_mut()
        .push_inbound(r#"{"command":"ACKNOWLEDGE"}"#);
    device.tick(12_200, &open());

    assert_eq!(device.state(), SessionState::Idle);
    assert_eq!(device.machine().total_focus_time_ms(), 0);
    assert_eq!(state_changes_into(device.link(), "IDLE"), 1);
}

#[test]
fn transitions_while_offline_are_not_sent() {
    let cell = EdgeCell::new();
    let mut device = focusing(&cell);

    device.link_mut().network = false;
    device.link_mut().session = false;
    cell.on_raw_edge(12_000);
    device.tick(12_100, &open());

    assert_eq!(device.state(), SessionState::Violation);
    assert!(device.link().sent.is_empty());
}

#[test]
fn bad_and_unknown_commands_leave_state_alone() {
    let cell = EdgeCell::new();
    let mut device = device(&cell);
    device.tick(0, &closed());
    device.link_mut().take_sent();

    device.link_mut().push_inbound("{not json");
    device.link_mut().push_inbound(r#"{"command":"EXPLODE"}"#);
    device.link_mut().push_inbound(r#"{"command":"ACKNOWLEDGE"}"#);
    let outcome = device.tick(100, &closed());

    assert_eq!(device.state(), SessionState::Idle);
    assert!(!outcome.restart_requested);
    assert_eq!(device.link().sent_types(), ["sensor_data"]);
}

#[test]
fn ping_is_answered_with_pong() {
    let cell = EdgeCell::new();
    let mut device = device(&cell);
    device.tick(0, &closed());
    device.link_mut().take_sent();

    device.link_mut().push_inbound(r#"{"command":"PING"}"#);
    device.tick(50, &closed());
    assert_eq!(device.link().sent, [r#"["pong",{"hardware_id":"DEV_1"}]"#]);
}

#[test]
fn heartbeat_follows_its_own_cadence() {
    let cell = EdgeCell::new();
    let mut device = device(&cell);
    device.tick(0, &closed());

    for now in (100..=10_000).step_by(100) {
        device.tick(now, &closed());
    }
    let heartbeats = device
        .link()
        .sent_types()
        .iter()
        .filter(|kind| *kind == "heartbeat")
        .count();
    assert_eq!(heartbeats, 2);
}

#[test]
fn presence_holds_through_short_gaps() {
    let cell = EdgeCell::new();
    let mut device = device(&cell);
    let present = SensorInputs {
        presence_raw: Some(true),
        ..SensorInputs::default()
    };
    let absent = SensorInputs {
        presence_raw: Some(false),
        ..SensorInputs::default()
    };

    device.tick(0, &present);
    assert!(device.occupied());
    for now in (100..3_000).step_by(100) {
        device.tick(now, &absent);
    }
    assert!(device.occupied());
    device.tick(3_100, &absent);
    assert!(!device.occupied());
}

#[test]
fn sessions_start_while_nothing_is_rendered() {
    let cell = EdgeCell::new();
    let mut device = device(&cell);
    device.tick(0, &closed());

    // Render requests are ignored throughout, as with a dead display.
    device.link_mut().push_inbound(START);
    device.tick(100, &closed());
    assert_eq!(device.state(), SessionState::Preparing);
    device.tick(10_100, &closed());
    assert_eq!(device.state(), SessionState::Focusing);
    assert_eq!(state_changes_into(device.link(), "FOCUSING"), 1);
}

#[test]
fn stop_reports_zero_focus_time_on_the_wire() {
    let cell = EdgeCell::new();
    let mut device = focusing(&cell);

    device.link_mut().push_inbound(r#"{"command":"STOP"}"#);
    device.tick(16_100, &closed());

    assert_eq!(device.state(), SessionState::Idle);
    let frame = &device.link().sent[0];
    assert!(frame.contains(r#""current_state":"IDLE""#));
    assert!(frame.contains(r#""total_focus_time_ms":0"#));
}

#[test]
fn render_is_requested_at_display_cadence() {
    let cell = EdgeCell::new();
    let mut device = device(&cell);

    assert!(device.tick(0, &closed()).render_requested);
    assert!(!device.tick(100, &closed()).render_requested);
    assert!(device.tick(250, &closed()).render_requested);
    assert!(!device.tick(300, &closed()).render_requested);
}
