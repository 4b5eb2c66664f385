//! End-to-end tests: wire bytes in, controller cycles, wire bytes and
//! peripheral calls out

mod common;

use common::*;

#[test]
fn test_boot_turns_peripherals_off() {
    let mut controller = Controller::new(RecordingActuator::default(), RecordingClock::default());
    controller.startup().unwrap();

    assert_eq!(controller.peripherals().actuator.calls, vec![Call::Disable]);
    assert_eq!(controller.peripherals().clock.calls, vec![Call::Stop]);
    assert!(controller.state().config_mask.is_clear());
}

#[test]
fn test_get_config_over_the_wire() {
    let mut controller = booted_controller();
    let mut transport = ScriptedTransport::new();
    // GET|CFG: checksum 0x21, header 0x21
    transport.queue(hex_to_bytes("03212100"));

    run_until_idle(&mut controller, &mut transport);
    assert_eq!(transport.take_replies(), vec![Message::Config(Config::new())]);
}

#[test]
fn test_mems_enable_toggle() {
    let mut controller = booted_controller();
    let mut transport = ScriptedTransport::new();
    transport.queue(encode(&Message::SetConfig(Config::new().with_mems_en(true))));

    run_until_idle(&mut controller, &mut transport);

    assert_eq!(controller.peripherals().actuator.calls, vec![Call::Enable]);
    assert_eq!(controller.state().config_mask.bits(), 0);
    assert_eq!(
        transport.take_replies(),
        vec![Message::Config(Config::new().with_mems_en(true))]
    );
}

#[test]
fn test_filter_change_applied_by_next_cycle() {
    let mut controller = booted_controller();
    let mut transport = ScriptedTransport::new();
    transport.queue(encode(&Message::SetConfig(Config::new().with_lpf(true))));
    run_until_idle(&mut controller, &mut transport);
    transport.take_replies();

    // SET|LPF 200 Hz, payload C8 00; nothing is echoed before the clock moves
    transport.queue(encode(&Message::SetFilter(200)));
    run_until_idle(&mut controller, &mut transport);

    assert!(!controller.state().lpf_pending);
    assert_eq!(
        controller.peripherals().clock.calls,
        vec![Call::SetFrequency(DEFAULT_LPF_HZ), Call::SetFrequency(200)]
    );
    assert_eq!(transport.take_replies(), vec![Message::Filter(200)]);
}

#[test]
fn test_position_applied_and_acknowledged() {
    let mut controller = booted_controller();
    let mut transport = ScriptedTransport::new();
    let pos = Position::new(0x1000, 0x2000, 0x3000, 0x4000);
    transport.queue(encode(&Message::SetConfig(Config::new().with_mems_en(true))));
    transport.queue(encode(&Message::SetPosition(pos)));
    transport.queue(encode(&Message::GetPosition));

    run_until_idle(&mut controller, &mut transport);

    assert_eq!(
        controller.peripherals().actuator.calls,
        vec![Call::Enable, Call::SetPosition(pos)]
    );
    assert_eq!(
        transport.take_replies(),
        vec![
            Message::Config(Config::new().with_mems_en(true)),
            Message::PositionApplied(pos),
            Message::Position(pos),
        ]
    );
}

#[test]
fn test_split_arrival_matches_single_shot() {
    let wire = encode(&Message::SetPosition(Position::new(1, 2, 3, 4)));

    let mut whole = booted_controller();
    let mut whole_link = ScriptedTransport::new();
    whole_link.queue(wire.clone());
    whole.cycle(&mut whole_link).unwrap();

    let mut split = booted_controller();
    let mut split_link = ScriptedTransport::new();
    split_link.queue(wire[..3].to_vec());
    split_link.queue(wire[3..].to_vec());
    split.cycle(&mut split_link).unwrap();
    assert!(!split.state().position_pending);
    split.cycle(&mut split_link).unwrap();

    assert!(split.state().position_pending);
    assert_eq!(split.state(), whole.state());
}

#[test]
fn test_byte_by_byte_arrival() {
    let mut controller = booted_controller();
    let mut transport = ScriptedTransport::new();
    for byte in encode(&Message::GetFilter) {
        transport.queue(vec![byte]);
    }
    run_until_idle(&mut controller, &mut transport);
    assert_eq!(transport.take_replies(), vec![Message::Filter(DEFAULT_LPF_HZ)]);
}

#[test]
fn test_back_to_back_frames_one_per_cycle() {
    let mut controller = booted_controller();
    let mut transport = ScriptedTransport::new();
    let mut burst = encode(&Message::GetConfig);
    burst.extend(encode(&Message::GetFilter));
    transport.queue(burst);

    controller.cycle(&mut transport).unwrap();
    assert_eq!(transport.take_replies(), vec![Message::Config(Config::new())]);
    controller.cycle(&mut transport).unwrap();
    assert_eq!(transport.take_replies(), vec![Message::Filter(DEFAULT_LPF_HZ)]);
}

#[test]
fn test_recovers_after_stray_zero() {
    let mut controller = booted_controller();
    let mut transport = ScriptedTransport::new();
    // Enable diagnostics so the codec error is reported
    transport.queue(encode(&Message::SetConfig(Config::new().with_log(true))));
    run_until_idle(&mut controller, &mut transport);
    transport.take_replies();

    // Run marker promises four bytes, a zero arrives after one
    let mut garbage = vec![0x05, 0x11, 0x00];
    garbage.extend(encode(&Message::GetFilter));
    transport.queue(garbage);
    run_until_idle(&mut controller, &mut transport);

    let replies = transport.take_replies();
    assert_eq!(replies[0], Message::Log("COBS Decode Error -2".to_string()));
    assert_eq!(replies.last(), Some(&Message::Filter(DEFAULT_LPF_HZ)));
    assert!(!replies.iter().any(|m| matches!(m, Message::Rejected { .. })));
}

#[test]
fn test_checksum_error_is_not_rejected() {
    let mut controller = booted_controller();
    let mut transport = ScriptedTransport::new();
    // GET|CFG with a bad checksum
    transport.queue(hex_to_bytes("03202100"));
    run_until_idle(&mut controller, &mut transport);
    assert!(transport.take_replies().is_empty());

    // With diagnostics on the drop is reported as a LOG frame
    transport.queue(encode(&Message::SetConfig(Config::new().with_log(true))));
    run_until_idle(&mut controller, &mut transport);
    transport.take_replies();

    transport.queue(hex_to_bytes("03202100"));
    run_until_idle(&mut controller, &mut transport);
    assert_eq!(
        transport.take_replies(),
        vec![Message::Log("FCMP Checksum Error <0x01>".to_string())]
    );
}

#[test]
fn test_log_echo_over_the_wire() {
    let mut controller = booted_controller();
    let mut transport = ScriptedTransport::new();
    transport.queue(encode(&Message::Log("hello board".to_string())));
    run_until_idle(&mut controller, &mut transport);
    assert!(transport.take_replies().is_empty());

    transport.queue(encode(&Message::SetConfig(Config::new().with_log(true))));
    run_until_idle(&mut controller, &mut transport);
    transport.take_replies();

    transport.queue(encode(&Message::Log("hello board".to_string())));
    run_until_idle(&mut controller, &mut transport);
    let replies = transport.take_replies();
    assert_eq!(replies.last(), Some(&Message::Log("hello board".to_string())));
}

#[test]
fn test_burst_waits_in_transport_while_frame_staged() {
    let mut controller = booted_controller();
    let mut transport = ScriptedTransport::new();
    transport.queue(encode(&Message::SetConfig(Config::new().with_log(true))));
    run_until_idle(&mut controller, &mut transport);
    transport.take_replies();

    // The first cycle handles GET|CFG and leaves the long LOG frame staged,
    // so the next chunk does not fit in the remaining room
    let long = "a".repeat(200);
    let tail = "b".repeat(100);
    let mut burst = encode(&Message::GetConfig);
    burst.extend(encode(&Message::Log(long.clone())));
    transport.queue(burst);
    transport.queue(encode(&Message::Log(tail.clone())));
    run_until_idle(&mut controller, &mut transport);

    assert_eq!(controller.session().dropped(), 0);
    let replies = transport.take_replies();
    assert!(replies.contains(&Message::Config(Config::new().with_log(true))));
    assert!(replies.contains(&Message::Log(long)));
    assert!(replies.contains(&Message::Log(tail)));
}

#[test]
fn test_idle_cycles_are_quiet() {
    let mut controller = booted_controller();
    let mut transport = ScriptedTransport::new();
    for _ in 0..10 {
        controller.cycle(&mut transport).unwrap();
    }
    assert!(transport.written.is_empty());
    assert!(controller.peripherals().actuator.calls.is_empty());
    assert!(controller.peripherals().clock.calls.is_empty());
}
