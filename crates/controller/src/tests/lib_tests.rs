use super::*;
use shared::error::ErrorKind;

fn requested_controller() -> PwmController {
    let controller = PwmController::default();
    controller.request(0).expect("request");
    controller
}

#[test]
fn default_controller_has_four_free_channels() {
    let controller = PwmController::default();
    assert_eq!(controller.name(), "gpio-fake");
    assert_eq!(controller.channel_count(), 4);
    assert_eq!(controller.channels().collect::<Vec<_>>(), vec![0, 1, 2, 3]);

    let states = controller.snapshot_all();
    assert_eq!(states.len(), 4);
    for (position, state) in states.iter().enumerate() {
        assert_eq!(state.index as usize, position);
        assert!(state.is_default());
    }
}

#[test]
fn zero_channels_is_rejected() {
    assert_eq!(PwmController::new(0).err(), Some(PwmError::ZeroChannels));
}

#[test]
fn oversized_channel_count_is_rejected_before_allocating() {
    for channel_count in [MAX_CHANNEL_COUNT + 1, u32::MAX] {
        assert_eq!(
            PwmController::new(channel_count).err(),
            Some(PwmError::TooManyChannels {
                requested: channel_count,
                max: MAX_CHANNEL_COUNT
            })
        );
    }

    let controller = PwmController::new(MAX_CHANNEL_COUNT).expect("largest controller");
    assert_eq!(controller.snapshot_all().len(), MAX_CHANNEL_COUNT as usize);
}

#[test]
fn out_of_range_index_fails_every_operation_without_side_effects() {
    let controller = PwmController::new(2).expect("controller");
    let before = controller.snapshot_all();
    let config = ChannelConfig {
        duty_ns: 1,
        period_ns: 2,
        polarity: Polarity::Normal,
        enabled: true,
    };

    for index in [2, 3, u32::MAX] {
        let results = [
            controller.request(index),
            controller.free(index),
            controller.configure(index, 10, 20),
            controller.set_polarity(index, Polarity::Inversed),
            controller.enable(index),
            controller.disable(index),
            controller.apply(index, &config),
            controller.snapshot(index).map(|_| ()),
        ];
        for result in results {
            assert_eq!(
                result,
                Err(PwmError::OutOfRange {
                    index,
                    channel_count: 2
                })
            );
        }
    }

    assert_eq!(controller.snapshot_all(), before);
}

#[test]
fn second_request_is_rejected() {
    let controller = requested_controller();
    assert_eq!(
        controller.request(0),
        Err(PwmError::AlreadyRequested { index: 0 })
    );
    assert!(controller.snapshot(0).expect("snapshot").requested);
}

#[test]
fn labeled_request_is_visible_until_free() {
    let controller = PwmController::default();
    controller
        .request_labeled(1, "backlight")
        .expect("request");
    assert_eq!(
        controller.snapshot(1).expect("snapshot").label.as_deref(),
        Some("backlight")
    );

    controller.free(1).expect("free");
    assert_eq!(controller.snapshot(1).expect("snapshot").label, None);
}

#[test]
fn operations_on_free_channel_require_request() {
    let controller = PwmController::default();
    assert_eq!(controller.free(1), Err(PwmError::NotRequested { index: 1 }));
    assert_eq!(
        controller.configure(1, 1, 2),
        Err(PwmError::NotRequested { index: 1 })
    );
    assert_eq!(
        controller.set_polarity(1, Polarity::Inversed),
        Err(PwmError::NotRequested { index: 1 })
    );
    assert_eq!(controller.enable(1), Err(PwmError::NotRequested { index: 1 }));
    assert_eq!(controller.disable(1), Err(PwmError::NotRequested { index: 1 }));
    assert!(controller.snapshot(1).expect("snapshot").is_default());
}

#[test]
fn enable_before_configure_is_rejected() {
    let controller = requested_controller();
    assert_eq!(controller.enable(0), Err(PwmError::NotConfigured { index: 0 }));
    assert!(!controller.snapshot(0).expect("snapshot").enabled);
}

#[test]
fn invalid_timing_keeps_previous_values() {
    let controller = requested_controller();
    controller.configure(0, 1000, 2000).expect("configure");

    for (duty_ns, period_ns) in [(3000, 2000), (-1, 2000), (0, 0), (0, -5)] {
        assert_eq!(
            controller.configure(0, duty_ns, period_ns),
            Err(PwmError::InvalidTiming {
                index: 0,
                duty_ns,
                period_ns
            })
        );
        let state = controller.snapshot(0).expect("snapshot");
        assert_eq!((state.duty_ns, state.period_ns), (1000, 2000));
    }
}

#[test]
fn invalid_timing_on_unconfigured_channel_leaves_it_unconfigured() {
    let controller = requested_controller();
    assert!(controller.configure(0, 5, 4).is_err());
    let state = controller.snapshot(0).expect("snapshot");
    assert!(!state.configured);
    assert_eq!((state.duty_ns, state.period_ns), (0, 0));
}

#[test]
fn full_lifecycle_returns_channel_to_default() {
    let controller = requested_controller();
    controller.configure(0, 1000, 2000).expect("configure");
    controller.enable(0).expect("enable");
    controller.disable(0).expect("disable");
    controller.free(0).expect("free");

    assert_eq!(controller.snapshot(0).expect("snapshot"), ChannelState::new(0));
}

#[test]
fn free_while_enabled_forces_output_off() {
    let controller = requested_controller();
    controller.configure(0, 10, 20).expect("configure");
    controller
        .set_polarity(0, Polarity::Inversed)
        .expect("polarity");
    controller.enable(0).expect("enable");

    controller.free(0).expect("free");
    assert!(controller.snapshot(0).expect("snapshot").is_default());

    controller.request(0).expect("request again");
    assert_eq!(controller.enable(0), Err(PwmError::NotConfigured { index: 0 }));
}

#[test]
fn enable_and_disable_are_idempotent() {
    let controller = requested_controller();
    controller.configure(0, 10, 20).expect("configure");

    controller.enable(0).expect("first enable");
    let after_first = controller.snapshot(0).expect("snapshot");
    controller.enable(0).expect("second enable");
    assert_eq!(controller.snapshot(0).expect("snapshot"), after_first);

    controller.disable(0).expect("first disable");
    let after_first = controller.snapshot(0).expect("snapshot");
    controller.disable(0).expect("second disable");
    assert_eq!(controller.snapshot(0).expect("snapshot"), after_first);

    let enables = controller
        .events()
        .iter()
        .filter(|event| event.operation == Operation::Enable && event.outcome.is_ok())
        .count();
    assert_eq!(enables, 2);
}

#[test]
fn live_reconfiguration_while_enabled() {
    let controller = requested_controller();
    controller.configure(0, 10, 20).expect("configure");
    controller.enable(0).expect("enable");
    controller.configure(0, 30, 40).expect("reconfigure");

    let state = controller.snapshot(0).expect("snapshot");
    assert!(state.enabled);
    assert_eq!((state.duty_ns, state.period_ns), (30, 40));
}

#[test]
fn polarity_is_locked_while_enabled() {
    let controller = requested_controller();
    controller.configure(0, 10, 20).expect("configure");
    controller
        .set_polarity(0, Polarity::Inversed)
        .expect("polarity while disabled");
    controller.enable(0).expect("enable");

    for polarity in [Polarity::Normal, Polarity::Inversed] {
        assert_eq!(
            controller.set_polarity(0, polarity),
            Err(PwmError::PolarityChangeWhileEnabled { index: 0 })
        );
    }
    assert_eq!(
        controller.snapshot(0).expect("snapshot").polarity,
        Polarity::Inversed
    );

    controller.disable(0).expect("disable");
    controller
        .set_polarity(0, Polarity::Normal)
        .expect("polarity after disable");
}

#[test]
fn apply_sets_everything_at_once() {
    let controller = requested_controller();
    controller
        .apply(
            0,
            &ChannelConfig {
                duty_ns: 250,
                period_ns: 1000,
                polarity: Polarity::Inversed,
                enabled: true,
            },
        )
        .expect("apply");

    let state = controller.snapshot(0).expect("snapshot");
    assert!(state.configured && state.enabled);
    assert_eq!(state.polarity, Polarity::Inversed);
    assert_eq!(state.duty_ratio(), Some(0.25));
}

#[test]
fn apply_rejects_polarity_flip_on_enabled_channel() {
    let controller = requested_controller();
    controller.configure(0, 10, 20).expect("configure");
    controller.enable(0).expect("enable");
    let before = controller.snapshot(0).expect("snapshot");

    let flip = ChannelConfig {
        duty_ns: 5,
        period_ns: 20,
        polarity: Polarity::Inversed,
        enabled: false,
    };
    assert_eq!(
        controller.apply(0, &flip),
        Err(PwmError::PolarityChangeWhileEnabled { index: 0 })
    );
    assert_eq!(controller.snapshot(0).expect("snapshot"), before);

    let same_polarity = ChannelConfig {
        polarity: Polarity::Normal,
        ..flip
    };
    controller.apply(0, &same_polarity).expect("apply");
    let state = controller.snapshot(0).expect("snapshot");
    assert!(!state.enabled);
    assert_eq!(state.duty_ns, 5);
}

#[test]
fn apply_validates_timing_before_polarity() {
    let controller = requested_controller();
    controller.configure(0, 10, 20).expect("configure");
    controller.enable(0).expect("enable");

    let config = ChannelConfig {
        duty_ns: 50,
        period_ns: 20,
        polarity: Polarity::Inversed,
        enabled: true,
    };
    assert_eq!(
        controller.apply(0, &config).map_err(|err| err.kind()),
        Err(ErrorKind::InvalidTiming)
    );
}

#[test]
fn event_log_records_every_call_in_order() {
    let controller = PwmController::default();
    let _ = controller.enable(3);
    controller.request(3).expect("request");
    controller.configure(3, 5000, 10000).expect("configure");
    let _ = controller.enable(9);

    let events = controller.drain_events();
    let seqs: Vec<u64> = events.iter().map(|event| event.seq).collect();
    assert_eq!(seqs, vec![0, 1, 2, 3]);

    let lines: Vec<String> = events.iter().map(ToString::to_string).collect();
    assert_eq!(
        lines,
        vec![
            "pin:3;enable:1;error:not_requested",
            "pin:3;request:1",
            "pin:3;duty_ns:5000,period_ns:10000",
            "pin:9;enable:1;error:out_of_range",
        ]
    );

    assert!(controller.drain_events().is_empty());
    controller.disable(3).expect("disable");
    let events = controller.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].seq, 4);
}

#[test]
fn snapshot_does_not_log() {
    let controller = PwmController::default();
    controller.snapshot(0).expect("snapshot");
    let _ = controller.snapshot(7);
    assert!(controller.events().is_empty());
}

#[test]
fn independent_controllers_do_not_share_state() {
    let first = PwmController::with_name("first", 2).expect("first");
    let second = PwmController::with_name("second", 2).expect("second");

    first.request(0).expect("request on first");
    second.request(0).expect("request on second");
    assert_eq!(first.events().len(), 1);
    assert_eq!(second.events().len(), 1);
}
