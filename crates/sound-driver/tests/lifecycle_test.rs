//! Driver life cycle against the mock platform: init, open, start, stop,
//! close and deinit, including setup failures and teardown.

mod common;

use std::sync::Arc;

use common::{counting_player, harness, plain_config, recorder};
use voxbridge_sound_driver::error::{STATUS_EBUSY, STATUS_EINVAL, STATUS_EINVALIDOP};
use voxbridge_sound_driver::mock::{MockHost, MockPlatform, PlatformCall, RecordingDelegate};
use voxbridge_sound_driver::{
    DEFAULT_DEVICE, Direction, DriverConfig, Element, NO_DEVICE, OpenParams, OsStatus,
    SessionCategory, SessionMode, SoundDriver, SoundError, StreamCallbacks, StreamFormat,
};

fn duplex_callbacks() -> StreamCallbacks {
    let (record, _) = recorder();
    let (play, _) = counting_player();
    StreamCallbacks::duplex(record, play)
}

#[test]
fn init_resolves_component() {
    let platform = MockPlatform::new();
    let driver = SoundDriver::new(
        DriverConfig::default().with_session_mode(SessionMode::SelfManaged),
        Arc::new(platform.clone()),
    )
    .unwrap();
    assert!(!driver.is_initialized());

    driver.init(Arc::new(MockHost::new())).unwrap();
    assert!(driver.is_initialized());
    assert_eq!(
        platform.calls(),
        vec![PlatformCall::InitializeSession, PlatformCall::FindComponent]
    );

    driver.deinit().unwrap();
    assert!(!driver.is_initialized());
}

#[test]
fn init_fails_without_component() {
    let platform = MockPlatform::without_component();
    let driver = SoundDriver::new(DriverConfig::default(), Arc::new(platform)).unwrap();

    let err = driver.init(Arc::new(MockHost::new())).unwrap_err();
    assert!(matches!(err, SoundError::ComponentNotFound));
    assert!(!driver.is_initialized());
}

#[test]
fn open_before_init_is_rejected() {
    let platform = MockPlatform::new();
    let driver = SoundDriver::new(DriverConfig::default(), Arc::new(platform.clone())).unwrap();

    let err = driver
        .open(OpenParams::new(0, 0, 8000, 1, 160, 16), duplex_callbacks())
        .unwrap_err();
    assert!(matches!(err, SoundError::NotInitialized));
    assert_eq!(err.status_code(), STATUS_EINVALIDOP);
    assert!(platform.calls().is_empty());
}

#[test]
fn open_after_deinit_is_rejected() {
    let h = harness(plain_config());
    h.driver.deinit().unwrap();

    let err = h
        .driver
        .open(OpenParams::new(0, 0, 8000, 1, 160, 16), duplex_callbacks())
        .unwrap_err();
    assert!(matches!(err, SoundError::NotInitialized));
}

#[test]
fn device_enumeration() {
    let h = harness(DriverConfig::default());
    assert_eq!(h.driver.device_count(), 1);

    let info = h.driver.device_info(0);
    assert_eq!(info.name, "Voice Processing Sound Device");
    assert_eq!(info.input_count, 1);
    assert_eq!(info.output_count, 1);
    assert_eq!(info.default_sample_rate, 44100);
    assert_eq!(h.driver.device_info(5), info);
}

#[test]
fn duplex_open_configures_unit_in_order() {
    let h = harness(plain_config());

    let stream = h
        .driver
        .open(
            OpenParams::new(DEFAULT_DEVICE, DEFAULT_DEVICE, 16000, 1, 320, 16),
            duplex_callbacks(),
        )
        .unwrap();

    assert_eq!(
        h.platform.calls(),
        vec![
            PlatformCall::Instantiate,
            PlatformCall::EnableIo(Element::Input),
            PlatformCall::EnableIo(Element::Output),
            PlatformCall::SetStreamFormat(Element::Input),
            PlatformCall::SetSessionCategory(SessionCategory::PlayAndRecord),
            PlatformCall::SetSessionActive(true),
            PlatformCall::Initialize,
            PlatformCall::SetStreamFormat(Element::Output),
            PlatformCall::SetRenderCallback,
            PlatformCall::SetInputCallback,
        ]
    );

    let unit = h.platform.last_unit().unwrap();
    let format = StreamFormat::stereo_pcm16(16000);
    assert_eq!(unit.stream_format(Element::Input), Some(format));
    assert_eq!(unit.stream_format(Element::Output), Some(format));
    assert!(unit.has_render_callback());
    assert!(unit.has_input_callback());
    assert!(!unit.is_running());
    assert!(!stream.is_active());
}

#[test]
fn capture_only_open_skips_output_element() {
    let h = harness(DriverConfig::default());
    let (record, _) = recorder();

    let stream = h.driver.open_rec(0, 8000, 1, 160, 16, record).unwrap();
    assert_eq!(stream.state().config().direction, Direction::Capture);
    assert_eq!(stream.state().play_id(), NO_DEVICE);

    assert_eq!(
        h.platform.calls(),
        vec![
            PlatformCall::Instantiate,
            PlatformCall::EnableIo(Element::Input),
            PlatformCall::SetStreamFormat(Element::Input),
            PlatformCall::Initialize,
            PlatformCall::SetInputCallback,
        ]
    );
    let unit = h.platform.last_unit().unwrap();
    assert!(!unit.has_render_callback());
    assert!(unit.has_input_callback());
}

#[test]
fn playback_only_open_skips_input_element() {
    let h = harness(DriverConfig::default());
    let (play, _) = counting_player();

    let stream = h.driver.open_player(0, 8000, 1, 160, 16, play).unwrap();
    assert_eq!(stream.state().config().direction, Direction::Playback);

    assert_eq!(
        h.platform.calls(),
        vec![
            PlatformCall::Instantiate,
            PlatformCall::EnableIo(Element::Output),
            PlatformCall::Initialize,
            PlatformCall::SetStreamFormat(Element::Output),
            PlatformCall::SetRenderCallback,
        ]
    );
    assert!(!h.platform.last_unit().unwrap().has_input_callback());
}

#[test]
fn unsupported_parameters_touch_no_hardware() {
    let h = harness(plain_config());

    let err = h
        .driver
        .open(OpenParams::new(0, 0, 8000, 1, 160, 8), duplex_callbacks())
        .unwrap_err();
    assert!(matches!(err, SoundError::UnsupportedBitsPerSample { bits: 8 }));
    assert_eq!(err.status_code(), STATUS_EINVAL);
    assert!(err.is_configuration_error());

    let err = h
        .driver
        .open(OpenParams::new(0, 0, 8000, 3, 160, 16), duplex_callbacks())
        .unwrap_err();
    assert!(matches!(err, SoundError::UnsupportedChannelCount { channels: 3 }));

    let err = h
        .driver
        .open(OpenParams::new(0, 0, 8000, 1, 0, 16), duplex_callbacks())
        .unwrap_err();
    assert!(matches!(err, SoundError::InvalidSamplesPerFrame { .. }));

    // 161 samples cannot be split into whole stereo frames
    let err = h
        .driver
        .open(OpenParams::new(0, 0, 8000, 2, 161, 16), duplex_callbacks())
        .unwrap_err();
    assert!(matches!(
        err,
        SoundError::InvalidSamplesPerFrame {
            samples_per_frame: 161
        }
    ));
    assert_eq!(err.status_code(), STATUS_EINVAL);

    let err = h
        .driver
        .open(OpenParams::new(NO_DEVICE, NO_DEVICE, 8000, 1, 160, 16), duplex_callbacks())
        .unwrap_err();
    assert!(matches!(err, SoundError::NoDirection { .. }));

    assert!(h.platform.calls().is_empty());
}

#[test]
fn missing_callback_is_rejected() {
    let h = harness(plain_config());
    let (record, _) = recorder();

    let err = h
        .driver
        .open(OpenParams::new(0, 0, 8000, 1, 160, 16), StreamCallbacks::capture(record))
        .unwrap_err();
    assert!(matches!(err, SoundError::MissingCallback { side: "play" }));
    assert!(h.platform.calls().is_empty());
}

#[test]
fn failure_before_initialize_disposes_unit() {
    let h = harness(plain_config());
    h.platform
        .fail_on(PlatformCall::SetStreamFormat(Element::Input), OsStatus(-50));

    let err = h
        .driver
        .open(OpenParams::new(0, 0, 8000, 1, 160, 16), duplex_callbacks())
        .unwrap_err();
    assert!(matches!(err, SoundError::InputFormat(OsStatus(-50))));
    assert_eq!(err.status_code(), -4);

    assert_eq!(h.platform.count(PlatformCall::Initialize), 0);
    assert_eq!(h.platform.count(PlatformCall::Uninitialize), 0);
    assert_eq!(h.platform.count(PlatformCall::Dispose), 1);
    assert!(h.platform.last_unit().unwrap().is_disposed());
    assert!(h.driver.active_stream().is_none());
}

#[test]
fn failure_after_initialize_uninitializes_then_disposes() {
    let h = harness(plain_config());
    h.platform
        .fail_on(PlatformCall::SetRenderCallback, OsStatus(-10879));

    let err = h
        .driver
        .open(OpenParams::new(0, 0, 8000, 1, 160, 16), duplex_callbacks())
        .unwrap_err();
    assert!(matches!(err, SoundError::RenderCallback(_)));
    assert_eq!(err.status_code(), -7);

    let calls = h.platform.calls();
    let tail = &calls[calls.len() - 2..];
    assert_eq!(tail, &[PlatformCall::Uninitialize, PlatformCall::Dispose]);
    assert_eq!(h.platform.count(PlatformCall::SetInputCallback), 0);
}

#[test]
fn setup_steps_report_distinct_codes() {
    let steps = [
        (PlatformCall::Instantiate, -1),
        (PlatformCall::EnableIo(Element::Input), -2),
        (PlatformCall::EnableIo(Element::Output), -3),
        (PlatformCall::SetStreamFormat(Element::Input), -4),
        (PlatformCall::Initialize, -5),
        (PlatformCall::SetStreamFormat(Element::Output), -6),
        (PlatformCall::SetRenderCallback, -7),
        (PlatformCall::SetInputCallback, -8),
    ];
    for (call, code) in steps {
        let h = harness(plain_config());
        h.platform.fail_on(call, OsStatus(-1));
        let err = h
            .driver
            .open(OpenParams::new(0, 0, 8000, 1, 160, 16), duplex_callbacks())
            .unwrap_err();
        assert_eq!(err.status_code(), code, "failing {:?}", call);
    }
}

#[test]
fn start_stop_close() {
    let h = harness(plain_config());
    let stream = h
        .driver
        .open(OpenParams::new(0, 0, 8000, 1, 160, 16), duplex_callbacks())
        .unwrap();
    let unit = h.platform.last_unit().unwrap();
    h.platform.clear_calls();

    h.driver.start(&stream).unwrap();
    assert!(stream.is_active());
    assert!(unit.is_running());
    assert_eq!(
        h.platform.calls(),
        vec![
            PlatformCall::SetSessionCategory(SessionCategory::PlayAndRecord),
            PlatformCall::SetSessionActive(true),
            PlatformCall::Start,
        ]
    );

    h.platform.clear_calls();
    h.driver.stop(&stream).unwrap();
    assert!(!stream.is_active());
    assert!(!unit.is_running());
    assert_eq!(
        h.platform.calls(),
        vec![PlatformCall::Stop, PlatformCall::SetSessionActive(false)]
    );

    h.platform.clear_calls();
    h.driver.close(stream).unwrap();
    assert_eq!(
        h.platform.calls(),
        vec![PlatformCall::Uninitialize, PlatformCall::Dispose]
    );
    assert!(unit.is_disposed());
    assert!(h.driver.active_stream().is_none());
}

#[test]
fn start_and_stop_are_idempotent() {
    let h = harness(plain_config());
    let stream = h
        .driver
        .open(OpenParams::new(0, 0, 8000, 1, 160, 16), duplex_callbacks())
        .unwrap();

    h.driver.start(&stream).unwrap();
    h.driver.start(&stream).unwrap();
    assert_eq!(h.platform.count(PlatformCall::Start), 1);

    h.driver.stop(&stream).unwrap();
    h.driver.stop(&stream).unwrap();
    assert_eq!(h.platform.count(PlatformCall::Stop), 1);
    assert_eq!(h.platform.count(PlatformCall::SetSessionActive(false)), 1);
}

#[test]
fn failed_unit_start_is_reported_and_rolled_back() {
    let h = harness(plain_config());
    let stream = h
        .driver
        .open(OpenParams::new(0, 0, 8000, 1, 160, 16), duplex_callbacks())
        .unwrap();
    let unit = h.platform.last_unit().unwrap();
    h.platform.clear_calls();
    h.platform.fail_on(PlatformCall::Start, OsStatus(-66635));

    let err = h.driver.start(&stream).unwrap_err();
    assert!(matches!(err, SoundError::Start(OsStatus(-66635))));
    assert_eq!(err.status_code(), -9);
    assert!(!err.is_configuration_error());
    assert!(!stream.is_active());
    assert!(!unit.is_running());
    assert_eq!(
        h.platform.calls(),
        vec![
            PlatformCall::SetSessionCategory(SessionCategory::PlayAndRecord),
            PlatformCall::SetSessionActive(true),
            PlatformCall::Start,
            PlatformCall::SetSessionActive(false),
        ]
    );

    // Nothing to stop, and a later start goes through
    h.driver.stop(&stream).unwrap();
    assert_eq!(h.platform.count(PlatformCall::Stop), 0);
    h.platform.clear_failure(PlatformCall::Start);
    h.driver.start(&stream).unwrap();
    assert!(stream.is_active());
    assert!(unit.is_running());
}

#[test]
fn closing_started_stream_stops_it_first() {
    let h = harness(plain_config());
    let stream = h
        .driver
        .open(OpenParams::new(0, 0, 8000, 1, 160, 16), duplex_callbacks())
        .unwrap();
    h.driver.start(&stream).unwrap();
    h.platform.clear_calls();

    h.driver.close(stream).unwrap();
    assert_eq!(
        h.platform.calls(),
        vec![
            PlatformCall::Stop,
            PlatformCall::SetSessionActive(false),
            PlatformCall::Uninitialize,
            PlatformCall::Dispose,
        ]
    );
}

#[test]
fn only_one_stream_may_be_active() {
    let h = harness(plain_config());
    let first = h
        .driver
        .open(OpenParams::new(0, 0, 8000, 1, 160, 16), duplex_callbacks())
        .unwrap();
    h.driver.start(&first).unwrap();

    let err = h
        .driver
        .open(OpenParams::new(0, 0, 8000, 1, 160, 16), duplex_callbacks())
        .unwrap_err();
    assert!(matches!(err, SoundError::StreamBusy { stream_id } if stream_id == first.id()));
    assert_eq!(err.status_code(), STATUS_EBUSY);

    h.driver.stop(&first).unwrap();
    let second = h
        .driver
        .open(OpenParams::new(0, 0, 8000, 1, 160, 16), duplex_callbacks())
        .unwrap();
    assert_ne!(first.id(), second.id());
    assert_eq!(h.driver.active_stream().unwrap().id(), second.id());

    // The second stream owns the slot, so closing the first leaves it alone
    h.driver.close(first).unwrap();
    assert_eq!(h.driver.active_stream().unwrap().id(), second.id());
    h.driver.close(second).unwrap();
    assert!(h.driver.active_stream().is_none());
}

#[test]
fn stream_info_reports_latency() {
    let h = harness(plain_config());
    h.platform.set_io_buffer_duration(0.125);

    let (play, _) = counting_player();
    let stream = h.driver.open_player(0, 8000, 2, 320, 16, play).unwrap();
    let info = h.driver.stream_info(&stream);

    assert_eq!(info.stream_id, stream.id());
    assert_eq!(info.direction, Direction::Playback);
    assert_eq!(info.rec_id, NO_DEVICE);
    assert_eq!(info.play_id, 0);
    assert_eq!(info.clock_rate, 8000);
    assert_eq!(info.channel_count, 2);
    assert_eq!(info.samples_per_frame, 320);
    assert_eq!(info.bits_per_sample, 16);
    // 0.125 s * 8000 Hz * 2 channels
    assert_eq!(info.rec_latency, 2000);
    assert_eq!(info.play_latency, 2000);
}

#[test]
fn set_latency_falls_back_to_defaults() {
    let h = harness(DriverConfig::default());
    let latency = h.driver.latency();
    assert_eq!((latency.input_ms, latency.output_ms), (100, 140));

    h.driver.set_latency(40, 60).unwrap();
    let latency = h.driver.latency();
    assert_eq!((latency.input_ms, latency.output_ms), (40, 60));

    h.driver.set_latency(0, 0).unwrap();
    let latency = h.driver.latency();
    assert_eq!((latency.input_ms, latency.output_ms), (100, 140));
}

#[test]
fn delegated_session_follows_stream() {
    let h = harness(DriverConfig::default());
    let delegate = Arc::new(RecordingDelegate::new());
    h.driver.set_audio_session_callbacks(Some(delegate.clone()));

    let (record, _) = recorder();
    let stream = h.driver.open_rec(0, 8000, 1, 160, 16, record).unwrap();
    assert_eq!(delegate.starts(), vec![SessionCategory::RecordAudio]);

    h.driver.start(&stream).unwrap();
    h.driver.stop(&stream).unwrap();
    assert_eq!(
        delegate.starts(),
        vec![SessionCategory::RecordAudio, SessionCategory::RecordAudio]
    );
    assert_eq!(delegate.stops(), 1);

    // The driver never touches the platform session in delegated mode
    assert_eq!(h.platform.count(PlatformCall::SetSessionActive(true)), 0);
}

#[test]
fn session_callbacks_ignored_when_self_managed() {
    let h = harness(plain_config());
    let delegate = Arc::new(RecordingDelegate::new());
    h.driver.set_audio_session_callbacks(Some(delegate.clone()));

    let (play, _) = counting_player();
    let stream = h.driver.open_player(0, 8000, 1, 160, 16, play).unwrap();
    h.driver.start(&stream).unwrap();

    assert!(delegate.starts().is_empty());
    assert_eq!(h.driver.session_mode(), SessionMode::SelfManaged);
    assert_eq!(
        h.platform.count(PlatformCall::SetSessionCategory(SessionCategory::MediaPlayback)),
        2
    );
}

#[test]
fn config_from_toml_drives_driver() {
    let config = DriverConfig::from_toml_str(
        r#"
        session_mode = "self_managed"

        [device]
        name = "Handset"
        default_sample_rate = 16000
        "#,
    )
    .unwrap();
    let h = harness(config);

    assert_eq!(h.driver.session_mode(), SessionMode::SelfManaged);
    let info = h.driver.device_info(0);
    assert_eq!(info.name, "Handset");
    assert_eq!(info.default_sample_rate, 16000);
}
