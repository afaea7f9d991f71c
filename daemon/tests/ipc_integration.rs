/// Integration tests for IPC communication
/// These tests verify that commands and responses serialize correctly
/// and can be sent over IPC boundaries
use common::{
    Command, LayoutResult, PlaybackState, Response, Size, ViewError, ViewStatus,
};

#[test]
fn test_load_command_roundtrip() {
    let cmd = Command::Load {
        locator: "rtsp://192.168.1.20/stream1".to_string(),
        options: vec![
            ":network-caching=300".to_string(),
            ":rtsp-tcp".to_string(),
        ],
    };

    let json = serde_json::to_string(&cmd).unwrap();
    let deserialized: Command = serde_json::from_str(&json).unwrap();

    match deserialized {
        Command::Load { locator, options } => {
            assert_eq!(locator, "rtsp://192.168.1.20/stream1");
            // option order is significant for the engine
            assert_eq!(options, vec![":network-caching=300", ":rtsp-tcp"]);
        }
        _ => panic!("Wrong command type"),
    }
}

#[test]
fn test_seek_commands() {
    let json = serde_json::to_string(&Command::SeekTo { ms: 90_000 }).unwrap();
    assert!(matches!(
        serde_json::from_str::<Command>(&json).unwrap(),
        Command::SeekTo { ms: 90_000 }
    ));

    let json = serde_json::to_string(&Command::Skip { delta_ms: -10_000 }).unwrap();
    assert!(matches!(
        serde_json::from_str::<Command>(&json).unwrap(),
        Command::Skip { delta_ms: -10_000 }
    ));
}

#[test]
fn test_transport_commands() {
    let commands = vec![
        Command::Play,
        Command::Pause,
        Command::Stop,
        Command::Release,
        Command::Status,
        Command::Ping,
        Command::Kill,
    ];

    for cmd in commands {
        let json = serde_json::to_string(&cmd).unwrap();
        let _deserialized: Command = serde_json::from_str(&json).unwrap();
    }
}

#[test]
fn test_plain_commands_are_bare_strings() {
    // what a hand-written client (e.g. socat) sends
    assert!(matches!(
        serde_json::from_str::<Command>("\"Play\"").unwrap(),
        Command::Play
    ));
    assert!(matches!(
        serde_json::from_str::<Command>("{\"Key\":{\"code\":\"space\"}}").unwrap(),
        Command::Key { ref code } if code == "space"
    ));
    assert!(serde_json::from_str::<Command>("\"Rewind\"").is_err());
}

#[test]
fn test_response_types() {
    let resp = Response::Ok;
    let json = serde_json::to_string(&resp).unwrap();
    assert!(matches!(
        serde_json::from_str::<Response>(&json).unwrap(),
        Response::Ok
    ));

    let resp = Response::Pong;
    let json = serde_json::to_string(&resp).unwrap();
    assert!(matches!(
        serde_json::from_str::<Response>(&json).unwrap(),
        Response::Pong
    ));

    let resp = Response::KeyHandled(false);
    let json = serde_json::to_string(&resp).unwrap();
    assert!(matches!(
        serde_json::from_str::<Response>(&json).unwrap(),
        Response::KeyHandled(false)
    ));
}

#[test]
fn test_status_response() {
    let status = ViewStatus {
        version: "0.1.0".to_string(),
        state: PlaybackState::Buffering,
        locator: Some("/videos/clip.mp4".to_string()),
        position_ms: 12_345,
        duration_ms: 120_000,
        is_playing: true,
        can_seek: true,
        loading: true,
        prepared: true,
        completed: false,
        layout: Some(LayoutResult {
            surface: Size::new(889, 500),
            container: Size::new(888, 500),
            engine_managed: false,
        }),
        last_error: None,
    };

    let json = serde_json::to_string(&Response::Status(status)).unwrap();
    let Response::Status(status) = serde_json::from_str::<Response>(&json).unwrap() else {
        panic!("Wrong response type");
    };

    assert_eq!(status.state, PlaybackState::Buffering);
    assert_eq!(status.locator.as_deref(), Some("/videos/clip.mp4"));
    assert_eq!(status.position_ms, 12_345);
    assert!(status.loading);
    let layout = status.layout.unwrap();
    assert_eq!(layout.surface, Size::new(889, 500));
    assert_eq!(layout.container, Size::new(888, 500));
}

#[test]
fn test_error_responses() {
    let errors = vec![
        ViewError::NoHostWindow,
        ViewError::WindowNotMeasured {
            width: 0,
            height: 0,
        },
        ViewError::DegenerateVideo {
            visible_width: 0,
            visible_height: 1080,
        },
        ViewError::Engine("no such element: playbin".to_string()),
        ViewError::Ipc("Invalid command".to_string()),
        ViewError::Io("Broken pipe".to_string()),
        ViewError::Config("Invalid value: loud".to_string()),
    ];

    for error in errors {
        let json = serde_json::to_string(&Response::Error(error.clone())).unwrap();
        match serde_json::from_str::<Response>(&json).unwrap() {
            Response::Error(e) => assert_eq!(e, error),
            _ => panic!("Wrong response type"),
        }
    }
}

#[test]
fn test_playback_state_names() {
    let states = [
        (PlaybackState::Idle, "idle"),
        (PlaybackState::Loading, "loading"),
        (PlaybackState::PlayPendingOnLoad, "play-pending-on-load"),
        (PlaybackState::Playing, "playing"),
        (PlaybackState::Buffering, "buffering"),
        (PlaybackState::Seeking, "seeking"),
    ];

    for (state, name) in states {
        assert_eq!(state.to_string(), name);
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(serde_json::from_str::<PlaybackState>(&json).unwrap(), state);
    }
}
