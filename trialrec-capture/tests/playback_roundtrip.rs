use ratatui::backend::TestBackend;
use ratatui::Terminal;
use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use trialrec_capture::event::{Event, EventPayload};
use trialrec_capture::viewer::{draw, draw_frame};
use trialrec_capture::{
    CaptureFrame, Dataset, Error, FrameEvent, FrameRecord, FrameSource, JpegWriter, LogEntry,
    Navigation, Playback, Result, SchedulerConfig, SharedCapture, SourceFactory, SystemClock,
    TrialRecorder, TrialSettings,
};
use trialrec_input::{HookEvent, HookHandler, MouseButton};

struct TestFrameSource;

impl FrameSource for TestFrameSource {
    fn grab(&mut self) -> Result<CaptureFrame> {
        Ok(CaptureFrame {
            rgba: vec![200; 32 * 24 * 4],
            width: 32,
            height: 24,
        })
    }
}

fn screen_text(terminal: &Terminal<TestBackend>) -> String {
    let buffer = terminal.backend().buffer();
    let mut text = String::new();
    for y in 0..buffer.area.height {
        for x in 0..buffer.area.width {
            text.push_str(buffer.cell((x, y)).map_or(" ", |c| c.symbol()));
        }
        text.push('\n');
    }
    text
}

fn frame(index: u64, timestamp: f64, events: Vec<FrameEvent>) -> FrameRecord {
    FrameRecord {
        filename: format!("frame_{}.jpg", index),
        timestamp,
        events,
        held_keys: vec!["shift".to_string()],
        held_buttons: Vec::new(),
        mouse_is_moving: true,
        mouse_xy: [640.5, 360.25],
    }
}

#[test]
fn sealed_log_reads_back_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = Dataset::open(dir.path()).unwrap();
    fs::create_dir(dataset.trial_dir(4)).unwrap();

    let moved = FrameEvent {
        number: 0,
        event: Event::new(
            17,
            1_717_171_717.123_456_7,
            EventPayload::Move {
                xy: [640.5, 360.25],
                delta: [-0.5, 0.125],
            },
        ),
    };
    let raw = FrameEvent {
        number: 1,
        event: Event::new(
            18,
            1_717_171_717.130_001,
            EventPayload::RawDelta { delta: [3.0, -1.0] },
        ),
    };
    let frames = vec![
        frame(0, 1_717_171_717.133_333_3, vec![moved, raw]),
        frame(1, 1_717_171_717.166_666_6, Vec::new()),
    ];
    let mut entries = vec![LogEntry::trial_start(4, 1_717_171_717.1)];
    entries.extend(frames.iter().cloned().map(LogEntry::Frame));
    entries.push(LogEntry::trial_end(4, 1_717_171_718.0));
    dataset.write_log(4, &entries).unwrap();

    let playback = Playback::open(&dataset, None).unwrap();
    assert_eq!(playback.trial(), 4);
    assert_eq!(playback.frames(), &frames[..]);
}

#[test]
fn recorded_trial_can_be_browsed() {
    let dir = tempfile::tempdir().unwrap();
    let capture = SharedCapture::new(Arc::new(SystemClock));
    let settings = TrialSettings {
        scheduler: SchedulerConfig {
            frame_width: 16,
            frame_height: 16,
            ..SchedulerConfig::default()
        },
        ..TrialSettings::default()
    };
    let sources: Arc<dyn SourceFactory> =
        Arc::new(|| -> Result<Box<dyn FrameSource>> { Ok(Box::new(TestFrameSource)) });
    let mut recorder = TrialRecorder::new(capture, settings, sources, Arc::new(JpegWriter::new(70)));
    recorder.bind_dataset(Dataset::open(dir.path()).unwrap()).unwrap();

    let ingestor = recorder.ingestor();
    recorder.start().unwrap();
    ingestor.handle(HookEvent::MouseClick {
        button: MouseButton::Left,
        pressed: true,
    });
    thread::sleep(Duration::from_millis(200));
    ingestor.handle(HookEvent::MouseClick {
        button: MouseButton::Left,
        pressed: false,
    });
    let summary = recorder.stop().unwrap();

    let dataset = Dataset::open(dir.path()).unwrap();
    let mut playback = Playback::open(&dataset, Some(summary.trial)).unwrap();
    assert_eq!(playback.len(), summary.frames);

    let image = playback.load_current_image().unwrap();
    assert_eq!(image.dimensions(), (16, 16));
    let mut terminal = Terminal::new(TestBackend::new(200, 30)).unwrap();
    terminal
        .draw(|f| draw(f, &playback, image.dimensions()))
        .unwrap();
    let text = screen_text(&terminal);
    assert!(text.contains(&format!("Frame 1/{} | frame_0.jpg", summary.frames)));
    assert!(text.contains("(16x16)"));
    assert!(text.contains("Button.left"));

    while playback.navigate(Navigation::Next) {
        playback.load_current_image().unwrap();
    }
    assert_eq!(playback.index(), summary.frames - 1);

    fs::remove_file(playback.current_image_path()).unwrap();
    assert!(matches!(
        playback.load_current_image(),
        Err(Error::FrameMissing(_))
    ));
}

#[test]
fn render_shows_events_and_held_state() {
    let record = frame(
        3,
        1_717_171_717.5,
        vec![FrameEvent {
            number: 0,
            event: Event::new(9, 1_717_171_717.25, EventPayload::Key("a".to_string())),
        }],
    );
    let mut terminal = Terminal::new(TestBackend::new(180, 14)).unwrap();
    terminal
        .draw(|f| {
            let area = f.area();
            draw_frame(f, area, &record, 3, 8);
        })
        .unwrap();
    let text = screen_text(&terminal);
    assert!(text.contains("Frame 4/8 | frame_3.jpg"));
    assert!(text.contains("1717171717.2500"));
    assert!(text.contains("[\"a\"]"));
    assert!(text.contains("[\"shift\"]"));
    assert!(text.contains("[640.5, 360.25]"));
}
