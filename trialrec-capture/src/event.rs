//! Records that make up a trial log.
//!
//! The serialized field names are the on-disk dataset format; changing them
//! breaks existing `TrialData_<n>.json` files.

use serde::{Deserialize, Serialize};

/// One input occurrence, numbered in the order it entered the pending queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub global_number: u64,
    /// Seconds since the Unix epoch
    pub timestamp: f64,
    #[serde(default)]
    pub keyboard_keys: Vec<String>,
    #[serde(default)]
    pub mouse_buttons: Vec<String>,
    pub mouse_is_moving: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mouse_xy: Option<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mouse_delta: Option<[f64; 2]>,
    #[serde(default)]
    pub raw_input: bool,
}

/// What a producer observed, before it is sequenced into an [`Event`].
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    Key(String),
    Button(String),
    /// Absolute move with the delta from the previous absolute sample
    Move { xy: [f64; 2], delta: [f64; 2] },
    /// Raw device delta, no position
    RawDelta { delta: [f64; 2] },
}

impl Event {
    pub fn new(global_number: u64, timestamp: f64, payload: EventPayload) -> Self {
        let mut event = Self {
            global_number,
            timestamp,
            keyboard_keys: Vec::new(),
            mouse_buttons: Vec::new(),
            mouse_is_moving: false,
            mouse_xy: None,
            mouse_delta: None,
            raw_input: false,
        };

        match payload {
            EventPayload::Key(name) => event.keyboard_keys.push(name),
            EventPayload::Button(name) => event.mouse_buttons.push(name),
            EventPayload::Move { xy, delta } => {
                event.mouse_is_moving = true;
                event.mouse_xy = Some(xy);
                event.mouse_delta = Some(delta);
            }
            EventPayload::RawDelta { delta } => {
                event.mouse_is_moving = true;
                event.mouse_delta = Some(delta);
                event.raw_input = true;
            }
        }
        event
    }
}

/// An event as attributed to a frame, with its frame-local index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameEvent {
    pub number: u64,
    #[serde(flatten)]
    pub event: Event,
}

/// One captured sample plus the events of its time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub filename: String,
    pub timestamp: f64,
    pub events: Vec<FrameEvent>,
    pub held_keys: Vec<String>,
    pub held_buttons: Vec<String>,
    pub mouse_is_moving: bool,
    pub mouse_xy: [f64; 2],
}

pub fn frame_file_name(index: u64, extension: &str) -> String {
    format!("frame_{}{}", index, extension)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    TrialStart,
    TrialEnd,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialMarker {
    #[serde(rename = "type")]
    pub kind: MarkerKind,
    pub timestamp: f64,
    pub trial_number: u64,
}

/// Element of a sealed trial log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LogEntry {
    Marker(TrialMarker),
    Frame(FrameRecord),
}

impl LogEntry {
    pub fn trial_start(trial_number: u64, timestamp: f64) -> Self {
        LogEntry::Marker(TrialMarker {
            kind: MarkerKind::TrialStart,
            timestamp,
            trial_number,
        })
    }

    pub fn trial_end(trial_number: u64, timestamp: f64) -> Self {
        LogEntry::Marker(TrialMarker {
            kind: MarkerKind::TrialEnd,
            timestamp,
            trial_number,
        })
    }

    pub fn as_frame(&self) -> Option<&FrameRecord> {
        match self {
            LogEntry::Frame(frame) => Some(frame),
            LogEntry::Marker(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_event_shape() {
        let event = Event::new(3, 1.5, EventPayload::Key("a".to_string()));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "global_number": 3,
                "timestamp": 1.5,
                "keyboard_keys": ["a"],
                "mouse_buttons": [],
                "mouse_is_moving": false,
                "raw_input": false,
            })
        );
    }

    #[test]
    fn raw_delta_has_no_position() {
        let event = Event::new(0, 2.0, EventPayload::RawDelta { delta: [1.0, -2.0] });
        assert!(event.raw_input);
        assert!(event.mouse_is_moving);
        assert_eq!(event.mouse_xy, None);
        assert_eq!(event.mouse_delta, Some([1.0, -2.0]));
    }

    #[test]
    fn frame_event_flattens_number() {
        let frame_event = FrameEvent {
            number: 0,
            event: Event::new(7, 4.25, EventPayload::Button("Button.left".to_string())),
        };
        let value = serde_json::to_value(&frame_event).unwrap();
        assert_eq!(value["number"], 0);
        assert_eq!(value["global_number"], 7);
        assert_eq!(value["mouse_buttons"], json!(["Button.left"]));
    }

    #[test]
    fn markers_and_frames_are_distinguished() {
        let raw = json!([
            {"type": "trial_start", "timestamp": 1.0, "trial_number": 4},
            {
                "filename": "frame_0.jpg",
                "timestamp": 1.1,
                "events": [],
                "held_keys": ["w"],
                "held_buttons": [],
                "mouse_is_moving": false,
                "mouse_xy": [0.0, 0.0]
            },
            {"type": "trial_end", "timestamp": 2.0, "trial_number": 4}
        ]);
        let entries: Vec<LogEntry> = serde_json::from_value(raw).unwrap();
        assert_eq!(entries[0], LogEntry::trial_start(4, 1.0));
        assert_eq!(entries[1].as_frame().map(|f| f.held_keys.clone()), Some(vec!["w".to_string()]));
        assert_eq!(entries[2], LogEntry::trial_end(4, 2.0));
    }
}
