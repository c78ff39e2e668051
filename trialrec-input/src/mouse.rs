use evdev::Key;

/// Mouse buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Side,
    Extra,
}

impl MouseButton {
    /// Map an evdev button code back to a button, if it is one we track
    pub fn from_key(key: Key) -> Option<Self> {
        match key {
            Key::BTN_LEFT => Some(MouseButton::Left),
            Key::BTN_RIGHT => Some(MouseButton::Right),
            Key::BTN_MIDDLE => Some(MouseButton::Middle),
            Key::BTN_SIDE => Some(MouseButton::Side),
            Key::BTN_EXTRA => Some(MouseButton::Extra),
            _ => None,
        }
    }

    /// Symbolic name stored in datasets
    pub fn name(self) -> &'static str {
        match self {
            MouseButton::Left => "Button.left",
            MouseButton::Right => "Button.right",
            MouseButton::Middle => "Button.middle",
            MouseButton::Side => "Button.side",
            MouseButton::Extra => "Button.extra",
        }
    }
}

impl std::fmt::Display for MouseButton {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [MouseButton; 5] = [
        MouseButton::Left,
        MouseButton::Right,
        MouseButton::Middle,
        MouseButton::Side,
        MouseButton::Extra,
    ];

    #[test]
    fn button_codes_map_to_buttons() {
        let codes = [
            Key::BTN_LEFT,
            Key::BTN_RIGHT,
            Key::BTN_MIDDLE,
            Key::BTN_SIDE,
            Key::BTN_EXTRA,
        ];
        for (code, button) in codes.into_iter().zip(ALL) {
            assert_eq!(MouseButton::from_key(code), Some(button));
        }
    }

    #[test]
    fn keyboard_keys_are_not_buttons() {
        assert_eq!(MouseButton::from_key(Key::KEY_A), None);
        assert_eq!(MouseButton::from_key(Key::BTN_TOUCH), None);
    }

    #[test]
    fn names_are_distinct() {
        for (i, a) in ALL.iter().enumerate() {
            for (j, b) in ALL.iter().enumerate() {
                if i != j {
                    assert_ne!(a.name(), b.name());
                }
            }
        }
    }
}
