use evdev::Key;

/// First code of the `BTN_*` block; everything from here up to `KEY_OK` is a button.
const BTN_MISC: u16 = 0x100;
const KEY_OK: u16 = 0x160;

/// True for codes that belong to keyboards rather than mice, joysticks or touch.
pub fn is_keyboard_code(code: u16) -> bool {
    code != 0 && !(BTN_MISC..KEY_OK).contains(&code)
}

/// Character produced by an unshifted key on a US layout, if any
fn key_char(key: Key) -> Option<char> {
    let c = match key {
        Key::KEY_A => 'a',
        Key::KEY_B => 'b',
        Key::KEY_C => 'c',
        Key::KEY_D => 'd',
        Key::KEY_E => 'e',
        Key::KEY_F => 'f',
        Key::KEY_G => 'g',
        Key::KEY_H => 'h',
        Key::KEY_I => 'i',
        Key::KEY_J => 'j',
        Key::KEY_K => 'k',
        Key::KEY_L => 'l',
        Key::KEY_M => 'm',
        Key::KEY_N => 'n',
        Key::KEY_O => 'o',
        Key::KEY_P => 'p',
        Key::KEY_Q => 'q',
        Key::KEY_R => 'r',
        Key::KEY_S => 's',
        Key::KEY_T => 't',
        Key::KEY_U => 'u',
        Key::KEY_V => 'v',
        Key::KEY_W => 'w',
        Key::KEY_X => 'x',
        Key::KEY_Y => 'y',
        Key::KEY_Z => 'z',
        Key::KEY_0 => '0',
        Key::KEY_1 => '1',
        Key::KEY_2 => '2',
        Key::KEY_3 => '3',
        Key::KEY_4 => '4',
        Key::KEY_5 => '5',
        Key::KEY_6 => '6',
        Key::KEY_7 => '7',
        Key::KEY_8 => '8',
        Key::KEY_9 => '9',
        Key::KEY_MINUS => '-',
        Key::KEY_EQUAL => '=',
        Key::KEY_LEFTBRACE => '[',
        Key::KEY_RIGHTBRACE => ']',
        Key::KEY_BACKSLASH => '\\',
        Key::KEY_SEMICOLON => ';',
        Key::KEY_APOSTROPHE => '\'',
        Key::KEY_GRAVE => '`',
        Key::KEY_COMMA => ',',
        Key::KEY_DOT => '.',
        Key::KEY_SLASH => '/',
        _ => return None,
    };
    Some(c)
}

/// Symbolic name for a key as stored in datasets.
///
/// Printable keys use their character (`"a"`, `"7"`, `"/"`); everything else
/// becomes `Key.<name>` from the evdev constant, e.g. `KEY_LEFTSHIFT` ->
/// `"Key.leftshift"`.
pub fn key_name(key: Key) -> String {
    if let Some(c) = key_char(key) {
        return c.to_string();
    }

    let debug = format!("{:?}", key);
    match debug.strip_prefix("KEY_") {
        Some(rest) => format!("Key.{}", rest.to_lowercase()),
        None => format!("Key.code_{}", key.code()),
    }
}
