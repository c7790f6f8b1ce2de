//! Keyboard input tracking.

use std::collections::HashSet;

pub use winit::keyboard::KeyCode;

/// Tracks which keys are held and which changed since the last flush.
#[derive(Debug, Default)]
pub struct InputState {
    /// Currently pressed keys
    pressed_keys: HashSet<KeyCode>,
    /// Keys pressed since the last `begin_frame`
    just_pressed_keys: HashSet<KeyCode>,
    /// Keys released since the last `begin_frame`
    just_released_keys: HashSet<KeyCode>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flushes per-frame state. Call once per rendered frame.
    pub fn begin_frame(&mut self) {
        self.just_pressed_keys.clear();
        self.just_released_keys.clear();
    }

    /// Handle a key press event. Key repeats are ignored.
    pub fn on_key_pressed(&mut self, key: KeyCode) {
        if self.pressed_keys.insert(key) {
            self.just_pressed_keys.insert(key);
        }
    }

    pub fn on_key_released(&mut self, key: KeyCode) {
        if self.pressed_keys.remove(&key) {
            self.just_released_keys.insert(key);
        }
    }

    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.pressed_keys.contains(&key)
    }

    pub fn is_key_just_pressed(&self, key: KeyCode) -> bool {
        self.just_pressed_keys.contains(&key)
    }

    pub fn is_key_just_released(&self, key: KeyCode) -> bool {
        self.just_released_keys.contains(&key)
    }

    /// Digit of a number-row or keypad key pressed this frame, if any.
    ///
    /// When several digits were pressed the highest one wins.
    pub fn just_pressed_digit(&self) -> Option<u32> {
        self.just_pressed_keys
            .iter()
            .filter_map(|&key| digit_value(key))
            .max()
    }
}

/// Value of a digit key, number row or keypad.
pub fn digit_value(key: KeyCode) -> Option<u32> {
    let digit = match key {
        KeyCode::Digit0 | KeyCode::Numpad0 => 0,
        KeyCode::Digit1 | KeyCode::Numpad1 => 1,
        KeyCode::Digit2 | KeyCode::Numpad2 => 2,
        KeyCode::Digit3 | KeyCode::Numpad3 => 3,
        KeyCode::Digit4 | KeyCode::Numpad4 => 4,
        KeyCode::Digit5 | KeyCode::Numpad5 => 5,
        KeyCode::Digit6 | KeyCode::Numpad6 => 6,
        KeyCode::Digit7 | KeyCode::Numpad7 => 7,
        KeyCode::Digit8 | KeyCode::Numpad8 => 8,
        KeyCode::Digit9 | KeyCode::Numpad9 => 9,
        _ => return None,
    };
    Some(digit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_release_cycle() {
        let mut input = InputState::new();
        input.on_key_pressed(KeyCode::ArrowUp);
        assert!(input.is_key_pressed(KeyCode::ArrowUp));
        assert!(input.is_key_just_pressed(KeyCode::ArrowUp));

        input.begin_frame();
        assert!(input.is_key_pressed(KeyCode::ArrowUp));
        assert!(!input.is_key_just_pressed(KeyCode::ArrowUp));

        input.on_key_released(KeyCode::ArrowUp);
        assert!(!input.is_key_pressed(KeyCode::ArrowUp));
        assert!(input.is_key_just_released(KeyCode::ArrowUp));
    }

    #[test]
    fn test_repeat_does_not_retrigger() {
        let mut input = InputState::new();
        input.on_key_pressed(KeyCode::Digit3);
        input.begin_frame();
        input.on_key_pressed(KeyCode::Digit3);
        assert!(!input.is_key_just_pressed(KeyCode::Digit3));
    }

    #[test]
    fn test_digit_value() {
        assert_eq!(digit_value(KeyCode::Digit0), Some(0));
        assert_eq!(digit_value(KeyCode::Numpad7), Some(7));
        assert_eq!(digit_value(KeyCode::KeyA), None);
    }

    #[test]
    fn test_just_pressed_digit() {
        let mut input = InputState::new();
        assert_eq!(input.just_pressed_digit(), None);

        input.on_key_pressed(KeyCode::Digit2);
        input.on_key_pressed(KeyCode::Digit5);
        assert_eq!(input.just_pressed_digit(), Some(5));

        input.begin_frame();
        assert_eq!(input.just_pressed_digit(), None);
    }
}
