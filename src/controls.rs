//! Keyboard bindings for the preview window.

use winit::keyboard::{KeyCode, ModifiersState};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlAction {
    TogglePause,
    AdjustSpeed(f64),
    Reload,
    Quit,
}

/// Speed step: Ctrl wins over Shift.
fn speed_step(mods: ModifiersState) -> f64 {
    if mods.control_key() {
        1.0
    } else if mods.shift_key() {
        0.5
    } else {
        0.1
    }
}

pub fn action_for_key(code: KeyCode, mods: ModifiersState) -> Option<ControlAction> {
    let action = match code {
        KeyCode::KeyP => ControlAction::TogglePause,
        KeyCode::KeyR => ControlAction::Reload,
        KeyCode::KeyQ | KeyCode::Escape => ControlAction::Quit,
        KeyCode::Equal | KeyCode::NumpadAdd => ControlAction::AdjustSpeed(speed_step(mods)),
        KeyCode::Minus | KeyCode::NumpadSubtract => ControlAction::AdjustSpeed(-speed_step(mods)),
        _ => return None,
    };
    Some(action)
}
