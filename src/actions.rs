use bevy::prelude::*;
use std::collections::HashMap;

use crate::instancing::resources::COUNT_STEP;
use crate::instancing::SettingsChange;

/// Count step while Shift is held.
pub const COUNT_STEP_FAST: i64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlAction {
    CountUp,
    CountDown,
    ToggleMethod,
    ToggleSortObjects,
    TogglePerObjectFrustumCulled,
    Regenerate,
}

impl ControlAction {
    pub fn to_change(self, fast: bool) -> SettingsChange {
        let step = if fast { COUNT_STEP_FAST } else { COUNT_STEP };
        match self {
            ControlAction::CountUp => SettingsChange::AdjustCount(step),
            ControlAction::CountDown => SettingsChange::AdjustCount(-step),
            ControlAction::ToggleMethod => SettingsChange::ToggleMethod,
            ControlAction::ToggleSortObjects => SettingsChange::ToggleSortObjects,
            ControlAction::TogglePerObjectFrustumCulled => SettingsChange::TogglePerObjectFrustumCulled,
            ControlAction::Regenerate => SettingsChange::Regenerate,
        }
    }
}

/// Key → control mapping for the panel.
#[derive(Resource)]
pub struct ControlBindings {
    keys: HashMap<KeyCode, ControlAction>,
}

impl Default for ControlBindings {
    fn default() -> Self {
        let keys = HashMap::from([
            (KeyCode::ArrowUp, ControlAction::CountUp),
            (KeyCode::ArrowDown, ControlAction::CountDown),
            (KeyCode::KeyM, ControlAction::ToggleMethod),
            (KeyCode::KeyS, ControlAction::ToggleSortObjects),
            (KeyCode::KeyF, ControlAction::TogglePerObjectFrustumCulled),
            (KeyCode::KeyR, ControlAction::Regenerate),
        ]);
        Self { keys }
    }
}

impl ControlBindings {
    pub fn action(&self, key: KeyCode) -> Option<ControlAction> {
        self.keys.get(&key).copied()
    }

    /// Key shown next to `action` in the panel.
    pub fn key_for(&self, action: ControlAction) -> Option<KeyCode> {
        self.keys.iter().find(|(_, a)| **a == action).map(|(k, _)| *k)
    }
}
