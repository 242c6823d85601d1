use serde_json::Value;
use std::time::Duration;

const STAGGER_STEP: Duration = Duration::from_millis(50);
const HIDE_SETTLE: Duration = Duration::from_millis(400);

/// Delays used when transitioning every surface at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchTiming {
    /// Added per surface in iteration order.
    pub step: Duration,
    /// Time between the "begin hide" signal and the actual hide.
    pub settle: Duration,
}

impl Default for BatchTiming {
    fn default() -> Self {
        Self {
            step: STAGGER_STEP,
            settle: HIDE_SETTLE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchAction {
    Hidden(usize),
    Shown(usize),
}

impl BatchAction {
    pub fn to_json(self) -> Value {
        match self {
            BatchAction::Hidden(count) => serde_json::json!({"action": "hide", "count": count}),
            BatchAction::Shown(count) => serde_json::json!({"action": "show", "count": count}),
        }
    }
}
