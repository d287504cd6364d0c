//! The per-turn intent a robot queues through its context.

use serde::{Deserialize, Serialize};

/// Requested actions for the next turn boundary.
///
/// `None` fields leave the corresponding standing order untouched. Velocity
/// and turn rate persist until changed, gun and radar targets persist until
/// reached, `fire` and `scan` apply to one turn only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    /// Target velocity (units/turn, negative reverses)
    pub velocity: Option<f64>,

    /// Body turn rate (degrees/turn, positive = clockwise)
    pub turn_rate: Option<f64>,

    /// Absolute target heading for the gun
    pub gun_heading: Option<f64>,

    /// Absolute target heading for the radar
    pub radar_heading: Option<f64>,

    /// Fire a bullet with this power
    pub fire: Option<f64>,

    /// Force a radar scan even if the radar does not move
    pub scan: bool,

    /// Skip scheduling for this many turns
    pub sleep: Option<u32>,
}

impl Intent {
    /// Returns true if nothing was requested.
    pub fn is_empty(&self) -> bool {
        *self == Intent::default()
    }
}
