//! Physics Engine: turns standing orders into motion, firing and heat.
//!
//! The movement model couples turn rate and speed: the turn allowed this
//! turn is capped by the speed at turn start, and the speed reachable this
//! turn is capped by the turn actually applied.

use crate::bullet::Bullet;
use crate::geometry::{heading_vector, normalize_absolute, normalize_relative, rotate_toward};
use crate::peer::RobotPeer;
use crate::rules::Rules;

/// Heat below this counts as fully cooled.
const HEAT_EPSILON: f64 = 1e-9;

/// Cools the gun by one turn.
pub fn cool_gun(peer: &mut RobotPeer, rules: &Rules) {
    let heat = peer.gun_heat - rules.gun_cooling_rate;
    peer.gun_heat = if heat < HEAT_EPSILON { 0.0 } else { heat };
}

/// Consumes the peer's fire request and returns the bullet if accepted.
///
/// A shot is accepted when the gun is cool, the power is at least the
/// minimum and the robot keeps some energy after paying for it.
pub fn try_fire(peer: &mut RobotPeer, rules: &Rules, bullet_id: u64) -> Option<Bullet> {
    let requested = peer.fire_request.take()?;
    if peer.gun_heat > 0.0 {
        return None;
    }
    let power = rules.clamp_power(requested)?;
    if peer.energy <= power {
        return None;
    }

    peer.energy -= power;
    peer.gun_heat = rules.gun_heat(power);

    Some(Bullet::new(
        bullet_id,
        peer.id,
        peer.position,
        peer.gun_heading,
        power,
        rules.bullet_speed(power),
    ))
}

/// Speed after one turn of moving from `current` toward `target`.
///
/// Speeding up is limited by acceleration, slowing down by deceleration.
/// Reversing decelerates to zero first and spends the rest of the turn
/// accelerating the other way.
pub fn next_velocity(current: f64, target: f64, rules: &Rules) -> f64 {
    let speed = current.abs();
    let dir = if current != 0.0 { current.signum() } else { target.signum() };
    let goal = target * dir;

    if goal >= speed {
        dir * (speed + rules.acceleration).min(goal)
    } else if goal >= 0.0 {
        dir * (speed - rules.deceleration).max(goal)
    } else if speed >= rules.deceleration {
        dir * (speed - rules.deceleration)
    } else {
        let remaining = 1.0 - speed / rules.deceleration;
        -dir * (rules.acceleration * remaining).min(-goal)
    }
}

/// Advances one peer's body, gun and radar by one turn.
pub fn advance_body(peer: &mut RobotPeer, rules: &Rules) {
    peer.prev_position = peer.position;
    peer.prev_radar_heading = peer.radar_heading;

    // Body turn, capped by the speed at turn start
    let max_turn = rules.max_turn_rate_at(peer.velocity);
    let turn = peer.orders.turn_rate.clamp(-max_turn, max_turn);
    peer.heading = normalize_absolute(peer.heading + turn);
    peer.turn_applied = turn;

    // Speed, capped by the turn just applied
    let cap = rules.max_velocity_at(turn);
    let target = peer.orders.velocity.clamp(-cap, cap);
    peer.velocity = next_velocity(peer.velocity, target, rules);

    // Gun
    let mut gun_delta = 0.0;
    if peer.mode.gun_locked_to_body {
        peer.gun_heading = normalize_absolute(peer.gun_heading + turn);
        gun_delta += turn;
    }
    if let Some(target) = peer.orders.gun_target {
        let (heading, step) = rotate_toward(peer.gun_heading, target, rules.gun_turn_rate);
        peer.gun_heading = heading;
        gun_delta += step;
        if normalize_relative(target - heading).abs() < HEAT_EPSILON {
            peer.orders.gun_target = None;
        }
    }

    // Radar
    if peer.mode.radar_locked_to_gun {
        peer.radar_heading = normalize_absolute(peer.radar_heading + gun_delta);
    }
    if let Some(target) = peer.orders.radar_target {
        let (heading, _) = rotate_toward(peer.radar_heading, target, rules.radar_turn_rate);
        peer.radar_heading = heading;
        if normalize_relative(target - heading).abs() < HEAT_EPSILON {
            peer.orders.radar_target = None;
        }
    }

    peer.position += heading_vector(peer.heading) * peer.velocity;
}
