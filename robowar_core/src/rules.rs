//! Rule constants and the closed-form formulas derived from them.
//!
//! All angles are degrees, distances are arena units, time is turns.

use serde::{Deserialize, Serialize};

/// Physical and scoring constants of a battle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rules {
    /// Radius of a robot body
    pub robot_radius: f64,

    /// Energy every robot starts a round with
    pub start_energy: f64,

    /// Gun heat at round start (nobody fires on turn 1)
    pub initial_gun_heat: f64,

    /// Gun heat removed per turn
    pub gun_cooling_rate: f64,

    /// Max speed gained per turn
    pub acceleration: f64,

    /// Max speed lost per turn
    pub deceleration: f64,

    /// Absolute speed limit
    pub max_velocity: f64,

    /// Turn rate limit at standstill
    pub max_turn_rate: f64,

    /// Turn rate lost per unit of speed
    pub turn_rate_velocity_factor: f64,

    /// Turn rates up to this value never limit speed
    pub free_turn_rate: f64,

    /// Speed lost per degree of turn above `free_turn_rate`
    pub sharp_turn_penalty: f64,

    /// Max gun rotation per turn
    pub gun_turn_rate: f64,

    /// Max radar rotation per turn
    pub radar_turn_rate: f64,

    /// Weakest bullet
    pub min_bullet_power: f64,

    /// Strongest bullet
    pub max_bullet_power: f64,

    /// Damage each robot takes in a collision
    pub ram_damage: f64,

    /// Radar range
    pub scan_radius: f64,

    /// Survival score per opponent outlived
    pub survival_score: f64,

    /// Bonus per opponent for being alone at round end
    pub last_survivor_bonus: f64,

    /// Share of damage dealt to a victim awarded when a bullet kills it
    pub bullet_kill_bonus: f64,

    /// Score per unit of ram damage dealt as the rammer
    pub ram_score_factor: f64,

    /// Share of ram damage dealt to a victim awarded when a ram kills it
    pub ram_kill_bonus: f64,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            robot_radius: 18.0,
            start_energy: 100.0,
            initial_gun_heat: 3.0,
            gun_cooling_rate: 0.1,
            acceleration: 1.0,
            deceleration: 2.0,
            max_velocity: 8.0,
            max_turn_rate: 10.0,
            turn_rate_velocity_factor: 0.75,
            free_turn_rate: 4.0,
            sharp_turn_penalty: 0.5,
            gun_turn_rate: 20.0,
            radar_turn_rate: 45.0,
            min_bullet_power: 0.1,
            max_bullet_power: 3.0,
            ram_damage: 0.6,
            scan_radius: 1200.0,
            survival_score: 50.0,
            last_survivor_bonus: 10.0,
            bullet_kill_bonus: 0.2,
            ram_score_factor: 2.0,
            ram_kill_bonus: 0.3,
        }
    }
}

impl Rules {
    /// Max body turn per turn at the given speed. Faster robots turn slower.
    pub fn max_turn_rate_at(&self, velocity: f64) -> f64 {
        (self.max_turn_rate - self.turn_rate_velocity_factor * velocity.abs()).max(0.0)
    }

    /// Max speed while turning at the given rate. Sharper turns cap speed.
    pub fn max_velocity_at(&self, turn_rate: f64) -> f64 {
        let excess = (turn_rate.abs() - self.free_turn_rate).max(0.0);
        (self.max_velocity - self.sharp_turn_penalty * excess).clamp(0.0, self.max_velocity)
    }

    /// Clamps a requested bullet power into range.
    ///
    /// Returns `None` for requests below the minimum power.
    pub fn clamp_power(&self, power: f64) -> Option<f64> {
        if !power.is_finite() || power < self.min_bullet_power {
            return None;
        }
        Some(power.min(self.max_bullet_power))
    }

    /// Bullet speed for a power.
    pub fn bullet_speed(&self, power: f64) -> f64 {
        20.0 - 3.0 * power
    }

    /// Damage a bullet deals on impact.
    pub fn bullet_damage(&self, power: f64) -> f64 {
        let mut damage = 4.0 * power;
        if power > 1.0 {
            damage += 2.0 * (power - 1.0);
        }
        damage
    }

    /// Energy returned to the shooter on a hit.
    pub fn bullet_hit_bonus(&self, power: f64) -> f64 {
        3.0 * power
    }

    /// Gun heat generated by firing.
    pub fn gun_heat(&self, power: f64) -> f64 {
        1.0 + power / 5.0
    }

    /// Damage for driving into a wall at the given speed.
    pub fn wall_damage(&self, velocity: f64) -> f64 {
        (velocity.abs() / 2.0 - 1.0).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_turn_rate_velocity_coupling() {
        let rules = Rules::default();

        // Turn cap shrinks with speed
        assert_relative_eq!(rules.max_turn_rate_at(0.0), 10.0);
        assert_relative_eq!(rules.max_turn_rate_at(8.0), 4.0);
        assert_relative_eq!(rules.max_turn_rate_at(-4.0), 7.0);

        // Speed cap shrinks with turn rate
        assert_relative_eq!(rules.max_velocity_at(0.0), 8.0);
        assert_relative_eq!(rules.max_velocity_at(4.0), 8.0);
        assert_relative_eq!(rules.max_velocity_at(10.0), 5.0);
        assert_relative_eq!(rules.max_velocity_at(-10.0), 5.0);

        // At full speed the allowed turn never lowers the speed cap
        let turn = rules.max_turn_rate_at(rules.max_velocity);
        assert_relative_eq!(rules.max_velocity_at(turn), rules.max_velocity);
    }

    #[test]
    fn test_bullet_formulas() {
        let rules = Rules::default();

        assert_relative_eq!(rules.bullet_speed(3.0), 11.0);
        assert_relative_eq!(rules.bullet_speed(0.1), 19.7);
        assert_relative_eq!(rules.bullet_damage(1.0), 4.0);
        assert_relative_eq!(rules.bullet_damage(3.0), 16.0);
        assert_relative_eq!(rules.bullet_damage(0.5), 2.0);
        assert_relative_eq!(rules.bullet_hit_bonus(2.0), 6.0);
        assert_relative_eq!(rules.gun_heat(3.0), 1.6);
    }

    #[test]
    fn test_clamp_power() {
        let rules = Rules::default();
        assert_eq!(rules.clamp_power(0.05), None);
        assert_eq!(rules.clamp_power(f64::NAN), None);
        assert_eq!(rules.clamp_power(5.0), Some(3.0));
        assert_eq!(rules.clamp_power(1.5), Some(1.5));
    }

    #[test]
    fn test_wall_damage() {
        let rules = Rules::default();
        assert_relative_eq!(rules.wall_damage(2.0), 0.0);
        assert_relative_eq!(rules.wall_damage(8.0), 3.0);
        assert_relative_eq!(rules.wall_damage(-6.0), 2.0);
    }
}
