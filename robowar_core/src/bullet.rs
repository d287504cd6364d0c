//! Bullets in flight.

use crate::geometry::{heading_vector, Vec2};
use robowar_api::RobotId;

/// A bullet. Holds its owner by id only; it keeps flying after the owner dies.
#[derive(Debug, Clone, PartialEq)]
pub struct Bullet {
    /// Unique within the round
    pub id: u64,

    /// Robot that fired it
    pub owner: RobotId,

    /// Firing power
    pub power: f64,

    /// Direction of travel
    pub heading: f64,

    /// Distance per turn
    pub speed: f64,

    /// Position at turn start
    pub start: Vec2,

    /// Position at turn end
    pub end: Vec2,

    /// False once the bullet hit something or left the arena
    pub alive: bool,
}

impl Bullet {
    /// Creates a bullet at `origin`; it starts moving on the next advance.
    pub fn new(id: u64, owner: RobotId, origin: Vec2, heading: f64, power: f64, speed: f64) -> Self {
        Self {
            id,
            owner,
            power,
            heading,
            speed,
            start: origin,
            end: origin,
            alive: true,
        }
    }

    /// Moves the bullet one turn; the covered segment is `start → end`.
    pub fn advance(&mut self) {
        self.start = self.end;
        self.end = self.start + heading_vector(self.heading) * self.speed;
    }

    /// Whether the end position is outside a `width × height` arena.
    pub fn is_outside(&self, width: f64, height: f64) -> bool {
        self.end.x < 0.0 || self.end.y < 0.0 || self.end.x > width || self.end.y > height
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_advance_tracks_segment() {
        let mut b = Bullet::new(1, RobotId(0), Vec2::new(100.0, 100.0), 90.0, 3.0, 11.0);
        b.advance();
        assert_relative_eq!(b.start.x, 100.0);
        assert_relative_eq!(b.end.x, 111.0, epsilon = 1e-9);
        b.advance();
        assert_relative_eq!(b.start.x, 111.0, epsilon = 1e-9);
        assert_relative_eq!(b.end.x, 122.0, epsilon = 1e-9);
        assert_relative_eq!(b.end.y, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_outside() {
        let mut b = Bullet::new(1, RobotId(0), Vec2::new(5.0, 100.0), 270.0, 1.0, 17.0);
        assert!(!b.is_outside(800.0, 600.0));
        b.advance();
        assert!(b.is_outside(800.0, 600.0));
    }
}
