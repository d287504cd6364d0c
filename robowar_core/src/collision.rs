//! Collision Resolver.
//!
//! Runs in a fixed order once bodies and bullets have moved: walls, robot
//! pairs, bullets against robots, bullets against bullets. Each pass emits
//! battle events and pushes the matching robot events into peer inboxes.
//!
//! Peers are indexed by `RobotId`, so every scan below walks them in id order.

use crate::bullet::Bullet;
use crate::events::BattleEvent;
use crate::geometry::{segment_circle_hit, segments_intersect, Vec2};
use crate::peer::RobotPeer;
use crate::rules::Rules;
use robowar_api::RobotEvent;
use std::collections::BTreeSet;

/// Whether a peer can collide with anything.
fn is_solid(peer: &RobotPeer) -> bool {
    peer.is_alive() && peer.energy > 0.0
}

// ============================================================================
// ROBOT VS WALL
// ============================================================================

/// Clamps robots into the arena and charges wall damage.
pub fn resolve_walls(peers: &mut [RobotPeer], rules: &Rules, width: f64, height: f64) -> Vec<BattleEvent> {
    let r = rules.robot_radius;
    let mut events = Vec::new();

    for peer in peers.iter_mut().filter(|p| p.is_alive()) {
        let clamped = Vec2::new(
            peer.position.x.clamp(r, width - r),
            peer.position.y.clamp(r, height - r),
        );
        if clamped == peer.position {
            continue;
        }

        let damage = peer.drain(rules.wall_damage(peer.velocity));
        peer.position = clamped;
        peer.velocity = 0.0;

        events.push(BattleEvent::HitWall { robot: peer.id, damage });
        peer.inbox.push(RobotEvent::HitWall { damage });
    }

    events
}

// ============================================================================
// ROBOT VS ROBOT
// ============================================================================

/// Whether `mover` drove toward `other` this turn.
fn moved_toward(mover: &RobotPeer, other: &RobotPeer) -> bool {
    let motion = mover.position - mover.prev_position;
    motion.norm_squared() > 0.0 && motion.dot(&(other.position - mover.prev_position)) > 0.0
}

/// Reverts overlapping robots to their turn-start positions.
///
/// Pairs are scanned repeatedly until no overlap remains; a reverted robot
/// may uncover a new overlap with a third one. Each pair takes ram damage
/// at most once per turn.
pub fn resolve_robot_collisions(peers: &mut [RobotPeer], rules: &Rules) -> Vec<BattleEvent> {
    let min_dist = 2.0 * rules.robot_radius;
    let mut hit_pairs = BTreeSet::new();
    let mut events = Vec::new();

    loop {
        let mut reverted = false;

        for i in 0..peers.len() {
            for j in (i + 1)..peers.len() {
                if !is_solid(&peers[i]) || !is_solid(&peers[j]) {
                    continue;
                }
                if (peers[i].position - peers[j].position).norm() >= min_dist {
                    continue;
                }

                if hit_pairs.insert((i, j)) {
                    let a_at_fault = moved_toward(&peers[i], &peers[j]);
                    let b_at_fault = moved_toward(&peers[j], &peers[i]);
                    let (a, b) = (peers[i].id, peers[j].id);
                    let damage_a = peers[i].drain(rules.ram_damage);
                    let damage_b = peers[j].drain(rules.ram_damage);

                    peers[i].inbox.push(RobotEvent::HitRobot {
                        other: b,
                        at_fault: a_at_fault,
                        damage: damage_a,
                    });
                    peers[j].inbox.push(RobotEvent::HitRobot {
                        other: a,
                        at_fault: b_at_fault,
                        damage: damage_b,
                    });
                    events.push(BattleEvent::RobotsCollided {
                        a,
                        b,
                        a_at_fault,
                        b_at_fault,
                        damage: rules.ram_damage,
                    });
                }

                for k in [i, j] {
                    let peer = &mut peers[k];
                    peer.velocity = 0.0;
                    if peer.position != peer.prev_position {
                        peer.position = peer.prev_position;
                        reverted = true;
                    }
                }
            }
        }

        if !reverted {
            break;
        }
    }

    events
}

// ============================================================================
// BULLETS
// ============================================================================

/// Tests every live bullet's swept segment against the robots.
///
/// The earliest contact along the segment wins; equal contacts go to the
/// lowest id. A bullet never hits its owner.
pub fn resolve_bullet_hits(peers: &mut [RobotPeer], bullets: &mut [Bullet], rules: &Rules) -> Vec<BattleEvent> {
    let mut events = Vec::new();

    for bullet in bullets.iter_mut().filter(|b| b.alive) {
        let mut best: Option<(f64, usize)> = None;
        for (idx, peer) in peers.iter().enumerate() {
            if peer.id == bullet.owner || !is_solid(peer) {
                continue;
            }
            if let Some(t) = segment_circle_hit(&bullet.start, &bullet.end, &peer.position, rules.robot_radius) {
                if best.map_or(true, |(best_t, _)| t < best_t) {
                    best = Some((t, idx));
                }
            }
        }

        let Some((_, victim_idx)) = best else {
            continue;
        };

        bullet.alive = false;
        let victim = &mut peers[victim_idx];
        let damage = victim.drain(rules.bullet_damage(bullet.power));
        let victim_id = victim.id;
        let victim_energy = victim.energy;
        victim.inbox.push(RobotEvent::HitByBullet {
            bullet: bullet.id,
            shooter: bullet.owner,
            power: bullet.power,
            damage,
        });

        if let Some(shooter) = peers.get_mut(bullet.owner.index()) {
            if is_solid(shooter) {
                shooter.energy += rules.bullet_hit_bonus(bullet.power);
                shooter.inbox.push(RobotEvent::BulletHit {
                    bullet: bullet.id,
                    victim: victim_id,
                    damage,
                    victim_energy,
                });
            }
        }

        events.push(BattleEvent::BulletHit {
            bullet: bullet.id,
            owner: bullet.owner,
            victim: victim_id,
            damage,
        });
    }

    events
}

/// Destroys pairs of bullets whose paths crossed this turn.
pub fn resolve_bullet_collisions(peers: &mut [RobotPeer], bullets: &mut [Bullet]) -> Vec<BattleEvent> {
    let mut events = Vec::new();

    for i in 0..bullets.len() {
        for j in (i + 1)..bullets.len() {
            if !bullets[i].alive || !bullets[j].alive {
                continue;
            }
            let (a, b) = (&bullets[i], &bullets[j]);
            if !segments_intersect(&a.start, &a.end, &b.start, &b.end) {
                continue;
            }

            bullets[i].alive = false;
            bullets[j].alive = false;
            let (a, b) = (&bullets[i], &bullets[j]);

            for (mine, theirs) in [(a, b), (b, a)] {
                if let Some(owner) = peers.get_mut(mine.owner.index()) {
                    if owner.is_alive() {
                        owner.inbox.push(RobotEvent::BulletHitBullet {
                            bullet: mine.id,
                            other: theirs.id,
                        });
                    }
                }
            }
            events.push(BattleEvent::BulletHitBullet { bullet: a.id, other: b.id });
        }
    }

    events
}

/// Destroys bullets that left the arena.
pub fn resolve_bullets_out(
    peers: &mut [RobotPeer],
    bullets: &mut [Bullet],
    width: f64,
    height: f64,
) -> Vec<BattleEvent> {
    let mut events = Vec::new();

    for bullet in bullets.iter_mut().filter(|b| b.alive) {
        if !bullet.is_outside(width, height) {
            continue;
        }
        bullet.alive = false;
        if let Some(owner) = peers.get_mut(bullet.owner.index()) {
            if owner.is_alive() {
                owner.inbox.push(RobotEvent::BulletMissed { bullet: bullet.id });
            }
        }
        events.push(BattleEvent::BulletMissed {
            bullet: bullet.id,
            owner: bullet.owner,
        });
    }

    events
}
