//! Radar sweeps.

use crate::events::BattleEvent;
use crate::geometry::{angle_in_sweep, bearing, normalize_relative};
use crate::peer::RobotPeer;
use crate::rules::Rules;
use robowar_api::{RobotEvent, ScannedRobot};

/// Runs the radar of every robot whose radar moved or that asked to scan.
///
/// The sweep covers the arc from last turn's radar heading to the current
/// one, widened by each target's angular radius. Detections land in the
/// scanner's inbox in id order.
pub fn sweep_radars(peers: &mut [RobotPeer], rules: &Rules) -> Vec<BattleEvent> {
    let mut detections = Vec::new();

    for scanner in peers.iter().filter(|p| p.is_alive() && p.energy > 0.0) {
        let sweep = normalize_relative(scanner.radar_heading - scanner.prev_radar_heading);
        if sweep == 0.0 && !scanner.scan_request {
            continue;
        }

        for target in peers.iter() {
            if target.id == scanner.id || !target.is_alive() || target.energy <= 0.0 {
                continue;
            }
            let distance = (target.position - scanner.position).norm();
            if distance > rules.scan_radius {
                continue;
            }

            let margin = if distance > rules.robot_radius {
                (rules.robot_radius / distance).asin().to_degrees()
            } else {
                90.0
            };
            let angle = bearing(&scanner.position, &target.position);
            if !angle_in_sweep(scanner.prev_radar_heading, sweep, angle, margin) {
                continue;
            }

            detections.push((
                scanner.id,
                ScannedRobot {
                    id: target.id,
                    name: target.name.clone(),
                    distance,
                    bearing: normalize_relative(angle - scanner.heading),
                    energy: target.energy,
                    heading: target.heading,
                    velocity: target.velocity,
                },
            ));
        }
    }

    let mut events = Vec::with_capacity(detections.len());
    for (scanner, seen) in detections {
        events.push(BattleEvent::RobotScanned {
            scanner,
            target: seen.id,
        });
        peers[scanner.index()].inbox.push(RobotEvent::ScannedRobot(seen));
    }
    for peer in peers.iter_mut() {
        peer.scan_request = false;
    }

    events
}
