//! Range and hit resolution
//!
//! Handles weapon reach and range on the encounter grid:
//! - Grid distance between two tokens (Chebyshev, in squares)
//! - Melee reach (5 ft, 10 ft with the reach property)
//! - Ranged normal/long bands and the adjacent-target penalty
//! - Thrown weapons, melee within reach and ranged beyond it
//! - Hit versus armor class
//!
//! Any failure to work out a distance leaves the attack legal.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::state::{Bounds, Encounter, Grid};

/// Melee reach without the reach property
pub const MELEE_RANGE: f64 = 5.0;
/// Melee reach with the reach property
pub const REACH_RANGE: f64 = 10.0;
/// Ranged attacks at or inside this distance suffer disadvantage
pub const ADJACENT_RANGE: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RangeError {
    #[error("grid cell size {0} is not usable")]
    InvalidGrid(f64),

    #[error("no active encounter")]
    NoEncounter,

    #[error("{0} has no token in the encounter")]
    MissingToken(String),

    #[error("ranged attack has no declared range")]
    MissingRange,
}

/// Declared normal and long range in distance units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangePair {
    pub normal: f64,
    /// Long range; equal to normal when omitted
    #[serde(default)]
    pub long: Option<f64>,
}

impl RangePair {
    pub fn new(normal: f64, long: f64) -> Self {
        Self {
            normal,
            long: Some(long),
        }
    }

    pub fn long(&self) -> f64 {
        self.long.unwrap_or(self.normal).max(self.normal)
    }
}

/// How an attack reaches its target
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WeaponRange {
    Melee { reach: bool },
    Ranged { range: Option<RangePair> },
    /// Melee within reach, ranged beyond it
    Thrown { reach: bool, range: Option<RangePair> },
}

impl WeaponRange {
    fn melee_max(reach: bool) -> f64 {
        if reach {
            REACH_RANGE
        } else {
            MELEE_RANGE
        }
    }
}

/// Outcome of a range check
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RangeCheck {
    pub legal: bool,
    pub disadvantage: bool,
    /// Distance in units, if one was measured
    pub distance: Option<f64>,
    pub reasons: Vec<String>,
}

impl RangeCheck {
    fn legal_at(distance: f64) -> Self {
        Self {
            legal: true,
            disadvantage: false,
            distance: Some(distance),
            reasons: Vec::new(),
        }
    }

    /// Legal with no measurement, after an internal failure
    pub fn fail_open(reason: impl Into<String>) -> Self {
        Self {
            legal: true,
            disadvantage: false,
            distance: None,
            reasons: vec![reason.into()],
        }
    }

    fn reject(mut self, reason: String) -> Self {
        self.legal = false;
        self.reasons.push(reason);
        self
    }

    fn disadvantage(mut self, reason: String) -> Self {
        self.disadvantage = true;
        self.reasons.push(reason);
        self
    }

    /// Reasons joined for chat output
    pub fn summary(&self) -> String {
        self.reasons.join("; ")
    }
}

/// First and last grid cell covered along one axis
fn cell_span(start: f64, length: f64, cell: f64) -> (i64, i64) {
    let first = (start / cell).floor() as i64;
    let last = ((start + length.max(0.0)) / cell).ceil() as i64 - 1;
    (first, last.max(first))
}

fn axis_gap(a: (i64, i64), b: (i64, i64)) -> i64 {
    (b.0 - a.1).max(a.0 - b.1).max(0)
}

/// Distance in units between two token footprints
///
/// Squares are counted as the larger of the horizontal and vertical gaps
/// between occupied cells, so orthogonally or diagonally adjacent tokens
/// are one square apart.
pub fn grid_distance(a: &Bounds, b: &Bounds, grid: &Grid) -> Result<f64, RangeError> {
    let cell = grid.cell_size;
    if !cell.is_finite() || cell <= 0.0 {
        return Err(RangeError::InvalidGrid(cell));
    }
    let dx = axis_gap(cell_span(a.x, a.width, cell), cell_span(b.x, b.width, cell));
    let dy = axis_gap(cell_span(a.y, a.height, cell), cell_span(b.y, b.height, cell));
    Ok(dx.max(dy) as f64 * grid.units_per_cell)
}

fn check_ranged(distance: f64, range: Option<RangePair>) -> Result<RangeCheck, RangeError> {
    let range = range.ok_or(RangeError::MissingRange)?;
    let mut check = RangeCheck::legal_at(distance);

    if distance > range.long() {
        return Ok(check.reject(format!(
            "Target is out of range ({} ft, long range {} ft)",
            distance,
            range.long()
        )));
    }
    if distance > range.normal {
        check = check.disadvantage(format!(
            "Beyond normal range ({} ft > {} ft)",
            distance, range.normal
        ));
    }
    if distance <= ADJACENT_RANGE {
        check = check.disadvantage("Ranged attack against an adjacent target".to_string());
    }
    Ok(check)
}

/// Check legality of an attack at a measured distance
pub fn check_range(distance: f64, weapon: &WeaponRange) -> Result<RangeCheck, RangeError> {
    match *weapon {
        WeaponRange::Melee { reach } => {
            let max = WeaponRange::melee_max(reach);
            let check = RangeCheck::legal_at(distance);
            if distance > max {
                Ok(check.reject(format!(
                    "Target is out of range ({} ft > {} ft)",
                    distance, max
                )))
            } else {
                Ok(check)
            }
        }
        WeaponRange::Ranged { range } => check_ranged(distance, range),
        WeaponRange::Thrown { reach, range } => {
            if distance <= WeaponRange::melee_max(reach) {
                Ok(RangeCheck::legal_at(distance))
            } else {
                check_ranged(distance, range)
            }
        }
    }
}

fn measure(
    encounter: Option<&Encounter>,
    attacker_id: &str,
    target_id: &str,
    weapon: &WeaponRange,
) -> Result<RangeCheck, RangeError> {
    let encounter = encounter.ok_or(RangeError::NoEncounter)?;
    let attacker = encounter
        .token_for(attacker_id)
        .ok_or_else(|| RangeError::MissingToken(attacker_id.to_string()))?;
    let target = encounter
        .token_for(target_id)
        .ok_or_else(|| RangeError::MissingToken(target_id.to_string()))?;
    let distance = grid_distance(&attacker.bounds, &target.bounds, &encounter.grid)?;
    check_range(distance, weapon)
}

/// Range check between two documents in the active encounter
///
/// Never blocks an attack because of missing or malformed data.
pub fn resolve_range(
    encounter: Option<&Encounter>,
    attacker_id: &str,
    target_id: &str,
    weapon: &WeaponRange,
) -> RangeCheck {
    match measure(encounter, attacker_id, target_id, weapon) {
        Ok(check) => check,
        Err(e) => {
            warn!(
                "Range check {} -> {} skipped: {}",
                attacker_id, target_id, e
            );
            RangeCheck::fail_open(format!("range not checked: {}", e))
        }
    }
}

/// An attack hits on meeting the armor class, or always on a critical
pub fn is_hit(attack_total: i32, armor_class: i32, critical: bool) -> bool {
    critical || attack_total >= armor_class
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Token;

    fn square(col: f64, row: f64) -> Bounds {
        Bounds::new(col * 50.0, row * 50.0, 50.0, 50.0)
    }

    fn encounter_with(attacker: Bounds, target: Bounds) -> Encounter {
        Encounter {
            id: "enc".to_string(),
            grid: Grid::default(),
            tokens: vec![
                Token {
                    id: "t1".to_string(),
                    document_id: "attacker".to_string(),
                    bounds: attacker,
                },
                Token {
                    id: "t2".to_string(),
                    document_id: "target".to_string(),
                    bounds: target,
                },
            ],
            round: 1,
        }
    }

    #[test]
    fn test_grid_distance() {
        let grid = Grid::default();
        assert_eq!(grid_distance(&square(0.0, 0.0), &square(1.0, 0.0), &grid).unwrap(), 5.0);
        assert_eq!(grid_distance(&square(0.0, 0.0), &square(1.0, 1.0), &grid).unwrap(), 5.0);
        assert_eq!(grid_distance(&square(0.0, 0.0), &square(2.0, 0.0), &grid).unwrap(), 10.0);
        assert_eq!(grid_distance(&square(3.0, 0.0), &square(0.0, 6.0), &grid).unwrap(), 30.0);
    }

    #[test]
    fn test_large_token_footprint() {
        // 2x2 ogre occupying columns 1-2; target at column 4 is two squares away
        let ogre = Bounds::new(50.0, 0.0, 100.0, 100.0);
        let dist = grid_distance(&ogre, &square(4.0, 0.0), &Grid::default()).unwrap();
        assert_eq!(dist, 10.0);
    }

    #[test]
    fn test_invalid_grid() {
        let grid = Grid {
            cell_size: 0.0,
            units_per_cell: 5.0,
        };
        assert!(matches!(
            grid_distance(&square(0.0, 0.0), &square(1.0, 0.0), &grid),
            Err(RangeError::InvalidGrid(_))
        ));
    }

    #[test]
    fn test_melee_reach() {
        let plain = WeaponRange::Melee { reach: false };
        let reach = WeaponRange::Melee { reach: true };

        assert!(check_range(5.0, &plain).unwrap().legal);
        let far = check_range(10.0, &plain).unwrap();
        assert!(!far.legal);
        assert!(far.summary().contains("out of range"));

        assert!(check_range(10.0, &reach).unwrap().legal);
        assert!(!check_range(15.0, &reach).unwrap().legal);
    }

    #[test]
    fn test_ranged_bands() {
        let bow = WeaponRange::Ranged {
            range: Some(RangePair::new(80.0, 320.0)),
        };

        let near = check_range(60.0, &bow).unwrap();
        assert!(near.legal && !near.disadvantage);

        let long = check_range(100.0, &bow).unwrap();
        assert!(long.legal && long.disadvantage);

        assert!(!check_range(325.0, &bow).unwrap().legal);
    }

    #[test]
    fn test_ranged_adjacent_reasons_compose() {
        let dart = WeaponRange::Ranged {
            range: Some(RangePair::new(2.0, 60.0)),
        };
        let check = check_range(5.0, &dart).unwrap();
        assert!(check.legal);
        assert!(check.disadvantage);
        assert_eq!(check.reasons.len(), 2);
    }

    #[test]
    fn test_ranged_without_range_is_error() {
        let bow = WeaponRange::Ranged { range: None };
        assert_eq!(check_range(30.0, &bow), Err(RangeError::MissingRange));
    }

    #[test]
    fn test_thrown_falls_through_to_ranged() {
        let handaxe = WeaponRange::Thrown {
            reach: false,
            range: Some(RangePair::new(20.0, 60.0)),
        };
        let melee = check_range(5.0, &handaxe).unwrap();
        assert!(melee.legal && !melee.disadvantage);

        let thrown = check_range(30.0, &handaxe).unwrap();
        assert!(thrown.legal && thrown.disadvantage);

        assert!(!check_range(65.0, &handaxe).unwrap().legal);
    }

    #[test]
    fn test_resolve_on_encounter() {
        let enc = encounter_with(square(0.0, 0.0), square(2.0, 0.0));
        let check = resolve_range(
            Some(&enc),
            "attacker",
            "target",
            &WeaponRange::Melee { reach: false },
        );
        assert!(!check.legal);
        assert_eq!(check.distance, Some(10.0));

        let check = resolve_range(
            Some(&enc),
            "attacker",
            "target",
            &WeaponRange::Melee { reach: true },
        );
        assert!(check.legal);
    }

    #[test]
    fn test_resolve_fails_open() {
        let melee = WeaponRange::Melee { reach: false };
        assert!(resolve_range(None, "attacker", "target", &melee).legal);

        let enc = encounter_with(square(0.0, 0.0), square(9.0, 0.0));
        assert!(resolve_range(Some(&enc), "attacker", "ghost", &melee).legal);

        let bow = WeaponRange::Ranged { range: None };
        assert!(resolve_range(Some(&enc), "attacker", "target", &bow).legal);
    }

    #[test]
    fn test_critical_always_hits() {
        assert!(is_hit(23, 15, false));
        assert!(is_hit(15, 15, false));
        assert!(!is_hit(14, 15, false));
        assert!(is_hit(9, 15, true));
    }
}
