//! Stochastic glyph-override modules (warning / charging overlays).
//!
//! Each module claims halftone cells with a probability that grows toward the
//! viewport edge and with the configured strength. Claims are decided by a
//! deterministic hash of the cell coordinates, so a cell's verdict is stable
//! frame to frame; the modules hash with different coordinate offsets so
//! their distributions are decorrelated.

use crate::config::{DotShape, OverlayModuleConfig};

/// Hash offsets decorrelating the three draws.
const MINOR_OFFSET: (i32, i32) = (53, 91);
const CHARGING_OFFSET: (i32, i32) = (37, 61);

/// Deterministic cell hash in [0, 1). Same trig-fract construction the
/// shader world uses; cheap and stable for integer lattice inputs.
pub fn cell_hash(i: i32, j: i32) -> f32 {
    let v = (i as f32 * 12.9898 + j as f32 * 78.233).sin() * 43758.5453;
    (v.abs()).fract()
}

/// Claim probability for one module at a normalized center distance.
pub fn claim_probability(strength: f32, dist_norm: f32) -> f32 {
    let strength = strength.clamp(0.0, 1.0);
    let dist_norm = dist_norm.clamp(0.0, 1.0);
    (strength * dist_norm.powf(4.5 - strength)).min(1.0)
}

/// One cell's override verdict.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlayHit {
    pub shape: DotShape,
    pub color: [u8; 3],
}

pub struct OverlayInjector<'a> {
    pub warning: &'a OverlayModuleConfig,
    pub warning_minor_strength: f32,
    pub charging: &'a OverlayModuleConfig,
}

impl OverlayInjector<'_> {
    /// Decide whether cell (i, j) at normalized distance `dist_norm` from the
    /// viewport center gets its glyph overridden. First claim wins: primary
    /// warning, then the lower-severity warning variant, then charging.
    pub fn inject(&self, i: i32, j: i32, dist_norm: f32) -> Option<OverlayHit> {
        if self.warning.enabled {
            let p = claim_probability(self.warning.strength, dist_norm);
            if cell_hash(i, j) < p {
                return Some(OverlayHit {
                    shape: DotShape::ErrorCross,
                    color: self.warning.color,
                });
            }
            let p_minor = claim_probability(self.warning_minor_strength, dist_norm);
            if cell_hash(i + MINOR_OFFSET.0, j + MINOR_OFFSET.1) < p_minor {
                return Some(OverlayHit {
                    shape: DotShape::Question,
                    color: self.warning.color,
                });
            }
        }
        if self.charging.enabled {
            let p = claim_probability(self.charging.strength, dist_norm);
            if cell_hash(i + CHARGING_OFFSET.0, j + CHARGING_OFFSET.1) < p {
                return Some(OverlayHit {
                    shape: DotShape::Electric,
                    color: self.charging.color,
                });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OverlayModuleConfig;

    #[test]
    fn hash_is_deterministic_and_normalized() {
        for i in -40..40 {
            for j in -40..40 {
                let a = cell_hash(i, j);
                let b = cell_hash(i, j);
                assert_eq!(a, b);
                assert!((0.0..1.0).contains(&a));
            }
        }
    }

    #[test]
    fn full_strength_at_viewport_edge_always_claims() {
        // min(1, 1.0 * 1.0^(4.5-1.0)) = 1: every hash value loses.
        assert_eq!(claim_probability(1.0, 1.0), 1.0);

        let warning = OverlayModuleConfig {
            enabled: true,
            strength: 1.0,
            color: [255, 196, 0],
        };
        let charging = OverlayModuleConfig::default();
        let injector = OverlayInjector {
            warning: &warning,
            warning_minor_strength: 0.0,
            charging: &charging,
        };
        for i in -20..20 {
            for j in -20..20 {
                let hit = injector.inject(i, j, 1.0);
                assert_eq!(
                    hit,
                    Some(OverlayHit {
                        shape: DotShape::ErrorCross,
                        color: [255, 196, 0],
                    })
                );
            }
        }
    }

    #[test]
    fn probability_grows_toward_edge() {
        let mut prev = 0.0;
        for step in 0..=10 {
            let p = claim_probability(0.6, step as f32 / 10.0);
            assert!(p >= prev);
            assert!((0.0..=1.0).contains(&p));
            prev = p;
        }
        assert_eq!(claim_probability(0.6, 0.0), 0.0);
    }

    #[test]
    fn disabled_modules_never_claim() {
        let off = OverlayModuleConfig {
            enabled: false,
            strength: 1.0,
            color: [0, 0, 0],
        };
        let injector = OverlayInjector {
            warning: &off,
            warning_minor_strength: 1.0,
            charging: &off,
        };
        for i in 0..50 {
            assert_eq!(injector.inject(i, i, 1.0), None);
        }
    }

    #[test]
    fn modules_are_decorrelated() {
        // At mid strength the two modules should not claim the identical cell
        // set; the coordinate offsets must decorrelate their hashes.
        let mut warning_only = 0;
        let mut charging_claims = 0;
        for i in -50..50 {
            for j in -50..50 {
                let p = claim_probability(0.5, 0.9);
                let w = cell_hash(i, j) < p;
                let c = cell_hash(i + CHARGING_OFFSET.0, j + CHARGING_OFFSET.1) < p;
                if w && !c {
                    warning_only += 1;
                }
                if c {
                    charging_claims += 1;
                }
            }
        }
        assert!(warning_only > 0, "offsets failed to decorrelate");
        assert!(charging_claims > 0);
    }
}
