//! 1D gradient noise for the drift-style motion modes.

use rand::seq::SliceRandom;
use rand::thread_rng;

/// Smooth 1D value noise over a shuffled permutation table.
///
/// Output is roughly in [-1, 1] and continuous in the input, which is all the
/// drift modes need: each particle samples it at `time + phase` to wander
/// without ever snapping.
pub struct DriftNoise {
    perm: [u8; 512],
}

impl DriftNoise {
    pub fn new() -> Self {
        let mut table: Vec<u8> = (0..=255).collect();
        table.shuffle(&mut thread_rng());
        let mut perm = [0u8; 512];
        for i in 0..512 {
            perm[i] = table[i & 255];
        }
        Self { perm }
    }

    /// Deterministic variant for tests.
    #[cfg(test)]
    pub fn unshuffled() -> Self {
        let mut perm = [0u8; 512];
        for i in 0..512 {
            perm[i] = (i & 255) as u8;
        }
        Self { perm }
    }

    fn fade(t: f32) -> f32 {
        t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
    }

    fn grad(hash: u8, x: f32) -> f32 {
        if hash & 1 == 0 {
            x
        } else {
            -x
        }
    }

    pub fn sample(&self, x: f32) -> f32 {
        let xi = x.floor();
        let cell = (xi as i64 & 255) as usize;
        let frac = x - xi;
        let u = Self::fade(frac);
        let a = Self::grad(self.perm[cell], frac);
        let b = Self::grad(self.perm[cell + 1], frac - 1.0);
        (a + u * (b - a)) * 2.0
    }
}

impl Default for DriftNoise {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_output() {
        let n = DriftNoise::unshuffled();
        for i in 0..2000 {
            let v = n.sample(i as f32 * 0.173 - 100.0);
            assert!(v.is_finite());
            assert!((-2.0..=2.0).contains(&v), "noise out of range: {v}");
        }
    }

    #[test]
    fn continuous_across_small_steps() {
        let n = DriftNoise::unshuffled();
        let mut prev = n.sample(0.0);
        for i in 1..1000 {
            let v = n.sample(i as f32 * 0.001);
            assert!((v - prev).abs() < 0.05, "noise jumped by {}", (v - prev).abs());
            prev = v;
        }
    }
}
