//! Scalar influence field evaluation.
//!
//! The hottest function in the frame: called once per halftone cell (or per
//! raw-mask pixel). Two strategies share the same threshold-band mapping —
//! an inverse-square metaball sum over the particles, or a lookup into a
//! pre-rasterized 600x600 density map for the text/image modes.

use egui::Vec2;

use crate::particles::Particle;

/// Side length of the density-map sample space.
pub const DENSITY_SIZE: usize = 600;

/// Smallest squared distance accepted by the metaball sum; anything closer
/// counts as "on top of the particle" and saturates instead of dividing by 0.
const MIN_DIST_SQ: f32 = 1e-6;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DensityKind {
    /// Single rendered channel (rasterized text).
    Text,
    /// Full RGBA; density is luma weighted by alpha.
    Image,
}

/// Opaque sampled density buffer produced by the rasterizer worker.
#[derive(Clone)]
pub struct DensityMap {
    /// RGBA8, `DENSITY_SIZE * DENSITY_SIZE * 4` bytes.
    pub pixels: Vec<u8>,
    pub kind: DensityKind,
    /// Extra scale applied by the producer (image fit scale); folded into the
    /// world-to-sample transform.
    pub view_scale: f32,
}

impl DensityMap {
    /// Density in [0, 1] at integer sample coordinates; out of bounds is 0.
    pub fn density_at(&self, sx: f32, sy: f32) -> f32 {
        if sx < 0.0 || sy < 0.0 || sx >= DENSITY_SIZE as f32 || sy >= DENSITY_SIZE as f32 {
            return 0.0;
        }
        let idx = (sy as usize * DENSITY_SIZE + sx as usize) * 4;
        if idx + 3 >= self.pixels.len() {
            return 0.0;
        }
        match self.kind {
            DensityKind::Text => self.pixels[idx] as f32 / 255.0,
            DensityKind::Image => {
                let r = self.pixels[idx] as f32;
                let g = self.pixels[idx + 1] as f32;
                let b = self.pixels[idx + 2] as f32;
                let a = self.pixels[idx + 3] as f32 / 255.0;
                (0.299 * r + 0.587 * g + 0.114 * b) / 255.0 * a
            }
        }
    }
}

/// Per-frame constants for the evaluator, all pre-resolved so `influence`
/// stays branch-cheap.
#[derive(Clone, Copy, Debug)]
pub struct FieldParams {
    pub threshold: f32,
    pub edge: f32,
    /// Virtual center (viewport center plus configured offset).
    pub center: Vec2,
    pub pattern_scale: f32,
    /// Sinusoidal density pulse, 1.0 when disabled.
    pub pulse: f32,
}

pub enum FieldSource<'a> {
    Metaballs(&'a [Particle]),
    Density(&'a DensityMap),
}

pub struct FieldEvaluator<'a> {
    source: FieldSource<'a>,
    min_t: f32,
    max_t: f32,
    threshold: f32,
    center: Vec2,
    inv_scale: f32,
    pulse: f32,
}

impl<'a> FieldEvaluator<'a> {
    pub fn new(source: FieldSource<'a>, params: FieldParams) -> Self {
        let min_t = params.threshold - params.edge;
        let max_t = params.threshold + params.edge;
        let scale = match &source {
            FieldSource::Density(map) => params.pattern_scale * map.view_scale,
            FieldSource::Metaballs(_) => params.pattern_scale,
        };
        Self {
            source,
            min_t,
            max_t,
            threshold: params.threshold,
            center: params.center,
            inv_scale: 1.0 / scale.max(1e-3),
            pulse: params.pulse,
        }
    }

    /// Normalized influence in [0, 1] at a world-space point.
    #[inline]
    pub fn influence(&self, x: f32, y: f32) -> f32 {
        let raw = match &self.source {
            FieldSource::Metaballs(particles) => {
                let mut sum = 0.0f32;
                for p in particles.iter() {
                    let dx = x - p.pos.x;
                    let dy = y - p.pos.y;
                    let d2 = dx * dx + dy * dy;
                    if d2 > MIN_DIST_SQ {
                        sum += p.radius * p.radius / d2;
                    } else {
                        // Coincident with a particle center: saturate.
                        return 1.0;
                    }
                }
                sum
            }
            FieldSource::Density(map) => {
                let sx = (x - self.center.x) * self.inv_scale + DENSITY_SIZE as f32 / 2.0;
                let sy = (y - self.center.y) * self.inv_scale + DENSITY_SIZE as f32 / 2.0;
                map.density_at(sx, sy) * self.pulse * self.threshold * 1.5
            }
        };
        self.band(raw)
    }

    /// Map raw field strength through the threshold band.
    #[inline]
    fn band(&self, raw: f32) -> f32 {
        if !raw.is_finite() || raw >= self.max_t {
            1.0
        } else if raw <= self.min_t {
            0.0
        } else {
            (raw - self.min_t) / (self.max_t - self.min_t).max(1e-6)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::Vec2;

    fn particle(x: f32, y: f32, radius: f32) -> Particle {
        Particle {
            pos: Vec2::new(x, y),
            vel: Vec2::ZERO,
            noise_x: 0.0,
            noise_y: 0.0,
            radius,
            scale: 1.0,
            id: 0,
            aux: [0.0; 3],
        }
    }

    fn params(threshold: f32, edge: f32) -> FieldParams {
        FieldParams {
            threshold,
            edge,
            center: Vec2::new(300.0, 300.0),
            pattern_scale: 1.0,
            pulse: 1.0,
        }
    }

    #[test]
    fn single_particle_band_value() {
        // raw = 42^2 / 42^2 = 1.0, band [0.4, 1.8] -> (1.0-0.4)/1.4
        let particles = [particle(0.0, 0.0, 42.0)];
        let eval = FieldEvaluator::new(FieldSource::Metaballs(&particles), params(1.1, 0.7));
        let inf = eval.influence(42.0, 0.0);
        assert!((inf - 0.428_571).abs() < 1e-4, "got {inf}");
    }

    #[test]
    fn coincident_point_saturates_instead_of_nan() {
        let particles = [particle(10.0, 20.0, 42.0)];
        let eval = FieldEvaluator::new(FieldSource::Metaballs(&particles), params(1.1, 0.7));
        let inf = eval.influence(10.0, 20.0);
        assert!(inf.is_finite());
        assert_eq!(inf, 1.0);
    }

    #[test]
    fn band_edges_clamp_to_zero_and_one() {
        let particles = [particle(0.0, 0.0, 10.0)];
        let eval = FieldEvaluator::new(FieldSource::Metaballs(&particles), params(1.1, 0.7));
        // Far away: raw ~ 0 -> below threshold-edge -> exactly 0.
        assert_eq!(eval.influence(10_000.0, 0.0), 0.0);
        // Very close: raw >> threshold+edge -> exactly 1.
        assert_eq!(eval.influence(0.5, 0.0), 1.0);
    }

    #[test]
    fn influence_monotone_in_distance_within_band() {
        let particles = [particle(0.0, 0.0, 42.0)];
        let eval = FieldEvaluator::new(FieldSource::Metaballs(&particles), params(1.1, 0.7));
        let mut prev = 1.0f32;
        for step in 0..200 {
            let d = 30.0 + step as f32 * 0.5;
            let inf = eval.influence(d, 0.0);
            assert!(inf <= prev + 1e-6, "influence rose with distance at {d}");
            assert!((0.0..=1.0).contains(&inf));
            prev = inf;
        }
    }

    #[test]
    fn random_fields_stay_normalized() {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let particles: Vec<Particle> = (0..12)
                .map(|_| {
                    particle(
                        rng.gen_range(-200.0..200.0),
                        rng.gen_range(-200.0..200.0),
                        rng.gen_range(1.0..80.0),
                    )
                })
                .collect();
            let eval = FieldEvaluator::new(FieldSource::Metaballs(&particles), params(1.1, 0.7));
            for _ in 0..50 {
                let inf = eval.influence(rng.gen_range(-300.0..300.0), rng.gen_range(-300.0..300.0));
                assert!(inf.is_finite());
                assert!((0.0..=1.0).contains(&inf));
            }
        }
    }

    #[test]
    fn density_out_of_bounds_is_zero() {
        let map = DensityMap {
            pixels: vec![255; DENSITY_SIZE * DENSITY_SIZE * 4],
            kind: DensityKind::Text,
            view_scale: 1.0,
        };
        assert_eq!(map.density_at(-1.0, 0.0), 0.0);
        assert_eq!(map.density_at(0.0, 600.0), 0.0);
        assert_eq!(map.density_at(599.0, 599.0), 1.0);
    }

    #[test]
    fn image_density_weights_luma_by_alpha() {
        let mut pixels = vec![0u8; DENSITY_SIZE * DENSITY_SIZE * 4];
        // Sample at (0,0): pure white, half alpha.
        pixels[0] = 255;
        pixels[1] = 255;
        pixels[2] = 255;
        pixels[3] = 128;
        let map = DensityMap {
            pixels,
            kind: DensityKind::Image,
            view_scale: 1.0,
        };
        let d = map.density_at(0.0, 0.0);
        assert!((d - 128.0 / 255.0).abs() < 1e-2);
    }

    #[test]
    fn missing_density_map_mode_draws_nothing() {
        // An all-black text map yields zero influence everywhere in bounds.
        let map = DensityMap {
            pixels: vec![0; DENSITY_SIZE * DENSITY_SIZE * 4],
            kind: DensityKind::Text,
            view_scale: 1.0,
        };
        let eval = FieldEvaluator::new(FieldSource::Density(&map), params(1.1, 0.7));
        for x in [-500.0, 0.0, 300.0, 900.0] {
            assert_eq!(eval.influence(x, 300.0), 0.0);
        }
    }
}
