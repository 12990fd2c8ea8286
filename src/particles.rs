//! Particle set and per-frame kinematics.
//!
//! Every motion mode funnels through the same damped-spring integrator:
//! target-based modes compute a target and spring toward it, force-integrated
//! patterns accumulate acceleration directly, and both share the damping /
//! clamping / NaN-guard tail so no mode can diverge.

use egui::Vec2;
use rand::Rng;
use std::f32::consts::TAU;

use crate::audio::AudioSnapshot;
use crate::config::{MotionMode, PatternKind, SimulationConfig};
use crate::noise::DriftNoise;
use crate::patterns::{self, FlockBody, PatternContext, PatternTarget, PROJECTION_DISTANCE};
use crate::smoothing::SmoothedParams;

/// Hard per-frame velocity cap; keeps every pattern bounded at a fixed step.
const MAX_VELOCITY: f32 = 60.0;

/// Spring / damping used by the non-pattern motion modes.
const BASE_SPRING: f32 = 0.12;
const BASE_DAMPING: f32 = 0.80;

/// Damping applied to force-integrated patterns.
const FORCE_DAMPING: f32 = 0.94;

#[derive(Clone, Debug)]
pub struct Particle {
    pub pos: Vec2,
    pub vel: Vec2,
    /// Persistent noise phases for the drift-style modes.
    pub noise_x: f32,
    pub noise_y: f32,
    /// Current influence radius (smoothed base radius x scale, plus any
    /// per-mode modulation).
    pub radius: f32,
    /// Depth/scale factor. Random at spawn; overwritten by the perspective
    /// projection only in mathematical-pattern mode.
    pub scale: f32,
    pub id: usize,
    /// Auxiliary 3-D state: the Lorenz (x, y, z) triple. The tunnel pattern
    /// reuses the z slot as its depth coordinate.
    pub aux: [f32; 3],
}

pub struct ParticleEngine {
    pub particles: Vec<Particle>,
    pub width: f32,
    pub height: f32,
    pub time: f32,
    noise: DriftNoise,
    /// Pattern the aux state was last initialized for.
    aux_pattern: Option<PatternKind>,
}

impl ParticleEngine {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            particles: Vec::new(),
            width,
            height,
            time: 0.0,
            noise: DriftNoise::new(),
            aux_pattern: None,
        }
    }

    /// Recreate the whole particle set. Called when the count or the viewport
    /// changes; individual particles are never destroyed mid-run.
    pub fn rebuild(&mut self, config: &SimulationConfig) {
        let count = config.particle_count.max(4);
        let mut rng = rand::thread_rng();
        self.particles = (0..count)
            .map(|id| Particle {
                pos: Vec2::new(
                    rng.gen::<f32>() * self.width,
                    rng.gen::<f32>() * self.height,
                ),
                vel: Vec2::ZERO,
                noise_x: rng.gen::<f32>() * 1000.0,
                noise_y: rng.gen::<f32>() * 1000.0,
                radius: config.base_radius,
                scale: 0.8 + rng.gen::<f32>() * 0.4,
                id,
                aux: [
                    1.0 + rng.gen::<f32>() * 8.0,
                    1.0 + rng.gen::<f32>() * 8.0,
                    PROJECTION_DISTANCE * (0.2 + rng.gen::<f32>() * 0.75),
                ],
            })
            .collect();
        self.aux_pattern = None;
    }

    pub fn resize(&mut self, width: f32, height: f32, config: &SimulationConfig) {
        if (self.width - width).abs() > 0.5 || (self.height - height).abs() > 0.5 {
            self.width = width;
            self.height = height;
            self.rebuild(config);
        }
    }

    pub fn virtual_center(&self, config: &SimulationConfig) -> Vec2 {
        Vec2::new(
            self.width / 2.0 + config.offset_x,
            self.height / 2.0 + config.offset_y,
        )
    }

    pub fn pattern_context(&self, config: &SimulationConfig, smoothed: &SmoothedParams) -> PatternContext {
        PatternContext {
            time: self.time,
            center: self.virtual_center(config),
            viewport: Vec2::new(self.width, self.height),
            scale: smoothed.pattern_scale.max(0.05),
            mitosis_range: config.mitosis_range,
            super_ellipse_range: config.super_ellipse_range,
        }
    }

    /// Advance all particles one frame.
    pub fn update(
        &mut self,
        config: &SimulationConfig,
        smoothed: &SmoothedParams,
        audio: &AudioSnapshot,
        dt: f32,
    ) {
        let speed_factor = (dt * 60.0).clamp(0.1, 3.0);
        self.time += 0.01 * smoothed.speed * speed_factor;

        let vc = self.virtual_center(config);
        let ctx = self.pattern_context(config, smoothed);
        let count = self.particles.len().max(1);

        if config.motion_mode == MotionMode::Pattern {
            self.update_pattern(config, smoothed, &ctx, speed_factor);
        } else {
            let t = self.time;
            let noise = &self.noise;
            for p in &mut self.particles {
                let frac = p.id as f32 / count as f32;
                let base = smoothed.base_radius * p.scale;

                let target = match config.motion_mode {
                    MotionMode::Cross => {
                        let osc = (t * config.osc_speed).sin();
                        let amp = smoothed.osc_amplitude * smoothed.pattern_scale;
                        let (lx, ly) = match p.id {
                            0 => (-amp * osc.abs(), 0.0),
                            1 => (amp * osc.abs(), 0.0),
                            2 => (0.0, -amp * osc.abs()),
                            3 => (0.0, amp * osc.abs()),
                            _ => (0.0, 0.0),
                        };
                        let rot = config.cross_rotation.to_radians();
                        let (s, c) = rot.sin_cos();
                        p.radius = base;
                        vc + Vec2::new(lx * c - ly * s, lx * s + ly * c)
                    }
                    MotionMode::Breath => {
                        let osc = (t * config.breath_speed + p.noise_x).sin();
                        p.radius = (base * (1.0 + osc * config.breath_range)).max(0.0);
                        vc + Vec2::new(
                            noise.sample(t * 0.2 + p.noise_x),
                            noise.sample(t * 0.2 + p.noise_y),
                        ) * 100.0
                            * smoothed.pattern_scale
                    }
                    MotionMode::Audio | MotionMode::SimulatedAudio => {
                        let react = audio.bin_at(frac);
                        p.radius = if config.audio_reactive_radius {
                            base * (1.0 + react * config.audio_sensitivity)
                        } else {
                            base
                        };
                        let ring = smoothed.base_radius * 5.0 * smoothed.pattern_scale;
                        vc + Vec2::angled(frac * TAU) * ring
                    }
                    // Drift also covers the density-map modes, whose field
                    // ignores particles entirely.
                    _ => {
                        p.radius = base;
                        let drift = config.motion_range * smoothed.pattern_scale;
                        vc + Vec2::new(
                            noise.sample(t * 0.3 + p.noise_x),
                            noise.sample(t * 0.3 + p.noise_y),
                        ) * drift
                    }
                };

                integrate_spring(p, target, BASE_SPRING, BASE_DAMPING, speed_factor);
                sanitize(p, vc);
            }
        }
    }

    fn update_pattern(
        &mut self,
        config: &SimulationConfig,
        smoothed: &SmoothedParams,
        ctx: &PatternContext,
        speed_factor: f32,
    ) {
        let kind = config.pattern;
        let count = self.particles.len();
        let vc = ctx.center;

        if self.aux_pattern != Some(kind) {
            self.reseed_aux(kind);
            self.aux_pattern = Some(kind);
        }

        match kind {
            PatternKind::FlowField => {
                for p in &mut self.particles {
                    let force = patterns::flow_field_force(p.pos, ctx) * smoothed.speed;
                    integrate_force(p, force, speed_factor);
                    wrap_bounds(p, self.width, self.height);
                    p.radius = smoothed.base_radius * p.scale;
                    sanitize(p, vc);
                }
            }
            PatternKind::Chladni => {
                let mut rng = rand::thread_rng();
                for p in &mut self.particles {
                    let mut force = patterns::chladni_force(p.pos, ctx) * smoothed.speed * 3.0;
                    // Thermal jitter keeps grains from freezing between figures.
                    force += Vec2::new(rng.gen::<f32>() - 0.5, rng.gen::<f32>() - 0.5) * 0.3;
                    integrate_force(p, force, speed_factor);
                    p.radius = smoothed.base_radius * p.scale;
                    sanitize(p, vc);
                }
            }
            PatternKind::Flocking => {
                // Neighbor scan runs over last frame's state so the result is
                // independent of update order.
                let snapshot: Vec<FlockBody> = self
                    .particles
                    .iter()
                    .map(|p| FlockBody { pos: p.pos, vel: p.vel })
                    .collect();
                let mut rng = rand::thread_rng();
                for (i, p) in self.particles.iter_mut().enumerate() {
                    let body = snapshot[i];
                    let mut force = patterns::flocking_force(i, body, &snapshot, ctx) * smoothed.speed;
                    force += Vec2::new(rng.gen::<f32>() - 0.5, rng.gen::<f32>() - 0.5) * 0.12;
                    integrate_force(p, force, speed_factor);
                    wrap_bounds(p, self.width, self.height);
                    p.radius = smoothed.base_radius * p.scale;
                    sanitize(p, vc);
                }
            }
            PatternKind::Tunnel => {
                let base_ring = ctx.viewport.x.min(ctx.viewport.y) * 0.28 * ctx.scale;
                let mut rng = rand::thread_rng();
                for p in &mut self.particles {
                    // Depth marches toward the viewer; respawn at the far end.
                    p.aux[2] -= 2.4 * smoothed.speed * speed_factor;
                    if p.aux[2] < 70.0 {
                        p.aux[2] = PROJECTION_DISTANCE * 0.95;
                        p.noise_x = rng.gen::<f32>() * 1000.0;
                    }
                    let angle = (p.id as f32 / count.max(1) as f32) * TAU + p.noise_x * 0.01;
                    let ring = base_ring * (0.5 + (p.noise_x * 0.37).fract() * 0.5);
                    let depth = PROJECTION_DISTANCE / p.aux[2].max(40.0);
                    let target = vc + Vec2::angled(angle) * ring * depth;
                    p.scale = depth.clamp(0.2, 3.0);
                    p.radius = smoothed.base_radius * p.scale;
                    // Radial pull accumulates as a force, like the other
                    // force-integrated kinds.
                    integrate_force(p, (target - p.pos) * 0.3, speed_factor);
                    sanitize(p, vc);
                }
            }
            PatternKind::Lorenz => {
                for p in &mut self.particles {
                    patterns::lorenz_step(&mut p.aux);
                    let target = patterns::lorenz_target(p.aux, ctx);
                    p.scale = target.depth_scale.clamp(0.2, 3.0);
                    p.radius = smoothed.base_radius * p.scale;
                    integrate_spring(p, target.pos, target.spring, 0.72, speed_factor);
                    sanitize(p, vc);
                }
            }
            _ => {
                for p in &mut self.particles {
                    let PatternTarget { pos, depth_scale, spring } =
                        patterns::target(kind, p.id, count, ctx)
                            .unwrap_or(PatternTarget { pos: vc, depth_scale: 1.0, spring: 0.1 });
                    p.scale = depth_scale.clamp(0.2, 3.0);
                    p.radius = smoothed.base_radius * p.scale;
                    integrate_spring(p, pos, spring, 0.85, speed_factor);
                    sanitize(p, vc);
                }
            }
        }
    }

    /// Reset the auxiliary 3-D state when a pattern that owns it is selected.
    fn reseed_aux(&mut self, kind: PatternKind) {
        let mut rng = rand::thread_rng();
        match kind {
            PatternKind::Lorenz => {
                for p in &mut self.particles {
                    p.aux = [
                        1.0 + rng.gen::<f32>() * 8.0,
                        1.0 + rng.gen::<f32>() * 8.0,
                        20.0 + rng.gen::<f32>() * 10.0,
                    ];
                }
            }
            PatternKind::Tunnel => {
                for p in &mut self.particles {
                    p.aux[2] = PROJECTION_DISTANCE * (0.15 + rng.gen::<f32>() * 0.8);
                }
            }
            _ => {}
        }
    }
}

fn integrate_spring(p: &mut Particle, target: Vec2, spring: f32, damping: f32, speed_factor: f32) {
    p.vel += (target - p.pos) * spring * speed_factor;
    p.vel *= damping.powf(speed_factor);
    clamp_velocity(p);
    p.pos += p.vel * speed_factor;
}

fn integrate_force(p: &mut Particle, force: Vec2, speed_factor: f32) {
    p.vel += force * speed_factor;
    p.vel *= FORCE_DAMPING.powf(speed_factor);
    clamp_velocity(p);
    p.pos += p.vel * speed_factor;
}

fn clamp_velocity(p: &mut Particle) {
    let mag = p.vel.length();
    if mag > MAX_VELOCITY {
        p.vel *= MAX_VELOCITY / mag;
    }
}

fn wrap_bounds(p: &mut Particle, width: f32, height: f32) {
    if p.pos.x < -50.0 {
        p.pos.x = width + 50.0;
    } else if p.pos.x > width + 50.0 {
        p.pos.x = -50.0;
    }
    if p.pos.y < -50.0 {
        p.pos.y = height + 50.0;
    } else if p.pos.y > height + 50.0 {
        p.pos.y = -50.0;
    }
}

/// A dropped frame is acceptable; a NaN position poisoning the field is not.
fn sanitize(p: &mut Particle, fallback: Vec2) {
    if !p.pos.x.is_finite() || !p.pos.y.is_finite() {
        p.pos = fallback;
        p.vel = Vec2::ZERO;
    }
    if !p.vel.x.is_finite() || !p.vel.y.is_finite() {
        p.vel = Vec2::ZERO;
    }
    if !p.radius.is_finite() || p.radius < 0.0 {
        p.radius = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MotionMode, PatternKind, SimulationConfig};
    use crate::smoothing::SmoothedParams;

    fn engine_with(config: &SimulationConfig) -> ParticleEngine {
        let mut engine = ParticleEngine::new(1280.0, 720.0);
        engine.rebuild(config);
        engine
    }

    #[test]
    fn velocity_stays_bounded_for_every_pattern() {
        for kind in PatternKind::ALL {
            let mut config = SimulationConfig::default();
            config.motion_mode = MotionMode::Pattern;
            config.pattern = kind;
            let smoothed = SmoothedParams::from_config(&config);
            let mut engine = engine_with(&config);
            let audio = AudioSnapshot::default();
            for _ in 0..300 {
                engine.update(&config, &smoothed, &audio, 1.0 / 60.0);
            }
            for p in &engine.particles {
                assert!(p.vel.length() <= MAX_VELOCITY + 1e-3, "{kind:?} exceeded cap");
                assert!(p.pos.x.is_finite() && p.pos.y.is_finite(), "{kind:?} diverged");
            }
        }
    }

    #[test]
    fn cross_mode_returns_after_one_oscillation_period() {
        let mut config = SimulationConfig::default();
        config.motion_mode = MotionMode::Cross;
        config.particle_count = 10;
        config.osc_amplitude = 240.0;
        config.speed = 1.0;
        config.osc_speed = std::f32::consts::PI; // period = 2 time units = 200 frames
        config.transition_speed = 1.0;
        let smoothed = SmoothedParams::from_config(&config);
        let audio = AudioSnapshot::default();

        let mut engine = engine_with(&config);
        // Let the spring transient die out over a couple of periods.
        for _ in 0..400 {
            engine.update(&config, &smoothed, &audio, 1.0 / 60.0);
        }
        let before: Vec<Vec2> = engine.particles[..4].iter().map(|p| p.pos).collect();
        for _ in 0..200 {
            engine.update(&config, &smoothed, &audio, 1.0 / 60.0);
        }
        for (p, start) in engine.particles[..4].iter().zip(&before) {
            let err = (p.pos - *start).length();
            assert!(err < 3.0, "particle {} drifted {err} px over one period", p.id);
        }
    }

    #[test]
    fn breathing_modulates_radius_not_just_position() {
        let mut config = SimulationConfig::default();
        config.motion_mode = MotionMode::Breath;
        config.breath_range = 0.5;
        let smoothed = SmoothedParams::from_config(&config);
        let audio = AudioSnapshot::default();
        let mut engine = engine_with(&config);

        let mut min_r = f32::MAX;
        let mut max_r = f32::MIN;
        for _ in 0..600 {
            engine.update(&config, &smoothed, &audio, 1.0 / 60.0);
            let r = engine.particles[0].radius;
            min_r = min_r.min(r);
            max_r = max_r.max(r);
        }
        assert!(max_r > min_r + 1.0, "radius never pulsed ({min_r}..{max_r})");
        assert!(min_r >= 0.0);
    }

    #[test]
    fn pattern_mode_owns_the_depth_scale() {
        let mut config = SimulationConfig::default();
        config.motion_mode = MotionMode::Pattern;
        config.pattern = PatternKind::Sphere;
        let smoothed = SmoothedParams::from_config(&config);
        let audio = AudioSnapshot::default();
        let mut engine = engine_with(&config);
        let spawn_scales: Vec<f32> = engine.particles.iter().map(|p| p.scale).collect();
        for _ in 0..10 {
            engine.update(&config, &smoothed, &audio, 1.0 / 60.0);
        }
        let changed = engine
            .particles
            .iter()
            .zip(&spawn_scales)
            .any(|(p, s)| (p.scale - s).abs() > 1e-4);
        assert!(changed, "sphere projection should overwrite spawn scales");

        // Drift mode leaves the spawn-time scale alone.
        let mut config = SimulationConfig::default();
        config.motion_mode = MotionMode::Drift;
        let smoothed = SmoothedParams::from_config(&config);
        let mut engine = engine_with(&config);
        let spawn_scales: Vec<f32> = engine.particles.iter().map(|p| p.scale).collect();
        for _ in 0..10 {
            engine.update(&config, &smoothed, &audio, 1.0 / 60.0);
        }
        for (p, s) in engine.particles.iter().zip(&spawn_scales) {
            assert_eq!(p.scale, *s);
        }
    }

    #[test]
    fn tunnel_depth_marches_and_respawns() {
        let mut config = SimulationConfig::default();
        config.motion_mode = MotionMode::Pattern;
        config.pattern = PatternKind::Tunnel;
        let smoothed = SmoothedParams::from_config(&config);
        let audio = AudioSnapshot::default();
        let mut engine = engine_with(&config);

        let mut respawns = 0;
        let mut prev_depth = f32::MAX;
        for _ in 0..2000 {
            engine.update(&config, &smoothed, &audio, 1.0 / 60.0);
            let depth = engine.particles[0].aux[2];
            if depth > prev_depth {
                respawns += 1;
            }
            prev_depth = depth;
            for p in &engine.particles {
                // Post-frame depth is either still marching or freshly reset.
                assert!(p.aux[2] >= 70.0 && p.aux[2] <= PROJECTION_DISTANCE * 0.95 + 1e-3);
                assert!(p.vel.length() <= MAX_VELOCITY + 1e-3);
            }
        }
        assert!(respawns > 3, "depth never wrapped to the far end");
    }

    #[test]
    fn flow_field_wraps_at_viewport_boundary() {
        let mut config = SimulationConfig::default();
        config.motion_mode = MotionMode::Pattern;
        config.pattern = PatternKind::FlowField;
        let smoothed = SmoothedParams::from_config(&config);
        let audio = AudioSnapshot::default();
        let mut engine = engine_with(&config);
        for _ in 0..2000 {
            engine.update(&config, &smoothed, &audio, 1.0 / 60.0);
        }
        for p in &engine.particles {
            assert!(p.pos.x >= -51.0 && p.pos.x <= engine.width + 51.0);
            assert!(p.pos.y >= -51.0 && p.pos.y <= engine.height + 51.0);
        }
    }
}
