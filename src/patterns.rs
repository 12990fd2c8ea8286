//! Pattern library: one entry per mathematical motion model.
//!
//! Target-based kinds are pure functions from (particle id, count, time) to a
//! spring target plus a pseudo-3D depth scale. Force-integrated kinds (flow
//! field, Chladni, flocking, tunnel) instead produce an acceleration that the
//! kinematics step accumulates into velocity; the Lorenz attractor keeps its
//! own 3-D state on the particle and is projected like the other 3-D kinds.

use egui::Vec2;
use std::f32::consts::{PI, TAU};

use crate::config::PatternKind;

/// Projection distance for the perspective divide `D / (D - z)`.
pub const PROJECTION_DISTANCE: f32 = 600.0;

/// Golden angle in radians, used by the phyllotaxis / sphere distributions.
const GOLDEN_ANGLE: f32 = 2.399_963;

/// Lorenz system constants (sigma, rho, beta).
pub const LORENZ_SIGMA: f32 = 10.0;
pub const LORENZ_RHO: f32 = 28.0;
pub const LORENZ_BETA: f32 = 8.0 / 3.0;

/// Fixed per-frame timestep for the Lorenz integration.
pub const LORENZ_DT: f32 = 0.008;

#[derive(Clone, Copy, Debug)]
pub struct PatternTarget {
    /// World-space target position.
    pub pos: Vec2,
    /// Perspective scale after projection; 1.0 for flat kinds.
    pub depth_scale: f32,
    /// Spring strength toward the target (pattern-specific tightness).
    pub spring: f32,
}

impl PatternTarget {
    fn flat(pos: Vec2, spring: f32) -> Self {
        Self {
            pos,
            depth_scale: 1.0,
            spring,
        }
    }
}

/// Per-frame inputs shared by every pattern function.
#[derive(Clone, Copy, Debug)]
pub struct PatternContext {
    pub time: f32,
    /// Virtual center (viewport center plus configured offset).
    pub center: Vec2,
    pub viewport: Vec2,
    /// Smoothed pattern scale.
    pub scale: f32,
    pub mitosis_range: f32,
    pub super_ellipse_range: f32,
}

impl PatternContext {
    /// Base radius most patterns scale from.
    fn base_radius(&self) -> f32 {
        self.viewport.x.min(self.viewport.y) * 0.32 * self.scale
    }
}

/// Rotate a 3-D point around the X axis then the Y axis, then apply the
/// perspective divide. Returns the projected 2-D offset and the depth scale.
pub fn project_3d(p: [f32; 3], rot_x: f32, rot_y: f32) -> (Vec2, f32) {
    let (sx, cx) = rot_x.sin_cos();
    let y1 = p[1] * cx - p[2] * sx;
    let z1 = p[1] * sx + p[2] * cx;

    let (sy, cy) = rot_y.sin_cos();
    let x2 = p[0] * cy + z1 * sy;
    let z2 = -p[0] * sy + z1 * cy;

    // Guard the divide so points approaching the camera plane stay finite.
    let denom = (PROJECTION_DISTANCE - z2).max(60.0);
    let scale = PROJECTION_DISTANCE / denom;
    (Vec2::new(x2 * scale, y1 * scale), scale)
}

/// Compute the spring target for a target-based pattern kind.
/// Returns `None` for force-integrated kinds.
pub fn target(kind: PatternKind, id: usize, count: usize, ctx: &PatternContext) -> Option<PatternTarget> {
    if kind.is_force_integrated() || kind == PatternKind::Lorenz {
        return None;
    }

    let n = count.max(1) as f32;
    let fid = id as f32;
    let frac = fid / n;
    let t = ctx.time;
    let r = ctx.base_radius();
    let c = ctx.center;

    let target = match kind {
        PatternKind::Vortex => {
            let angle = frac * TAU + t * 1.5;
            let radius = r * (0.45 + 0.3 * (t * 0.8 + frac * TAU * 3.0).sin());
            PatternTarget::flat(c + Vec2::angled(angle) * radius, 0.08)
        }
        PatternKind::Phyllotaxis => {
            let angle = fid * GOLDEN_ANGLE + t * 0.3;
            let radius = r * 1.15 * frac.sqrt();
            PatternTarget::flat(c + Vec2::angled(angle) * radius, 0.1)
        }
        PatternKind::Sphere => {
            // Fibonacci sphere distribution, slowly tumbling.
            let y = 1.0 - 2.0 * (fid + 0.5) / n;
            let ring = (1.0 - y * y).max(0.0).sqrt();
            let theta = fid * GOLDEN_ANGLE;
            let p3 = [r * ring * theta.cos(), r * y, r * ring * theta.sin()];
            let (off, depth) = project_3d(p3, t * 0.45, t * 0.3);
            PatternTarget {
                pos: c + off,
                depth_scale: depth,
                spring: 0.09,
            }
        }
        PatternKind::Torus => {
            let major = r * 0.75;
            let minor = r * 0.32;
            let u = frac * TAU * 3.0 + t * 0.4;
            let v = fid * GOLDEN_ANGLE + t * 0.9;
            let p3 = [
                (major + minor * v.cos()) * u.cos(),
                minor * v.sin(),
                (major + minor * v.cos()) * u.sin(),
            ];
            let (off, depth) = project_3d(p3, 0.9 + t * 0.2, t * 0.35);
            PatternTarget {
                pos: c + off,
                depth_scale: depth,
                spring: 0.09,
            }
        }
        PatternKind::Atomic => {
            // Three tilted electron orbits.
            let shell = id % 3;
            let angle = frac * TAU * 3.0 + t * (1.4 + shell as f32 * 0.35);
            let p3 = [r * 0.85 * angle.cos(), r * 0.85 * angle.sin(), 0.0];
            let tilt = shell as f32 * (PI / 3.0);
            let (off, depth) = project_3d(p3, tilt + t * 0.15, tilt * 0.5 + t * 0.25);
            PatternTarget {
                pos: c + off,
                depth_scale: depth,
                spring: 0.12,
            }
        }
        PatternKind::Galaxy => {
            let arms = 3;
            let arm = (id % arms) as f32;
            let along = (id / arms) as f32 / (n / arms as f32).max(1.0);
            let angle = arm * TAU / arms as f32 + along * 4.2 + t * 0.4;
            let radius = r * (0.12 + 0.88 * along);
            PatternTarget::flat(c + Vec2::angled(angle) * radius, 0.06)
        }
        PatternKind::Rose => {
            let k = 5.0;
            let theta = frac * TAU + t * 0.35;
            let radius = r * (k * theta).cos();
            PatternTarget::flat(c + Vec2::angled(theta) * radius, 0.08)
        }
        PatternKind::Spirograph => {
            // Hypotrochoid with a slowly sliding phase.
            let big = r * 0.75;
            let small = r * 0.27;
            let pen = r * 0.42;
            let theta = frac * TAU * 5.0 + t * 0.25;
            let ratio = (big - small) / small;
            let pos = Vec2::new(
                (big - small) * theta.cos() + pen * (ratio * theta).cos(),
                (big - small) * theta.sin() - pen * (ratio * theta).sin(),
            );
            PatternTarget::flat(c + pos, 0.07)
        }
        PatternKind::Lissajous => {
            let theta = t * 0.5 + frac * TAU;
            let pos = Vec2::new(
                r * (3.0 * theta + PI / 2.0).sin(),
                r * (2.0 * theta).sin(),
            );
            PatternTarget::flat(c + pos, 0.07)
        }
        PatternKind::Spiral => {
            let theta = frac * TAU * 3.0 + t * 0.6;
            let radius = r * (0.08 + 0.92 * frac);
            PatternTarget::flat(c + Vec2::angled(theta) * radius, 0.08)
        }
        PatternKind::Wave => {
            let x = (frac - 0.5) * ctx.viewport.x * 0.85 * ctx.scale;
            let y = (frac * TAU * 2.0 + t * 2.2).sin() * r * 0.4;
            PatternTarget::flat(c + Vec2::new(x, y), 0.12)
        }
        PatternKind::GridWave => {
            let cols = (n.sqrt().ceil() as usize).max(1);
            let rows = (count + cols - 1) / cols;
            let col = (id % cols) as f32;
            let row = (id / cols) as f32;
            let fx = if cols > 1 { col / (cols - 1) as f32 } else { 0.5 };
            let fy = if rows > 1 { row / (rows - 1).max(1) as f32 } else { 0.5 };
            let x = (fx - 0.5) * ctx.viewport.x * 0.7 * ctx.scale;
            let y = (fy - 0.5) * ctx.viewport.y * 0.7 * ctx.scale;
            let z = ((col + row) * 0.7 + t * 2.0).sin() * r * 0.35;
            let (off, depth) = project_3d([x, y, z], 0.35, 0.0);
            PatternTarget {
                pos: c + off,
                depth_scale: depth,
                spring: 0.14,
            }
        }
        PatternKind::DnaHelix => {
            let strand = (id % 2) as f32;
            let pair = (id / 2) as f32;
            let pairs = (count / 2).max(1) as f32;
            let x = (pair / pairs - 0.5) * ctx.viewport.x * 0.8 * ctx.scale;
            let phase = x * 0.018 + t * 1.8 + strand * PI;
            let y = phase.sin() * r * 0.45;
            let z = phase.cos() * r * 0.45;
            let (off, depth) = project_3d([x, y, z], 0.0, 0.0);
            PatternTarget {
                pos: c + off,
                depth_scale: depth,
                spring: 0.12,
            }
        }
        PatternKind::Heartbeat => {
            // Closed-form heart curve with a sharp systolic pulse.
            let theta = frac * TAU;
            let pulse = 1.0 + (t * 1.6).sin().powi(63) * 0.3;
            let s = r / 16.0 * pulse;
            let x = 16.0 * theta.sin().powi(3) * s;
            let y = -(13.0 * theta.cos()
                - 5.0 * (2.0 * theta).cos()
                - 2.0 * (3.0 * theta).cos()
                - (4.0 * theta).cos())
                * s;
            PatternTarget::flat(c + Vec2::new(x, y), 0.11)
        }
        PatternKind::Mitosis => {
            let osc = (t * 0.9).sin();
            let sep = osc.abs() * r * 0.85;
            let side = if id % 2 == 0 { -1.0 } else { 1.0 };
            let cluster = c + Vec2::new(sep * side, 0.0);
            let local = (id / 2) as f32 / (count / 2).max(1) as f32;
            let angle = local * TAU + t * 0.8;
            let sub = r * 0.42 * (1.0 - 0.25 * osc.abs());
            PatternTarget::flat(cluster + Vec2::angled(angle) * sub, 0.13)
        }
        PatternKind::LinearMitosis => {
            let osc = (t * 0.7).sin();
            let sep = osc.abs() * r * 1.1 * ctx.mitosis_range;
            let side = if id % 2 == 0 { -1.0 } else { 1.0 };
            let cluster = c + Vec2::new(sep * side, 0.0);
            let local = (id / 2) as f32 / (count / 2).max(1) as f32;
            let angle = local * TAU + t;
            let sub = r * 0.3;
            PatternTarget::flat(cluster + Vec2::angled(angle) * sub, 0.13)
        }
        PatternKind::SuperEllipse => {
            // Breathes between a near-circle and a split pair: the exponent
            // and radius both follow the separation oscillation.
            let osc = (t * 0.7).sin();
            let spread = osc.abs();
            let sep = spread * r * 0.8 * ctx.super_ellipse_range;
            let side = if id % 2 == 0 { -1.0 } else { 1.0 };
            let cluster = c + Vec2::new(sep * side, 0.0);
            let local = (id / 2) as f32 / (count / 2).max(1) as f32;
            let theta = local * TAU + t * 0.5;
            let exponent = 2.0 + 3.0 * spread;
            let half = r * 0.5 * (1.0 - 0.3 * spread);
            let pos = Vec2::new(
                super_ellipse_coord(theta.cos(), exponent) * half,
                super_ellipse_coord(theta.sin(), exponent) * half,
            );
            PatternTarget::flat(cluster + pos, 0.12)
        }
        // Handled by the force-integrated path.
        PatternKind::FlowField
        | PatternKind::Chladni
        | PatternKind::Flocking
        | PatternKind::Tunnel
        | PatternKind::Lorenz => unreachable!(),
    };

    Some(target)
}

/// `sign(v) * |v|^(2/m)` — one axis of a super-ellipse boundary point.
fn super_ellipse_coord(v: f32, exponent: f32) -> f32 {
    v.signum() * v.abs().powf(2.0 / exponent.max(0.5))
}

// ============================================================================
// Force-integrated kinds
// ============================================================================

/// Snapshot of one particle used by the flocking neighbor scan.
#[derive(Clone, Copy)]
pub struct FlockBody {
    pub pos: Vec2,
    pub vel: Vec2,
}

/// Curl-style flow field acceleration.
pub fn flow_field_force(pos: Vec2, ctx: &PatternContext) -> Vec2 {
    let s = 0.003;
    let nx = pos.x * s + ctx.time * 0.5;
    let ny = pos.y * s + ctx.time * 0.35;
    Vec2::new(
        (ny * 6.0).sin() + (nx * 3.0).cos() * 0.5,
        (nx * 6.0).cos() + (ny * 3.0).sin() * 0.5,
    ) * 0.16
}

/// Push particles toward the nodal lines of a Chladni plate figure.
pub fn chladni_force(pos: Vec2, ctx: &PatternContext) -> Vec2 {
    let a = 3.0 + (ctx.time * 0.07).sin();
    let b = 2.0 + (ctx.time * 0.05).cos();
    let half = ctx.viewport * 0.5;
    let nx = ((pos.x - ctx.center.x) / half.x.max(1.0)).clamp(-1.0, 1.0);
    let ny = ((pos.y - ctx.center.y) / half.y.max(1.0)).clamp(-1.0, 1.0);

    let field = |x: f32, y: f32| {
        (a * PI * x).sin() * (b * PI * y).sin() + (b * PI * x).sin() * (a * PI * y).sin()
    };

    // Descend |F| numerically; particles settle where the plate is still.
    let eps = 0.01;
    let f = field(nx, ny);
    let gx = (field(nx + eps, ny) - field(nx - eps, ny)) / (2.0 * eps);
    let gy = (field(nx, ny + eps) - field(nx, ny - eps)) / (2.0 * eps);
    Vec2::new(-f * gx, -f * gy) * 2.4
}

/// Classic boids: separation, alignment, cohesion over a snapshot of the
/// previous frame, plus a soft boundary push. O(n^2) by design at these
/// particle counts.
pub fn flocking_force(id: usize, body: FlockBody, snapshot: &[FlockBody], ctx: &PatternContext) -> Vec2 {
    let perception = 90.0 * ctx.scale.max(0.2);
    let separation_radius = 32.0 * ctx.scale.max(0.2);

    let mut separation = Vec2::ZERO;
    let mut alignment = Vec2::ZERO;
    let mut cohesion = Vec2::ZERO;
    let mut neighbors = 0.0;

    for (j, other) in snapshot.iter().enumerate() {
        if j == id {
            continue;
        }
        let offset = body.pos - other.pos;
        let dist_sq = offset.length_sq();
        if dist_sq > perception * perception || dist_sq < 1e-6 {
            continue;
        }
        let dist = dist_sq.sqrt();
        neighbors += 1.0;
        alignment += other.vel;
        cohesion += other.pos;
        if dist < separation_radius {
            separation += offset / dist * (1.0 - dist / separation_radius);
        }
    }

    let mut force = Vec2::ZERO;
    if neighbors > 0.0 {
        force += separation * 0.55;
        force += (alignment / neighbors - body.vel) * 0.045;
        force += (cohesion / neighbors - body.pos) * 0.0035;
    }

    // Soft repulsion from the viewport edges.
    let margin = 80.0;
    if body.pos.x < margin {
        force.x += (margin - body.pos.x) * 0.004;
    }
    if body.pos.x > ctx.viewport.x - margin {
        force.x -= (body.pos.x - (ctx.viewport.x - margin)) * 0.004;
    }
    if body.pos.y < margin {
        force.y += (margin - body.pos.y) * 0.004;
    }
    if body.pos.y > ctx.viewport.y - margin {
        force.y -= (body.pos.y - (ctx.viewport.y - margin)) * 0.004;
    }

    force
}

/// Advance a Lorenz state by one fixed step.
pub fn lorenz_step(state: &mut [f32; 3]) {
    let [x, y, z] = *state;
    state[0] = x + LORENZ_SIGMA * (y - x) * LORENZ_DT;
    state[1] = y + (x * (LORENZ_RHO - z) - y) * LORENZ_DT;
    state[2] = z + (x * y - LORENZ_BETA * z) * LORENZ_DT;
}

/// Project a Lorenz state into screen space around the virtual center.
pub fn lorenz_target(state: [f32; 3], ctx: &PatternContext) -> PatternTarget {
    let world = ctx.base_radius() / 28.0;
    let p3 = [
        state[0] * world * 8.0,
        state[1] * world * 8.0,
        (state[2] - LORENZ_RHO) * world * 8.0,
    ];
    let (off, depth) = project_3d(p3, ctx.time * 0.12, ctx.time * 0.2);
    PatternTarget {
        pos: ctx.center + off,
        depth_scale: depth,
        spring: 0.2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> PatternContext {
        PatternContext {
            time: 1.7,
            center: Vec2::new(640.0, 360.0),
            viewport: Vec2::new(1280.0, 720.0),
            scale: 1.0,
            mitosis_range: 1.0,
            super_ellipse_range: 1.0,
        }
    }

    #[test]
    fn all_target_kinds_stay_finite() {
        let context = ctx();
        for kind in PatternKind::ALL {
            if kind.is_force_integrated() || kind == PatternKind::Lorenz {
                continue;
            }
            for step in 0..40 {
                let c = PatternContext {
                    time: step as f32 * 0.37,
                    ..context
                };
                for id in 0..24 {
                    let t = target(kind, id, 24, &c).unwrap();
                    assert!(t.pos.x.is_finite() && t.pos.y.is_finite(), "{kind:?} diverged");
                    assert!(t.depth_scale.is_finite() && t.depth_scale > 0.0);
                    assert!(t.spring > 0.0 && t.spring <= 1.0);
                }
            }
        }
    }

    #[test]
    fn force_kinds_return_no_target() {
        let context = ctx();
        for kind in [
            PatternKind::FlowField,
            PatternKind::Chladni,
            PatternKind::Flocking,
            PatternKind::Tunnel,
            PatternKind::Lorenz,
        ] {
            assert!(target(kind, 0, 16, &context).is_none());
        }
    }

    #[test]
    fn projection_guards_near_camera_plane() {
        // A z equal to the projection distance would divide by zero unguarded.
        let (pos, scale) = project_3d([10.0, 10.0, PROJECTION_DISTANCE], 0.0, 0.0);
        assert!(pos.x.is_finite() && pos.y.is_finite());
        assert!(scale.is_finite() && scale > 0.0);
    }

    #[test]
    fn lorenz_stays_on_attractor() {
        let mut state = [1.0, 1.0, 1.0];
        for _ in 0..20_000 {
            lorenz_step(&mut state);
        }
        assert!(state.iter().all(|v| v.is_finite()));
        // Bounded region of the classic attractor.
        assert!(state[0].abs() < 60.0 && state[1].abs() < 80.0);
        assert!(state[2] > -5.0 && state[2] < 80.0);
    }

    #[test]
    fn heartbeat_pulse_is_sharp() {
        // sin^63 is ~0 away from the crest and ~1 at it.
        let crest = (std::f32::consts::FRAC_PI_2).sin().powi(63);
        let off_crest = (0.7f32).sin().powi(63);
        assert!(crest > 0.99);
        assert!(off_crest < 0.01);
    }

    #[test]
    fn super_ellipse_boundary_is_bounded() {
        for i in 0..100 {
            let theta = i as f32 * 0.1;
            for m in [2.0_f32, 3.5, 5.0] {
                let x = super_ellipse_coord(theta.cos(), m);
                let y = super_ellipse_coord(theta.sin(), m);
                assert!(x.abs() <= 1.0001 && y.abs() <= 1.0001);
            }
        }
    }

    #[test]
    fn mitosis_clusters_split_by_parity() {
        let mut c = ctx();
        c.time = PI / (2.0 * 0.9); // separation oscillation at its peak
        let even = target(PatternKind::Mitosis, 0, 32, &c).unwrap();
        let odd = target(PatternKind::Mitosis, 1, 32, &c).unwrap();
        assert!(even.pos.x < c.center.x);
        assert!(odd.pos.x > c.center.x);
    }

    #[test]
    fn chladni_force_vanishes_at_rest_points() {
        let context = ctx();
        // At the plate center the normalized coords are (0,0): every sine term
        // is zero, so both the field and its gradient terms vanish.
        let f = chladni_force(context.center, &context);
        assert!(f.length() < 1e-3);
    }
}
