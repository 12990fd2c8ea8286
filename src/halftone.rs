//! Halftone grid rasterization and per-cell shape morphing.
//!
//! The rasterizer steps cell centers over the viewport, samples the influence
//! field (in parallel — this is the frame's hot loop), and draws one glyph per
//! lit cell. Each cell owns a `(shape, progress)` morph state stored in a
//! bounded toroidal arena: slots are addressed by cell coordinate modulo the
//! arena dimensions, and a slot whose stored key no longer matches is simply
//! recycled, so cells scrolling out of view evict themselves.

use egui::{Color32, Painter, Pos2, Rect, Rounding, Vec2};
use rayon::prelude::*;

use crate::config::{DotShape, MotionMode, SimulationConfig, TintMode};
use crate::field::FieldEvaluator;
use crate::overlay::{cell_hash, OverlayInjector};
use crate::shapes::{draw_glyph, IconLibrary};
use crate::smoothing::{SmoothedColor, SmoothedParams};

/// Cells dimmer than this draw nothing.
pub const VISIBILITY_CUTOFF: f32 = 0.05;

/// Progress assigned right after a glyph switch so the new shape starts its
/// fade-in visible.
const PROGRESS_EPSILON: f32 = 0.01;

// ============================================================================
// Morph state machine
// ============================================================================

#[derive(Clone, Copy, Debug)]
struct CellState {
    key: (i32, i32),
    shape: DotShape,
    progress: f32,
}

/// Bounded per-cell morph store. Capacity tracks the number of cells that can
/// be on screen, not the number ever visited.
pub struct MorphGrid {
    cols: usize,
    rows: usize,
    cells: Vec<Option<CellState>>,
}

impl MorphGrid {
    pub fn new() -> Self {
        Self {
            cols: 0,
            rows: 0,
            cells: Vec::new(),
        }
    }

    /// Size the arena for the current viewport/grid-size. Surviving cells are
    /// re-homed into their new slots; grid-size modulation (sync easing,
    /// audio reactivity, a smoothed size mid-transition) changes the
    /// dimensions every frame and must not reset crossfades in flight.
    pub fn ensure_capacity(&mut self, cols: usize, rows: usize) {
        let cols = cols.max(1);
        let rows = rows.max(1);
        if cols == self.cols && rows == self.rows {
            return;
        }
        let old = std::mem::take(&mut self.cells);
        self.cols = cols;
        self.rows = rows;
        self.cells = vec![None; cols * rows];
        for state in old.into_iter().flatten() {
            let idx = self.slot_index(state.key.0, state.key.1);
            self.cells[idx] = Some(state);
        }
    }

    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    fn slot_index(&self, i: i32, j: i32) -> usize {
        let col = i.rem_euclid(self.cols as i32) as usize;
        let row = j.rem_euclid(self.rows as i32) as usize;
        row * self.cols + col
    }

    /// Advance the morph state of cell (i, j) toward `target` and return the
    /// shape to draw with its progress. Progress shrinks while the target
    /// differs from the current glyph; the glyph identity swaps only once
    /// progress reaches zero, then grows back toward one.
    pub fn advance(&mut self, i: i32, j: i32, target: DotShape, rate: f32) -> (DotShape, f32) {
        let idx = self.slot_index(i, j);
        let rate = rate.clamp(0.0, 1.0);

        let state = match &mut self.cells[idx] {
            Some(state) if state.key == (i, j) => state,
            slot => slot.insert(CellState {
                // Fresh cell, or the slot's previous tenant scrolled away.
                key: (i, j),
                shape: target,
                progress: PROGRESS_EPSILON,
            }),
        };

        if state.shape != target {
            state.progress = (state.progress - rate).max(0.0);
            if state.progress <= 0.0 {
                state.shape = target;
                state.progress = PROGRESS_EPSILON;
            }
        } else {
            state.progress = (state.progress + rate).min(1.0);
        }
        (state.shape, state.progress)
    }
}

impl Default for MorphGrid {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Cell sampling (pure, parallel)
// ============================================================================

#[derive(Clone, Copy, Debug)]
pub struct CellSample {
    pub i: i32,
    pub j: i32,
    /// Cell center in local (viewport) coordinates.
    pub pos: Vec2,
    pub influence: f32,
}

/// Effective grid size after smoothing plus the optional sync/audio modulation.
pub fn effective_grid_size(
    config: &SimulationConfig,
    smoothed: &SmoothedParams,
    time: f32,
    bass: f32,
) -> f32 {
    let mut g = smoothed.grid_size;
    if config.grid_sync_enabled {
        let drive = (time * 0.8).sin() * 0.5 + 0.5;
        let eased = config.grid_easing.apply(drive);
        let min = config.grid_size_min.min(config.grid_size_max);
        let max = config.grid_size_min.max(config.grid_size_max);
        g = min + (max - min) * eased;
    }
    if config.audio_reactive_grid {
        g *= 1.0 - (bass * config.audio_grid_sensitivity * 0.4).min(0.6);
    }
    g.max(4.0)
}

/// Step the cell lattice over the viewport and evaluate the field at every
/// visible center. Sampling is data-parallel; drawing stays on the caller.
pub fn collect_cells(field: &FieldEvaluator, viewport: Vec2, grid_size: f32) -> Vec<CellSample> {
    let center = viewport / 2.0;
    let half_cols = (center.x / grid_size).ceil() as i32;
    let half_rows = (center.y / grid_size).ceil() as i32;

    let rows: Vec<i32> = (-half_rows..=half_rows).collect();
    rows.par_iter()
        .flat_map_iter(|&j| {
            let y = center.y + j as f32 * grid_size;
            (-half_cols..=half_cols).filter_map(move |i| {
                let x = center.x + i as f32 * grid_size;
                if x < -grid_size
                    || x > viewport.x + grid_size
                    || y < -grid_size
                    || y > viewport.y + grid_size
                {
                    return None;
                }
                let influence = field.influence(x, y);
                (influence > VISIBILITY_CUTOFF).then_some(CellSample {
                    i,
                    j,
                    pos: Vec2::new(x, y),
                    influence,
                })
            })
        })
        .collect()
}

/// Raw-mask fallback: visit every pixel at a fixed stride and report the ones
/// above the visibility cutoff. No glyph logic is involved.
pub fn collect_raw_mask(field: &FieldEvaluator, viewport: Vec2, step: f32) -> Vec<CellSample> {
    let step = step.max(1.0);
    let rows = (viewport.y / step).ceil() as i32;
    let cols = (viewport.x / step).ceil() as i32;

    (0..rows)
        .into_par_iter()
        .flat_map_iter(|j| {
            let y = j as f32 * step;
            (0..cols).filter_map(move |i| {
                let x = i as f32 * step;
                let influence = field.influence(x, y);
                (influence > VISIBILITY_CUTOFF).then_some(CellSample {
                    i,
                    j,
                    pos: Vec2::new(x, y),
                    influence,
                })
            })
        })
        .collect()
}

// ============================================================================
// Color resolution
// ============================================================================

fn lerp_channel(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Flat or gradient base color at a normalized center distance, with the
/// white-point-preserving brightness boost.
pub fn cell_color(
    config: &SimulationConfig,
    smoothed: &SmoothedParams,
    dist_norm: f32,
    influence: f32,
) -> Color32 {
    let base = match config.tint_mode {
        TintMode::Single => smoothed.main_color,
        TintMode::Gradient => SmoothedColor {
            r: lerp_channel(smoothed.main_color.r, smoothed.edge_color.r, dist_norm),
            g: lerp_channel(smoothed.main_color.g, smoothed.edge_color.g, dist_norm),
            b: lerp_channel(smoothed.main_color.b, smoothed.edge_color.b, dist_norm),
        },
    };

    // Boosting white would only re-tint it, so skip.
    let is_white = config.main_color == [255, 255, 255];
    let boost = if is_white { 0.0 } else { 0.4 };
    let r = (base.r + (255.0 - base.r) * influence * boost).min(255.0);
    let g = (base.g + (255.0 - base.g) * influence * boost).min(255.0);
    let b = (base.b + (255.0 - base.b) * influence * boost).min(255.0);
    Color32::from_rgb(r as u8, g as u8, b as u8)
}

/// Deterministic mixed-mode shape choice keyed by cell coordinates.
pub fn mixed_shape(shapes: &[DotShape], i: i32, j: i32) -> DotShape {
    if shapes.is_empty() {
        return DotShape::RoundedRect;
    }
    let idx = (cell_hash(i, j) * shapes.len() as f32) as usize;
    shapes[idx.min(shapes.len() - 1)]
}

// ============================================================================
// Rasterizer
// ============================================================================

pub struct HalftoneRasterizer {
    pub morph: MorphGrid,
}

impl HalftoneRasterizer {
    pub fn new() -> Self {
        Self {
            morph: MorphGrid::new(),
        }
    }

    /// Draw one frame onto `rect`. `field` must already be built for this
    /// frame; `bass` is the normalized low-band energy (0 when no audio).
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        painter: &Painter,
        rect: Rect,
        config: &SimulationConfig,
        smoothed: &SmoothedParams,
        field: &FieldEvaluator,
        injector: &OverlayInjector,
        icons: &IconLibrary,
        bass: f32,
        time: f32,
    ) {
        let viewport = rect.size();
        let background = Color32::BLACK;
        painter.rect_filled(rect, Rounding::ZERO, background);

        if !config.enable_halftone {
            let step = config.pixel_step.max(1.0);
            let half_w = viewport.x / 2.0;
            for sample in collect_raw_mask(field, viewport, step) {
                let dist = (sample.pos - viewport / 2.0).length() / half_w.max(1.0);
                // The mask fills with the plain flat/gradient color; the
                // brightness boost is a halftone-cell effect.
                let color = cell_color(config, smoothed, dist.min(1.0), 0.0);
                let min = rect.min + sample.pos;
                painter.rect_filled(
                    Rect::from_min_size(Pos2::new(min.x, min.y), Vec2::splat(step)),
                    Rounding::ZERO,
                    color,
                );
            }
            return;
        }

        let grid = effective_grid_size(config, smoothed, time, bass);
        let cols = (viewport.x / grid).ceil() as usize + 2;
        let rows = (viewport.y / grid).ceil() as usize + 2;
        self.morph.ensure_capacity(cols, rows);

        let audio_boost = match config.motion_mode {
            MotionMode::Audio | MotionMode::SimulatedAudio => 1.0 + bass * 0.2,
            _ => 1.0,
        };
        let half_w = viewport.x / 2.0;
        let rate = config.transition_speed.clamp(0.0, 1.0);

        for sample in collect_cells(field, viewport, grid) {
            let dist_norm = ((sample.pos - viewport / 2.0).length() / half_w.max(1.0)).min(1.0);

            let mut target = if config.mixed_enabled {
                mixed_shape(&config.mixed_shapes, sample.i, sample.j)
            } else {
                config.dot_shape
            };
            let mut override_color = None;
            if let Some(hit) = injector.inject(sample.i, sample.j, dist_norm) {
                target = hit.shape;
                override_color = Some(Color32::from_rgb(hit.color[0], hit.color[1], hit.color[2]));
            }

            let (shape, progress) = self.morph.advance(sample.i, sample.j, target, rate);

            let size = ((grid - config.grid_gap)
                * sample.influence.powf(0.6)
                * config.dot_scale
                * progress
                * audio_boost)
                .max(0.0);
            if size <= 0.0 {
                continue;
            }

            let color = override_color
                .unwrap_or_else(|| cell_color(config, smoothed, dist_norm, sample.influence));
            let center = rect.min + sample.pos;
            draw_glyph(
                painter,
                shape,
                Pos2::new(center.x, center.y),
                size,
                color,
                background,
                icons,
            );
        }
    }
}

impl Default for HalftoneRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EasingCurve, SimulationConfig};
    use crate::field::{FieldEvaluator, FieldParams, FieldSource};
    use crate::particles::Particle;
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

    fn field_params() -> FieldParams {
        FieldParams {
            threshold: 1.1,
            edge: 0.7,
            center: Vec2::new(320.0, 240.0),
            pattern_scale: 1.0,
            pulse: 1.0,
        }
    }

    #[test]
    fn morph_progress_always_clamped() {
        let mut morph = MorphGrid::new();
        morph.ensure_capacity(8, 8);
        for frame in 0..100 {
            let target = if frame % 2 == 0 {
                DotShape::Circle
            } else {
                DotShape::Star
            };
            let (_, progress) = morph.advance(1, 1, target, 0.7);
            assert!((0.0..=1.0).contains(&progress), "progress {progress}");
        }
    }

    #[test]
    fn glyph_swaps_only_at_zero_progress() {
        let mut morph = MorphGrid::new();
        morph.ensure_capacity(8, 8);
        // Settle on a circle.
        for _ in 0..20 {
            morph.advance(0, 0, DotShape::Circle, 0.3);
        }
        // Retarget to star: shape must stay Circle until progress bottoms out.
        let (shape, progress) = morph.advance(0, 0, DotShape::Star, 0.3);
        assert_eq!(shape, DotShape::Circle);
        assert!(progress > 0.0);
        let mut swapped_at = None;
        for step in 0..10 {
            let (shape, progress) = morph.advance(0, 0, DotShape::Star, 0.3);
            if shape == DotShape::Star {
                swapped_at = Some((step, progress));
                break;
            }
        }
        let (_, progress_after) = swapped_at.expect("glyph never swapped");
        assert!(progress_after <= 0.05, "swap should restart near zero");
    }

    #[test]
    fn resizing_the_arena_keeps_crossfades_in_flight() {
        // Grid-size sync / audio modulation flips the arena dimensions every
        // frame; a cell's progress must still ramp to 1.0.
        let mut morph = MorphGrid::new();
        let mut max_progress = 0.0f32;
        for frame in 0..300 {
            if frame % 2 == 0 {
                morph.ensure_capacity(18, 12);
            } else {
                morph.ensure_capacity(19, 12);
            }
            let (_, progress) = morph.advance(3, 4, DotShape::Circle, 0.08);
            max_progress = max_progress.max(progress);
        }
        assert!(
            (max_progress - 1.0).abs() < 1e-6,
            "progress capped at {max_progress} under alternating dimensions"
        );
    }

    #[test]
    fn raw_mask_fill_color_has_no_brightness_boost() {
        let mut config = SimulationConfig::default();
        config.main_color = [100, 50, 200];
        let smoothed = crate::smoothing::SmoothedParams::from_config(&config);
        // Zero influence is what the raw-mask path passes: the fill must be
        // the plain configured color.
        let c = cell_color(&config, &smoothed, 0.0, 0.0);
        assert_eq!(c, Color32::from_rgb(100, 50, 200));
    }

    #[test]
    fn arena_is_bounded_and_recycles_slots() {
        let mut morph = MorphGrid::new();
        morph.ensure_capacity(4, 4);
        assert_eq!(morph.capacity(), 16);
        // Visit far more distinct coordinates than the arena holds.
        for k in 0..1000 {
            morph.advance(k, -k, DotShape::Circle, 0.2);
        }
        assert_eq!(morph.capacity(), 16);
        // A recycled slot restarts from the fade-in epsilon.
        let (_, progress) = morph.advance(5000, 0, DotShape::Star, 0.0);
        assert!(progress <= 0.05);
    }

    #[test]
    fn mixed_shape_choice_is_stable_per_cell() {
        let shapes = [DotShape::Circle, DotShape::Heart, DotShape::Star, DotShape::Music];
        for i in -30..30 {
            for j in -30..30 {
                let first = mixed_shape(&shapes, i, j);
                for _ in 0..5 {
                    assert_eq!(mixed_shape(&shapes, i, j), first);
                }
                assert!(shapes.contains(&first));
            }
        }
        assert_eq!(mixed_shape(&[], 3, 4), DotShape::RoundedRect);
    }

    #[test]
    fn raw_mask_visits_exactly_the_lit_pixels() {
        let particles = [particle(320.0, 240.0, 42.0)];
        let eval = FieldEvaluator::new(FieldSource::Metaballs(&particles), field_params());
        let viewport = Vec2::new(640.0, 480.0);
        let step = 4.0;
        let samples = collect_raw_mask(&eval, viewport, step);
        assert!(!samples.is_empty());
        for s in &samples {
            assert!(s.influence > VISIBILITY_CUTOFF);
            // Positions lie on the stride lattice.
            assert_eq!(s.pos.x % step, 0.0);
            assert_eq!(s.pos.y % step, 0.0);
        }
        // Cross-check a lit and an unlit probe against the mask.
        let lit = samples.iter().any(|s| (s.pos - Vec2::new(320.0, 240.0)).length() < 8.0);
        assert!(lit, "pixel at the particle center must be filled");
        let far_lit = samples.iter().any(|s| s.pos.x < 40.0 && s.pos.y < 40.0);
        assert!(!far_lit, "far corner should be below the cutoff");
    }

    #[test]
    fn halftone_cells_skip_dim_regions() {
        let particles = [particle(320.0, 240.0, 42.0)];
        let eval = FieldEvaluator::new(FieldSource::Metaballs(&particles), field_params());
        let samples = collect_cells(&eval, Vec2::new(640.0, 480.0), 20.0);
        assert!(!samples.is_empty());
        for s in &samples {
            assert!(s.influence > VISIBILITY_CUTOFF);
            assert!((0.0..=1.0).contains(&s.influence));
        }
    }

    #[test]
    fn grid_sync_respects_min_max_and_easing() {
        let mut config = SimulationConfig::default();
        config.grid_sync_enabled = true;
        config.grid_size_min = 20.0;
        config.grid_size_max = 100.0;
        config.grid_easing = EasingCurve::Step;
        let smoothed = crate::smoothing::SmoothedParams::from_config(&config);
        for step in 0..200 {
            let g = effective_grid_size(&config, &smoothed, step as f32 * 0.1, 0.0);
            assert!(g == 20.0 || g == 100.0, "step easing must snap, got {g}");
        }
        config.grid_easing = EasingCurve::Linear;
        for step in 0..200 {
            let g = effective_grid_size(&config, &smoothed, step as f32 * 0.1, 0.0);
            assert!((20.0..=100.0).contains(&g));
        }
    }

    #[test]
    fn white_main_color_skips_brightness_boost() {
        let mut config = SimulationConfig::default();
        config.main_color = [255, 255, 255];
        let smoothed = crate::smoothing::SmoothedParams::from_config(&config);
        let c = cell_color(&config, &smoothed, 0.0, 1.0);
        assert_eq!(c, Color32::from_rgb(255, 255, 255));

        config.main_color = [100, 50, 200];
        let smoothed = crate::smoothing::SmoothedParams::from_config(&config);
        let c = cell_color(&config, &smoothed, 0.0, 1.0);
        // Boost pushes every channel toward white without crossing it.
        assert!(c.r() > 100 && c.g() > 50 && c.b() > 200);
    }
}
