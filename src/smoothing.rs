//! Frame-to-frame parameter smoothing.
//!
//! A shadow copy of the config values that must not jump when the user drags a
//! slider. Every frame each scalar is pulled toward its live config target by
//! the transition speed; colors are smoothed per channel.

use crate::config::SimulationConfig;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SmoothedColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl SmoothedColor {
    pub fn from_rgb(c: [u8; 3]) -> Self {
        Self {
            r: c[0] as f32,
            g: c[1] as f32,
            b: c[2] as f32,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SmoothedParams {
    pub base_radius: f32,
    pub speed: f32,
    pub pattern_scale: f32,
    pub grid_size: f32,
    pub osc_amplitude: f32,
    pub threshold: f32,
    pub edge_level: f32,
    pub main_color: SmoothedColor,
    pub edge_color: SmoothedColor,
}

fn lerp(current: f32, target: f32, amt: f32) -> f32 {
    current + (target - current) * amt
}

impl SmoothedParams {
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            base_radius: config.base_radius,
            speed: config.speed,
            pattern_scale: config.pattern_scale,
            grid_size: config.grid_size,
            osc_amplitude: config.osc_amplitude,
            threshold: config.threshold,
            edge_level: config.edge_level,
            main_color: SmoothedColor::from_rgb(config.main_color),
            edge_color: SmoothedColor::from_rgb(config.gradient_color_end),
        }
    }

    /// One smoothing step. `alpha` is the transition speed in (0, 1];
    /// 1.0 snaps instantly, values near 0 keep the old value almost frozen.
    pub fn update(&mut self, config: &SimulationConfig) {
        let alpha = config.transition_speed.clamp(1e-4, 1.0);

        self.base_radius = lerp(self.base_radius, config.base_radius, alpha);
        self.speed = lerp(self.speed, config.speed, alpha);
        self.pattern_scale = lerp(self.pattern_scale, config.pattern_scale, alpha);
        self.grid_size = lerp(self.grid_size, config.grid_size, alpha);
        self.osc_amplitude = lerp(self.osc_amplitude, config.osc_amplitude, alpha);
        self.threshold = lerp(self.threshold, config.threshold, alpha);
        self.edge_level = lerp(self.edge_level, config.edge_level, alpha);

        let tm = SmoothedColor::from_rgb(config.main_color);
        self.main_color.r = lerp(self.main_color.r, tm.r, alpha);
        self.main_color.g = lerp(self.main_color.g, tm.g, alpha);
        self.main_color.b = lerp(self.main_color.b, tm.b, alpha);

        let te = SmoothedColor::from_rgb(config.gradient_color_end);
        self.edge_color.r = lerp(self.edge_color.r, te.r, alpha);
        self.edge_color.g = lerp(self.edge_color.g, te.g, alpha);
        self.edge_color.b = lerp(self.edge_color.b, te.b, alpha);
    }
}
