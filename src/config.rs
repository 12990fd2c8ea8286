//! Configuration for Halftone Flux.
//!
//! The whole tree is serde-serializable and saved/loaded as JSON. The render
//! core treats a `SimulationConfig` as an immutable per-frame snapshot; only
//! the UI writes to it.

use serde::{Deserialize, Serialize};

// ============================================================================
// Enums
// ============================================================================

/// Base motion mode of the particle set / field source.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub enum MotionMode {
    /// Noise-driven wandering around the virtual center.
    Drift,
    /// Four particles oscillating along a rotating cross.
    Cross,
    /// Drift with radius pulsation.
    Breath,
    /// Field sampled from rasterized text.
    Character,
    /// Microphone-reactive ring.
    Audio,
    /// Audio ring fed by synthesized bins (no device needed).
    SimulatedAudio,
    /// Field sampled from a raster image.
    Image,
    /// One of the mathematical pattern kinds.
    Pattern,
}

/// Mathematical pattern selected when `MotionMode::Pattern` is active.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub enum PatternKind {
    Vortex,
    Phyllotaxis,
    Sphere,
    Torus,
    Atomic,
    Galaxy,
    Rose,
    Spirograph,
    Lissajous,
    Spiral,
    Wave,
    GridWave,
    DnaHelix,
    Heartbeat,
    Mitosis,
    LinearMitosis,
    SuperEllipse,
    FlowField,
    Chladni,
    Flocking,
    Tunnel,
    Lorenz,
}

impl PatternKind {
    pub const ALL: [PatternKind; 22] = [
        Self::Vortex,
        Self::Phyllotaxis,
        Self::Sphere,
        Self::Torus,
        Self::Atomic,
        Self::Galaxy,
        Self::Rose,
        Self::Spirograph,
        Self::Lissajous,
        Self::Spiral,
        Self::Wave,
        Self::GridWave,
        Self::DnaHelix,
        Self::Heartbeat,
        Self::Mitosis,
        Self::LinearMitosis,
        Self::SuperEllipse,
        Self::FlowField,
        Self::Chladni,
        Self::Flocking,
        Self::Tunnel,
        Self::Lorenz,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Vortex => "Vortex",
            Self::Phyllotaxis => "Phyllotaxis",
            Self::Sphere => "Sphere",
            Self::Torus => "Torus",
            Self::Atomic => "Atomic",
            Self::Galaxy => "Galaxy",
            Self::Rose => "Rose Curve",
            Self::Spirograph => "Spirograph",
            Self::Lissajous => "Lissajous",
            Self::Spiral => "Spiral",
            Self::Wave => "Wave",
            Self::GridWave => "Grid Wave",
            Self::DnaHelix => "DNA Helix",
            Self::Heartbeat => "Heartbeat",
            Self::Mitosis => "Mitosis",
            Self::LinearMitosis => "Linear Mitosis",
            Self::SuperEllipse => "Super Ellipse",
            Self::FlowField => "Flow Field",
            Self::Chladni => "Chladni Plate",
            Self::Flocking => "Flocking",
            Self::Tunnel => "Tunnel",
            Self::Lorenz => "Lorenz Attractor",
        }
    }

    /// Force-integrated kinds accumulate velocity directly instead of
    /// returning a spring target.
    pub fn is_force_integrated(&self) -> bool {
        matches!(
            self,
            Self::FlowField | Self::Chladni | Self::Flocking | Self::Tunnel
        )
    }
}

/// Glyph drawn per halftone cell. Closed set plus user bitmaps by index.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug, Hash)]
pub enum DotShape {
    RoundedRect,
    Circle,
    Cross,
    Triangle,
    Hexagon,
    Star,
    Heart,
    Music,
    Gear,
    Question,
    ErrorCross,
    Electric,
    Eye,
    Logo,
    /// Index into the loaded custom icon list.
    Custom(usize),
}

impl DotShape {
    pub const BUILTIN: [DotShape; 14] = [
        Self::RoundedRect,
        Self::Circle,
        Self::Cross,
        Self::Triangle,
        Self::Hexagon,
        Self::Star,
        Self::Heart,
        Self::Music,
        Self::Gear,
        Self::Question,
        Self::ErrorCross,
        Self::Electric,
        Self::Eye,
        Self::Logo,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::RoundedRect => "Rounded Rect",
            Self::Circle => "Circle",
            Self::Cross => "Cross",
            Self::Triangle => "Triangle",
            Self::Hexagon => "Hexagon",
            Self::Star => "Star",
            Self::Heart => "Heart",
            Self::Music => "Music Note",
            Self::Gear => "Gear",
            Self::Question => "Question",
            Self::ErrorCross => "Error Cross",
            Self::Electric => "Lightning",
            Self::Eye => "Eye",
            Self::Logo => "Logo",
            Self::Custom(_) => "Custom Icon",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub enum TintMode {
    Single,
    Gradient,
}

/// Easing curve for the grid-size sync interpolation.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub enum EasingCurve {
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
    Step,
}

impl EasingCurve {
    pub const ALL: [EasingCurve; 5] = [
        Self::Linear,
        Self::EaseIn,
        Self::EaseOut,
        Self::EaseInOut,
        Self::Step,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Linear => "Linear",
            Self::EaseIn => "Ease In",
            Self::EaseOut => "Ease Out",
            Self::EaseInOut => "Ease In-Out",
            Self::Step => "Step",
        }
    }

    pub fn apply(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::EaseIn => t * t,
            Self::EaseOut => 1.0 - (1.0 - t) * (1.0 - t),
            Self::EaseInOut => t * t * (3.0 - 2.0 * t),
            Self::Step => {
                if t < 0.5 {
                    0.0
                } else {
                    1.0
                }
            }
        }
    }
}

// ============================================================================
// Overlay modules
// ============================================================================

/// One stochastic glyph-override module (warning / charging).
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct OverlayModuleConfig {
    pub enabled: bool,
    /// Distribution strength in [0, 1]; higher spreads the overlay inward.
    pub strength: f32,
    pub color: [u8; 3],
}

impl Default for OverlayModuleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            strength: 0.5,
            color: [255, 196, 0],
        }
    }
}

// ============================================================================
// Simulation configuration
// ============================================================================

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct SimulationConfig {
    // Particles
    pub particle_count: usize,
    pub base_radius: f32,
    pub speed: f32,
    pub motion_mode: MotionMode,
    pub motion_range: f32,

    // Pattern
    pub pattern: PatternKind,
    pub pattern_scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,

    // Oscillation (cross mode)
    pub osc_speed: f32,
    pub osc_amplitude: f32,
    pub cross_rotation: f32,

    // Breathing
    pub breath_speed: f32,
    pub breath_range: f32,

    // Smoothing
    pub transition_speed: f32,

    // Color
    pub main_color: [u8; 3],
    pub gradient_color_end: [u8; 3],
    pub tint_mode: TintMode,

    // Field thresholding
    pub threshold: f32,
    pub edge_level: f32,

    // Halftone grid
    pub enable_halftone: bool,
    pub grid_size: f32,
    pub grid_gap: f32,
    pub dot_scale: f32,
    pub pixel_step: f32,

    // Shapes
    pub dot_shape: DotShape,
    pub mixed_enabled: bool,
    pub mixed_shapes: Vec<DotShape>,
    pub custom_icons: Vec<String>,

    // Grid-size sync
    pub grid_sync_enabled: bool,
    pub grid_size_min: f32,
    pub grid_size_max: f32,
    pub grid_easing: EasingCurve,

    // Character mode
    pub character_text: String,
    pub char_font_size: f32,
    pub char_font_path: String,
    pub char_pulse_speed: f32,
    pub char_pulse_intensity: f32,

    // Image mode
    pub image_source: Option<String>,
    pub image_scale: f32,

    // Audio mode
    pub audio_sensitivity: f32,
    pub audio_reactive_radius: bool,
    pub audio_reactive_grid: bool,
    pub audio_grid_sensitivity: f32,

    // Split-pattern ranges
    pub mitosis_range: f32,
    pub super_ellipse_range: f32,

    // Overlay modules
    pub warning_overlay: OverlayModuleConfig,
    pub warning_minor_strength: f32,
    pub charging_overlay: OverlayModuleConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            particle_count: 32,
            base_radius: 42.0,
            speed: 1.2,
            motion_mode: MotionMode::Drift,
            motion_range: 140.0,

            pattern: PatternKind::Vortex,
            pattern_scale: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,

            osc_speed: 1.8,
            osc_amplitude: 160.0,
            cross_rotation: 0.0,

            breath_speed: 2.5,
            breath_range: 0.5,

            transition_speed: 0.08,

            main_color: [255, 255, 255],
            gradient_color_end: [239, 68, 68],
            tint_mode: TintMode::Single,

            threshold: 1.1,
            edge_level: 0.7,

            enable_halftone: true,
            grid_size: 80.0,
            grid_gap: 2.0,
            dot_scale: 1.05,
            pixel_step: 4.0,

            dot_shape: DotShape::RoundedRect,
            mixed_enabled: false,
            mixed_shapes: vec![
                DotShape::Circle,
                DotShape::Heart,
                DotShape::Star,
                DotShape::Music,
            ],
            custom_icons: Vec::new(),

            grid_sync_enabled: false,
            grid_size_min: 24.0,
            grid_size_max: 110.0,
            grid_easing: EasingCurve::EaseInOut,

            character_text: "META".to_string(),
            char_font_size: 180.0,
            char_font_path: String::new(),
            char_pulse_speed: 0.0,
            char_pulse_intensity: 0.25,

            image_source: None,
            image_scale: 1.0,

            audio_sensitivity: 1.8,
            audio_reactive_radius: true,
            audio_reactive_grid: false,
            audio_grid_sensitivity: 1.2,

            mitosis_range: 1.0,
            super_ellipse_range: 1.0,

            warning_overlay: OverlayModuleConfig::default(),
            warning_minor_strength: 0.3,
            charging_overlay: OverlayModuleConfig {
                enabled: false,
                strength: 0.5,
                color: [80, 220, 120],
            },
        }
    }
}

impl SimulationConfig {
    pub fn save(&self, path: &str) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &str) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// True when the field comes from a sampled density map rather than the
    /// particle metaball sum.
    pub fn uses_density_map(&self) -> bool {
        matches!(self.motion_mode, MotionMode::Character | MotionMode::Image)
    }
}
