//! Halftone Flux - generative halftone pattern studio.
//!
//! Particles (or a sampled density map) build a scalar influence field every
//! frame; the halftone rasterizer quantizes that field into a grid of morphing
//! glyphs. This file owns the egui shell: settings panel, canvas, and the
//! per-frame wiring between the modules.

mod audio;
mod config;
mod density;
mod field;
mod halftone;
mod noise;
mod overlay;
mod particles;
mod patterns;
mod shapes;
mod smoothing;

use std::time::Instant;

use eframe::egui;

use audio::{AudioInput, AudioSnapshot};
use config::{
    DotShape, EasingCurve, MotionMode, PatternKind, SimulationConfig, TintMode,
};
use density::DensityWorker;
use field::{FieldEvaluator, FieldParams, FieldSource};
use halftone::HalftoneRasterizer;
use overlay::OverlayInjector;
use particles::ParticleEngine;
use shapes::IconLibrary;
use smoothing::SmoothedParams;

const CONFIG_PATH: &str = "halftone-flux.json";

struct HalftoneFluxApp {
    config: SimulationConfig,
    smoothed: SmoothedParams,
    engine: ParticleEngine,
    rasterizer: HalftoneRasterizer,
    density: DensityWorker,
    /// Opened on the first live-audio frame; `None` while no mode needs the
    /// microphone.
    audio: Option<AudioInput>,
    icons: IconLibrary,
    icon_paths: Vec<String>,

    time: f32,
    last_update: Instant,
    last_dt: f32,
    show_settings: bool,
    settings_tab: SettingsTab,
    status: Option<String>,
}

#[derive(Clone, Copy, PartialEq)]
enum SettingsTab {
    Motion,
    Field,
    Grid,
    Shapes,
    Overlays,
}

impl HalftoneFluxApp {
    fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let mut visuals = egui::Visuals::dark();
        visuals.panel_fill = egui::Color32::from_rgb(18, 18, 22);
        cc.egui_ctx.set_visuals(visuals);

        let config = SimulationConfig::default();
        let smoothed = SmoothedParams::from_config(&config);
        let mut engine = ParticleEngine::new(1280.0, 720.0);
        engine.rebuild(&config);

        Self {
            config,
            smoothed,
            engine,
            rasterizer: HalftoneRasterizer::new(),
            density: DensityWorker::spawn(),
            audio: None,
            icons: IconLibrary::default(),
            icon_paths: Vec::new(),
            time: 0.0,
            last_update: Instant::now(),
            last_dt: 1.0 / 60.0,
            show_settings: true,
            settings_tab: SettingsTab::Motion,
            status: None,
        }
    }

    /// Reload custom icon textures when the configured path list changes.
    fn sync_icons(&mut self, ctx: &egui::Context) {
        if self.icon_paths == self.config.custom_icons {
            return;
        }
        self.icon_paths = self.config.custom_icons.clone();
        self.icons.textures = self
            .icon_paths
            .iter()
            .map(|path| match image::open(path) {
                Ok(img) => {
                    let img = img.to_rgba8();
                    let size = [img.width() as usize, img.height() as usize];
                    let color = egui::ColorImage::from_rgba_unmultiplied(size, img.as_raw());
                    Some(ctx.load_texture(path.clone(), color, egui::TextureOptions::LINEAR))
                }
                Err(err) => {
                    log::warn!("custom icon {path:?} failed to load: {err}");
                    None
                }
            })
            .collect();
    }

    fn frame_audio(&mut self) -> AudioSnapshot {
        if capture_required(self.config.motion_mode) {
            let input = self.audio.get_or_insert_with(AudioInput::open);
            return input.snapshot(self.config.audio_sensitivity);
        }
        match self.config.motion_mode {
            MotionMode::SimulatedAudio => {
                audio::simulated_snapshot(self.time, self.config.audio_sensitivity)
            }
            _ => AudioSnapshot::default(),
        }
    }

    /// Sinusoidal density pulse for character mode; 1.0 everywhere else.
    fn density_pulse(&self) -> f32 {
        if self.config.motion_mode == MotionMode::Character && self.config.char_pulse_speed > 0.0 {
            1.0 + (self.time * self.config.char_pulse_speed).sin() * self.config.char_pulse_intensity
        } else {
            1.0
        }
    }
}

impl eframe::App for HalftoneFluxApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_update).as_secs_f32();
        self.last_update = now;
        self.last_dt = dt;
        self.time += dt;

        self.sync_icons(ctx);
        self.smoothed.update(&self.config);
        self.density.sync(&self.config);

        self.render_top_bar(ctx);
        if self.show_settings {
            self.render_settings_panel(ctx);
        }
        self.render_canvas(ctx, dt);

        ctx.request_repaint();
    }
}

impl HalftoneFluxApp {
    fn render_top_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Halftone Flux");
                ui.separator();

                if ui.button("Save Config").clicked() {
                    self.status = Some(match self.config.save(CONFIG_PATH) {
                        Ok(()) => format!("saved {CONFIG_PATH}"),
                        Err(err) => format!("save failed: {err}"),
                    });
                }
                if ui.button("Load Config").clicked() {
                    match SimulationConfig::load(CONFIG_PATH) {
                        Ok(config) => {
                            self.config = config;
                            self.engine.rebuild(&self.config);
                            self.status = Some(format!("loaded {CONFIG_PATH}"));
                        }
                        Err(err) => self.status = Some(format!("load failed: {err}")),
                    }
                }

                ui.separator();
                ui.toggle_value(&mut self.show_settings, "Settings");

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let fps = 1.0 / self.last_dt.max(0.001);
                    ui.label(format!("FPS: {fps:.0}"));
                    ui.separator();
                    ui.label(format!("{:?}", self.config.motion_mode));
                    if let Some(status) = &self.status {
                        ui.separator();
                        ui.label(status.clone());
                    }
                });
            });
        });
    }

    fn render_settings_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::right("settings_panel")
            .min_width(280.0)
            .show(ctx, |ui| {
                ui.heading("Settings");
                ui.separator();

                ui.horizontal(|ui| {
                    ui.selectable_value(&mut self.settings_tab, SettingsTab::Motion, "Motion");
                    ui.selectable_value(&mut self.settings_tab, SettingsTab::Field, "Field");
                    ui.selectable_value(&mut self.settings_tab, SettingsTab::Grid, "Grid");
                });
                ui.horizontal(|ui| {
                    ui.selectable_value(&mut self.settings_tab, SettingsTab::Shapes, "Shapes");
                    ui.selectable_value(&mut self.settings_tab, SettingsTab::Overlays, "Overlays");
                });
                ui.separator();

                egui::ScrollArea::vertical().show(ui, |ui| match self.settings_tab {
                    SettingsTab::Motion => self.render_motion_settings(ui),
                    SettingsTab::Field => self.render_field_settings(ui),
                    SettingsTab::Grid => self.render_grid_settings(ui),
                    SettingsTab::Shapes => self.render_shapes_settings(ui),
                    SettingsTab::Overlays => self.render_overlay_settings(ui),
                });
            });
    }

    fn render_motion_settings(&mut self, ui: &mut egui::Ui) {
        let c = &mut self.config;

        ui.label("Mode");
        egui::ComboBox::from_id_source("motion_mode")
            .selected_text(format!("{:?}", c.motion_mode))
            .show_ui(ui, |ui| {
                for mode in [
                    MotionMode::Drift,
                    MotionMode::Cross,
                    MotionMode::Breath,
                    MotionMode::Character,
                    MotionMode::Audio,
                    MotionMode::SimulatedAudio,
                    MotionMode::Image,
                    MotionMode::Pattern,
                ] {
                    ui.selectable_value(&mut c.motion_mode, mode, format!("{mode:?}"));
                }
            });

        if c.motion_mode == MotionMode::Pattern {
            ui.label("Pattern");
            egui::ComboBox::from_id_source("pattern_kind")
                .selected_text(c.pattern.label())
                .show_ui(ui, |ui| {
                    for kind in PatternKind::ALL {
                        ui.selectable_value(&mut c.pattern, kind, kind.label());
                    }
                });
        }

        ui.add_space(8.0);
        ui.label("Particle Count");
        let count_before = c.particle_count;
        ui.add(egui::Slider::new(&mut c.particle_count, 4..=200));
        if c.particle_count != count_before {
            self.engine.rebuild(c);
        }

        ui.label("Base Radius");
        ui.add(egui::Slider::new(&mut c.base_radius, 5.0..=150.0));
        ui.label("Speed");
        ui.add(egui::Slider::new(&mut c.speed, 0.0..=5.0));
        ui.label("Motion Range");
        ui.add(egui::Slider::new(&mut c.motion_range, 10.0..=500.0));
        ui.label("Pattern Scale");
        ui.add(egui::Slider::new(&mut c.pattern_scale, 0.1..=3.0));
        ui.label("Transition Speed");
        ui.add(egui::Slider::new(&mut c.transition_speed, 0.01..=1.0));

        ui.add_space(8.0);
        ui.label("Offset X");
        ui.add(egui::Slider::new(&mut c.offset_x, -400.0..=400.0));
        ui.label("Offset Y");
        ui.add(egui::Slider::new(&mut c.offset_y, -400.0..=400.0));

        match c.motion_mode {
            MotionMode::Cross => {
                ui.add_space(8.0);
                ui.label("Oscillation Speed");
                ui.add(egui::Slider::new(&mut c.osc_speed, 0.1..=8.0));
                ui.label("Oscillation Amplitude");
                ui.add(egui::Slider::new(&mut c.osc_amplitude, 20.0..=400.0));
                ui.label("Cross Rotation");
                ui.add(egui::Slider::new(&mut c.cross_rotation, 0.0..=360.0));
            }
            MotionMode::Breath => {
                ui.add_space(8.0);
                ui.label("Breath Speed");
                ui.add(egui::Slider::new(&mut c.breath_speed, 0.1..=8.0));
                ui.label("Breath Range");
                ui.add(egui::Slider::new(&mut c.breath_range, 0.0..=1.0));
            }
            MotionMode::Character => {
                ui.add_space(8.0);
                ui.label("Text");
                ui.text_edit_singleline(&mut c.character_text);
                ui.label("Font Size");
                ui.add(egui::Slider::new(&mut c.char_font_size, 40.0..=400.0));
                ui.label("Font Path");
                ui.text_edit_singleline(&mut c.char_font_path);
                ui.label("Pulse Speed");
                ui.add(egui::Slider::new(&mut c.char_pulse_speed, 0.0..=6.0));
                ui.label("Pulse Intensity");
                ui.add(egui::Slider::new(&mut c.char_pulse_intensity, 0.0..=1.0));
            }
            MotionMode::Image => {
                ui.add_space(8.0);
                ui.label("Image Path");
                let mut path = c.image_source.clone().unwrap_or_default();
                if ui.text_edit_singleline(&mut path).changed() {
                    c.image_source = (!path.is_empty()).then_some(path);
                }
                ui.label("Image Scale");
                ui.add(egui::Slider::new(&mut c.image_scale, 0.1..=3.0));
            }
            MotionMode::Audio | MotionMode::SimulatedAudio => {
                ui.add_space(8.0);
                ui.label("Sensitivity");
                ui.add(egui::Slider::new(&mut c.audio_sensitivity, 0.1..=5.0));
                ui.checkbox(&mut c.audio_reactive_radius, "Reactive Radius");
            }
            MotionMode::Pattern => {
                if matches!(c.pattern, PatternKind::Mitosis | PatternKind::LinearMitosis) {
                    ui.label("Mitosis Range");
                    ui.add(egui::Slider::new(&mut c.mitosis_range, 0.0..=1.0));
                }
                if c.pattern == PatternKind::SuperEllipse {
                    ui.label("Super Ellipse Range");
                    ui.add(egui::Slider::new(&mut c.super_ellipse_range, 0.0..=1.0));
                }
            }
            MotionMode::Drift => {}
        }
    }

    fn render_field_settings(&mut self, ui: &mut egui::Ui) {
        let c = &mut self.config;
        ui.label("Threshold");
        ui.add(egui::Slider::new(&mut c.threshold, 0.1..=3.0));
        ui.label("Edge Level");
        ui.add(egui::Slider::new(&mut c.edge_level, 0.05..=1.5));

        ui.add_space(8.0);
        ui.label("Main Color");
        let mut main = egui::Color32::from_rgb(c.main_color[0], c.main_color[1], c.main_color[2]);
        if ui.color_edit_button_srgba(&mut main).changed() {
            c.main_color = [main.r(), main.g(), main.b()];
        }

        ui.horizontal(|ui| {
            ui.selectable_value(&mut c.tint_mode, TintMode::Single, "Single");
            ui.selectable_value(&mut c.tint_mode, TintMode::Gradient, "Gradient");
        });
        if c.tint_mode == TintMode::Gradient {
            ui.label("Edge Color");
            let mut edge = egui::Color32::from_rgb(
                c.gradient_color_end[0],
                c.gradient_color_end[1],
                c.gradient_color_end[2],
            );
            if ui.color_edit_button_srgba(&mut edge).changed() {
                c.gradient_color_end = [edge.r(), edge.g(), edge.b()];
            }
        }
    }

    fn render_grid_settings(&mut self, ui: &mut egui::Ui) {
        let c = &mut self.config;
        ui.checkbox(&mut c.enable_halftone, "Halftone Grid");
        if !c.enable_halftone {
            ui.label("Pixel Step");
            ui.add(egui::Slider::new(&mut c.pixel_step, 1.0..=16.0));
            return;
        }

        ui.label("Grid Size");
        ui.add(egui::Slider::new(&mut c.grid_size, 8.0..=200.0));
        ui.label("Grid Gap");
        ui.add(egui::Slider::new(&mut c.grid_gap, 0.0..=20.0));
        ui.label("Dot Scale");
        ui.add(egui::Slider::new(&mut c.dot_scale, 0.2..=2.0));

        ui.add_space(8.0);
        ui.checkbox(&mut c.grid_sync_enabled, "Grid Size Sync");
        if c.grid_sync_enabled {
            ui.label("Min");
            ui.add(egui::Slider::new(&mut c.grid_size_min, 8.0..=200.0));
            ui.label("Max");
            ui.add(egui::Slider::new(&mut c.grid_size_max, 8.0..=200.0));
            ui.label("Easing");
            egui::ComboBox::from_id_source("grid_easing")
                .selected_text(c.grid_easing.label())
                .show_ui(ui, |ui| {
                    for curve in EasingCurve::ALL {
                        ui.selectable_value(&mut c.grid_easing, curve, curve.label());
                    }
                });
        }

        ui.add_space(8.0);
        ui.checkbox(&mut c.audio_reactive_grid, "Audio-Reactive Grid");
        if c.audio_reactive_grid {
            ui.label("Grid Sensitivity");
            ui.add(egui::Slider::new(&mut c.audio_grid_sensitivity, 0.1..=4.0));
        }
    }

    fn render_shapes_settings(&mut self, ui: &mut egui::Ui) {
        let c = &mut self.config;
        ui.label("Dot Shape");
        egui::ComboBox::from_id_source("dot_shape")
            .selected_text(c.dot_shape.label())
            .show_ui(ui, |ui| {
                for shape in DotShape::BUILTIN {
                    ui.selectable_value(&mut c.dot_shape, shape, shape.label());
                }
                for i in 0..c.custom_icons.len() {
                    ui.selectable_value(
                        &mut c.dot_shape,
                        DotShape::Custom(i),
                        format!("Custom {}", i + 1),
                    );
                }
            });

        ui.add_space(8.0);
        ui.checkbox(&mut c.mixed_enabled, "Mixed Shapes");
        if c.mixed_enabled {
            ui.label("Pool");
            for shape in DotShape::BUILTIN {
                let mut selected = c.mixed_shapes.contains(&shape);
                if ui.checkbox(&mut selected, shape.label()).changed() {
                    if selected {
                        c.mixed_shapes.push(shape);
                    } else {
                        c.mixed_shapes.retain(|s| *s != shape);
                    }
                }
            }
        }

        ui.add_space(8.0);
        ui.label("Custom Icons (one path per line)");
        let mut joined = c.custom_icons.join("\n");
        if ui.text_edit_multiline(&mut joined).changed() {
            c.custom_icons = joined
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect();
        }
    }

    fn render_overlay_settings(&mut self, ui: &mut egui::Ui) {
        let c = &mut self.config;

        ui.heading("Warning");
        ui.checkbox(&mut c.warning_overlay.enabled, "Enabled");
        ui.label("Strength");
        ui.add(egui::Slider::new(&mut c.warning_overlay.strength, 0.0..=1.0));
        ui.label("Minor Strength");
        ui.add(egui::Slider::new(&mut c.warning_minor_strength, 0.0..=1.0));
        let mut warn = egui::Color32::from_rgb(
            c.warning_overlay.color[0],
            c.warning_overlay.color[1],
            c.warning_overlay.color[2],
        );
        if ui.color_edit_button_srgba(&mut warn).changed() {
            c.warning_overlay.color = [warn.r(), warn.g(), warn.b()];
        }

        ui.add_space(8.0);
        ui.heading("Charging");
        ui.checkbox(&mut c.charging_overlay.enabled, "Enabled");
        ui.label("Strength");
        ui.add(egui::Slider::new(&mut c.charging_overlay.strength, 0.0..=1.0));
        let mut charge = egui::Color32::from_rgb(
            c.charging_overlay.color[0],
            c.charging_overlay.color[1],
            c.charging_overlay.color[2],
        );
        if ui.color_edit_button_srgba(&mut charge).changed() {
            c.charging_overlay.color = [charge.r(), charge.g(), charge.b()];
        }
    }

    fn render_canvas(&mut self, ctx: &egui::Context, dt: f32) {
        let audio = self.frame_audio();
        let pulse = self.density_pulse();

        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(egui::Color32::BLACK))
            .show(ctx, |ui| {
                let (rect, _) = ui.allocate_exact_size(ui.available_size(), egui::Sense::hover());

                self.engine.resize(rect.width(), rect.height(), &self.config);
                self.engine.update(&self.config, &self.smoothed, &audio, dt);

                let params = FieldParams {
                    threshold: self.smoothed.threshold,
                    edge: self.smoothed.edge_level,
                    center: self.engine.virtual_center(&self.config),
                    pattern_scale: self.smoothed.pattern_scale,
                    pulse,
                };
                let source = if self.config.uses_density_map() {
                    match self.density.map() {
                        Some(map) => FieldSource::Density(map),
                        // No finished map yet: render an empty field.
                        None => FieldSource::Metaballs(&[]),
                    }
                } else {
                    FieldSource::Metaballs(&self.engine.particles)
                };
                let evaluator = FieldEvaluator::new(source, params);

                let injector = OverlayInjector {
                    warning: &self.config.warning_overlay,
                    warning_minor_strength: self.config.warning_minor_strength,
                    charging: &self.config.charging_overlay,
                };

                let painter = ui.painter_at(rect);
                self.rasterizer.render(
                    &painter,
                    rect,
                    &self.config,
                    &self.smoothed,
                    &evaluator,
                    &injector,
                    &self.icons,
                    audio.bass,
                    self.time,
                );
            });
    }
}

/// Only the live microphone mode holds a capture stream; simulated audio is
/// synthesized and every other mode reads an empty snapshot.
fn capture_required(mode: MotionMode) -> bool {
    mode == MotionMode::Audio
}

fn main() -> Result<(), eframe::Error> {
    env_logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 800.0])
            .with_title("Halftone Flux")
            .with_min_inner_size([800.0, 600.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Halftone Flux",
        options,
        Box::new(|cc| Box::new(HalftoneFluxApp::new(cc))),
    )
}
