//! Off-thread density map production for the text and image modes.
//!
//! Rasterizing a 600x600 buffer is far too slow for the frame loop, so a
//! worker thread owns it. The UI thread sends a request whenever the relevant
//! config changes and keeps rendering with the last finished map until the
//! replacement arrives; a mode with no finished map simply contributes zero
//! influence.

use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use image::{imageops, RgbaImage};

use crate::config::SimulationConfig;
use crate::field::{DensityKind, DensityMap, DENSITY_SIZE};

#[derive(Clone, PartialEq, Debug)]
enum DensityRequest {
    Text {
        text: String,
        font_size: f32,
        font_path: String,
    },
    Image {
        path: String,
        scale: f32,
    },
}

pub struct DensityWorker {
    tx: Sender<DensityRequest>,
    rx: Receiver<Option<DensityMap>>,
    current: Option<DensityMap>,
    pending: Option<DensityRequest>,
}

impl DensityWorker {
    pub fn spawn() -> Self {
        let (req_tx, req_rx) = unbounded::<DensityRequest>();
        let (map_tx, map_rx) = unbounded::<Option<DensityMap>>();
        thread::spawn(move || worker_loop(req_rx, map_tx));
        Self {
            tx: req_tx,
            rx: map_rx,
            current: None,
            pending: None,
        }
    }

    /// Re-request the map if the config changed, and drain any finished maps.
    /// Never blocks.
    pub fn sync(&mut self, config: &SimulationConfig) {
        if let Some(request) = request_for(config) {
            if self.pending.as_ref() != Some(&request) {
                self.pending = Some(request.clone());
                if self.tx.send(request).is_err() {
                    log::error!("density worker is gone");
                }
            }
        }

        loop {
            match self.rx.try_recv() {
                Ok(map) => self.current = map,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    pub fn map(&self) -> Option<&DensityMap> {
        self.current.as_ref()
    }
}

fn request_for(config: &SimulationConfig) -> Option<DensityRequest> {
    use crate::config::MotionMode;
    match config.motion_mode {
        MotionMode::Character => Some(DensityRequest::Text {
            text: config.character_text.clone(),
            font_size: config.char_font_size,
            font_path: config.char_font_path.clone(),
        }),
        MotionMode::Image => config.image_source.as_ref().map(|path| DensityRequest::Image {
            path: path.clone(),
            scale: config.image_scale,
        }),
        _ => None,
    }
}

fn worker_loop(rx: Receiver<DensityRequest>, tx: Sender<Option<DensityMap>>) {
    while let Ok(mut request) = rx.recv() {
        // Collapse a backlog down to the newest request.
        while let Ok(newer) = rx.try_recv() {
            request = newer;
        }
        let map = match request {
            DensityRequest::Text {
                text,
                font_size,
                font_path,
            } => rasterize_text(&text, font_size, &font_path),
            DensityRequest::Image { path, scale } => rasterize_image(&path, scale),
        };
        if tx.send(map).is_err() {
            return;
        }
    }
}

fn rasterize_text(text: &str, font_size: f32, font_path: &str) -> Option<DensityMap> {
    use ab_glyph::{FontVec, PxScale};
    use imageproc::drawing::{draw_text_mut, text_size};

    if text.is_empty() {
        return None;
    }
    let bytes = match std::fs::read(font_path) {
        Ok(bytes) => bytes,
        Err(err) => {
            log::warn!("character font {font_path:?} unavailable: {err}");
            return None;
        }
    };
    let font = match FontVec::try_from_vec(bytes) {
        Ok(font) => font,
        Err(err) => {
            log::warn!("character font {font_path:?} failed to parse: {err}");
            return None;
        }
    };

    let mut canvas = RgbaImage::from_pixel(
        DENSITY_SIZE as u32,
        DENSITY_SIZE as u32,
        image::Rgba([0, 0, 0, 255]),
    );
    let scale = PxScale::from(font_size);
    let (w, h) = text_size(scale, &font, text);
    let x = (DENSITY_SIZE as i32 - w as i32) / 2;
    let y = (DENSITY_SIZE as i32 - h as i32) / 2;
    draw_text_mut(
        &mut canvas,
        image::Rgba([255, 255, 255, 255]),
        x,
        y,
        scale,
        &font,
        text,
    );

    Some(DensityMap {
        pixels: canvas.into_raw(),
        kind: DensityKind::Text,
        view_scale: 1.0,
    })
}

fn rasterize_image(path: &str, scale: f32) -> Option<DensityMap> {
    let source = match image::open(path) {
        Ok(img) => img.to_rgba8(),
        Err(err) => {
            log::warn!("image source {path:?} unavailable: {err}");
            return None;
        }
    };

    let (fit_w, fit_h) = fit_dimensions(source.width(), source.height());
    let resized = imageops::resize(&source, fit_w, fit_h, imageops::FilterType::Triangle);

    let mut canvas = RgbaImage::new(DENSITY_SIZE as u32, DENSITY_SIZE as u32);
    let ox = (DENSITY_SIZE as i64 - fit_w as i64) / 2;
    let oy = (DENSITY_SIZE as i64 - fit_h as i64) / 2;
    imageops::overlay(&mut canvas, &resized, ox, oy);

    Some(DensityMap {
        pixels: canvas.into_raw(),
        kind: DensityKind::Image,
        view_scale: scale.max(0.01),
    })
}

/// Scale an image to fit inside the sample square, preserving aspect ratio.
fn fit_dimensions(w: u32, h: u32) -> (u32, u32) {
    let w = w.max(1);
    let h = h.max(1);
    let fit = (DENSITY_SIZE as f32 / w as f32).min(DENSITY_SIZE as f32 / h as f32);
    (
        ((w as f32 * fit) as u32).clamp(1, DENSITY_SIZE as u32),
        ((h as f32 * fit) as u32).clamp(1, DENSITY_SIZE as u32),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MotionMode;

    #[test]
    fn fit_preserves_aspect_and_bounds() {
        assert_eq!(fit_dimensions(600, 600), (600, 600));
        assert_eq!(fit_dimensions(1200, 600), (600, 300));
        assert_eq!(fit_dimensions(300, 900), (200, 600));
        let (w, h) = fit_dimensions(7, 5000);
        assert!(w >= 1 && h <= 600);
    }

    #[test]
    fn only_density_modes_request_maps() {
        let mut config = SimulationConfig::default();
        for mode in [
            MotionMode::Drift,
            MotionMode::Cross,
            MotionMode::Breath,
            MotionMode::Audio,
            MotionMode::SimulatedAudio,
            MotionMode::Pattern,
        ] {
            config.motion_mode = mode;
            assert!(request_for(&config).is_none());
        }

        config.motion_mode = MotionMode::Character;
        assert!(matches!(
            request_for(&config),
            Some(DensityRequest::Text { .. })
        ));

        config.motion_mode = MotionMode::Image;
        assert!(request_for(&config).is_none(), "no image path set");
        config.image_source = Some("art.png".to_string());
        assert!(matches!(
            request_for(&config),
            Some(DensityRequest::Image { .. })
        ));
    }

    #[test]
    fn missing_font_yields_no_map() {
        assert!(rasterize_text("META", 180.0, "/definitely/not/a/font.ttf").is_none());
        assert!(rasterize_text("", 180.0, "whatever.ttf").is_none());
    }

    #[test]
    fn sync_does_not_resend_identical_requests() {
        let mut worker = DensityWorker::spawn();
        let mut config = SimulationConfig::default();
        config.motion_mode = MotionMode::Character;
        worker.sync(&config);
        let pending = worker.pending.clone();
        worker.sync(&config);
        assert_eq!(worker.pending, pending);

        config.character_text = "FLUX".to_string();
        worker.sync(&config);
        assert_ne!(worker.pending, pending);
    }
}
