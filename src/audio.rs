//! Microphone capture and spectrum analysis for the audio-reactive modes.
//!
//! The cpal callback only copies samples into a shared ring; the FFT runs on
//! the UI thread once per frame and publishes an immutable `AudioSnapshot`.
//! When no input device exists the snapshot stays silent and the rest of the
//! app is unaffected.

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rustfft::{num_complex::Complex, Fft, FftPlanner};

pub const BIN_COUNT: usize = 128;
const FFT_SIZE: usize = 1024;

/// Per-frame spectrum published to the simulation. Bins are normalized to
/// [0, 1]; `bass` is the mean of the lowest fifth.
#[derive(Clone, Debug, Default)]
pub struct AudioSnapshot {
    pub bins: Vec<f32>,
    pub bass: f32,
}

impl AudioSnapshot {
    /// Bin value at a fractional position along the spectrum. Silent (empty)
    /// snapshots read as zero everywhere.
    pub fn bin_at(&self, frac: f32) -> f32 {
        if self.bins.is_empty() {
            return 0.0;
        }
        let idx = (frac.clamp(0.0, 1.0) * (self.bins.len() - 1) as f32) as usize;
        self.bins[idx]
    }

    fn from_bins(bins: Vec<f32>) -> Self {
        let low = (bins.len() / 5).max(1).min(bins.len());
        let bass = bins[..low].iter().sum::<f32>() / low as f32;
        Self { bins, bass }
    }
}

pub struct AudioInput {
    // Held only to keep the stream alive.
    _stream: Option<cpal::Stream>,
    ring: Arc<Mutex<Vec<f32>>>,
    fft: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex<f32>>,
    window: Vec<f32>,
}

impl AudioInput {
    /// Open the default input device. Absence of a device is not an error;
    /// the input just stays silent.
    pub fn open() -> Self {
        let ring = Arc::new(Mutex::new(Vec::with_capacity(FFT_SIZE)));
        let stream = build_stream(Arc::clone(&ring));
        if stream.is_none() {
            log::warn!("no audio input device; audio mode will stay silent");
        }

        let fft = FftPlanner::new().plan_fft_forward(FFT_SIZE);
        let window = (0..FFT_SIZE)
            .map(|i| {
                let t = i as f32 / (FFT_SIZE - 1) as f32;
                0.5 - 0.5 * (std::f32::consts::TAU * t).cos()
            })
            .collect();

        Self {
            _stream: stream,
            ring,
            fft,
            scratch: vec![Complex::default(); FFT_SIZE],
            window,
        }
    }

    /// Analyze the most recent capture window. Cheap enough to run every
    /// frame; returns silence until a full window has been captured.
    pub fn snapshot(&mut self, sensitivity: f32) -> AudioSnapshot {
        {
            let ring = match self.ring.lock() {
                Ok(ring) => ring,
                Err(_) => return AudioSnapshot::default(),
            };
            if ring.len() < FFT_SIZE {
                return AudioSnapshot::default();
            }
            let start = ring.len() - FFT_SIZE;
            for (i, sample) in ring[start..].iter().enumerate() {
                self.scratch[i] = Complex::new(sample * self.window[i], 0.0);
            }
        }

        self.fft.process(&mut self.scratch);
        AudioSnapshot::from_bins(bins_from_spectrum(&self.scratch, sensitivity))
    }
}

fn build_stream(ring: Arc<Mutex<Vec<f32>>>) -> Option<cpal::Stream> {
    let host = cpal::default_host();
    let device = host.default_input_device()?;
    let config = match device.default_input_config() {
        Ok(config) => config,
        Err(err) => {
            log::warn!("audio input config unavailable: {err}");
            return None;
        }
    };
    let channels = config.channels() as usize;
    let err_fn = |err| log::error!("audio stream error: {err}");

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => device.build_input_stream(
            &config.into(),
            move |data: &[f32], _| push_mono(&ring, data.iter().copied(), channels),
            err_fn,
            None,
        ),
        cpal::SampleFormat::I16 => device.build_input_stream(
            &config.into(),
            move |data: &[i16], _| {
                push_mono(&ring, data.iter().map(|&s| s as f32 / i16::MAX as f32), channels)
            },
            err_fn,
            None,
        ),
        other => {
            log::warn!("unsupported input sample format {other:?}");
            return None;
        }
    };

    match stream {
        Ok(stream) => {
            if let Err(err) = stream.play() {
                log::warn!("failed to start audio stream: {err}");
                return None;
            }
            Some(stream)
        }
        Err(err) => {
            log::warn!("failed to open audio stream: {err}");
            None
        }
    }
}

fn push_mono(ring: &Arc<Mutex<Vec<f32>>>, samples: impl Iterator<Item = f32>, channels: usize) {
    let Ok(mut ring) = ring.lock() else { return };
    let channels = channels.max(1);
    let mut acc = 0.0;
    for (i, sample) in samples.enumerate() {
        acc += sample;
        if (i + 1) % channels == 0 {
            ring.push(acc / channels as f32);
            acc = 0.0;
        }
    }
    // Keep only the freshest window plus slack.
    let cap = FFT_SIZE * 2;
    if ring.len() > cap {
        let excess = ring.len() - cap;
        ring.drain(..excess);
    }
}

/// Collapse the positive half of the spectrum into `BIN_COUNT` averaged bins.
fn bins_from_spectrum(spectrum: &[Complex<f32>], sensitivity: f32) -> Vec<f32> {
    let half = spectrum.len() / 2;
    let group = (half / BIN_COUNT).max(1);
    let norm = 2.0 / spectrum.len() as f32;
    (0..BIN_COUNT)
        .map(|b| {
            let start = b * group;
            let end = ((b + 1) * group).min(half);
            if start >= end {
                return 0.0;
            }
            let mean = spectrum[start..end]
                .iter()
                .map(|c| c.norm() * norm)
                .sum::<f32>()
                / (end - start) as f32;
            (mean * 12.0 * sensitivity).clamp(0.0, 1.0)
        })
        .collect()
}

/// Deterministic stand-in spectrum for `MotionMode::SimulatedAudio`: a slow
/// beat pulse over a decaying spectral slope, no device required.
pub fn simulated_snapshot(time: f32, sensitivity: f32) -> AudioSnapshot {
    let beat = (time * 2.2).sin().max(0.0).powi(8);
    let bins = (0..BIN_COUNT)
        .map(|i| {
            let frac = i as f32 / (BIN_COUNT - 1) as f32;
            let slope = 1.0 - frac * 0.75;
            let shimmer = 0.5 + 0.5 * (time * 3.1 + frac * 14.0).sin();
            ((beat * 0.7 + shimmer * 0.3) * slope * sensitivity * 0.6).clamp(0.0, 1.0)
        })
        .collect();
    AudioSnapshot::from_bins(bins)
}
