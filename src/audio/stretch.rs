//! Pitch-preserving time stretch (phase vocoder).

use std::f32::consts::PI;
use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use tracing::debug;

use crate::error::{Result, RevoiceError};

pub const N_FFT: usize = 2048;
pub const HOP: usize = 512;
pub const MIN_RATE: f64 = 0.25;
pub const MAX_RATE: f64 = 4.0;

/// Length of `len` samples after stretching by `rate`.
pub fn stretched_len(len: usize, rate: f64) -> usize {
    (len as f64 / rate).round() as usize
}

/// Change duration by a factor of `1 / rate` without changing pitch.
///
/// `rate > 1` speeds up, `rate < 1` slows down. The output has exactly
/// `round(len / rate)` samples.
pub fn time_stretch(input: &[f32], rate: f64) -> Result<Vec<f32>> {
    if !rate.is_finite() || !(MIN_RATE..=MAX_RATE).contains(&rate) {
        return Err(RevoiceError::TimeStretch(format!(
            "rate {} outside supported range [{}, {}]",
            rate, MIN_RATE, MAX_RATE
        )));
    }
    if input.is_empty() {
        return Ok(Vec::new());
    }
    let out_len = stretched_len(input.len(), rate);
    if (rate - 1.0).abs() < 1e-9 {
        return Ok(input.to_vec());
    }

    let mut analysis = Analysis::new(input);
    let n_frames = analysis.n_frames();
    let bins = N_FFT / 2 + 1;

    // Expected phase advance per hop for each bin.
    let phi_advance: Vec<f32> = (0..bins)
        .map(|k| HOP as f32 * 2.0 * PI * k as f32 / N_FFT as f32)
        .collect();

    let steps: Vec<f64> = (0..)
        .map(|i| i as f64 * rate)
        .take_while(|&t| t < n_frames as f64)
        .collect();

    let mut phase_acc: Vec<f32> = analysis.column(0).iter().map(|c| c.arg()).collect();
    let mut synthesis = Synthesis::new(steps.len());
    let mut column = vec![Complex::new(0.0f32, 0.0); bins];

    for &t in &steps {
        let left = t.floor() as usize;
        let alpha = (t - left as f64) as f32;
        let (s_left, s_right) = analysis.pair(left);

        for k in 0..bins {
            let mag = (1.0 - alpha) * s_left[k].norm() + alpha * s_right[k].norm();
            column[k] = Complex::from_polar(mag, phase_acc[k]);

            let delta = s_right[k].arg() - s_left[k].arg() - phi_advance[k];
            let wrapped = delta - 2.0 * PI * (delta / (2.0 * PI)).round();
            phase_acc[k] = (phase_acc[k] + phi_advance[k] + wrapped) % (2.0 * PI);
        }

        synthesis.push(&mut column)?;
    }

    let output = synthesis.finish(out_len);
    debug!(
        "Time-stretched {} samples by rate {:.4} -> {} samples ({} frames)",
        input.len(),
        rate,
        output.len(),
        steps.len()
    );
    Ok(output)
}

/// Periodic Hann window.
fn hann(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / n as f32).cos())
        .collect()
}

/// Centered STFT computed one column at a time. Frames past the signal read
/// as an all-zero column, and only the two most recent columns are kept.
struct Analysis<'a> {
    input: &'a [f32],
    window: Vec<f32>,
    fft: Arc<dyn RealToComplex<f32>>,
    frame: Vec<f32>,
    scratch: Vec<Complex<f32>>,
    cache: Vec<(usize, Vec<Complex<f32>>)>,
}

impl<'a> Analysis<'a> {
    fn new(input: &'a [f32]) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(N_FFT);
        let frame = fft.make_input_vec();
        let scratch = fft.make_scratch_vec();
        Self {
            input,
            window: hann(N_FFT),
            fft,
            frame,
            scratch,
            cache: Vec::with_capacity(2),
        }
    }

    fn n_frames(&self) -> usize {
        1 + self.input.len() / HOP
    }

    fn pair(&mut self, left: usize) -> (&[Complex<f32>], &[Complex<f32>]) {
        self.ensure(left);
        self.ensure(left + 1);
        let l = self.slot(left);
        let r = self.slot(left + 1);
        (&self.cache[l].1, &self.cache[r].1)
    }

    fn column(&mut self, index: usize) -> &[Complex<f32>] {
        self.ensure(index);
        let slot = self.slot(index);
        &self.cache[slot].1
    }

    fn slot(&self, index: usize) -> usize {
        self.cache
            .iter()
            .position(|(i, _)| *i == index)
            .unwrap_or(0)
    }

    fn ensure(&mut self, index: usize) {
        if self.cache.iter().any(|(i, _)| *i == index) {
            return;
        }
        let spectrum = self.compute(index);
        if self.cache.len() == 2 {
            // Evict the older column; steps only move forward.
            let oldest = if self.cache[0].0 < self.cache[1].0 { 0 } else { 1 };
            self.cache.remove(oldest);
        }
        self.cache.push((index, spectrum));
    }

    fn compute(&mut self, index: usize) -> Vec<Complex<f32>> {
        let bins = N_FFT / 2 + 1;
        if index >= self.n_frames() {
            return vec![Complex::new(0.0, 0.0); bins];
        }

        // Frame `index` starts at index * HOP in the signal padded by N_FFT / 2.
        let origin = (index * HOP) as isize - (N_FFT / 2) as isize;
        for (n, slot) in self.frame.iter_mut().enumerate() {
            let pos = origin + n as isize;
            let sample = if pos >= 0 && (pos as usize) < self.input.len() {
                self.input[pos as usize]
            } else {
                0.0
            };
            *slot = sample * self.window[n];
        }

        let mut spectrum = self.fft.make_output_vec();
        // Buffer sizes come from the plan itself, so this cannot fail.
        if self
            .fft
            .process_with_scratch(&mut self.frame, &mut spectrum, &mut self.scratch)
            .is_err()
        {
            return vec![Complex::new(0.0, 0.0); bins];
        }
        spectrum
    }
}

/// Weighted overlap-add, normalized by the window sum-square.
struct Synthesis {
    window: Vec<f32>,
    ifft: Arc<dyn ComplexToReal<f32>>,
    frame: Vec<f32>,
    scratch: Vec<Complex<f32>>,
    output: Vec<f32>,
    weights: Vec<f32>,
    frames_written: usize,
}

impl Synthesis {
    fn new(n_frames: usize) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let ifft = planner.plan_fft_inverse(N_FFT);
        let frame = ifft.make_output_vec();
        let scratch = ifft.make_scratch_vec();
        let total = N_FFT + HOP * n_frames.saturating_sub(1);
        Self {
            window: hann(N_FFT),
            ifft,
            frame,
            scratch,
            output: vec![0.0; total],
            weights: vec![0.0; total],
            frames_written: 0,
        }
    }

    fn push(&mut self, column: &mut [Complex<f32>]) -> Result<()> {
        // A real signal has no imaginary DC or Nyquist component.
        if let Some(first) = column.first_mut() {
            first.im = 0.0;
        }
        if let Some(last) = column.last_mut() {
            last.im = 0.0;
        }

        self.ifft
            .process_with_scratch(column, &mut self.frame, &mut self.scratch)
            .map_err(|e| RevoiceError::TimeStretch(format!("inverse FFT failed: {}", e)))?;

        let offset = self.frames_written * HOP;
        let scale = 1.0 / N_FFT as f32;
        for n in 0..N_FFT {
            let w = self.window[n];
            self.output[offset + n] += self.frame[n] * scale * w;
            self.weights[offset + n] += w * w;
        }
        self.frames_written += 1;
        Ok(())
    }

    fn finish(mut self, length: usize) -> Vec<f32> {
        for (sample, &weight) in self.output.iter_mut().zip(&self.weights) {
            if weight > 1e-8 {
                *sample /= weight;
            }
        }

        // Drop the centering pad and fit to the requested length.
        let start = (N_FFT / 2).min(self.output.len());
        let mut out: Vec<f32> = self.output.split_off(start);
        out.resize(length, 0.0);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / rate as f32).sin() * 0.5)
            .collect()
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    /// Dominant frequency estimated from zero crossings.
    fn crossing_freq(samples: &[f32], rate: u32) -> f32 {
        let crossings = samples
            .windows(2)
            .filter(|w| w[0] <= 0.0 && w[1] > 0.0)
            .count();
        crossings as f32 * rate as f32 / samples.len() as f32
    }

    #[test]
    fn test_rejects_bad_rates() {
        for rate in [0.0, 0.1, 5.0, f64::NAN, f64::INFINITY, -1.0] {
            assert!(
                matches!(time_stretch(&[0.0; 100], rate), Err(RevoiceError::TimeStretch(_))),
                "rate {} should be rejected",
                rate
            );
        }
    }

    #[test]
    fn test_output_length() {
        let input = sine(440.0, 16000, 16000);
        for rate in [0.5, 0.8, 1.3, 2.0] {
            let out = time_stretch(&input, rate).unwrap();
            assert_eq!(out.len(), stretched_len(input.len(), rate));
        }
    }

    #[test]
    fn test_unit_rate_is_identity() {
        let input = sine(300.0, 16000, 4000);
        assert_eq!(time_stretch(&input, 1.0).unwrap(), input);
    }

    #[test]
    fn test_empty_input() {
        assert!(time_stretch(&[], 1.5).unwrap().is_empty());
    }

    #[test]
    fn test_pitch_is_preserved() {
        let rate = 16000;
        let input = sine(440.0, rate, 32000);
        let out = time_stretch(&input, 1.3).unwrap();

        let body = &out[4096..out.len() - 4096];
        let freq = crossing_freq(body, rate);
        assert!((freq - 440.0).abs() < 15.0, "estimated {} Hz", freq);
    }

    #[test]
    fn test_level_is_roughly_preserved() {
        let input = sine(500.0, 16000, 32000);
        let out = time_stretch(&input, 0.77).unwrap();
        let body = &out[4096..out.len() - 4096];
        let ratio = rms(body) / rms(&input);
        assert!((0.7..1.3).contains(&ratio), "rms ratio {}", ratio);
    }
}
