use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

use crate::error::{Result, RevoiceError};

const CHUNK_SIZE: usize = 1024;
const MAX_FLUSHES: usize = 64;

/// Number of samples `len` input samples occupy at the new rate.
pub fn resampled_len(len: usize, from_rate: u32, to_rate: u32) -> usize {
    (len as f64 * to_rate as f64 / from_rate as f64).round() as usize
}

/// Band-limited sinc resampling of a mono signal.
///
/// The result has exactly `round(len * to / from)` samples with the filter
/// delay removed, so a clip keeps its position when placed on a timeline.
pub fn resample(input: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == 0 || to_rate == 0 {
        return Err(RevoiceError::Resample(format!(
            "invalid sample rates {} -> {}",
            from_rate, to_rate
        )));
    }
    if from_rate == to_rate || input.is_empty() {
        return Ok(input.to_vec());
    }

    let expected = resampled_len(input.len(), from_rate, to_rate);
    let ratio = to_rate as f64 / from_rate as f64;

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_SIZE, 1)
        .map_err(|e| RevoiceError::Resample(format!("failed to build resampler: {}", e)))?;

    let delay = resampler.output_delay();
    let mut output: Vec<f32> = Vec::with_capacity(expected + delay + CHUNK_SIZE);

    let mut pos = 0;
    while input.len() - pos >= resampler.input_frames_next() {
        let take = resampler.input_frames_next();
        let frames = resampler
            .process(&[&input[pos..pos + take]], None)
            .map_err(|e| RevoiceError::Resample(e.to_string()))?;
        output.extend_from_slice(&frames[0]);
        pos += take;
    }

    if pos < input.len() {
        let tail: [&[f32]; 1] = [&input[pos..]];
        let frames = resampler
            .process_partial(Some(&tail[..]), None)
            .map_err(|e| RevoiceError::Resample(e.to_string()))?;
        output.extend_from_slice(&frames[0]);
    }

    // Push zeros through until the delayed tail has come out.
    let mut flushes = 0;
    while output.len() < expected + delay && flushes < MAX_FLUSHES {
        let frames = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(|e| RevoiceError::Resample(e.to_string()))?;
        output.extend_from_slice(&frames[0]);
        flushes += 1;
    }

    output.drain(..delay.min(output.len()));
    output.resize(expected, 0.0);

    debug!(
        "Resampled {} samples @ {} Hz -> {} samples @ {} Hz",
        input.len(),
        from_rate,
        output.len(),
        to_rate
    );
    Ok(output)
}
