//! Speaker playback through the default output device.

use crate::audio_utils::{convert_i16_to_f32, resample};
use cadence_core::{AudioClip, RenderError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const DRAIN_GRACE: Duration = Duration::from_millis(500);

fn playback_error(e: impl std::fmt::Display) -> RenderError {
    RenderError::Playback(e.to_string())
}

/// Plays the clip to completion. Blocks the calling thread, so run it
/// through `spawn_blocking`.
pub fn play_blocking(clip: &AudioClip) -> Result<(), RenderError> {
    if clip.samples.is_empty() {
        return Ok(());
    }

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| RenderError::Unavailable("no output device available".to_string()))?;
    let config = device
        .default_output_config()
        .map_err(playback_error)?
        .config();
    let channels = config.channels as usize;
    let device_rate = config.sample_rate.0;

    let samples = resample(&convert_i16_to_f32(&clip.samples), clip.sample_rate, device_rate)
        .map_err(playback_error)?;
    let total = samples.len();
    let samples = Arc::new(samples);
    let position = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicBool::new(false));

    let stream = {
        let samples = Arc::clone(&samples);
        let position = Arc::clone(&position);
        let finished = Arc::clone(&finished);
        device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let pos = position.load(Ordering::Relaxed);
                        let sample = match samples.get(pos) {
                            Some(&sample) => {
                                position.store(pos + 1, Ordering::Relaxed);
                                sample
                            }
                            None => {
                                finished.store(true, Ordering::Release);
                                0.0
                            }
                        };
                        frame.fill(sample);
                    }
                },
                |err| error!(error = %err, "audio playback error"),
                None,
            )
            .map_err(playback_error)?
    };
    stream.play().map_err(playback_error)?;

    let expected = Duration::from_secs_f64(total as f64 / device_rate as f64);
    let deadline = Instant::now() + expected + DRAIN_GRACE;
    while !finished.load(Ordering::Acquire) && Instant::now() < deadline {
        std::thread::sleep(POLL_INTERVAL);
    }
    drop(stream);

    debug!(samples = total, device_rate, "playback complete");
    Ok(())
}
