//! WAV persistence for rendered speech.

use crate::audio_utils::WAV_BITS_PER_SAMPLE;
use cadence_core::{AudioClip, RenderError};
use std::path::Path;

/// Writes the clip as a mono 16-bit WAV file, replacing any existing file.
pub fn write_wav(clip: &AudioClip, path: &Path) -> Result<(), RenderError> {
    let save_error = |e: hound::Error| RenderError::Save {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: clip.sample_rate,
        bits_per_sample: WAV_BITS_PER_SAMPLE,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).map_err(save_error)?;
    for &sample in &clip.samples {
        writer.write_sample(sample).map_err(save_error)?;
    }
    writer.finalize().map_err(save_error)?;
    Ok(())
}
