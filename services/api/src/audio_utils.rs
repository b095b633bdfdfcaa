use rubato::{FastFixedIn, PolynomialDegree, Resampler};

// Raw PCM from the speech endpoint is 24 kHz mono 16-bit.
pub const OPENAI_TTS_PCM16_SAMPLE_RATE: u32 = 24000;
pub const WAV_BITS_PER_SAMPLE: u16 = 16;

const RESAMPLE_CHUNK_SIZE: usize = 1024;

/// Creates a resampler to convert between audio sample rates.
pub fn create_resampler(
    in_sampling_rate: f64,
    out_sampling_rate: f64,
    chunk_size: usize,
) -> anyhow::Result<FastFixedIn<f32>> {
    let resampler = FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,                     // No cutoff frequency, pass all frequencies
        PolynomialDegree::Cubic, // Cubic interpolation for quality
        chunk_size,
        1, // 1 channel (mono)
    )?;
    Ok(resampler)
}

/// Resamples a whole mono clip. The output has exactly the length implied by
/// the rate ratio; the zero padding of the final chunk is cut off.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> anyhow::Result<Vec<f32>> {
    if samples.is_empty() || from_rate == to_rate {
        return Ok(samples.to_vec());
    }

    let mut resampler = create_resampler(from_rate as f64, to_rate as f64, RESAMPLE_CHUNK_SIZE)?;
    let expected = (samples.len() as f64 * to_rate as f64 / from_rate as f64).round() as usize;
    let mut output = Vec::with_capacity(expected + RESAMPLE_CHUNK_SIZE * 2);

    let mut chunks = samples.chunks_exact(RESAMPLE_CHUNK_SIZE);
    for chunk in &mut chunks {
        let resampled = resampler.process(&[chunk], None)?;
        output.extend_from_slice(&resampled[0]);
    }
    let rest = chunks.remainder();
    if !rest.is_empty() {
        let resampled = resampler.process_partial(Some(&[rest]), None)?;
        output.extend_from_slice(&resampled[0]);
    }

    output.truncate(expected);
    Ok(output)
}

/// Interprets raw little-endian PCM16 bytes as samples. A trailing odd byte is ignored.
pub fn pcm16_from_le_bytes(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
        .collect()
}

/// Converts a slice of i16 samples to a vector of f32 samples.
pub fn convert_i16_to_f32(pcm16: &[i16]) -> Vec<f32> {
    pcm16
        .iter()
        .map(|&sample| sample as f32 / 32768.0)
        .collect()
}
