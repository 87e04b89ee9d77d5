use anyhow::Context;
use hound::{SampleFormat, WavSpec, WavWriter};
use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use std::io::Cursor;

/// Sample rate of the WAV files uploaded to the chat endpoint.
pub const UPLOAD_SAMPLE_RATE: u32 = 16000;

pub const WAV_MIME_TYPE: &str = "audio/wav";

/// Creates a resampler to convert between audio sample rates.
pub fn create_resampler(
    in_sampling_rate: f64,
    out_sampling_rate: f64,
    chunk_size: usize,
) -> anyhow::Result<FastFixedIn<f32>> {
    let resampler = FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,
        PolynomialDegree::Cubic,
        chunk_size,
        1,
    )?;
    Ok(resampler)
}

/// Splits a slice of audio samples into a vector of vectors, where each inner vector has a fixed chunk size.
/// If a chunk is smaller than the `chunk_size`, it is padded with zeros.
pub fn split_for_chunks(samples: &[f32], chunk_size: usize) -> Vec<Vec<f32>> {
    samples
        .chunks(chunk_size)
        .map(|chunk| {
            let mut chunk = chunk.to_vec();
            chunk.resize(chunk_size, 0.0);
            chunk
        })
        .collect()
}

/// Averages interleaved frames down to one channel.
pub fn downmix(data: &[f32], channels: usize) -> Vec<f32> {
    if channels > 1 {
        data.chunks(channels)
            .map(|c| c.iter().sum::<f32>() / channels as f32)
            .collect()
    } else {
        data.to_vec()
    }
}

/// Resamples a whole mono recording.
pub fn resample(
    samples: &[f32],
    in_sampling_rate: u32,
    out_sampling_rate: u32,
    chunk_size: usize,
) -> anyhow::Result<Vec<f32>> {
    if in_sampling_rate == out_sampling_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let mut resampler =
        create_resampler(in_sampling_rate as f64, out_sampling_rate as f64, chunk_size)?;
    let expected =
        (samples.len() as f64 * out_sampling_rate as f64 / in_sampling_rate as f64).round() as usize;

    let mut resampled = Vec::with_capacity(expected + chunk_size);
    for chunk in split_for_chunks(samples, chunk_size) {
        let mut output = resampler
            .process(&[chunk], None)
            .context("Failed to resample audio chunk")?;
        if let Some(channel) = output.pop() {
            resampled.extend(channel);
        }
    }
    resampled.truncate(expected);
    Ok(resampled)
}

/// Converts a slice of f32 samples to a vector of i16 samples.
pub fn convert_f32_to_i16(pcm32: &[f32]) -> Vec<i16> {
    pcm32
        .iter()
        .map(|&sample| (sample * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16)
        .collect()
}

/// Packages mono samples as a 16-bit PCM WAV file.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> anyhow::Result<Vec<u8>> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut buffer = Cursor::new(Vec::new());
    {
        let mut writer =
            WavWriter::new(&mut buffer, spec).context("Failed to create WAV writer")?;
        for sample in convert_f32_to_i16(samples) {
            writer
                .write_sample(sample)
                .context("Failed to write WAV sample")?;
        }
        writer.finalize().context("Failed to finalize WAV")?;
    }
    Ok(buffer.into_inner())
}

/// RMS level of a block of samples scaled to `0..=255`.
pub fn level(samples: &[f32]) -> u8 {
    if samples.is_empty() {
        return 0;
    }
    let mean_square = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    (mean_square.sqrt() * 255.0).clamp(0.0, 255.0) as u8
}
