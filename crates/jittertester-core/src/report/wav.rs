//! Reconstructed audio artifact
//!
//! Downstream payloads are raw little-endian integer PCM. Concatenated in
//! arrival order they form the service's response, which is wrapped in a WAV
//! container at the service's fixed output format (16kHz mono 16-bit by
//! default).

use crate::capture::observation::Observation;
use crate::config::AudioFormat;
use crate::error::JitterError;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::{Read, Seek, Write};
use std::path::Path;

/// Concatenate downstream payloads in arrival order
pub fn reconstruct_pcm(log: &[Observation]) -> Vec<u8> {
    let total: usize = log
        .iter()
        .filter(|o| o.is_downstream())
        .map(|o| o.len())
        .sum();
    let mut pcm = Vec::with_capacity(total);
    for obs in log.iter().filter(|o| o.is_downstream()) {
        pcm.extend_from_slice(&obs.payload);
    }
    pcm
}

/// hound spec for an [`AudioFormat`]
pub fn wav_spec(format: &AudioFormat) -> WavSpec {
    WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: format.bits_per_sample,
        sample_format: SampleFormat::Int,
    }
}

/// Write raw PCM bytes as a WAV file
///
/// A trailing partial frame (e.g. an odd byte of 16-bit audio) is dropped.
///
/// # Returns
/// Number of sample frames written
pub fn write_wav(path: &Path, pcm: &[u8], format: &AudioFormat) -> Result<u64, JitterError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let writer = WavWriter::create(path, wav_spec(format))?;
    let frames = write_samples(writer, pcm, format)?;
    tracing::info!(
        path = %path.display(),
        frames,
        duration_secs = %format!("{:.2}", format.duration_secs(pcm.len())),
        "Audio saved"
    );
    Ok(frames)
}

/// Write raw PCM bytes as WAV into any seekable sink
pub fn write_wav_to<W: Write + Seek>(
    sink: W,
    pcm: &[u8],
    format: &AudioFormat,
) -> Result<u64, JitterError> {
    let writer = WavWriter::new(sink, wav_spec(format))?;
    write_samples(writer, pcm, format)
}

fn write_samples<W: Write + Seek>(
    mut writer: WavWriter<W>,
    pcm: &[u8],
    format: &AudioFormat,
) -> Result<u64, JitterError> {
    format.validate()?;
    let sample_bytes = (format.bits_per_sample as usize).div_ceil(8);
    let block_align = format.block_align();
    let usable = pcm.len() - pcm.len() % block_align;
    if usable < pcm.len() {
        tracing::warn!(
            dropped = pcm.len() - usable,
            block_align,
            "Dropping trailing partial frame from reconstructed audio"
        );
    }

    for sample in pcm[..usable].chunks_exact(sample_bytes) {
        match format.bits_per_sample {
            8 => writer.write_sample(sample[0].wrapping_sub(128) as i8)?,
            16 => writer.write_sample(i16::from_le_bytes([sample[0], sample[1]]))?,
            24 => {
                // Sign-extend the 3-byte sample through the top of an i32
                let value = i32::from_le_bytes([0, sample[0], sample[1], sample[2]]) >> 8;
                writer.write_sample(value)?
            }
            _ => writer.write_sample(i32::from_le_bytes([
                sample[0], sample[1], sample[2], sample[3],
            ]))?,
        }
    }

    writer.finalize()?;
    Ok((usable / block_align) as u64)
}

/// Read a WAV file back into raw little-endian PCM bytes
///
/// The file must already be in `format`; nothing is resampled or remixed.
pub fn read_wav_pcm(path: &Path, format: &AudioFormat) -> Result<Vec<u8>, JitterError> {
    let reader = WavReader::open(path)?;
    read_samples(reader, format)
}

/// Read WAV from any source into raw little-endian PCM bytes
pub fn read_wav_pcm_from<R: Read>(source: R, format: &AudioFormat) -> Result<Vec<u8>, JitterError> {
    let reader = WavReader::new(source)?;
    read_samples(reader, format)
}

fn read_samples<R: Read>(mut reader: WavReader<R>, format: &AudioFormat) -> Result<Vec<u8>, JitterError> {
    format.validate()?;
    let spec = reader.spec();
    if spec != wav_spec(format) {
        return Err(JitterError::Config(format!(
            "WAV is {} Hz, {} ch, {}-bit {:?}; expected {} Hz, {} ch, {}-bit int",
            spec.sample_rate,
            spec.channels,
            spec.bits_per_sample,
            spec.sample_format,
            format.sample_rate,
            format.channels,
            format.bits_per_sample
        )));
    }

    let sample_bytes = (format.bits_per_sample as usize).div_ceil(8);
    let mut pcm = Vec::with_capacity(reader.len() as usize * sample_bytes);
    for sample in reader.samples::<i32>() {
        let value = sample?;
        match format.bits_per_sample {
            8 => pcm.push((value as i8 as u8).wrapping_add(128)),
            16 => pcm.extend_from_slice(&(value as i16).to_le_bytes()),
            24 => pcm.extend_from_slice(&value.to_le_bytes()[..3]),
            _ => pcm.extend_from_slice(&value.to_le_bytes()),
        }
    }
    Ok(pcm)
}
