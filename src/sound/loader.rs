// File source - decode to mono and resample to the engine rate

use claxon::FlacReader;
use hound::{SampleFormat, WavReader};
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::EngineError;

/// Interleaved samples straight out of a decoder
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Decode `path`, downmix to mono and resample to `target_rate`.
///
/// Blocking I/O: only ever called from the control thread while warming the cache.
pub fn load_mono(path: &Path, target_rate: u32) -> Result<Vec<f32>, EngineError> {
    let unavailable = |reason: String| EngineError::source_unavailable(path.display().to_string(), reason);

    if !path.is_file() {
        return Err(unavailable("file not found".to_string()));
    }

    let decoded = decode(path).map_err(unavailable)?;
    if decoded.samples.is_empty() || decoded.channels == 0 || decoded.sample_rate == 0 {
        return Err(unavailable("file contains no audio".to_string()));
    }

    let mono = downmix_to_mono(&decoded.samples, decoded.channels as usize);
    Ok(resample_linear(&mono, decoded.sample_rate, target_rate))
}

/// Pick a decoder by extension; anything that is not WAV/FLAC goes through symphonia
pub fn decode(path: &Path) -> Result<DecodedAudio, String> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "wav" | "wave" => load_wav(path),
        "flac" => load_flac(path),
        _ => load_with_symphonia(path),
    }
}

fn load_wav(path: &Path) -> Result<DecodedAudio, String> {
    let reader = WavReader::open(path).map_err(|e| format!("Invalid WAV file: {}", e))?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<f32>, _>>()
            .map_err(|e| format!("Corrupted WAV data: {}", e))?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|s| s as f32 / scale))
                .collect::<Result<Vec<f32>, _>>()
                .map_err(|e| format!("Corrupted WAV data: {}", e))?
        }
    };

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

fn load_flac(path: &Path) -> Result<DecodedAudio, String> {
    let mut reader = FlacReader::open(path).map_err(|e| format!("Invalid FLAC file: {}", e))?;
    let info = reader.streaminfo();
    let scale = (1i64 << (info.bits_per_sample.saturating_sub(1))) as f32;

    let samples = reader
        .samples()
        .map(|s| s.map(|s| s as f32 / scale))
        .collect::<Result<Vec<f32>, _>>()
        .map_err(|e| format!("Corrupted FLAC data: {}", e))?;

    Ok(DecodedAudio {
        samples,
        sample_rate: info.sample_rate,
        channels: info.channels as u16,
    })
}

fn load_with_symphonia(path: &Path) -> Result<DecodedAudio, String> {
    let file = File::open(path).map_err(|e| format!("Cannot open file: {}", e))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| format!("Unsupported file format: {}", e))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| "Unsupported file format: no audio track".to_string())?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| "Unknown sample rate".to_string())?;
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| format!("Unsupported codec: {}", e))?;

    let mut samples = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(format!("Error reading packet: {}", e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // A damaged frame is skipped, the rest of the file is still usable
            Err(SymphoniaError::DecodeError(e)) => {
                log::debug!("Skipping undecodable packet in {}: {}", path.display(), e);
                continue;
            }
            Err(e) => return Err(format!("Decoder error: {}", e)),
        };

        if sample_buf.is_none() {
            let spec = *decoded.spec();
            channels = spec.channels.count() as u16;
            sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
        }

        if let Some(ref mut buf) = sample_buf {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}

/// Average interleaved channels into one
pub fn downmix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Linear-interpolation resampler
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = ((samples.len() as f64) / ratio).round().max(1.0) as usize;
    let last = samples.len() - 1;

    (0..output_len)
        .map(|i| {
            let position = i as f64 * ratio;
            let index = (position.floor() as usize).min(last);
            let next = (index + 1).min(last);
            let fraction = (position - index as f64) as f32;
            samples[index] + (samples[next] - samples[index]) * fraction
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};
    use tempfile::tempdir;

    fn write_wav(path: &Path, channels: u16, sample_rate: u32, frames: &[i16]) {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for &s in frames {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_load_stereo_wav_downmixes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        // L = 0.5, R = 0.0 for 100 frames
        let frames: Vec<i16> = (0..100).flat_map(|_| [16384i16, 0]).collect();
        write_wav(&path, 2, 44100, &frames);

        let mono = load_mono(&path, 44100).unwrap();
        assert_eq!(mono.len(), 100);
        assert!(mono.iter().all(|s| (s - 0.25).abs() < 1e-3));
    }

    #[test]
    fn test_load_resamples_to_engine_rate() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("low.wav");
        write_wav(&path, 1, 22050, &vec![1000i16; 2205]);

        let mono = load_mono(&path, 44100).unwrap();
        assert_eq!(mono.len(), 4410);
    }

    #[test]
    fn test_missing_file() {
        let result = load_mono(Path::new("/no/such/sample.wav"), 44100);
        match result {
            Err(EngineError::SoundSourceUnavailable { reason, .. }) => {
                assert!(reason.contains("not found"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.wav");
        std::fs::write(&path, b"definitely not RIFF data").unwrap();

        let result = load_mono(&path, 44100);
        assert!(matches!(
            result,
            Err(EngineError::SoundSourceUnavailable { .. })
        ));
    }

    #[test]
    fn test_unsupported_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.xyz");
        std::fs::write(&path, b"plain text").unwrap();

        match load_mono(&path, 44100) {
            Err(EngineError::SoundSourceUnavailable { reason, .. }) => {
                assert!(reason.contains("Unsupported"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_resample_linear_interpolates() {
        let up = resample_linear(&[0.0, 1.0], 1, 2);
        assert_eq!(up.len(), 4);
        assert_eq!(up[0], 0.0);
        assert_eq!(up[1], 0.5);
        assert_eq!(up[2], 1.0);

        let same = resample_linear(&[0.1, 0.2, 0.3], 44100, 44100);
        assert_eq!(same, vec![0.1, 0.2, 0.3]);
    }
}
