// Format conversion between the engine's bus layout and output layouts
//
// The engine renders one mono bus per configured channel. Devices and export
// files have their own channel counts, so buses are folded onto them:
// - device: a single bus feeds every channel, otherwise bus i goes to channel
//   i % width and a mono device gets the sum
// - export: a single bus feeds both sides, otherwise bus i goes to side i % 2
// Whenever several buses share an output channel the sum is soft clipped again.
//
// All conversions are allocation-free and suitable for real-time audio callbacks.

use cpal::{FromSample, Sample};

use crate::audio::dsp_utils::soft_clip;

/// Convert f32 sample to i16
///
/// Maps [-1.0, 1.0] to [i16::MIN, i16::MAX], clamping values outside the range
#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    let clamped = sample.clamp(-1.0, 1.0);

    if clamped >= 0.0 {
        (clamped * i16::MAX as f32) as i16
    } else {
        (clamped * -(i16::MIN as f32)) as i16
    }
}

/// Sum of every bus that lands on `channel` of a `width`-channel output
#[inline]
pub fn fold_buses(bus_frame: &[f32], channel: usize, width: usize) -> f32 {
    let mut sum = 0.0;
    let mut count = 0;
    for sample in bus_frame.iter().skip(channel).step_by(width.max(1)) {
        sum += sample;
        count += 1;
    }
    if count > 1 { soft_clip(sum) } else { sum }
}

/// Write one frame of buses into one interleaved device frame
#[inline]
pub fn write_bus_frame_to_interleaved_frame<T>(bus_frame: &[f32], output_frame: &mut [T])
where
    T: Sample + FromSample<f32>,
{
    if let [only] = bus_frame {
        output_frame.fill(Sample::from_sample::<f32>(*only));
        return;
    }
    let width = output_frame.len();
    for (channel, channel_sample) in output_frame.iter_mut().enumerate() {
        *channel_sample = Sample::from_sample::<f32>(fold_buses(bus_frame, channel, width));
    }
}

/// Fold one frame of buses to a stereo pair for export
#[inline]
pub fn fold_to_stereo(bus_frame: &[f32]) -> (f32, f32) {
    match bus_frame {
        [] => (0.0, 0.0),
        [only] => (*only, *only),
        _ => (fold_buses(bus_frame, 0, 2), fold_buses(bus_frame, 1, 2)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f32_to_i16_conversion() {
        assert_eq!(f32_to_i16(0.0), 0);
        assert_eq!(f32_to_i16(1.0), i16::MAX);
        assert_eq!(f32_to_i16(-1.0), i16::MIN);

        let mid = f32_to_i16(0.5);
        assert!(mid > 0 && mid < i16::MAX);

        // Out of range values are clamped
        assert_eq!(f32_to_i16(2.0), i16::MAX);
        assert_eq!(f32_to_i16(-2.0), i16::MIN);
    }

    #[test]
    fn test_buses_map_to_device_channels() {
        let mut output = [0.0f32; 2];
        write_bus_frame_to_interleaved_frame(&[0.25, -0.5], &mut output);
        assert_eq!(output, [0.25, -0.5]);

        // A single bus is centred, as in export
        write_bus_frame_to_interleaved_frame(&[0.25], &mut output);
        assert_eq!(output, [0.25, 0.25]);
        assert_eq!(fold_to_stereo(&[0.25]), (0.25, 0.25));

        let mut quad = [0.0f32; 4];
        write_bus_frame_to_interleaved_frame(&[-0.5], &mut quad);
        assert_eq!(quad, [-0.5; 4]);

        let mut mono = [0.0f32; 1];
        write_bus_frame_to_interleaved_frame(&[0.25], &mut mono);
        assert_eq!(mono, [0.25]);
    }

    #[test]
    fn test_extra_buses_fold_onto_device() {
        let mut output = [0.0f32; 2];
        write_bus_frame_to_interleaved_frame(&[0.1, 0.2, 0.3], &mut output);
        assert!((output[0] - (0.4f32).tanh()).abs() < 1e-6);
        assert_eq!(output[1], 0.2);

        let mut mono = [0.0f32; 1];
        write_bus_frame_to_interleaved_frame(&[0.1, 0.2], &mut mono);
        assert!((mono[0] - (0.3f32).tanh()).abs() < 1e-6);
    }

    #[test]
    fn test_integer_device_formats() {
        let mut output = [0i16; 2];
        write_bus_frame_to_interleaved_frame(&[0.5, -0.5], &mut output);
        assert!(output[0] > 0);
        assert!(output[1] < 0);
    }

    #[test]
    fn test_stereo_fold_for_export() {
        assert_eq!(fold_to_stereo(&[0.3]), (0.3, 0.3));
        assert_eq!(fold_to_stereo(&[0.3, -0.1]), (0.3, -0.1));
        let (left, right) = fold_to_stereo(&[0.3, -0.1, 0.2, 0.4]);
        assert!((left - 0.5f32.tanh()).abs() < 1e-6);
        assert!((right - 0.3f32.tanh()).abs() < 1e-6);
    }
}
