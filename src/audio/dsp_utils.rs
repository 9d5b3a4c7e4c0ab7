// DSP utilities - output hygiene for the real-time mix
//
// Everything here is allocation-free and safe to call from the audio callback.

/// Flush denormals to zero
///
/// Decaying sample tails produce tiny values that some CPUs process very slowly.
/// Threshold: 1e-15, far below 32-bit float noise.
#[inline]
pub fn flush_denormals_to_zero(x: f32) -> f32 {
    if x.abs() < 1e-15 { 0.0 } else { x }
}

/// Soft clipping with tanh
///
/// Odd-symmetric and monotonic, close to identity near 0, compressive above ~0.5
/// and bounded by 1 for any finite input.
#[inline]
pub fn soft_clip(x: f32) -> f32 {
    x.tanh()
}

/// Soft clip a whole bus in place
#[inline]
pub fn soft_clip_slice(samples: &mut [f32]) {
    for sample in samples.iter_mut() {
        *sample = soft_clip(flush_denormals_to_zero(*sample));
    }
}
