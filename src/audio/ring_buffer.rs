// SPSC frame ring buffer - decouples block rendering from the hardware pull
//
// Thin frame-oriented layer over `ringbuf`. One slot of the nominal capacity is
// reserved, so `available() + free_space() == capacity - 1` at all times.

use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

/// Writing half, owned by the rendering thread
pub struct RingProducer {
    inner: HeapProd<f32>,
    channels: usize,
}

/// Reading half, owned by the hardware callback
pub struct RingConsumer {
    inner: HeapCons<f32>,
    channels: usize,
}

/// Create a ring of `capacity` frames (at least 2) of `channels` interleaved samples
pub fn frame_ring(capacity: usize, channels: usize) -> (RingProducer, RingConsumer) {
    let capacity = capacity.max(2);
    let channels = channels.max(1);
    let rb = HeapRb::<f32>::new((capacity - 1) * channels);
    let (producer, consumer) = rb.split();
    (
        RingProducer {
            inner: producer,
            channels,
        },
        RingConsumer {
            inner: consumer,
            channels,
        },
    )
}

impl RingProducer {
    pub fn available(&self) -> usize {
        self.inner.occupied_len() / self.channels
    }

    pub fn free_space(&self) -> usize {
        self.inner.vacant_len() / self.channels
    }

    /// Push whole interleaved frames; frames that do not fit are dropped
    pub fn push(&mut self, src: &[f32]) -> usize {
        let frames = (src.len() / self.channels).min(self.free_space());
        let written = self.inner.push_slice(&src[..frames * self.channels]);
        written / self.channels
    }
}

impl RingConsumer {
    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn available(&self) -> usize {
        self.inner.occupied_len() / self.channels
    }

    pub fn free_space(&self) -> usize {
        self.inner.vacant_len() / self.channels
    }

    /// Fill exactly `frames_wanted` frames of `dst`, zero padding any shortfall.
    /// Returns the number of frames that came from the ring.
    pub fn pop(&mut self, dst: &mut [f32], frames_wanted: usize) -> usize {
        let frames_wanted = frames_wanted.min(dst.len() / self.channels);
        let frames = frames_wanted.min(self.available());
        let read = self.inner.pop_slice(&mut dst[..frames * self.channels]) / self.channels;
        dst[read * self.channels..frames_wanted * self.channels].fill(0.0);
        read
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_empty_ring() {
        let (producer, consumer) = frame_ring(8, 2);
        assert_eq!(producer.available(), 0);
        assert_eq!(producer.free_space(), 7);
        assert_eq!(consumer.available(), 0);
        assert_eq!(consumer.free_space(), 7);
    }

    #[test]
    fn test_push_drops_overflow() {
        let (mut producer, consumer) = frame_ring(4, 1);
        assert_eq!(producer.push(&[1.0, 2.0, 3.0, 4.0, 5.0]), 3);
        assert_eq!(consumer.available(), 3);
        assert_eq!(producer.free_space(), 0);
        assert_eq!(producer.push(&[6.0]), 0);
    }

    #[test]
    fn test_pop_zero_pads() {
        let (mut producer, mut consumer) = frame_ring(8, 2);
        producer.push(&[0.1, 0.2, 0.3, 0.4]);

        let mut dst = [9.0f32; 8];
        assert_eq!(consumer.pop(&mut dst, 4), 2);
        assert_eq!(dst, [0.1, 0.2, 0.3, 0.4, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_partial_frames_are_ignored() {
        let (mut producer, consumer) = frame_ring(8, 2);
        assert_eq!(producer.push(&[0.1, 0.2, 0.3]), 1);
        assert_eq!(consumer.available(), 1);
    }

    #[test]
    fn test_invariant_holds_for_random_sequences() {
        let mut rng = StdRng::seed_from_u64(7);
        for capacity in [2usize, 3, 17, 256] {
            let (mut producer, mut consumer) = frame_ring(capacity, 2);
            let source = vec![0.5f32; capacity * 4];
            let mut dst = vec![0.0f32; capacity * 4];
            let mut expected = 0usize;

            for _ in 0..500 {
                if rng.gen_bool(0.5) {
                    let frames = rng.gen_range(0..capacity * 2);
                    let written = producer.push(&source[..frames * 2]);
                    assert!(written <= frames);
                    expected += written;
                } else {
                    let frames = rng.gen_range(0..capacity * 2);
                    let read = consumer.pop(&mut dst, frames);
                    assert_eq!(read, frames.min(expected));
                    assert!(dst[read * 2..frames * 2].iter().all(|&s| s == 0.0));
                    expected -= read;
                }

                assert_eq!(consumer.available(), expected);
                assert_eq!(producer.available() + producer.free_space(), capacity - 1);
                assert_eq!(consumer.available() + consumer.free_space(), capacity - 1);
            }
        }
    }
}
