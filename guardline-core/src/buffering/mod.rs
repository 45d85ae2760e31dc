//! Lock-free SPSC ring buffer for PCM16 call audio.
//!
//! The external capture collaborator holds the producer half and pushes
//! fixed-size chunks from its own thread; `ringbuf::HeapRb<i16>` gives it
//! a wait-free `push_slice`. The decode pipeline holds the consumer half.

pub mod window;

use ringbuf::{traits::Split, HeapRb};

pub use ringbuf::traits::{Consumer, Producer};

/// Type alias for the producer half — held by the capture collaborator.
pub type PcmProducer = ringbuf::HeapProd<i16>;

/// Type alias for the consumer half — held by the pipeline thread.
pub type PcmConsumer = ringbuf::HeapCons<i16>;

/// Buffer capacity: 2^21 = 2 097 152 samples ≈ 131 s at 16 kHz.
/// Protects long calls from producer drops while a window infers.
pub const RING_CAPACITY: usize = 1 << 21;

/// Create a matched producer/consumer pair backed by a heap-allocated ring buffer.
pub fn create_pcm_ring() -> (PcmProducer, PcmConsumer) {
    HeapRb::<i16>::new(RING_CAPACITY).split()
}
