//! Lock-free ring buffer for the capture path
//!
//! The cpal audio callback must not allocate or take locks, so samples flow
//! from the callback to the collector through a pre-allocated single-producer
//! single-consumer ring buffer with atomic cursors.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A lock-free SPSC ring buffer of i16 PCM samples.
///
/// One writer (the audio callback) and one reader (the collector thread).
/// The atomic read/write cursors guarantee the two sides never touch the
/// same slots at the same time; one slot is kept empty to distinguish a
/// full buffer from an empty one.
pub struct PcmRingBuffer {
    buffer: UnsafeCell<Box<[i16]>>,
    write_pos: AtomicUsize,
    read_pos: AtomicUsize,
}

// Safety: SPSC discipline plus acquire/release cursor ordering. The writer
// only advances write_pos after its samples are stored; the reader only
// advances read_pos after its samples are loaded.
unsafe impl Send for PcmRingBuffer {}
unsafe impl Sync for PcmRingBuffer {}

impl PcmRingBuffer {
    /// Create a buffer holding up to `capacity - 1` samples.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            buffer: UnsafeCell::new(vec![0i16; capacity].into_boxed_slice()),
            write_pos: AtomicUsize::new(0),
            read_pos: AtomicUsize::new(0),
        }
    }

    /// Sized for roughly `seconds` of audio at `sample_rate` x `channels`.
    pub fn for_capture(sample_rate: u32, channels: u16, seconds: u32) -> Self {
        Self::new((sample_rate as usize * channels as usize * seconds as usize).max(2))
    }

    fn slots(&self) -> usize {
        // Safety: the slice length never changes after construction.
        unsafe { (&(*self.buffer.get())).len() }
    }

    /// Total sample capacity.
    pub fn capacity(&self) -> usize {
        self.slots() - 1
    }

    /// Number of samples currently readable.
    pub fn available(&self) -> usize {
        let write = self.write_pos.load(Ordering::Acquire);
        let read = self.read_pos.load(Ordering::Acquire);
        let slots = self.slots();

        if write >= read {
            write - read
        } else {
            slots - read + write
        }
    }

    /// Write samples from the audio callback. Lock-free, never allocates.
    ///
    /// Returns how many samples were written; fewer than requested means
    /// the reader fell behind and the rest were dropped.
    pub fn write(&self, samples: &[i16]) -> usize {
        let write = self.write_pos.load(Ordering::Acquire);
        let read = self.read_pos.load(Ordering::Acquire);
        let slots = self.slots();

        let free = if write >= read {
            slots - (write - read) - 1
        } else {
            read - write - 1
        };

        let to_write = samples.len().min(free);
        if to_write == 0 {
            return 0;
        }

        let buffer_ptr = self.buffer.get();
        for (i, &sample) in samples.iter().enumerate().take(to_write) {
            // Safety: slots in [write, write + to_write) are free and only
            // the single producer writes them.
            unsafe {
                (*buffer_ptr)[(write + i) % slots] = sample;
            }
        }

        self.write_pos
            .store((write + to_write) % slots, Ordering::Release);
        to_write
    }

    /// Read up to `output.len()` samples into `output`.
    ///
    /// Returns how many samples were read.
    pub fn read(&self, output: &mut [i16]) -> usize {
        let write = self.write_pos.load(Ordering::Acquire);
        let read = self.read_pos.load(Ordering::Acquire);
        let slots = self.slots();

        let available = if write >= read {
            write - read
        } else {
            slots - read + write
        };

        let to_read = output.len().min(available);
        if to_read == 0 {
            return 0;
        }

        let buffer_ptr = self.buffer.get();
        for (i, sample) in output.iter_mut().enumerate().take(to_read) {
            // Safety: slots in [read, read + to_read) hold published samples
            // and only the single consumer reads them.
            *sample = unsafe { (*buffer_ptr)[(read + i) % slots] };
        }

        self.read_pos
            .store((read + to_read) % slots, Ordering::Release);
        to_read
    }

    /// Drop everything currently buffered.
    pub fn clear(&self) {
        self.read_pos
            .store(self.write_pos.load(Ordering::Acquire), Ordering::Release);
    }
}
