/// A fixed-size frame buffer handed back and forth between recorder and driver.
///
/// Ownership is the protocol: while the driver holds a `CaptureBuffer` it is
/// being filled, and once it comes back through the buffer-queue callback the
/// recorder is free to drain it. A buffer cannot be in both places at once.
#[derive(Debug)]
pub struct CaptureBuffer {
    index: usize,
    channels: u16,
    samples: Vec<i16>,
    frames: usize,
}

impl CaptureBuffer {
    /// Allocate a zeroed buffer holding `frames_per_buffer` frames.
    pub fn new(index: usize, frames_per_buffer: usize, channels: u16) -> Self {
        Self {
            index,
            channels,
            samples: vec![0; frames_per_buffer * channels as usize],
            frames: 0,
        }
    }

    /// Slot index of this buffer within its pool.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Capacity in frames.
    pub fn capacity_frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    /// Frames filled by the driver.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Capacity in bytes of 16-bit samples.
    pub fn byte_capacity(&self) -> usize {
        self.samples.len() * 2
    }

    /// The filled portion of the buffer, interleaved.
    pub fn filled(&self) -> &[i16] {
        &self.samples[..self.frames * self.channels as usize]
    }

    /// Whole backing storage, for drivers writing into the buffer.
    pub fn as_mut_slice(&mut self) -> &mut [i16] {
        &mut self.samples
    }

    /// Record how many frames the driver wrote. Clamped to capacity.
    pub fn set_frames(&mut self, frames: usize) {
        self.frames = frames.min(self.capacity_frames());
    }

    /// Forget previously filled frames before handing the buffer to a driver.
    pub fn reset(&mut self) {
        self.frames = 0;
    }
}

/// Free buffers owned by the recorder, waiting to be enqueued.
#[derive(Debug, Default)]
pub struct BufferPool {
    free: Vec<CaptureBuffer>,
}

impl BufferPool {
    /// Allocate `count` buffers sized for `frames_per_buffer` frames.
    pub fn allocate(count: usize, frames_per_buffer: usize, channels: u16) -> Self {
        Self {
            free: (0..count)
                .map(|index| CaptureBuffer::new(index, frames_per_buffer, channels))
                .collect(),
        }
    }

    /// Take the lowest-index free buffer.
    pub fn take(&mut self) -> Option<CaptureBuffer> {
        let pos = self
            .free
            .iter()
            .enumerate()
            .min_by_key(|(_, buffer)| buffer.index())
            .map(|(pos, _)| pos)?;
        let mut buffer = self.free.swap_remove(pos);
        buffer.reset();
        Some(buffer)
    }

    pub fn give_back(&mut self, buffer: CaptureBuffer) {
        self.free.push(buffer);
    }

    pub fn extend(&mut self, buffers: impl IntoIterator<Item = CaptureBuffer>) {
        self.free.extend(buffers);
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn clear(&mut self) {
        self.free.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_follow_frames_and_channels() {
        let buffer = CaptureBuffer::new(0, 441, 2);
        assert_eq!(buffer.capacity_frames(), 441);
        assert_eq!(buffer.byte_capacity(), 441 * 2 * 2);
        assert!(buffer.filled().is_empty());
    }

    #[test]
    fn set_frames_clamps_to_capacity() {
        let mut buffer = CaptureBuffer::new(1, 160, 1);
        buffer.set_frames(500);
        assert_eq!(buffer.frames(), 160);
        assert_eq!(buffer.filled().len(), 160);
    }

    #[test]
    fn pool_hands_out_lowest_index_first() {
        let mut pool = BufferPool::allocate(2, 160, 1);
        let first = pool.take().unwrap();
        let second = pool.take().unwrap();
        assert_eq!((first.index(), second.index()), (0, 1));
        assert!(pool.take().is_none());

        pool.give_back(second);
        pool.give_back(first);
        assert_eq!(pool.free_count(), 2);
        assert_eq!(pool.take().unwrap().index(), 0);
    }

    #[test]
    fn taken_buffers_are_reset() {
        let mut pool = BufferPool::allocate(1, 160, 1);
        let mut buffer = pool.take().unwrap();
        buffer.set_frames(160);
        pool.give_back(buffer);
        assert_eq!(pool.take().unwrap().frames(), 0);
    }
}
