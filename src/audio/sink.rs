use crate::audio::TaggedFrame;

/// A stored frame with its arrival sequence number.
#[derive(Debug, Clone)]
pub struct StoredFrame {
    pub sequence: u64,
    pub offset_ms: u64,
    pub pcm: Vec<i16>,
}

/// Per-speaker frame accumulator.
///
/// Frames are appended in arrival order. Once sealed (at flush time) the
/// sink accepts no further writes: late frames are dropped and counted,
/// never merged into an already-persisted artifact.
#[derive(Debug)]
pub struct AudioSink {
    frames: Vec<StoredFrame>,
    sample_rate: u32,
    channels: u16,
    byte_len: u64,
    next_sequence: u64,
    sealed: bool,
    dropped: u64,
}

impl AudioSink {
    /// Create a sink using the format of the first frame seen
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            frames: Vec::new(),
            sample_rate,
            channels,
            byte_len: 0,
            next_sequence: 0,
            sealed: false,
            dropped: 0,
        }
    }

    /// Append a frame. Returns false (and counts a drop) if sealed.
    pub fn push(&mut self, frame: &TaggedFrame) -> bool {
        if self.sealed {
            self.dropped += 1;
            return false;
        }

        self.byte_len += frame.byte_len();
        self.frames.push(StoredFrame {
            sequence: self.next_sequence,
            offset_ms: frame.offset_ms,
            pcm: frame.pcm.clone(),
        });
        self.next_sequence += 1;
        true
    }

    /// Seal the sink; subsequent pushes are dropped
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn frames(&self) -> &[StoredFrame] {
        &self.frames
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn byte_len(&self) -> u64 {
        self.byte_len
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}
