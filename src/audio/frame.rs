/// One decoded audio frame tagged with its speaker.
///
/// Frames arrive from the voice transport already demultiplexed by SSRC;
/// the recorder only needs the participant tag and the raw samples.
#[derive(Debug, Clone)]
pub struct TaggedFrame {
    /// Participant the transport attributed this frame to
    pub participant_id: String,
    /// Raw samples (i16 PCM, interleaved)
    pub pcm: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Approximate offset from session start, in milliseconds
    pub offset_ms: u64,
}

impl TaggedFrame {
    /// Size of this frame's payload on disk (16-bit samples)
    pub fn byte_len(&self) -> u64 {
        (self.pcm.len() * 2) as u64
    }
}
