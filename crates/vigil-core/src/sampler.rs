use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
#[error("sampling interval must be at least 1, got {0}")]
pub struct SamplerError(pub u32);

/// Decides which frames go through full classification: 1 of every `every`.
///
/// The first frame is always classified. Frames in between reuse the last
/// result.
#[derive(Debug, Clone)]
pub struct FrameSampler {
    every: u32,
    frame_count: u64,
}

impl FrameSampler {
    pub fn new(every: u32) -> Result<Self, SamplerError> {
        if every == 0 {
            return Err(SamplerError(every));
        }
        Ok(Self {
            every,
            frame_count: 0,
        })
    }

    /// Advance by one frame; true if this frame should be classified.
    pub fn tick(&mut self) -> bool {
        let classify = self.frame_count % u64::from(self.every) == 0;
        self.frame_count += 1;
        classify
    }

    pub fn every(&self) -> u32 {
        self.every
    }
}
