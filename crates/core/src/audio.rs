//! Audio backend contract.
//!
//! Tone generators in this workspace do not synthesize samples. They work out
//! a target frequency per channel and hand it to whatever backend the frontend
//! attached.

/// Receiver for per-channel tone frequency changes.
pub trait AudioBackend {
    /// Set the frequency of a channel in Hz (0 = silent)
    fn set_frequency(&mut self, channel: usize, hz: u32);
}

/// Backend that discards every change. Default for headless runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentAudio;

impl AudioBackend for SilentAudio {
    fn set_frequency(&mut self, _channel: usize, _hz: u32) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_audio_as_trait_object() {
        let mut backend: Box<dyn AudioBackend> = Box::new(SilentAudio);
        for channel in 0..4 {
            backend.set_frequency(channel, 440);
            backend.set_frequency(channel, 0);
        }
    }
}
