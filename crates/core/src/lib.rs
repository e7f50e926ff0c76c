//! Core emulator primitives and traits.

pub mod audio;
pub mod cpu;
pub mod logging;
pub mod types {
    use serde::{Deserialize, Serialize};

    /// How a call to run one frame ended.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub enum FrameOutcome {
        /// The frame's cycle budget elapsed and devices were synchronized
        Frame,
        /// The executor reached the halt sentinel
        Halted,
        /// The executor reached one of the requested breakpoints
        Breakpoint(u16),
    }

    impl FrameOutcome {
        pub fn is_frame(self) -> bool {
            self == FrameOutcome::Frame
        }
    }
}

use serde_json::Value;

/// Description of a mount point (media slot) that a system supports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPointInfo {
    /// Unique identifier for this mount point (e.g., "Kernel", "Font")
    pub id: String,
    /// User-friendly name for display (e.g., "Kernel ROM")
    pub name: String,
    /// File extensions accepted by this mount point (e.g., ["bin", "rom"])
    pub extensions: Vec<String>,
    /// Whether this mount point is required for the system to function
    pub required: bool,
}

/// A high-level System trait tying components together.
pub trait System {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Reset to initial power-on state
    fn reset(&mut self);

    /// Emulate one frame's worth of cycles.
    fn step_frame(&mut self) -> Result<types::FrameOutcome, Self::Error>;

    /// Return a JSON-serializable save state.
    /// Note: Save states should NOT include ROM data.
    fn save_state(&self) -> Value;

    /// Load a JSON save state.
    /// Returns error if the state belongs to a different system or version.
    fn load_state(&mut self, v: &Value) -> Result<(), serde_json::Error>;

    /// Check if this system supports save/load state functionality
    fn supports_save_states(&self) -> bool {
        false
    }

    /// Get the list of mount points this system supports
    fn mount_points(&self) -> Vec<MountPointInfo>;

    /// Load media into a specific mount point
    fn mount(&mut self, mount_point_id: &str, data: &[u8]) -> Result<(), Self::Error>;

    /// Unload media from a specific mount point
    fn unmount(&mut self, mount_point_id: &str) -> Result<(), Self::Error>;

    /// Check if a mount point has media loaded
    fn is_mounted(&self, mount_point_id: &str) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::FrameOutcome;

    struct MockSystem {
        frames: u32,
    }

    impl System for MockSystem {
        type Error = std::convert::Infallible;

        fn reset(&mut self) {
            self.frames = 0;
        }

        fn step_frame(&mut self) -> Result<FrameOutcome, Self::Error> {
            self.frames += 1;
            Ok(FrameOutcome::Frame)
        }

        fn save_state(&self) -> serde_json::Value {
            serde_json::json!({"mock": true, "version": 1, "frames": self.frames})
        }

        fn load_state(&mut self, v: &serde_json::Value) -> Result<(), serde_json::Error> {
            self.frames = serde_json::from_value(v["frames"].clone())?;
            Ok(())
        }

        fn mount_points(&self) -> Vec<MountPointInfo> {
            vec![MountPointInfo {
                id: "test".to_string(),
                name: "Test Slot".to_string(),
                extensions: vec!["bin".to_string()],
                required: false,
            }]
        }

        fn mount(&mut self, _mount_point_id: &str, _data: &[u8]) -> Result<(), Self::Error> {
            Ok(())
        }

        fn unmount(&mut self, _mount_point_id: &str) -> Result<(), Self::Error> {
            Ok(())
        }

        fn is_mounted(&self, _mount_point_id: &str) -> bool {
            false
        }
    }

    #[test]
    fn mock_system_save_load_roundtrip() {
        let mut sys = MockSystem { frames: 0 };
        sys.step_frame().expect("frame");
        sys.step_frame().expect("frame");
        let v = sys.save_state();
        let s = serde_json::to_string(&v).expect("serialize");
        let v2: serde_json::Value = serde_json::from_str(&s).expect("deserialize");
        let mut sys2 = MockSystem { frames: 0 };
        assert!(sys2.load_state(&v2).is_ok());
        assert_eq!(sys2.frames, 2);
    }

    #[test]
    fn test_system_supports_save_states_default() {
        let sys = MockSystem { frames: 0 };
        assert!(!sys.supports_save_states());
        assert_eq!(sys.mount_points().len(), 1);
    }

    #[test]
    fn test_frame_outcome() {
        assert!(FrameOutcome::Frame.is_frame());
        assert!(!FrameOutcome::Halted.is_frame());
        assert!(!FrameOutcome::Breakpoint(0x1234).is_frame());

        let json = serde_json::to_string(&FrameOutcome::Breakpoint(0x10)).expect("serialize");
        let back: FrameOutcome = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, FrameOutcome::Breakpoint(0x10));
    }
}
