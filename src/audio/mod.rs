// Audio module - PCM acquisition and sample buffering

pub mod audit;
pub mod device;
pub mod ring;
pub mod source;
pub mod wav;

// Re-export commonly used types for convenience
pub use audit::AuditRecorder;
pub use device::{list_input_devices, LiveDevice, DEFAULT_DEVICE};
pub use ring::SampleRing;
pub use source::{pcm_to_float, AcquisitionSource, PCM_NORM};
pub use wav::FileSource;
