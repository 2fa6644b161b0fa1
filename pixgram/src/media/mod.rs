pub mod transcode;

pub use transcode::{target_dimensions, TranscodedImage, Transcoder};
