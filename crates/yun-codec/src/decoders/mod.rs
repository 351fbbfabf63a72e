//! 内置帧解码器实现.

#[cfg(feature = "symphonia-backend")]
pub mod mpa;

#[cfg(feature = "symphonia-backend")]
pub use mpa::MpaFrameDecoder;
