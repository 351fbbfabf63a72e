//! # yun-codec
//!
//! Yun MPEG 音频框架的帧解码能力层.
//!
//! 本 crate 定义帧解码器的能力边界 ([`FrameDecoder`]): 流层只通过这个
//! 窄接口驱动解码, 不关心引擎内部的 Huffman/IMDCT/合成滤波. 同时提供
//! 各层共用的 MPEG 帧头事实 (版本/层/声道模式/比特率表/帧大小).
//!
//! 启用默认的 `symphonia-backend` 特性后, 附带一个基于
//! symphonia-bundle-mp3 的具体引擎 [`decoders::MpaFrameDecoder`].

pub mod decoder;
pub mod decoders;
pub mod header;

// 重导出常用类型
pub use decoder::{DecodeOutcome, DecoderState, FrameDecoder};
pub use header::{ChannelMode, FrameHeader, MpegLayer, MpegVersion};
