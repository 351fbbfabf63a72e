//! # yun-stream
//!
//! Yun MPEG 音频框架的流同步与 PCM 组装层.
//!
//! 位于原始字节流 (文件/网络) 与不透明的帧解码引擎之间:
//!
//! ```text
//! 原始字节 → 同步器 (定位首帧) → 帧解码引擎 (增量驱动)
//!          → 头部状态跟踪 (格式事实) → PCM 组装缓冲 (累积 + 修剪)
//!          → 消费方按窗口拉取 → WAV 写出
//! ```
//!
//! 职责划分:
//! - [`sync`] 在不可信的字节流里定位第一个有效帧边界 (跳过 ID3v2,
//!   专辑 ID 块, 逐字节滑动做位模式检查)
//! - [`session`] 增量驱动引擎, 调和三种总采样数认知 (VBR 头声明 /
//!   文件大小估算 / 未知), 检测格式漂移
//! - [`pcm`] 跨调用累积解码产出, 剥除编码器前后端的延迟/填充采样
//! - [`wav`] 规范 PCM 容器写出, 占位-回填协议
//! - [`icy`] 周期交错元数据流装饰器 (独立组件)

pub mod icy;
pub mod io;
pub mod pcm;
pub mod session;
pub mod sync;
pub mod wav;

// 重导出常用类型
pub use icy::{IcyTransport, MetadataSink};
pub use io::{FileTransport, MemoryTransport, StreamIo, Transport};
pub use pcm::{PcmBuffer, SkipWindow};
pub use session::{DecodeSession, FrameFormat, MAX_FRAME_SAMPLES, TotalSamples};
pub use sync::{SyncOutcome, locate_first_frame};
pub use wav::WavWriter;

#[cfg(feature = "http")]
pub use icy::open_icy_url;
