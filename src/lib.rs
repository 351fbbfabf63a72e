//! # Yun (韵)
//!
//! 纯 Rust 实现的 MPEG 音频流同步与 PCM 组装层.
//!
//! Yun 位于原始字节流与不透明的帧解码引擎之间, 负责:
//! - **同步**: 在带未知长度前导 (ID3v2 标签, 专辑 ID 块) 的不可信
//!   字节流里定位第一个有效的 MPEG 帧边界
//! - **增量驱动**: 按字节块喂入帧解码引擎, 跟踪头部侧信道状态
//!   (声道/采样率/比特率, 含自由格式的实测推导)
//! - **总长调和**: VBR 头声明, 文件大小估算, 未知三种认知统一表达
//! - **PCM 组装**: 跨调用累积解码产出, 剥除编码器前后端的
//!   延迟/填充采样, 绝不产出负长度或乱序数据
//! - **WAV 写出**: 规范 PCM 容器, 占位-回填大小字段
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use yun::stream::{DecodeSession, StreamIo, WavWriter};
//! use yun::codec::decoders::MpaFrameDecoder;
//!
//! # fn main() -> yun::core::YunResult<()> {
//! let mut input = StreamIo::open_read("input.mp3")?;
//! let decoder = Box::new(MpaFrameDecoder::new()?);
//! let mut session = DecodeSession::open(&mut input, decoder)?;
//!
//! let format = session.format().clone();
//! let mut output = StreamIo::open_write("output.wav")?;
//! let mut wav = WavWriter::new(format.channels, format.sample_rate)?;
//! wav.write_header(&mut output)?;
//!
//! let mut buf = vec![0i16; yun::stream::MAX_FRAME_SAMPLES];
//! loop {
//!     let n = session.read_samples(&mut input, &mut buf)?;
//!     if n == 0 {
//!         break;
//!     }
//!     wav.write_samples(&mut output, &buf[..n])?;
//! }
//! wav.finalize(&mut output)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `yun-core` | 错误类型与字段编解码原语 |
//! | `yun-codec` | 帧解码能力边界与 MPEG 头部事实 |
//! | `yun-stream` | 同步器, 解码会话, PCM 缓冲, WAV 写出 |

/// 核心类型与工具
pub use yun_core as core;

/// 帧解码能力层
pub use yun_codec as codec;

/// 流同步与 PCM 组装层
pub use yun_stream as stream;

/// 获取 Yun 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
