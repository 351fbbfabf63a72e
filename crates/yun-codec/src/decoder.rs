//! 帧解码器能力接口定义.
//!
//! 帧解码器是一个不透明的外部能力: 吞入原始字节, 吐出解码后的交错 PCM,
//! 并在每次调用后暴露只读的头部侧信道状态. 任何满足此契约的具体引擎
//! (内置的 symphonia 适配器, 或外部引擎) 都可以互换使用.
//!
//! 一次 `decode` 调用的三种结局:
//! 1. 头部已识别但数据不完整 → `Ok(NeedMoreData)`, 侧信道已更新
//! 2. 完整解出一帧 → `Ok(Produced(n))`, n 为写入输出的交错采样数
//! 3. 引擎错误 → `Err(YunError::Codec)`, 本会话致命

use yun_core::YunResult;

use crate::header::{ChannelMode, MpegLayer, MpegVersion, SAMPLE_RATE_HZ};

/// 单次解码调用的产出
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// 需要更多输入才能产出采样
    NeedMoreData,
    /// 产出了 n 个交错采样 (已乘声道数)
    Produced(usize),
}

/// 解码器侧信道状态 (每次 `decode` 调用后有效)
///
/// 头部识别, 帧大小确定与整帧解码完成发生在不同的调用上, 因此
/// "头部已解析" 是三态联合判断: `header_parsed` 为真, 或当前/上一帧
/// 大小非零 (见会话层的跟踪规则).
///
/// 原实现用 -1 表示 "编码器延迟/填充未知", 0 表示 "无 VBR 帧数";
/// 这里统一改为 `Option`, 杜绝哨兵值被当成有效值误用.
#[derive(Debug, Clone, Default)]
pub struct DecoderState {
    /// 最近一次调用是否解析出了帧头
    pub header_parsed: bool,
    /// 当前帧每声道采样数 (0 = 尚无完整帧)
    pub frame_size: usize,
    /// 上一完整帧的字节数 (0 = 尚无)
    pub prev_frame_size: usize,
    /// MPEG 版本
    pub version: Option<MpegVersion>,
    /// 层
    pub layer: Option<MpegLayer>,
    /// 声道模式
    pub mode: Option<ChannelMode>,
    /// 折叠采样率索引 (0-8)
    pub sample_rate_index: usize,
    /// 比特率索引 (0 = 自由格式)
    pub bitrate_index: usize,
    /// VBR 头声明的总帧数
    pub vbr_frame_count: Option<u64>,
    /// 编码器前置延迟 (每声道采样数)
    pub encoder_delay: Option<u32>,
    /// 编码器尾部填充 (每声道采样数)
    pub encoder_padding: Option<u32>,
}

impl DecoderState {
    /// 声道数 (头部未解析时为 0)
    pub fn channels(&self) -> u32 {
        self.mode.map_or(0, ChannelMode::channels)
    }

    /// 采样率 (Hz)
    pub fn sample_rate(&self) -> u32 {
        SAMPLE_RATE_HZ[self.sample_rate_index]
    }
}

/// 帧解码器能力
///
/// 窄接口: 一个调用, 一种产出, 外加只读侧信道. 不继承, 不扩展.
pub trait FrameDecoder: Send {
    /// 解码器名称
    fn name(&self) -> &str;

    /// 吞入 `input` 中的字节, 尝试向 `output` 写入解码后的交错 PCM.
    ///
    /// `input` 可以为空 (流末尾的冲刷调用, 给引擎一次吐出缓冲数据的机会).
    /// 产出的采样数不会超过 `output.len()`.
    fn decode(&mut self, input: &[u8], output: &mut [i16]) -> YunResult<DecodeOutcome>;

    /// 只读侧信道状态
    fn state(&self) -> &DecoderState;

    /// 重置引擎内部状态, 丢弃全部缓冲
    fn reset(&mut self);
}
