//! 基于 symphonia 的 MPEG 音频帧解码器适配.
//!
//! 把 symphonia 的按包解码接口适配成增量字节流契约: 内部缓冲未消费的
//! 输入, 自行切出完整帧喂给引擎, 并在每次调用后维护侧信道状态
//! (头部三态, 帧大小, VBR 帧数, LAME gapless 延迟/填充).
//!
//! 自由格式流不在本适配器支持范围内 (帧长无法由头部算出, 引擎也不做
//! 自由格式探测); 同步层仍会接受这类流, 换一个支持的引擎即可.

use log::debug;
use symphonia_bundle_mp3::MpaDecoder as SymMpaDecoder;
use symphonia_core::audio::SampleBuffer;
use symphonia_core::codecs::{
    CODEC_TYPE_MP3, CodecParameters as SymCodecParameters, Decoder as SymDecoderTrait,
    DecoderOptions as SymDecoderOptions,
};
use symphonia_core::formats::Packet as SymPacket;
use yun_core::{YunError, YunResult};

use crate::decoder::{DecodeOutcome, DecoderState, FrameDecoder};
use crate::header::{ChannelMode, FrameHeader, MpegVersion};

/// VBR 头 (Xing/Info/VBRI) 与 LAME gapless 扩展的解析结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VbrTag {
    /// 声明的总帧数
    pub frame_count: Option<u64>,
    /// 编码器前置延迟 (每声道采样数)
    pub encoder_delay: Option<u32>,
    /// 编码器尾部填充 (每声道采样数)
    pub encoder_padding: Option<u32>,
}

/// 在首帧数据中解析 Xing/Info 或 VBRI 头.
///
/// Xing/Info 头的偏移取决于版本和声道; LAME 扩展紧随 Xing 可选字段,
/// delay/padding 各 12 bit 打包在扩展区第 21-23 字节:
/// ```text
/// encoder_delay   = (d[0] << 4) | (d[1] >> 4)
/// encoder_padding = ((d[1] & 0xF) << 8) | d[2]
/// ```
/// 仅当两值都在合理范围内 (<= 2880) 且至少一个非零才接受.
/// VBRI 头固定在帧头后 32 字节处.
pub fn parse_vbr_tag(fh: &FrameHeader, frame: &[u8]) -> Option<VbrTag> {
    let xing_offset = match (fh.version, fh.mode) {
        (MpegVersion::Mpeg1, ChannelMode::SingleChannel) => 17,
        (MpegVersion::Mpeg1, _) => 32,
        (_, ChannelMode::SingleChannel) => 9,
        (_, _) => 17,
    };

    let mut pos = 4 + xing_offset;
    if frame.len() >= pos + 8 && (&frame[pos..pos + 4] == b"Xing" || &frame[pos..pos + 4] == b"Info") {
        let flags = u32::from_be_bytes([frame[pos + 4], frame[pos + 5], frame[pos + 6], frame[pos + 7]]);
        pos += 8;

        // 可选字段: frames(4), bytes(4), toc(100), quality(4)
        let mut frame_count = None;
        if flags & 0x1 != 0 {
            if frame.len() < pos + 4 {
                return Some(VbrTag::default());
            }
            let n = u32::from_be_bytes([frame[pos], frame[pos + 1], frame[pos + 2], frame[pos + 3]]);
            if n > 0 {
                frame_count = Some(u64::from(n));
            }
            pos += 4;
        }
        if flags & 0x2 != 0 {
            pos += 4;
        }
        if flags & 0x4 != 0 {
            pos += 100;
        }
        if flags & 0x8 != 0 {
            pos += 4;
        }

        // LAME/Lavc 扩展: 9 字节版本串 + gapless 信息, 共读 24 字节
        let mut tag = VbrTag {
            frame_count,
            ..VbrTag::default()
        };
        if frame.len() >= pos + 24 {
            let d = &frame[pos + 21..pos + 24];
            let delay = (u32::from(d[0]) << 4) | (u32::from(d[1]) >> 4);
            let padding = ((u32::from(d[1]) & 0xF) << 8) | u32::from(d[2]);
            if delay <= 2880 && padding <= 2880 && (delay > 0 || padding > 0) {
                debug!(
                    "MPA: 发现编码器扩展头 ({:?}), delay={delay}, padding={padding}",
                    std::str::from_utf8(&frame[pos..pos + 4]).unwrap_or("?")
                );
                tag.encoder_delay = Some(delay);
                tag.encoder_padding = Some(padding);
            }
        }
        return Some(tag);
    }

    // VBRI 头 (固定在帧头 + 32 字节处)
    let vbri = 4 + 32;
    if frame.len() >= vbri + 18 && &frame[vbri..vbri + 4] == b"VBRI" {
        let n = u32::from_be_bytes([
            frame[vbri + 14],
            frame[vbri + 15],
            frame[vbri + 16],
            frame[vbri + 17],
        ]);
        return Some(VbrTag {
            frame_count: (n > 0).then_some(u64::from(n)),
            ..VbrTag::default()
        });
    }

    None
}

/// symphonia MPEG 音频帧解码器
pub struct MpaFrameDecoder {
    /// 未消费的输入码流
    input: Vec<u8>,
    /// 侧信道状态
    state: DecoderState,
    /// symphonia 解码器实例
    sym: SymMpaDecoder,
    /// 首帧 VBR 头检测是否已完成
    vbr_checked: bool,
}

impl MpaFrameDecoder {
    /// 创建解码器实例
    pub fn new() -> YunResult<Self> {
        let params = SymCodecParameters {
            codec: CODEC_TYPE_MP3,
            ..Default::default()
        };
        let sym = SymMpaDecoder::try_new(&params, &SymDecoderOptions::default())
            .map_err(|e| YunError::Codec(format!("symphonia 初始化失败: {e}")))?;
        Ok(Self {
            input: Vec::with_capacity(4096),
            state: DecoderState::default(),
            sym,
            vbr_checked: false,
        })
    }

    /// 查找同步字 (0xFF + 高 3 位全 1), 返回偏移
    fn find_sync_word(data: &[u8]) -> Option<usize> {
        if data.len() < 2 {
            return None;
        }
        (0..data.len() - 1).find(|&i| data[i] == 0xFF && (data[i + 1] & 0xE0) == 0xE0)
    }

    /// 把帧头事实写入侧信道
    fn record_header(&mut self, fh: &FrameHeader) {
        self.state.header_parsed = true;
        self.state.version = Some(fh.version);
        self.state.layer = Some(fh.layer);
        self.state.mode = Some(fh.mode);
        self.state.sample_rate_index = fh.sample_rate_index;
        self.state.bitrate_index = fh.bitrate_index;
    }
}

impl FrameDecoder for MpaFrameDecoder {
    fn name(&self) -> &str {
        "mpa-symphonia"
    }

    fn decode(&mut self, input: &[u8], output: &mut [i16]) -> YunResult<DecodeOutcome> {
        self.input.extend_from_slice(input);

        loop {
            // 1. 同步: 丢弃帧边界前的垃圾字节
            match Self::find_sync_word(&self.input) {
                Some(0) => {}
                Some(off) => {
                    self.input.drain(..off);
                }
                None => {
                    // 留最后 1 字节, 同步字可能跨调用边界
                    if self.input.len() > 1 {
                        let keep = self.input.len() - 1;
                        self.input.drain(..keep);
                    }
                    return Ok(DecodeOutcome::NeedMoreData);
                }
            }

            // 2. 帧头 4 字节
            if self.input.len() < 4 {
                return Ok(DecodeOutcome::NeedMoreData);
            }
            let header_val = u32::from_be_bytes([
                self.input[0],
                self.input[1],
                self.input[2],
                self.input[3],
            ]);
            let Some(fh) = FrameHeader::parse(header_val) else {
                // 伪同步, 滑动 1 字节重试
                self.input.drain(..1);
                continue;
            };

            self.record_header(&fh);

            if fh.is_free_format() {
                return Err(YunError::Unsupported(
                    "自由格式流需要支持帧长实测的解码引擎".into(),
                ));
            }

            // 3. 等待完整帧
            if self.input.len() < fh.frame_size {
                return Ok(DecodeOutcome::NeedMoreData);
            }
            self.state.frame_size = fh.samples_per_frame as usize;

            // 4. 首帧检查 Xing/Info/VBRI; 标签帧本身不含音频, 跳过
            if !self.vbr_checked {
                self.vbr_checked = true;
                if let Some(tag) = parse_vbr_tag(&fh, &self.input[..fh.frame_size]) {
                    debug!(
                        "MPA: 发现 VBR 头, frames={:?}, delay={:?}, padding={:?}",
                        tag.frame_count, tag.encoder_delay, tag.encoder_padding
                    );
                    self.state.vbr_frame_count = tag.frame_count;
                    self.state.encoder_delay = tag.encoder_delay;
                    self.state.encoder_padding = tag.encoder_padding;
                    self.input.drain(..fh.frame_size);
                    continue;
                }
            }

            // 5. 整帧送入引擎
            let frame_bytes = fh.frame_size;
            let pkt = SymPacket::new_from_slice(
                0,
                0,
                u64::from(fh.samples_per_frame),
                &self.input[..frame_bytes],
            );
            let decoded = self
                .sym
                .decode(&pkt)
                .map_err(|e| YunError::Codec(format!("帧解码失败: {e}")))?;

            let spec = *decoded.spec();
            let mut sample_buf = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);
            let samples = sample_buf.samples();
            if samples.len() > output.len() {
                return Err(YunError::Internal(format!(
                    "PCM 输出缓冲区不足: 需要 {}, 只有 {}",
                    samples.len(),
                    output.len()
                )));
            }
            output[..samples.len()].copy_from_slice(samples);

            self.state.prev_frame_size = frame_bytes;
            self.input.drain(..frame_bytes);
            return Ok(DecodeOutcome::Produced(samples.len()));
        }
    }

    fn state(&self) -> &DecoderState {
        &self.state
    }

    fn reset(&mut self) {
        self.input.clear();
        self.state = DecoderState::default();
        self.vbr_checked = false;
        self.sym.reset();
    }
}
