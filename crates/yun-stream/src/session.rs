//! 解码会话.
//!
//! 单线程, 同步, 拉取式管线: 消费方反复调用 [`DecodeSession::read_samples`]
//! 拉取 PCM 窗口, 会话内部按需向帧解码引擎喂入字节块.
//!
//! 会话职责:
//! - 头部状态跟踪: 每次引擎调用后从侧信道推导声道数/采样率/比特率
//!   (自由格式要等整帧读完才能实测比特率), 捕获 VBR 头声明的总帧数
//! - 总长估计: 无 VBR 头时按文件大小与比特率估算, 仅供展示
//! - 跳过窗口: 由编码器延迟/填充计算前后端修剪量
//! - 格式漂移检测: 声道数或采样率中途变化即致命
//!
//! 会话内所有状态 (PCM 缓冲, 格式, 计数) 为本会话独占, 会话结束一并销毁.

use bytes::Bytes;
use log::{debug, info};
use yun_codec::{DecodeOutcome, DecoderState, FrameDecoder, MpegLayer, header};
use yun_core::{YunError, YunResult};

use crate::io::StreamIo;
use crate::pcm::{PcmBuffer, SkipWindow};
use crate::sync;

/// MP3 解码链固有前置延迟 (528 + 1 采样)
const DECODER_DELAY: u32 = 528 + 1;
/// 未声明时采用的缺省编码器延迟
const DEFAULT_ENCODER_DELAY: u32 = 576;
/// Layer I/II 的固定前置跳过
const LAYER12_SKIP: u32 = 240 + 1;
/// 头部补齐阶段的读取块大小
const HEADER_CHUNK: usize = 100;
/// 解码驱动阶段的读取块大小
const DRIVE_CHUNK: usize = 1024;
/// 单帧最大交错采样数 (立体声 1152)
pub const MAX_FRAME_SAMPLES: usize = 2 * 1152;

/// 会话建立后固定的流格式.
///
/// 建立之后不允许变化: 变化是致命条件, 不做静默适配.
#[derive(Debug, Clone)]
pub struct FrameFormat {
    /// 声道数 (1 或 2)
    pub channels: u32,
    /// 采样率 (Hz)
    pub sample_rate: u32,
    /// 比特率 (kbps)
    pub bitrate_kbps: u32,
    /// 层
    pub layer: MpegLayer,
    /// 是否自由格式
    pub free_format: bool,
}

/// 可解码采样总数的三种认知
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalSamples {
    /// 由 VBR 头声明 (帧数 x 每帧采样数)
    Known(u64),
    /// 按文件大小与比特率估算, 仅供进度展示/预分配;
    /// 不得用于截断实际解码输出
    Estimated(u64),
    /// 未知
    Unknown,
}

/// 头部状态跟踪器.
///
/// 头部识别, 帧大小确定与整帧解码在不同的调用上完成, 因此
/// "已解析" 是三态联合: 引擎报告 header_parsed, 或当前/上一帧大小非零.
#[derive(Debug, Default)]
struct HeaderTracker {
    parsed: bool,
    channels: u32,
    sample_rate: u32,
    bitrate_kbps: u32,
    /// VBR 头给出的总采样数 (帧数 x 每帧采样数)
    vbr_total: Option<u64>,
}

impl HeaderTracker {
    /// 在每次引擎调用后消化侧信道状态
    fn track(&mut self, st: &DecoderState) {
        if !(st.header_parsed || st.frame_size > 0 || st.prev_frame_size > 0) {
            return;
        }
        self.parsed = true;
        self.channels = st.channels();
        self.sample_rate = st.sample_rate();

        // 自由格式要读完整帧才能实测比特率, 在那之前保持 0
        self.bitrate_kbps = if st.frame_size > 0 {
            let measured = if st.prev_frame_size > 0 {
                st.prev_frame_size
            } else {
                st.frame_size
            };
            (8.0 * (4 + measured) as f64 * f64::from(self.sample_rate)
                / (1000.0 * st.frame_size as f64)
                + 0.5) as u32
        } else if let (Some(version), Some(layer)) = (st.version, st.layer) {
            header::bitrate_kbps(version, layer, st.bitrate_index)
        } else {
            0
        };

        if let Some(frames) = st.vbr_frame_count {
            if st.frame_size > 0 {
                self.vbr_total = Some(st.frame_size as u64 * frames);
            }
        }
    }
}

/// 解码会话
pub struct DecodeSession {
    /// 帧解码引擎 (不透明能力)
    decoder: Box<dyn FrameDecoder>,
    /// 头部状态跟踪器
    tracker: HeaderTracker,
    /// 会话格式 (建立后固定)
    format: FrameFormat,
    /// 采样总数认知 (未扣除修剪量)
    raw_total: TotalSamples,
    /// 修剪总量 (skip_start + skip_end, 交错单位)
    trim_discard: u64,
    /// 首批采样是否已入缓冲 (此后修剪窗口不再重算)
    first_append_done: bool,
    /// PCM 组装缓冲区
    pcm: PcmBuffer,
    /// 单帧解码暂存
    scratch: Vec<i16>,
    /// 驱动读取块
    chunk: Vec<u8>,
    /// 引擎已冲刷完毕
    finished: bool,
    /// 第一个 ID3v2 标签的原始字节 (透传用)
    id3v2: Option<Bytes>,
}

impl std::fmt::Debug for DecodeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeSession")
            .field("tracker", &self.tracker)
            .field("format", &self.format)
            .field("raw_total", &self.raw_total)
            .field("trim_discard", &self.trim_discard)
            .field("first_append_done", &self.first_append_done)
            .field("finished", &self.finished)
            .field("id3v2", &self.id3v2)
            .finish_non_exhaustive()
    }
}

/// 由层与编码器延迟/填充计算修剪窗口 (换算到交错采样单位).
///
/// Layer III: 前端 = 编码器延迟 (未声明按 576) + 解码链延迟,
/// 尾端 = 编码器填充 - 解码链延迟 (下限 0); Layer I/II 用固定前端值.
fn skip_window(layer: MpegLayer, st: &DecoderState, channels: u32) -> SkipWindow {
    let (start, end) = match layer {
        MpegLayer::Layer3 => (
            st.encoder_delay.unwrap_or(DEFAULT_ENCODER_DELAY) + DECODER_DELAY,
            st.encoder_padding
                .map_or(0, |p| p.saturating_sub(DECODER_DELAY)),
        ),
        _ => (LAYER12_SKIP, 0),
    };
    SkipWindow {
        start: (start * channels) as usize,
        end: (end * channels) as usize,
    }
}

impl DecodeSession {
    /// 建立解码会话: 定位首帧, 驱动引擎到头部解析完成, 固定流格式,
    /// 计算修剪窗口与总长认知.
    pub fn open(io: &mut StreamIo, mut decoder: Box<dyn FrameDecoder>) -> YunResult<Self> {
        let sync = sync::locate_first_frame(io)?;

        let mut tracker = HeaderTracker::default();
        let mut scratch = vec![0i16; MAX_FRAME_SAMPLES];

        // 种子头喂给引擎; 之后按固定块补齐读取, 直到头部解析完成.
        // 补齐读取不足整块视为传输错误 (原实现语义).
        drive(&mut *decoder, &mut tracker, &sync.seed, &mut scratch)?;
        let mut header_buf = [0u8; HEADER_CHUNK];
        while !tracker.parsed {
            io.read_exact(&mut header_buf)?;
            drive(&mut *decoder, &mut tracker, &header_buf, &mut scratch)?;
        }

        // 头部完成后比特率仍为 0 且不是自由格式: 结构检查不充分, 拒绝流
        if tracker.bitrate_kbps == 0 && !sync.free_format {
            return Err(YunError::Sync("头部解析完成但比特率为 0".into()));
        }

        let channels = tracker.channels;
        if channels != 1 && channels != 2 {
            return Err(YunError::Unsupported(format!(
                "不支持的声道数: {channels}"
            )));
        }

        let layer = decoder.state().layer.unwrap_or(sync.layer);
        let format = FrameFormat {
            channels,
            sample_rate: tracker.sample_rate,
            bitrate_kbps: tracker.bitrate_kbps,
            layer,
            free_format: sync.free_format,
        };

        // 修剪窗口: 编码器延迟/填充可能随首个完整帧 (VBR 标签帧) 才到,
        // 届时在首批采样入缓冲前重算; 这里先按当前认知计算
        let skip = skip_window(layer, decoder.state(), channels);
        let trim_discard = (skip.start + skip.end) as u64;

        // 总长认知: VBR 头 > 文件大小估算 > 未知 (存未扣修剪量的原始值)
        let mut raw_total = match tracker.vbr_total {
            Some(n) => TotalSamples::Known(n),
            None => TotalSamples::Unknown,
        };
        if raw_total == TotalSamples::Unknown && format.bitrate_kbps > 0 {
            if let Some(file_len) = io.size() {
                let total_seconds =
                    file_len as f64 * 8.0 / (1000.0 * f64::from(format.bitrate_kbps));
                raw_total =
                    TotalSamples::Estimated((total_seconds * f64::from(format.sample_rate)) as u64);
            }
        }

        let mut pcm = PcmBuffer::new();
        pcm.set_skip(skip);

        info!(
            "会话建立: {} Hz, {} 声道, {} kbps, {}{}",
            format.sample_rate,
            format.channels,
            format.bitrate_kbps,
            format.layer,
            if format.free_format { " (自由格式)" } else { "" },
        );
        debug!(
            "修剪窗口: start={}, end={}, 总长={raw_total:?}",
            skip.start, skip.end
        );

        Ok(Self {
            decoder,
            tracker,
            format,
            raw_total,
            trim_discard,
            first_append_done: false,
            pcm,
            scratch,
            chunk: vec![0u8; DRIVE_CHUNK],
            finished: false,
            id3v2: sync.id3v2,
        })
    }

    /// 会话格式
    pub fn format(&self) -> &FrameFormat {
        &self.format
    }

    /// 采样总数认知, 已扣除修剪量
    /// (会话过程中可能由估算升级为 VBR 声明值)
    pub fn total_samples(&self) -> TotalSamples {
        match self.raw_total {
            TotalSamples::Known(n) => TotalSamples::Known(n.saturating_sub(self.trim_discard)),
            TotalSamples::Estimated(n) => {
                TotalSamples::Estimated(n.saturating_sub(self.trim_discard))
            }
            TotalSamples::Unknown => TotalSamples::Unknown,
        }
    }

    /// 第一个 ID3v2 标签的原始字节
    pub fn id3v2_tag(&self) -> Option<&Bytes> {
        self.id3v2.as_ref()
    }

    /// 引擎名称
    pub fn decoder_name(&self) -> &str {
        self.decoder.name()
    }

    /// 拉取至多 `out.len()` 个交错采样, 返回实际数量; 0 表示流已结束.
    ///
    /// 内部按需驱动引擎: 引擎要数据就读一块; 读到 0 字节时仍给引擎
    /// 一次空输入冲刷机会, 之后才宣告结束.
    pub fn read_samples(&mut self, io: &mut StreamIo, out: &mut [i16]) -> YunResult<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        loop {
            let taken = self.pcm.take(out);
            if taken > 0 {
                return Ok(taken);
            }
            if self.finished {
                return Ok(0);
            }

            let produced = self.next_block(io)?;
            if produced > 0 {
                // 格式漂移检测: 两条流无法拼接, 立即致命
                let st = self.decoder.state();
                if st.channels() != self.format.channels {
                    return Err(YunError::FormatDrift(format!(
                        "声道数由 {} 变为 {}",
                        self.format.channels,
                        st.channels()
                    )));
                }
                if st.sample_rate() != self.format.sample_rate {
                    return Err(YunError::FormatDrift(format!(
                        "采样率由 {} 变为 {}",
                        self.format.sample_rate,
                        st.sample_rate()
                    )));
                }
                // 编码器延迟/填充随 VBR 标签帧到达时, 修剪窗口尚未消耗,
                // 在首批采样入缓冲前重算一次
                if !self.first_append_done {
                    self.first_append_done = true;
                    let skip =
                        skip_window(self.format.layer, self.decoder.state(), self.format.channels);
                    self.trim_discard = (skip.start + skip.end) as u64;
                    self.pcm.set_skip(skip);
                }
                self.pcm.append(&self.scratch[..produced]);

                // VBR 总数可能在首个完整帧之后才出现, 此时升级总长认知
                if !matches!(self.raw_total, TotalSamples::Known(_)) {
                    if let Some(n) = self.tracker.vbr_total {
                        self.raw_total = TotalSamples::Known(n);
                    }
                }
            }
        }
    }

    /// 驱动引擎产出一批采样; 返回 0 表示流与引擎均已枯竭.
    fn next_block(&mut self, io: &mut StreamIo) -> YunResult<usize> {
        // 本轮待喂入的字节数 (引擎在每次调用中吞掉全部输入)
        let mut pending = 0usize;
        loop {
            let outcome = self
                .decoder
                .decode(&self.chunk[..pending], &mut self.scratch)?;
            self.tracker.track(self.decoder.state());
            pending = 0;

            match outcome {
                DecodeOutcome::Produced(n) => return Ok(n),
                DecodeOutcome::NeedMoreData => {
                    let len = io.read_some(&mut self.chunk)?;
                    if len == 0 {
                        // 流已尽: 给引擎一次空输入冲刷机会
                        let flush = self.decoder.decode(&[], &mut self.scratch)?;
                        self.tracker.track(self.decoder.state());
                        if let DecodeOutcome::Produced(m) = flush {
                            if m > 0 {
                                return Ok(m);
                            }
                        }
                        self.finished = true;
                        return Ok(0);
                    }
                    pending = len;
                }
            }
        }
    }
}

/// 单次引擎驱动 + 跟踪 (建立阶段用)
fn drive(
    decoder: &mut dyn FrameDecoder,
    tracker: &mut HeaderTracker,
    input: &[u8],
    scratch: &mut [i16],
) -> YunResult<DecodeOutcome> {
    let outcome = decoder.decode(input, scratch)?;
    tracker.track(decoder.state());
    Ok(outcome)
}
