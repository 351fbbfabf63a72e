//! MPEG 音频帧头解析与查表事实.
//!
//! 帧头结构 (32 位):
//! ```text
//! AAAA AAAA  AAAB BCCD  EEEE FFGH  IIJJ KLMM
//! A = 同步位 (11 bit, 全1)   B = MPEG 版本    C = 层
//! D = CRC 保护              E = 比特率索引    F = 采样率索引
//! G = 填充位                H = 私有位        I = 声道模式
//! J = 模式扩展              K = 版权         L = 原始/复制
//! M = 强调
//! ```
//!
//! 本模块只提供 "帧头里写了什么" 的事实 (版本/层/声道/比特率表/帧大小),
//! 供同步层, 头部状态跟踪和解码器适配层共用; 不做任何解码.

/// MPEG 音频版本
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    /// MPEG-1
    Mpeg1,
    /// MPEG-2
    Mpeg2,
    /// MPEG-2.5
    Mpeg25,
}

impl MpegVersion {
    /// 低采样率标志 (lsf): MPEG-2/2.5 为 1, 比特率表与帧大小公式按此分叉
    pub fn lsf(self) -> usize {
        match self {
            MpegVersion::Mpeg1 => 0,
            MpegVersion::Mpeg2 | MpegVersion::Mpeg25 => 1,
        }
    }
}

/// MPEG 音频层
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegLayer {
    /// Layer I
    Layer1,
    /// Layer II
    Layer2,
    /// Layer III
    Layer3,
}

impl MpegLayer {
    /// 层序号 (1/2/3), 用于查比特率表
    pub fn index(self) -> usize {
        match self {
            MpegLayer::Layer1 => 1,
            MpegLayer::Layer2 => 2,
            MpegLayer::Layer3 => 3,
        }
    }
}

impl std::fmt::Display for MpegLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MpegLayer::Layer1 => write!(f, "Layer I"),
            MpegLayer::Layer2 => write!(f, "Layer II"),
            MpegLayer::Layer3 => write!(f, "Layer III"),
        }
    }
}

/// 声道模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    /// 立体声
    Stereo,
    /// 联合立体声
    JointStereo,
    /// 双声道
    DualChannel,
    /// 单声道
    SingleChannel,
}

impl ChannelMode {
    /// 声道数
    pub fn channels(self) -> u32 {
        match self {
            ChannelMode::SingleChannel => 1,
            _ => 2,
        }
    }
}

/// 比特率表 (kbps), 索引 [lsf][层-1][比特率索引].
///
/// 索引 0 表示自由格式 (free format), 索引 15 非法.
pub const BITRATE_KBPS: [[[u32; 16]; 3]; 2] = [
    // MPEG-1
    [
        [0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448, 0],
        [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384, 0],
        [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 0],
    ],
    // MPEG-2 / MPEG-2.5
    [
        [0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256, 0],
        [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160, 0],
        [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160, 0],
    ],
];

/// 采样率表 (Hz), 按版本折叠后的索引 0-8:
/// MPEG-1 占 0-2, MPEG-2 占 3-5, MPEG-2.5 占 6-8.
pub const SAMPLE_RATE_HZ: [u32; 9] = [
    44100, 48000, 32000, 22050, 24000, 16000, 11025, 12000, 8000,
];

/// 按 (版本, 层, 比特率索引) 查比特率 (kbps). 索引 0 (自由格式) 返回 0.
pub fn bitrate_kbps(version: MpegVersion, layer: MpegLayer, bitrate_index: usize) -> u32 {
    BITRATE_KBPS[version.lsf()][layer.index() - 1][bitrate_index & 0x0F]
}

/// MPEG 音频帧头
#[derive(Debug, Clone)]
pub struct FrameHeader {
    /// MPEG 版本
    pub version: MpegVersion,
    /// 层
    pub layer: MpegLayer,
    /// 比特率索引 (0 = 自由格式)
    pub bitrate_index: usize,
    /// 比特率 (kbps, 自由格式为 0)
    pub bitrate_kbps: u32,
    /// 折叠后的采样率索引 (0-8, 见 [`SAMPLE_RATE_HZ`])
    pub sample_rate_index: usize,
    /// 采样率 (Hz)
    pub sample_rate: u32,
    /// 填充位
    pub padding: bool,
    /// 声道模式
    pub mode: ChannelMode,
    /// 模式扩展位
    pub mode_extension: u8,
    /// 帧总字节数 (含头部; 自由格式为 0, 须实测)
    pub frame_size: usize,
    /// 每声道每帧采样数
    pub samples_per_frame: u32,
}

impl FrameHeader {
    /// 解析 4 字节帧头. 保留字段组合返回 `None`.
    ///
    /// 自由格式 (比特率索引 0) 是合法头, `bitrate_kbps` 与 `frame_size`
    /// 置 0, 由调用方在读完整帧后实测.
    pub fn parse(header: u32) -> Option<Self> {
        // 同步位 (bit 31-21 必须全为 1)
        if (header >> 21) != 0x7FF {
            return None;
        }

        // MPEG 版本 (bit 20-19)
        let version = match (header >> 19) & 0x03 {
            0 => MpegVersion::Mpeg25,
            2 => MpegVersion::Mpeg2,
            3 => MpegVersion::Mpeg1,
            _ => return None, // 1 = reserved
        };

        // 层 (bit 18-17)
        let layer = match (header >> 17) & 0x03 {
            1 => MpegLayer::Layer3,
            2 => MpegLayer::Layer2,
            3 => MpegLayer::Layer1,
            _ => return None, // 0 = reserved
        };

        // 比特率索引 (bit 15-12), 15 非法, 0 = 自由格式
        let bitrate_index = ((header >> 12) & 0x0F) as usize;
        if bitrate_index == 15 {
            return None;
        }

        // 采样率索引 (bit 11-10), 3 = reserved
        let sr_idx = ((header >> 10) & 0x03) as usize;
        if sr_idx == 3 {
            return None;
        }
        let sample_rate_index = match version {
            MpegVersion::Mpeg1 => sr_idx,
            MpegVersion::Mpeg2 => sr_idx + 3,
            MpegVersion::Mpeg25 => sr_idx + 6,
        };
        let sample_rate = SAMPLE_RATE_HZ[sample_rate_index];

        // 填充 (bit 9)
        let padding = (header >> 9) & 1 == 1;

        // 声道模式 (bit 7-6)
        let mode = match (header >> 6) & 0x03 {
            0 => ChannelMode::Stereo,
            1 => ChannelMode::JointStereo,
            2 => ChannelMode::DualChannel,
            _ => ChannelMode::SingleChannel,
        };
        let mode_extension = ((header >> 4) & 0x03) as u8;

        // 强调 (bit 1-0), 2 = reserved
        if header & 0x03 == 2 {
            return None;
        }

        let kbps = bitrate_kbps(version, layer, bitrate_index);
        let samples_per_frame = match (layer, version) {
            (MpegLayer::Layer1, _) => 384,
            (MpegLayer::Layer2, _) => 1152,
            (MpegLayer::Layer3, MpegVersion::Mpeg1) => 1152,
            (MpegLayer::Layer3, _) => 576,
        };

        // 帧大小计算 (自由格式无法由头部得出)
        let frame_size = if kbps == 0 {
            0
        } else {
            let bps = kbps * 1000;
            let pad = u32::from(padding);
            let size = match layer {
                MpegLayer::Layer1 => (12 * bps / sample_rate + pad) * 4,
                MpegLayer::Layer2 => 144 * bps / sample_rate + pad,
                MpegLayer::Layer3 => {
                    let factor = if version == MpegVersion::Mpeg1 { 144 } else { 72 };
                    factor * bps / sample_rate + pad
                }
            };
            size as usize
        };

        Some(Self {
            version,
            layer,
            bitrate_index,
            bitrate_kbps: kbps,
            sample_rate_index,
            sample_rate,
            padding,
            mode,
            mode_extension,
            frame_size,
            samples_per_frame,
        })
    }

    /// 声道数
    pub fn channels(&self) -> u32 {
        self.mode.channels()
    }

    /// 是否自由格式
    pub fn is_free_format(&self) -> bool {
        self.bitrate_index == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_帧头解析_mpeg1_layer3_128kbps_44100() {
        // 0xFFFB: 同步 + MPEG1 + Layer III + 无 CRC; 比特率索引 9, 采样率索引 0
        let h = 0xFFFB_0000u32 | (9 << 12);
        let fh = FrameHeader::parse(h).unwrap();

        assert_eq!(fh.version, MpegVersion::Mpeg1);
        assert_eq!(fh.layer, MpegLayer::Layer3);
        assert_eq!(fh.bitrate_kbps, 128);
        assert_eq!(fh.sample_rate, 44100);
        assert_eq!(fh.samples_per_frame, 1152);
        // 144 * 128000 / 44100 = 417
        assert_eq!(fh.frame_size, 417);
        assert_eq!(fh.channels(), 2);
    }

    #[test]
    fn test_帧头解析_mpeg2_layer3_单声道() {
        // MPEG-2 (版本位 10), Layer III, 比特率索引 4 → 32kbps, 采样率索引 0 → 22050
        let h = 0xFFF3_0000u32 | (4 << 12) | (3 << 6);
        let fh = FrameHeader::parse(h).unwrap();

        assert_eq!(fh.version, MpegVersion::Mpeg2);
        assert_eq!(fh.sample_rate, 22050);
        assert_eq!(fh.sample_rate_index, 3);
        assert_eq!(fh.samples_per_frame, 576);
        assert_eq!(fh.mode, ChannelMode::SingleChannel);
        assert_eq!(fh.channels(), 1);
        // 72 * 32000 / 22050 = 104
        assert_eq!(fh.frame_size, 104);
    }

    #[test]
    fn test_帧头解析_自由格式() {
        let h = 0xFFFB_0000u32; // 比特率索引 0
        let fh = FrameHeader::parse(h).unwrap();
        assert!(fh.is_free_format());
        assert_eq!(fh.bitrate_kbps, 0);
        assert_eq!(fh.frame_size, 0);
    }

    #[test]
    fn test_帧头解析_保留组合拒绝() {
        assert!(FrameHeader::parse(0x0000_0000).is_none()); // 无同步
        assert!(FrameHeader::parse(0xFFE8_0000 | (9 << 12)).is_none()); // 保留版本
        assert!(FrameHeader::parse(0xFFF9_0000 | (9 << 12)).is_none()); // 保留层
        assert!(FrameHeader::parse(0xFFFB_F000).is_none()); // 比特率索引 15
        assert!(FrameHeader::parse(0xFFFB_0C00 | (9 << 12)).is_none()); // 采样率索引 3
        assert!(FrameHeader::parse(0xFFFB_0002 | (9 << 12)).is_none()); // 保留强调
    }

    #[test]
    fn test_比特率查表() {
        assert_eq!(bitrate_kbps(MpegVersion::Mpeg1, MpegLayer::Layer1, 14), 448);
        assert_eq!(bitrate_kbps(MpegVersion::Mpeg2, MpegLayer::Layer3, 1), 8);
        assert_eq!(bitrate_kbps(MpegVersion::Mpeg25, MpegLayer::Layer2, 14), 160);
        // 自由格式
        assert_eq!(bitrate_kbps(MpegVersion::Mpeg1, MpegLayer::Layer3, 0), 0);
    }
}
