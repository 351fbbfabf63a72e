//! 流同步器.
//!
//! 在未经信任的字节流里定位第一个有效的 MPEG 帧边界:
//! 1. 跳过 ID3v2 标签 (可能连续多个, 第一个的原始字节保留供透传)
//! 2. 跳过专辑 ID 私有块 (`AiD\x01`)
//! 3. 以 4 字节窗口逐字节滑动, 做帧头位模式有效性检查
//!
//! 找到的 4 字节种子头必须原样作为首批输入交给帧解码引擎,
//! 引擎由此接续解析.

use bytes::Bytes;
use log::{debug, info};
use yun_codec::MpegLayer;
use yun_core::{YunError, YunResult};

use crate::io::StreamIo;

/// MPEG-1 Layer II 禁用 (比特率索引, 声道模式) 组合表.
///
/// 按比特率索引查位掩码, 第 mode 位为 1 表示该组合不合法
/// (低码率只允许单声道, 高码率只允许立体声).
const ABL2: [u8; 16] = [0, 7, 7, 7, 0, 7, 0, 0, 0, 0, 0, 8, 8, 8, 8, 8];

/// 同步结果
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    /// 第一个有效帧头的 4 字节 (种子, 须首先喂给解码引擎)
    pub seed: [u8; 4],
    /// 帧头声明的层
    pub layer: MpegLayer,
    /// 是否自由格式 (比特率索引全零)
    pub free_format: bool,
    /// 第一个 ID3v2 标签的完整原始字节 (头部 10 字节 + 正文)
    pub id3v2: Option<Bytes>,
}

/// 帧头位模式有效性检查. 通过时返回声明的层.
///
/// 规则 (字节窗口 [b0 b1 b2 b3]):
/// - b0 全 1; b1 高 3 位全 1
/// - 版本位不为保留值 `10`
/// - 层位不为保留值 `00`
/// - 比特率索引不为 `1111`; 采样率索引不为 `11`
/// - MPEG-1 Layer II 的 (比特率索引, 声道模式) 不落在禁用表里
/// - 强调位不为保留值 `10`
fn check_sync_word(h: &[u8; 4]) -> Option<MpegLayer> {
    if h[0] != 0xFF {
        return None;
    }
    if h[1] & 0xE0 != 0xE0 {
        return None;
    }
    if h[1] & 0x18 == 0x08 {
        return None; // 保留版本
    }
    let layer = match h[1] & 0x06 {
        0x02 => MpegLayer::Layer3,
        0x04 => MpegLayer::Layer2,
        0x06 => MpegLayer::Layer1,
        _ => return None, // 保留层
    };
    if h[2] & 0xF0 == 0xF0 {
        return None; // 坏比特率
    }
    if h[2] & 0x0C == 0x0C {
        return None; // 坏采样率
    }
    if h[1] & 0x18 == 0x18
        && h[1] & 0x06 == 0x04
        && ABL2[(h[2] >> 4) as usize] & (1 << (h[3] >> 6)) != 0
    {
        return None;
    }
    if h[3] & 0x03 == 2 {
        return None; // 保留强调模式
    }
    Some(layer)
}

/// ID3v2 标签长度: 4 字节, 每字节只用低 7 位, 大端拼接
fn id3v2_body_len(b: &[u8; 4]) -> usize {
    (usize::from(b[0] & 0x7F) << 21)
        | (usize::from(b[1] & 0x7F) << 14)
        | (usize::from(b[2] & 0x7F) << 7)
        | usize::from(b[3] & 0x7F)
}

/// 定位第一个有效的 MPEG 帧头.
///
/// 输入耗尽仍未命中返回 [`YunError::Sync`]; 固定长度前导 (ID3v2 头,
/// 专辑 ID 长度字段) 读取不足则是传输错误, 原样上抛.
pub fn locate_first_frame(io: &mut StreamIo) -> YunResult<SyncOutcome> {
    let mut buf = [0u8; 4];
    io.read_exact(&mut buf)?;

    // ID3v2 标签可能连续出现; 只保留第一个
    let mut id3v2: Option<Bytes> = None;
    while &buf[..3] == b"ID3" {
        let mut rest = [0u8; 6];
        io.read_exact(&mut rest)?;
        let body_len = id3v2_body_len(&[rest[2], rest[3], rest[4], rest[5]]);
        debug!("同步: 跳过 ID3v2 标签, 大小={} 字节", 10 + body_len);
        if id3v2.is_none() {
            let mut tag = Vec::with_capacity(10 + body_len);
            tag.extend_from_slice(&buf);
            tag.extend_from_slice(&rest);
            let body_start = tag.len();
            tag.resize(body_start + body_len, 0);
            io.read_exact(&mut tag[body_start..])?;
            id3v2 = Some(Bytes::from(tag));
        } else {
            io.skip(body_len as u64)?;
        }
        io.read_exact(&mut buf)?;
    }

    // 专辑 ID 私有块: 标记 + u16 小端长度 (长度含已读过的 6 字节)
    if &buf == b"AiD\x01" {
        let block_len = io.read_u16_le()?;
        info!("同步: 发现专辑 ID 块, 长度 = {block_len}");
        io.skip(u64::from(block_len).saturating_sub(6))?;
        io.read_exact(&mut buf)?;
    }

    // 逐字节滑动, 直到窗口通过有效性检查
    let layer = loop {
        if let Some(layer) = check_sync_word(&buf) {
            break layer;
        }
        buf[0] = buf[1];
        buf[1] = buf[2];
        buf[2] = buf[3];
        let mut next = [0u8; 1];
        match io.read_exact(&mut next) {
            Ok(()) => buf[3] = next[0],
            Err(YunError::Eof) => {
                return Err(YunError::Sync("输入耗尽, 未找到有效的 MPEG 帧头".into()));
            }
            Err(e) => return Err(e),
        }
    };

    // 自由格式只改变下游的比特率推导, 不影响同步本身
    let free_format = buf[2] & 0xF0 == 0;
    if free_format {
        info!("同步: 输入为自由格式流");
    }

    Ok(SyncOutcome {
        seed: buf,
        layer,
        free_format,
        id3v2,
    })
}
