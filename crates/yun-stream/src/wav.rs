//! PCM WAV (RIFF WAVE) 容器写出.
//!
//! 写入流程:
//! 1. `write_header()` - 写出 44 字节头部, 两个大小字段先占位为 0
//! 2. `write_samples()` - 追加小端 i16 PCM 数据
//! 3. `finalize()` - 定位回文件头, 回填 RIFF 大小和 data 块大小
//!
//! 头部缓冲区是会话私有的 (不是全局可变静态), 多个会话互不干扰.
//! 回填是整个写出过程的最后一步: 中途崩溃会留下大小字段为 0 的文件,
//! 以此标示输出不完整.

use log::{debug, warn};
use yun_core::{YunError, YunResult, endian};

use crate::io::StreamIo;

/// 头部总长
const HEADER_LEN: usize = 44;
/// RIFF 大小字段偏移 (值 = 文件总长 - 8)
const RIFF_SIZE_OFFSET: usize = 4;
/// data 块大小字段偏移
const DATA_SIZE_OFFSET: usize = 40;
/// data 大小字段可表示的最大字节数, 超出即钳制到此值
const MAX_DATA_BYTES: u64 = 0xFFFF_FFD0;
/// 位深固定 16 bit
const BITS_PER_SAMPLE: u32 = 16;

/// WAV 写出器
pub struct WavWriter {
    /// 会话私有的头部缓冲, 占位写出后在 finalize 时回填
    header: [u8; HEADER_LEN],
    /// 已写入的 PCM 数据字节数
    data_bytes: u64,
}

impl WavWriter {
    /// 以声道数和采样率构造写出器.
    ///
    /// 单声道/立体声之外的布局在产生任何输出之前被拒绝.
    pub fn new(channels: u32, sample_rate: u32) -> YunResult<Self> {
        if channels != 1 && channels != 2 {
            return Err(YunError::Unsupported(format!(
                "不支持的声道数: {channels}"
            )));
        }

        let mut header = [0u8; HEADER_LEN];
        let bytes_per_sample = BITS_PER_SAMPLE / 8;

        header[0..4].copy_from_slice(b"RIFF");
        // [4..8] RIFF 大小: 占位, finalize 回填
        header[8..12].copy_from_slice(b"WAVE");
        header[12..16].copy_from_slice(b"fmt ");
        endian::write_le(&mut header, 16, 4, 16); // fmt 块大小, 固定 16
        endian::write_le(&mut header, 20, 2, 1); // 音频格式: PCM 整数
        endian::write_le(&mut header, 22, 2, u64::from(channels));
        endian::write_le(&mut header, 24, 4, u64::from(sample_rate));
        endian::write_le(
            &mut header,
            28,
            4,
            u64::from(sample_rate * channels * bytes_per_sample),
        );
        endian::write_le(&mut header, 32, 2, u64::from(channels * bytes_per_sample));
        endian::write_le(&mut header, 34, 2, u64::from(BITS_PER_SAMPLE));
        header[36..40].copy_from_slice(b"data");
        // [40..44] data 大小: 占位, finalize 回填

        Ok(Self {
            header,
            data_bytes: 0,
        })
    }

    /// 写出带占位大小的头部
    pub fn write_header(&self, io: &mut StreamIo) -> YunResult<()> {
        io.write_all(&self.header)
    }

    /// 追加一批交错 i16 采样 (转小端字节序)
    pub fn write_samples(&mut self, io: &mut StreamIo, samples: &[i16]) -> YunResult<()> {
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for s in samples {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        io.write_all(&bytes)?;
        self.data_bytes += bytes.len() as u64;
        Ok(())
    }

    /// 已写入的 PCM 数据字节数
    pub fn data_bytes(&self) -> u64 {
        self.data_bytes
    }

    /// 回填大小字段, 返回写入头部的 data 大小.
    ///
    /// 输出不支持 seek 时保留占位的 0 (标示不完整), 不算错误.
    pub fn finalize(&mut self, io: &mut StreamIo) -> YunResult<u64> {
        if !io.is_seekable() {
            debug!("WAV 输出不支持 seek, 无法回填大小字段");
            return Ok(0);
        }

        if self.data_bytes == 0 {
            warn!("WAV 文件不含任何 PCM 采样");
        }
        let data_size = if self.data_bytes > MAX_DATA_BYTES {
            warn!(
                "WAV 数据量 {} 字节超出 32 位大小字段容量, 钳制为 {MAX_DATA_BYTES}",
                self.data_bytes
            );
            MAX_DATA_BYTES
        } else {
            self.data_bytes
        };

        endian::write_le(&mut self.header, DATA_SIZE_OFFSET, 4, data_size);
        endian::write_le(&mut self.header, RIFF_SIZE_OFFSET, 4, data_size + 36);

        io.seek(std::io::SeekFrom::Start(0))?;
        io.write_all(&self.header)?;
        debug!(
            "WAV 回填尾部: riff_size={}, data_size={}",
            data_size + 36,
            data_size
        );
        Ok(data_size)
    }
}
