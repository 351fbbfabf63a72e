//! 传输层抽象.
//!
//! 为同步器/解码会话/容器写出提供统一的数据读写接口, 支持文件,
//! 内存缓冲区等不同后端. 读侧带预读缓冲 (同步扫描逐字节滑动,
//! 不能每字节都打到底层), 写侧直通.

use std::io::{self, Read, Seek, Write};
use yun_core::{YunError, YunResult};

/// 传输后端 trait
///
/// 实现此 trait 以支持不同的数据来源/去向 (文件, 内存, 网络等).
pub trait Transport: Send {
    /// 读取数据, 返回实际读到的字节数 (0 = 流结束)
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    /// 全部写入
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;
    /// 定位 (seek)
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64>;
    /// 获取当前位置
    fn position(&mut self) -> io::Result<u64>;
    /// 获取总大小 (如果可知)
    fn size(&self) -> Option<u64>;
    /// 是否支持随机访问
    fn is_seekable(&self) -> bool;
}

/// 默认预读缓冲区大小 (32 KB)
const DEFAULT_BUFFER_SIZE: usize = 32 * 1024;

/// 流上下文
///
/// 封装底层传输, 提供带缓冲的字节级读取与直通写入.
pub struct StreamIo {
    /// 底层传输
    inner: Box<dyn Transport>,
    /// 预读缓冲区
    buffer: Vec<u8>,
    /// 缓冲区中的有效数据长度
    buf_len: usize,
    /// 缓冲区当前读取位置
    buf_pos: usize,
}

impl StreamIo {
    /// 从传输后端创建上下文
    pub fn new(inner: Box<dyn Transport>) -> Self {
        Self {
            inner,
            buffer: vec![0u8; DEFAULT_BUFFER_SIZE],
            buf_len: 0,
            buf_pos: 0,
        }
    }

    /// 从文件路径打开 (只读)
    pub fn open_read(path: &str) -> YunResult<Self> {
        let file = std::fs::File::open(path)?;
        Ok(Self::new(Box::new(FileTransport::new(file))))
    }

    /// 从文件路径打开 (读写, 截断)
    pub fn open_write(path: &str) -> YunResult<Self> {
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self::new(Box::new(FileTransport::new(file))))
    }

    // ========================
    // 读取方法
    // ========================

    /// 读取恰好 `buf.len()` 字节, 数据不够时返回 `Eof`
    pub fn read_exact(&mut self, buf: &mut [u8]) -> YunResult<()> {
        let mut total = 0;
        while total < buf.len() {
            let buffered = self.buf_len - self.buf_pos;
            if buffered > 0 {
                let to_copy = buffered.min(buf.len() - total);
                buf[total..total + to_copy]
                    .copy_from_slice(&self.buffer[self.buf_pos..self.buf_pos + to_copy]);
                self.buf_pos += to_copy;
                total += to_copy;
            } else {
                self.buf_pos = 0;
                self.buf_len = self.inner.read(&mut self.buffer)?;
                if self.buf_len == 0 {
                    return Err(YunError::Eof);
                }
            }
        }
        Ok(())
    }

    /// 读取至多 `buf.len()` 字节, 返回实际读到的字节数.
    ///
    /// 返回 0 表示流结束. 短读不是错误: 会话层把短读/零读当成
    /// 潜在的流末尾信号, 仍会给解码引擎一次冲刷机会.
    pub fn read_some(&mut self, buf: &mut [u8]) -> YunResult<usize> {
        let buffered = self.buf_len - self.buf_pos;
        if buffered > 0 {
            let to_copy = buffered.min(buf.len());
            buf[..to_copy].copy_from_slice(&self.buffer[self.buf_pos..self.buf_pos + to_copy]);
            self.buf_pos += to_copy;
            return Ok(to_copy);
        }
        Ok(self.inner.read(buf)?)
    }

    /// 读取 1 个字节
    pub fn read_u8(&mut self) -> YunResult<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    /// 读取 u16 小端
    pub fn read_u16_le(&mut self) -> YunResult<u16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    /// 跳过指定字节数
    pub fn skip(&mut self, count: u64) -> YunResult<()> {
        // 先消耗缓冲区中的数据
        let buffered = (self.buf_len - self.buf_pos) as u64;
        if count <= buffered {
            self.buf_pos += count as usize;
            return Ok(());
        }

        let remaining = count - buffered;
        self.buf_pos = 0;
        self.buf_len = 0;

        if self.inner.is_seekable() {
            self.inner.seek(io::SeekFrom::Current(remaining as i64))?;
            return Ok(());
        }

        // 不可 seek, 逐块丢弃
        let mut left = remaining;
        let mut scratch = [0u8; 4096];
        while left > 0 {
            let want = left.min(scratch.len() as u64) as usize;
            let n = self.inner.read(&mut scratch[..want])?;
            if n == 0 {
                return Err(YunError::Eof);
            }
            left -= n as u64;
        }
        Ok(())
    }

    // ========================
    // 写入与定位方法
    // ========================

    /// 写入全部数据
    pub fn write_all(&mut self, buf: &[u8]) -> YunResult<()> {
        self.inner.write_all(buf)?;
        Ok(())
    }

    /// 定位 (seek). 会清空预读缓冲区.
    pub fn seek(&mut self, pos: io::SeekFrom) -> YunResult<u64> {
        self.buf_pos = 0;
        self.buf_len = 0;
        Ok(self.inner.seek(pos)?)
    }

    /// 获取当前逻辑位置 (扣除预读缓冲中尚未消耗的数据量)
    pub fn position(&mut self) -> YunResult<u64> {
        let raw = self.inner.position()?;
        let buffered = (self.buf_len - self.buf_pos) as u64;
        Ok(raw - buffered)
    }

    /// 是否支持随机访问
    pub fn is_seekable(&self) -> bool {
        self.inner.is_seekable()
    }

    /// 获取总大小
    pub fn size(&self) -> Option<u64> {
        self.inner.size()
    }
}

/// 文件传输后端
pub struct FileTransport {
    file: std::fs::File,
    size: Option<u64>,
}

impl FileTransport {
    /// 包装一个已打开的文件
    pub fn new(file: std::fs::File) -> Self {
        let size = file.metadata().ok().map(|m| m.len());
        Self { file, size }
    }
}

impl Transport for FileTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.file.write_all(buf)
    }

    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }

    fn position(&mut self) -> io::Result<u64> {
        self.file.stream_position()
    }

    fn size(&self) -> Option<u64> {
        self.size
    }

    fn is_seekable(&self) -> bool {
        true
    }
}

/// 内存缓冲区传输后端
///
/// 用于测试和内存中处理.
pub struct MemoryTransport {
    /// 数据缓冲区
    data: Vec<u8>,
    /// 当前位置
    pos: usize,
}

impl MemoryTransport {
    /// 从已有数据创建 (用于读取)
    pub fn from_data(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }

    /// 创建空缓冲区 (用于写入)
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            pos: 0,
        }
    }

    /// 获取内部数据的引用
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// 消耗自身, 返回内部数据
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MemoryTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.data.len().saturating_sub(self.pos);
        let to_read = buf.len().min(available);
        if to_read == 0 {
            return Ok(0);
        }
        buf[..to_read].copy_from_slice(&self.data[self.pos..self.pos + to_read]);
        self.pos += to_read;
        Ok(to_read)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        if self.pos >= self.data.len() {
            self.data.extend_from_slice(buf);
        } else {
            // 覆盖已有数据, 超出部分追加
            let overlap = (self.data.len() - self.pos).min(buf.len());
            self.data[self.pos..self.pos + overlap].copy_from_slice(&buf[..overlap]);
            if buf.len() > overlap {
                self.data.extend_from_slice(&buf[overlap..]);
            }
        }
        self.pos += buf.len();
        Ok(())
    }

    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            io::SeekFrom::Start(offset) => offset as i64,
            io::SeekFrom::End(offset) => self.data.len() as i64 + offset,
            io::SeekFrom::Current(offset) => self.pos as i64 + offset,
        };
        if new_pos < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek 位置不能为负",
            ));
        }
        self.pos = new_pos as usize;
        Ok(self.pos as u64)
    }

    fn position(&mut self) -> io::Result<u64> {
        Ok(self.pos as u64)
    }

    fn size(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }

    fn is_seekable(&self) -> bool {
        true
    }
}
