//! 周期交错元数据流 (SHOUTcast / Icecast).
//!
//! 电台流在每 `period` 个音频字节之后插入一个元数据块:
//! ```text
//! 长度: 1 字节 (单位 16 字节) | 文本: 变长 ("StreamTitle='...';")
//! ```
//! 本模块把它实现为传输装饰器: 交给消费方的字节永远只有音频,
//! 元数据块被透明剥离, 经发布式回调通知出去. `period` 为 0 时完全直通.
//!
//! 这是核心同步/组装契约之外的独立组件, 不参与同步器逻辑.

use encoding_rs::WINDOWS_1252;
use log::{debug, warn};
use std::io;

use crate::io::Transport;

/// 元数据发布回调
pub type MetadataSink = Box<dyn FnMut(&str) + Send>;

/// 元数据块最大长度 (255 * 16 字节)
const MAX_METADATA_LEN: usize = 255 * 16;

/// 周期交错元数据传输装饰器
pub struct IcyTransport {
    /// 底层传输 (网络流等, 通常不可 seek)
    inner: Box<dyn Transport>,
    /// 元数据周期 (两个元数据块之间的音频字节数, 0 = 无元数据)
    period: usize,
    /// 当前周期内已交付的音频字节数
    read_pos: usize,
    /// 已交付的音频字节总数 (对外的逻辑位置)
    delivered: u64,
    /// 元数据块暂存
    meta_buf: Vec<u8>,
    /// 发布回调
    sink: Option<MetadataSink>,
}

impl IcyTransport {
    /// 包装底层传输.
    ///
    /// `period` 来自服务端 `icy-metaint` 响应头; `sink` 为 `None` 时
    /// 元数据仍被剥离, 只是不通知.
    pub fn new(inner: Box<dyn Transport>, period: usize, sink: Option<MetadataSink>) -> Self {
        Self {
            inner,
            period,
            read_pos: 0,
            delivered: 0,
            meta_buf: vec![0u8; MAX_METADATA_LEN],
            sink,
        }
    }

    /// 把元数据块的 `len` 字节从底层读满, 中途 EOF 视为传输损坏
    fn fill_metadata(&mut self, len: usize) -> io::Result<()> {
        let mut done = 0;
        while done < len {
            let n = self.inner.read(&mut self.meta_buf[done..len])?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "元数据块中途流结束",
                ));
            }
            done += n;
        }
        Ok(())
    }

    /// 消费一个元数据块并发布标题
    fn consume_metadata_block(&mut self) -> io::Result<()> {
        let mut len_byte = [0u8; 1];
        let n = self.inner.read(&mut len_byte)?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "元数据长度字节处流结束",
            ));
        }
        let len = usize::from(len_byte[0]) << 4;
        if len == 0 {
            return Ok(());
        }
        self.fill_metadata(len)?;

        let text = decode_metadata_text(&self.meta_buf[..len]);
        debug!("icy: 元数据块 {len} 字节");
        if let Some(title) = extract_stream_title(&text) {
            if let Some(sink) = self.sink.as_mut() {
                sink(title);
            }
        }
        Ok(())
    }
}

/// 元数据文本解码: 先按 UTF-8, 有错字节再按 Windows-1252 兜底
fn decode_metadata_text(raw: &[u8]) -> String {
    // 尾部补零是协议填充, 去掉
    let trimmed = match raw.iter().position(|&b| b == 0) {
        Some(end) => &raw[..end],
        None => raw,
    };
    match std::str::from_utf8(trimmed) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (text, _, had_errors) = WINDOWS_1252.decode(trimmed);
            if had_errors {
                warn!("icy: 元数据文本无法完全解码");
            }
            text.into_owned()
        }
    }
}

/// 从元数据文本提取 `StreamTitle` 值.
///
/// `StreamTitle=` 后紧跟 `'` 或 `"` 时以其为界, 否则以 `;` 为界;
/// 找不到结束定界符时取到文本末尾.
fn extract_stream_title(text: &str) -> Option<&str> {
    let start = text.find("StreamTitle=")? + "StreamTitle=".len();
    let rest = &text[start..];
    let (delim, body_start) = match rest.as_bytes().first() {
        Some(b'\'') => ('\'', 1),
        Some(b'"') => ('"', 1),
        _ => (';', 0),
    };
    let body = &rest[body_start..];
    let end = body.find(delim).unwrap_or(body.len());
    Some(&body[..end])
}

impl Transport for IcyTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.period == 0 {
            let n = self.inner.read(buf)?;
            self.delivered += n as u64;
            return Ok(n);
        }

        if self.read_pos >= self.period {
            self.consume_metadata_block()?;
            self.read_pos = 0;
        }

        // 周期边界处允许短读, 调用方自行循环
        let want = buf.len().min(self.period - self.read_pos);
        let n = self.inner.read(&mut buf[..want])?;
        self.read_pos += n;
        self.delivered += n as u64;
        Ok(n)
    }

    fn write_all(&mut self, _buf: &[u8]) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "icy 流不支持写入",
        ))
    }

    fn seek(&mut self, _pos: io::SeekFrom) -> io::Result<u64> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "icy 流不支持 seek",
        ))
    }

    fn position(&mut self) -> io::Result<u64> {
        Ok(self.delivered)
    }

    fn size(&self) -> Option<u64> {
        None
    }

    fn is_seekable(&self) -> bool {
        false
    }
}

// ========================
// HTTP 电台流打开 (http 特性)
// ========================

/// 不可 seek 的 HTTP 响应体传输
#[cfg(feature = "http")]
struct HttpBodyTransport {
    reader: Box<dyn io::Read + Send>,
    pos: u64,
}

#[cfg(feature = "http")]
impl Transport for HttpBodyTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.reader.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }

    fn write_all(&mut self, _buf: &[u8]) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "HTTP 流不支持写入",
        ))
    }

    fn seek(&mut self, _pos: io::SeekFrom) -> io::Result<u64> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "HTTP 流不支持 seek",
        ))
    }

    fn position(&mut self) -> io::Result<u64> {
        Ok(self.pos)
    }

    fn size(&self) -> Option<u64> {
        None
    }

    fn is_seekable(&self) -> bool {
        false
    }
}

/// 打开 SHOUTcast/Icecast 电台流.
///
/// 按 `Icy-MetaData` 协商元数据, 校验 Content-Type 为音频流,
/// 按 `icy-metaint` 头配置剥离周期. 返回的流只吐音频字节.
#[cfg(feature = "http")]
pub fn open_icy_url(
    url: &str,
    want_metadata: bool,
    sink: Option<MetadataSink>,
) -> yun_core::YunResult<crate::io::StreamIo> {
    use yun_core::YunError;

    log::info!("正在连接: {url}");
    let resp = ureq::get(url)
        .header("Accept", "*/*")
        .header("Icy-MetaData", if want_metadata { "1" } else { "0" })
        .call()
        .map_err(|e| YunError::Io(io::Error::other(format!("HTTP 请求失败: {e}"))))?;

    let content_type = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    if !content_type.starts_with("audio/") && !content_type.starts_with("application/ogg") {
        return Err(YunError::InvalidData(format!(
            "不是 SHOUTcast/Icecast 音频流: Content-Type = {content_type}"
        )));
    }

    let period = resp
        .headers()
        .get("icy-metaint")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    log::info!("icy: 已连接, Content-Type={content_type}, metaint={period}");

    let reader = resp.into_body().into_reader();
    let body = HttpBodyTransport {
        reader: Box::new(reader),
        pos: 0,
    };
    Ok(crate::io::StreamIo::new(Box::new(IcyTransport::new(
        Box::new(body),
        period,
        sink,
    ))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{MemoryTransport, StreamIo};
    use std::sync::{Arc, Mutex};

    /// 构造 period=8 的交错流: 音频为递增字节, 夹入给定元数据块
    fn interleaved_stream(audio_len: usize, title: &str) -> Vec<u8> {
        let mut meta = format!("StreamTitle='{title}';").into_bytes();
        let blocks = meta.len().div_ceil(16);
        meta.resize(blocks * 16, 0);

        let mut audio = (0..audio_len).map(|i| i as u8);
        let mut data = Vec::new();
        let mut emitted = 0;
        let mut first_block = true;
        while emitted < audio_len {
            let burst = (audio_len - emitted).min(8);
            data.extend(audio.by_ref().take(burst));
            emitted += burst;
            if emitted % 8 == 0 && emitted < audio_len {
                if first_block {
                    data.push(blocks as u8);
                    data.extend_from_slice(&meta);
                    first_block = false;
                } else {
                    data.push(0); // 空元数据块
                }
            }
        }
        data
    }

    fn collecting_sink() -> (MetadataSink, Arc<Mutex<Vec<String>>>) {
        let titles = Arc::new(Mutex::new(Vec::new()));
        let clone = Arc::clone(&titles);
        let sink: MetadataSink = Box::new(move |t: &str| {
            clone.lock().unwrap().push(t.to_string());
        });
        (sink, titles)
    }

    #[test]
    fn test_音频字节_不含元数据() {
        let (sink, titles) = collecting_sink();
        let data = interleaved_stream(32, "歌手 - 曲名");
        let inner = MemoryTransport::from_data(data);
        let mut io = StreamIo::new(Box::new(IcyTransport::new(
            Box::new(inner),
            8,
            Some(sink),
        )));

        let mut audio = [0u8; 32];
        io.read_exact(&mut audio).unwrap();
        // 交付的音频严格是递增序列, 元数据被完全剥离
        for (i, b) in audio.iter().enumerate() {
            assert_eq!(*b, i as u8);
        }
        assert_eq!(titles.lock().unwrap().as_slice(), ["歌手 - 曲名"]);
    }

    #[test]
    fn test_period_为零_直通() {
        let data: Vec<u8> = (0..64).collect();
        let inner = MemoryTransport::from_data(data.clone());
        let mut io = StreamIo::new(Box::new(IcyTransport::new(Box::new(inner), 0, None)));

        let mut out = vec![0u8; 64];
        io.read_exact(&mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_空元数据块_不发布() {
        let (sink, titles) = collecting_sink();
        // 8 音频 + 空块 + 8 音频
        let mut data: Vec<u8> = (0..8).collect();
        data.push(0);
        data.extend(8..16u8);
        let inner = MemoryTransport::from_data(data);
        let mut io = StreamIo::new(Box::new(IcyTransport::new(
            Box::new(inner),
            8,
            Some(sink),
        )));

        let mut audio = [0u8; 16];
        io.read_exact(&mut audio).unwrap();
        assert_eq!(audio[8], 8);
        assert!(titles.lock().unwrap().is_empty());
    }

    #[test]
    fn test_标题提取_定界符() {
        assert_eq!(
            extract_stream_title("StreamTitle='A - B';StreamUrl='';"),
            Some("A - B")
        );
        assert_eq!(
            extract_stream_title("StreamTitle=\"x'y\";"),
            Some("x'y")
        );
        // 无引号: 以分号为界
        assert_eq!(extract_stream_title("StreamTitle=plain;rest"), Some("plain"));
        // 无结束定界符: 取到末尾
        assert_eq!(extract_stream_title("StreamTitle='open"), Some("open"));
        assert_eq!(extract_stream_title("nothing here"), None);
    }

    #[test]
    fn test_文本解码_latin1_兜底() {
        // 0xE9 = é (Windows-1252), 不是合法 UTF-8
        let text = decode_metadata_text(b"StreamTitle='caf\xE9';\0\0");
        assert_eq!(extract_stream_title(&text), Some("café"));
    }
}
