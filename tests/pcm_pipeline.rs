//! 端到端管线测试: 同步 → 解码会话 → PCM 组装 → WAV 写出.
//!
//! 帧解码引擎用脚本化桩实现 (能力边界的另一个实现方), 流本身是
//! 合成的: 垃圾前导 + ID3v2 标签 + 有效帧头 + 填充字节.

use std::collections::VecDeque;

use yun::codec::header::{ChannelMode, MpegVersion};
use yun::codec::{DecodeOutcome, DecoderState, FrameDecoder, MpegLayer};
use yun::core::endian::read_le;
use yun::core::{YunError, YunResult};
use yun::stream::{
    DecodeSession, IcyTransport, MemoryTransport, StreamIo, TotalSamples, WavWriter,
};

/// MPEG-2 Layer III, 32kbps, 22050Hz, 单声道帧头 (帧大小 104 字节)
const FRAME_HEADER: [u8; 4] = [0xFF, 0xF3, 0x40, 0xC0];
/// 与帧头一致的帧字节数
const FRAME_BYTES: usize = 104;
/// 每帧交错采样数 (单声道 576)
const SPF: usize = 576;
/// 单声道 Layer III 的前端修剪量: 576 + 529
const FRONT_SKIP: usize = 1105;

/// 脚本化桩引擎: 每凑满一帧字节吐出一批预置采样
struct ScriptedDecoder {
    state: DecoderState,
    frames: VecDeque<Vec<i16>>,
    buffered: usize,
    drift_after: Option<usize>,
    produced: usize,
}

impl ScriptedDecoder {
    fn new(frames: Vec<Vec<i16>>) -> Self {
        Self {
            state: DecoderState::default(),
            frames: frames.into(),
            buffered: 0,
            drift_after: None,
            produced: 0,
        }
    }
}

impl FrameDecoder for ScriptedDecoder {
    fn name(&self) -> &str {
        "scripted"
    }

    fn decode(&mut self, input: &[u8], output: &mut [i16]) -> YunResult<DecodeOutcome> {
        self.buffered += input.len();
        if !self.state.header_parsed && self.buffered > 0 {
            self.state = DecoderState {
                header_parsed: true,
                version: Some(MpegVersion::Mpeg2),
                layer: Some(MpegLayer::Layer3),
                mode: Some(ChannelMode::SingleChannel),
                sample_rate_index: 3, // 22050 Hz
                bitrate_index: 4,     // 32 kbps
                ..DecoderState::default()
            };
        }
        if self.buffered < FRAME_BYTES || self.frames.is_empty() {
            return Ok(DecodeOutcome::NeedMoreData);
        }
        self.buffered -= FRAME_BYTES;
        let frame = self.frames.pop_front().unwrap();
        output[..frame.len()].copy_from_slice(&frame);
        self.state.frame_size = SPF;
        self.state.prev_frame_size = FRAME_BYTES;
        self.produced += 1;
        if let Some(k) = self.drift_after {
            if self.produced > k {
                self.state.mode = Some(ChannelMode::Stereo);
            }
        }
        Ok(DecodeOutcome::Produced(frame.len()))
    }

    fn state(&self) -> &DecoderState {
        &self.state
    }

    fn reset(&mut self) {
        self.buffered = 0;
        self.frames.clear();
    }
}

/// 合成输入流: 垃圾前导 + ID3v2 标签 + 帧头 + 填充到给定帧数的字节量
fn synth_stream(garbage: usize, id3_body: usize, frames: usize) -> Vec<u8> {
    let mut data: Vec<u8> = (0..garbage).map(|i| (i % 0xFE) as u8).collect();
    data.extend_from_slice(b"ID3\x04\x00\x00");
    data.extend_from_slice(&[
        0,
        0,
        ((id3_body >> 7) & 0x7F) as u8,
        (id3_body & 0x7F) as u8,
    ]);
    data.extend(std::iter::repeat_n(0x55u8, id3_body));
    data.extend_from_slice(&FRAME_HEADER);
    // 帧头后补足 frames 帧的数据量
    data.extend(std::iter::repeat_n(0u8, frames * FRAME_BYTES));
    data
}

/// 跨帧连续的斜坡采样
fn ramp_frames(frames: usize) -> Vec<Vec<i16>> {
    (0..frames)
        .map(|k| ((k * SPF) as i16..(k * SPF + SPF) as i16).collect())
        .collect()
}

/// 完整跑一遍解码到 WAV, 返回 (输出字节, 写出的采样数)
fn decode_to_wav(
    input: Vec<u8>,
    decoder: ScriptedDecoder,
) -> YunResult<(Vec<u8>, u64)> {
    let mut io = StreamIo::new(Box::new(MemoryTransport::from_data(input)));
    let mut session = DecodeSession::open(&mut io, Box::new(decoder))?;

    let format = session.format().clone();
    let mut out_io = StreamIo::new(Box::new(MemoryTransport::new()));
    let mut wav = WavWriter::new(format.channels, format.sample_rate)?;
    wav.write_header(&mut out_io)?;

    let mut buf = vec![0i16; yun::stream::MAX_FRAME_SAMPLES];
    let mut written = 0u64;
    loop {
        let n = session.read_samples(&mut io, &mut buf)?;
        if n == 0 {
            break;
        }
        wav.write_samples(&mut out_io, &buf[..n])?;
        written += n as u64;
    }
    wav.finalize(&mut out_io)?;

    out_io.seek(std::io::SeekFrom::Start(0))?;
    let total = out_io.size().unwrap() as usize;
    let mut bytes = vec![0u8; total];
    out_io.read_exact(&mut bytes)?;
    Ok((bytes, written))
}

#[test]
fn test_管线_合成流到_wav() {
    let frames = 6;
    let input = synth_stream(37, 120, frames + 1);
    let decoder = ScriptedDecoder::new(ramp_frames(frames));

    let (wav, written) = decode_to_wav(input, decoder).unwrap();

    // 修剪后的采样数
    let expect = frames * SPF - FRONT_SKIP;
    assert_eq!(written as usize, expect);

    // 头部字段
    assert_eq!(&wav[0..4], b"RIFF");
    assert_eq!(&wav[8..12], b"WAVE");
    assert_eq!(read_le(&wav, 22, 2), 1); // 单声道
    assert_eq!(read_le(&wav, 24, 4), 22050);
    assert_eq!(read_le(&wav, 40, 4), (expect * 2) as u64);
    assert_eq!(read_le(&wav, 4, 4), (expect * 2 + 36) as u64);
    assert_eq!(wav.len(), 44 + expect * 2);

    // PCM 连续性: 第一个输出采样应是连续斜坡的第 FRONT_SKIP 个
    let first = read_le(&wav, 44, 2) as i16;
    assert_eq!(first, FRONT_SKIP as i16);
    let second = read_le(&wav, 46, 2) as i16;
    assert_eq!(second, FRONT_SKIP as i16 + 1);
    // 最后一个采样 = frames*SPF - 1
    let last = read_le(&wav, 44 + (expect - 1) * 2, 2) as i16;
    assert_eq!(last, (frames * SPF - 1) as i16);
}

#[test]
fn test_管线_id3_标签透传() {
    let input = synth_stream(0, 64, 3);
    let mut io = StreamIo::new(Box::new(MemoryTransport::from_data(input)));
    let session = DecodeSession::open(&mut io, Box::new(ScriptedDecoder::new(vec![]))).unwrap();

    let tag = session.id3v2_tag().expect("应保留第一个 ID3v2 标签");
    assert_eq!(tag.len(), 10 + 64);
    assert_eq!(&tag[..3], b"ID3");
}

#[test]
fn test_管线_格式漂移_中止且输出未回填() {
    let frames = 5;
    let input = synth_stream(0, 0, frames + 1);
    let mut decoder = ScriptedDecoder::new(ramp_frames(frames));
    decoder.drift_after = Some(2);

    let mut io = StreamIo::new(Box::new(MemoryTransport::from_data(input)));
    let mut session = DecodeSession::open(&mut io, Box::new(decoder)).unwrap();

    let format = session.format().clone();
    let mut out_io = StreamIo::new(Box::new(MemoryTransport::new()));
    let mut wav = WavWriter::new(format.channels, format.sample_rate).unwrap();
    wav.write_header(&mut out_io).unwrap();

    let mut buf = vec![0i16; yun::stream::MAX_FRAME_SAMPLES];
    let err = loop {
        match session.read_samples(&mut io, &mut buf) {
            Ok(0) => panic!("应以格式漂移错误终止"),
            Ok(n) => wav.write_samples(&mut out_io, &buf[..n]).unwrap(),
            Err(e) => break e,
        }
    };
    assert!(matches!(err, YunError::FormatDrift(_)));

    // 回填是最后一步, 中止的会话留下全零大小字段, 标示输出不完整
    out_io.seek(std::io::SeekFrom::Start(0)).unwrap();
    let mut head = [0u8; 44];
    out_io.read_exact(&mut head).unwrap();
    assert_eq!(read_le(&head, 4, 4), 0);
    assert_eq!(read_le(&head, 40, 4), 0);
}

#[test]
fn test_管线_经过_icy_装饰器() {
    // 把合成流按 icy 周期交错上元数据块, 再走完整管线:
    // 音频语义必须与未装饰时完全一致
    let frames = 4;
    let plain = synth_stream(11, 32, frames + 1);
    let period = 64usize;

    let mut meta = b"StreamTitle='Yun Radio';".to_vec();
    meta.resize(meta.len().div_ceil(16) * 16, 0);

    let mut interleaved = Vec::new();
    for (i, chunk) in plain.chunks(period).enumerate() {
        interleaved.extend_from_slice(chunk);
        if chunk.len() == period {
            if i == 0 {
                interleaved.push((meta.len() / 16) as u8);
                interleaved.extend_from_slice(&meta);
            } else {
                interleaved.push(0);
            }
        }
    }

    let titles = std::sync::Arc::new(std::sync::Mutex::new(Vec::<String>::new()));
    let sink_titles = std::sync::Arc::clone(&titles);
    let icy = IcyTransport::new(
        Box::new(MemoryTransport::from_data(interleaved)),
        period,
        Some(Box::new(move |t: &str| {
            sink_titles.lock().unwrap().push(t.to_string());
        })),
    );

    let mut io = StreamIo::new(Box::new(icy));
    let mut session =
        DecodeSession::open(&mut io, Box::new(ScriptedDecoder::new(ramp_frames(frames)))).unwrap();

    let mut buf = vec![0i16; yun::stream::MAX_FRAME_SAMPLES];
    let mut collected = Vec::new();
    loop {
        let n = session.read_samples(&mut io, &mut buf).unwrap();
        if n == 0 {
            break;
        }
        collected.extend_from_slice(&buf[..n]);
    }

    assert_eq!(collected.len(), frames * SPF - FRONT_SKIP);
    assert_eq!(collected[0], FRONT_SKIP as i16);
    assert_eq!(titles.lock().unwrap().as_slice(), ["Yun Radio"]);
    // icy 流不可随机访问 → 无文件大小 → 总长只能未知
    assert_eq!(session.total_samples(), TotalSamples::Unknown);
}
