//! yun - MPEG 音频解码命令行工具
//!
//! 把 mp3 文件或 SHOUTcast/Icecast 电台流解码为 PCM WAV 文件.

mod logging;

use clap::Parser;
use std::process;
use tracing::{error, info};

use yun_codec::decoders::MpaFrameDecoder;
use yun_core::{YunError, YunResult};
use yun_stream::session::MAX_FRAME_SAMPLES;
use yun_stream::{DecodeSession, StreamIo, TotalSamples, WavWriter};

#[derive(Parser, Debug)]
#[command(name = "yun", version, about = "纯 Rust MPEG 音频解码工具")]
struct Cli {
    /// 输入文件路径或 http(s):// 电台地址
    input: String,

    /// 输出 WAV 文件路径
    output: String,

    /// 覆盖已存在的输出文件
    #[arg(short = 'y', long = "overwrite")]
    overwrite: bool,

    /// 不向电台请求元数据
    #[arg(long = "no-metadata")]
    no_metadata: bool,

    /// 日志详细程度 (-v debug, -vv trace)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    logging::init("yun-cli", cli.verbose);

    if let Err(e) = run(&cli) {
        error!("解码失败: {e}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> YunResult<()> {
    if !cli.overwrite && std::path::Path::new(&cli.output).exists() {
        return Err(YunError::InvalidArgument(format!(
            "输出文件已存在 '{}', 使用 -y 覆盖",
            cli.output
        )));
    }

    let mut input = open_input(cli)?;
    let decoder = Box::new(MpaFrameDecoder::new()?);
    let mut session = DecodeSession::open(&mut input, decoder)?;
    print_input_format(&session);

    let format = session.format().clone();
    let mut out_io = StreamIo::open_write(&cli.output)?;
    let mut wav = WavWriter::new(format.channels, format.sample_rate)?;
    wav.write_header(&mut out_io)?;

    info!(
        "开始解码 {} → {} (引擎: {})",
        cli.input,
        cli.output,
        session.decoder_name()
    );
    let mut buf = vec![0i16; MAX_FRAME_SAMPLES];
    let mut written: u64 = 0;
    // 每 10 秒音频报一次进度
    let report_step = u64::from(format.sample_rate * format.channels) * 10;
    let mut next_report = report_step;
    loop {
        let n = session.read_samples(&mut input, &mut buf)?;
        if n == 0 {
            break;
        }
        wav.write_samples(&mut out_io, &buf[..n])?;
        written += n as u64;
        if written >= next_report {
            report_progress(written, session.total_samples(), &format);
            next_report += report_step;
        }
    }

    let data_size = wav.finalize(&mut out_io)?;
    info!("完成: 共写出 {written} 采样, data 块 {data_size} 字节");
    Ok(())
}

/// 打开输入: 本地文件或电台流
fn open_input(cli: &Cli) -> YunResult<StreamIo> {
    if cli.input.starts_with("http://") || cli.input.starts_with("https://") {
        let sink = Box::new(|title: &str| {
            info!("正在播放: {title}");
        });
        return yun_stream::open_icy_url(&cli.input, !cli.no_metadata, Some(sink));
    }
    StreamIo::open_read(&cli.input)
}

/// 输入格式横幅 (版本号由采样率推断)
fn print_input_format(session: &DecodeSession) {
    let f = session.format();
    let v_main = if f.sample_rate > 22050 && f.sample_rate <= 48000 {
        1
    } else {
        2
    };
    let v_ex = if f.sample_rate < 16000 { ".5" } else { "" };
    info!(
        "输入: {} Hz, {} 声道, {} kbps, MPEG-{}{} {}{}",
        f.sample_rate,
        f.channels,
        f.bitrate_kbps,
        v_main,
        v_ex,
        f.layer,
        if f.free_format { " (自由格式)" } else { "" },
    );
    match session.total_samples() {
        TotalSamples::Known(n) => info!("总采样数 (VBR 头声明): {n}"),
        TotalSamples::Estimated(n) => info!("总采样数 (按文件大小估算): {n}"),
        TotalSamples::Unknown => {}
    }
    if let Some(tag) = session.id3v2_tag() {
        info!("ID3v2 标签: {} 字节 (原样保留)", tag.len());
    }
}

/// 进度报告
fn report_progress(written: u64, total: TotalSamples, format: &yun_stream::FrameFormat) {
    let seconds = written as f64 / f64::from(format.sample_rate * format.channels);
    match total {
        TotalSamples::Known(n) | TotalSamples::Estimated(n) if n > 0 => {
            info!(
                "进度: {seconds:.1}s ({:.0}%)",
                written as f64 / n as f64 * 100.0
            );
        }
        _ => info!("进度: {seconds:.1}s"),
    }
}
