//! PCM 组装缓冲与同步扫描基准.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use yun::stream::{MemoryTransport, PcmBuffer, SkipWindow, StreamIo, locate_first_frame};

/// 追加/取出往复: 模拟解码会话的稳态吞吐
fn bench_pcm_buffer(c: &mut Criterion) {
    c.bench_function("pcm_append_take", |b| {
        let batch = [0i16; 2 * 1152];
        let mut out = [0i16; 1024];
        b.iter(|| {
            let mut buf = PcmBuffer::new();
            buf.set_skip(SkipWindow { start: 2210, end: 0 });
            for _ in 0..16 {
                buf.append(black_box(&batch));
                while buf.take(&mut out) > 0 {}
            }
        })
    });
}

/// 4KB 垃圾前导上的逐字节同步扫描
fn bench_sync_scan(c: &mut Criterion) {
    let mut data: Vec<u8> = (0..4096).map(|i| (i % 0xFE) as u8).collect();
    data.extend_from_slice(&[0xFF, 0xFB, 0x90, 0x00]);

    c.bench_function("sync_scan_4k_garbage", |b| {
        b.iter(|| {
            let mut io = StreamIo::new(Box::new(MemoryTransport::from_data(data.clone())));
            black_box(locate_first_frame(&mut io).unwrap());
        })
    });
}

criterion_group!(benches, bench_pcm_buffer, bench_sync_scan);
criterion_main!(benches);
