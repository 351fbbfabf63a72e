//! PCM 组装缓冲区.
//!
//! 跨多次解码调用累积交错 i16 采样, 并对外暴露修剪后的逻辑窗口:
//! 前端丢弃编码器前置延迟 (skip-start), 尾端扣留编码器填充 (skip-end).
//!
//! 不变量:
//! - skip-start 单调消耗到 0; skip-end 恒定, 只从逻辑末尾扣除
//! - 任意时刻 `0 <= used <= allocated`
//! - 越过 skip-start 阶段后, 累计追加数 - 累计取出数 == used,
//!   没有采样被复制或悄悄丢弃

/// 前后端修剪窗口 (交错采样单位, 已乘声道数)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipWindow {
    /// 从输出前端丢弃的采样数
    pub start: usize,
    /// 从输出尾端扣留的采样数
    pub end: usize,
}

/// PCM 组装缓冲区
///
/// 所有权归解码会话独占; 增长时完整搬运已有数据, 不丢不重.
#[derive(Debug, Default)]
pub struct PcmBuffer {
    /// 已缓冲的交错采样 (len = used, capacity = allocated)
    data: Vec<i16>,
    /// 修剪窗口
    skip: SkipWindow,
}

impl PcmBuffer {
    /// 创建空缓冲区
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置修剪窗口. 会话建立后调用一次.
    pub fn set_skip(&mut self, skip: SkipWindow) {
        self.skip = skip;
    }

    /// skip-start 尚未消耗的余量
    pub fn skip_start_remaining(&self) -> usize {
        self.skip.start
    }

    /// 当前有效采样数 (含被 skip-end 扣留的部分)
    pub fn used(&self) -> usize {
        self.data.len()
    }

    /// 可供取出的采样数 (`used - skip_end`, 下限 0)
    pub fn available(&self) -> usize {
        self.data.len().saturating_sub(self.skip.end)
    }

    /// 追加一批解码产出, 返回追加后的可取采样数.
    ///
    /// skip-start 余量足以吞掉整批时只做扣减 (整批按前置延迟丢弃);
    /// 否则把 `[skip_start..)` 区间拷入尾部并清零 skip-start.
    pub fn append(&mut self, samples: &[i16]) -> usize {
        if self.skip.start >= samples.len() {
            self.skip.start -= samples.len();
            return self.available();
        }
        self.data.extend_from_slice(&samples[self.skip.start..]);
        self.skip.start = 0;
        self.available()
    }

    /// 按 FIFO 取出至多 `out.len()` 个采样, 返回实际取出数.
    ///
    /// 取出后剩余数据左移压实; 取出数不超过可取数, `used` 不会下溢.
    pub fn take(&mut self, out: &mut [i16]) -> usize {
        let take = out.len().min(self.available());
        if take > 0 {
            out[..take].copy_from_slice(&self.data[..take]);
            self.data.copy_within(take.., 0);
            self.data.truncate(self.data.len() - take);
        }
        take
    }
}
