//! 统一错误类型定义.
//!
//! 所有 Yun crate 共用的错误类型, 支持跨模块传播.
//!
//! 错误分类与可恢复性:
//! - `Io`: 传输层错误 (短读, I/O 失败), 总是致命, 由上层决定是否重试
//! - `Sync`: 输入耗尽仍未找到有效帧头, 与传输错误严格区分,
//!   调用方据此分辨 "不是 MPEG 流" 和 "I/O 坏了"
//! - `FormatDrift`: 流中途声道数或采样率发生变化, 不可恢复
//! - `Codec`: 解码引擎报错, 本会话致命, 不做部分帧恢复

use thiserror::Error;

/// Yun 框架统一错误类型
#[derive(Debug, Error)]
pub enum YunError {
    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 不支持的操作或布局 (如多于 2 个声道)
    #[error("不支持: {0}")]
    Unsupported(String),

    /// 解码引擎错误
    #[error("解码引擎错误: {0}")]
    Codec(String),

    /// 同步失败 (输入耗尽前未找到有效的 MPEG 帧头)
    #[error("同步失败: {0}")]
    Sync(String),

    /// 流中途格式变化 (声道数或采样率与会话建立时不一致)
    #[error("格式漂移: {0}")]
    FormatDrift(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 数据不足, 需要更多输入
    #[error("数据不足, 需要更多输入")]
    NeedMoreData,

    /// 已到达流末尾
    #[error("已到达流末尾")]
    Eof,

    /// 无效数据 (损坏的码流等)
    #[error("无效数据: {0}")]
    InvalidData(String),

    /// 内部错误 (不应发生)
    #[error("内部错误: {0}")]
    Internal(String),
}

/// Yun 框架统一 Result 类型
pub type YunResult<T> = Result<T, YunError>;
