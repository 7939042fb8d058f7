//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 各模块保留自己的错误枚举（`ClipboardError`、`ServiceError`、`ExtractError`、
//! `CharsetError`），在程序入口和设置存储处汇总为 `AppError`。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为各模块错误提供 `#[from]` 转换，调用侧直接使用 `?`。

use crate::charset::CharsetError;
use crate::clipboard::{ClipboardError, ServiceError};
use crate::extractor::ExtractError;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("剪贴板操作失败: {0}")]
    Clipboard(#[from] ClipboardError),

    #[error("服务状态错误: {0}")]
    Service(#[from] ServiceError),

    /// 图片提取链路错误（解码 / 识别 / 保存）
    #[error("{0}")]
    Extract(#[from] ExtractError),

    #[error("字符集错误: {0}")]
    Charset(#[from] CharsetError),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// 设置文件无法读写
    #[error("设置存储错误: {0}")]
    Settings(String),
}
