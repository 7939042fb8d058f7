//! # 错误模型模块
//!
//! 单一错误枚举承载提取链路中的所有错误来源，调用侧可按分支匹配，
//! 日志与状态行直接使用 `Display` 输出。

use crate::clipboard::ClipboardError;

/// 图片提取统一错误类型。
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("解码错误：{0}")]
    Decode(String),

    #[error("格式错误：{0}")]
    InvalidFormat(String),

    #[error("文件错误：{0}")]
    FileSystem(String),

    #[error("资源限制：{0}")]
    ResourceLimit(String),

    #[error("剪贴板错误：{0}")]
    Clipboard(#[from] ClipboardError),
}
