//! # 中间模型
//!
//! - `DecodedPayload`：解码得到的原始图片字节与摘要
//! - `RecognizedImage`：嗅探并解码成功的图片
//! - `ProcessOutcome`：一次提取的最终结果，决定状态行与返回值

use std::path::PathBuf;

use image::{DynamicImage, ImageFormat};

use super::ExtractError;

/// Base64 解码阶段输出。
pub(crate) struct DecodedPayload {
    /// 解码后的字节，原样写入文件。
    pub(crate) bytes: Vec<u8>,
    /// 小写十六进制 SHA-256。
    pub(crate) digest: String,
}

/// 嗅探阶段输出。
pub(crate) struct RecognizedImage {
    pub(crate) image: DynamicImage,
    pub(crate) format: ImageFormat,
    /// 从内容嗅探出的扩展名，例如 `png`、`jpg`。
    pub(crate) sniffed_extension: &'static str,
}

/// 放弃处理的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclineReason {
    /// 格式不是本处理器声明的格式
    NotForUs,
    EmptyStream,
    /// 字符集与 Base64 不一致
    IncongruentCharset(String),
}

/// 一次提取的结果。
#[derive(Debug)]
pub enum ProcessOutcome {
    Declined(DeclineReason),
    /// 停止请求打断了处理
    Aborted,
    /// 数据不是可识别的图片
    NoImage,
    Duplicate { digest: String, path: PathBuf },
    Saved { digest: String, path: PathBuf, sequence: u64 },
    Failed(ExtractError),
}

impl ProcessOutcome {
    /// 只有保存成功或确认重复才算“已处理”。
    pub fn is_handled(&self) -> bool {
        matches!(self, Self::Saved { .. } | Self::Duplicate { .. })
    }

    /// 面向用户的状态行
    pub fn status_line(&self) -> String {
        match self {
            Self::Declined(DeclineReason::NotForUs) => "不支持的剪贴板格式，跳过".to_string(),
            Self::Declined(DeclineReason::EmptyStream) => "剪贴板数据为空".to_string(),
            Self::Declined(DeclineReason::IncongruentCharset(name)) => {
                format!("字符集 {name} 与 Base64 不兼容，跳过")
            }
            Self::Aborted => "处理已中止".to_string(),
            Self::NoImage => "数据不是可识别的图片，已丢弃摘要".to_string(),
            Self::Duplicate { path, .. } => format!("重复内容，已保存于 {}", path.display()),
            Self::Saved { path, .. } => format!("文件已保存：{}", path.display()),
            Self::Failed(err) => format!("处理失败：{err}"),
        }
    }
}
