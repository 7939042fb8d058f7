//! # 图片提取模块（extractor）
//!
//! ## 设计思路
//!
//! 把“剪贴板文本 → Base64 图片文件”的过程按职责拆分为多个子模块：
//!
//! - `handler`：编排整条处理流水线，实现 [`FormatProcessor`](crate::clipboard::FormatProcessor)
//! - `header`：预读并识别 `data:image/<type>,` 数据头
//! - `pipeline`：嗅探、尺寸上限检查与解码
//! - `record`：摘要到已保存文件的映射
//! - `config/error/source`：配置、错误、中间数据模型
//!
//! ## 调用链
//!
//! ```text
//! ClipboardService 工作线程
//!    ↓
//! handler.rs（阶段编排 + 停止检查 + 耗时日志）
//!    ├─ header.rs（预读 + BOM + 数据头）
//!    ├─ stream（逐单元取字节 + Base64 解码 + SHA-256）
//!    ├─ pipeline.rs（嗅探 + 像素限制 + 解码）
//!    └─ record.rs（去重）
//!    ↓
//! ProgressModel（状态行 / 状态栏 / 预览 / 序号）
//! ```

mod config;
mod error;
mod handler;
mod header;
mod pipeline;
mod record;
mod source;

pub use config::ExtractorConfig;
pub use error::ExtractError;
pub use handler::ImageExtractor;
pub use record::DigestRecord;
pub use source::{DeclineReason, ProcessOutcome};
