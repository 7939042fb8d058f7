//! # 配置模块
//!
//! ## 设计思路
//!
//! 将提取链路的可调参数集中到 `ExtractorConfig`：数据头预读长度、读取块大小，
//! 以及解码前后的资源上限。`Default` 提供可直接使用的取值。

use super::ExtractError;

/// 预读至少要容纳 `data:image/` 前缀和一个短类型名
const MIN_LOOKAHEAD_CHARS: usize = 16;

/// 图片提取配置。
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// 识别 data URI 数据头时预读的字符数。
    pub lookahead_chars: usize,
    /// 每次从解码流读取的字节数，也是停止请求的检查粒度。
    pub read_chunk_size: usize,
    /// 解码后数据的最大字节数。
    pub max_payload_bytes: u64,
    /// 解码后的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 解码阶段允许的预计内存上限（按 RGBA 估算，字节）。
    pub max_decoded_bytes: u64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            lookahead_chars: 64,
            read_chunk_size: 8 * 1024,
            max_payload_bytes: 50 * 1024 * 1024,
            max_decoded_pixels: 40_000_000,
            max_decoded_bytes: 160 * 1024 * 1024,
        }
    }
}

impl ExtractorConfig {
    /// 校验配置是否可用。
    ///
    /// # 示例
    /// ```rust
    /// use clipboard_image_extractor::extractor::ExtractorConfig;
    ///
    /// let mut config = ExtractorConfig::default();
    /// assert!(config.validate().is_ok());
    /// config.read_chunk_size = 0;
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), ExtractError> {
        if self.lookahead_chars < MIN_LOOKAHEAD_CHARS {
            return Err(ExtractError::InvalidFormat(format!(
                "预读长度过短：{}（至少 {}）",
                self.lookahead_chars, MIN_LOOKAHEAD_CHARS
            )));
        }
        if self.read_chunk_size == 0 {
            return Err(ExtractError::InvalidFormat("读取块大小不能为 0".to_string()));
        }
        if self.max_payload_bytes == 0 || self.max_decoded_pixels == 0 || self.max_decoded_bytes == 0 {
            return Err(ExtractError::ResourceLimit("资源上限不能为 0".to_string()));
        }
        Ok(())
    }
}
