//! # 图片识别流水线
//!
//! ## 设计思路
//!
//! 解码得到的字节先按魔数嗅探，再读取图片头中的尺寸做资源上限检查，
//! 最后才完整解码。恶意或超大的输入在完整解码前就被拒绝。
//!
//! ## 实现思路
//!
//! 1. `infer` 按魔数判断是否是图片，并给出扩展名
//! 2. `image::guess_format` 确认能解码的格式
//! 3. 读取图片头尺寸，按像素数与 RGBA 字节数预算快速拒绝
//! 4. 完整解码，结果用于预览

use std::io::Cursor;

use image::GenericImageView;

use super::source::RecognizedImage;
use super::{ExtractError, ExtractorConfig};

/// 识别并解码图片。不是可识别的图片时返回 `Ok(None)`。
pub(crate) fn recognize_image(
    bytes: &[u8],
    config: &ExtractorConfig,
) -> Result<Option<RecognizedImage>, ExtractError> {
    let Some(kind) = infer::get(bytes).filter(|kind| kind.matcher_type() == infer::MatcherType::Image)
    else {
        return Ok(None);
    };

    let format = match image::guess_format(bytes) {
        Ok(format) => format,
        Err(err) => {
            log::debug!("内容被识别为 {}，但无法解码：{}", kind.mime_type(), err);
            return Ok(None);
        }
    };

    let (declared_width, declared_height) = payload_dimensions(bytes)?;
    check_decode_budget(config, declared_width, declared_height)?;

    let image = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| ExtractError::Decode(format!("图片解码失败：{}", e)))?;

    let (width, height) = image.dimensions();
    log::info!(
        "✅ 图片解码成功 - 格式: {:?} 尺寸: {}x{} 大小: {} 字节",
        format,
        width,
        height,
        bytes.len()
    );

    Ok(Some(RecognizedImage {
        image,
        format,
        sniffed_extension: kind.extension(),
    }))
}

/// 从载荷的图片头读出声明的宽高，不解码像素。
fn payload_dimensions(bytes: &[u8]) -> Result<(u32, u32), ExtractError> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ExtractError::InvalidFormat(format!("载荷不是可读的图片：{}", e)))?;
    reader
        .into_dimensions()
        .map_err(|e| ExtractError::InvalidFormat(format!("载荷的图片头缺少尺寸：{}", e)))
}

/// 按图片头尺寸检查像素数与 RGBA 展开后的字节数是否超出上限。
fn check_decode_budget(config: &ExtractorConfig, width: u32, height: u32) -> Result<(), ExtractError> {
    let over_budget = |what: &str| {
        ExtractError::ResourceLimit(format!("剪贴板图片 {}x{} 的{}超出上限", width, height, what))
    };

    let pixels = u64::from(width) * u64::from(height);
    if pixels > config.max_decoded_pixels {
        return Err(over_budget(&format!("像素数 {}（上限 {}）", pixels, config.max_decoded_pixels)));
    }

    let rgba_bytes = pixels.checked_mul(4).ok_or_else(|| over_budget("解码字节数"))?;
    if rgba_bytes > config.max_decoded_bytes {
        return Err(over_budget(&format!(
            "解码字节数 {}（上限 {}）",
            rgba_bytes, config.max_decoded_bytes
        )));
    }

    Ok(())
}
