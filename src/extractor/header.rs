//! # 数据头识别
//!
//! 预读一小段字符，判断内容是否以 `data:image/<type>,` 开头。
//! 识别成功时只把逗号之后的字节交还给后续流；否则从第一个非空白字符起交还预读内容，
//! BOM 与开头的空白都不会进入 Base64 解码。

use std::io::Read;

use super::ExtractError;
use crate::charset::{detect_bom, ByteOrder, CharsetProfile};
use crate::clipboard::ClipboardError;
use crate::stream::read_full;

const DATA_URI_PREFIX: &str = "data:image/";

/// 预读结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HeaderScan {
    /// 数据头声明的类型，例如 `png;base64`
    pub(crate) declared_type: Option<String>,
    /// 流开头 BOM 给出的字节序
    pub(crate) stream_order: Option<ByteOrder>,
    /// 需要放回流前面的原始字节
    pub(crate) replay: Vec<u8>,
}

impl HeaderScan {
    /// 声明类型中 `;` 之前的部分，用作文件扩展名。
    pub(crate) fn declared_extension(&self) -> Option<&str> {
        self.declared_type
            .as_deref()
            .and_then(|declared| declared.split(';').next())
            .map(str::trim)
            .filter(|ext| !ext.is_empty())
    }
}

/// 预读并识别数据头。流为空时返回 `Ok(None)`。
pub(crate) fn scan_header<R: Read + ?Sized>(
    stream: &mut R,
    profile: &CharsetProfile,
    lookahead_chars: usize,
) -> Result<Option<HeaderScan>, ExtractError> {
    let unit = profile.bytes_per_unit;
    let mut chunk = vec![0u8; unit * lookahead_chars];
    let read = read_full(stream, &mut chunk).map_err(ClipboardError::from)?;
    if read == 0 {
        return Ok(None);
    }
    chunk.truncate(read);

    let mut start = 0;
    let mut order = profile.byte_order;
    let mut stream_order = None;
    if unit > 1 {
        if let Some(bom) = detect_bom(&chunk) {
            order = bom.order;
            stream_order = Some(bom.order);
            start = unit.min(chunk.len());
        }
    }

    let decoded: Vec<(char, usize)> = profile
        .charset
        .decode_prefix(&chunk[start..], order)
        .into_iter()
        .map(|(c, end)| (c, start + end))
        .collect();

    // 单字节字符集的 BOM 以 U+FEFF 形式出现
    let bom_chars = decoded.iter().take_while(|(c, _)| *c == '\u{FEFF}').count();
    if let Some(&(_, end)) = bom_chars.checked_sub(1).and_then(|i| decoded.get(i)) {
        start = end;
    }

    let leading_blank = decoded[bom_chars..]
        .iter()
        .take_while(|(c, _)| c.is_whitespace())
        .count();
    if let Some(&(_, end)) = leading_blank
        .checked_sub(1)
        .and_then(|i| decoded.get(bom_chars + i))
    {
        start = end;
    }

    let significant = &decoded[bom_chars + leading_blank..];
    let prefix_len = DATA_URI_PREFIX.chars().count();
    let has_prefix = significant.len() >= prefix_len
        && significant
            .iter()
            .take(prefix_len)
            .map(|(c, _)| *c)
            .eq(DATA_URI_PREFIX.chars());

    if !has_prefix {
        return Ok(Some(HeaderScan {
            declared_type: None,
            stream_order,
            replay: chunk[start..].to_vec(),
        }));
    }

    let Some(comma) = significant.iter().position(|(c, _)| *c == ',') else {
        return Err(ExtractError::InvalidFormat(format!(
            "数据头在前 {} 个字符内没有逗号分隔符",
            lookahead_chars
        )));
    };

    let declared: String = significant[prefix_len..comma]
        .iter()
        .map(|(c, _)| *c)
        .collect();
    let payload_start = significant[comma].1;
    log::debug!("🏷️ 识别到 data URI 数据头，声明类型: {}", declared);

    Ok(Some(HeaderScan {
        declared_type: Some(declared.trim().to_string()),
        stream_order,
        replay: chunk[payload_start..].to_vec(),
    }))
}
