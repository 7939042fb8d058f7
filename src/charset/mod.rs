//! # 字符集模块（charset）
//!
//! ## 设计思路
//!
//! 剪贴板上的文本格式会声明自己的 charset（如 `text/plain;charset=utf-16le`）。
//! 解码链路只关心两件事：
//! 1. 这个字符集每个字符占几个字节、字节序是什么；
//! 2. Base64 字母表在这个字符集下是否与 ASCII “数值一致”（只是更宽）。
//!
//! ## 实现思路
//!
//! - `Charset` 内置 Unicode 家族与两种单字节字符集；Windows 代码页、其余 ISO-8859
//!   等兼容 ASCII 的单字节字符集归入 `AsciiCompatible`，只编码 0x00..0x7F。
//! - 未知名称统一落到 `Unsupported`，不支持的字符集无法编码任何字符，
//!   因此一致性检查必然失败。
//! - 只实现“编码单个字符”和“按字节序解码前缀”两种能力，
//!   足够覆盖数据头识别与一致性检查，不做通用转码。
//! - 字节序分析、一致性检查与报表在 `analyzer` 子模块。

mod analyzer;

pub use analyzer::{
    analyze_byte_order, charset_report, is_ascii_byte_compatible, is_base64_congruent,
    ByteOrder, CharsetProfile, CharsetReportRow, BASE64_ALPHABET,
};
pub(crate) use analyzer::detect_bom;

/// 字符集分析错误。
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CharsetError {
    #[error("字节样本为空，无法分析字节序")]
    EmptySample,
}

/// 未声明 charset 的 `text/plain` 按 RFC 2046 视为 US-ASCII。
pub const DEFAULT_TEXT_CHARSET: &str = "US-ASCII";

/// 剪贴板文本格式可能声明的字符集。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Charset {
    UsAscii,
    Iso8859_1,
    Utf8,
    /// 编码时带 BOM（`FE FF`）并使用大端序。
    Utf16,
    Utf16Be,
    Utf16Le,
    /// 编码时不带 BOM，使用大端序。
    Utf32,
    Utf32Be,
    Utf32Le,
    /// 低 128 个码位与 ASCII 相同的单字节字符集（如 `windows-1252`），保留原始名称。
    AsciiCompatible(String),
    /// 无内置编码器的字符集，保留原始名称用于日志。
    Unsupported(String),
}

impl Charset {
    /// 内置可编码的字符集列表（报表与测试使用）。
    pub fn builtin() -> [Charset; 9] {
        [
            Charset::UsAscii,
            Charset::Iso8859_1,
            Charset::Utf8,
            Charset::Utf16,
            Charset::Utf16Be,
            Charset::Utf16Le,
            Charset::Utf32,
            Charset::Utf32Be,
            Charset::Utf32Le,
        ]
    }

    /// 按名称（大小写不敏感，支持常见别名）解析字符集。
    ///
    /// # 示例
    /// ```rust
    /// use clipboard_image_extractor::charset::Charset;
    ///
    /// assert_eq!(Charset::for_name("utf-16le"), Charset::Utf16Le);
    /// assert_eq!(Charset::for_name("Shift_JIS"), Charset::Unsupported("Shift_JIS".into()));
    /// ```
    pub fn for_name(name: &str) -> Self {
        let trimmed = name.trim().trim_matches('"');
        let normalized = trimmed.to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "us-ascii" | "ascii" | "iso646-us" | "ansi-x3.4-1968" => Self::UsAscii,
            "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" | "l1" => Self::Iso8859_1,
            "utf-8" | "utf8" => Self::Utf8,
            "utf-16" | "utf16" | "unicode" => Self::Utf16,
            "utf-16be" | "utf16be" | "x-utf-16be" | "unicodebigunmarked" => Self::Utf16Be,
            "utf-16le" | "utf16le" | "x-utf-16le" | "unicodelittleunmarked" => Self::Utf16Le,
            "utf-32" | "utf32" => Self::Utf32,
            "utf-32be" | "utf32be" | "x-utf-32be" => Self::Utf32Be,
            "utf-32le" | "utf32le" | "x-utf-32le" => Self::Utf32Le,
            other if is_ascii_compatible_single_byte(other) => {
                Self::AsciiCompatible(trimmed.to_string())
            }
            _ => Self::Unsupported(trimmed.to_string()),
        }
    }

    /// 规范名称。字节序标记（`BE`/`LE`）只出现在对应变体的名称中。
    pub fn name(&self) -> &str {
        match self {
            Self::UsAscii => "US-ASCII",
            Self::Iso8859_1 => "ISO-8859-1",
            Self::Utf8 => "UTF-8",
            Self::Utf16 => "UTF-16",
            Self::Utf16Be => "UTF-16BE",
            Self::Utf16Le => "UTF-16LE",
            Self::Utf32 => "UTF-32",
            Self::Utf32Be => "UTF-32BE",
            Self::Utf32Le => "UTF-32LE",
            Self::AsciiCompatible(name) | Self::Unsupported(name) => name,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported(_))
    }

    /// 编码器的平均每字符字节数。
    pub fn average_bytes_per_char(&self) -> f32 {
        match self {
            Self::UsAscii | Self::Iso8859_1 | Self::AsciiCompatible(_) | Self::Unsupported(_) => 1.0,
            Self::Utf8 => 1.1,
            Self::Utf16 | Self::Utf16Be | Self::Utf16Le => 2.0,
            Self::Utf32 | Self::Utf32Be | Self::Utf32Le => 4.0,
        }
    }

    /// 每个逻辑字符单元的字节数（平均值向下取整，至少为 1）。
    pub fn bytes_per_unit(&self) -> usize {
        (self.average_bytes_per_char().floor() as usize).max(1)
    }

    pub fn can_encode(&self, c: char) -> bool {
        self.encode_char(c).is_some()
    }

    /// 编码单个字符；字符集无法表示该字符时返回 `None`。
    pub fn encode_char(&self, c: char) -> Option<Vec<u8>> {
        let code = c as u32;
        match self {
            Self::UsAscii | Self::AsciiCompatible(_) => (code < 0x80).then(|| vec![code as u8]),
            Self::Iso8859_1 => (code < 0x100).then(|| vec![code as u8]),
            Self::Utf8 => {
                let mut buf = [0u8; 4];
                Some(c.encode_utf8(&mut buf).as_bytes().to_vec())
            }
            Self::Utf16 => {
                let mut out = vec![0xFE, 0xFF];
                out.extend(encode_utf16_unit(c, ByteOrder::BigEndian));
                Some(out)
            }
            Self::Utf16Be => Some(encode_utf16_unit(c, ByteOrder::BigEndian)),
            Self::Utf16Le => Some(encode_utf16_unit(c, ByteOrder::LittleEndian)),
            Self::Utf32 | Self::Utf32Be => Some(code.to_be_bytes().to_vec()),
            Self::Utf32Le => Some(code.to_le_bytes().to_vec()),
            Self::Unsupported(_) => None,
        }
    }

    /// 编码整段文本。`Utf16` 只在开头写一次 BOM。
    pub fn encode_str(&self, text: &str) -> Option<Vec<u8>> {
        if *self == Self::Utf16 {
            let mut out = vec![0xFE, 0xFF];
            for c in text.chars() {
                out.extend(encode_utf16_unit(c, ByteOrder::BigEndian));
            }
            return Some(out);
        }

        let mut out = Vec::with_capacity(text.len() * self.bytes_per_unit());
        for c in text.chars() {
            out.extend(self.encode_char(c)?);
        }
        Some(out)
    }

    /// 按给定字节序解码字节前缀。
    ///
    /// 返回每个字符及其在 `bytes` 中的结束偏移；末尾不完整的字符单元被忽略，
    /// 非法序列替换为 `U+FFFD`。不支持的字符集按单字节 Latin-1 读取。
    pub(crate) fn decode_prefix(&self, bytes: &[u8], order: ByteOrder) -> Vec<(char, usize)> {
        match self {
            Self::UsAscii | Self::Iso8859_1 | Self::Unsupported(_) => bytes
                .iter()
                .enumerate()
                .map(|(i, b)| (char::from(*b), i + 1))
                .collect(),
            // 高位字节没有码表，统一替换
            Self::AsciiCompatible(_) => bytes
                .iter()
                .enumerate()
                .map(|(i, b)| {
                    let c = if b.is_ascii() { char::from(*b) } else { char::REPLACEMENT_CHARACTER };
                    (c, i + 1)
                })
                .collect(),
            Self::Utf8 => {
                let valid = match std::str::from_utf8(bytes) {
                    Ok(text) => text,
                    Err(err) => std::str::from_utf8(&bytes[..err.valid_up_to()]).unwrap_or_default(),
                };
                valid
                    .char_indices()
                    .map(|(i, c)| (c, i + c.len_utf8()))
                    .collect()
            }
            Self::Utf16 | Self::Utf16Be | Self::Utf16Le => {
                let units = bytes.chunks_exact(2).map(|pair| {
                    let pair = [pair[0], pair[1]];
                    match order {
                        ByteOrder::BigEndian => u16::from_be_bytes(pair),
                        ByteOrder::LittleEndian => u16::from_le_bytes(pair),
                    }
                });

                let mut offset = 0;
                char::decode_utf16(units)
                    .map(|decoded| {
                        let (c, width) = match decoded {
                            Ok(c) => (c, c.len_utf16() * 2),
                            Err(_) => (char::REPLACEMENT_CHARACTER, 2),
                        };
                        offset += width;
                        (c, offset)
                    })
                    .collect()
            }
            Self::Utf32 | Self::Utf32Be | Self::Utf32Le => bytes
                .chunks_exact(4)
                .enumerate()
                .map(|(i, quad)| {
                    let quad = [quad[0], quad[1], quad[2], quad[3]];
                    let code = match order {
                        ByteOrder::BigEndian => u32::from_be_bytes(quad),
                        ByteOrder::LittleEndian => u32::from_le_bytes(quad),
                    };
                    (
                        char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER),
                        (i + 1) * 4,
                    )
                })
                .collect(),
        }
    }
}

impl std::fmt::Display for Charset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// 低 128 个码位与 ASCII 相同的常见单字节字符集（名称已规范化为小写、`-` 分隔）。
fn is_ascii_compatible_single_byte(normalized: &str) -> bool {
    let windows_code_page = normalized
        .strip_prefix("windows-")
        .or_else(|| normalized.strip_prefix("cp"))
        .and_then(|page| page.parse::<u16>().ok())
        .is_some_and(|page| (1250..=1258).contains(&page));
    let iso_8859_part = normalized
        .strip_prefix("iso-8859-")
        .or_else(|| normalized.strip_prefix("iso8859-"))
        .and_then(|part| part.parse::<u8>().ok())
        .is_some_and(|part| (2..=16).contains(&part) && part != 12);

    windows_code_page
        || iso_8859_part
        || matches!(
            normalized,
            "koi8-r" | "koi8-u" | "macintosh" | "x-mac-roman" | "ibm437" | "cp437" | "ibm850" | "cp850"
        )
}

fn encode_utf16_unit(c: char, order: ByteOrder) -> Vec<u8> {
    let mut units = [0u16; 2];
    c.encode_utf16(&mut units)
        .iter()
        .flat_map(|unit| match order {
            ByteOrder::BigEndian => unit.to_be_bytes(),
            ByteOrder::LittleEndian => unit.to_le_bytes(),
        })
        .collect()
}
