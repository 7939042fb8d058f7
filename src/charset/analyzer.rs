//! 字节序分析与 Base64 一致性检查

use once_cell::sync::Lazy;
use serde::Serialize;

use super::{Charset, CharsetError};

/// Base64 标准字母表、URL 安全变体（`-`、`_`）以及填充符 `=`。
pub const BASE64_ALPHABET: [char; 67] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R',
    'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j',
    'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', '0', '1',
    '2', '3', '4', '5', '6', '7', '8', '9', '+', '/', '-', '_', '=',
];

/// 启发式判断时最多检查的字节数
const HEURISTIC_WINDOW: usize = 16;

/// 内置字符集的推导结果，首次使用时计算一次
static BUILTIN_PROFILES: Lazy<Vec<CharsetProfile>> = Lazy::new(|| {
    Charset::builtin()
        .into_iter()
        .map(CharsetProfile::derive)
        .collect()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ByteOrder {
    BigEndian,
    LittleEndian,
}

impl ByteOrder {
    pub fn is_big_endian(self) -> bool {
        self == ByteOrder::BigEndian
    }
}

impl std::fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ByteOrder::BigEndian => f.write_str("big-endian"),
            ByteOrder::LittleEndian => f.write_str("little-endian"),
        }
    }
}

/// 样本开头识别出的字节序标记
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Bom {
    pub order: ByteOrder,
    pub len: usize,
}

/// 识别样本开头的 BOM。四字节形式优先于两字节形式。
pub(crate) fn detect_bom(sample: &[u8]) -> Option<Bom> {
    match sample {
        [0x00, 0x00, 0xFE, 0xFF, ..] => Some(Bom { order: ByteOrder::BigEndian, len: 4 }),
        [0xFF, 0xFE, 0x00, 0x00, ..] => Some(Bom { order: ByteOrder::LittleEndian, len: 4 }),
        [0xFE, 0xFF, ..] => Some(Bom { order: ByteOrder::BigEndian, len: 2 }),
        [0xFF, 0xFE, ..] => Some(Bom { order: ByteOrder::LittleEndian, len: 2 }),
        _ => None,
    }
}

/// 判断字节样本的字节序。
///
/// 判断顺序：
/// 1. 样本开头的 BOM：识别后在原地把 BOM 字节清零，后续检查只看到有效数据；
/// 2. 字符集名称中的 `BE` / `LE` 标记；
/// 3. 启发式：在前 16 个字节中找第一个非零字节，位于开头视为小端，
///    位于窗口末尾视为大端，其余情况（包括全零）按小端处理。
///
/// 第 3 步只是尽力而为的猜测，单字节样本总是得到小端。
pub fn analyze_byte_order(charset: &Charset, sample: &mut [u8]) -> Result<ByteOrder, CharsetError> {
    if sample.is_empty() {
        return Err(CharsetError::EmptySample);
    }

    if let Some(bom) = detect_bom(sample) {
        sample[..bom.len].fill(0);
        return Ok(bom.order);
    }

    if let Some(order) = order_from_name(charset.name()) {
        return Ok(order);
    }

    Ok(guess_order(sample))
}

fn order_from_name(name: &str) -> Option<ByteOrder> {
    let upper = name.to_ascii_uppercase();
    if upper.contains("BE") {
        Some(ByteOrder::BigEndian)
    } else if upper.contains("LE") {
        Some(ByteOrder::LittleEndian)
    } else {
        None
    }
}

fn guess_order(sample: &[u8]) -> ByteOrder {
    let window = &sample[..sample.len().min(HEURISTIC_WINDOW)];
    match window.iter().position(|b| *b != 0) {
        Some(0) => ByteOrder::LittleEndian,
        Some(index) if index == window.len() - 1 => ByteOrder::BigEndian,
        _ => ByteOrder::LittleEndian,
    }
}

/// 检查 Base64 字母表在该字符集下是否与 ASCII 数值一致。
///
/// 每个字母编码后（去掉 BOM）必须只有一个有效字节等于其 ASCII 码，
/// 其余字节全为零；有效字节大端取最后一个，小端取第一个。
pub fn is_base64_congruent(charset: &Charset) -> bool {
    BASE64_ALPHABET.iter().all(|&c| {
        let Some(mut encoded) = charset.encode_char(c) else {
            return false;
        };
        let Ok(order) = analyze_byte_order(charset, &mut encoded) else {
            return false;
        };

        let significant = match order {
            ByteOrder::BigEndian => encoded.len() - 1,
            ByteOrder::LittleEndian => 0,
        };
        encoded.iter().enumerate().all(|(i, b)| {
            if i == significant {
                *b == c as u8
            } else {
                *b == 0
            }
        })
    })
}

/// 检查 0x00..0x7F 的每个码点是否都编码为与自身相等的单个字节。
pub fn is_ascii_byte_compatible(charset: &Charset) -> bool {
    (0u8..0x7F).all(|code| {
        charset
            .encode_char(char::from(code))
            .is_some_and(|encoded| encoded == [code])
    })
}

/// 一次解码所需的字符集参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharsetProfile {
    pub charset: Charset,
    pub bytes_per_unit: usize,
    pub byte_order: ByteOrder,
    pub base64_congruent: bool,
}

impl CharsetProfile {
    /// 根据字符集推导参数：字节序取自编码字符 `A` 的结果。
    pub fn derive(charset: Charset) -> Self {
        let byte_order = match charset.encode_char('A') {
            Some(mut probe) => {
                analyze_byte_order(&charset, &mut probe).unwrap_or(ByteOrder::LittleEndian)
            }
            None => order_from_name(charset.name()).unwrap_or(ByteOrder::LittleEndian),
        };

        Self {
            bytes_per_unit: charset.bytes_per_unit(),
            byte_order,
            base64_congruent: is_base64_congruent(&charset),
            charset,
        }
    }

    /// 内置字符集直接取缓存，其余字符集现场推导。
    pub fn lookup(charset: Charset) -> Self {
        BUILTIN_PROFILES
            .iter()
            .find(|profile| profile.charset == charset)
            .cloned()
            .unwrap_or_else(|| Self::derive(charset))
    }

    /// 流开头的 BOM 优先于推导出的字节序。
    pub fn with_byte_order(mut self, order: ByteOrder) -> Self {
        self.byte_order = order;
        self
    }
}

/// 字符集兼容性报表中的一行
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CharsetReportRow {
    pub name: String,
    pub bytes_per_unit: usize,
    pub byte_order: ByteOrder,
    pub base64_congruent: bool,
    pub ascii_byte_compatible: bool,
}

/// 列出全部内置字符集的兼容性。
pub fn charset_report() -> Vec<CharsetReportRow> {
    Charset::builtin()
        .into_iter()
        .map(|charset| {
            let ascii_byte_compatible = is_ascii_byte_compatible(&charset);
            let profile = CharsetProfile::lookup(charset);
            CharsetReportRow {
                name: profile.charset.name().to_string(),
                bytes_per_unit: profile.bytes_per_unit,
                byte_order: profile.byte_order,
                base64_congruent: profile.base64_congruent,
                ascii_byte_compatible,
            }
        })
        .collect()
}
