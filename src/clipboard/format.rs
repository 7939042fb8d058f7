use std::collections::BTreeMap;
use std::fmt;

use crate::charset::Charset;

/// 数据在格式中的表现形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Representation {
    /// 原始字节流
    Stream,
    Text,
    Image,
    Other,
}

/// 剪贴板格式描述：MIME 类型、参数（主要是 charset）与表现形式。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatDescriptor {
    primary: String,
    sub: String,
    params: BTreeMap<String, String>,
    representation: Representation,
}

impl FormatDescriptor {
    /// 解析 `type/subtype; key=value` 形式的 MIME 字符串。
    ///
    /// 类型与参数名统一转为小写；不含 `/` 的字符串整体作为主类型。
    pub fn new(mime: &str, representation: Representation) -> Self {
        let mut parts = mime.split(';');
        let essence = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
        let (primary, sub) = match essence.split_once('/') {
            Some((primary, sub)) => (primary.trim().to_string(), sub.trim().to_string()),
            None => (essence, String::new()),
        };

        let params = parts
            .filter_map(|param| param.split_once('='))
            .map(|(key, value)| {
                (
                    key.trim().to_ascii_lowercase(),
                    value.trim().trim_matches('"').to_string(),
                )
            })
            .collect();

        Self {
            primary,
            sub,
            params,
            representation,
        }
    }

    /// 以字节流提供的纯文本格式。
    pub fn plain_text_stream(charset: &str) -> Self {
        Self::new(&format!("text/plain; charset={charset}"), Representation::Stream)
    }

    /// 不限定 charset 的纯文本字节流格式。
    pub fn any_plain_text_stream() -> Self {
        Self::new("text/plain", Representation::Stream)
    }

    pub fn base_type(&self) -> String {
        if self.sub.is_empty() {
            self.primary.clone()
        } else {
            format!("{}/{}", self.primary, self.sub)
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.params
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn charset(&self) -> Option<&str> {
        self.parameter("charset")
    }

    pub fn representation(&self) -> Representation {
        self.representation
    }

    pub fn is_stream(&self) -> bool {
        self.representation == Representation::Stream
    }

    /// 判断剪贴板提供的 `offered` 格式能否满足本格式的要求。
    ///
    /// 主类型与表现形式必须一致；本格式声明了 charset 时，
    /// 双方的 charset 需解析为同一个字符集。
    pub fn accepts(&self, offered: &FormatDescriptor) -> bool {
        if self.primary != offered.primary
            || self.sub != offered.sub
            || self.representation != offered.representation
        {
            return false;
        }

        match (self.charset(), offered.charset()) {
            (None, _) => true,
            (Some(wanted), Some(actual)) => Charset::for_name(wanted) == Charset::for_name(actual),
            (Some(_), None) => false,
        }
    }
}

impl fmt::Display for FormatDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base_type())?;
        for (key, value) in &self.params {
            write!(f, "; {key}={value}")?;
        }
        write!(f, " ({:?})", self.representation)
    }
}
