//! # 流适配层（stream）
//!
//! ## 设计思路
//!
//! 剪贴板给出的是“某字符集编码的 Base64 文本”字节流。只要字符集与 Base64 一致，
//! 每个字符单元里只有一个字节有意义，把它挑出来就得到 ASCII Base64 文本，
//! 无需真正的字符解码，也不必把整段文本读进内存。
//!
//! ## 实现思路
//!
//! ```text
//! 原始字节流 ──▶ SkipDecodingStream ──▶ base64 DecoderReader ──▶ DigestingBase64Reader
//!                 （挑出有效字节）        （流式 Base64 解码）      （边读边算 SHA-256）
//! ```

mod digesting;
mod skip;

pub use digesting::{DigestAccumulator, DigestingBase64Reader};
pub use skip::SkipDecodingStream;

use std::io::{self, Read};

/// 尽量读满 `buf`，直到数据源结束。返回实际读入的字节数。
pub(crate) fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}
