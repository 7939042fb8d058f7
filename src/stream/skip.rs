use std::io::{self, Read};

use super::read_full;
use crate::charset::{ByteOrder, CharsetProfile};

/// 从多字节字符流中逐单元挑出有效字节的读取器。
///
/// 大端取每个单元的最后一个字节，小端取第一个字节。数据源末尾不足一个单元的
/// 字节会被丢弃，调用方看到的是截断后的结果。
pub struct SkipDecodingStream<R> {
    inner: R,
    bytes_per_unit: usize,
    byte_order: ByteOrder,
    raw: Vec<u8>,
}

impl<R: Read> SkipDecodingStream<R> {
    pub fn new(inner: R, profile: &CharsetProfile) -> Self {
        Self::with_layout(inner, profile.bytes_per_unit, profile.byte_order)
    }

    pub fn with_layout(inner: R, bytes_per_unit: usize, byte_order: ByteOrder) -> Self {
        Self {
            inner,
            bytes_per_unit: bytes_per_unit.max(1),
            byte_order,
            raw: Vec::new(),
        }
    }

    pub fn bytes_per_unit(&self) -> usize {
        self.bytes_per_unit
    }

    fn significant_offset(&self) -> usize {
        match self.byte_order {
            ByteOrder::BigEndian => self.bytes_per_unit - 1,
            ByteOrder::LittleEndian => 0,
        }
    }

    /// 读取一个逻辑字节；流结束（或只剩半个单元）时返回 `None`。
    pub fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        match self.read(&mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    /// 跳过 `n` 个逻辑字节，返回实际跳过的完整单元数。
    pub fn skip(&mut self, n: u64) -> io::Result<u64> {
        let unit = self.bytes_per_unit as u64;
        let raw = n.saturating_mul(unit);
        let skipped = io::copy(&mut (&mut self.inner).take(raw), &mut io::sink())?;
        Ok(skipped / unit)
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for SkipDecodingStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.bytes_per_unit == 1 {
            return self.inner.read(buf);
        }

        let wanted = buf.len() * self.bytes_per_unit;
        self.raw.resize(wanted, 0);
        let filled = read_full(&mut self.inner, &mut self.raw[..wanted])?;
        let units = filled / self.bytes_per_unit;
        if units * self.bytes_per_unit != filled {
            log::debug!(
                "✂️ 流末尾存在不完整的字符单元，丢弃 {} 字节",
                filled - units * self.bytes_per_unit
            );
        }

        let offset = self.significant_offset();
        let complete = &self.raw[..units * self.bytes_per_unit];
        for (slot, unit) in buf.iter_mut().zip(complete.chunks_exact(self.bytes_per_unit)) {
            *slot = unit[offset];
        }
        Ok(units)
    }
}
