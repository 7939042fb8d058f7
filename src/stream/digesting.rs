use std::io::{self, Read};

use base64::engine::general_purpose::{GeneralPurpose, STANDARD};
use base64::read::DecoderReader;
use sha2::{Digest, Sha256};

use super::SkipDecodingStream;
use crate::charset::CharsetProfile;

/// 跨多次解码复用的 SHA-256 累加器。
#[derive(Default)]
pub struct DigestAccumulator {
    hasher: Sha256,
    consumed: u64,
}

impl DigestAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.hasher = Sha256::new();
        self.consumed = 0;
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
        self.consumed += bytes.len() as u64;
    }

    /// 已计入摘要的字节数
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// 输出小写十六进制摘要并复位。
    pub fn finalize_hex(&mut self) -> String {
        self.consumed = 0;
        hex::encode(self.hasher.finalize_reset())
    }
}

/// 把多字节字符流还原为 Base64 文本并流式解码，同时对解码结果计算摘要。
///
/// 构造时会复位累加器，摘要只覆盖本次读到的字节。
pub struct DigestingBase64Reader<'a, R: Read> {
    decoder: DecoderReader<'static, GeneralPurpose, SkipDecodingStream<R>>,
    digest: &'a mut DigestAccumulator,
}

impl<'a, R: Read> DigestingBase64Reader<'a, R> {
    pub fn new(source: R, profile: &CharsetProfile, digest: &'a mut DigestAccumulator) -> Self {
        digest.reset();
        let skipping = SkipDecodingStream::new(source, profile);
        Self {
            decoder: DecoderReader::new(skipping, &STANDARD),
            digest,
        }
    }

    pub fn decoded_len(&self) -> u64 {
        self.digest.consumed()
    }

    /// 读取结束后取出摘要。
    pub fn final_digest(self) -> String {
        self.digest.finalize_hex()
    }

    /// 放弃本次解码，摘要状态清空。
    pub fn abandon(self) {
        self.digest.reset();
    }
}

impl<R: Read> Read for DigestingBase64Reader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.decoder.read(buf)?;
        self.digest.update(&buf[..n]);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charset::Charset;
    use base64::Engine;
    use std::io::Cursor;

    fn sha256_hex(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }

    #[test]
    fn decodes_wide_base64_and_hashes_output() {
        let payload = b"\x89PNG fake payload bytes";
        let text = STANDARD.encode(payload);
        let source = Charset::Utf16Le.encode_str(&text).unwrap();
        let profile = CharsetProfile::derive(Charset::Utf16Le);

        let mut digest = DigestAccumulator::new();
        let mut reader = DigestingBase64Reader::new(Cursor::new(source), &profile, &mut digest);
        let mut decoded = Vec::new();
        reader.read_to_end(&mut decoded).unwrap();
        assert_eq!(reader.decoded_len(), payload.len() as u64);

        assert_eq!(decoded, payload);
        assert_eq!(reader.final_digest(), sha256_hex(payload));
    }

    #[test]
    fn constructing_a_reader_discards_previous_state() {
        let profile = CharsetProfile::derive(Charset::Utf8);
        let mut digest = DigestAccumulator::new();
        digest.update(b"stale bytes from an aborted attempt");

        let mut reader =
            DigestingBase64Reader::new(Cursor::new(b"QUJD".to_vec()), &profile, &mut digest);
        let mut decoded = Vec::new();
        reader.read_to_end(&mut decoded).unwrap();
        assert_eq!(reader.final_digest(), sha256_hex(b"ABC"));
    }

    #[test]
    fn invalid_base64_surfaces_as_io_error() {
        let profile = CharsetProfile::derive(Charset::Utf8);
        let mut digest = DigestAccumulator::new();
        let mut reader =
            DigestingBase64Reader::new(Cursor::new(b"not base64!".to_vec()), &profile, &mut digest);
        let mut decoded = Vec::new();
        assert!(reader.read_to_end(&mut decoded).is_err());
        reader.abandon();
        assert_eq!(digest.consumed(), 0);
    }
}
