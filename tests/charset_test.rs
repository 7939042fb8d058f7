//! 字符集属性测试：一致的字符集经逐单元取字节后还原出原始 Base64 文本

use std::io::{Cursor, Read};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use proptest::prelude::*;
use sha2::{Digest, Sha256};

use clipboard_image_extractor::charset::{Charset, CharsetProfile, charset_report};
use clipboard_image_extractor::stream::{DigestAccumulator, DigestingBase64Reader, SkipDecodingStream};

fn congruent_profiles() -> Vec<CharsetProfile> {
    Charset::builtin()
        .into_iter()
        .map(CharsetProfile::derive)
        .filter(|profile| profile.base64_congruent)
        .collect()
}

/// 编码文本；`UTF-16` 开头的 BOM 由数据头识别负责消费，这里直接去掉。
fn encode_without_bom(profile: &CharsetProfile, text: &str) -> Vec<u8> {
    let mut bytes = profile.charset.encode_str(text).unwrap();
    if profile.charset == Charset::Utf16 {
        bytes.drain(..2);
    }
    bytes
}

#[test]
fn every_builtin_charset_is_congruent() {
    assert_eq!(congruent_profiles().len(), Charset::builtin().len());
    assert!(!CharsetProfile::derive(Charset::for_name("Shift_JIS")).base64_congruent);
    assert_eq!(charset_report().len(), Charset::builtin().len());
}

proptest! {
    #[test]
    fn skip_stream_recovers_base64_text(text in "[A-Za-z0-9+/=]{0,96}") {
        for profile in congruent_profiles() {
            let bytes = encode_without_bom(&profile, &text);
            let mut stream = SkipDecodingStream::new(Cursor::new(bytes), &profile);
            let mut recovered = Vec::new();
            stream.read_to_end(&mut recovered).unwrap();
            prop_assert_eq!(&recovered, text.as_bytes(), "charset {}", profile.charset);
        }
    }

    #[test]
    fn digesting_reader_matches_direct_sha256(payload in proptest::collection::vec(any::<u8>(), 0..512)) {
        let text = STANDARD.encode(&payload);
        let expected = hex::encode(Sha256::digest(&payload));
        for profile in congruent_profiles() {
            let bytes = encode_without_bom(&profile, &text);
            let mut digest = DigestAccumulator::new();
            let mut reader = DigestingBase64Reader::new(Cursor::new(bytes), &profile, &mut digest);
            let mut decoded = Vec::new();
            reader.read_to_end(&mut decoded).unwrap();
            prop_assert_eq!(reader.decoded_len(), payload.len() as u64);
            prop_assert_eq!(reader.final_digest(), expected.clone());
            prop_assert_eq!(&decoded, &payload);
        }
    }
}
