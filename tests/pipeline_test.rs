//! 提取流水线端到端测试：多字符集、去重、停止与资源限制

mod common;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};

use clipboard_image_extractor::clipboard::{FormatDescriptor, Representation};
use clipboard_image_extractor::extractor::{
    DeclineReason, ExtractError, ExtractorConfig, ImageExtractor, ProcessOutcome,
};
use clipboard_image_extractor::progress::ProgressModel;
use clipboard_image_extractor::signal::StopSignal;

use common::{
    Gate, MemoryContents, create_jpeg_bytes, create_png_bytes, data_uri, files_in,
    unique_temp_dir,
};

fn extractor_in(dir: &PathBuf, first_sequence: u64) -> ImageExtractor {
    extractor_with(dir, first_sequence, ExtractorConfig::default())
}

fn extractor_with(dir: &PathBuf, first_sequence: u64, config: ExtractorConfig) -> ImageExtractor {
    let progress = Arc::new(ProgressModel::new(dir.clone(), first_sequence));
    ImageExtractor::new(config, progress).unwrap()
}

fn run(extractor: &ImageExtractor, contents: &MemoryContents) -> ProcessOutcome {
    extractor.process(&contents.first_format(), &StopSignal::armed(), contents)
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[test]
fn utf16_data_uri_is_saved_byte_identical() {
    let dir = unique_temp_dir("pipeline_utf16");
    let png = create_png_bytes(8, 6, 1);
    let extractor = extractor_in(&dir, 1);
    let contents = MemoryContents::text("UTF-16", &data_uri("png", &png));

    let outcome = run(&extractor, &contents);

    let ProcessOutcome::Saved { digest, path, sequence } = outcome else {
        panic!("expected saved, got {outcome:?}");
    };
    assert_eq!(sequence, 1);
    assert_eq!(path, dir.join("1.png"));
    assert_eq!(fs::read(&path).unwrap(), png);
    assert_eq!(digest, sha256_hex(&png));

    let progress = extractor.progress();
    assert_eq!(progress.sequence().get(), 2);
    assert_eq!(progress.image_type().get(), "png;base64");
    assert!(progress.status_bar().get().contains(&digest));
    assert!(progress.current_image().get().is_some());
    assert!(progress.enabled().get());
    assert_eq!(progress.status_history().len(), 1);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn same_image_in_another_charset_is_a_duplicate() {
    let dir = unique_temp_dir("pipeline_duplicate");
    let png = create_png_bytes(5, 5, 2);
    let extractor = extractor_in(&dir, 1);

    let first = run(&extractor, &MemoryContents::text("UTF-16", &data_uri("png", &png)));
    assert!(matches!(first, ProcessOutcome::Saved { .. }));

    let second = run(&extractor, &MemoryContents::text("UTF-8", &data_uri("png", &png)));
    let ProcessOutcome::Duplicate { digest, path } = second else {
        panic!("expected duplicate, got {second:?}");
    };
    assert_eq!(path, dir.join("1.png"));
    assert_eq!(digest, sha256_hex(&png));
    assert!(second_is_handled(&digest, &extractor));

    assert_eq!(files_in(&dir), vec!["1.png".to_string()]);
    assert_eq!(extractor.progress().sequence().get(), 2);
    assert!(extractor.progress().status_bar().get().contains("1.png"));
    let _ = fs::remove_dir_all(&dir);
}

fn second_is_handled(digest: &str, extractor: &ImageExtractor) -> bool {
    let known = extractor.known_digests();
    known.len() == 1 && known.contains(digest)
}

#[test]
fn declared_subtype_names_the_file() {
    let dir = unique_temp_dir("pipeline_jpeg");
    let jpeg = create_jpeg_bytes(16, 16);
    let extractor = extractor_in(&dir, 5);

    let outcome = run(&extractor, &MemoryContents::text("UTF-8", &data_uri("jpeg", &jpeg)));

    let ProcessOutcome::Saved { path, sequence, .. } = outcome else {
        panic!("expected saved, got {outcome:?}");
    };
    assert_eq!(sequence, 5);
    assert_eq!(path, dir.join("5.jpeg"));
    assert_eq!(fs::read(&path).unwrap(), jpeg);
    assert_eq!(extractor.progress().sequence().get(), 6);
    assert_eq!(extractor.progress().image_type().get(), "jpeg;base64");
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn incongruent_charset_is_declined_without_side_effects() {
    let dir = unique_temp_dir("pipeline_sjis");
    let png = create_png_bytes(4, 4, 3);
    let extractor = extractor_in(&dir, 1);
    let contents = MemoryContents::raw(
        FormatDescriptor::plain_text_stream("Shift_JIS"),
        data_uri("png", &png).into_bytes(),
    );

    let outcome = run(&extractor, &contents);

    assert!(matches!(
        outcome,
        ProcessOutcome::Declined(DeclineReason::IncongruentCharset(ref name)) if name == "Shift_JIS"
    ));
    assert!(!outcome.is_handled());
    assert!(files_in(&dir).is_empty());
    assert!(extractor.known_digests().is_empty());
    assert_eq!(extractor.progress().sequence().get(), 1);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn bare_base64_uses_sniffed_extension() {
    let dir = unique_temp_dir("pipeline_bare");
    let png = create_png_bytes(3, 7, 4);
    let extractor = extractor_in(&dir, 1);
    let contents = MemoryContents::text("UTF-16LE", &STANDARD.encode(&png));

    let outcome = run(&extractor, &contents);

    let ProcessOutcome::Saved { path, .. } = outcome else {
        panic!("expected saved, got {outcome:?}");
    };
    assert_eq!(path, dir.join("1.png"));
    assert_eq!(fs::read(&path).unwrap(), png);
    assert_eq!(extractor.progress().image_type().get(), "png");
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn bare_base64_after_blank_lines_is_saved() {
    let dir = unique_temp_dir("pipeline_bare_blank");
    let png = create_png_bytes(5, 3, 8);
    let extractor = extractor_in(&dir, 1);
    let text = format!("\r\n  \t{}", STANDARD.encode(&png));

    let outcome = run(&extractor, &MemoryContents::text("UTF-8", &text));

    let ProcessOutcome::Saved { path, .. } = outcome else {
        panic!("expected saved, got {outcome:?}");
    };
    assert_eq!(path, dir.join("1.png"));
    assert_eq!(fs::read(&path).unwrap(), png);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn windows_code_page_text_is_extracted() {
    let dir = unique_temp_dir("pipeline_cp1252");
    let png = create_png_bytes(4, 4, 9);
    let extractor = extractor_in(&dir, 1);

    let outcome = run(&extractor, &MemoryContents::text("windows-1252", &data_uri("png", &png)));

    let ProcessOutcome::Saved { path, .. } = outcome else {
        panic!("expected saved, got {outcome:?}");
    };
    assert_eq!(path, dir.join("1.png"));
    assert_eq!(fs::read(&path).unwrap(), png);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn utf32_with_surrounding_whitespace_is_extracted() {
    let dir = unique_temp_dir("pipeline_utf32");
    let png = create_png_bytes(6, 2, 5);
    let extractor = extractor_in(&dir, 1);
    let text = format!("  \n{}", data_uri("png", &png));

    let outcome = run(&extractor, &MemoryContents::text("UTF-32BE", &text));

    let ProcessOutcome::Saved { path, .. } = outcome else {
        panic!("expected saved, got {outcome:?}");
    };
    assert_eq!(fs::read(&path).unwrap(), png);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn little_endian_bom_overrides_declared_charset() {
    let dir = unique_temp_dir("pipeline_bom");
    let png = create_png_bytes(4, 4, 6);
    let extractor = extractor_in(&dir, 1);
    let mut bytes = vec![0xFF, 0xFE];
    for unit in data_uri("png", &png).encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    let contents = MemoryContents::raw(FormatDescriptor::plain_text_stream("UTF-16"), bytes);

    let outcome = run(&extractor, &contents);

    let ProcessOutcome::Saved { path, .. } = outcome else {
        panic!("expected saved, got {outcome:?}");
    };
    assert_eq!(fs::read(&path).unwrap(), png);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn non_image_text_reports_no_image() {
    let dir = unique_temp_dir("pipeline_text");
    let extractor = extractor_in(&dir, 1);

    let outcome = run(&extractor, &MemoryContents::text("UTF-8", "hello clipboard"));

    assert!(matches!(outcome, ProcessOutcome::NoImage));
    assert_eq!(extractor.progress().image_type().get(), "No Image data");
    assert!(files_in(&dir).is_empty());
    assert!(extractor.known_digests().is_empty());
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn valid_base64_of_non_image_bytes_reports_no_image() {
    let dir = unique_temp_dir("pipeline_not_image");
    let extractor = extractor_in(&dir, 1);
    let text = format!("data:image/png;base64,{}", STANDARD.encode(b"definitely not a png"));

    let outcome = run(&extractor, &MemoryContents::text("UTF-8", &text));

    assert!(matches!(outcome, ProcessOutcome::NoImage));
    assert!(files_in(&dir).is_empty());
    assert_eq!(extractor.progress().sequence().get(), 1);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn empty_stream_is_declined() {
    let dir = unique_temp_dir("pipeline_empty");
    let extractor = extractor_in(&dir, 1);
    let contents = MemoryContents::raw(FormatDescriptor::plain_text_stream("UTF-8"), Vec::new());

    let outcome = run(&extractor, &contents);

    assert!(matches!(outcome, ProcessOutcome::Declined(DeclineReason::EmptyStream)));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn text_representation_is_not_for_us() {
    let dir = unique_temp_dir("pipeline_reader");
    let extractor = extractor_in(&dir, 1);
    let format = FormatDescriptor::new("text/plain; charset=UTF-8", Representation::Text);
    let contents = MemoryContents::raw(format, b"data:image/png;base64,AAAA".to_vec());

    let outcome = run(&extractor, &contents);

    assert!(matches!(outcome, ProcessOutcome::Declined(DeclineReason::NotForUs)));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn stop_before_start_aborts() {
    let dir = unique_temp_dir("pipeline_unarmed");
    let png = create_png_bytes(4, 4, 7);
    let extractor = extractor_in(&dir, 1);
    let contents = MemoryContents::text("UTF-8", &data_uri("png", &png));

    let outcome = extractor.process(&contents.first_format(), &StopSignal::new(), &contents);

    assert!(matches!(outcome, ProcessOutcome::Aborted));
    assert!(files_in(&dir).is_empty());
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn stop_during_read_leaves_no_file() {
    let dir = unique_temp_dir("pipeline_stop");
    let png = create_png_bytes(32, 32, 8);
    let extractor = extractor_in(&dir, 1);
    let (gate, started, release) = Gate::new();
    let contents = MemoryContents::text("UTF-16", &data_uri("png", &png)).with_gate(gate);
    let stop = StopSignal::armed();

    let outcome = std::thread::scope(|scope| {
        let worker = scope.spawn(|| extractor.process(&contents.first_format(), &stop, &contents));
        started.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(stop.request_stop());
        release.send(()).unwrap();
        worker.join().unwrap()
    });

    assert!(matches!(outcome, ProcessOutcome::Aborted));
    assert!(files_in(&dir).is_empty());
    assert!(extractor.known_digests().is_empty());
    assert_eq!(extractor.progress().sequence().get(), 1);
    assert!(extractor.progress().enabled().get());

    // 同一个提取器在下一次尝试中仍能正常保存
    let retry = MemoryContents::text("UTF-16", &data_uri("png", &png));
    assert!(matches!(run(&extractor, &retry), ProcessOutcome::Saved { sequence: 1, .. }));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn oversized_payload_fails_with_resource_limit() {
    let dir = unique_temp_dir("pipeline_limit");
    let png = create_png_bytes(64, 64, 9);
    let config = ExtractorConfig {
        max_payload_bytes: 32,
        ..ExtractorConfig::default()
    };
    let extractor = extractor_with(&dir, 1, config);

    let outcome = run(&extractor, &MemoryContents::text("UTF-8", &data_uri("png", &png)));

    assert!(matches!(outcome, ProcessOutcome::Failed(ExtractError::ResourceLimit(_))));
    assert!(files_in(&dir).is_empty());
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn existing_file_is_never_overwritten() {
    let dir = unique_temp_dir("pipeline_collision");
    fs::write(dir.join("1.png"), b"keep me").unwrap();
    let png = create_png_bytes(4, 4, 10);
    let extractor = extractor_in(&dir, 1);

    let outcome = run(&extractor, &MemoryContents::text("UTF-8", &data_uri("png", &png)));

    assert!(matches!(outcome, ProcessOutcome::Failed(ExtractError::FileSystem(_))));
    assert_eq!(fs::read(dir.join("1.png")).unwrap(), b"keep me");
    assert_eq!(extractor.progress().sequence().get(), 1);
    assert!(extractor.known_digests().is_empty());
    let _ = fs::remove_dir_all(&dir);
}
