//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `ImageExtractor` 只负责流程编排，单个阶段的细节分别在 `header`、`pipeline`
//! 与 `stream` 中。处理链路固定为：
//! 1. 确认格式是本处理器声明的纯文本字节流
//! 2. 打开字节流，预读数据头
//! 3. 检查字符集与 Base64 是否一致
//! 4. 流式 Base64 解码并计算 SHA-256
//! 5. 嗅探并解码图片，更新预览
//! 6. 按摘要去重，新内容写入 `<序号>.<扩展名>`
//!
//! ## 实现思路
//!
//! - 每个阶段之间检查停止信号，收到请求立即返回“未处理”。
//! - 每次尝试只产生一条最终状态行，由 [`ProcessOutcome::status_line`] 生成。
//! - 记录 `read/decode/save/total` 阶段耗时，便于性能诊断。

use std::fs::{self, OpenOptions};
use std::io::{self, Cursor, Read, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use super::header::scan_header;
use super::pipeline::recognize_image;
use super::record::DigestRecord;
use super::source::{DecodedPayload, DeclineReason, ProcessOutcome};
use super::{ExtractError, ExtractorConfig};
use crate::charset::{Charset, CharsetProfile, DEFAULT_TEXT_CHARSET};
use crate::clipboard::{ClipboardError, FormatDescriptor, FormatProcessor, Transferable};
use crate::progress::ProgressModel;
use crate::signal::StopSignal;
use crate::stream::{DigestAccumulator, DigestingBase64Reader};

/// 处理期间禁用界面控件，离开作用域（包括 panic 展开）时恢复。
struct ControlsDisabled<'a> {
    progress: &'a ProgressModel,
}

impl<'a> ControlsDisabled<'a> {
    fn new(progress: &'a ProgressModel) -> Self {
        progress.enabled().set(false);
        Self { progress }
    }
}

impl Drop for ControlsDisabled<'_> {
    fn drop(&mut self) {
        self.progress.enabled().set(true);
    }
}

struct ExtractorState {
    digest: DigestAccumulator,
    records: DigestRecord,
}

/// 从剪贴板文本中提取 Base64 图片并保存的处理器。
pub struct ImageExtractor {
    config: ExtractorConfig,
    progress: Arc<ProgressModel>,
    state: Mutex<ExtractorState>,
}

impl ImageExtractor {
    /// # 示例
    /// ```rust
    /// use std::path::PathBuf;
    /// use std::sync::Arc;
    /// use clipboard_image_extractor::extractor::{ExtractorConfig, ImageExtractor};
    /// use clipboard_image_extractor::progress::ProgressModel;
    ///
    /// let progress = Arc::new(ProgressModel::new(PathBuf::from("."), 1));
    /// let extractor = ImageExtractor::new(ExtractorConfig::default(), progress)?;
    /// assert!(extractor.known_digests().is_empty());
    /// # Ok::<(), clipboard_image_extractor::extractor::ExtractError>(())
    /// ```
    pub fn new(config: ExtractorConfig, progress: Arc<ProgressModel>) -> Result<Self, ExtractError> {
        config.validate()?;
        Ok(Self {
            config,
            progress,
            state: Mutex::new(ExtractorState {
                digest: DigestAccumulator::new(),
                records: DigestRecord::default(),
            }),
        })
    }

    /// 本处理器接受的格式：任意 charset 的纯文本字节流。
    pub fn supported_formats() -> Vec<FormatDescriptor> {
        vec![FormatDescriptor::any_plain_text_stream()]
    }

    pub fn progress(&self) -> &Arc<ProgressModel> {
        &self.progress
    }

    /// 已保存内容的摘要快照
    pub fn known_digests(&self) -> DigestRecord {
        self.lock_state().records.clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, ExtractorState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("提取器状态锁中毒，继续使用恢复数据");
                poisoned.into_inner()
            }
        }
    }

    /// 处理一次剪贴板内容，报告并返回结果。
    pub fn process(
        &self,
        format: &FormatDescriptor,
        stop: &StopSignal,
        contents: &dyn Transferable,
    ) -> ProcessOutcome {
        let _busy = ControlsDisabled::new(&self.progress);
        let outcome = self
            .run_steps(format, stop, contents)
            .unwrap_or_else(ProcessOutcome::Failed);
        self.report(&outcome);
        outcome
    }

    fn report(&self, outcome: &ProcessOutcome) {
        match outcome {
            ProcessOutcome::Saved { digest, path, .. } | ProcessOutcome::Duplicate { digest, path } => {
                self.progress.report_checksum(path, digest);
            }
            ProcessOutcome::NoImage => self.progress.image_type().set("No Image data".to_string()),
            ProcessOutcome::Failed(err) => log::error!("❌ 图片提取失败: {}", err),
            _ => {}
        }
        self.progress.report(outcome.status_line());
    }

    fn run_steps(
        &self,
        format: &FormatDescriptor,
        stop: &StopSignal,
        contents: &dyn Transferable,
    ) -> Result<ProcessOutcome, ExtractError> {
        let total_start = Instant::now();

        if stop.is_stop_requested() {
            return Ok(ProcessOutcome::Aborted);
        }
        let supported = format.is_stream()
            && Self::supported_formats()
                .iter()
                .any(|wanted| wanted.accepts(format));
        if !supported {
            return Ok(ProcessOutcome::Declined(DeclineReason::NotForUs));
        }

        let mut stream = contents.open_stream(format)?;
        if stop.is_stop_requested() {
            return Ok(ProcessOutcome::Aborted);
        }

        let charset = Charset::for_name(format.charset().unwrap_or(DEFAULT_TEXT_CHARSET));
        let mut profile = CharsetProfile::lookup(charset);
        let Some(header) = scan_header(&mut stream, &profile, self.config.lookahead_chars)? else {
            return Ok(ProcessOutcome::Declined(DeclineReason::EmptyStream));
        };
        if let Some(order) = header.stream_order {
            profile = profile.with_byte_order(order);
        }
        if let Some(declared) = &header.declared_type {
            self.progress.image_type().set(declared.clone());
        }
        if stop.is_stop_requested() {
            return Ok(ProcessOutcome::Aborted);
        }

        if !profile.base64_congruent {
            log::info!("字符集 {} 与 Base64 不一致，跳过", profile.charset);
            return Ok(ProcessOutcome::Declined(DeclineReason::IncongruentCharset(
                profile.charset.name().to_string(),
            )));
        }

        let mut state = self.lock_state();
        let read_start = Instant::now();
        let source = Cursor::new(header.replay.clone()).chain(stream);
        let payload = {
            let mut reader = DigestingBase64Reader::new(source, &profile, &mut state.digest);
            match self.read_payload(&mut reader, stop) {
                Ok(Some(bytes)) => DecodedPayload {
                    bytes,
                    digest: reader.final_digest(),
                },
                Ok(None) => {
                    reader.abandon();
                    return Ok(ProcessOutcome::Aborted);
                }
                Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                    log::debug!("Base64 解码失败: {}", err);
                    reader.abandon();
                    return Ok(ProcessOutcome::NoImage);
                }
                Err(err) => {
                    reader.abandon();
                    return Err(payload_read_error(err));
                }
            }
        };
        let read_ms = read_start.elapsed().as_millis();

        if stop.is_stop_requested() {
            return Ok(ProcessOutcome::Aborted);
        }

        let decode_start = Instant::now();
        let Some(recognized) = recognize_image(&payload.bytes, &self.config)? else {
            state.digest.reset();
            return Ok(ProcessOutcome::NoImage);
        };
        let decode_ms = decode_start.elapsed().as_millis();

        self.progress
            .current_image()
            .set(Some(Arc::new(recognized.image)));
        if header.declared_type.is_none() {
            self.progress
                .image_type()
                .set(recognized.sniffed_extension.to_string());
        }

        if stop.is_stop_requested() {
            return Ok(ProcessOutcome::Aborted);
        }

        if let Some(existing) = state.records.get(&payload.digest) {
            log::info!("🔁 重复图片，已保存于 {}", existing.display());
            return Ok(ProcessOutcome::Duplicate {
                digest: payload.digest,
                path: existing.to_path_buf(),
            });
        }

        let save_start = Instant::now();
        let extension = header
            .declared_extension()
            .unwrap_or(recognized.sniffed_extension)
            .to_string();
        let sequence = self.progress.sequence().get();
        let dir = self.progress.output_dir().get();
        let path = dir.join(format!("{sequence}.{extension}"));
        ensure_output_dir(&dir)?;
        write_new_file(&path, &payload.bytes)?;
        state.records.insert(payload.digest.clone(), path.clone());
        drop(state);
        self.progress.advance_sequence();

        log::info!(
            "⏱️ 图片提取耗时 - 读取: {}ms 解码: {}ms 保存: {}ms 总计: {}ms（格式: {:?}）",
            read_ms,
            decode_ms,
            save_start.elapsed().as_millis(),
            total_start.elapsed().as_millis(),
            recognized.format
        );

        Ok(ProcessOutcome::Saved {
            digest: payload.digest,
            path,
            sequence,
        })
    }

    /// 分块读取解码后的数据，每块之间检查停止信号与体积上限。
    ///
    /// 收到停止请求时返回 `Ok(None)`。
    fn read_payload<R: Read>(&self, reader: &mut R, stop: &StopSignal) -> io::Result<Option<Vec<u8>>> {
        let mut bytes = Vec::new();
        let mut chunk = vec![0u8; self.config.read_chunk_size];
        loop {
            if stop.is_stop_requested() {
                return Ok(None);
            }
            let n = match reader.read(&mut chunk) {
                Ok(0) => return Ok(Some(bytes)),
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            };
            if (bytes.len() + n) as u64 > self.config.max_payload_bytes {
                return Err(io::Error::other(ExtractError::ResourceLimit(format!(
                    "解码后数据超过上限：{} 字节",
                    self.config.max_payload_bytes
                ))));
            }
            bytes.extend_from_slice(&chunk[..n]);
        }
    }
}

impl FormatProcessor for ImageExtractor {
    fn name(&self) -> &str {
        "image-extractor"
    }

    fn handle_format(
        &self,
        format: &FormatDescriptor,
        stop: &StopSignal,
        contents: &dyn Transferable,
    ) -> Result<bool, ClipboardError> {
        Ok(self.process(format, stop, contents).is_handled())
    }
}

/// 读取阶段的 I/O 错误：体积超限时还原为 `ExtractError`，其余归为剪贴板读取错误。
fn payload_read_error(err: io::Error) -> ExtractError {
    let is_limit = err
        .get_ref()
        .is_some_and(|inner| inner.is::<ExtractError>());
    if is_limit {
        if let Some(Ok(limit)) = err.into_inner().map(|inner| inner.downcast::<ExtractError>()) {
            return *limit;
        }
        return ExtractError::ResourceLimit("解码后数据超过上限".to_string());
    }
    ClipboardError::Io(err).into()
}

fn ensure_output_dir(dir: &Path) -> Result<(), ExtractError> {
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|e| {
            ExtractError::FileSystem(format!("创建输出目录 {} 失败：{}", dir.display(), e))
        })?;
        log::info!("📁 已创建输出目录: {}", dir.display());
    }
    Ok(())
}

/// 只创建新文件写入；写入失败时删除不完整的文件。
fn write_new_file(path: &Path, bytes: &[u8]) -> Result<(), ExtractError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| ExtractError::FileSystem(format!("无法创建文件 {}：{}", path.display(), e)))?;

    if let Err(err) = file.write_all(bytes).and_then(|_| file.sync_all()) {
        drop(file);
        if let Err(remove_err) = fs::remove_file(path) {
            log::warn!("⚠️ 清理不完整文件失败 {}: {}", path.display(), remove_err);
        }
        return Err(ExtractError::FileSystem(format!(
            "写入文件 {} 失败：{}",
            path.display(),
            err
        )));
    }
    Ok(())
}
