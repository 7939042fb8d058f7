//! 系统剪贴板宿主：`arboard` 负责读写，`clipboard-master` 负责变化通知。

use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::Duration;

use clipboard_master::{CallbackResult, ClipboardHandler, Master};

use super::error::ClipboardError;
use super::format::FormatDescriptor;
use super::host::{ChangeSink, ClipboardHost, Transferable};
use crate::charset::Charset;

const MONITOR_RESTART_BASE_DELAY_MS: u64 = 100;
const MONITOR_RESTART_MAX_DELAY_MS: u64 = 5_000;

/// 系统文本剪贴板以这两种字符集的字节流提供
const OFFERED_CHARSETS: [&str; 2] = ["UTF-16LE", "UTF-8"];

fn compute_restart_backoff_ms(restart_attempt: u32) -> u64 {
    let exp = 1_u64 << restart_attempt.saturating_sub(1).min(6);
    MONITOR_RESTART_BASE_DELAY_MS
        .saturating_mul(exp)
        .min(MONITOR_RESTART_MAX_DELAY_MS)
}

fn map_arboard_error(err: arboard::Error) -> ClipboardError {
    match err {
        arboard::Error::ClipboardOccupied => ClipboardError::Busy(err.to_string()),
        other => ClipboardError::Unavailable(other.to_string()),
    }
}

/// 系统剪贴板文本的快照
pub struct TextSnapshot {
    text: String,
}

impl TextSnapshot {
    pub fn new(text: String) -> Self {
        Self { text }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl Transferable for TextSnapshot {
    fn formats(&self) -> Vec<FormatDescriptor> {
        OFFERED_CHARSETS
            .iter()
            .map(|charset| FormatDescriptor::plain_text_stream(charset))
            .collect()
    }

    fn open_stream(&self, format: &FormatDescriptor) -> Result<Box<dyn Read>, ClipboardError> {
        if !self.formats().contains(format) {
            return Err(ClipboardError::UnsupportedFormat(format.to_string()));
        }
        let charset = Charset::for_name(format.charset().unwrap_or_default());
        let bytes = charset
            .encode_str(&self.text)
            .ok_or_else(|| ClipboardError::UnsupportedFormat(format.to_string()))?;
        Ok(Box::new(Cursor::new(bytes)))
    }
}

/// 剪贴板变化处理器（内部实现）
///
/// 监听停用或接收方释放后返回 `Stop`，让 `Master::run` 退出。
struct MonitorHandler {
    sink: Weak<dyn ChangeSink>,
    active: Arc<AtomicBool>,
}

impl ClipboardHandler for MonitorHandler {
    fn on_clipboard_change(&mut self) -> CallbackResult {
        if !self.active.load(Ordering::SeqCst) {
            return CallbackResult::Stop;
        }
        let Some(sink) = self.sink.upgrade() else {
            return CallbackResult::Stop;
        };
        sink.clipboard_changed(None);
        CallbackResult::Next
    }

    fn on_clipboard_error(&mut self, error: std::io::Error) -> CallbackResult {
        log::error!("剪贴板错误：{}", error);
        CallbackResult::Next
    }
}

/// 系统剪贴板
#[derive(Default)]
pub struct SystemClipboard {
    active: Mutex<Option<Arc<AtomicBool>>>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn active_slot(&self) -> std::sync::MutexGuard<'_, Option<Arc<AtomicBool>>> {
        match self.active.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("剪贴板监听状态锁中毒，继续使用恢复数据");
                poisoned.into_inner()
            }
        }
    }
}

impl ClipboardHost for SystemClipboard {
    fn name(&self) -> &str {
        "system"
    }

    fn contents(&self) -> Result<Option<Box<dyn Transferable>>, ClipboardError> {
        let mut clipboard = arboard::Clipboard::new().map_err(map_arboard_error)?;
        match clipboard.get_text() {
            Ok(text) => Ok(Some(Box::new(TextSnapshot::new(text)))),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(err) => Err(map_arboard_error(err)),
        }
    }

    fn write_back(&self, contents: &dyn Transferable) -> Result<(), ClipboardError> {
        let wanted = FormatDescriptor::plain_text_stream("UTF-8");
        let Some(format) = contents.find_format(&wanted) else {
            return Err(ClipboardError::UnsupportedFormat(wanted.to_string()));
        };

        let mut text = String::new();
        contents.open_stream(&format)?.read_to_string(&mut text)?;

        let mut clipboard = arboard::Clipboard::new().map_err(map_arboard_error)?;
        clipboard.set_text(text).map_err(map_arboard_error)
    }

    fn watch(&self, sink: Weak<dyn ChangeSink>) -> Result<(), ClipboardError> {
        let active = Arc::new(AtomicBool::new(true));
        if let Some(previous) = self.active_slot().replace(Arc::clone(&active)) {
            previous.store(false, Ordering::SeqCst);
        }

        let spawned = thread::Builder::new()
            .name("clipboard-monitor".to_string())
            .spawn(move || {
                let mut restart_attempt: u32 = 0;
                while active.load(Ordering::SeqCst) {
                    let handler = MonitorHandler {
                        sink: sink.clone(),
                        active: Arc::clone(&active),
                    };
                    match Master::new(handler) {
                        Ok(mut master) => {
                            restart_attempt = 0;
                            log::info!("📋 剪贴板监听已启动");
                            if let Err(err) = master.run() {
                                log::warn!("📋 剪贴板监听异常退出: {}", err);
                            }
                            if !active.load(Ordering::SeqCst) {
                                break;
                            }
                            log::warn!("📋 剪贴板监听已退出，将尝试重启");
                        }
                        Err(err) => {
                            log::error!("📋 创建剪贴板监听失败: {}", err);
                        }
                    }

                    restart_attempt = restart_attempt.saturating_add(1);
                    let backoff_ms = compute_restart_backoff_ms(restart_attempt);
                    log::warn!("📋 剪贴板监听 {}ms 后重试（attempt={}）", backoff_ms, restart_attempt);
                    thread::sleep(Duration::from_millis(backoff_ms));
                }
                log::info!("📋 剪贴板监听已停止");
            });

        spawned
            .map(|_| ())
            .map_err(|err| ClipboardError::Unavailable(format!("无法启动监听线程: {err}")))
    }

    fn unwatch(&self) {
        if let Some(active) = self.active_slot().take() {
            active.store(false, Ordering::SeqCst);
        }
    }
}
