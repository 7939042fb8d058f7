#![allow(dead_code)]

use std::io::{self, Cursor, Read};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{ImageBuffer, ImageFormat, Rgb, Rgba};

use clipboard_image_extractor::charset::Charset;
use clipboard_image_extractor::clipboard::{
    ChangeSink, ClipboardError, ClipboardHost, ClipboardRef, FormatDescriptor, Transferable,
};

pub fn create_png_bytes(width: u32, height: u32, seed: u8) -> Vec<u8> {
    let image = ImageBuffer::from_fn(width, height, |x, y| {
        Rgba([(x * 30) as u8 ^ seed, (y * 30) as u8, seed, 255])
    });
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

pub fn create_jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = ImageBuffer::from_fn(width, height, |x, y| Rgb([(x * 20) as u8, (y * 20) as u8, 90]));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
        .unwrap();
    bytes
}

pub fn data_uri(subtype: &str, bytes: &[u8]) -> String {
    format!("data:image/{subtype};base64,{}", STANDARD.encode(bytes))
}

pub fn encode(charset: &str, text: &str) -> Vec<u8> {
    Charset::for_name(charset)
        .encode_str(text)
        .expect("test charset must be encodable")
}

pub fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("{prefix}_{nanos}"));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn files_in(dir: &PathBuf) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

pub fn wait_for(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// 第一次读取时通知测试方并等待放行
pub struct Gate {
    started: Sender<()>,
    release: Receiver<()>,
}

impl Gate {
    /// 返回 (门, 开始通知接收端, 放行发送端)
    pub fn new() -> (Self, Receiver<()>, Sender<()>) {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        (
            Self {
                started: started_tx,
                release: release_rx,
            },
            started_rx,
            release_tx,
        )
    }

    pub fn pass(self) {
        let _ = self.started.send(());
        let _ = self.release.recv_timeout(Duration::from_secs(10));
    }
}

struct GatedReader {
    inner: Cursor<Vec<u8>>,
    gate: Option<Gate>,
}

impl Read for GatedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(gate) = self.gate.take() {
            gate.pass();
        }
        self.inner.read(buf)
    }
}

/// 内存中的剪贴板内容
pub struct MemoryContents {
    entries: Vec<(FormatDescriptor, Vec<u8>)>,
    gate: Mutex<Option<Gate>>,
}

impl MemoryContents {
    pub fn new(entries: Vec<(FormatDescriptor, Vec<u8>)>) -> Self {
        Self {
            entries,
            gate: Mutex::new(None),
        }
    }

    pub fn text(charset: &str, text: &str) -> Self {
        Self::new(vec![(FormatDescriptor::plain_text_stream(charset), encode(charset, text))])
    }

    pub fn raw(format: FormatDescriptor, bytes: Vec<u8>) -> Self {
        Self::new(vec![(format, bytes)])
    }

    pub fn with_gate(self, gate: Gate) -> Self {
        *self.gate.lock().unwrap() = Some(gate);
        self
    }

    pub fn first_format(&self) -> FormatDescriptor {
        self.entries[0].0.clone()
    }
}

impl Transferable for MemoryContents {
    fn formats(&self) -> Vec<FormatDescriptor> {
        self.entries.iter().map(|(format, _)| format.clone()).collect()
    }

    fn open_stream(&self, format: &FormatDescriptor) -> Result<Box<dyn Read>, ClipboardError> {
        let Some((_, bytes)) = self.entries.iter().find(|(offered, _)| offered == format) else {
            return Err(ClipboardError::UnsupportedFormat(format.to_string()));
        };
        Ok(Box::new(GatedReader {
            inner: Cursor::new(bytes.clone()),
            gate: self.gate.lock().unwrap().take(),
        }))
    }
}

/// 内存剪贴板替身：可模拟占用、阻塞读取，并像真实剪贴板一样在写回后发出变化通知。
pub struct MemoryClipboard {
    name: String,
    entries: Mutex<Vec<(FormatDescriptor, Vec<u8>)>>,
    gate: Mutex<Option<Gate>>,
    busy_failures: AtomicU32,
    open_attempts: AtomicUsize,
    write_backs: AtomicUsize,
    sink: Mutex<Option<Weak<dyn ChangeSink>>>,
}

impl MemoryClipboard {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            entries: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
            busy_failures: AtomicU32::new(0),
            open_attempts: AtomicUsize::new(0),
            write_backs: AtomicUsize::new(0),
            sink: Mutex::new(None),
        })
    }

    pub fn with_text(name: &str, charset: &str, text: &str) -> Arc<Self> {
        let clipboard = Self::new(name);
        clipboard.set_text(charset, text);
        clipboard
    }

    pub fn set_text(&self, charset: &str, text: &str) {
        *self.entries.lock().unwrap() =
            vec![(FormatDescriptor::plain_text_stream(charset), encode(charset, text))];
    }

    pub fn set_raw(&self, format: FormatDescriptor, bytes: Vec<u8>) {
        *self.entries.lock().unwrap() = vec![(format, bytes)];
    }

    /// 下一次打开的字节流在第一次读取时阻塞
    pub fn gate_next_stream(&self) -> (Receiver<()>, Sender<()>) {
        let (gate, started, release) = Gate::new();
        *self.gate.lock().unwrap() = Some(gate);
        (started, release)
    }

    pub fn fail_busy(&self, times: u32) {
        self.busy_failures.store(times, Ordering::SeqCst);
    }

    pub fn open_attempts(&self) -> usize {
        self.open_attempts.load(Ordering::SeqCst)
    }

    pub fn write_backs(&self) -> usize {
        self.write_backs.load(Ordering::SeqCst)
    }

    pub fn is_watched(&self) -> bool {
        self.sink.lock().unwrap().is_some()
    }

    /// 向监听方发出变化通知，没有监听方时返回 `false`。
    pub fn emit(&self, source: Option<ClipboardRef>) -> bool {
        let sink = self.sink.lock().unwrap().as_ref().and_then(Weak::upgrade);
        match sink {
            Some(sink) => {
                sink.clipboard_changed(source);
                true
            }
            None => false,
        }
    }
}

impl ClipboardHost for MemoryClipboard {
    fn name(&self) -> &str {
        &self.name
    }

    fn contents(&self) -> Result<Option<Box<dyn Transferable>>, ClipboardError> {
        self.open_attempts.fetch_add(1, Ordering::SeqCst);
        let busy = self
            .busy_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if busy {
            return Err(ClipboardError::Busy("held by another process".to_string()));
        }

        let entries = self.entries.lock().unwrap().clone();
        if entries.is_empty() {
            return Ok(None);
        }
        let contents = MemoryContents::new(entries);
        if let Some(gate) = self.gate.lock().unwrap().take() {
            return Ok(Some(Box::new(contents.with_gate(gate))));
        }
        Ok(Some(Box::new(contents)))
    }

    fn write_back(&self, contents: &dyn Transferable) -> Result<(), ClipboardError> {
        assert!(contents.formats().iter().all(FormatDescriptor::is_stream));
        self.write_backs.fetch_add(1, Ordering::SeqCst);
        self.emit(None);
        Ok(())
    }

    fn watch(&self, sink: Weak<dyn ChangeSink>) -> Result<(), ClipboardError> {
        *self.sink.lock().unwrap() = Some(sink);
        Ok(())
    }

    fn unwatch(&self) {
        *self.sink.lock().unwrap() = None;
    }
}
