use std::fmt;
use std::io::Read;
use std::sync::{Arc, Weak};

use super::error::ClipboardError;
use super::format::FormatDescriptor;

/// 剪贴板内容快照：列出可用格式，并按格式打开字节流。
pub trait Transferable {
    fn formats(&self) -> Vec<FormatDescriptor>;

    /// 找到第一个满足 `wanted` 的可用格式
    fn find_format(&self, wanted: &FormatDescriptor) -> Option<FormatDescriptor> {
        self.formats().into_iter().find(|offered| wanted.accepts(offered))
    }

    fn open_stream(&self, format: &FormatDescriptor) -> Result<Box<dyn Read>, ClipboardError>;
}

/// 剪贴板变化的接收方。
pub trait ChangeSink: Send + Sync {
    /// `source` 为 `None` 时表示默认的系统剪贴板。
    fn clipboard_changed(&self, source: Option<ClipboardRef>);

    /// 本进程写入的内容被其他程序替换
    fn ownership_lost(&self);
}

/// 宿主剪贴板的抽象边界，系统实现与测试替身都实现这个 trait。
pub trait ClipboardHost: Send + Sync {
    fn name(&self) -> &str;

    /// 读取当前内容；剪贴板为空时返回 `Ok(None)`。
    fn contents(&self) -> Result<Option<Box<dyn Transferable>>, ClipboardError>;

    /// 把内容写回剪贴板，使本进程重新成为所有者。
    fn write_back(&self, contents: &dyn Transferable) -> Result<(), ClipboardError>;

    /// 开始把变化通知发给 `sink`。
    fn watch(&self, sink: Weak<dyn ChangeSink>) -> Result<(), ClipboardError>;

    fn unwatch(&self);
}

/// 剪贴板资源句柄，按宿主实例的身份比较。
#[derive(Clone)]
pub struct ClipboardRef(Arc<dyn ClipboardHost>);

impl ClipboardRef {
    pub fn new(host: Arc<dyn ClipboardHost>) -> Self {
        Self(host)
    }

    pub fn host(&self) -> &Arc<dyn ClipboardHost> {
        &self.0
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }
}

impl PartialEq for ClipboardRef {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

impl Eq for ClipboardRef {}

impl fmt::Debug for ClipboardRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClipboardRef").field(&self.name()).finish()
    }
}

/// 只暴露字节流格式的包装，写回时用它替代原始快照。
pub struct StreamOnlyTransferable<'a> {
    inner: &'a dyn Transferable,
    formats: Vec<FormatDescriptor>,
}

impl<'a> StreamOnlyTransferable<'a> {
    pub fn new(inner: &'a dyn Transferable) -> Self {
        let formats = inner
            .formats()
            .into_iter()
            .filter(FormatDescriptor::is_stream)
            .collect();
        Self { inner, formats }
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }
}

impl Transferable for StreamOnlyTransferable<'_> {
    fn formats(&self) -> Vec<FormatDescriptor> {
        self.formats.clone()
    }

    fn open_stream(&self, format: &FormatDescriptor) -> Result<Box<dyn Read>, ClipboardError> {
        if !self.formats.contains(format) {
            return Err(ClipboardError::UnsupportedFormat(format.to_string()));
        }
        self.inner.open_stream(format)
    }
}
