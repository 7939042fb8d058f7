use std::collections::VecDeque;
use std::sync::Arc;

use super::error::{ClipboardError, ServiceError};
use super::format::FormatDescriptor;
use super::host::Transferable;
use crate::signal::StopSignal;

/// 格式处理器：对匹配的剪贴板格式执行实际工作。
pub trait FormatProcessor: Send + Sync {
    fn name(&self) -> &str;

    /// 返回 `Ok(true)` 表示已处理，`Ok(false)` 表示放弃（不感兴趣或被中止）。
    fn handle_format(
        &self,
        format: &FormatDescriptor,
        stop: &StopSignal,
        contents: &dyn Transferable,
    ) -> Result<bool, ClipboardError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type FormatPredicate = Box<dyn Fn(&dyn Transferable) -> Option<FormatDescriptor> + Send + Sync>;

struct HandlerEntry {
    id: HandlerId,
    matches: FormatPredicate,
    processor: Arc<dyn FormatProcessor>,
}

/// 一次分发的结果
#[derive(Debug)]
pub enum DispatchOutcome {
    Handled(HandlerId),
    Declined(HandlerId),
    NoHandler,
    Aborted,
    Failed(HandlerId, ClipboardError),
}

/// 有序的处理器表，第一个格式匹配的处理器获得本次变化。
#[derive(Default)]
pub struct HandlerRegistry {
    entries: VecDeque<HandlerEntry>,
    next_id: u64,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册处理器。`priority` 为真时排到最前面。
    ///
    /// 同一个处理器实例重复注册时返回已有的 ID。
    pub fn register(
        &mut self,
        formats: Vec<FormatDescriptor>,
        processor: Arc<dyn FormatProcessor>,
        priority: bool,
    ) -> Result<HandlerId, ServiceError> {
        if formats.is_empty() {
            return Err(ServiceError::InvalidArgument(format!(
                "处理器 {} 未声明任何格式",
                processor.name()
            )));
        }

        if let Some(existing) = self
            .entries
            .iter()
            .find(|entry| std::ptr::addr_eq(Arc::as_ptr(&entry.processor), Arc::as_ptr(&processor)))
        {
            return Ok(existing.id);
        }

        self.next_id += 1;
        let id = HandlerId(self.next_id);
        let entry = HandlerEntry {
            id,
            matches: Box::new(move |contents: &dyn Transferable| {
                formats.iter().find_map(|wanted| contents.find_format(wanted))
            }),
            processor,
        };

        if priority {
            self.entries.push_front(entry);
        } else {
            self.entries.push_back(entry);
        }
        Ok(id)
    }

    pub fn remove(&mut self, id: HandlerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        before != self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 把内容交给第一个格式匹配的处理器。
    pub fn dispatch(&self, contents: &dyn Transferable, stop: &StopSignal) -> DispatchOutcome {
        for entry in &self.entries {
            if stop.is_stop_requested() {
                return DispatchOutcome::Aborted;
            }

            let Some(format) = (entry.matches)(contents) else {
                continue;
            };

            log::debug!("🔎 处理器 {} 匹配格式 {}", entry.processor.name(), format);
            return match entry.processor.handle_format(&format, stop, contents) {
                Ok(true) => DispatchOutcome::Handled(entry.id),
                Ok(false) => DispatchOutcome::Declined(entry.id),
                Err(err) => DispatchOutcome::Failed(entry.id, err),
            };
        }
        DispatchOutcome::NoHandler
    }
}
