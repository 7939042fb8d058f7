//! # 协作式停止信号
//!
//! 工作线程开始一次处理前“布防”信号，长时间运行的处理器在各个检查点
//! 轮询 [`StopSignal::is_stop_requested`]，发现请求后尽快返回“未处理”。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    processing: Arc<AtomicBool>,
}

impl StopSignal {
    /// 新建的信号处于未布防状态，`is_stop_requested` 返回 `true`。
    pub fn new() -> Self {
        Self::default()
    }

    /// 已布防的信号，直接调用处理器时使用。
    pub fn armed() -> Self {
        let signal = Self::new();
        signal.arm();
        signal
    }

    pub fn arm(&self) {
        self.processing.store(true, Ordering::SeqCst);
    }

    pub(crate) fn disarm(&self) {
        self.processing.store(false, Ordering::SeqCst);
    }

    /// 请求停止当前处理，返回请求前是否处于布防状态。
    pub fn request_stop(&self) -> bool {
        self.processing.swap(false, Ordering::SeqCst)
    }

    pub fn is_stop_requested(&self) -> bool {
        !self.processing.load(Ordering::SeqCst)
    }
}
