//! # 剪贴板监听服务
//!
//! ## 设计思路
//!
//! 变化通知来自宿主剪贴板的回调线程，真正的处理放在单独的工作线程：
//! 回调只负责入队，工作线程串行地取出资源、打开内容、分发给处理器。
//!
//! ```text
//! 宿主回调 ──▶ clipboard_changed ──▶ ChangeQueue(5) ──▶ 工作线程
//!                 │ skip-next 闩锁                        │ 最后一次入队后静默 50ms 再取
//!                 │                                       │ 打开内容（忙则重试 3 次）
//!                 ▼                                       │ 分发给第一个匹配的处理器
//!           丢弃本服务写回触发的事件                        ▼ 需要时写回以夺回所有权
//! ```
//!
//! ## 实现思路
//!
//! - 生命周期状态、处理状态、队列与“立即处理”标志放在同一把锁里，
//!   配合两个条件变量：`wake` 唤醒工作线程，`idle` 通知等待空闲的调用方。
//! - 停止处理只翻转共享的 [`StopSignal`]，处理器在检查点自行放弃，
//!   服务不会强行中断线程。
//! - 一阵连续的通知只触发一次处理：工作线程等队列静默一个合并窗口后再取，
//!   取出的资源在打开内容之前仍吸收同一资源的新通知。
//! - 处理器 panic 被 `catch_unwind` 截获并记录，工作线程继续运行。
//! - 服务自身的失败（剪贴板被占用、没有处理器接受等）同样写入状态栏。

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::error::{ClipboardError, ServiceError};
use super::format::FormatDescriptor;
use super::host::{ChangeSink, ClipboardHost, ClipboardRef, StreamOnlyTransferable, Transferable};
use super::queue::{ChangeQueue, DEFAULT_QUEUE_CAPACITY, Offer};
use super::registry::{DispatchOutcome, FormatProcessor, HandlerId, HandlerRegistry};
use crate::progress::ProgressModel;
use crate::signal::StopSignal;

/// 服务配置
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// 变更队列容量
    pub queue_capacity: usize,
    /// 剪贴板被占用时的最多尝试次数
    pub busy_retry_attempts: u32,
    /// 两次尝试之间的等待（毫秒）
    pub busy_retry_delay_ms: u64,
    /// 最后一次入队后等待的静默时间（毫秒），窗口内的通知合并为一次处理
    pub coalesce_window_ms: u64,
    /// 工作线程名称
    pub worker_thread_name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            busy_retry_attempts: 3,
            busy_retry_delay_ms: 100,
            coalesce_window_ms: 50,
            worker_thread_name: "clipboard-change-worker".to_string(),
        }
    }
}

/// 服务生命周期
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Stopped,
    Starting,
    Running,
    /// 已请求停止，当前处理结束后工作线程退出
    StoppingGraceful,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Idle,
    Processing,
}

struct Control {
    state: ServiceState,
    attempt: AttemptState,
    queue: ChangeQueue<ClipboardRef>,
    force_process: bool,
    last_offer_at: Option<Instant>,
    /// 已取出但尚未打开内容的资源
    claimed: Option<ClipboardRef>,
}

struct ServiceShared {
    system: ClipboardRef,
    config: ServiceConfig,
    control: Mutex<Control>,
    wake: Condvar,
    idle: Condvar,
    signal: StopSignal,
    handlers: RwLock<HandlerRegistry>,
    progress: Option<Arc<ProgressModel>>,
    /// 剪贴板当前内容是否由本服务写入
    owner: AtomicBool,
    /// 忽略下一次变化通知（本服务自己的写回）
    skip_next: AtomicBool,
}

/// 剪贴板监听服务。
pub struct ClipboardService {
    shared: Arc<ServiceShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ClipboardService {
    pub fn new(system: Arc<dyn ClipboardHost>, config: ServiceConfig) -> Self {
        Self::build(system, config, None)
    }

    /// 与 [`ClipboardService::new`] 相同，另外把服务自身的失败写入状态栏。
    pub fn with_progress(
        system: Arc<dyn ClipboardHost>,
        config: ServiceConfig,
        progress: Arc<ProgressModel>,
    ) -> Self {
        Self::build(system, config, Some(progress))
    }

    fn build(
        system: Arc<dyn ClipboardHost>,
        config: ServiceConfig,
        progress: Option<Arc<ProgressModel>>,
    ) -> Self {
        let queue = ChangeQueue::with_capacity(config.queue_capacity);
        Self {
            shared: Arc::new(ServiceShared {
                system: ClipboardRef::new(system),
                config,
                control: Mutex::new(Control {
                    state: ServiceState::Stopped,
                    attempt: AttemptState::Idle,
                    queue,
                    force_process: false,
                    last_offer_at: None,
                    claimed: None,
                }),
                wake: Condvar::new(),
                idle: Condvar::new(),
                signal: StopSignal::new(),
                handlers: RwLock::new(HandlerRegistry::new()),
                progress,
                owner: AtomicBool::new(false),
                skip_next: AtomicBool::new(false),
            }),
            worker: Mutex::new(None),
        }
    }

    /// 默认的系统剪贴板资源
    pub fn system_clipboard(&self) -> ClipboardRef {
        self.shared.system.clone()
    }

    /// 注册处理器，只能在服务停止且空闲时调用。
    pub fn register_handler(
        &self,
        formats: Vec<FormatDescriptor>,
        processor: Arc<dyn FormatProcessor>,
        priority: bool,
    ) -> Result<HandlerId, ServiceError> {
        let control = self.shared.lock_control();
        ensure_configurable(&control, "注册处理器")?;
        let name = processor.name().to_string();
        let id = self.shared.write_handlers().register(formats, processor, priority)?;
        drop(control);

        log::info!("🧩 已注册处理器 {}（priority={}）", name, priority);
        Ok(id)
    }

    pub fn remove_handler(&self, id: HandlerId) -> Result<bool, ServiceError> {
        let control = self.shared.lock_control();
        ensure_configurable(&control, "移除处理器")?;
        Ok(self.shared.write_handlers().remove(id))
    }

    /// 启动服务。
    ///
    /// 服务未停止、没有处理器或上一个工作线程仍存活时返回 `false`。
    pub fn start(&self) -> bool {
        let mut worker = lock_or_recover(&self.worker, "工作线程句柄");

        {
            let control = self.shared.lock_control();
            if control.state != ServiceState::Stopped {
                log::warn!("⚠️ 服务已在运行或正在停止，忽略启动请求");
                return false;
            }
        }

        if self.shared.read_handlers().is_empty() {
            log::warn!("⚠️ 没有注册任何处理器，拒绝启动");
            return false;
        }

        if let Some(handle) = worker.take() {
            if !handle.is_finished() {
                log::warn!("⚠️ 上一个工作线程仍未退出，拒绝启动");
                *worker = Some(handle);
                return false;
            }
            if handle.join().is_err() {
                log::error!("❌ 上一个工作线程异常退出");
            }
        }

        {
            let mut control = self.shared.lock_control();
            control.queue.clear();
            control.force_process = false;
            control.last_offer_at = None;
            control.claimed = None;
            control.attempt = AttemptState::Idle;
            control.state = ServiceState::Starting;
        }
        self.shared.skip_next.store(false, Ordering::SeqCst);

        let shared_weak: Weak<ServiceShared> = Arc::downgrade(&self.shared);
        let sink: Weak<dyn ChangeSink> = shared_weak;
        if let Err(err) = self.shared.system.host().watch(sink) {
            log::error!("❌ 注册剪贴板变化通知失败: {}", err);
            self.shared.lock_control().state = ServiceState::Stopped;
            return false;
        }

        self.shared.lock_control().state = ServiceState::Running;

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(self.shared.config.worker_thread_name.clone())
            .spawn(move || shared.run_worker());

        match spawned {
            Ok(handle) => {
                *worker = Some(handle);
                log::info!("📋 剪贴板服务已启动（{}）", self.shared.system.name());
                true
            }
            Err(err) => {
                log::error!("❌ 创建工作线程失败: {}", err);
                self.shared.system.host().unwatch();
                self.shared.lock_control().state = ServiceState::Stopped;
                false
            }
        }
    }

    /// 请求优雅停止：不再接收新变化，当前处理完成后工作线程退出。
    pub fn request_stop(&self) -> bool {
        {
            let mut control = self.shared.lock_control();
            if control.state != ServiceState::Running {
                return false;
            }
            control.state = ServiceState::StoppingGraceful;
            control.queue.clear();
            control.force_process = false;
        }
        self.shared.system.host().unwatch();
        self.shared.wake.notify_all();
        self.shared.idle.notify_all();
        log::info!("🛑 已请求停止剪贴板服务");
        true
    }

    /// 请求中止正在进行的处理，没有处理在进行时返回 `false`。
    pub fn request_stop_processing(&self) -> bool {
        let control = self.shared.lock_control();
        if control.attempt != AttemptState::Processing {
            return false;
        }
        let stopped = self.shared.signal.request_stop();
        if stopped {
            log::info!("⏹️ 已请求中止当前处理");
        }
        stopped
    }

    /// 不等变化通知，立即处理一次系统剪贴板。
    pub fn request_process_now(&self) -> bool {
        let mut control = self.shared.lock_control();
        if control.state != ServiceState::Running {
            return false;
        }
        control.force_process = true;
        self.shared.wake.notify_one();
        true
    }

    pub fn state(&self) -> ServiceState {
        self.shared.lock_control().state
    }

    pub fn attempt_state(&self) -> AttemptState {
        self.shared.lock_control().attempt
    }

    pub fn is_running(&self) -> bool {
        self.state() == ServiceState::Running
    }

    pub fn is_processing(&self) -> bool {
        self.attempt_state() == AttemptState::Processing
    }

    pub fn queued_len(&self) -> usize {
        self.shared.lock_control().queue.len()
    }

    pub fn is_owner(&self) -> bool {
        self.shared.owner.load(Ordering::SeqCst)
    }

    /// 等待队列清空且没有处理在进行；超时返回 `false`。
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut control = self.shared.lock_control();
        loop {
            let drained = control.queue.is_empty()
                && !control.force_process
                && control.attempt == AttemptState::Idle;
            if drained || control.state != ServiceState::Running {
                return control.attempt == AttemptState::Idle;
            }

            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            control = match self.shared.idle.wait_timeout(control, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    /// 等待工作线程退出。没有工作线程时立即返回 `true`。
    pub fn wait_for_shutdown(&self) -> bool {
        let handle = lock_or_recover(&self.worker, "工作线程句柄").take();
        match handle {
            Some(handle) => match handle.join() {
                Ok(()) => true,
                Err(_) => {
                    log::error!("❌ 工作线程异常退出");
                    false
                }
            },
            None => true,
        }
    }
}

impl Drop for ClipboardService {
    fn drop(&mut self) {
        if self.request_stop() {
            self.wait_for_shutdown();
        }
    }
}

fn ensure_configurable(control: &Control, action: &str) -> Result<(), ServiceError> {
    if control.state != ServiceState::Stopped || control.attempt != AttemptState::Idle {
        return Err(ServiceError::IllegalState(format!(
            "{action}需要服务处于停止状态（当前 {:?}/{:?}）",
            control.state, control.attempt
        )));
    }
    Ok(())
}

fn lock_or_recover<'a, T>(mutex: &'a Mutex<T>, what: &str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("{}锁中毒，继续使用恢复数据", what);
            poisoned.into_inner()
        }
    }
}

/// 距离最小间隔还剩多少时间；已满足间隔时返回 `None`。
fn debounce_remaining(elapsed: Duration, min_interval: Duration) -> Option<Duration> {
    if elapsed >= min_interval {
        None
    } else {
        Some(min_interval - elapsed)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "未知 panic".to_string()
    }
}

impl ServiceShared {
    fn lock_control(&self) -> MutexGuard<'_, Control> {
        lock_or_recover(&self.control, "服务控制状态")
    }

    fn read_handlers(&self) -> RwLockReadGuard<'_, HandlerRegistry> {
        match self.handlers.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("处理器表锁中毒，继续使用恢复数据");
                poisoned.into_inner()
            }
        }
    }

    fn write_handlers(&self) -> RwLockWriteGuard<'_, HandlerRegistry> {
        match self.handlers.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("处理器表锁中毒，继续使用恢复数据");
                poisoned.into_inner()
            }
        }
    }

    fn run_worker(self: Arc<Self>) {
        log::info!("📋 剪贴板处理线程已启动");

        while let Some(target) = self.next_target() {
            self.process_change(&target);

            let mut control = self.lock_control();
            control.attempt = AttemptState::Idle;
            control.claimed = None;
            self.signal.disarm();
            self.idle.notify_all();
        }

        {
            let mut control = self.lock_control();
            control.state = ServiceState::Stopped;
            control.attempt = AttemptState::Idle;
        }
        self.signal.disarm();
        self.idle.notify_all();
        log::info!("📋 剪贴板处理线程已退出");
    }

    /// 阻塞直到有待处理的资源；服务不再运行时返回 `None`。
    fn next_target(&self) -> Option<ClipboardRef> {
        let mut control = self.lock_control();
        loop {
            if control.state != ServiceState::Running {
                return None;
            }
            if control.queue.is_empty() && !control.force_process {
                self.idle.notify_all();
                control = match self.wake.wait(control) {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                continue;
            }

            if !control.force_process {
                let window = Duration::from_millis(self.config.coalesce_window_ms);
                let remaining = control
                    .last_offer_at
                    .and_then(|at| debounce_remaining(at.elapsed(), window));
                if let Some(remaining) = remaining {
                    control = match self.wake.wait_timeout(control, remaining) {
                        Ok((guard, _)) => guard,
                        Err(poisoned) => poisoned.into_inner().0,
                    };
                    continue;
                }
            }

            control.force_process = false;
            control.attempt = AttemptState::Processing;
            self.signal.arm();
            let target = control
                .queue
                .take_coalesced()
                .unwrap_or_else(|| self.system.clone());
            control.claimed = Some(target.clone());
            return Some(target);
        }
    }

    fn process_change(&self, target: &ClipboardRef) {
        let opened = self.open_contents(target);
        // 内容已读出，之后的通知意味着新的剪贴板内容
        self.lock_control().claimed = None;
        let Some(contents) = opened else {
            return;
        };
        if self.signal.is_stop_requested() {
            self.report_status("处理已中止");
            return;
        }

        if log::log_enabled!(log::Level::Debug) {
            for format in contents.formats() {
                log::debug!("📄 可用格式: {}", format);
            }
        }

        let dispatched = panic::catch_unwind(AssertUnwindSafe(|| {
            self.read_handlers().dispatch(contents.as_ref(), &self.signal)
        }));

        match dispatched {
            Ok(DispatchOutcome::Handled(id)) => log::debug!("✅ 处理器 {:?} 已处理变化", id),
            Ok(DispatchOutcome::Declined(id)) => log::debug!("处理器 {:?} 放弃处理", id),
            Ok(DispatchOutcome::NoHandler) => {
                log::debug!("没有处理器匹配当前内容");
                self.report_status("没有处理器接受当前剪贴板内容");
            }
            Ok(DispatchOutcome::Aborted) => {
                log::info!("⏹️ 处理已中止");
                self.report_status("处理已中止");
            }
            Ok(DispatchOutcome::Failed(id, err)) => {
                log::error!("❌ 处理器 {:?} 出错: {}", id, err);
                self.report_status(&format!("处理失败：{}", err));
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                log::error!("❌ 处理器 panic: {}", message);
                self.report_status(&format!("处理器异常：{}", message));
            }
        }

        if self.signal.is_stop_requested() {
            return;
        }
        // 只有被监听的系统剪贴板会为写回发出通知，跳过闩锁才能被消费
        if *target == self.system && !self.owner.load(Ordering::SeqCst) {
            self.regain_ownership(target, contents.as_ref());
        }
    }

    /// 打开剪贴板内容；被占用时按配置重试。
    fn open_contents(&self, target: &ClipboardRef) -> Option<Box<dyn Transferable>> {
        let attempts = self.config.busy_retry_attempts.max(1);
        for attempt in 1..=attempts {
            match target.host().contents() {
                Ok(Some(contents)) => {
                    if attempt > 1 {
                        log::info!("✅ 打开剪贴板成功 (尝试 {})", attempt);
                    }
                    return Some(contents);
                }
                Ok(None) => {
                    log::debug!("剪贴板为空");
                    self.report_status("剪贴板为空");
                    return None;
                }
                Err(ClipboardError::Busy(reason)) => {
                    log::warn!("⚠️ 剪贴板被占用 (尝试 {}/{}): {}", attempt, attempts, reason);
                    if attempt < attempts && !self.signal.is_stop_requested() {
                        thread::sleep(Duration::from_millis(self.config.busy_retry_delay_ms));
                    }
                }
                Err(err) => {
                    log::error!("❌ 读取剪贴板失败: {}", err);
                    self.report_status(&format!("读取剪贴板失败：{}", err));
                    return None;
                }
            }
            if self.signal.is_stop_requested() {
                self.report_status("处理已中止");
                return None;
            }
        }
        log::error!("❌ 剪贴板在 {} 次尝试后仍被占用", attempts);
        self.report_status(&format!("剪贴板被占用，{} 次尝试后放弃", attempts));
        None
    }

    fn report_status(&self, message: &str) {
        if let Some(progress) = &self.progress {
            progress.report(message);
        }
    }

    /// 把只含字节流格式的内容写回剪贴板，重新成为所有者。
    fn regain_ownership(&self, target: &ClipboardRef, contents: &dyn Transferable) {
        let stream_view = StreamOnlyTransferable::new(contents);
        self.skip_next.store(true, Ordering::SeqCst);

        let result = if stream_view.is_empty() {
            target.host().write_back(contents)
        } else {
            target.host().write_back(&stream_view)
        };

        match result {
            Ok(()) => {
                self.owner.store(true, Ordering::SeqCst);
                log::debug!("📌 已重新成为剪贴板所有者");
            }
            Err(err) => {
                self.skip_next.store(false, Ordering::SeqCst);
                log::warn!("⚠️ 写回剪贴板失败: {}", err);
            }
        }
    }

    fn log_queue_contents(&self, queue: &ChangeQueue<ClipboardRef>) {
        log::warn!("⚠️ 变更队列已满（{} 项）且各项互不相同：", queue.len());
        for (index, item) in queue.iter().enumerate() {
            log::warn!("  #{} {}", index, item.name());
        }
    }
}

impl ChangeSink for ServiceShared {
    fn clipboard_changed(&self, source: Option<ClipboardRef>) {
        let mut control = self.lock_control();

        if self.skip_next.swap(false, Ordering::SeqCst) {
            log::debug!("⏭️ 忽略本服务写回触发的剪贴板变化");
            return;
        }

        // 不是本服务写回的变化，说明内容已被其他程序替换
        self.owner.store(false, Ordering::SeqCst);

        if !matches!(control.state, ServiceState::Running | ServiceState::Starting) {
            return;
        }

        let resource = source.unwrap_or_else(|| self.system.clone());
        if control.queue.is_empty() && control.claimed.as_ref() == Some(&resource) {
            log::trace!("剪贴板变化与正在打开的资源相同，已合并");
            return;
        }
        control.last_offer_at = Some(Instant::now());
        match control.queue.offer(resource) {
            Offer::Queued => log::trace!("剪贴板变化已入队"),
            Offer::Coalesced => log::trace!("剪贴板变化与队尾相同，已合并"),
            Offer::Full(dropped) => {
                log::warn!("⚠️ 丢弃剪贴板变化: {}", dropped.name());
                self.log_queue_contents(&control.queue);
            }
        }

        if control.attempt == AttemptState::Idle {
            self.wake.notify_one();
        }
    }

    fn ownership_lost(&self) {
        self.owner.store(false, Ordering::SeqCst);
        log::debug!("剪贴板所有权已丢失");
    }
}
