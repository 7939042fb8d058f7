//! # 进度模型（progress）
//!
//! ## 设计思路
//!
//! 提取链路只负责“报告”，不关心谁在看：状态行、状态栏、预览图、
//! 文件序号等都放进可订阅的 [`Observable`]，命令行界面或测试按需订阅。
//!
//! ## 实现思路
//!
//! - `Observable<T>` = `RwLock<T>` + 监听器列表；回调在锁外执行，
//!   监听器里再次读取同一个值不会死锁。
//! - 状态行是追加式的：每条都通知监听器，同时保留最近的若干条历史。
//! - 输出目录的修改先校验（存在、是目录、可写），不合格的值直接丢弃。

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use image::DynamicImage;

/// 保留的状态行历史条数
const STATUS_HISTORY_LIMIT: usize = 200;

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// 可订阅的值
pub struct Observable<T> {
    value: RwLock<T>,
    listeners: Mutex<Vec<(u64, Listener<T>)>>,
    next_id: AtomicU64,
}

impl<T: Clone> Observable<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: RwLock::new(value),
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn get(&self) -> T {
        match self.value.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// 替换当前值并通知所有监听器。
    pub fn set(&self, value: T) {
        {
            let mut guard = match self.value.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            *guard = value.clone();
        }
        self.notify(&value);
    }

    /// 基于当前值计算新值，返回新值。
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> T {
        let value = {
            let mut guard = match self.value.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let next = f(&*guard);
            *guard = next.clone();
            next
        };
        self.notify(&value);
        value
    }

    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock_listeners().push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: u64) -> bool {
        let mut listeners = self.lock_listeners();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        before != listeners.len()
    }

    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, Vec<(u64, Listener<T>)>> {
        match self.listeners.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("监听器列表锁中毒，继续使用恢复数据");
                poisoned.into_inner()
            }
        }
    }

    fn notify(&self, value: &T) {
        let listeners: Vec<Listener<T>> = self
            .lock_listeners()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(value);
        }
    }
}

/// 提取进度与界面状态。
pub struct ProgressModel {
    status: Observable<String>,
    status_history: Mutex<VecDeque<String>>,
    status_bar: Observable<String>,
    current_image: Observable<Option<Arc<DynamicImage>>>,
    enabled: Observable<bool>,
    sequence: Observable<u64>,
    image_type: Observable<String>,
    output_dir: Observable<PathBuf>,
}

impl ProgressModel {
    pub fn new(output_dir: PathBuf, first_sequence: u64) -> Self {
        Self {
            status: Observable::new(String::new()),
            status_history: Mutex::new(VecDeque::new()),
            status_bar: Observable::new(String::new()),
            current_image: Observable::new(None),
            enabled: Observable::new(true),
            sequence: Observable::new(first_sequence),
            image_type: Observable::new(String::new()),
            output_dir: Observable::new(output_dir),
        }
    }

    /// 追加一条带时间戳的状态行。
    pub fn report(&self, message: impl AsRef<str>) {
        let line = format!(
            "[{}] {}",
            chrono::Local::now().format("%H:%M:%S"),
            message.as_ref()
        );
        {
            let mut history = match self.status_history.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if history.len() >= STATUS_HISTORY_LIMIT {
                history.pop_front();
            }
            history.push_back(line.clone());
        }
        self.status.set(line);
    }

    pub fn status_history(&self) -> Vec<String> {
        match self.status_history.lock() {
            Ok(guard) => guard.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    pub fn status(&self) -> &Observable<String> {
        &self.status
    }

    pub fn status_bar(&self) -> &Observable<String> {
        &self.status_bar
    }

    /// 状态栏显示最近一次保存或命中的文件与摘要
    pub fn report_checksum(&self, path: &Path, digest: &str) {
        self.status_bar
            .set(format!("File: {} ; Checksum {}", path.display(), digest));
    }

    pub fn current_image(&self) -> &Observable<Option<Arc<DynamicImage>>> {
        &self.current_image
    }

    pub fn enabled(&self) -> &Observable<bool> {
        &self.enabled
    }

    pub fn sequence(&self) -> &Observable<u64> {
        &self.sequence
    }

    /// 文件序号加一，返回新值。
    pub fn advance_sequence(&self) -> u64 {
        self.sequence.update(|current| current.saturating_add(1))
    }

    pub fn image_type(&self) -> &Observable<String> {
        &self.image_type
    }

    pub fn output_dir(&self) -> &Observable<PathBuf> {
        &self.output_dir
    }

    /// 修改输出目录。目录不存在、不是目录或只读时拒绝并返回 `false`。
    pub fn try_set_output_dir(&self, dir: impl Into<PathBuf>) -> bool {
        let dir = dir.into();
        let metadata = match std::fs::metadata(&dir) {
            Ok(metadata) => metadata,
            Err(err) => {
                log::warn!("⚠️ 输出目录不可用 {}: {}", dir.display(), err);
                return false;
            }
        };
        if !metadata.is_dir() {
            log::warn!("⚠️ 输出路径不是目录: {}", dir.display());
            return false;
        }
        if metadata.permissions().readonly() {
            log::warn!("⚠️ 输出目录只读: {}", dir.display());
            return false;
        }

        log::info!("📁 输出目录已更新: {}", dir.display());
        self.output_dir.set(dir);
        true
    }
}
