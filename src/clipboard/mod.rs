//! 剪贴板监听模块
//!
//! # 设计思路
//!
//! 把“宿主剪贴板”与“处理逻辑”隔开：
//! - **宿主边界**：[`ClipboardHost`] / [`Transferable`] 抽象系统剪贴板，
//!   测试中换成内存替身即可驱动整个服务
//! - **服务**：[`ClipboardService`] 管理生命周期、变更队列和工作线程
//! - **处理器表**：[`HandlerRegistry`] 按注册顺序把变化交给第一个匹配的 [`FormatProcessor`]
//! - **skip-next 闩锁**：服务写回剪贴板前设置，下一次变化通知被消费掉，
//!   避免处理自己写入的内容
//!
//! # 实现思路
//!
//! - 闩锁使用 `AtomicBool::swap(false, SeqCst)`，读取与清除一步完成。
//! - 系统宿主的监听线程运行 `clipboard-master`，异常退出后按指数退避重启。
//! - 子模块按职责拆分：格式描述归 `format`，队列归 `queue`，分发归 `registry`。

mod error;
mod format;
mod host;
mod queue;
mod registry;
mod service;
mod system;

pub use error::{ClipboardError, ServiceError};
pub use format::{FormatDescriptor, Representation};
pub use host::{ChangeSink, ClipboardHost, ClipboardRef, StreamOnlyTransferable, Transferable};
pub use queue::{ChangeQueue, DEFAULT_QUEUE_CAPACITY, Offer};
pub use registry::{DispatchOutcome, FormatProcessor, HandlerId, HandlerRegistry};
pub use service::{AttemptState, ClipboardService, ServiceConfig, ServiceState};
pub use system::{SystemClipboard, TextSnapshot};
