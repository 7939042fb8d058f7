//! # 剪贴板图片提取工具 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 main.rs（命令行 + 日志初始化）            │
//! └───────┬──────────────────────────────────────────────────┘
//!         ↓
//! ┌───────┴──────────────────────────────────────────────────┐
//! │  ┌─ clipboard ── 服务生命周期 + 变更队列 + 处理器分发     │
//! │  │   ├─ system        arboard 读写 / clipboard-master 监听│
//! │  │   └─ host          宿主边界（可替换为测试替身）        │
//! │  │                                                       │
//! │  ├─ extractor ── data URI 识别·解码·去重·保存            │
//! │  ├─ stream ───── 逐单元取字节 + Base64 + SHA-256          │
//! │  ├─ charset ──── 字节序分析 + Base64 一致性              │
//! │  ├─ progress ─── 可订阅的状态 / 预览 / 序号               │
//! │  ├─ settings ─── JSON 设置持久化                          │
//! │  └─ error ────── AppError (统一错误类型)                  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError` |
//! | [`charset`] | 字符集解析、字节序分析、Base64 一致性检查与报表 |
//! | [`stream`] | 多字节字符流到 Base64 文本的还原、流式解码与摘要 |
//! | [`clipboard`] | 宿主剪贴板抽象、监听服务、变更队列、处理器表 |
//! | [`extractor`] | 从剪贴板文本中提取图片并按摘要去重保存 |
//! | [`progress`] | 面向界面的可订阅状态 |
//! | [`settings`] | 输出目录与文件序号的持久化 |
//! | [`signal`] | 协作式停止信号 |

pub mod charset;
pub mod clipboard;
pub mod error;
pub mod extractor;
pub mod progress;
pub mod settings;
pub mod signal;
pub mod stream;
