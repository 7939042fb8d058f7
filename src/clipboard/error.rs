use thiserror::Error;

/// 剪贴板访问错误
#[derive(Debug, Error)]
pub enum ClipboardError {
    /// 剪贴板暂时被其他程序占用，可以重试
    #[error("剪贴板被占用：{0}")]
    Busy(String),

    #[error("剪贴板不可用：{0}")]
    Unavailable(String),

    #[error("不支持的剪贴板格式：{0}")]
    UnsupportedFormat(String),

    #[error("读取剪贴板数据失败：{0}")]
    Io(#[from] std::io::Error),
}

impl ClipboardError {
    pub fn is_busy(&self) -> bool {
        matches!(self, ClipboardError::Busy(_))
    }
}

/// 服务生命周期错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// 操作与当前生命周期状态冲突，例如运行中注册处理器
    #[error("非法状态：{0}")]
    IllegalState(String),

    #[error("参数无效：{0}")]
    InvalidArgument(String),
}
