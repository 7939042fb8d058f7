//! 设置持久化
//!
//! 输出目录与下一个文件序号保存在 JSON 文件里，每次变化立即写盘。
//! 文件缺失或损坏时按空设置处理，不阻止程序启动。

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::AppError;
use crate::progress::ProgressModel;

pub const KEY_OUTPUT_DIR: &str = "outputDir";
pub const KEY_NEXT_SEQUENCE: &str = "nextSequence";

/// 键值设置存储
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), AppError>;
}

/// 以 JSON 文件保存的设置
pub struct JsonSettingsFile {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl JsonSettingsFile {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let path = path.into();
        let values = if path.exists() {
            let content = fs::read_to_string(&path)?;
            match serde_json::from_str::<BTreeMap<String, String>>(&content) {
                Ok(values) => values,
                Err(err) => {
                    log::warn!("⚠️ 解析设置文件失败，使用空设置 {}: {}", path.display(), err);
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self, values: &BTreeMap<String, String>) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(values)
            .map_err(|e| AppError::Settings(format!("序列化设置失败: {}", e)))?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl SettingsStore for JsonSettingsFile {
    fn get(&self, key: &str) -> Option<String> {
        match self.values.lock() {
            Ok(values) => values.get(key).cloned(),
            Err(poisoned) => poisoned.into_inner().get(key).cloned(),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        let mut values = match self.values.lock() {
            Ok(values) => values,
            Err(poisoned) => {
                log::warn!("设置锁中毒，继续使用恢复数据");
                poisoned.into_inner()
            }
        };
        values.insert(key.to_string(), value.to_string());
        self.save(&values)
    }
}

/// 从设置恢复输出目录与序号，并在之后的每次变化时写回。
pub fn bind_progress(progress: &ProgressModel, store: Arc<dyn SettingsStore>) {
    if let Some(dir) = store.get(KEY_OUTPUT_DIR) {
        if !progress.try_set_output_dir(&dir) {
            log::warn!("⚠️ 设置中的输出目录不可用，保持默认: {}", dir);
        }
    }
    if let Some(raw) = store.get(KEY_NEXT_SEQUENCE) {
        match raw.trim().parse::<u64>() {
            Ok(sequence) => progress.sequence().set(sequence),
            Err(err) => log::warn!("⚠️ 设置中的文件序号无效 {}: {}", raw, err),
        }
    }

    let dir_store = Arc::clone(&store);
    progress.output_dir().subscribe(move |dir| {
        if let Err(err) = dir_store.set(KEY_OUTPUT_DIR, &dir.to_string_lossy()) {
            log::error!("❌ 保存输出目录失败: {}", err);
        }
    });
    progress.sequence().subscribe(move |sequence| {
        if let Err(err) = store.set(KEY_NEXT_SEQUENCE, &sequence.to_string()) {
            log::error!("❌ 保存文件序号失败: {}", err);
        }
    });
}
