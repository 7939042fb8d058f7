use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// 摘要 → 已保存文件路径。只在保存成功后登记，进程内有效。
#[derive(Debug, Default, Clone)]
pub struct DigestRecord {
    entries: HashMap<String, PathBuf>,
}

impl DigestRecord {
    pub fn get(&self, digest: &str) -> Option<&Path> {
        self.entries.get(digest).map(PathBuf::as_path)
    }

    pub fn contains(&self, digest: &str) -> bool {
        self.entries.contains_key(digest)
    }

    pub(crate) fn insert(&mut self, digest: String, path: PathBuf) {
        self.entries.insert(digest, path);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.entries
            .iter()
            .map(|(digest, path)| (digest.as_str(), path.as_path()))
    }
}
