//! 文件状态 - 内容指纹与目录快照

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// 流式哈希时每次读取的块大小
pub const HASH_CHUNK_SIZE: usize = 64 * 1024;

/// 文件内容指纹（BLAKE3 的前 16 字节）
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 16]);

impl Fingerprint {
    /// 计算内存数据的指纹
    pub fn of_bytes(data: &[u8]) -> Self {
        Self::from_hash(&blake3::hash(data))
    }

    fn from_hash(hash: &blake3::Hash) -> Self {
        // 只取前 16 字节，足够检测变化
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&hash.as_bytes()[..16]);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

/// 分块读取文件并计算指纹，内存占用与文件大小无关
pub fn fingerprint_file(path: &Path) -> io::Result<Fingerprint> {
    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; HASH_CHUNK_SIZE];

    loop {
        let read = match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..read]);
    }

    Ok(Fingerprint::from_hash(&hasher.finalize()))
}

/// 快照中的单个文件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileEntry {
    pub fingerprint: Fingerprint,
    pub size: u64,
}

/// 目录树快照
///
/// 路径均相对于根目录，使用 `/` 分隔，不包含根目录本身。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderState {
    root_exists: bool,
    dirs: BTreeSet<String>,
    files: BTreeMap<String, FileEntry>,
    /// 未解析的符号链接（仅副本扫描记录）
    links: BTreeSet<String>,
}

impl FolderState {
    /// 根目录不存在时的空快照
    pub fn missing() -> Self {
        Self::default()
    }

    /// 根目录存在但尚未记录任何条目
    pub fn empty() -> Self {
        Self {
            root_exists: true,
            ..Self::default()
        }
    }

    pub fn root_exists(&self) -> bool {
        self.root_exists
    }

    pub fn dirs(&self) -> impl Iterator<Item = &str> {
        self.dirs.iter().map(String::as_str)
    }

    pub fn files(&self) -> impl Iterator<Item = (&str, &FileEntry)> {
        self.files.iter().map(|(path, entry)| (path.as_str(), entry))
    }

    pub fn links(&self) -> impl Iterator<Item = &str> {
        self.links.iter().map(String::as_str)
    }

    pub fn has_dir(&self, path: &str) -> bool {
        self.dirs.contains(path)
    }

    pub fn has_file(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn has_link(&self, path: &str) -> bool {
        self.links.contains(path)
    }

    pub fn file(&self, path: &str) -> Option<&FileEntry> {
        self.files.get(path)
    }

    pub fn dir_count(&self) -> usize {
        self.dirs.len()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.values().map(|f| f.size).sum()
    }

    pub(crate) fn insert_dir(&mut self, path: impl Into<String>) {
        self.dirs.insert(path.into());
    }

    pub(crate) fn insert_file(&mut self, path: impl Into<String>, entry: FileEntry) {
        self.files.insert(path.into(), entry);
    }

    pub(crate) fn insert_link(&mut self, path: impl Into<String>) {
        self.links.insert(path.into());
    }

    /// 测试用：按内容构造文件条目
    #[cfg(test)]
    pub(crate) fn with_file(mut self, path: &str, content: &[u8]) -> Self {
        self.insert_file(
            path,
            FileEntry {
                fingerprint: Fingerprint::of_bytes(content),
                size: content.len() as u64,
            },
        );
        self
    }

    #[cfg(test)]
    pub(crate) fn with_dir(mut self, path: &str) -> Self {
        self.insert_dir(path);
        self
    }

    #[cfg(test)]
    pub(crate) fn with_link(mut self, path: &str) -> Self {
        self.insert_link(path);
        self
    }
}
