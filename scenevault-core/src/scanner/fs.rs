use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{CoreError, CoreResult};

/// Minimal async filesystem abstraction the scanner walks through, with a
/// byte-range read so the walker can compute a cheap content-hash without
/// pulling in a full read of large video files.
#[async_trait]
pub trait FileSystem: Send + Sync {
    async fn path_exists(&self, path: &Path) -> bool;

    async fn read_dir(&self, path: &Path) -> CoreResult<Box<dyn ReadDirStream + Send>>;

    async fn metadata(&self, path: &Path) -> CoreResult<FsMetadata>;

    /// Resolves symlinks so the walker can detect cycles and enforce the
    /// "follow only within a registered root" rule. Implementations without
    /// real symlinks may return `path` unchanged.
    async fn canonicalize(&self, path: &Path) -> CoreResult<PathBuf>;

    /// Reads up to `len` bytes starting at `offset`, used to sample the
    /// first/last kilobyte for the cheap content-hash.
    async fn read_bytes(&self, path: &Path, offset: u64, len: usize) -> CoreResult<Vec<u8>>;
}

#[derive(Debug, Clone, Copy)]
pub struct FsMetadata {
    pub is_dir: bool,
    pub is_file: bool,
    pub len: u64,
    pub modified: Option<std::time::SystemTime>,
}

#[async_trait]
pub trait ReadDirStream {
    async fn next_entry(&mut self) -> CoreResult<Option<PathBuf>>;
}

pub struct RealFs;

impl RealFs {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RealFs {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileSystem for RealFs {
    async fn path_exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn read_dir(&self, path: &Path) -> CoreResult<Box<dyn ReadDirStream + Send>> {
        let rd = tokio::fs::read_dir(path).await?;
        Ok(Box::new(RealReadDir { inner: rd }))
    }

    async fn metadata(&self, path: &Path) -> CoreResult<FsMetadata> {
        let md = tokio::fs::metadata(path).await?;
        Ok(FsMetadata {
            is_dir: md.is_dir(),
            is_file: md.is_file(),
            len: md.len(),
            modified: md.modified().ok(),
        })
    }

    async fn canonicalize(&self, path: &Path) -> CoreResult<PathBuf> {
        Ok(tokio::fs::canonicalize(path).await?)
    }

    async fn read_bytes(&self, path: &Path, offset: u64, len: usize) -> CoreResult<Vec<u8>> {
        use tokio::io::{AsyncReadExt, AsyncSeekExt};
        let mut file = tokio::fs::File::open(path).await?;
        file.seek(std::io::SeekFrom::Start(offset)).await?;
        let mut buf = vec![0u8; len];
        let read = file.read(&mut buf).await?;
        buf.truncate(read);
        Ok(buf)
    }
}

struct RealReadDir {
    inner: tokio::fs::ReadDir,
}

#[async_trait]
impl ReadDirStream for RealReadDir {
    async fn next_entry(&mut self) -> CoreResult<Option<PathBuf>> {
        Ok(self.inner.next_entry().await?.map(|entry| entry.path()))
    }
}

/// In-memory filesystem fixture for scanner tests. Files carry their actual
/// byte content so tests can exercise the content-hash and relink/create
/// classification paths, including a scene moved on disk and rescanned.
#[derive(Default, Clone)]
pub struct InMemoryFs {
    nodes: HashMap<PathBuf, Node>,
}

#[derive(Clone)]
enum Node {
    Dir { children: Vec<PathBuf> },
    File { data: Vec<u8> },
}

impl InMemoryFs {
    pub fn new() -> Self {
        Self { nodes: HashMap::new() }
    }

    pub fn add_dir<P: Into<PathBuf>>(&mut self, path: P) {
        let path = path.into();
        if self.nodes.contains_key(&path) {
            return;
        }
        self.ensure_parent_link(&path);
        self.nodes.insert(path, Node::Dir { children: Vec::new() });
    }

    pub fn add_file<P: Into<PathBuf>>(&mut self, path: P, data: Vec<u8>) {
        let path = path.into();
        self.ensure_parent_link(&path);
        self.nodes.insert(path, Node::File { data });
    }

    /// Moves a file's content to a new path without touching the old entry
    /// caller-side bookkeeping — used by rescan tests that simulate a file
    /// moving on disk between scans.
    pub fn move_file<P: Into<PathBuf>>(&mut self, from: &Path, to: P) {
        if let Some(Node::File { data }) = self.nodes.remove(from) {
            self.add_file(to, data);
        }
    }

    fn ensure_parent_link(&mut self, path: &Path) {
        if let Some(parent) = path.parent() {
            if !self.nodes.contains_key(parent) {
                self.nodes.insert(parent.to_path_buf(), Node::Dir { children: Vec::new() });
                self.ensure_parent_link(parent);
            }
            if let Some(Node::Dir { children }) = self.nodes.get_mut(parent) {
                if !children.iter().any(|p| p.as_path() == path) {
                    children.push(path.to_path_buf());
                }
            }
        }
    }
}

#[async_trait]
impl FileSystem for InMemoryFs {
    async fn path_exists(&self, path: &Path) -> bool {
        self.nodes.contains_key(path)
    }

    async fn read_dir(&self, path: &Path) -> CoreResult<Box<dyn ReadDirStream + Send>> {
        match self.nodes.get(path) {
            Some(Node::Dir { children }) => Ok(Box::new(InMemReadDir { queue: children.clone().into() })),
            Some(Node::File { .. }) => Err(CoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("read_dir on file: {path:?}"),
            ))),
            None => Err(CoreError::NotFound(format!("{path:?}"))),
        }
    }

    async fn metadata(&self, path: &Path) -> CoreResult<FsMetadata> {
        match self.nodes.get(path) {
            Some(Node::Dir { .. }) => Ok(FsMetadata { is_dir: true, is_file: false, len: 0, modified: None }),
            Some(Node::File { data }) => Ok(FsMetadata {
                is_dir: false,
                is_file: true,
                len: data.len() as u64,
                modified: Some(std::time::SystemTime::UNIX_EPOCH),
            }),
            None => Err(CoreError::NotFound(format!("{path:?}"))),
        }
    }

    async fn canonicalize(&self, path: &Path) -> CoreResult<PathBuf> {
        Ok(path.to_path_buf())
    }

    async fn read_bytes(&self, path: &Path, offset: u64, len: usize) -> CoreResult<Vec<u8>> {
        match self.nodes.get(path) {
            Some(Node::File { data }) => {
                let start = (offset as usize).min(data.len());
                let end = (start + len).min(data.len());
                Ok(data[start..end].to_vec())
            }
            _ => Err(CoreError::NotFound(format!("{path:?}"))),
        }
    }
}

struct InMemReadDir {
    queue: VecDeque<PathBuf>,
}

#[async_trait]
impl ReadDirStream for InMemReadDir {
    async fn next_entry(&mut self) -> CoreResult<Option<PathBuf>> {
        Ok(self.queue.pop_front())
    }
}
