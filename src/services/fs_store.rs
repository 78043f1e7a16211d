//! src/services/fs_store.rs
//!
//! FsStore: the object-store contract emulated on a local directory tree.
//! Buckets live at `root/{bucket}/`, objects are regular files at
//! `root/{bucket}/{key}` and every key prefix ending in `/` is a directory.
//! Content types and ACLs are accepted and ignored; everything is written
//! owner-only. As (un)safe for concurrent use as the underlying filesystem.

use super::{
    path_mapper::{self, DELIMITER},
    store::{Bucket, ObjectReader, ObjectStore},
};
use crate::{
    errors::{StoreError, StoreResult},
    models::{
        acl::{Acl, PutOptions},
        listing::{ListParams, ListResult},
        object::ObjectEntry,
    },
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::{
    fs::Metadata,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, DirBuilder, File, OpenOptions},
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
};
use tracing::{debug, instrument};

#[cfg(unix)]
const DIR_MODE: u32 = 0o700;
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

/// A directory used as an object store.
#[derive(Clone, Debug)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Wrap `root`. Nothing is created until the first bucket or object is.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Concrete handle for `name`; a trailing `/` is ignored.
    pub fn fs_bucket(&self, name: &str) -> FsBucket {
        let name = name.trim_end_matches(DELIMITER).to_string();
        FsBucket {
            root: self.root.join(&name),
            name,
        }
    }
}

impl ObjectStore for FsStore {
    fn bucket(&self, name: &str) -> Box<dyn Bucket> {
        Box::new(self.fs_bucket(name))
    }
}

/// One bucket of an [`FsStore`]. Carries nothing but its name and root.
#[derive(Clone, Debug)]
pub struct FsBucket {
    name: String,
    root: PathBuf,
}

/// An upload written to a sibling temp file, waiting to be renamed over its
/// destination.
struct Staged {
    tmp: PathBuf,
    dest: PathBuf,
}

impl Staged {
    async fn commit(self, mut file: File) -> StoreResult<()> {
        let written = async {
            file.flush().await?;
            file.sync_all().await
        }
        .await;
        drop(file);
        if let Err(err) = written {
            self.abandon().await;
            return Err(StoreError::Io(err));
        }

        let renamed = match fs::rename(&self.tmp, &self.dest).await {
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                match fs::remove_file(&self.dest).await {
                    Ok(()) => fs::rename(&self.tmp, &self.dest).await,
                    Err(err) => Err(err),
                }
            }
            other => other,
        };
        if let Err(err) = renamed {
            self.abandon().await;
            return Err(StoreError::Io(err));
        }
        Ok(())
    }

    async fn abandon(self) {
        let _ = fs::remove_file(&self.tmp).await;
    }
}

impl FsBucket {
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Bucket names map to exactly one directory directly below the store
    /// root.
    fn ensure_name_safe(&self) -> StoreResult<()> {
        let name = self.name.as_str();
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(DELIMITER)
            || name.contains('\0')
            || path_mapper::is_staging_name(name)
        {
            return Err(StoreError::InvalidBucketName(name.to_string()));
        }
        Ok(())
    }

    /// Rejects keys that could escape the bucket root or alias another key.
    ///
    /// A single trailing `/` is allowed so that virtual directories can be
    /// named (they are never objects).
    fn ensure_key_safe(&self, key: &str) -> StoreResult<()> {
        self.ensure_name_safe()?;
        let invalid = || StoreError::InvalidKey(key.to_string());
        if key.is_empty() || key.starts_with(DELIMITER) || key.contains('\0') {
            return Err(invalid());
        }
        let body = key.strip_suffix(DELIMITER).unwrap_or(key);
        for segment in body.split(DELIMITER) {
            if segment.is_empty()
                || segment == "."
                || segment == ".."
                || path_mapper::is_staging_name(segment)
            {
                return Err(invalid());
            }
        }
        Ok(())
    }

    /// Keys that name an object. A trailing `/` names a virtual directory,
    /// which can never be written or deleted.
    fn ensure_object_key(&self, key: &str) -> StoreResult<()> {
        self.ensure_key_safe(key)?;
        if key.ends_with(DELIMITER) {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(())
    }

    fn path(&self, key: &str) -> PathBuf {
        path_mapper::object_path(&self.root, key)
    }

    /// Errors touching an object path. A directory, or a path running
    /// through a regular file, is not an object.
    fn object_error(&self, err: io::Error, key: &str) -> StoreError {
        match err.kind() {
            ErrorKind::IsADirectory | ErrorKind::NotADirectory => {
                StoreError::NotFound(key.to_string())
            }
            _ => StoreError::from_io(err, key),
        }
    }

    async fn object_metadata(&self, key: &str) -> StoreResult<Metadata> {
        let meta = fs::metadata(self.path(key))
            .await
            .map_err(|err| self.object_error(err, key))?;
        if !meta.is_file() {
            return Err(StoreError::NotFound(key.to_string()));
        }
        Ok(meta)
    }

    /// Create `key`'s missing ancestors and open a fresh temp file beside
    /// its destination.
    async fn stage(&self, key: &str) -> StoreResult<(File, Staged)> {
        let dest = self.path(key);
        let parent = dest.parent().map(Path::to_path_buf).ok_or_else(|| {
            StoreError::Io(io::Error::other("object path missing parent directory"))
        })?;
        dir_builder(true).create(&parent).await?;

        let tmp = parent.join(path_mapper::staging_name());
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(FILE_MODE);
        let file = options.open(&tmp).await?;

        Ok((file, Staged { tmp, dest }))
    }

    /// Create the bucket directory. The store root is created on demand.
    #[instrument(level = "debug", skip(self), fields(bucket = %self.name))]
    pub async fn create(&self) -> StoreResult<()> {
        self.ensure_name_safe()?;
        if let Some(store_root) = self.root.parent() {
            dir_builder(true).create(store_root).await?;
        }
        dir_builder(false)
            .create(&self.root)
            .await
            .map_err(|err| StoreError::from_io(err, &self.name))?;
        debug!("created bucket directory {}", self.root.display());
        Ok(())
    }

    /// Remove the (empty) bucket directory.
    #[instrument(level = "debug", skip(self), fields(bucket = %self.name))]
    pub async fn remove(&self) -> StoreResult<()> {
        self.ensure_name_safe()?;
        fs::remove_dir(&self.root)
            .await
            .map_err(|err| StoreError::from_io(err, &self.name))?;
        debug!("removed bucket directory {}", self.root.display());
        Ok(())
    }

    pub async fn read(&self, key: &str) -> StoreResult<Bytes> {
        self.ensure_key_safe(key)?;
        let data = fs::read(self.path(key))
            .await
            .map_err(|err| self.object_error(err, key))?;
        Ok(Bytes::from(data))
    }

    /// Open an object for streaming reads.
    pub async fn open(&self, key: &str) -> StoreResult<File> {
        self.ensure_key_safe(key)?;
        let file = File::open(self.path(key))
            .await
            .map_err(|err| self.object_error(err, key))?;
        if !file.metadata().await?.is_file() {
            return Err(StoreError::NotFound(key.to_string()));
        }
        Ok(file)
    }

    /// Write `data` under `key`, creating virtual directories as needed.
    ///
    /// The payload goes to a temp file first and is renamed into place, so
    /// a failed write never leaves a partial object behind.
    #[instrument(
        level = "debug",
        skip(self, data),
        fields(bucket = %self.name, size = data.len())
    )]
    pub async fn write(&self, key: &str, data: &[u8]) -> StoreResult<()> {
        self.ensure_object_key(key)?;
        let (mut file, staged) = self.stage(key).await?;
        if let Err(err) = file.write_all(data).await {
            drop(file);
            staged.abandon().await;
            return Err(StoreError::Io(err));
        }
        staged.commit(file).await?;
        debug!("stored object {key}");
        Ok(())
    }

    /// Copy exactly `length` bytes from `reader` into `key`.
    ///
    /// Fails with an `UnexpectedEof` I/O error if the reader runs dry first.
    #[instrument(level = "debug", skip(self, reader), fields(bucket = %self.name))]
    pub async fn write_from<R>(&self, key: &str, reader: &mut R, length: u64) -> StoreResult<()>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        self.ensure_object_key(key)?;
        let (mut file, staged) = self.stage(key).await?;

        let mut limited = reader.take(length);
        let copied = match tokio::io::copy(&mut limited, &mut file).await {
            Ok(copied) => copied,
            Err(err) => {
                drop(file);
                staged.abandon().await;
                return Err(StoreError::Io(err));
            }
        };
        if copied < length {
            drop(file);
            staged.abandon().await;
            return Err(StoreError::Io(io::Error::new(
                ErrorKind::UnexpectedEof,
                format!("stream for `{key}` ended after {copied} of {length} bytes"),
            )));
        }

        staged.commit(file).await?;
        debug!("stored {length} streamed bytes as {key}");
        Ok(())
    }

    /// Remove an object, then every virtual directory it leaves empty.
    #[instrument(level = "debug", skip(self), fields(bucket = %self.name))]
    pub async fn delete(&self, key: &str) -> StoreResult<()> {
        self.ensure_object_key(key)?;
        self.object_metadata(key).await?;
        fs::remove_file(self.path(key))
            .await
            .map_err(|err| self.object_error(err, key))?;
        debug!("removed object {key}");
        self.purge_empty_ancestors(key).await
    }

    /// Walk up from `key`'s parent removing empty directories.
    ///
    /// Stops at the first directory that still holds entries (or that a
    /// concurrent delete already removed) and never touches the bucket root.
    async fn purge_empty_ancestors(&self, key: &str) -> StoreResult<()> {
        let mut current = path_mapper::parent_of(key);
        while let Some(dir) = current {
            match fs::remove_dir(self.path(dir)).await {
                Ok(()) => {
                    debug!("pruned empty virtual directory {dir}/");
                    current = path_mapper::parent_of(dir);
                }
                Err(err) => return purge_stop(err),
            }
        }
        Ok(())
    }

    /// List `params.prefix` following the filesystem layout.
    ///
    /// Supports:
    /// - delimiter `/`: one level, files as contents, directories as
    ///   common prefixes
    /// - empty delimiter: every object below the prefix, at any depth
    /// - `max_keys` (0 = unlimited) over the combined, key-ordered entries
    ///
    /// Start markers and prefixes that do not end in `/` cannot be
    /// answered from a directory read and are rejected before any I/O.
    pub async fn list_dir(&self, params: &ListParams) -> StoreResult<ListResult> {
        check_list_shape(params)?;
        if !params.prefix.is_empty() {
            self.ensure_key_safe(&params.prefix)?;
        } else {
            self.ensure_name_safe()?;
        }

        match fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(StoreError::NotFound(self.name.clone())),
            Err(err) => return Err(StoreError::from_io(err, &self.name)),
        }

        let (mut contents, mut common_prefixes) = if params.delimiter.is_empty() {
            (self.walk(&params.prefix).await?, Vec::new())
        } else {
            match self.read_level(&params.prefix).await? {
                Some(level) => level,
                None => return Ok(ListResult::empty(params.clone())),
            }
        };

        contents.sort_by(|a, b| a.key.cmp(&b.key));
        common_prefixes.sort();
        let is_truncated = apply_max_keys(&mut contents, &mut common_prefixes, params.max_keys);

        Ok(ListResult {
            params: params.clone(),
            is_truncated,
            contents,
            common_prefixes,
        })
    }

    /// Read the directory behind `prefix`. `None` when the prefix was never
    /// materialised (or names a regular file).
    async fn read_level(
        &self,
        prefix: &str,
    ) -> StoreResult<Option<(Vec<ObjectEntry>, Vec<String>)>> {
        let mut entries = match fs::read_dir(self.path(prefix)).await {
            Ok(entries) => entries,
            Err(err) if matches!(err.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                return Ok(None);
            }
            Err(err) => return Err(StoreError::Io(err)),
        };

        let mut contents = Vec::new();
        let mut common_prefixes = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Some(name) = listable_name(&entry) else {
                continue;
            };
            let Some(meta) = entry_metadata(&entry.path()).await? else {
                continue;
            };
            if meta.is_dir() {
                common_prefixes.push(path_mapper::common_prefix(prefix, &name));
            } else if meta.is_file() {
                contents.push(object_entry(path_mapper::entry_key(prefix, &name), &meta)?);
            }
        }
        Ok(Some((contents, common_prefixes)))
    }

    /// Every object below `prefix`, depth-first.
    async fn walk(&self, prefix: &str) -> StoreResult<Vec<ObjectEntry>> {
        let mut contents = Vec::new();
        let mut stack = vec![prefix.to_string()];
        while let Some(dir_prefix) = stack.pop() {
            let mut entries = match fs::read_dir(self.path(&dir_prefix)).await {
                Ok(entries) => entries,
                Err(err)
                    if matches!(err.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) =>
                {
                    continue;
                }
                Err(err) => return Err(StoreError::Io(err)),
            };

            while let Some(entry) = entries.next_entry().await? {
                let Some(name) = listable_name(&entry) else {
                    continue;
                };
                let Some(meta) = entry_metadata(&entry.path()).await? else {
                    continue;
                };
                if meta.is_dir() {
                    stack.push(path_mapper::common_prefix(&dir_prefix, &name));
                } else if meta.is_file() {
                    let key = path_mapper::entry_key(&dir_prefix, &name);
                    contents.push(object_entry(key, &meta)?);
                }
            }
        }
        Ok(contents)
    }
}

#[async_trait]
impl Bucket for FsBucket {
    fn name(&self) -> &str {
        &self.name
    }

    // Permissions are ignored.
    async fn put_bucket(&self, _acl: Acl) -> StoreResult<()> {
        self.create().await
    }

    async fn del_bucket(&self) -> StoreResult<()> {
        self.remove().await
    }

    async fn get(&self, key: &str) -> StoreResult<Bytes> {
        self.read(key).await
    }

    async fn get_stream(&self, key: &str) -> StoreResult<ObjectReader> {
        Ok(Box::new(self.open(key).await?))
    }

    // Content type and permissions are ignored.
    async fn put(&self, key: &str, data: Bytes, _opts: PutOptions) -> StoreResult<()> {
        self.write(key, &data).await
    }

    async fn put_stream(
        &self,
        key: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        length: u64,
        _opts: PutOptions,
    ) -> StoreResult<()> {
        self.write_from(key, reader, length).await
    }

    async fn del(&self, key: &str) -> StoreResult<()> {
        self.delete(key).await
    }

    async fn list(&self, params: &ListParams) -> StoreResult<ListResult> {
        self.list_dir(params).await
    }

    fn url(&self, key: &str) -> String {
        self.path(key).display().to_string()
    }
}

/// Outcome of a failed ancestor removal: a directory that still holds
/// entries, or one a concurrent delete already removed, ends the purge
/// quietly. Anything else fails the delete.
fn purge_stop(err: io::Error) -> StoreResult<()> {
    match err.kind() {
        ErrorKind::DirectoryNotEmpty | ErrorKind::NotFound => Ok(()),
        _ => Err(StoreError::Io(err)),
    }
}

fn dir_builder(recursive: bool) -> DirBuilder {
    let mut builder = DirBuilder::new();
    builder.recursive(recursive);
    #[cfg(unix)]
    builder.mode(DIR_MODE);
    builder
}

/// Reject listing shapes a directory read cannot emulate.
fn check_list_shape(params: &ListParams) -> StoreResult<()> {
    if !params.marker.is_empty() {
        return Err(StoreError::Unsupported("listing from a start marker".into()));
    }
    if !params.delimiter.is_empty() && params.delimiter != DELIMITER.to_string() {
        return Err(StoreError::Unsupported(format!(
            "delimiter `{}`, only `{DELIMITER}` is available",
            params.delimiter
        )));
    }
    if !params.prefix.is_empty() && !params.prefix.ends_with(DELIMITER) {
        return Err(StoreError::Unsupported(format!(
            "prefix `{}` does not end in `{DELIMITER}`",
            params.prefix
        )));
    }
    Ok(())
}

/// Names that can be keys: valid UTF-8 and not an in-flight upload.
fn listable_name(entry: &fs::DirEntry) -> Option<String> {
    let name = entry.file_name().into_string().ok()?;
    (!path_mapper::is_staging_name(&name)).then_some(name)
}

/// Metadata following symlinks. `None` if the entry vanished since the
/// directory was read.
async fn entry_metadata(path: &Path) -> StoreResult<Option<Metadata>> {
    match fs::metadata(path).await {
        Ok(meta) => Ok(Some(meta)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(StoreError::Io(err)),
    }
}

fn object_entry(key: String, meta: &Metadata) -> StoreResult<ObjectEntry> {
    Ok(ObjectEntry {
        key,
        size: meta.len(),
        last_modified: DateTime::<Utc>::from(meta.modified()?),
        etag: None,
    })
}

/// Keep the first `max_keys` entries in key order across contents and
/// common prefixes. Returns whether anything was cut.
fn apply_max_keys(
    contents: &mut Vec<ObjectEntry>,
    common_prefixes: &mut Vec<String>,
    max_keys: usize,
) -> bool {
    if max_keys == 0 || contents.len() + common_prefixes.len() <= max_keys {
        return false;
    }

    let (mut kept_contents, mut kept_prefixes) = (0, 0);
    while kept_contents + kept_prefixes < max_keys {
        let next_content = contents.get(kept_contents);
        let next_prefix = common_prefixes.get(kept_prefixes);
        let next_is_content = match (next_content, next_prefix) {
            (Some(entry), Some(prefix)) => entry.key.as_str() < prefix.as_str(),
            (Some(_), None) => true,
            _ => false,
        };
        if next_is_content {
            kept_contents += 1;
        } else {
            kept_prefixes += 1;
        }
    }
    contents.truncate(kept_contents);
    common_prefixes.truncate(kept_prefixes);
    true
}
