use std::{
    ffi::OsString,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};

use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::{self, File},
    io::{AsyncReadExt, AsyncWriteExt},
};
use tracing::{debug, warn};

/// Path of the sibling file used while replacing `path`.
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|v| v.to_os_string())
        .unwrap_or_else(|| OsString::from("sessionclock"));
    name.push(".tmp");
    path.with_file_name(name)
}

/// Replaces the content of `path` so that a crash at any point leaves either the previous or the
/// new content on disk, never a mix of both.
///
/// 1. Write everything into a sibling temp file and sync it.
/// 2. Rename the temp file over the target.
pub async fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), io::Error> {
    let temp_path = temp_path_for(path);
    debug!("Writing {path:?} through {temp_path:?}");

    let mut file = File::options()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .await?;

    file.lock_exclusive()?;
    let written = async {
        file.write_all(contents).await?;
        file.flush().await?;
        file.sync_all().await
    }
    .await;
    file.unlock_async().await?;
    drop(file);

    if let Err(e) = written {
        if let Err(cleanup) = fs::remove_file(&temp_path).await {
            warn!("Couldn't remove {temp_path:?} after failed write: {cleanup}");
        }
        return Err(e);
    }

    fs::rename(&temp_path, path).await
}

/// Reads the whole file under a shared lock. A missing file is not an error.
pub async fn read_locked(path: &Path) -> Result<Option<String>, io::Error> {
    async fn extract(path: &Path) -> Result<String, io::Error> {
        let mut file = File::open(path).await?;
        file.lock_shared()?;
        let mut content = String::new();
        let read = file.read_to_string(&mut content).await;
        file.unlock_async().await?;
        read.map(|_| content)
    }

    match extract(path).await {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
