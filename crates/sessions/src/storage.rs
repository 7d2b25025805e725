//! Per-session auth directories.
//!
//! The messaging client owns the contents; this module only creates, lists
//! and removes the directories.

use std::{io, path::PathBuf};

use {tokio::fs, tracing::debug};

use crate::key::{SessionId, normalize};

#[derive(Debug, Clone)]
pub struct SessionStorage {
    root: PathBuf,
}

impl SessionStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    /// Directory for `id`. Ids are already path-safe.
    pub fn path_for(&self, id: &SessionId) -> PathBuf {
        self.root.join(id.as_str())
    }

    pub async fn ensure(&self, id: &SessionId) -> io::Result<PathBuf> {
        let path = self.path_for(id);
        fs::create_dir_all(&path).await?;
        Ok(path)
    }

    /// Remove the directory for `id`. Returns whether anything was removed.
    pub async fn remove(&self, id: &SessionId) -> io::Result<bool> {
        let path = self.path_for(id);
        match fs::remove_dir_all(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "removed session storage");
                Ok(true)
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Ids of every stored session, sorted. Entries whose names are not valid
    /// normalized ids are skipped.
    pub async fn list(&self) -> io::Result<Vec<SessionId>> {
        let mut ids = Vec::new();
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(e),
        };

        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if !name.is_empty() && normalize(&name) == name {
                ids.push(SessionId::from_requested(&name));
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ensure_list_remove() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = SessionStorage::new(tmp.path().join("sessions"));
        assert!(storage.list().await.unwrap().is_empty());

        let bob = SessionId::from_requested("bob@example.com");
        let path = storage.ensure(&bob).await.unwrap();
        assert!(path.is_dir());
        assert_eq!(path, tmp.path().join("sessions/bob_at_example_dot_com"));

        std::fs::create_dir_all(tmp.path().join("sessions/not valid!")).unwrap();
        std::fs::write(tmp.path().join("sessions/stray.txt"), b"x").unwrap();
        assert_eq!(storage.list().await.unwrap(), vec![bob.clone()]);

        assert!(storage.remove(&bob).await.unwrap());
        assert!(!path.exists());
        assert!(!storage.remove(&bob).await.unwrap());
    }
}
