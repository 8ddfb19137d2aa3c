//! Infrastructure implementation of the `ServerStore` port.
//!
//! `JsonServerStore` keeps owners and servers in one JSON document. Reads
//! and writes run on `tokio::task::spawn_blocking`; each write is an atomic
//! read-modify-write (temp file + rename) serialized through a mutex.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use gantry_common::{LogEntry, Owner, OwnerId, Server, ServerId, SetupStage};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::application::ports::ServerStore;
use crate::domain::StoreError;

/// On-disk layout of the store file.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StoreDocument {
    #[serde(default)]
    pub owners: Vec<Owner>,
    #[serde(default)]
    pub servers: Vec<Server>,
}

impl StoreDocument {
    fn server_mut(&mut self, id: ServerId) -> Result<&mut Server, StoreError> {
        self.servers
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(StoreError::ServerNotFound(id))
    }
}

/// Store file manager — implements `ServerStore` for the infra layer.
pub struct JsonServerStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonServerStore {
    /// Create a store using the default path (`~/.gantry/store.json`).
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self> {
        let home =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
        Ok(Self::with_path(home.join(".gantry").join("store.json")))
    }

    /// Create a store with an explicit path.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole document; a missing file is an empty store.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load_document(&self) -> Result<StoreDocument> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || load_sync(&path))
            .await
            .context("store load task panicked")?
    }

    /// Apply `change` to one server record and write the document back.
    async fn update_server<F>(&self, id: ServerId, change: F) -> Result<()>
    where
        F: FnOnce(&mut Server) + Send + 'static,
    {
        let _guard = self.write_lock.lock().await;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let mut doc = load_sync(&path)?;
            change(doc.server_mut(id)?);
            save_sync(&path, &doc)
        })
        .await
        .context("store save task panicked")?
    }
}

fn load_sync(path: &Path) -> Result<StoreDocument> {
    if !path.exists() {
        return Ok(StoreDocument::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading store file {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing store file {}", path.display()))
}

fn save_sync(path: &Path, doc: &StoreDocument) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    let content = serde_json::to_string_pretty(doc).context("serializing store")?;

    let temp_path = path.with_extension("json.tmp");
    std::fs::write(&temp_path, &content)
        .with_context(|| format!("writing temp file {}", temp_path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("setting permissions on {}", temp_path.display()))?;
    }

    std::fs::rename(&temp_path, path)
        .with_context(|| format!("finalizing store file {}", path.display()))?;
    Ok(())
}

impl ServerStore for JsonServerStore {
    async fn load_owner(&self, id: OwnerId) -> Result<Option<Owner>> {
        let doc = self.load_document().await?;
        Ok(doc.owners.into_iter().find(|o| o.id == id))
    }

    async fn load_server(&self, id: ServerId) -> Result<Option<Server>> {
        let doc = self.load_document().await?;
        Ok(doc.servers.into_iter().find(|s| s.id == id))
    }

    async fn set_setup_stage(&self, id: ServerId, stage: SetupStage) -> Result<()> {
        self.update_server(id, move |s| s.remote_setup_stage = stage)
            .await
    }

    async fn complete_setup(&self, id: ServerId) -> Result<()> {
        self.update_server(id, |s| {
            s.remote_setup_stage = SetupStage::Complete;
            s.done_setup = true;
        })
        .await
    }

    async fn clear_pending_keys(&self, id: ServerId) -> Result<()> {
        self.update_server(id, |s| s.ssh_keys_pending = None).await
    }

    async fn set_flavour(&self, id: ServerId, flavour: &str) -> Result<()> {
        let flavour = flavour.to_string();
        self.update_server(id, move |s| s.application.flavour = flavour)
            .await
    }

    async fn append_log(&self, id: ServerId, message: &str) -> Result<()> {
        let entry = LogEntry {
            at: Utc::now(),
            message: message.to_string(),
        };
        self.update_server(id, move |s| s.application.log.push(entry))
            .await
    }

    async fn reset_partial(&self, id: ServerId) -> Result<()> {
        self.update_server(id, |s| s.pending_operation = None).await
    }
}
