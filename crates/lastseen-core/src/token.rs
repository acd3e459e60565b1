//! Access token persistence
//!
//! The server hands out an opaque JSON document on every successful login
//! or ping. It is stored verbatim as the only content of the token file and
//! replaced wholesale on the next rotation.
//!
//! # Crash safety
//!
//! Writes go to a temporary file in the same directory, are flushed to
//! disk and then renamed over the destination. A crash at any point
//! leaves either the previous token or the new one, never a torn file.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TokenStoreError;

/// Login credentials, held only for the duration of one login exchange
#[derive(Clone, Serialize)]
pub struct Credential {
    pub email: String,
    pub password: String,
}

impl Credential {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Server-issued access token plus whatever refresh metadata came with it
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    /// Remaining fields of the server document, kept as-is
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Token {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            extra: Map::new(),
        }
    }

    /// Parse a server response body or token file
    ///
    /// The document must be a single JSON object with an `access_token`
    /// string.
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }

    pub fn to_json(&self) -> String {
        // Map<String, Value> with a String field cannot fail to serialize
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shown: String = self.access_token.chars().take(6).collect();
        f.debug_struct("Token")
            .field("access_token", &format_args!("{}…", shown))
            .field("extra_keys", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Owner of the on-disk token file
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read and parse the stored token
    ///
    /// `Missing` and `Corrupt` are distinct so the caller can decide to
    /// rerun the credential flow; everything else is `Io`.
    pub fn load(&self) -> Result<Token, TokenStoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(TokenStoreError::Missing(self.path.clone()))
            }
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                return Err(self.corrupt("file is not valid UTF-8"))
            }
            Err(source) => {
                return Err(TokenStoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        Token::from_json(&content).map_err(|e| self.corrupt(e.to_string()))
    }

    /// Replace the stored token atomically
    pub fn save(&self, token: &Token) -> Result<(), TokenStoreError> {
        self.stage(token)?.commit()?;
        tracing::debug!("Saved token to {:?}", self.path);
        Ok(())
    }

    /// Write `token` to a temporary sibling without touching the live file
    ///
    /// Dropping the returned value without calling
    /// [`StagedToken::commit`] discards the write.
    pub fn stage(&self, token: &Token) -> Result<StagedToken<'_>, TokenStoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|source| self.io(source))?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "token".to_string());
        let temp_path = dir.join(format!(".{}.tmp.{}", file_name, std::process::id()));

        let staged = StagedToken {
            store: self,
            temp_path,
            committed: false,
        };

        let mut file = open_private(&staged.temp_path).map_err(|source| self.io(source))?;
        file.write_all(token.to_json().as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|source| self.io(source))?;

        Ok(staged)
    }

    fn corrupt(&self, reason: impl Into<String>) -> TokenStoreError {
        TokenStoreError::Corrupt {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    fn io(&self, source: io::Error) -> TokenStoreError {
        TokenStoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// A fully written token waiting to be renamed into place
#[must_use = "a staged token is discarded unless committed"]
pub struct StagedToken<'a> {
    store: &'a TokenStore,
    temp_path: PathBuf,
    committed: bool,
}

impl StagedToken<'_> {
    /// Atomically replace the live token file with the staged one
    pub fn commit(mut self) -> Result<(), TokenStoreError> {
        fs::rename(&self.temp_path, &self.store.path).map_err(|source| self.store.io(source))?;
        self.committed = true;

        // Persist the rename itself; not all filesystems support this
        #[cfg(unix)]
        if let Some(parent) = self.store.path.parent() {
            if let Ok(dir) = fs::File::open(parent) {
                let _ = dir.sync_all();
            }
        }
        Ok(())
    }
}

impl Drop for StagedToken<'_> {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.temp_path);
        }
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;

    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> io::Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}
