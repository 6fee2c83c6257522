use std::{
    marker::PhantomData,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;
use tracing::info;

use crate::{
    gate::normalize_email,
    types::{Inquiry, Lead, NewInquiry},
};

/// A JSON array persisted in a single file.
///
/// Writers are serialized through a mutex and replace the file atomically,
/// so readers never see a half-written array.
pub struct JsonStore<T> {
    path: PathBuf,
    write_lock: Mutex<()>,
    _item: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> JsonStore<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
            _item: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All items in file order. A missing or empty file is an empty list.
    pub async fn load(&self) -> Result<Vec<T>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.path.display()))
            }
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", self.path.display()))
    }

    async fn write_all(&self, items: &[T]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let body = serde_json::to_vec_pretty(items)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }

    /// Read-modify-write under the store's lock.
    pub async fn update<R>(&self, f: impl FnOnce(&mut Vec<T>) -> R) -> Result<R> {
        let _guard = self.write_lock.lock().await;
        let mut items = self.load().await?;
        let out = f(&mut items);
        self.write_all(&items).await?;
        Ok(out)
    }

    pub async fn append(&self, item: T) -> Result<()> {
        self.update(|items| items.push(item)).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    Created,
    Duplicate,
}

pub struct LeadStore {
    inner: JsonStore<Lead>,
}

impl LeadStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: JsonStore::new(path),
        }
    }

    /// Store a lead unless one with the same email (case-insensitive) exists.
    pub async fn capture(
        &self,
        email: &str,
        name: Option<String>,
        source: &str,
    ) -> Result<CaptureOutcome> {
        let email = normalize_email(email);
        let source = source.to_string();
        let outcome = self
            .inner
            .update(|leads| {
                if leads.iter().any(|l| normalize_email(&l.email) == email) {
                    return CaptureOutcome::Duplicate;
                }
                leads.push(Lead {
                    email: email.clone(),
                    name: name.filter(|n| !n.trim().is_empty()),
                    source,
                    created_at: Utc::now(),
                });
                CaptureOutcome::Created
            })
            .await?;
        if outcome == CaptureOutcome::Created {
            info!(email = %email, "lead captured");
        }
        Ok(outcome)
    }

    /// Newest first.
    pub async fn list(&self) -> Result<Vec<Lead>> {
        let mut leads = self.inner.load().await?;
        leads.reverse();
        Ok(leads)
    }

    pub async fn count(&self) -> Result<usize> {
        Ok(self.inner.load().await?.len())
    }
}

pub struct InquiryStore {
    inner: JsonStore<Inquiry>,
}

impl InquiryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: JsonStore::new(path),
        }
    }

    pub async fn submit(&self, new: NewInquiry) -> Result<Inquiry> {
        let now = Utc::now();
        let inquiry = self
            .inner
            .update(|items| {
                let millis = now.timestamp_millis();
                let mut id = format!("inq_{millis}");
                let mut n = 1;
                while items.iter().any(|i| i.id == id) {
                    n += 1;
                    id = format!("inq_{millis}_{n}");
                }
                let inquiry = Inquiry {
                    id,
                    name: new.name.trim().to_string(),
                    email: normalize_email(&new.email),
                    phone: new.phone.filter(|p| !p.trim().is_empty()),
                    artist_name: new.artist_name.filter(|a| !a.trim().is_empty()),
                    inquiry_type: new
                        .inquiry_type
                        .filter(|t| !t.trim().is_empty())
                        .unwrap_or_else(|| "general".into()),
                    message: new.message.trim().to_string(),
                    created_at: now,
                };
                items.push(inquiry.clone());
                inquiry
            })
            .await?;
        info!(id = %inquiry.id, kind = %inquiry.inquiry_type, "inquiry stored");
        Ok(inquiry)
    }

    /// Newest first.
    pub async fn list(&self) -> Result<Vec<Inquiry>> {
        let mut items = self.inner.load().await?;
        items.reverse();
        Ok(items)
    }

    pub async fn count(&self) -> Result<usize> {
        Ok(self.inner.load().await?.len())
    }
}
