// WHY: dictionary lookup is a best-effort personalization step; the store is a
// seam for whatever backs it, the cache keeps exactly one user's pairs alive

use crate::config::DictionaryConfig;
use crate::dictionary::{self, DictPair};
use anyhow::{bail, Context, Result};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Source of per-user custom dictionaries
pub trait DictionaryStore: Send + Sync {
    fn load<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, Result<Vec<DictPair>>>;
}

/// License tier deciding how many custom pairs apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseTier {
    #[default]
    Free,
    Pro,
}

impl LicenseTier {
    pub fn max_pairs(self, config: &DictionaryConfig) -> usize {
        match self {
            Self::Free => config.free_max_pairs,
            Self::Pro => config.pro_max_pairs,
        }
    }
}

/// Who a conversion runs for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    pub id: String,
    pub tier: LicenseTier,
}

/// Reads `<root>/<user_id>.csv` and parses it leniently
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of a user's dictionary; ids that would escape the root are rejected
    pub fn path_for(&self, user_id: &str) -> Result<PathBuf> {
        let mut components = Path::new(user_id).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) if !user_id.contains(['/', '\\']) => {}
            _ => bail!("invalid user id {user_id:?}"),
        }
        Ok(self.root.join(format!("{user_id}.csv")))
    }
}

impl DictionaryStore for DirectoryStore {
    fn load<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, Result<Vec<DictPair>>> {
        Box::pin(async move {
            let path = self.path_for(user_id)?;
            let text = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("failed to read dictionary {}", path.display()))?;
            Ok(dictionary::parse(&text))
        })
    }
}

#[derive(Debug)]
struct CacheSlot {
    user_id: String,
    pairs: Arc<Vec<DictPair>>,
}

/// Single-slot cache in front of a [`DictionaryStore`]
pub struct DictionaryCache {
    store: Box<dyn DictionaryStore>,
    limits: DictionaryConfig,
    slot: Mutex<Option<CacheSlot>>,
}

impl DictionaryCache {
    pub fn new(store: impl DictionaryStore + 'static, limits: DictionaryConfig) -> Self {
        Self {
            store: Box::new(store),
            limits,
            slot: Mutex::new(None),
        }
    }

    /// Pairs for `user`, capped by tier. A different user replaces the slot.
    pub async fn get(&self, user: &UserContext) -> Result<Vec<DictPair>> {
        let cap = user.tier.max_pairs(&self.limits);
        let mut slot = self.slot.lock().await;

        if let Some(cached) = slot.as_ref().filter(|s| s.user_id == user.id) {
            debug!(user = %user.id, "Dictionary cache hit");
            return Ok(cached.pairs.iter().take(cap).cloned().collect());
        }

        // WHY: drop the previous user's pairs before loading, even if the load fails
        *slot = None;
        let pairs = Arc::new(self.store.load(&user.id).await?);
        info!(user = %user.id, pairs = pairs.len(), cap, "Loaded custom dictionary");
        let capped = pairs.iter().take(cap).cloned().collect();
        *slot = Some(CacheSlot {
            user_id: user.id.clone(),
            pairs,
        });
        Ok(capped)
    }

    /// Reset the slot, e.g. on logout
    pub async fn clear(&self) {
        let mut slot = self.slot.lock().await;
        if let Some(previous) = slot.take() {
            debug!(user = %previous.user_id, "Cleared dictionary cache");
        }
    }

    /// User whose pairs are currently cached
    pub async fn cached_user(&self) -> Option<String> {
        self.slot.lock().await.as_ref().map(|s| s.user_id.clone())
    }
}
