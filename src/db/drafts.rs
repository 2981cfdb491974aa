// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Draft storage, one namespace per draft kind.

use crate::db::keys;
use crate::db::LocalStore;
use crate::error::AppError;
use crate::models::{Draft, DraftKind};
use std::marker::PhantomData;

/// Typed view of the drafts of one kind.
///
/// Each draft lives at `draft:<kind>:<id>`. The ids are also kept,
/// most recent first, in the index at `drafts:<kind>` so pending drafts
/// can be listed without scanning the store.
pub struct DraftStore<D> {
    store: LocalStore,
    _kind: PhantomData<fn() -> D>,
}

impl<D> Clone for DraftStore<D> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _kind: PhantomData,
        }
    }
}

impl<D: Draft> DraftStore<D> {
    pub fn new(store: LocalStore) -> Self {
        Self {
            store,
            _kind: PhantomData,
        }
    }

    /// Overwrite the draft and make sure it is in the index.
    pub async fn save(&self, draft: &D) -> Result<(), AppError> {
        let writer = self.store.writer().await;
        writer.set_json(&entry_key(D::KIND, draft.id()), draft).await?;

        let mut ids: Vec<String> = writer.get_json(&index_key(D::KIND)).await?.unwrap_or_default();
        if !ids.iter().any(|id| id == draft.id()) {
            ids.insert(0, draft.id().to_string());
            writer.set_json(&index_key(D::KIND), &ids).await?;
        }
        Ok(())
    }

    /// Missing and unparsable drafts both read as `None`.
    pub async fn load(&self, id: &str) -> Result<Option<D>, AppError> {
        self.store.get_json(&entry_key(D::KIND, id)).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        let writer = self.store.writer().await;
        writer.remove(&entry_key(D::KIND, id)).await?;

        let mut ids: Vec<String> = writer.get_json(&index_key(D::KIND)).await?.unwrap_or_default();
        let before = ids.len();
        ids.retain(|existing| existing != id);
        if ids.len() != before {
            writer.set_json(&index_key(D::KIND), &ids).await?;
        }
        drop(writer);

        tracing::debug!(kind = D::KIND.as_str(), draft_id = id, "Deleted draft");
        Ok(())
    }

    /// Draft ids, most recent first. A corrupt index reads as empty.
    pub async fn list_ids(&self) -> Result<Vec<String>, AppError> {
        Ok(self
            .store
            .get_json(&index_key(D::KIND))
            .await?
            .unwrap_or_default())
    }

    /// Every draft in the index that still loads.
    pub async fn list(&self) -> Result<Vec<D>, AppError> {
        let mut drafts = Vec::new();
        for id in self.list_ids().await? {
            match self.load(&id).await? {
                Some(draft) => drafts.push(draft),
                None => tracing::warn!(kind = D::KIND.as_str(), draft_id = %id, "Indexed draft missing"),
            }
        }
        Ok(drafts)
    }
}

fn entry_key(kind: DraftKind, id: &str) -> String {
    format!("{}:{}:{}", keys::DRAFT_PREFIX, kind.as_str(), id)
}

fn index_key(kind: DraftKind) -> String {
    format!("{}:{}", keys::DRAFT_INDEX_PREFIX, kind.as_str())
}
