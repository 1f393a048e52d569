//! Work Catalog
//!
//! Creation, lookup, listing and deletion of works. New works always enter
//! JAM; only the Promotion Engine moves them further.

use crate::error::{Error, Result};
use crate::events::{notify_best_effort, CurationEvent, Notifier};
use crate::model::{TierKind, Work};
use crate::store::{SharedStore, StoreError};
use rand::Rng;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_DESCRIPTION_CHARS: usize = 5000;
pub const MAX_SLUG_CHARS: usize = 100;

/// Attempts at a fresh random suffix before a derived slug gives up
const SLUG_SUFFIX_ATTEMPTS: usize = 5;
const SLUG_SUFFIX_LEN: usize = 6;
const SLUG_SUFFIX_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Request to create a work
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewWork {
    pub title: String,
    /// Explicit slug; derived from the title when absent
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Work lifecycle outside of promotion
#[derive(Clone)]
pub struct WorkCatalog {
    store: SharedStore,
    notifier: Arc<dyn Notifier>,
}

impl WorkCatalog {
    pub fn new(store: SharedStore, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Create a work in JAM and emit `work.created`
    ///
    /// An explicit slug that is taken fails `DuplicateSlug`. A slug derived
    /// from the title gets a random suffix on collision.
    pub async fn create_work(&self, request: NewWork) -> Result<Work> {
        let title = request.title.trim();
        let title_chars = title.chars().count();
        if title_chars == 0 || title_chars > MAX_TITLE_CHARS {
            return Err(Error::Validation(format!(
                "title must be 1 to {} characters",
                MAX_TITLE_CHARS
            )));
        }

        let description = request
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        if let Some(d) = &description {
            if d.chars().count() > MAX_DESCRIPTION_CHARS {
                return Err(Error::Validation(format!(
                    "description must be at most {} characters",
                    MAX_DESCRIPTION_CHARS
                )));
            }
        }

        let work = match request.slug {
            Some(slug) => {
                let slug = slug.trim().to_string();
                validate_slug(&slug)?;
                let work = Work::new(slug, title.to_string(), description);
                self.insert(&work).await?;
                work
            }
            None => self.insert_with_derived_slug(title, description).await?,
        };

        info!(work_id = %work.id, slug = %work.slug, "Work created");
        notify_best_effort(
            self.notifier.as_ref(),
            CurationEvent::work_created(work.clone()),
        );
        Ok(work)
    }

    async fn insert_with_derived_slug(
        &self,
        title: &str,
        description: Option<String>,
    ) -> Result<Work> {
        let base = slugify(title);
        let mut candidate = base.clone();

        for attempt in 0..=SLUG_SUFFIX_ATTEMPTS {
            let work = Work::new(candidate.clone(), title.to_string(), description.clone());
            match self.insert(&work).await {
                Ok(()) => return Ok(work),
                Err(Error::DuplicateSlug(taken)) => {
                    debug!(slug = %taken, attempt, "Derived slug taken, retrying with suffix");
                    candidate = with_random_suffix(&base);
                }
                Err(e) => return Err(e),
            }
        }

        warn!(base = %base, "Could not find a free slug");
        Err(Error::DuplicateSlug(base))
    }

    async fn insert(&self, work: &Work) -> Result<()> {
        self.store.insert_work(work).await.map_err(|e| match e {
            StoreError::UniqueViolation(_) => Error::DuplicateSlug(work.slug.clone()),
            other => Error::Store(other),
        })
    }

    pub async fn get_work(&self, id: Uuid) -> Result<Work> {
        self.store
            .work_by_id(id)
            .await?
            .ok_or_else(|| Error::work_not_found(id))
    }

    pub async fn get_work_by_slug(&self, slug: &str) -> Result<Work> {
        self.store
            .work_by_slug(slug)
            .await?
            .ok_or_else(|| Error::NotFound(format!("work with slug '{}'", slug)))
    }

    /// Look up by UUID when `key` parses as one, otherwise by slug
    pub async fn resolve(&self, key: &str) -> Result<Work> {
        match Uuid::parse_str(key) {
            Ok(id) => self.get_work(id).await,
            Err(_) => self.get_work_by_slug(key).await,
        }
    }

    pub async fn list_works(&self, tier: Option<TierKind>) -> Result<Vec<Work>> {
        Ok(self.store.list_works(tier).await?)
    }

    /// Delete a work that has never taken part in lineage or promotion
    pub async fn delete_work(&self, id: Uuid) -> Result<()> {
        match self.store.delete_work(id).await {
            Ok(true) => {
                info!(work_id = %id, "Work deleted");
                Ok(())
            }
            Ok(false) => Err(Error::work_not_found(id)),
            Err(StoreError::HasHistory(id)) => Err(Error::WorkHasHistory(id)),
            Err(e) => Err(e.into()),
        }
    }
}

/// Check an explicit slug: lowercase ASCII alphanumeric runs joined by
/// single hyphens, at most [`MAX_SLUG_CHARS`] long
pub fn validate_slug(slug: &str) -> Result<()> {
    let well_formed = !slug.is_empty()
        && slug.len() <= MAX_SLUG_CHARS
        && slug
            .split('-')
            .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()));

    if well_formed {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "slug '{}' must be lowercase letters and digits separated by single hyphens (max {} characters)",
            slug, MAX_SLUG_CHARS
        )))
    }
}

/// Derive a slug from a title
///
/// Always returns a valid slug, leaving room for a collision suffix.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }

    slug.truncate(MAX_SLUG_CHARS - SLUG_SUFFIX_LEN - 1);
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "work".to_string()
    } else {
        slug.to_string()
    }
}

fn with_random_suffix(base: &str) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SLUG_SUFFIX_LEN)
        .map(|_| SLUG_SUFFIX_CHARSET[rng.gen_range(0..SLUG_SUFFIX_CHARSET.len())] as char)
        .collect();
    format!("{}-{}", base, suffix)
}
