//! Last-accessed tracking: remembers the section a learner last opened in a
//! course so the outline can offer to resume there.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, warn};

use courseware_shared::{BlockId, CourseLastAccessed, Result};

use crate::querier::CourseQuerier;

/// Persistence for last-accessed items, keyed by course.
#[async_trait]
pub trait LastAccessedStore: Send + Sync {
    async fn load(&self, course_id: &str) -> Result<Option<CourseLastAccessed>>;
    async fn save(&self, course_id: &str, item: CourseLastAccessed) -> Result<()>;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryLastAccessedStore {
    items: Mutex<HashMap<String, CourseLastAccessed>>,
}

impl MemoryLastAccessedStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LastAccessedStore for MemoryLastAccessedStore {
    async fn load(&self, course_id: &str) -> Result<Option<CourseLastAccessed>> {
        Ok(self.items.lock().get(course_id).cloned())
    }

    async fn save(&self, course_id: &str, item: CourseLastAccessed) -> Result<()> {
        self.items.lock().insert(course_id.to_string(), item);
        Ok(())
    }
}

/// Loads and records the last-accessed block of one course.
pub struct LastAccessedTracker {
    store: Arc<dyn LastAccessedStore>,
    querier: Arc<dyn CourseQuerier>,
}

impl LastAccessedTracker {
    pub fn new(store: Arc<dyn LastAccessedStore>, querier: Arc<dyn CourseQuerier>) -> Self {
        Self { store, querier }
    }

    /// The stored item, or `None` if there is none or the store failed.
    pub async fn load(&self) -> Option<CourseLastAccessed> {
        let course_id = self.querier.course_id();
        match self.store.load(course_id).await {
            Ok(item) => item,
            Err(e) => {
                warn!(course_id, error = %e, "unable to load last accessed item");
                None
            }
        }
    }

    /// Record `block_id` as last accessed.
    ///
    /// Only sections below the course root are recorded; the root itself and
    /// `None` leave the stored item untouched.
    pub async fn save(&self, block_id: Option<&BlockId>) -> Option<CourseLastAccessed> {
        let block_id = block_id?;
        let course_id = self.querier.course_id();

        let root = match self.querier.root_id().await {
            Ok(root) => root,
            Err(e) => {
                warn!(course_id, error = %e, "unable to resolve course root");
                return None;
            }
        };
        if *block_id == root {
            return None;
        }

        let block = match self.querier.block(block_id).await {
            Ok(block) => block,
            Err(e) => {
                warn!(course_id, %block_id, error = %e, "unable to resolve last accessed block");
                return None;
            }
        };

        let item = CourseLastAccessed {
            block_id: block.id,
            display_name: block.display_name,
            accessed_at: Utc::now(),
        };
        match self.store.save(course_id, item.clone()).await {
            Ok(()) => {
                debug!(course_id, block_id = %item.block_id, "saved last accessed item");
                Some(item)
            }
            Err(e) => {
                warn!(course_id, error = %e, "unable to save last accessed item");
                None
            }
        }
    }
}
