//! Course content access.
//!
//! [`CourseQuerier`] is the seam between screens and wherever course trees
//! come from. [`JsonCourseQuerier`] serves a tree loaded from a JSON file and
//! re-reads the file when a refresh has been requested.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use courseware_shared::{Block, BlockGroup, BlockId, BlockType, CoursewareError, Result};

/// Hierarchical course content, looked up by block identifier.
#[async_trait]
pub trait CourseQuerier: Send + Sync {
    /// Identifier of the course this querier serves.
    fn course_id(&self) -> &str;

    /// Identifier of the course's root block.
    async fn root_id(&self) -> Result<BlockId>;

    /// The block plus its immediate children. `None` means the course root.
    async fn children_of(&self, id: Option<&BlockId>) -> Result<BlockGroup>;

    /// Identifier of the block's parent.
    async fn parent_of(&self, id: &BlockId) -> Result<BlockId>;

    async fn block(&self, id: &BlockId) -> Result<Block>;

    /// Ask for fresh content on the next lookup.
    fn set_needs_refresh(&self, needs_refresh: bool);
}

// ---------------------------------------------------------------------------
// CourseTree
// ---------------------------------------------------------------------------

/// On-disk course file layout.
#[derive(Debug, Deserialize)]
struct CourseFile {
    course_id: String,
    root: BlockId,
    blocks: HashMap<BlockId, FileBlock>,
}

#[derive(Debug, Deserialize)]
struct FileBlock {
    #[serde(rename = "type", default)]
    block_type: BlockType,
    display_name: String,
    #[serde(default)]
    internal_name: Option<String>,
    #[serde(default)]
    web_url: Option<String>,
    #[serde(default)]
    video_url: Option<String>,
    #[serde(default)]
    children: Vec<BlockId>,
}

/// An indexed, validated course tree.
#[derive(Debug, Clone)]
pub struct CourseTree {
    course_id: String,
    root: BlockId,
    blocks: HashMap<BlockId, Block>,
    parents: HashMap<BlockId, BlockId>,
}

impl CourseTree {
    /// Parse and validate a course file.
    ///
    /// Every child id must name a block, and no block may have two parents.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: CourseFile = serde_json::from_str(json)
            .map_err(|e| CoursewareError::parse(format!("invalid course file: {e}")))?;

        let blocks: HashMap<BlockId, Block> = file
            .blocks
            .into_iter()
            .map(|(id, b)| {
                let block = Block {
                    id: id.clone(),
                    block_type: b.block_type,
                    display_name: b.display_name,
                    internal_name: b.internal_name,
                    web_url: b.web_url,
                    video_url: b.video_url,
                    children: b.children,
                };
                (id, block)
            })
            .collect();

        if !blocks.contains_key(&file.root) {
            return Err(CoursewareError::validation(format!(
                "root block {} is not defined",
                file.root
            )));
        }

        let mut parents = HashMap::new();
        for block in blocks.values() {
            for child in &block.children {
                if !blocks.contains_key(child) {
                    return Err(CoursewareError::validation(format!(
                        "block {} lists unknown child {child}",
                        block.id
                    )));
                }
                if let Some(previous) = parents.insert(child.clone(), block.id.clone()) {
                    return Err(CoursewareError::validation(format!(
                        "block {child} has two parents: {previous} and {}",
                        block.id
                    )));
                }
            }
        }

        Ok(Self {
            course_id: file.course_id,
            root: file.root,
            blocks,
            parents,
        })
    }

    pub fn course_id(&self) -> &str {
        &self.course_id
    }

    pub fn root(&self) -> &BlockId {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn block(&self, id: &BlockId) -> Result<&Block> {
        self.blocks
            .get(id)
            .ok_or_else(|| CoursewareError::NotFound(id.to_string()))
    }

    pub fn group(&self, id: Option<&BlockId>) -> Result<BlockGroup> {
        let block = self.block(id.unwrap_or(&self.root))?;
        let children = block
            .children
            .iter()
            .map(|child| self.block(child).cloned())
            .collect::<Result<Vec<_>>>()?;
        Ok(BlockGroup {
            block: block.clone(),
            children,
        })
    }

    pub fn parent(&self, id: &BlockId) -> Result<&BlockId> {
        self.block(id)?;
        self.parents.get(id).ok_or_else(|| {
            CoursewareError::validation(format!("block {id} has no parent"))
        })
    }
}

// ---------------------------------------------------------------------------
// JsonCourseQuerier
// ---------------------------------------------------------------------------

/// Serves a [`CourseTree`], optionally backed by a JSON file on disk.
pub struct JsonCourseQuerier {
    course_id: String,
    path: Option<PathBuf>,
    tree: RwLock<Arc<CourseTree>>,
    needs_refresh: AtomicBool,
}

impl JsonCourseQuerier {
    /// Load a course file. Refresh requests re-read it.
    pub fn open(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CoursewareError::io(path, e))?;
        let tree = CourseTree::from_json(&content)?;
        info!(path = %path.display(), course_id = %tree.course_id(), blocks = tree.len(), "loaded course");

        Ok(Self {
            course_id: tree.course_id().to_string(),
            path: Some(path.to_path_buf()),
            tree: RwLock::new(Arc::new(tree)),
            needs_refresh: AtomicBool::new(false),
        })
    }

    /// Serve an in-memory tree. Refresh requests are no-ops.
    pub fn from_tree(tree: CourseTree) -> Self {
        Self {
            course_id: tree.course_id().to_string(),
            path: None,
            tree: RwLock::new(Arc::new(tree)),
            needs_refresh: AtomicBool::new(false),
        }
    }

    async fn read_tree(path: &Path) -> Result<CourseTree> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CoursewareError::io(path, e))?;
        CourseTree::from_json(&content)
    }

    async fn tree(&self) -> Result<Arc<CourseTree>> {
        if let Some(path) = &self.path {
            if self.needs_refresh.swap(false, Ordering::SeqCst) {
                let tree = match Self::read_tree(path).await {
                    Ok(tree) => Arc::new(tree),
                    Err(e) => {
                        // Keep the request pending so the next load tries again.
                        self.needs_refresh.store(true, Ordering::SeqCst);
                        return Err(e);
                    }
                };
                debug!(path = %path.display(), blocks = tree.len(), "course refreshed from disk");
                *self.tree.write() = Arc::clone(&tree);
                return Ok(tree);
            }
        }
        Ok(Arc::clone(&self.tree.read()))
    }
}

#[async_trait]
impl CourseQuerier for JsonCourseQuerier {
    fn course_id(&self) -> &str {
        &self.course_id
    }

    async fn root_id(&self) -> Result<BlockId> {
        Ok(self.tree().await?.root().clone())
    }

    #[instrument(skip(self), fields(course_id = %self.course_id))]
    async fn children_of(&self, id: Option<&BlockId>) -> Result<BlockGroup> {
        self.tree().await?.group(id)
    }

    async fn parent_of(&self, id: &BlockId) -> Result<BlockId> {
        self.tree().await?.parent(id).cloned()
    }

    async fn block(&self, id: &BlockId) -> Result<Block> {
        self.tree().await?.block(id).cloned()
    }

    fn set_needs_refresh(&self, needs_refresh: bool) {
        self.needs_refresh.store(needs_refresh, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SAMPLE_COURSE;

    #[test]
    fn tree_groups_children_in_order() {
        let tree = CourseTree::from_json(SAMPLE_COURSE).expect("parse sample");
        let root = tree.group(None).expect("root group");
        assert_eq!(root.block.display_name, "Demo Course");
        let ids: Vec<_> = root.children.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["ch1", "ch2"]);

        let seq1 = tree.group(Some(&"seq1".into())).expect("seq1 group");
        assert_eq!(seq1.children[0].block_type, BlockType::Video);
    }

    #[test]
    fn parents_are_indexed() {
        let tree = CourseTree::from_json(SAMPLE_COURSE).expect("parse sample");
        assert_eq!(tree.parent(&"seq1".into()).expect("parent"), &BlockId::from("ch1"));
        assert!(tree.parent(tree.root()).is_err());
        assert!(matches!(
            tree.parent(&"nope".into()),
            Err(CoursewareError::NotFound(_))
        ));
    }

    #[test]
    fn dangling_child_is_rejected() {
        let json = r#"{
            "course_id": "c",
            "root": "r",
            "blocks": { "r": { "type": "course", "display_name": "R", "children": ["missing"] } }
        }"#;
        let err = CourseTree::from_json(json).unwrap_err();
        assert!(err.to_string().contains("unknown child missing"));
    }

    #[test]
    fn missing_root_is_rejected() {
        let json = r#"{ "course_id": "c", "root": "r", "blocks": {} }"#;
        assert!(matches!(
            CourseTree::from_json(json),
            Err(CoursewareError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn refresh_rereads_the_course_file() {
        let path = std::env::temp_dir().join(format!(
            "courseware-querier-test-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, SAMPLE_COURSE).expect("write course");
        let querier = JsonCourseQuerier::open(&path).expect("open");
        assert_eq!(querier.course_id(), "course-v1:Demo+101");

        let renamed = SAMPLE_COURSE.replace("Demo Course", "Renamed Course");
        std::fs::write(&path, renamed).expect("rewrite course");

        let before = querier.children_of(None).await.expect("root");
        assert_eq!(before.block.display_name, "Demo Course");

        querier.set_needs_refresh(true);
        let after = querier.children_of(None).await.expect("root");
        assert_eq!(after.block.display_name, "Renamed Course");

        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn failed_refresh_is_retried_on_the_next_load() {
        let path = std::env::temp_dir().join(format!(
            "courseware-querier-retry-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, SAMPLE_COURSE).expect("write course");
        let querier = JsonCourseQuerier::open(&path).expect("open");

        std::fs::write(&path, "{ not json").expect("corrupt course");
        querier.set_needs_refresh(true);
        assert!(querier.children_of(None).await.is_err());

        let renamed = SAMPLE_COURSE.replace("Demo Course", "Fixed Course");
        std::fs::write(&path, renamed).expect("repair course");
        let root = querier.children_of(None).await.expect("root");
        assert_eq!(root.block.display_name, "Fixed Course");

        std::fs::remove_file(&path).ok();
    }
}
