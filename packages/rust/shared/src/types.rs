//! Core domain types for Courseware course trees and screen state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// BlockId
// ---------------------------------------------------------------------------

/// Opaque identifier of a content node in a course tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub String);

impl BlockId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for BlockId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// Kind of content a block represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    Course,
    Chapter,
    Sequential,
    Vertical,
    Video,
    Problem,
    Html,
    Discussion,
    #[default]
    #[serde(other)]
    Unknown,
}

impl BlockType {
    /// Whether the block groups other blocks (navigable as a container).
    pub fn is_container(self) -> bool {
        matches!(
            self,
            Self::Course | Self::Chapter | Self::Sequential | Self::Vertical
        )
    }
}

impl std::fmt::Display for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Course => "course",
            Self::Chapter => "chapter",
            Self::Sequential => "sequential",
            Self::Vertical => "vertical",
            Self::Video => "video",
            Self::Problem => "problem",
            Self::Html => "html",
            Self::Discussion => "discussion",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A single node of a course tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Stable identifier.
    pub id: BlockId,
    /// Content kind.
    #[serde(rename = "type", default)]
    pub block_type: BlockType,
    /// Name shown to learners.
    pub display_name: String,
    /// Name reported to analytics (falls back to the display name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_name: Option<String>,
    /// Browser URL of the unit, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
    /// Direct video URL for video blocks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    /// Ordered child identifiers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<BlockId>,
}

impl Block {
    /// Name to report in analytics events.
    pub fn analytics_name(&self) -> &str {
        self.internal_name.as_deref().unwrap_or(&self.display_name)
    }
}

/// A block plus its ordered immediate children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockGroup {
    pub block: Block,
    pub children: Vec<Block>,
}

impl BlockGroup {
    /// Video children of this group, as download requests.
    pub fn videos(&self) -> Vec<VideoDownload> {
        self.children
            .iter()
            .filter(|b| b.block_type == BlockType::Video)
            .map(VideoDownload::from)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Downloads & last accessed
// ---------------------------------------------------------------------------

/// A request to download the video of one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoDownload {
    pub block_id: BlockId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
}

impl From<&Block> for VideoDownload {
    fn from(block: &Block) -> Self {
        Self {
            block_id: block.id.clone(),
            video_url: block.video_url.clone(),
        }
    }
}

/// The block a learner most recently visited in a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseLastAccessed {
    pub block_id: BlockId,
    pub display_name: String,
    pub accessed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// LoadState
// ---------------------------------------------------------------------------

/// Icon shown alongside an empty-state message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmptyIcon {
    UnknownError,
}

/// What a content area displays.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum LoadState {
    /// Nothing has been shown yet.
    #[default]
    Initial,
    /// Work is in flight and nothing has been shown yet.
    Loading,
    /// Content is on screen.
    Loaded,
    /// The load finished with nothing to show.
    Empty { icon: EmptyIcon, message: String },
    /// The load failed.
    Failed { message: String, retryable: bool },
}

impl LoadState {
    pub fn is_initial(&self) -> bool {
        matches!(self, Self::Initial)
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Failed state for an error, offering a retry action.
    pub fn failed(error: &impl std::fmt::Display) -> Self {
        Self::Failed {
            message: error.to_string(),
            retryable: true,
        }
    }
}
