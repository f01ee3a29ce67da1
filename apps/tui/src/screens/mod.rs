//! TUI screen definitions.
//!
//! Each screen corresponds to a tab in the TUI and encapsulates its
//! own state and rendering logic.

mod downloads;
mod find_courses;
mod outline;

use std::fmt;

pub(crate) use downloads::DownloadsScreen;
pub(crate) use find_courses::FindCoursesScreen;
pub(crate) use outline::OutlineScreen;

/// Screen identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScreenId {
    Outline,
    Downloads,
    FindCourses,
}

impl ScreenId {
    pub(crate) const ALL: [ScreenId; 3] = [Self::Outline, Self::Downloads, Self::FindCourses];
}

impl fmt::Display for ScreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Outline => write!(f, "Outline"),
            Self::Downloads => write!(f, "Downloads"),
            Self::FindCourses => write!(f, "Find Courses"),
        }
    }
}
