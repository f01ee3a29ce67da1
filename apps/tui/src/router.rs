//! Router that turns navigation requests into events for the app loop.

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::debug;

use courseware_core::{Router, ScreenKind};
use courseware_shared::{BlockId, BlockType};

/// A navigation request raised by a screen controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NavEvent {
    Container {
        block_id: BlockId,
        block_type: BlockType,
        parent_id: BlockId,
    },
    Downloads,
}

pub(crate) struct ChannelRouter {
    tx: UnboundedSender<NavEvent>,
}

impl ChannelRouter {
    pub(crate) fn new() -> (Self, UnboundedReceiver<NavEvent>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: NavEvent) {
        debug!(?event, "navigation requested");
        // The receiver only goes away when the app is quitting.
        let _ = self.tx.send(event);
    }
}

impl Router for ChannelRouter {
    fn navigate_to_container(
        &self,
        block_id: &BlockId,
        block_type: BlockType,
        parent_id: &BlockId,
        _course_id: &str,
        _from: ScreenKind,
    ) {
        self.send(NavEvent::Container {
            block_id: block_id.clone(),
            block_type,
            parent_id: parent_id.clone(),
        });
    }

    fn navigate_to_downloads(&self, _from: ScreenKind) {
        self.send(NavEvent::Downloads);
    }
}
