pub mod layout;
pub mod overlay;
pub mod placement;

use crate::dom::NodePath;
use crate::engine::message::TabId;
use placement::Placement;

/// Changes the page agent asks the display surface to make.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    PopupShown {
        message: String,
        placement: Placement,
        anchor: Option<NodePath>,
    },
    PopupMoved {
        placement: Placement,
        direction_changed: bool,
    },
    PopupClosed,
    ToggleUpdated {
        enabled: bool,
        override_active: bool,
    },
    Toast {
        text: String,
    },
}

/// A surface event tagged with the tab it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceUpdate {
    pub tab: TabId,
    pub event: SurfaceEvent,
}
