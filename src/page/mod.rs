//! The page context: everything that runs beside a loaded document.

pub mod agent;
pub mod classify;
pub mod extract;
pub mod hover;
pub mod storage;

pub use agent::{AgentDeps, PageAgent};

use crate::dom::NodePath;
use crate::render::overlay::ClickTarget;
use crate::render::placement::Viewport;

/// Input from the hosting page (pointer, clicks, geometry).
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    /// Pointer entered the element at `target` (or one of its descendants).
    PointerEnter { target: NodePath },
    PointerLeave { target: NodePath },
    /// Context menu opened on `target`; captured before the menu shows.
    ContextMenu { target: NodePath },
    ToggleClicked,
    Click(ClickTarget),
    ClosePopup,
    /// Real rendered height of the popup, when the host can measure it.
    PopupMeasured { height: f32 },
    Viewport(Viewport),
}
