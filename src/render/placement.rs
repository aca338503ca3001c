//! Popup placement relative to a reference element.
//!
//! Strict priority: right, left, above, then below unconditionally. The first
//! side with enough room wins; there is no best-fit scoring.

use serde::Serialize;

use crate::config::PlacementConfig;

/// Viewport-relative rectangle, as `getBoundingClientRect` reports it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    pub fn center_y(&self) -> f32 {
        self.top + self.height / 2.0
    }
}

/// Visible window size and current scroll offset, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub scroll_x: f32,
    pub scroll_y: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            scroll_x: 0.0,
            scroll_y: 0.0,
        }
    }

    pub fn scrolled(mut self, x: f32, y: f32) -> Self {
        self.scroll_x = x;
        self.scroll_y = y;
        self
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280.0, 800.0)
    }
}

/// Side of the reference element the popup sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Right,
    Left,
    Above,
    Below,
}

/// Absolute page coordinates of the popup's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub top: f32,
    pub left: f32,
    pub direction: Direction,
}

impl Placement {
    /// Whether `other` is far enough away (or on another side) to be worth moving to.
    pub fn differs_from(&self, other: &Placement, threshold: f32) -> bool {
        self.direction != other.direction
            || (self.top - other.top).abs() > threshold
            || (self.left - other.left).abs() > threshold
    }
}

/// Position a box of `box_height` (and configured width) next to `reference`.
/// Without a reference the box is centred near the top of the viewport.
pub fn place(
    reference: Option<&Rect>,
    viewport: &Viewport,
    box_height: f32,
    cfg: &PlacementConfig,
) -> Placement {
    let Some(link) = reference else {
        return Placement {
            top: viewport.scroll_y + 100.0,
            left: (viewport.width - cfg.box_width) / 2.0,
            direction: Direction::Above,
        };
    };

    // Absolute page coordinates of the link
    let link_top = link.top + viewport.scroll_y;
    let link_bottom = link.bottom() + viewport.scroll_y;
    let link_left = link.left + viewport.scroll_x;
    let link_right = link.right() + viewport.scroll_x;

    let space_right = viewport.width - link.right();
    let space_left = link.left;
    let space_above = link.top;

    let required_horizontal = cfg.box_width + cfg.arrow_size + cfg.gap + cfg.padding;
    let required_vertical = box_height + cfg.arrow_size + cfg.gap + cfg.padding;

    if space_right >= required_horizontal {
        Placement {
            top: clamp_vertical(link, link_top, viewport, box_height, cfg),
            left: link_right + cfg.arrow_size + cfg.gap,
            direction: Direction::Right,
        }
    } else if space_left >= required_horizontal {
        Placement {
            top: clamp_vertical(link, link_top, viewport, box_height, cfg),
            left: link_left - cfg.box_width - cfg.arrow_size - cfg.gap,
            direction: Direction::Left,
        }
    } else if space_above >= required_vertical {
        Placement {
            top: link_top - box_height - cfg.arrow_size - cfg.gap,
            left: clamp_horizontal(link, link_left, viewport, cfg),
            direction: Direction::Above,
        }
    } else {
        Placement {
            top: link_bottom + cfg.arrow_size + cfg.gap,
            left: clamp_horizontal(link, link_left, viewport, cfg),
            direction: Direction::Below,
        }
    }
}

/// Centre on the link vertically, then keep the box inside the viewport.
fn clamp_vertical(
    link: &Rect,
    link_top: f32,
    viewport: &Viewport,
    box_height: f32,
    cfg: &PlacementConfig,
) -> f32 {
    let mut top = link_top + link.height / 2.0 - box_height / 2.0;
    if link.center_y() - box_height / 2.0 < cfg.padding {
        top = viewport.scroll_y + cfg.padding;
    }
    if link.center_y() + box_height / 2.0 > viewport.height - cfg.padding {
        top = viewport.scroll_y + viewport.height - box_height - cfg.padding;
    }
    top
}

/// Centre on the link horizontally, then keep the box inside the viewport.
fn clamp_horizontal(link: &Rect, link_left: f32, viewport: &Viewport, cfg: &PlacementConfig) -> f32 {
    let mut left = link_left + link.width / 2.0 - cfg.box_width / 2.0;
    if left < cfg.padding {
        left = cfg.padding;
    }
    if left + cfg.box_width > viewport.width - cfg.padding {
        left = viewport.width - cfg.box_width - cfg.padding;
    }
    left
}
