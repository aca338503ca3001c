//! The single summary popup shown on a page.
//!
//! Showing a popup always tears down the previous one first, so concurrent
//! requests resolve as last-write-wins. Placement runs twice: once with an
//! estimated height, then again once the real height is known.

use crate::config::{HoverConfig, PlacementConfig};
use crate::dom::NodePath;
use crate::render::placement::{place, Placement, Rect, Viewport};
use crate::render::SurfaceEvent;

#[derive(Debug, Clone, PartialEq)]
pub struct Popup {
    pub message: String,
    pub placement: Placement,
    /// Highlighted link the popup points at.
    pub anchor: Option<NodePath>,
    pub height: f32,
}

/// What a page click landed on, relative to the popup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickTarget {
    Popup,
    Link(NodePath),
    Elsewhere,
}

pub struct Overlay {
    popup: Option<Popup>,
    hover: HoverConfig,
    placement: PlacementConfig,
}

impl Overlay {
    pub fn new(hover: HoverConfig, placement: PlacementConfig) -> Self {
        Self {
            popup: None,
            hover,
            placement,
        }
    }

    pub fn popup(&self) -> Option<&Popup> {
        self.popup.as_ref()
    }

    /// Replace any popup with one showing `message` next to `anchor`.
    pub fn show(
        &mut self,
        message: &str,
        anchor: Option<(NodePath, Rect)>,
        viewport: &Viewport,
    ) -> Vec<SurfaceEvent> {
        let mut events = Vec::with_capacity(2);
        if self.popup.take().is_some() {
            events.push(SurfaceEvent::PopupClosed);
        }

        let estimated = self.hover.estimated_height;
        let (anchor, rect) = match anchor {
            Some((path, rect)) => (Some(path), Some(rect)),
            None => (None, None),
        };
        let placement = place(rect.as_ref(), viewport, estimated, &self.placement);

        let popup = Popup {
            message: message.to_string(),
            placement,
            anchor,
            height: estimated,
        };
        events.push(SurfaceEvent::PopupShown {
            message: popup.message.clone(),
            placement,
            anchor: popup.anchor.clone(),
        });
        self.popup = Some(popup);
        events
    }

    /// Second placement pass with the measured height. Moves the popup only
    /// when the height estimate was materially off and the new position is
    /// meaningfully different.
    pub fn settle(
        &mut self,
        measured_height: f32,
        anchor_rect: Option<Rect>,
        viewport: &Viewport,
    ) -> Option<SurfaceEvent> {
        let popup = self.popup.as_mut()?;
        let previous_height = popup.height;
        popup.height = measured_height;

        if (measured_height - previous_height).abs() <= self.hover.reflow_threshold {
            return None;
        }

        let refined = place(anchor_rect.as_ref(), viewport, measured_height, &self.placement);
        if !refined.differs_from(&popup.placement, self.hover.move_threshold) {
            return None;
        }

        let direction_changed = refined.direction != popup.placement.direction;
        log::debug!(
            "Repositioning popup {:?} -> {:?}",
            popup.placement,
            refined
        );
        popup.placement = refined;
        Some(SurfaceEvent::PopupMoved {
            placement: refined,
            direction_changed,
        })
    }

    pub fn close(&mut self) -> Option<SurfaceEvent> {
        self.popup.take().map(|_| SurfaceEvent::PopupClosed)
    }

    /// Clicks outside both the popup and its highlighted link dismiss it.
    pub fn click(&mut self, target: &ClickTarget) -> Option<SurfaceEvent> {
        let popup = self.popup.as_ref()?;
        let keep = match target {
            ClickTarget::Popup => true,
            ClickTarget::Link(path) => popup.anchor.as_ref() == Some(path),
            ClickTarget::Elsewhere => false,
        };
        if keep {
            None
        } else {
            self.close()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::placement::Direction;

    fn overlay() -> Overlay {
        Overlay::new(HoverConfig::default(), PlacementConfig::default())
    }

    #[test]
    fn show_replaces_previous_popup() {
        let mut o = overlay();
        let vp = Viewport::new(1280.0, 800.0);
        let first = o.show("one", None, &vp);
        assert_eq!(first.len(), 1);
        let second = o.show("two", None, &vp);
        assert_eq!(second[0], SurfaceEvent::PopupClosed);
        assert!(matches!(&second[1], SurfaceEvent::PopupShown { message, .. } if message == "two"));
        assert_eq!(o.popup().unwrap().message, "two");
    }

    #[test]
    fn small_height_error_does_not_reflow() {
        let mut o = overlay();
        let vp = Viewport::new(1280.0, 800.0);
        let rect = Rect::new(100.0, 300.0, 50.0, 20.0);
        o.show("msg", Some((vec![0], rect)), &vp);
        assert_eq!(o.settle(200.0, Some(rect), &vp), None);
    }

    #[test]
    fn large_height_error_recentres() {
        let mut o = overlay();
        let vp = Viewport::new(1280.0, 800.0);
        let rect = Rect::new(100.0, 300.0, 50.0, 20.0);
        o.show("msg", Some((vec![0], rect)), &vp);
        let before = o.popup().unwrap().placement;

        let moved = o.settle(400.0, Some(rect), &vp).unwrap();
        let after = o.popup().unwrap().placement;
        assert_eq!(
            moved,
            SurfaceEvent::PopupMoved { placement: after, direction_changed: false }
        );
        assert_eq!(after.direction, Direction::Right);
        assert_eq!(before.top - after.top, 110.0);
    }

    #[test]
    fn reflow_can_flip_direction() {
        let mut o = overlay();
        let vp = Viewport::new(400.0, 800.0);
        // Only room above for the estimate; the real box is too tall.
        let rect = Rect::new(340.0, 250.0, 50.0, 20.0);
        o.show("msg", Some((vec![0], rect)), &vp);
        assert_eq!(o.popup().unwrap().placement.direction, Direction::Above);

        let moved = o.settle(300.0, Some(rect), &vp).unwrap();
        assert!(matches!(moved, SurfaceEvent::PopupMoved { direction_changed: true, .. }));
        assert_eq!(o.popup().unwrap().placement.direction, Direction::Below);
    }

    #[test]
    fn outside_click_dismisses_but_anchor_click_does_not() {
        let mut o = overlay();
        let vp = Viewport::new(1280.0, 800.0);
        o.show("msg", Some((vec![1, 2], Rect::new(10.0, 10.0, 10.0, 10.0))), &vp);
        assert_eq!(o.click(&ClickTarget::Popup), None);
        assert_eq!(o.click(&ClickTarget::Link(vec![1, 2])), None);
        assert_eq!(o.click(&ClickTarget::Link(vec![3])), Some(SurfaceEvent::PopupClosed));
        assert!(o.popup().is_none());
        assert_eq!(o.close(), None);
    }
}
