//! Simple top-to-bottom block layout over the page DOM.
//!
//! Good enough to give every link a document-space box for popup placement
//! and to estimate how tall a block of text renders at a given width.

use crate::dom::{DomNode, NodeType};
use crate::render::placement::{Rect, Viewport};

/// Bounding box for a laid-out DOM node, in document coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LayoutBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl LayoutBox {
    /// Viewport-relative rectangle for the current scroll offset.
    pub fn to_viewport(&self, viewport: &Viewport) -> Rect {
        Rect::new(
            self.x - viewport.scroll_x,
            self.y - viewport.scroll_y,
            self.width,
            self.height,
        )
    }
}

/// A DOM node with computed layout. Children line up index-for-index with
/// the DOM children so a `NodePath` addresses both trees.
#[derive(Debug, Clone)]
pub struct LayoutNode {
    pub tag: String,
    pub bounds: LayoutBox,
    pub children: Vec<LayoutNode>,
    pub is_block: bool,
    pub font_size: f32,
}

impl LayoutNode {
    pub fn node_at(&self, path: &[usize]) -> Option<&LayoutNode> {
        let mut current = self;
        for &idx in path {
            current = current.children.get(idx)?;
        }
        Some(current)
    }
}

const BLOCK_TAGS: &[&str] = &[
    "html",
    "body",
    "div",
    "p",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "ul",
    "ol",
    "li",
    "table",
    "tr",
    "td",
    "th",
    "form",
    "section",
    "article",
    "aside",
    "main",
    "header",
    "footer",
    "nav",
    "blockquote",
    "pre",
    "figure",
    "figcaption",
    "details",
    "summary",
];

/// Elements that never occupy space.
const HIDDEN_TAGS: &[&str] = &[
    "head", "title", "meta", "link", "script", "style", "noscript", "template",
];

const LINE_HEIGHT: f32 = 1.4;
const GLYPH_WIDTH: f32 = 0.6;

/// Per-tag vertical margins (top, bottom) in pixels.
fn tag_margins(tag: &str) -> (f32, f32) {
    match tag {
        "h1" => (24.0, 16.0),
        "h2" => (20.0, 12.0),
        "h3" | "h4" => (16.0, 10.0),
        "h5" | "h6" => (12.0, 8.0),
        "p" => (4.0, 10.0),
        "ul" | "ol" => (8.0, 8.0),
        "li" => (2.0, 2.0),
        "section" | "article" | "main" => (16.0, 16.0),
        "nav" | "header" | "footer" => (12.0, 12.0),
        "blockquote" => (12.0, 12.0),
        "pre" => (8.0, 8.0),
        _ => (0.0, 0.0),
    }
}

/// Per-tag padding in pixels.
fn tag_padding(tag: &str, is_block: bool) -> f32 {
    match tag {
        "section" | "article" | "main" | "aside" => 16.0,
        "nav" | "header" | "footer" => 12.0,
        "blockquote" => 20.0,
        _ if is_block => 4.0,
        _ => 0.0,
    }
}

/// Rendered height of `text` wrapped at `width` with the given font size.
pub fn text_height(text: &str, width: f32, font_size: f32) -> f32 {
    let chars = text.chars().count();
    if chars == 0 {
        return 0.0;
    }
    let chars_per_line = (width / (font_size * GLYPH_WIDTH)).max(1.0) as usize;
    let lines = (chars as f32 / chars_per_line as f32).ceil().max(1.0);
    lines * font_size * LINE_HEIGHT
}

/// Compute layout for a DOM tree (simple top-to-bottom block model).
pub fn compute_layout(root: &DomNode, viewport_width: f32) -> LayoutNode {
    let mut cursor_y = 0.0;
    layout_node(root, 0.0, &mut cursor_y, viewport_width, 16.0)
}

fn layout_node(
    node: &DomNode,
    x: f32,
    cursor_y: &mut f32,
    available_width: f32,
    parent_font_size: f32,
) -> LayoutNode {
    if node.node_type == NodeType::Element && HIDDEN_TAGS.contains(&node.tag.as_str()) {
        return LayoutNode {
            tag: node.tag.clone(),
            bounds: LayoutBox {
                x,
                y: *cursor_y,
                width: 0.0,
                height: 0.0,
            },
            children: Vec::new(),
            is_block: false,
            font_size: parent_font_size,
        };
    }

    let is_block =
        node.node_type == NodeType::Element && BLOCK_TAGS.contains(&node.tag.as_str());

    let font_size = match node.tag.as_str() {
        "h1" => 32.0,
        "h2" => 24.0,
        "h3" => 20.0,
        "h4" => 18.0,
        "h5" | "h6" => 16.0,
        "small" => 12.0,
        _ => parent_font_size,
    };

    let (margin_top, margin_bottom) = tag_margins(&node.tag);
    let padding = tag_padding(&node.tag, is_block);

    if is_block {
        *cursor_y += margin_top;
    }

    let start_y = *cursor_y;

    if padding > 0.0 {
        *cursor_y += padding;
    }

    // Layout children
    let child_x = x + padding;
    let child_width = (available_width - padding * 2.0).max(0.0);
    let children = node
        .children
        .iter()
        .map(|child| layout_node(child, child_x, cursor_y, child_width, font_size))
        .collect();

    // Text content contributes to height
    if node.node_type == NodeType::Text && !node.text.trim().is_empty() {
        *cursor_y += text_height(node.text.trim(), available_width, font_size);
    }

    if padding > 0.0 {
        *cursor_y += padding;
    }

    let height = *cursor_y - start_y;

    if is_block {
        *cursor_y += margin_bottom;
    }

    // Inline boxes are only as wide as their text
    let width = if is_block {
        available_width
    } else {
        let chars = node.text_content().trim().chars().count() as f32;
        (chars * font_size * GLYPH_WIDTH).min(available_width)
    };

    LayoutNode {
        tag: node.tag.clone(),
        bounds: LayoutBox {
            x,
            y: start_y,
            width,
            height,
        },
        children,
        is_block,
        font_size,
    }
}

/// Metrics for the summary popup's content.
const POPUP_FONT: f32 = 14.0;
const POPUP_PADDING: f32 = 20.0;
const POPUP_BORDER: f32 = 3.0;
const POPUP_HEADER: f32 = 18.0 * LINE_HEIGHT + 12.0 + 5.0 + 2.0;
const POPUP_BODY_MARGIN: f32 = 20.0;
const POPUP_BUTTON: f32 = 32.0;

/// Height the popup renders at for `message` in a box `box_width` wide.
pub fn measure_popup_height(message: &str, box_width: f32) -> f32 {
    let inner_width = box_width - 2.0 * (POPUP_PADDING + POPUP_BORDER);
    2.0 * (POPUP_PADDING + POPUP_BORDER)
        + POPUP_HEADER
        + text_height(message, inner_width, POPUP_FONT).max(POPUP_FONT * LINE_HEIGHT)
        + POPUP_BODY_MARGIN
        + POPUP_BUTTON
}
