pub mod parser;

use std::collections::HashMap;

use url::Url;

/// Child-index path from the document root to a node.
pub type NodePath = Vec<usize>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Document,
    Element,
    Text,
}

/// Owned DOM node. Scripts and styles are stripped at parse time, so every
/// text node is visible text.
#[derive(Debug, Clone)]
pub struct DomNode {
    pub tag: String,
    pub attributes: HashMap<String, String>,
    pub text: String,
    pub children: Vec<DomNode>,
    pub node_type: NodeType,
}

impl DomNode {
    pub fn document(children: Vec<DomNode>) -> Self {
        Self {
            tag: "#document".into(),
            attributes: HashMap::new(),
            text: String::new(),
            children,
            node_type: NodeType::Document,
        }
    }

    pub fn element(
        tag: impl Into<String>,
        attrs: HashMap<String, String>,
        children: Vec<DomNode>,
    ) -> Self {
        Self {
            tag: tag.into(),
            attributes: attrs,
            text: String::new(),
            children,
            node_type: NodeType::Element,
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self {
            tag: String::new(),
            attributes: HashMap::new(),
            text: content.into(),
            children: Vec::new(),
            node_type: NodeType::Text,
        }
    }

    /// Recursively count all nodes in this subtree
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(|c| c.node_count()).sum::<usize>()
    }

    /// Concatenated text of the subtree, untrimmed (DOM `textContent`).
    pub fn text_content(&self) -> String {
        let mut buf = String::new();
        self.text_content_inner(&mut buf);
        buf
    }

    fn text_content_inner(&self, buf: &mut String) {
        buf.push_str(&self.text);
        for child in &self.children {
            child.text_content_inner(buf);
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }

    pub fn is_element(&self, tag: &str) -> bool {
        self.node_type == NodeType::Element && self.tag == tag
    }

    /// Node at `path` below this one.
    pub fn node_at(&self, path: &[usize]) -> Option<&DomNode> {
        let mut current = self;
        for &idx in path {
            current = current.children.get(idx)?;
        }
        Some(current)
    }

    /// Depth-first, document-order search for the first matching node.
    pub fn find_first<F>(&self, pred: F) -> Option<(NodePath, &DomNode)>
    where
        F: Fn(&DomNode) -> bool,
    {
        let mut path = Vec::new();
        find_first_inner(self, &pred, &mut path).map(|node| (path, node))
    }

    /// All matching nodes in document order.
    pub fn find_all<F>(&self, pred: F) -> Vec<(NodePath, &DomNode)>
    where
        F: Fn(&DomNode) -> bool,
    {
        let mut out = Vec::new();
        find_all_inner(self, &pred, &mut Vec::new(), &mut out);
        out
    }

    /// Nearest strict ancestor of the node at `path` whose tag is in `tags`.
    pub fn closest_ancestor(&self, path: &[usize], tags: &[&str]) -> Option<NodePath> {
        (0..path.len()).rev().find_map(|len| {
            let ancestor = &path[..len];
            self.node_at(ancestor)
                .filter(|n| n.node_type == NodeType::Element && tags.contains(&n.tag.as_str()))
                .map(|_| ancestor.to_vec())
        })
    }
}

fn find_first_inner<'a, F>(node: &'a DomNode, pred: &F, path: &mut NodePath) -> Option<&'a DomNode>
where
    F: Fn(&DomNode) -> bool,
{
    if pred(node) {
        return Some(node);
    }
    for (i, child) in node.children.iter().enumerate() {
        path.push(i);
        if let Some(found) = find_first_inner(child, pred, path) {
            return Some(found);
        }
        path.pop();
    }
    None
}

fn find_all_inner<'a, F>(
    node: &'a DomNode,
    pred: &F,
    path: &mut NodePath,
    out: &mut Vec<(NodePath, &'a DomNode)>,
) where
    F: Fn(&DomNode) -> bool,
{
    if pred(node) {
        out.push((path.clone(), node));
    }
    for (i, child) in node.children.iter().enumerate() {
        path.push(i);
        find_all_inner(child, pred, path, out);
        path.pop();
    }
}

/// Parsed page with its address.
#[derive(Debug, Clone)]
pub struct DomTree {
    pub root: DomNode,
    pub url: String,
    pub title: String,
}

impl DomTree {
    pub fn node_at(&self, path: &[usize]) -> Option<&DomNode> {
        self.root.node_at(path)
    }

    /// Absolute form of `href` against the page address, as `a.href` reports it.
    pub fn resolve_href(&self, href: &str) -> Option<String> {
        let base = Url::parse(&self.url).ok()?;
        base.join(href.trim()).ok().map(String::from)
    }

    /// Every `<a href>` in document order, paired with its resolved address.
    pub fn links(&self) -> Vec<(NodePath, String)> {
        self.root
            .find_all(|n| n.is_element("a") && n.attr("href").is_some())
            .into_iter()
            .filter_map(|(path, node)| {
                let href = node.attr("href")?;
                self.resolve_href(href).map(|abs| (path, abs))
            })
            .collect()
    }

    /// Resolved address of the link at `path`, if it is an anchor with an href.
    pub fn link_address(&self, path: &[usize]) -> Option<String> {
        let node = self.node_at(path)?;
        if !node.is_element("a") {
            return None;
        }
        self.resolve_href(node.attr("href")?)
    }

    /// First `<meta property=…>` content for the given property.
    pub fn meta_property(&self, property: &str) -> Option<&str> {
        self.root
            .find_first(|n| n.is_element("meta") && n.attr("property") == Some(property))
            .and_then(|(_, n)| n.attr("content"))
    }

    pub fn has_meta_property(&self, property: &str) -> bool {
        self.root
            .find_first(|n| n.is_element("meta") && n.attr("property") == Some(property))
            .is_some()
    }

    pub fn hostname(&self) -> String {
        Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default()
    }

    pub fn path(&self) -> String {
        Url::parse(&self.url)
            .map(|u| u.path().to_string())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::parser::parse_html;

    #[test]
    fn resolves_relative_links() {
        let tree = parse_html(
            r#"<html><body><p><a href="/about">About</a> <a href="next">Next</a></p></body></html>"#,
            "https://example.com/blog/post",
        );
        let links = tree.links();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].1, "https://example.com/about");
        assert_eq!(links[1].1, "https://example.com/blog/next");
        assert_eq!(tree.link_address(&links[0].0).as_deref(), Some("https://example.com/about"));
    }

    #[test]
    fn closest_ancestor_skips_self() {
        let tree = parse_html(
            r#"<html><body><div><p>Hi <a href="/x">x</a></p></div></body></html>"#,
            "https://example.com/",
        );
        let (path, _) = tree.links().remove(0);
        let p = tree.root.closest_ancestor(&path, &["p", "div"]).unwrap();
        assert!(tree.node_at(&p).unwrap().is_element("p"));
        assert!(tree.root.closest_ancestor(&path, &["li"]).is_none());
    }

    #[test]
    fn text_content_keeps_inline_spacing() {
        let tree = parse_html(
            r#"<html><body><p>A. <a href="/l">Link here</a> is great. B.</p></body></html>"#,
            "https://example.com/",
        );
        let (p, node) = tree.root.find_first(|n| n.is_element("p")).unwrap();
        assert!(!p.is_empty());
        assert_eq!(node.text_content(), "A. Link here is great. B.");
    }

    #[test]
    fn meta_lookup_and_url_parts() {
        let tree = parse_html(
            r#"<html><head><meta property="og:type" content="article"></head><body></body></html>"#,
            "https://docs.example.com/guide/start?x=1",
        );
        assert_eq!(tree.meta_property("og:type"), Some("article"));
        assert!(!tree.has_meta_property("article:published_time"));
        assert_eq!(tree.hostname(), "docs.example.com");
        assert_eq!(tree.path(), "/guide/start");
    }
}
