// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The in-memory node table and its [`HostConfig`] implementation.

use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt::Write as _;

use canopy_core::error::HostError;
use canopy_core::host::HostConfig;
use canopy_core::lane::EventPriority;
use canopy_core::props::{Props, Value};
use kurbo::{Point, Rect, Vec2};

/// Handle to a node owned by a [`MemoryHost`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeHandle(pub u32);

impl NodeHandle {
    #[inline]
    fn slot(self) -> usize {
        self.0 as usize
    }
}

/// What a node is.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    /// A root container.
    Container,
    /// An element with a tag and attributes.
    Element {
        /// Element tag.
        tag: Rc<str>,
        /// Current attributes.
        props: Props,
    },
    /// A text node.
    Text(String),
}

#[derive(Debug)]
struct MemoryNode {
    kind: NodeKind,
    parent: Option<NodeHandle>,
    children: Vec<NodeHandle>,
}

/// Attribute changes for one element: new values, with removed keys mapped
/// to [`Value::Null`].
pub type PropPatch = Vec<(String, Value)>;

/// Counts of host operations since the host was created or the counters
/// were last reset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MutationStats {
    /// Element and text instances created.
    pub created: u32,
    /// Attribute patches applied.
    pub updated: u32,
    /// Text contents replaced.
    pub text_updated: u32,
    /// Nodes appended at the end of a parent.
    pub appended: u32,
    /// Nodes inserted before a sibling.
    pub inserted: u32,
    /// Nodes removed from a parent.
    pub removed: u32,
    /// Commits bracketed by `prepare_for_commit` / `reset_after_commit`.
    pub commits: u32,
}

impl MutationStats {
    /// Appends plus inserts: how many nodes were attached or moved.
    #[must_use]
    pub fn placements(&self) -> u32 {
        self.appended + self.inserted
    }
}

/// A host renderer that keeps its tree in memory.
///
/// Elements may carry a `frame` attribute ([`Value::Rect`]) giving their
/// bounds relative to the nearest framed ancestor; [`hit_test`] uses it to
/// find the node under a point.
///
/// [`hit_test`]: Self::hit_test
#[derive(Debug, Default)]
pub struct MemoryHost {
    nodes: Vec<MemoryNode>,
    stats: MutationStats,
    event_priority: EventPriority,
    in_commit: bool,
}

impl MemoryHost {
    /// Attribute holding an element's bounds.
    pub const FRAME: &'static str = "frame";

    /// Creates an empty host.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a container to mount a root in.
    pub fn create_container(&mut self) -> NodeHandle {
        self.push(NodeKind::Container)
    }

    fn push(&mut self, kind: NodeKind) -> NodeHandle {
        let handle = NodeHandle(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(MemoryNode {
            kind,
            parent: None,
            children: Vec::new(),
        });
        handle
    }

    fn node(&self, handle: NodeHandle) -> Result<&MemoryNode, HostError> {
        self.nodes
            .get(handle.slot())
            .ok_or(HostError::UnknownInstance)
    }

    fn node_mut(&mut self, handle: NodeHandle) -> Result<&mut MemoryNode, HostError> {
        self.nodes
            .get_mut(handle.slot())
            .ok_or(HostError::UnknownInstance)
    }

    // -- inspection ----------------------------------------------------------

    /// Number of nodes ever created, containers included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// What `handle` is.
    #[must_use]
    pub fn kind(&self, handle: NodeHandle) -> Option<&NodeKind> {
        self.nodes.get(handle.slot()).map(|node| &node.kind)
    }

    /// Tag of an element node.
    #[must_use]
    pub fn tag(&self, handle: NodeHandle) -> Option<&str> {
        match self.kind(handle)? {
            NodeKind::Element { tag, .. } => Some(&**tag),
            NodeKind::Container | NodeKind::Text(_) => None,
        }
    }

    /// Attributes of an element node.
    #[must_use]
    pub fn props(&self, handle: NodeHandle) -> Option<&Props> {
        match self.kind(handle)? {
            NodeKind::Element { props, .. } => Some(props),
            NodeKind::Container | NodeKind::Text(_) => None,
        }
    }

    /// Attached parent of `handle`.
    #[must_use]
    pub fn parent(&self, handle: NodeHandle) -> Option<NodeHandle> {
        self.nodes.get(handle.slot())?.parent
    }

    /// Children of `handle` in order.
    #[must_use]
    pub fn children(&self, handle: NodeHandle) -> &[NodeHandle] {
        match self.nodes.get(handle.slot()) {
            Some(node) => &node.children,
            None => &[],
        }
    }

    /// Concatenated text of every text node below `handle`.
    #[must_use]
    pub fn text_content(&self, handle: NodeHandle) -> String {
        let mut out = String::new();
        let mut stack = alloc::vec![handle];
        while let Some(next) = stack.pop() {
            let Some(node) = self.nodes.get(next.slot()) else {
                continue;
            };
            if let NodeKind::Text(text) = &node.kind {
                out.push_str(text);
            }
            stack.extend(node.children.iter().rev());
        }
        out
    }

    /// Serializes the children of `handle` as markup, e.g.
    /// `<ul><li key="a">x</li></ul>`. Attributes are written in key order.
    #[must_use]
    pub fn to_markup(&self, handle: NodeHandle) -> String {
        let mut out = String::new();
        for &child in self.children(handle) {
            self.write_markup(child, &mut out);
        }
        out
    }

    fn write_markup(&self, handle: NodeHandle, out: &mut String) {
        let Some(node) = self.nodes.get(handle.slot()) else {
            return;
        };
        match &node.kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Container => {
                for &child in &node.children {
                    self.write_markup(child, out);
                }
            }
            NodeKind::Element { tag, props } => {
                let _ = write!(out, "<{tag}");
                for (key, value) in props {
                    let _ = write!(out, " {key}={value}");
                }
                out.push('>');
                for &child in &node.children {
                    self.write_markup(child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }

    /// Elements below `root` whose attribute `key` equals `value`, in
    /// document order.
    #[must_use]
    pub fn find_all(&self, root: NodeHandle, key: &str, value: &Value) -> Vec<NodeHandle> {
        let mut found = Vec::new();
        let mut stack: Vec<NodeHandle> = self.children(root).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            if self.props(next).and_then(|props| props.get(key)) == Some(value) {
                found.push(next);
            }
            stack.extend(self.children(next).iter().rev());
        }
        found
    }

    /// Absolute bounds of a framed element: its `frame` offset by the
    /// origins of its framed ancestors.
    #[must_use]
    pub fn absolute_frame(&self, handle: NodeHandle) -> Option<Rect> {
        let frame = self.frame(handle)?;
        let mut offset = Vec2::ZERO;
        let mut cursor = self.parent(handle);
        while let Some(ancestor) = cursor {
            if let Some(outer) = self.frame(ancestor) {
                offset += outer.origin().to_vec2();
            }
            cursor = self.parent(ancestor);
        }
        Some(frame + offset)
    }

    fn frame(&self, handle: NodeHandle) -> Option<Rect> {
        self.props(handle)?.get(Self::FRAME)?.as_rect()
    }

    /// The topmost framed element under `point` in the tree of `root`.
    ///
    /// Later siblings paint over earlier ones, so they are tested first.
    /// Children of a framed element are only tested inside its bounds.
    #[must_use]
    pub fn hit_test(&self, root: NodeHandle, point: Point) -> Option<NodeHandle> {
        self.hit_test_children(root, point, Vec2::ZERO)
    }

    fn hit_test_children(&self, parent: NodeHandle, point: Point, origin: Vec2) -> Option<NodeHandle> {
        for &child in self.children(parent).iter().rev() {
            match self.frame(child) {
                Some(frame) => {
                    let bounds = frame + origin;
                    if !bounds.contains(point) {
                        continue;
                    }
                    let inner = origin + frame.origin().to_vec2();
                    return Some(self.hit_test_children(child, point, inner).unwrap_or(child));
                }
                None => {
                    if let Some(hit) = self.hit_test_children(child, point, origin) {
                        return Some(hit);
                    }
                }
            }
        }
        None
    }

    // -- host loop -----------------------------------------------------------

    /// Operation counters.
    #[must_use]
    pub fn stats(&self) -> MutationStats {
        self.stats
    }

    /// Zeroes the operation counters.
    pub fn reset_stats(&mut self) {
        self.stats = MutationStats::default();
    }

    /// Sets the priority reported for the event being dispatched.
    pub fn set_event_priority(&mut self, priority: EventPriority) {
        self.event_priority = priority;
    }

    // -- mutation helpers ----------------------------------------------------

    fn detach(&mut self, child: NodeHandle) {
        let Some(parent) = self.parent(child) else {
            return;
        };
        if let Ok(parent) = self.node_mut(parent) {
            parent.children.retain(|&c| c != child);
        }
        if let Ok(child) = self.node_mut(child) {
            child.parent = None;
        }
    }

    /// Fails when `child` is `parent` or one of its ancestors.
    fn check_not_ancestor(&self, parent: NodeHandle, child: NodeHandle) -> Result<(), HostError> {
        let mut cursor = Some(parent);
        while let Some(node) = cursor {
            if node == child {
                return Err(HostError::Other("cannot attach a node inside itself".to_string()));
            }
            cursor = self.parent(node);
        }
        Ok(())
    }

    fn check_parent(&self, parent: NodeHandle) -> Result<(), HostError> {
        match self.node(parent)?.kind {
            NodeKind::Text(_) => Err(HostError::Other("text nodes have no children".to_string())),
            NodeKind::Container | NodeKind::Element { .. } => Ok(()),
        }
    }
}

impl HostConfig for MemoryHost {
    type Instance = NodeHandle;
    type UpdatePayload = PropPatch;

    fn create_instance(&mut self, tag: &str, props: &Props) -> NodeHandle {
        self.stats.created += 1;
        self.push(NodeKind::Element {
            tag: Rc::from(tag),
            props: props.clone(),
        })
    }

    fn create_text_instance(&mut self, text: &str) -> NodeHandle {
        self.stats.created += 1;
        self.push(NodeKind::Text(text.to_string()))
    }

    fn append_initial_child(&mut self, parent: &NodeHandle, child: &NodeHandle) {
        if let Ok(node) = self.node_mut(*parent) {
            node.children.push(*child);
        }
        if let Ok(node) = self.node_mut(*child) {
            node.parent = Some(*parent);
        }
    }

    fn prepare_update(
        &mut self,
        _instance: &NodeHandle,
        _tag: &str,
        old_props: &Props,
        new_props: &Props,
    ) -> Option<PropPatch> {
        let patch = old_props.diff(new_props);
        (!patch.is_empty()).then_some(patch)
    }

    fn commit_update(
        &mut self,
        instance: &NodeHandle,
        payload: &PropPatch,
        _tag: &str,
        _new_props: &Props,
    ) -> Result<(), HostError> {
        let NodeKind::Element { props, .. } = &mut self.node_mut(*instance)?.kind else {
            return Err(HostError::Other("attribute update on a non-element".to_string()));
        };
        for (key, value) in payload {
            if *value == Value::Null {
                props.remove(key);
            } else {
                props.set(key.clone(), value.clone());
            }
        }
        self.stats.updated += 1;
        Ok(())
    }

    fn commit_text_update(
        &mut self,
        instance: &NodeHandle,
        _old_text: &str,
        new_text: &str,
    ) -> Result<(), HostError> {
        let NodeKind::Text(text) = &mut self.node_mut(*instance)?.kind else {
            return Err(HostError::Other("text update on a non-text node".to_string()));
        };
        text.clear();
        text.push_str(new_text);
        self.stats.text_updated += 1;
        Ok(())
    }

    fn append_child(&mut self, parent: &NodeHandle, child: &NodeHandle) -> Result<(), HostError> {
        self.check_parent(*parent)?;
        self.node(*child)?;
        self.check_not_ancestor(*parent, *child)?;
        self.detach(*child);
        self.node_mut(*parent)?.children.push(*child);
        self.node_mut(*child)?.parent = Some(*parent);
        self.stats.appended += 1;
        Ok(())
    }

    fn insert_before(
        &mut self,
        parent: &NodeHandle,
        child: &NodeHandle,
        before: &NodeHandle,
    ) -> Result<(), HostError> {
        self.check_parent(*parent)?;
        self.node(*child)?;
        if self.parent(*before) != Some(*parent) {
            return Err(HostError::InvalidAnchor);
        }
        self.check_not_ancestor(*parent, *child)?;
        self.detach(*child);
        let siblings = &mut self.node_mut(*parent)?.children;
        let index = siblings
            .iter()
            .position(|c| c == before)
            .ok_or(HostError::InvalidAnchor)?;
        siblings.insert(index, *child);
        self.node_mut(*child)?.parent = Some(*parent);
        self.stats.inserted += 1;
        Ok(())
    }

    fn remove_child(&mut self, parent: &NodeHandle, child: &NodeHandle) -> Result<(), HostError> {
        if self.parent(*child) != Some(*parent) {
            return Err(HostError::NotAChild);
        }
        self.detach(*child);
        self.stats.removed += 1;
        Ok(())
    }

    fn clear_container(&mut self, container: &NodeHandle) -> Result<(), HostError> {
        let children = core::mem::take(&mut self.node_mut(*container)?.children);
        for child in children {
            if let Ok(node) = self.node_mut(child) {
                node.parent = None;
            }
        }
        Ok(())
    }

    fn prepare_for_commit(&mut self, _container: &NodeHandle) {
        debug_assert!(!self.in_commit, "commits do not nest");
        self.in_commit = true;
    }

    fn reset_after_commit(&mut self, _container: &NodeHandle) {
        self.in_commit = false;
        self.stats.commits += 1;
    }

    fn current_event_priority(&self) -> EventPriority {
        self.event_priority
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(host: &mut MemoryHost, tag: &str) -> NodeHandle {
        host.create_instance(tag, &Props::new())
    }

    #[test]
    fn append_moves_an_attached_child() {
        let mut host = MemoryHost::new();
        let root = host.create_container();
        let a = element(&mut host, "a");
        let b = element(&mut host, "b");
        host.append_child(&root, &a).unwrap();
        host.append_child(&root, &b).unwrap();
        host.append_child(&root, &a).unwrap();
        assert_eq!(host.children(root), [b, a]);
        assert_eq!(host.stats().appended, 3);
    }

    #[test]
    fn insert_before_requires_an_attached_anchor() {
        let mut host = MemoryHost::new();
        let root = host.create_container();
        let a = element(&mut host, "a");
        let b = element(&mut host, "b");
        host.append_child(&root, &a).unwrap();
        assert_eq!(host.insert_before(&root, &b, &b), Err(HostError::InvalidAnchor));
        host.insert_before(&root, &b, &a).unwrap();
        assert_eq!(host.to_markup(root), "<b></b><a></a>");
    }

    #[test]
    fn cycles_are_rejected() {
        let mut host = MemoryHost::new();
        let root = host.create_container();
        let outer = element(&mut host, "outer");
        let inner = element(&mut host, "inner");
        host.append_child(&root, &outer).unwrap();
        host.append_child(&outer, &inner).unwrap();
        assert!(matches!(
            host.append_child(&inner, &outer),
            Err(HostError::Other(_))
        ));
        assert_eq!(host.to_markup(root), "<outer><inner></inner></outer>");
    }

    #[test]
    fn removing_a_stranger_fails() {
        let mut host = MemoryHost::new();
        let root = host.create_container();
        let a = element(&mut host, "a");
        assert_eq!(host.remove_child(&root, &a), Err(HostError::NotAChild));
        assert_eq!(
            host.remove_child(&root, &NodeHandle(99)),
            Err(HostError::NotAChild)
        );
    }

    #[test]
    fn patches_set_and_remove_attributes() {
        let mut host = MemoryHost::new();
        let old = Props::new().with("a", 1_i64).with("b", "x");
        let new = Props::new().with("a", 2_i64);
        let node = host.create_instance("div", &old);
        let patch = host.prepare_update(&node, "div", &old, &new).unwrap();
        host.commit_update(&node, &patch, "div", &new).unwrap();
        assert_eq!(host.props(node), Some(&new));
        assert!(host.prepare_update(&node, "div", &new, &new).is_none());
    }

    #[test]
    fn text_update_rejects_elements() {
        let mut host = MemoryHost::new();
        let text = host.create_text_instance("old");
        let div = element(&mut host, "div");
        host.commit_text_update(&text, "old", "new").unwrap();
        assert_eq!(host.kind(text), Some(&NodeKind::Text("new".to_string())));
        assert!(host.commit_text_update(&div, "", "x").is_err());
    }

    #[test]
    fn hit_test_prefers_later_siblings_and_nests() {
        let mut host = MemoryHost::new();
        let root = host.create_container();
        let back = host.create_instance(
            "panel",
            &Props::new().with(MemoryHost::FRAME, Rect::new(0.0, 0.0, 100.0, 100.0)),
        );
        let front = host.create_instance(
            "panel",
            &Props::new().with(MemoryHost::FRAME, Rect::new(50.0, 50.0, 150.0, 150.0)),
        );
        let button = host.create_instance(
            "button",
            &Props::new().with(MemoryHost::FRAME, Rect::new(10.0, 10.0, 20.0, 20.0)),
        );
        host.append_child(&root, &back).unwrap();
        host.append_child(&root, &front).unwrap();
        host.append_child(&front, &button).unwrap();

        assert_eq!(host.hit_test(root, Point::new(5.0, 5.0)), Some(back));
        assert_eq!(host.hit_test(root, Point::new(75.0, 75.0)), Some(front));
        assert_eq!(host.hit_test(root, Point::new(65.0, 65.0)), Some(button));
        assert_eq!(host.hit_test(root, Point::new(500.0, 5.0)), None);
        assert_eq!(
            host.absolute_frame(button),
            Some(Rect::new(60.0, 60.0, 70.0, 70.0))
        );
    }

    #[test]
    fn markup_and_text_content() {
        let mut host = MemoryHost::new();
        let root = host.create_container();
        let ul = host.create_instance("ul", &Props::new().with("class", "list"));
        let hello = host.create_text_instance("hello ");
        let world = host.create_text_instance("world");
        host.append_initial_child(&ul, &hello);
        host.append_initial_child(&ul, &world);
        host.append_child(&root, &ul).unwrap();
        assert_eq!(host.to_markup(root), "<ul class=\"list\">hello world</ul>");
        assert_eq!(host.text_content(root), "hello world");
        assert_eq!(
            host.find_all(root, "class", &Value::from("list")),
            [ul]
        );
    }
}
