// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Element descriptions.
//!
//! An [`Element`] is an immutable description of what a tree position should
//! contain. Applications produce a fresh element tree for every render; the
//! reconciler compares it against the committed work nodes.
//!
//! Elements are reference counted. Reusing the same `Rc` for an unchanged
//! subtree lets the work loop skip it by pointer identity.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::fmt;

use crate::component::{ClassComponent, FunctionComponent, Ref};
use crate::props::{Props, Value};

/// Reconciliation key of an element among its siblings.
pub type Key = Rc<str>;

/// What kind of node an element describes.
#[derive(Clone)]
pub enum ElementType {
    /// A host element with the given tag.
    Host(Rc<str>),
    /// A stateless render function.
    Function(FunctionComponent),
    /// A stateful component with lifecycle methods.
    Class(ClassComponent),
}

impl ElementType {
    /// Returns `true` if two types describe the same kind of node.
    ///
    /// Host tags compare by value; components compare by identity.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Host(a), Self::Host(b)) => a == b,
            (Self::Function(a), Self::Function(b)) => a.ptr_eq(b),
            (Self::Class(a), Self::Class(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Display name: the host tag or the component name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Host(tag) => tag,
            Self::Function(f) => f.name(),
            Self::Class(c) => c.name(),
        }
    }
}

impl fmt::Debug for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host(tag) => write!(f, "Host({tag})"),
            Self::Function(c) => write!(f, "Function({})", c.name()),
            Self::Class(c) => write!(f, "Class({})", c.name()),
        }
    }
}

impl From<FunctionComponent> for ElementType {
    fn from(value: FunctionComponent) -> Self {
        Self::Function(value)
    }
}

impl From<ClassComponent> for ElementType {
    fn from(value: ClassComponent) -> Self {
        Self::Class(value)
    }
}

/// A host or component node description.
pub struct NodeElement {
    /// What to create.
    pub element_type: ElementType,
    /// Key among siblings.
    pub key: Option<Key>,
    /// Attributes (host) or inputs (component).
    pub props: Props,
    /// Child description.
    pub children: Element,
    /// Ref to attach to the created instance.
    pub node_ref: Option<Ref>,
}

impl fmt::Debug for NodeElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeElement")
            .field("type", &self.element_type)
            .field("key", &self.key)
            .field("props", &self.props)
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}

/// A group of children without a host node of its own.
#[derive(Debug)]
pub struct FragmentElement {
    /// Key among siblings.
    pub key: Option<Key>,
    /// The grouped children.
    pub children: Element,
}

/// A description of one tree position.
#[derive(Clone, Default)]
pub enum Element {
    /// Nothing.
    #[default]
    Empty,
    /// A text node.
    Text(Rc<str>),
    /// A host element or component.
    Node(Rc<NodeElement>),
    /// A fragment; an unkeyed fragment at the top of a child list is
    /// flattened into its children.
    Fragment(Rc<FragmentElement>),
    /// An ordered list of children.
    List(Rc<[Element]>),
}

impl Element {
    /// A text node.
    #[must_use]
    pub fn text(text: impl Into<Rc<str>>) -> Self {
        Self::Text(text.into())
    }

    /// A list of children.
    #[must_use]
    pub fn list(children: impl IntoIterator<Item = Self>) -> Self {
        Self::List(children.into_iter().collect())
    }

    /// An unkeyed fragment.
    #[must_use]
    pub fn fragment(children: impl IntoIterator<Item = Self>) -> Self {
        Self::Fragment(Rc::new(FragmentElement {
            key: None,
            children: Self::list(children),
        }))
    }

    /// A keyed fragment.
    #[must_use]
    pub fn keyed_fragment(key: impl Into<Key>, children: impl IntoIterator<Item = Self>) -> Self {
        Self::Fragment(Rc::new(FragmentElement {
            key: Some(key.into()),
            children: Self::list(children),
        }))
    }

    /// Returns the element's key, if it has one.
    #[must_use]
    pub fn key(&self) -> Option<&Key> {
        match self {
            Self::Node(node) => node.key.as_ref(),
            Self::Fragment(fragment) => fragment.key.as_ref(),
            Self::Empty | Self::Text(_) | Self::List(_) => None,
        }
    }

    /// Returns `true` if both elements are the same allocation (or both
    /// empty). Equal-by-value elements from different renders are not
    /// identical.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Empty, Self::Empty) => true,
            (Self::Text(a), Self::Text(b)) => Rc::ptr_eq(a, b),
            (Self::Node(a), Self::Node(b)) => Rc::ptr_eq(a, b),
            (Self::Fragment(a), Self::Fragment(b)) => Rc::ptr_eq(a, b),
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Returns `true` for [`Element::Empty`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Text(text) => write!(f, "Text({text:?})"),
            Self::Node(node) => {
                let mut t = f.debug_tuple(node.element_type.name());
                if let Some(key) = &node.key {
                    t.field(key);
                }
                if !node.children.is_empty() {
                    t.field(&node.children);
                }
                t.finish()
            }
            Self::Fragment(fragment) => f
                .debug_struct("Fragment")
                .field("key", &fragment.key)
                .field("children", &fragment.children)
                .finish(),
            Self::List(items) => f.debug_list().entries(items.iter()).finish(),
        }
    }
}

impl From<&str> for Element {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl From<NodeBuilder> for Element {
    fn from(builder: NodeBuilder) -> Self {
        builder.build()
    }
}

impl<T: Into<Self>> From<Option<T>> for Element {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Empty, Into::into)
    }
}

/// Builder for [`NodeElement`]s.
#[must_use = "call `build` or convert into an `Element`"]
pub struct NodeBuilder {
    element_type: ElementType,
    key: Option<Key>,
    props: Props,
    children: Vec<Element>,
    node_ref: Option<Ref>,
}

impl fmt::Debug for NodeBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeBuilder")
            .field("type", &self.element_type)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Starts a host element with `tag`.
pub fn host(tag: impl Into<Rc<str>>) -> NodeBuilder {
    NodeBuilder::new(ElementType::Host(tag.into()))
}

/// Starts a component element.
///
/// Component identity is the allocation: create a component once and reuse
/// it across renders, or every render remounts the subtree.
pub fn component(element_type: impl Into<ElementType>) -> NodeBuilder {
    NodeBuilder::new(element_type.into())
}

impl NodeBuilder {
    /// Starts an element of the given type.
    pub fn new(element_type: ElementType) -> Self {
        Self {
            element_type,
            key: None,
            props: Props::new(),
            children: Vec::new(),
            node_ref: None,
        }
    }

    /// Sets the key.
    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets one attribute.
    pub fn prop(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.props.set(key, value);
        self
    }

    /// Spreads `props` over the attributes set so far.
    pub fn props(mut self, props: &Props) -> Self {
        self.props.spread(props);
        self
    }

    /// Appends a child.
    pub fn child(mut self, child: impl Into<Element>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Appends several children.
    pub fn children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
        self.children.extend(children);
        self
    }

    /// Attaches a ref.
    pub fn with_ref(mut self, node_ref: &Ref) -> Self {
        self.node_ref = Some(node_ref.clone());
        self
    }

    /// Finishes the element.
    ///
    /// A single child is stored as-is; several become an
    /// [`Element::List`].
    #[must_use]
    pub fn build(self) -> Element {
        let mut children = self.children;
        let children = match children.len() {
            0 => Element::Empty,
            1 => children.pop().unwrap_or_default(),
            _ => Element::List(children.into()),
        };
        Element::Node(Rc::new(NodeElement {
            element_type: self.element_type,
            key: self.key,
            props: self.props,
            children,
            node_ref: self.node_ref,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Poll;

    #[test]
    fn builder_collapses_single_child() {
        let el = host("row").child("hello").build();
        let Element::Node(node) = el else {
            panic!("expected node");
        };
        assert!(matches!(node.children, Element::Text(_)));

        let el = host("row").child("a").child("b").build();
        let Element::Node(node) = el else {
            panic!("expected node");
        };
        assert!(matches!(&node.children, Element::List(items) if items.len() == 2));
    }

    #[test]
    fn identity_is_by_allocation() {
        let a = host("box").key("1").build();
        let b = host("box").key("1").build();
        assert!(a.ptr_eq(&a.clone()));
        assert!(!a.ptr_eq(&b));
        assert!(Element::Empty.ptr_eq(&Element::Empty));
        assert_eq!(a.key().map(|k| &**k), Some("1"));
    }

    #[test]
    fn element_types_compare() {
        let f = FunctionComponent::new("F", |_, _| Ok(Poll::Ready(Element::Empty)));
        let g = FunctionComponent::new("F", |_, _| Ok(Poll::Ready(Element::Empty)));
        assert!(ElementType::from(f.clone()).same_as(&ElementType::from(f)));
        assert!(!ElementType::from(g).same_as(&ElementType::Host("F".into())));
        assert!(ElementType::Host("a".into()).same_as(&ElementType::Host("a".into())));
    }

    #[test]
    fn builder_spreads_props_safely() {
        let extra = Props::new().with("__proto__", 1).with("w", 3);
        let Element::Node(node) = host("box").prop("w", 1).props(&extra).build() else {
            panic!("expected node");
        };
        assert_eq!(node.props.get("w"), Some(&Value::Int(3)));
        assert!(!node.props.contains("__proto__"));
    }
}
