// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Work node records.

use alloc::rc::Rc;

use crate::component::{ClassInstance, Ref};
use crate::element::{Element, ElementType, Key, NodeElement};
use crate::host::HostConfig;
use crate::lane::Lanes;
use crate::props::{Props, State, Value};
use crate::root::{RootId, RootMode, RootState};
use crate::update_queue::UpdateQueue;

use super::flags::Flags;
use super::id::NodeId;

/// What a work node represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum WorkTag {
    /// The root of a mounted tree.
    HostRoot,
    /// A host element.
    HostElement,
    /// A host text node.
    HostText,
    /// A keyed fragment, or a list nested in a list.
    Fragment,
    /// A stateful component.
    ClassComponent,
    /// A render function.
    FunctionComponent,
}

/// Inputs of a work node.
#[derive(Clone, Debug, Default)]
pub(crate) enum FiberProps {
    /// Not yet assigned (root nodes).
    #[default]
    None,
    /// Host elements and components.
    Element(Rc<NodeElement>),
    /// Text nodes.
    Text(Rc<str>),
    /// Fragments.
    Children(Element),
}

impl FiberProps {
    /// Identity comparison used for bailouts.
    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Element(a), Self::Element(b)) => Rc::ptr_eq(a, b),
            (Self::Text(a), Self::Text(b)) => Rc::ptr_eq(a, b),
            (Self::Children(a), Self::Children(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Attribute map, if the node has one.
    pub(crate) fn props(&self) -> Option<&Props> {
        match self {
            Self::Element(node) => Some(&node.props),
            Self::None | Self::Text(_) | Self::Children(_) => None,
        }
    }

    /// Child description carried by the inputs.
    pub(crate) fn children(&self) -> Element {
        match self {
            Self::Element(node) => node.children.clone(),
            Self::Children(children) => children.clone(),
            Self::None | Self::Text(_) => Element::Empty,
        }
    }

    pub(crate) fn text(&self) -> Option<&Rc<str>> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub(crate) fn node_ref(&self) -> Option<&Ref> {
        match self {
            Self::Element(node) => node.node_ref.as_ref(),
            _ => None,
        }
    }
}

/// Committed local state.
#[derive(Clone, Debug, Default)]
pub(crate) enum MemoizedState {
    #[default]
    None,
    Root(RootState),
    Class(Rc<State>),
}

impl MemoizedState {
    pub(crate) fn class_state(&self) -> Option<&Rc<State>> {
        match self {
            Self::Class(state) => Some(state),
            _ => None,
        }
    }
}

/// Update queue of a stateful node.
#[derive(Clone, Default)]
pub(crate) enum FiberQueue {
    #[default]
    None,
    Root(UpdateQueue<RootState>),
    Class(UpdateQueue<Rc<State>>),
}

/// What a work node owns outside the tree.
pub(crate) enum StateNode<H: HostConfig> {
    None,
    /// Host element or text instance.
    Host(H::Instance),
    /// The root this node heads.
    Root(RootId),
    /// Component instance.
    Class(Rc<ClassInstance>),
}

impl<H: HostConfig> Clone for StateNode<H> {
    fn clone(&self) -> Self {
        match self {
            Self::None => Self::None,
            Self::Host(instance) => Self::Host(instance.clone()),
            Self::Root(root) => Self::Root(*root),
            Self::Class(instance) => Self::Class(Rc::clone(instance)),
        }
    }
}

impl<H: HostConfig> StateNode<H> {
    pub(crate) fn host(&self) -> Option<&H::Instance> {
        match self {
            Self::Host(instance) => Some(instance),
            _ => None,
        }
    }

    pub(crate) fn class(&self) -> Option<&Rc<ClassInstance>> {
        match self {
            Self::Class(instance) => Some(instance),
            _ => None,
        }
    }
}

/// One tree position. Committed nodes and in-progress nodes come in pairs
/// linked through `alternate`.
pub(crate) struct Fiber<H: HostConfig> {
    pub(crate) tag: WorkTag,
    pub(crate) mode: RootMode,
    pub(crate) key: Option<Key>,
    pub(crate) element_type: Option<ElementType>,
    pub(crate) pending_props: FiberProps,
    pub(crate) memoized_props: FiberProps,
    pub(crate) memoized_state: MemoizedState,
    pub(crate) update_queue: FiberQueue,
    pub(crate) state_node: StateNode<H>,

    pub(crate) parent: Option<NodeId>,
    pub(crate) child: Option<NodeId>,
    pub(crate) sibling: Option<NodeId>,
    pub(crate) index: u32,
    pub(crate) node_ref: Option<Ref>,

    pub(crate) lanes: Lanes,
    pub(crate) child_lanes: Lanes,
    pub(crate) flags: Flags,
    /// Length of the effect list when this node's begin phase ran. Unwinding
    /// to an error boundary truncates back to it.
    pub(crate) effect_start: usize,
    pub(crate) alternate: Option<NodeId>,

    /// Prepared host changes, applied by an `UPDATE` effect.
    pub(crate) update_payload: Option<H::UpdatePayload>,
    /// Value captured by `snapshot_before_update`, consumed by `did_update`.
    pub(crate) snapshot: Option<Value>,
}

impl<H: HostConfig> Fiber<H> {
    pub(crate) fn new(tag: WorkTag, pending_props: FiberProps, key: Option<Key>, mode: RootMode) -> Self {
        Self {
            tag,
            mode,
            key,
            element_type: None,
            pending_props,
            memoized_props: FiberProps::None,
            memoized_state: MemoizedState::None,
            update_queue: FiberQueue::None,
            state_node: StateNode::None,
            parent: None,
            child: None,
            sibling: None,
            index: 0,
            node_ref: None,
            lanes: Lanes::NONE,
            child_lanes: Lanes::NONE,
            flags: Flags::empty(),
            effect_start: 0,
            alternate: None,
            update_payload: None,
            snapshot: None,
        }
    }

    /// Creates the work node for an element.
    pub(crate) fn from_element(node: &Rc<NodeElement>, mode: RootMode, lanes: Lanes) -> Self {
        let tag = match node.element_type {
            ElementType::Host(_) => WorkTag::HostElement,
            ElementType::Function(_) => WorkTag::FunctionComponent,
            ElementType::Class(_) => WorkTag::ClassComponent,
        };
        let mut fiber = Self::new(tag, FiberProps::Element(Rc::clone(node)), node.key.clone(), mode);
        fiber.element_type = Some(node.element_type.clone());
        fiber.node_ref = node.node_ref.clone();
        fiber.lanes = lanes;
        fiber
    }

    /// Host tag of a host element.
    pub(crate) fn host_tag(&self) -> Option<&str> {
        match &self.element_type {
            Some(ElementType::Host(tag)) => Some(tag),
            _ => None,
        }
    }

    /// Display name for traces and errors.
    pub(crate) fn name(&self) -> &str {
        match (&self.element_type, self.tag) {
            (Some(ty), _) => ty.name(),
            (None, WorkTag::HostRoot) => "#root",
            (None, WorkTag::HostText) => "#text",
            (None, _) => "#fragment",
        }
    }

    /// Returns `true` for nodes that own a host instance.
    pub(crate) fn is_host(&self) -> bool {
        matches!(self.tag, WorkTag::HostElement | WorkTag::HostText)
    }
}
