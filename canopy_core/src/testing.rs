// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Test support: a recording host and helpers shared by unit tests.

use alloc::format;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cell::RefCell;

use crate::error::HostError;
use crate::host::HostConfig;
use crate::props::{Props, Value};

#[derive(Debug)]
struct TestNode {
    /// `None` for text nodes.
    tag: Option<String>,
    text: String,
    props: Props,
    children: Vec<u32>,
    parent: Option<u32>,
}

/// Host whose instances are indices into a node table. Every mutation is
/// logged to `ops`.
#[derive(Debug, Default)]
pub(crate) struct TestHost {
    nodes: Vec<TestNode>,
    pub(crate) ops: Vec<String>,
    /// When set, `remove_child` fails for this instance.
    pub(crate) fail_removal_of: Option<u32>,
    /// When set, `append_child` and `insert_before` panic.
    pub(crate) panic_on_placement: bool,
    /// True between `prepare_for_commit` and `reset_after_commit`.
    pub(crate) committing: bool,
}

impl TestHost {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Creates a container instance for a root.
    pub(crate) fn container(&mut self) -> u32 {
        self.push(Some("#root".to_string()), String::new(), Props::new())
    }

    fn push(&mut self, tag: Option<String>, text: String, props: Props) -> u32 {
        let id = u32::try_from(self.nodes.len()).expect("too many test nodes");
        self.nodes.push(TestNode {
            tag,
            text,
            props,
            children: Vec::new(),
            parent: None,
        });
        id
    }

    fn node_mut(&mut self, id: u32) -> Result<&mut TestNode, HostError> {
        self.nodes
            .get_mut(id as usize)
            .ok_or(HostError::UnknownInstance)
    }

    fn detach(&mut self, child: u32) {
        let Some(parent) = self.nodes.get(child as usize).and_then(|n| n.parent) else {
            return;
        };
        if let Ok(parent) = self.node_mut(parent) {
            parent.children.retain(|&c| c != child);
        }
        if let Ok(child) = self.node_mut(child) {
            child.parent = None;
        }
    }

    /// Serializes the children of `id`, e.g. `<div id=1>text<br></br></div>`.
    pub(crate) fn render(&self, id: u32) -> String {
        let mut out = String::new();
        if let Some(node) = self.nodes.get(id as usize) {
            for &child in &node.children {
                self.render_node(child, &mut out);
            }
        }
        out
    }

    fn render_node(&self, id: u32, out: &mut String) {
        let Some(node) = self.nodes.get(id as usize) else {
            return;
        };
        let Some(tag) = &node.tag else {
            out.push_str(&node.text);
            return;
        };
        out.push('<');
        out.push_str(tag);
        for (key, value) in &node.props {
            out.push_str(&format!(" {key}={}", format_value(value)));
        }
        out.push('>');
        for &child in &node.children {
            self.render_node(child, out);
        }
        out.push_str(&format!("</{tag}>"));
    }

    /// Number of logged operations starting with `kind`.
    pub(crate) fn count(&self, kind: &str) -> usize {
        self.ops.iter().filter(|op| op.starts_with(kind)).count()
    }

    pub(crate) fn clear_ops(&mut self) {
        self.ops.clear();
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Str(s) => s.to_string(),
        other => format!("{other:?}"),
    }
}

impl HostConfig for TestHost {
    type Instance = u32;
    type UpdatePayload = Vec<(String, Value)>;

    fn create_instance(&mut self, tag: &str, props: &Props) -> u32 {
        let id = self.push(Some(tag.to_string()), String::new(), props.clone());
        self.ops.push(format!("create {tag} {id}"));
        id
    }

    fn create_text_instance(&mut self, text: &str) -> u32 {
        let id = self.push(None, text.to_string(), Props::new());
        self.ops.push(format!("create #text {id}"));
        id
    }

    fn append_initial_child(&mut self, parent: &u32, child: &u32) {
        if let Ok(node) = self.node_mut(*parent) {
            node.children.push(*child);
        }
        if let Ok(node) = self.node_mut(*child) {
            node.parent = Some(*parent);
        }
    }

    fn prepare_update(
        &mut self,
        _instance: &u32,
        _tag: &str,
        old_props: &Props,
        new_props: &Props,
    ) -> Option<Vec<(String, Value)>> {
        let diff = old_props.diff(new_props);
        (!diff.is_empty()).then_some(diff)
    }

    fn commit_update(
        &mut self,
        instance: &u32,
        payload: &Vec<(String, Value)>,
        _tag: &str,
        _new_props: &Props,
    ) -> Result<(), HostError> {
        let node = self.node_mut(*instance)?;
        for (key, value) in payload {
            if *value == Value::Null {
                node.props.remove(key);
            } else {
                node.props.set(key.clone(), value.clone());
            }
        }
        self.ops.push(format!("update {instance}"));
        Ok(())
    }

    fn commit_text_update(&mut self, instance: &u32, _old: &str, new: &str) -> Result<(), HostError> {
        self.node_mut(*instance)?.text = new.to_string();
        self.ops.push(format!("text {instance} {new}"));
        Ok(())
    }

    fn append_child(&mut self, parent: &u32, child: &u32) -> Result<(), HostError> {
        assert!(!self.panic_on_placement, "placement of {child} refused");
        self.node_mut(*child)?;
        self.detach(*child);
        self.node_mut(*parent)?.children.push(*child);
        self.node_mut(*child)?.parent = Some(*parent);
        self.ops.push(format!("append {parent} {child}"));
        Ok(())
    }

    fn insert_before(&mut self, parent: &u32, child: &u32, before: &u32) -> Result<(), HostError> {
        assert!(!self.panic_on_placement, "placement of {child} refused");
        self.node_mut(*child)?;
        self.detach(*child);
        let node = self.node_mut(*parent)?;
        let index = node
            .children
            .iter()
            .position(|c| c == before)
            .ok_or(HostError::InvalidAnchor)?;
        node.children.insert(index, *child);
        self.node_mut(*child)?.parent = Some(*parent);
        self.ops.push(format!("insert {parent} {child} {before}"));
        Ok(())
    }

    fn remove_child(&mut self, parent: &u32, child: &u32) -> Result<(), HostError> {
        if self.fail_removal_of == Some(*child) {
            return Err(HostError::Other("removal refused".to_string()));
        }
        if !self.node_mut(*parent)?.children.contains(child) {
            return Err(HostError::NotAChild);
        }
        self.detach(*child);
        self.ops.push(format!("remove {parent} {child}"));
        Ok(())
    }

    fn prepare_for_commit(&mut self, _container: &u32) {
        self.committing = true;
    }

    fn reset_after_commit(&mut self, _container: &u32) {
        self.committing = false;
    }

    fn clear_container(&mut self, container: &u32) -> Result<(), HostError> {
        let children = core::mem::take(&mut self.node_mut(*container)?.children);
        for child in children {
            if let Ok(node) = self.node_mut(child) {
                node.parent = None;
            }
        }
        Ok(())
    }
}

/// Shared event log for lifecycle assertions.
pub(crate) type Log = Rc<RefCell<Vec<String>>>;

pub(crate) fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

/// Takes the entries logged so far.
pub(crate) fn drain(log: &Log) -> Vec<String> {
    core::mem::take(&mut *log.borrow_mut())
}
