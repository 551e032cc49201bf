//! This module contains the process tree: the binary fork tree whose leaves
//! are the live execution states.
//!
//! The tree is shared mutable state. The engine alone creates and removes
//! nodes; each random-path searcher additionally owns one tag bit in every
//! child slot, which it uses to mark the slots beneath which its population
//! lives. A slot is *valid* for a searcher exactly when it carries the
//! searcher's bit and actually points at a node.

use std::{
    cell::{Cell, RefCell},
    rc::{Rc, Weak},
};

use crate::{
    constant::PTREE_SLOT_TAG_BITS,
    error::{Error, Result},
    state::StateRef,
};

/// A child slot of a process-tree node: a pointer paired with a small tag
/// in which each random-path searcher owns one bit.
#[derive(Clone, Debug, Default)]
pub struct TaggedSlot {
    node: Option<Rc<PTreeNode>>,
    tag: u8,
}

impl TaggedSlot {
    /// Gets the node the slot points at, if any.
    #[must_use]
    pub fn node(&self) -> Option<&Rc<PTreeNode>> {
        self.node.as_ref()
    }

    /// Gets the slot's tag bits.
    #[must_use]
    pub fn tag(&self) -> u8 {
        self.tag
    }

    /// Whether the slot is valid for the searcher owning `tag_bit`: it must
    /// carry the bit and point at a node.
    #[must_use]
    pub fn is_valid_for(&self, tag_bit: u8) -> bool {
        self.node.is_some() && self.tag & tag_bit != 0
    }

    /// Marks the slot as belonging to the searcher owning `tag_bit`.
    pub fn set_tag_bit(&mut self, tag_bit: u8) {
        self.tag |= tag_bit;
    }

    /// Removes the searcher owning `tag_bit` from the slot.
    pub fn clear_tag_bit(&mut self, tag_bit: u8) {
        self.tag &= !tag_bit;
    }
}

/// A node in the process tree.
///
/// A node carrying a state is a leaf and has no children; a fork point has
/// two children and no state.
#[derive(Debug)]
pub struct PTreeNode {
    parent: RefCell<Weak<PTreeNode>>,
    left: RefCell<TaggedSlot>,
    right: RefCell<TaggedSlot>,
    data: RefCell<Option<StateRef>>,
}

impl PTreeNode {
    /// Constructs a new leaf below `parent` carrying `state`, and points the
    /// state back at its new leaf.
    fn new_leaf(parent: &Weak<PTreeNode>, state: &StateRef) -> Rc<Self> {
        let node = Rc::new(Self {
            parent: RefCell::new(parent.clone()),
            left: RefCell::new(TaggedSlot::default()),
            right: RefCell::new(TaggedSlot::default()),
            data: RefCell::new(Some(state.clone())),
        });
        state.borrow_mut().set_ptree_node(&node);
        node
    }

    /// Gets the node's parent, or [`None`] for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Rc<PTreeNode>> {
        self.parent.borrow().upgrade()
    }

    /// Gets the state carried by the node, if it is currently a leaf with a
    /// live state.
    #[must_use]
    pub fn state(&self) -> Option<StateRef> {
        self.data.borrow().clone()
    }

    /// Gets the node's left child slot.
    #[must_use]
    pub fn left(&self) -> &RefCell<TaggedSlot> {
        &self.left
    }

    /// Gets the node's right child slot.
    #[must_use]
    pub fn right(&self) -> &RefCell<TaggedSlot> {
        &self.right
    }

    /// Whether the node currently has no children.
    #[must_use]
    pub fn is_childless(&self) -> bool {
        self.left.borrow().node().is_none() && self.right.borrow().node().is_none()
    }

    /// Gets the child slot of `self` that points at `child`.
    ///
    /// Callers must only ask about a node that actually is a child of
    /// `self`.
    #[must_use]
    pub fn slot_of(&self, child: &Rc<PTreeNode>) -> &RefCell<TaggedSlot> {
        let is_left = self
            .left
            .borrow()
            .node()
            .map_or(false, |n| Rc::ptr_eq(n, child));
        if is_left {
            &self.left
        } else {
            &self.right
        }
    }
}

/// The process tree itself.
///
/// The root is represented as one more tagged slot rather than a bare
/// pointer: it acts as the sentinel that tells each random-path searcher
/// whether any of its population is reachable at all.
#[derive(Debug)]
pub struct ProcessTree {
    root: RefCell<TaggedSlot>,
    tags_claimed: Cell<u8>,
}

impl ProcessTree {
    /// Constructs a new tree whose root is a leaf carrying `initial`.
    #[must_use]
    pub fn new(initial: &StateRef) -> Rc<Self> {
        let tree = Rc::new(Self {
            root: RefCell::new(TaggedSlot::default()),
            tags_claimed: Cell::new(0),
        });
        let node = PTreeNode::new_leaf(&Weak::new(), initial);
        tree.root.borrow_mut().node = Some(node);
        tree
    }

    /// Gets the sentinel slot pointing at the tree's root node.
    #[must_use]
    pub fn root(&self) -> &RefCell<TaggedSlot> {
        &self.root
    }

    /// Claims one searcher tag bit.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] once all [`PTREE_SLOT_TAG_BITS`] bits are claimed;
    /// slots cannot distinguish more concurrent searchers than they have
    /// tag bits.
    pub fn claim_tag_bit(&self) -> Result<u8> {
        let claimed = self.tags_claimed.get();
        if claimed >= PTREE_SLOT_TAG_BITS {
            return Err(Error::SearcherTagsExhausted {
                available: PTREE_SLOT_TAG_BITS,
            });
        }
        self.tags_claimed.set(claimed + 1);
        Ok(1 << claimed)
    }

    /// Forks the leaf `node`: it loses its state and gains two fresh leaves,
    /// one for the state continuing on the original path and one for the
    /// state `added` by the fork.
    ///
    /// The slot for the continuing state inherits the tag lineage of the
    /// slot that pointed at `node`, so existing searcher populations survive
    /// the fork; the added state's slot starts untagged and is claimed by
    /// the searchers during their next update.
    ///
    /// # Panics
    ///
    /// Panics if `node` is not a leaf carrying a live state.
    pub fn attach(&self, node: &Rc<PTreeNode>, continuing: &StateRef, added: &StateRef) {
        assert!(
            node.is_childless() && node.state().is_some(),
            "fork point is not a live leaf"
        );

        let inherited = match node.parent() {
            Some(parent) => parent.slot_of(node).borrow().tag(),
            None => self.root.borrow().tag(),
        };

        node.data.borrow_mut().take();
        let added_node = PTreeNode::new_leaf(&Rc::downgrade(node), added);
        let continuing_node = PTreeNode::new_leaf(&Rc::downgrade(node), continuing);
        *node.left.borrow_mut() = TaggedSlot {
            node: Some(added_node),
            tag: 0,
        };
        *node.right.borrow_mut() = TaggedSlot {
            node: Some(continuing_node),
            tag: inherited,
        };
    }

    /// Removes the leaf `node` from the tree, pruning upward through any
    /// fork nodes left with no children at all.
    ///
    /// # Panics
    ///
    /// Panics if `node` still has children.
    pub fn remove(&self, node: &Rc<PTreeNode>) {
        assert!(node.is_childless(), "only leaves can be removed");
        node.data.borrow_mut().take();

        let mut node = node.clone();
        loop {
            if !node.is_childless() {
                break;
            }
            let parent = node.parent();
            {
                let slot_cell = match &parent {
                    Some(p) => p.slot_of(&node),
                    None => &self.root,
                };
                *slot_cell.borrow_mut() = TaggedSlot::default();
            }
            match parent {
                Some(p) => node = p,
                None => break,
            }
        }
    }
}
