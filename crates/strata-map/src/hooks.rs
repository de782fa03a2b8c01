//! Callbacks into embedding code.
//!
//! [`MapHooks`] is the Rust side; [`CHooks`] adapts a table of C function
//! pointers so a host written in another language can install hooks without
//! implementing the trait.

use std::ffi::c_void;

use strata_voxel::{ContentId, Node, NodePos};

/// Callbacks the map invokes at fixed points.
pub trait MapHooks: Send {
    /// Called once per freshly generated region, inclusive node bounds.
    ///
    /// Decoration is purely additive: nodes pushed to `placements` are
    /// applied after the region is lit and settled, with edit events for the
    /// region itself suppressed.
    fn on_generated(
        &mut self,
        _min: NodePos,
        _max: NodePos,
        _seed: u64,
        _placements: &mut Vec<(NodePos, Node)>,
    ) {
    }

    /// Called before liquid replaces a floodable node other than air.
    /// Returning `true` cancels the flood.
    fn on_flood(&mut self, _pos: NodePos, _old: Node, _new: Node) -> bool {
        false
    }
}

/// Hooks that do nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoHooks;

impl MapHooks for NoHooks {}

// ---------------------------------------------------------------------------
// C adapter
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CNodePos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl From<NodePos> for CNodePos {
    fn from(p: NodePos) -> Self {
        Self {
            x: p.x,
            y: p.y,
            z: p.z,
        }
    }
}

impl From<CNodePos> for NodePos {
    fn from(p: CNodePos) -> Self {
        NodePos::new(p.x, p.y, p.z)
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CNode {
    pub content: u16,
    pub param1: u8,
    pub param2: u8,
}

impl From<Node> for CNode {
    fn from(n: Node) -> Self {
        Self {
            content: n.content.0,
            param1: n.param1,
            param2: n.param2,
        }
    }
}

impl From<CNode> for Node {
    fn from(n: CNode) -> Self {
        Node::with_params(ContentId(n.content), n.param1, n.param2)
    }
}

/// Adds one decoration node; passed to [`GeneratedCallback`] together with
/// its opaque `place_ctx`.
pub type PlaceNodeFn = unsafe extern "C" fn(place_ctx: *mut c_void, pos: CNodePos, node: CNode);

pub type GeneratedCallback = unsafe extern "C" fn(
    user_data: *mut c_void,
    min: CNodePos,
    max: CNodePos,
    seed: u64,
    place: PlaceNodeFn,
    place_ctx: *mut c_void,
);

pub type FloodCallback =
    unsafe extern "C" fn(user_data: *mut c_void, pos: CNodePos, old: CNode, new: CNode) -> bool;

/// [`MapHooks`] over C function pointers. Missing callbacks behave like
/// [`NoHooks`].
#[derive(Debug)]
pub struct CHooks {
    user_data: *mut c_void,
    on_generated: Option<GeneratedCallback>,
    on_flood: Option<FloodCallback>,
}

// SAFETY: `CHooks::new` requires the callbacks and `user_data` to be usable
// from any thread.
unsafe impl Send for CHooks {}

impl CHooks {
    /// # Safety
    ///
    /// For as long as the hooks are installed, both callbacks must be safe to
    /// call from any thread with `user_data`, and must not unwind.
    pub unsafe fn new(
        user_data: *mut c_void,
        on_generated: Option<GeneratedCallback>,
        on_flood: Option<FloodCallback>,
    ) -> Self {
        Self {
            user_data,
            on_generated,
            on_flood,
        }
    }
}

unsafe extern "C" fn push_placement(place_ctx: *mut c_void, pos: CNodePos, node: CNode) {
    // SAFETY: `place_ctx` is the placement list handed out by
    // `CHooks::on_generated`, which outlives the callback.
    let placements = unsafe { &mut *place_ctx.cast::<Vec<(NodePos, Node)>>() };
    placements.push((pos.into(), node.into()));
}

impl MapHooks for CHooks {
    fn on_generated(
        &mut self,
        min: NodePos,
        max: NodePos,
        seed: u64,
        placements: &mut Vec<(NodePos, Node)>,
    ) {
        if let Some(callback) = self.on_generated {
            let place_ctx = (placements as *mut Vec<(NodePos, Node)>).cast::<c_void>();
            // SAFETY: guaranteed by the contract of `CHooks::new`.
            unsafe {
                callback(
                    self.user_data,
                    min.into(),
                    max.into(),
                    seed,
                    push_placement,
                    place_ctx,
                )
            };
        }
    }

    fn on_flood(&mut self, pos: NodePos, old: Node, new: Node) -> bool {
        match self.on_flood {
            // SAFETY: guaranteed by the contract of `CHooks::new`.
            Some(callback) => unsafe { callback(self.user_data, pos.into(), old.into(), new.into()) },
            None => false,
        }
    }
}
