//! Message allocation policies
//!
//! Message construction always yields a [`MsgPtr`] owning handle. Two
//! policies exist behind it: plain dynamic allocation, and a pooled
//! mode that allows at most one live instance per message kind. The
//! pool tracks liveness in a used-mask; a second allocation of an
//! already live kind reports [`Error::MsgAllocFailure`] until the
//! first handle is dropped.
//!
//! The used-mask is interior-mutable and deliberately not thread-safe;
//! a pool belongs to one protocol stack and one thread.

use core::cell::Cell;
use core::fmt;
use core::ops::{Deref, DerefMut};
use std::rc::Rc;

use crate::error::{Error, Result};

/// Upper bound on distinct kinds a single pool can track.
pub const MAX_POOL_KINDS: usize = 64;

/// Owning handle to an allocated message.
pub struct MsgPtr<M> {
    msg: Box<M>,
    slot: Option<PoolSlot>,
}

impl<M> MsgPtr<M> {
    fn new(msg: M, slot: Option<PoolSlot>) -> Self {
        Self {
            msg: Box::new(msg),
            slot,
        }
    }

    /// Take the message out of the handle, releasing any pool slot.
    pub fn into_inner(self) -> M {
        let MsgPtr { msg, slot } = self;
        drop(slot);
        *msg
    }
}

impl<M> Deref for MsgPtr<M> {
    type Target = M;

    fn deref(&self) -> &M {
        &self.msg
    }
}

impl<M> DerefMut for MsgPtr<M> {
    fn deref_mut(&mut self) -> &mut M {
        &mut self.msg
    }
}

impl<M: fmt::Debug> fmt::Debug for MsgPtr<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.msg, f)
    }
}

/// Claim on a pool's used-mask, released on drop.
struct PoolSlot {
    mask: Rc<Cell<u64>>,
    bit: u32,
}

impl Drop for PoolSlot {
    fn drop(&mut self) {
        self.mask.set(self.mask.get() & !(1u64 << self.bit));
    }
}

/// Liveness tracker shared by all handles of one pool.
#[derive(Clone, Default)]
pub struct PoolState {
    mask: Rc<Cell<u64>>,
}

impl PoolState {
    /// Fresh pool with every kind slot free.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a live instance of the kind exists.
    pub fn in_use(&self, kind: usize) -> bool {
        kind < MAX_POOL_KINDS && self.mask.get() & (1u64 << kind) != 0
    }

    fn try_claim(&self, kind: usize) -> Result<PoolSlot> {
        if kind >= MAX_POOL_KINDS {
            return Err(Error::MsgAllocFailure);
        }
        let bit = 1u64 << kind;
        if self.mask.get() & bit != 0 {
            return Err(Error::MsgAllocFailure);
        }
        self.mask.set(self.mask.get() | bit);
        Ok(PoolSlot {
            mask: Rc::clone(&self.mask),
            bit: kind as u32,
        })
    }
}

impl fmt::Debug for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolState")
            .field("used_mask", &format_args!("{:#018x}", self.mask.get()))
            .finish()
    }
}

/// How message kinds are allocated.
#[derive(Debug, Clone, Default)]
pub enum AllocPolicy {
    /// Every allocation returns a fresh heap-owning handle.
    #[default]
    Dynamic,
    /// At most one live instance per kind, tracked by the pool's
    /// used-mask.
    Pooled(PoolState),
}

impl AllocPolicy {
    /// Allocate a message of the given kind index.
    pub(crate) fn alloc<M>(&self, kind: usize, make: &dyn Fn() -> M) -> Result<MsgPtr<M>> {
        match self {
            AllocPolicy::Dynamic => Ok(MsgPtr::new(make(), None)),
            AllocPolicy::Pooled(state) => {
                let slot = state.try_claim(kind)?;
                Ok(MsgPtr::new(make(), Some(slot)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_allocations_are_independent() {
        let policy = AllocPolicy::Dynamic;
        let a = policy.alloc(0, &|| 1u32).unwrap();
        let b = policy.alloc(0, &|| 2u32).unwrap();
        assert_eq!((*a, *b), (1, 2));
    }

    #[test]
    fn pool_allows_one_live_instance_per_kind() {
        let state = PoolState::new();
        let policy = AllocPolicy::Pooled(state.clone());

        let first = policy.alloc(3, &|| "msg").unwrap();
        assert!(state.in_use(3));
        assert_eq!(
            policy.alloc(3, &|| "msg").map(|p| *p),
            Err(Error::MsgAllocFailure)
        );

        // a different kind is unaffected
        let other = policy.alloc(4, &|| "other").unwrap();
        assert_eq!(*other, "other");

        drop(first);
        assert!(!state.in_use(3));
        let again = policy.alloc(3, &|| "msg").unwrap();
        assert_eq!(*again, "msg");
    }

    #[test]
    fn kind_index_beyond_mask_fails() {
        let policy = AllocPolicy::Pooled(PoolState::new());
        assert!(policy.alloc(MAX_POOL_KINDS, &|| ()).is_err());
    }

    #[test]
    fn into_inner_releases_slot() {
        let state = PoolState::new();
        let policy = AllocPolicy::Pooled(state.clone());

        let handle = policy.alloc(0, &|| 42u8).unwrap();
        assert_eq!(handle.into_inner(), 42);
        assert!(!state.in_use(0));
    }
}
