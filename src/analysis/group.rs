//! Cross-file synchronization for group (album) results
//!
//! A [`GroupToken`] is shared by every analyzer of one batch. Each analyzer
//! joins it during initialization and folds its individual result into a
//! shared aggregate when done. Reading the aggregate blocks until every member
//! has either completed or dropped out; a member that dropped out without
//! completing makes the group result unavailable.

use crate::error::{AudioError, Result};
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Default)]
struct Membership {
    joined: usize,
    pending: usize,
    abandoned: bool,
}

#[derive(Default)]
struct GroupState {
    membership: Mutex<Membership>,
    settled: Condvar,
    aggregate: Mutex<Option<Box<dyn Any + Send>>>,
}

/// Shared synchronization object for one batch of grouped files
#[derive(Clone, Default)]
pub struct GroupToken {
    state: Arc<GroupState>,
}

impl GroupToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one more member that must complete before the group result is read
    pub fn join(&self) -> GroupMember {
        let mut membership = self.state.membership.lock();
        membership.joined += 1;
        membership.pending += 1;
        trace!("Group member {} joined", membership.joined);
        GroupMember {
            state: Arc::clone(&self.state),
            completed: false,
        }
    }

    /// Members that joined so far
    pub fn member_count(&self) -> usize {
        self.state.membership.lock().joined
    }

    /// Members that have not yet completed or dropped out
    pub fn pending(&self) -> usize {
        self.state.membership.lock().pending
    }
}

impl fmt::Debug for GroupToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let membership = self.state.membership.lock();
        f.debug_struct("GroupToken")
            .field("joined", &membership.joined)
            .field("pending", &membership.pending)
            .field("abandoned", &membership.abandoned)
            .finish()
    }
}

/// One analyzer's membership in a group
pub struct GroupMember {
    state: Arc<GroupState>,
    completed: bool,
}

impl GroupMember {
    /// Fold this member's contribution into the aggregate and mark it complete
    ///
    /// The aggregate starts as `T::default()`. Completing twice folds nothing.
    pub fn complete<T, F>(&mut self, fold: F) -> Result<()>
    where
        T: Default + Send + 'static,
        F: FnOnce(&mut T),
    {
        if self.completed {
            debug!("Group member completed twice; ignoring second contribution");
            return Ok(());
        }

        {
            let mut slot = self.state.aggregate.lock();
            let aggregate = slot.get_or_insert_with(|| Box::new(T::default()));
            let aggregate = aggregate
                .downcast_mut::<T>()
                .ok_or(AudioError::GroupIncomplete)?;
            fold(aggregate);
        }

        self.completed = true;
        let mut membership = self.state.membership.lock();
        membership.pending -= 1;
        if membership.pending == 0 {
            self.state.settled.notify_all();
        }
        Ok(())
    }

    /// Wait for every member to settle, then read the aggregate
    ///
    /// Blocks while any live member has neither completed nor been dropped;
    /// callers on the analysis path check [`GroupToken::pending`] first.
    pub fn aggregate<T, R, F>(&self, read: F) -> Result<R>
    where
        T: 'static,
        F: FnOnce(&T) -> R,
    {
        {
            let mut membership = self.state.membership.lock();
            while membership.pending > 0 {
                self.state.settled.wait(&mut membership);
            }
            if membership.abandoned {
                return Err(AudioError::GroupIncomplete);
            }
        }

        let slot = self.state.aggregate.lock();
        slot.as_ref()
            .and_then(|aggregate| aggregate.downcast_ref::<T>())
            .map(read)
            .ok_or(AudioError::GroupIncomplete)
    }
}

impl Drop for GroupMember {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        let mut membership = self.state.membership.lock();
        membership.pending -= 1;
        membership.abandoned = true;
        self.state.settled.notify_all();
    }
}
