use crate::controller::member::Member;
use crate::controller::status_listener::{self, ClusterLifecycle, ClusterStatus, ClusterStatusListener, ClusterStatusNotifier};
use crate::datastore::MemberAddress;
use crate::replset::MemberId;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// ClusterState is the controller's view of the replica set. Event handlers (any thread) and
/// the reconciliation worker both read and write it, so every field is atomic on its own.
pub(super) struct ClusterState {
    initialized: AtomicBool,
    primary: Mutex<Option<Member>>,
    // Ids are handed out from here and never handed out twice, even if the add that used
    // one failed.
    next_id: AtomicU64,
    // Bumped by every reset. An initialization only lands in the epoch it started in.
    epoch: AtomicU64,
    notifier: ClusterStatusNotifier,
}

impl ClusterState {
    pub(super) fn new() -> (Self, ClusterStatusListener) {
        let (notifier, listener) = status_listener::new(ClusterStatus {
            lifecycle: ClusterLifecycle::NotInitialized,
            primary: None,
        });

        let state = ClusterState {
            initialized: AtomicBool::new(false),
            primary: Mutex::new(None),
            next_id: AtomicU64::new(0),
            epoch: AtomicU64::new(0),
            notifier,
        };

        (state, listener)
    }

    /// CAS: returns the current epoch for exactly one caller, which must then initialize the
    /// replica set and report back with that epoch.
    pub(super) fn try_begin_initialization(&self) -> Option<u64> {
        let won = self
            .initialized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if !won {
            return None;
        }

        let epoch = self.epoch.load(Ordering::Acquire);
        self.notifier.update(|status| {
            if status.lifecycle == ClusterLifecycle::NotInitialized {
                status.lifecycle = ClusterLifecycle::Initializing;
            }
        });

        Some(epoch)
    }

    /// Applies a successful initialization, unless the controller was stopped or reset while
    /// it was in flight. Returns whether it was applied.
    pub(super) fn initialization_succeeded(&self, epoch: u64, primary: Member) -> bool {
        let address = primary.address().clone();
        let mut applied = false;
        self.notifier.update(|status| {
            if !self.initialization_current(status, epoch) {
                return;
            }
            *self.lock_primary() = Some(primary);
            status.lifecycle = ClusterLifecycle::Running;
            status.primary = Some(address);
            applied = true;
        });

        applied
    }

    /// Same conditions as `initialization_succeeded`.
    pub(super) fn initialization_failed(&self, epoch: u64) -> bool {
        let mut applied = false;
        self.notifier.update(|status| {
            if self.initialization_current(status, epoch) {
                status.lifecycle = ClusterLifecycle::OnFire;
                applied = true;
            }
        });

        applied
    }

    fn initialization_current(&self, status: &ClusterStatus, epoch: u64) -> bool {
        status.lifecycle == ClusterLifecycle::Initializing && self.epoch.load(Ordering::Acquire) == epoch
    }

    pub(super) fn next_member_id(&self) -> MemberId {
        MemberId::new(self.next_id.fetch_add(1, Ordering::AcqRel))
    }

    pub(super) fn primary(&self) -> Option<Member> {
        self.lock_primary().clone()
    }

    pub(super) fn is_primary(&self, address: &MemberAddress) -> bool {
        self.lock_primary()
            .as_ref()
            .map(|primary| primary.address() == address)
            .unwrap_or(false)
    }

    pub(super) fn set_primary(&self, member: Member) {
        let address = member.address().clone();
        *self.lock_primary() = Some(member);
        self.notifier.update(|status| status.primary = Some(address));
    }

    /// Clears the primary iff it is `member`. Returns whether it was cleared.
    pub(super) fn clear_primary_if(&self, member: &Member) -> bool {
        let mut primary = self.lock_primary();
        if primary.as_ref() != Some(member) {
            return false;
        }

        *primary = None;
        drop(primary);
        self.notifier.update(|status| status.primary = None);
        true
    }

    /// Forget that the replica set was ever initialized. The id counter is kept so ids stay
    /// unique across the reset.
    pub(super) fn reset(&self) {
        // Lifecycle, primary and epoch change together so an initialization in flight sees
        // either all of the reset or none of it.
        self.notifier.update(|status| {
            if status.lifecycle == ClusterLifecycle::Stopped {
                return;
            }
            *self.lock_primary() = None;
            self.epoch.fetch_add(1, Ordering::AcqRel);
            status.lifecycle = ClusterLifecycle::NotInitialized;
            status.primary = None;
        });
        self.initialized.store(false, Ordering::Release);
    }

    pub(super) fn stopped(&self) {
        self.notifier
            .update(|status| status.lifecycle = ClusterLifecycle::Stopped);
    }

    pub(super) fn status(&self) -> ClusterStatus {
        self.notifier.current()
    }

    fn lock_primary(&self) -> MutexGuard<'_, Option<Member>> {
        self.primary.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
