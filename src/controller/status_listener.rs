use crate::datastore::MemberAddress;
use tokio::sync::watch;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ClusterLifecycle {
    NotInitialized,
    Initializing,
    Running,
    /// The first member failed to initialize the replica set. Nothing retries this; an
    /// operator has to step in.
    OnFire,
    Stopped,
}

/// ClusterStatus is what the controller publishes about the replica set.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClusterStatus {
    pub lifecycle: ClusterLifecycle,
    pub primary: Option<MemberAddress>,
}

impl ClusterStatus {
    pub fn service_up(&self) -> bool {
        self.lifecycle == ClusterLifecycle::Running
    }
}

pub(super) fn new(initial_status: ClusterStatus) -> (ClusterStatusNotifier, ClusterStatusListener) {
    let (snd, rcv) = watch::channel(initial_status);

    (ClusterStatusNotifier { snd }, ClusterStatusListener { rcv })
}

pub(super) struct ClusterStatusNotifier {
    snd: watch::Sender<ClusterStatus>,
}

impl ClusterStatusNotifier {
    pub(super) fn update<F: FnOnce(&mut ClusterStatus)>(&self, modify: F) {
        self.snd.send_modify(modify);
    }

    pub(super) fn current(&self) -> ClusterStatus {
        self.snd.borrow().clone()
    }
}

/// ClusterStatusListener observes status changes. Like any watch, intermediate states between
/// two calls to `next()` are collapsed into the latest one.
#[derive(Clone)]
pub struct ClusterStatusListener {
    rcv: watch::Receiver<ClusterStatus>,
}

impl ClusterStatusListener {
    pub async fn next(&mut self) -> Option<ClusterStatus> {
        match self.rcv.changed().await {
            Ok(_) => Some(self.rcv.borrow().clone()),
            Err(_) => None,
        }
    }

    pub fn current(&self) -> ClusterStatus {
        self.rcv.borrow().clone()
    }
}
