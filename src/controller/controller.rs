use crate::controller::admin::ReplicaSetAdmin;
use crate::controller::cluster_state::ClusterState;
use crate::controller::jobs::{ReconcileContext, ReconcileJob};
use crate::controller::member::{Member, MemberRole};
use crate::controller::options::{ControllerOptions, ControllerOptionsValidated};
use crate::controller::status_listener::{ClusterLifecycle, ClusterStatus, ClusterStatusListener};
use crate::controller::worker::{self, WorkerClient};
use crate::server::{self, ShutdownHandle};
use std::convert::TryFrom;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

pub struct ReplicaSetControllerConfig {
    pub replica_set_name: String,
    /// Appended to the name, typically the id of whatever owns the pool, so names are unique.
    pub name_suffix: Option<String>,
    pub logger: slog::Logger,
    pub options: ControllerOptions,
}

#[derive(Debug, thiserror::Error)]
pub enum ControllerCreationError {
    #[error("Illegal options for configuring controller: {0}")]
    IllegalOptions(String),
    #[error("Replica set name is empty")]
    EmptyName,
}

/// MembershipEvents is how the pool tells the controller about its members. Every method returns
/// immediately; the resulting work happens on the controller's worker.
pub trait MembershipEvents {
    fn on_member_added(&self, member: Member);

    /// `member` must be the handle (or a clone of it) that was added. A pending addition of it
    /// is dropped, leaving only its removal.
    fn on_member_removed(&self, member: Member);

    /// Called whenever `member.role()` may have changed.
    fn on_member_role_changed(&self, member: Member);
}

/// Creates the controller and spawns its worker onto the current tokio runtime.
pub fn create_replica_set_controller(
    config: ReplicaSetControllerConfig,
    admin: Arc<dyn ReplicaSetAdmin>,
) -> Result<ReplicaSetController, ControllerCreationError> {
    let options = ControllerOptionsValidated::try_from(config.options)
        .map_err(|e| ControllerCreationError::IllegalOptions(e.to_string()))?;

    let replica_set_name = match config.name_suffix {
        Some(suffix) => format!("{}{}", config.replica_set_name, suffix),
        None => config.replica_set_name,
    };
    if replica_set_name.trim().is_empty() {
        return Err(ControllerCreationError::EmptyName);
    }

    let logger = config
        .logger
        .new(slog::o!("ReplicaSet" => replica_set_name.clone()));
    let (state, status_listener) = ClusterState::new();
    let context = Arc::new(ReconcileContext {
        logger: logger.clone(),
        replica_set_name,
        state,
        admin,
    });

    let (shutdown_handle, shutdown_signal) = server::shutdown_signal();
    let (worker_client, worker) = worker::create(
        logger.clone(),
        context.clone(),
        options.reconcile_retry_delay,
        shutdown_signal,
    );
    tokio::spawn(worker.run_event_loop());

    Ok(ReplicaSetController {
        logger,
        context,
        worker: worker_client,
        shutdown_handle: Mutex::new(Some(shutdown_handle)),
        stopped: AtomicBool::new(false),
        status_listener,
    })
}

/// ReplicaSetController keeps the datastore's replica set membership in line with the pool's.
///
/// The first member ever added initializes the replica set. Every later addition and every
/// removal becomes a job on a single worker, which retries it every few seconds for as long as
/// it takes (the member becoming healthy or unhealthy, a primary becoming known). Initializing
/// is never retried: if it fails the cluster is reported on fire.
pub struct ReplicaSetController {
    logger: slog::Logger,
    context: Arc<ReconcileContext>,
    worker: WorkerClient,
    shutdown_handle: Mutex<Option<ShutdownHandle>>,
    stopped: AtomicBool,
    status_listener: ClusterStatusListener,
}

impl ReplicaSetController {
    pub fn name(&self) -> &str {
        &self.context.replica_set_name
    }

    /// The member believed to be primary. It may be stale.
    pub fn primary(&self) -> Option<Member> {
        self.context.state.primary()
    }

    pub fn is_up(&self) -> bool {
        self.status().service_up()
    }

    pub fn status(&self) -> ClusterStatus {
        self.context.state.status()
    }

    pub fn status_listener(&self) -> ClusterStatusListener {
        self.status_listener.clone()
    }

    /// For when the datastore has been wiped out of band: the next member added initializes a
    /// new replica set. Member ids keep counting from where they were. Jobs already queued stay
    /// queued.
    pub fn reset(&self) {
        if self.is_stopped() {
            slog::debug!(self.logger, "Ignoring reset of stopped controller");
            return;
        }

        self.context.state.reset();
        slog::info!(self.logger, "Reset to not initialized");
    }

    /// Discards every queued and delayed job. A remote call already in progress completes, but
    /// nothing runs after it.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }

        let handle = self
            .shutdown_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(handle);

        self.context.state.stopped();
        slog::info!(self.logger, "Stopped");
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    fn submit(&self, job: ReconcileJob) {
        slog::debug!(self.logger, "Scheduling {:?}", job);
        if !self.worker.submit(job) {
            slog::warn!(self.logger, "Reconcile worker has exited; job dropped");
        }
    }
}

impl MembershipEvents for ReplicaSetController {
    fn on_member_added(&self, member: Member) {
        if self.is_stopped() {
            slog::debug!(self.logger, "Ignoring addition of {} to stopped controller", member);
            return;
        }

        match self.context.state.try_begin_initialization() {
            Some(epoch) => self.submit(ReconcileJob::Initialize { member, epoch }),
            None => self.submit(ReconcileJob::AddMember(member)),
        }
    }

    fn on_member_removed(&self, member: Member) {
        if self.is_stopped() {
            slog::debug!(self.logger, "Ignoring removal of {} from stopped controller", member);
            return;
        }

        // Jobs that already captured this primary notice it's gone before calling it.
        if self.context.state.clear_primary_if(&member) {
            slog::info!(self.logger, "Primary {} removed from pool", member);
        }
        member.mark_removed();
        self.submit(ReconcileJob::RemoveMember(member));
    }

    fn on_member_role_changed(&self, member: Member) {
        if self.is_stopped() {
            slog::debug!(self.logger, "Ignoring role change of {} on stopped controller", member);
            return;
        }
        if self.status().lifecycle != ClusterLifecycle::Running {
            return;
        }

        match member.role() {
            MemberRole::Primary if !self.context.state.is_primary(member.address()) => {
                slog::info!(self.logger, "{} is now primary", member);
                self.context.state.set_primary(member);
            }
            MemberRole::Secondary | MemberRole::Unknown => {
                if self.context.state.clear_primary_if(&member) {
                    slog::info!(self.logger, "{} is no longer primary", member);
                }
            }
            MemberRole::Primary => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::test_utils::{AdminCall, RecordingAdmin};
    use crate::datastore::test_utils::InMemoryReplicaSet;
    use crate::datastore::{DatastoreClientFactory, DatastoreClientOptions, MemberAddress};
    use crate::replset::MemberId;
    use tokio::time::{sleep, Duration};

    fn member(last_octet: u8) -> Member {
        Member::new(MemberAddress::new(format!("10.0.0.{}", last_octet), 27017))
    }

    fn healthy_member(last_octet: u8) -> Member {
        let member = member(last_octet);
        member.set_healthy(true);
        member
    }

    fn config() -> ReplicaSetControllerConfig {
        ReplicaSetControllerConfig {
            replica_set_name: "rs0".to_string(),
            name_suffix: None,
            logger: slog::Logger::root(slog::Discard, slog::o!()),
            options: ControllerOptions::default(),
        }
    }

    fn controller(admin: Arc<dyn ReplicaSetAdmin>) -> ReplicaSetController {
        create_replica_set_controller(config(), admin).unwrap()
    }

    fn add_call(primary: &Member, member: &Member, id: u64) -> AdminCall {
        AdminCall::AddMember {
            primary: primary.address().clone(),
            member: member.address().clone(),
            id: MemberId::new(id),
        }
    }

    fn remove_call(primary: &Member, member: &Member) -> AdminCall {
        AdminCall::RemoveMember {
            primary: primary.address().clone(),
            member: member.address().clone(),
        }
    }

    // Lets the worker drain whatever is due without crossing a retry.
    async fn settle() {
        sleep(Duration::from_millis(10)).await;
    }

    #[test]
    fn illegal_config() {
        let admin = Arc::new(RecordingAdmin::new());

        let mut empty_name = config();
        empty_name.replica_set_name = " ".to_string();
        assert!(matches!(
            create_replica_set_controller(empty_name, admin.clone()),
            Err(ControllerCreationError::EmptyName)
        ));

        let mut zero_delay = config();
        zero_delay.options.reconcile_retry_delay = Some(Duration::from_secs(0));
        assert!(matches!(
            create_replica_set_controller(zero_delay, admin),
            Err(ControllerCreationError::IllegalOptions(_))
        ));
    }

    #[tokio::test]
    async fn name_suffix() {
        let mut config = config();
        config.name_suffix = Some("-a1b2".to_string());
        let controller = create_replica_set_controller(config, Arc::new(RecordingAdmin::new())).unwrap();

        assert_eq!(controller.name(), "rs0-a1b2");
    }

    #[tokio::test(start_paused = true)]
    async fn membership_scenarios() {
        let admin = Arc::new(RecordingAdmin::new());
        let controller = controller(admin.clone());
        assert!(!controller.is_up());

        // First member initializes.
        let m0 = healthy_member(1);
        controller.on_member_added(m0.clone());
        settle().await;
        assert_eq!(
            admin.calls(),
            vec![AdminCall::Initialize {
                node: m0.address().clone(),
                name: "rs0".to_string(),
                id: MemberId::new(0),
            }]
        );
        assert_eq!(controller.primary(), Some(m0.clone()));
        assert!(controller.is_up());

        // Healthy member is added right away.
        let m1 = healthy_member(2);
        controller.on_member_added(m1.clone());
        settle().await;
        assert_eq!(admin.calls()[1..], [add_call(&m0, &m1, 1)]);
        assert_eq!(m1.id(), Some(MemberId::new(1)));

        // Unhealthy member waits.
        let m2 = member(3);
        controller.on_member_added(m2.clone());
        sleep(Duration::from_secs(10)).await;
        assert_eq!(admin.calls().len(), 2);

        m2.set_healthy(true);
        sleep(Duration::from_secs(3)).await;
        assert_eq!(admin.calls()[2..], [add_call(&m0, &m2, 2)]);

        // Healthy member isn't removed until it goes down.
        controller.on_member_removed(m1.clone());
        sleep(Duration::from_secs(10)).await;
        assert_eq!(admin.calls().len(), 3);

        m1.set_healthy(false);
        sleep(Duration::from_secs(3)).await;
        assert_eq!(admin.calls()[3..], [remove_call(&m0, &m1)]);

        // Unhealthy member is removed right away.
        m2.set_healthy(false);
        controller.on_member_removed(m2.clone());
        settle().await;
        assert_eq!(admin.calls()[4..], [remove_call(&m0, &m2)]);

        // Nothing left to retry.
        sleep(Duration::from_secs(30)).await;
        assert_eq!(admin.calls().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn exactly_one_initialization_under_concurrent_adds() {
        let admin = Arc::new(RecordingAdmin::new());
        let controller = Arc::new(controller(admin.clone()));

        let handles: Vec<_> = (1..=8)
            .map(|i| {
                let controller = controller.clone();
                std::thread::spawn(move || controller.on_member_added(healthy_member(i)))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        sleep(Duration::from_secs(10)).await;

        let calls = admin.calls();
        let initializations = calls
            .iter()
            .filter(|call| matches!(call, AdminCall::Initialize { .. }))
            .count();
        let mut added_ids: Vec<MemberId> = calls
            .iter()
            .filter_map(|call| match call {
                AdminCall::AddMember { id, .. } => Some(*id),
                _ => None,
            })
            .collect();
        added_ids.sort();
        added_ids.dedup();

        assert_eq!(initializations, 1);
        assert_eq!(added_ids.len(), 7);
        assert!(!added_ids.contains(&MemberId::new(0)));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_initialization_is_not_retried() {
        let admin = Arc::new(RecordingAdmin::new());
        admin.set_initialize_succeeds(false);
        let controller = controller(admin.clone());
        let mut listener = controller.status_listener();

        controller.on_member_added(healthy_member(1));
        sleep(Duration::from_secs(30)).await;

        assert_eq!(admin.calls().len(), 1);
        assert_eq!(controller.primary(), None);
        assert!(!controller.is_up());
        assert_eq!(listener.next().await.unwrap().lifecycle, ClusterLifecycle::OnFire);

        // Everyone else waits forever for a primary, without calling the datastore.
        controller.on_member_added(healthy_member(2));
        sleep(Duration::from_secs(30)).await;
        assert_eq!(admin.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_add_is_retried_with_a_new_id() {
        let admin = Arc::new(RecordingAdmin::new());
        let controller = controller(admin.clone());
        let m0 = healthy_member(1);
        controller.on_member_added(m0.clone());
        settle().await;

        admin.set_add_succeeds(false);
        let m1 = healthy_member(2);
        controller.on_member_added(m1.clone());
        settle().await;
        admin.set_add_succeeds(true);
        sleep(Duration::from_secs(3)).await;

        assert_eq!(admin.calls()[1..], [add_call(&m0, &m1, 1), add_call(&m0, &m1, 2)]);
        assert_eq!(m1.id(), Some(MemberId::new(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn removing_the_primary_waits_for_a_new_one() {
        let admin = Arc::new(RecordingAdmin::new());
        let controller = controller(admin.clone());
        let m0 = healthy_member(1);
        let m1 = healthy_member(2);
        controller.on_member_added(m0.clone());
        controller.on_member_added(m1.clone());
        settle().await;
        assert_eq!(admin.calls().len(), 2);

        m0.set_healthy(false);
        controller.on_member_removed(m0.clone());
        let m2 = healthy_member(3);
        controller.on_member_added(m2.clone());
        sleep(Duration::from_secs(10)).await;
        assert_eq!(controller.primary(), None);
        assert_eq!(admin.calls().len(), 2);

        m1.set_role(MemberRole::Primary);
        controller.on_member_role_changed(m1.clone());
        assert_eq!(controller.primary(), Some(m1.clone()));
        sleep(Duration::from_secs(3)).await;

        let mut calls = admin.calls()[2..].to_vec();
        calls.sort_by_key(|call| matches!(call, AdminCall::AddMember { .. }));
        assert_eq!(calls, vec![remove_call(&m1, &m0), add_call(&m1, &m2, 2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn demoted_primary_is_cleared() {
        let admin = Arc::new(RecordingAdmin::new());
        let controller = controller(admin);
        let m0 = healthy_member(1);
        controller.on_member_added(m0.clone());
        settle().await;

        // Secondary reports don't displace the primary.
        let m1 = healthy_member(2);
        m1.set_role(MemberRole::Secondary);
        controller.on_member_role_changed(m1);
        assert_eq!(controller.primary(), Some(m0.clone()));

        m0.set_role(MemberRole::Secondary);
        controller.on_member_role_changed(m0);
        assert_eq!(controller.primary(), None);
        assert!(controller.is_up());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_discards_pending_jobs() {
        let admin = Arc::new(RecordingAdmin::new());
        let controller = controller(admin.clone());
        controller.on_member_added(healthy_member(1));
        settle().await;

        let m1 = member(2);
        controller.on_member_added(m1.clone());
        settle().await;
        controller.stop();
        m1.set_healthy(true);
        controller.on_member_added(healthy_member(3));
        sleep(Duration::from_secs(30)).await;

        assert_eq!(admin.calls().len(), 1);
        assert_eq!(controller.status().lifecycle, ClusterLifecycle::Stopped);
        assert!(!controller.is_up());
    }

    #[tokio::test(start_paused = true)]
    async fn reset_initializes_again_with_fresh_id() {
        let admin = Arc::new(RecordingAdmin::new());
        let controller = controller(admin.clone());
        controller.on_member_added(healthy_member(1));
        settle().await;

        controller.reset();
        assert_eq!(controller.primary(), None);
        assert!(!controller.is_up());

        let m5 = healthy_member(5);
        controller.on_member_added(m5.clone());
        settle().await;

        assert_eq!(
            admin.calls()[1..],
            [AdminCall::Initialize {
                node: m5.address().clone(),
                name: "rs0".to_string(),
                id: MemberId::new(1),
            }]
        );
        assert_eq!(controller.primary(), Some(m5));
    }

    #[tokio::test(start_paused = true)]
    async fn config_versions_strictly_increase() {
        let store = InMemoryReplicaSet::new();
        let factory = DatastoreClientFactory::new(
            slog::Logger::root(slog::Discard, slog::o!()),
            Arc::new(store.clone()),
            DatastoreClientOptions::default(),
        )
        .unwrap();
        let controller = controller(Arc::new(factory));

        let members: Vec<Member> = (1..=5).map(healthy_member).collect();
        for member in &members {
            controller.on_member_added(member.clone());
        }
        sleep(Duration::from_secs(10)).await;

        for member in &members[1..3] {
            member.set_healthy(false);
            controller.on_member_removed(member.clone());
        }
        controller.on_member_added(healthy_member(6));
        sleep(Duration::from_secs(10)).await;

        let versions = store.written_versions();
        assert_eq!(versions, (1..=8).collect::<Vec<u64>>());
        assert_eq!(store.rejected_writes(), 0);

        let config = store.config().unwrap();
        let hosts: Vec<String> = config.members().iter().map(|m| m.host().to_string()).collect();
        assert_eq!(hosts, vec!["10.0.0.1:27017", "10.0.0.4:27017", "10.0.0.5:27017", "10.0.0.6:27017"]);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_initialization_keeps_cluster_down() {
        let admin = Arc::new(RecordingAdmin::new());
        admin.set_delay(Duration::from_secs(1));
        let controller = controller(admin.clone());

        controller.on_member_added(healthy_member(1));
        settle().await;
        controller.stop();
        sleep(Duration::from_secs(2)).await;

        assert_eq!(admin.calls().len(), 1);
        assert_eq!(controller.status().lifecycle, ClusterLifecycle::Stopped);
        assert!(!controller.is_up());
        assert_eq!(controller.primary(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_failed_initialization_is_not_on_fire() {
        let admin = Arc::new(RecordingAdmin::new());
        admin.set_delay(Duration::from_secs(1));
        admin.set_initialize_succeeds(false);
        let controller = controller(admin);

        controller.on_member_added(healthy_member(1));
        settle().await;
        controller.stop();
        sleep(Duration::from_secs(2)).await;

        assert_eq!(controller.status().lifecycle, ClusterLifecycle::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_during_initialization_discards_its_result() {
        let admin = Arc::new(RecordingAdmin::new());
        admin.set_delay(Duration::from_secs(1));
        let controller = controller(admin.clone());
        let m0 = healthy_member(1);

        controller.on_member_added(m0.clone());
        settle().await;
        controller.reset();
        let m5 = healthy_member(5);
        controller.on_member_added(m5.clone());
        sleep(Duration::from_secs(3)).await;

        assert_eq!(
            admin.calls(),
            vec![
                AdminCall::Initialize {
                    node: m0.address().clone(),
                    name: "rs0".to_string(),
                    id: MemberId::new(0),
                },
                AdminCall::Initialize {
                    node: m5.address().clone(),
                    name: "rs0".to_string(),
                    id: MemberId::new(1),
                },
            ]
        );
        assert_eq!(controller.primary(), Some(m5));
        assert!(controller.is_up());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_remove_is_retried() {
        let admin = Arc::new(RecordingAdmin::new());
        let controller = controller(admin.clone());
        let m0 = healthy_member(1);
        let m1 = healthy_member(2);
        controller.on_member_added(m0.clone());
        controller.on_member_added(m1.clone());
        settle().await;

        admin.set_remove_succeeds(false);
        m1.set_healthy(false);
        controller.on_member_removed(m1.clone());
        settle().await;
        assert_eq!(admin.calls()[2..], [remove_call(&m0, &m1)]);

        admin.set_remove_succeeds(true);
        sleep(Duration::from_secs(3)).await;
        assert_eq!(admin.calls()[2..], [remove_call(&m0, &m1), remove_call(&m0, &m1)]);

        sleep(Duration::from_secs(30)).await;
        assert_eq!(admin.calls().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn member_removed_before_joining_is_never_added() {
        let admin = Arc::new(RecordingAdmin::new());
        let controller = controller(admin.clone());
        let m0 = healthy_member(1);
        controller.on_member_added(m0.clone());
        settle().await;

        let m1 = member(2);
        controller.on_member_added(m1.clone());
        settle().await;
        controller.on_member_removed(m1.clone());
        settle().await;
        m1.set_healthy(true);
        sleep(Duration::from_secs(30)).await;

        assert_eq!(admin.calls()[1..], [remove_call(&m0, &m1)]);
        assert_eq!(m1.id(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn reconfiguration_follows_failover() {
        let store = InMemoryReplicaSet::new();
        let factory = DatastoreClientFactory::new(
            slog::Logger::root(slog::Discard, slog::o!()),
            Arc::new(store.clone()),
            DatastoreClientOptions::default(),
        )
        .unwrap();
        let controller = controller(Arc::new(factory));
        let m0 = healthy_member(1);
        let m1 = healthy_member(2);
        controller.on_member_added(m0.clone());
        controller.on_member_added(m1.clone());
        settle().await;
        assert_eq!(store.written_versions(), vec![1, 2]);

        // The set elects m1 before the controller hears about it.
        store.set_primary(m1.address().clone());
        let m2 = healthy_member(3);
        controller.on_member_added(m2.clone());
        sleep(Duration::from_secs(10)).await;
        assert_eq!(store.written_versions(), vec![1, 2]);
        assert_eq!(m2.id(), None);

        m1.set_role(MemberRole::Primary);
        controller.on_member_role_changed(m1.clone());
        sleep(Duration::from_secs(3)).await;

        assert_eq!(store.written_versions(), vec![1, 2, 3]);
        assert_eq!(store.rejected_writes(), 0);
        assert!(store.config().unwrap().member(m2.address()).is_some());
        assert!(m2.id().is_some());
    }
}
