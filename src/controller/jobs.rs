use crate::controller::admin::ReplicaSetAdmin;
use crate::controller::cluster_state::ClusterState;
use crate::controller::member::Member;
use std::sync::Arc;

/// ReconcileContext is everything a job needs, shared by the controller and its worker.
pub(super) struct ReconcileContext {
    pub(super) logger: slog::Logger,
    pub(super) replica_set_name: String,
    pub(super) state: ClusterState,
    pub(super) admin: Arc<dyn ReplicaSetAdmin>,
}

/// ReconcileJob is one membership change to push to the datastore. A job is retried by the
/// worker until it reports `Done`, without limit.
#[derive(Debug)]
pub(super) enum ReconcileJob {
    /// `epoch` is the one the initialization race was won in.
    Initialize { member: Member, epoch: u64 },
    AddMember(Member),
    RemoveMember(Member),
}

#[derive(Debug, Eq, PartialEq)]
pub(super) enum JobOutcome {
    Done,
    Reschedule,
}

impl ReconcileJob {
    pub(super) fn member(&self) -> &Member {
        match self {
            ReconcileJob::Initialize { member, .. } => member,
            ReconcileJob::AddMember(member) => member,
            ReconcileJob::RemoveMember(member) => member,
        }
    }

    pub(super) async fn attempt(&self, context: &ReconcileContext) -> JobOutcome {
        let logger = context
            .logger
            .new(slog::o!("Member" => self.member().address().to_string()));

        match self {
            ReconcileJob::Initialize { member, epoch } => initialize(&logger, context, member, *epoch).await,
            ReconcileJob::AddMember(member) => add_member(&logger, context, member).await,
            ReconcileJob::RemoveMember(member) => remove_member(&logger, context, member).await,
        }
    }
}

// Never rescheduled: once the race to initialize is lost by everyone else there is no
// "first member" left to retry with.
async fn initialize(logger: &slog::Logger, context: &ReconcileContext, member: &Member, epoch: u64) -> JobOutcome {
    let id = context.state.next_member_id();
    let initialized = context
        .admin
        .initialize_replica_set(member.address(), &context.replica_set_name, id)
        .await;

    if initialized {
        member.assign_id(id);
        if context.state.initialization_succeeded(epoch, member.clone()) {
            slog::info!(logger, "Initialized replica set {} with primary {}", context.replica_set_name, member);
        } else {
            slog::info!(
                logger,
                "Replica set {} initialized via {} after controller was stopped or reset; ignoring",
                context.replica_set_name,
                member
            );
        }
    } else if context.state.initialization_failed(epoch) {
        slog::error!(
            logger,
            "Replica set {} failed to initialize via {}",
            context.replica_set_name,
            member
        );
    } else {
        slog::debug!(logger, "Discarding failed initialization after controller was stopped or reset");
    }

    JobOutcome::Done
}

async fn add_member(logger: &slog::Logger, context: &ReconcileContext, member: &Member) -> JobOutcome {
    // The member's remove job takes it from here.
    if member.is_removed() {
        slog::debug!(
            logger,
            "{} left the pool before joining replica set {}; dropping addition",
            member,
            context.replica_set_name
        );
        return JobOutcome::Done;
    }

    // Health is not guaranteed when members join after the first.
    let healthy = member.is_healthy();
    let primary = match context.state.primary() {
        Some(primary) if healthy => primary,
        primary => {
            slog::trace!(
                logger,
                "Rescheduling addition to replica set {}: healthy={}, primary={:?}",
                context.replica_set_name,
                healthy,
                primary.map(|p| p.address().to_string())
            );
            return JobOutcome::Reschedule;
        }
    };

    if !context.state.is_primary(primary.address()) {
        slog::debug!(logger, "Primary {} changed before adding member; rescheduling", primary);
        return JobOutcome::Reschedule;
    }

    // An id is spent even if this attempt fails. Ids only need to be unique.
    let id = context.state.next_member_id();
    if context.admin.add_member(primary.address(), member.address(), id).await {
        slog::info!(logger, "{} added to replica set {} with id {}", member, context.replica_set_name, id);
        member.assign_id(id);
        JobOutcome::Done
    } else {
        slog::debug!(
            logger,
            "{} could not be added to replica set {} via {}; rescheduling",
            member,
            context.replica_set_name,
            primary
        );
        JobOutcome::Reschedule
    }
}

async fn remove_member(logger: &slog::Logger, context: &ReconcileContext, member: &Member) -> JobOutcome {
    // The datastore only removes a member cleanly once it has been shut down.
    let healthy = member.is_healthy();
    // Waits for the set to elect a new primary if it is reconfiguring itself.
    let primary = match context.state.primary() {
        Some(primary) if !healthy && &primary != member => primary,
        primary => {
            slog::trace!(
                logger,
                "Rescheduling removal from replica set {}: healthy={}, primary={:?}",
                context.replica_set_name,
                healthy,
                primary.map(|p| p.address().to_string())
            );
            return JobOutcome::Reschedule;
        }
    };

    if !context.state.is_primary(primary.address()) {
        slog::debug!(logger, "Primary {} changed before removing member; rescheduling", primary);
        return JobOutcome::Reschedule;
    }

    if context.admin.remove_member(primary.address(), member.address()).await {
        slog::info!(logger, "Removed {} from replica set {}", member, context.replica_set_name);
        JobOutcome::Done
    } else {
        slog::debug!(
            logger,
            "{} could not be removed from replica set {} via {}; rescheduling",
            member,
            context.replica_set_name,
            primary
        );
        JobOutcome::Reschedule
    }
}
