use crate::controller::member::{Member, MemberRole};

/// Picks which member to evict when the pool shrinks: any member that isn't the primary, or
/// the only candidate when that's all there is. Returns `None` for an empty pool.
pub fn select_member_for_removal(candidates: &[Member]) -> Option<&Member> {
    candidates
        .iter()
        .find(|member| member.role() != MemberRole::Primary)
        .or_else(|| candidates.first())
}
