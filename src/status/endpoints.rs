use std::collections::BTreeSet;

/// Every distinct non-blank endpoint reported by the members, in sorted order.
pub fn replica_set_endpoints<I, S>(reported: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    reported
        .into_iter()
        .map(|endpoint| endpoint.as_ref().trim().to_string())
        .filter(|endpoint| !endpoint.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Connection string for clients of the whole replica set.
pub fn datastore_url<I, S>(endpoints: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let hosts: Vec<String> = endpoints
        .into_iter()
        .map(|endpoint| endpoint.as_ref().to_string())
        .collect();
    format!("mongodb://{}", hosts.join(","))
}

/// The primary endpoint as the members report it. While a new primary is being elected more
/// than one member may claim to be it; the first claim wins.
pub fn primary_endpoint<S: AsRef<str>>(logger: &slog::Logger, reported: &[S]) -> Option<String> {
    let claims = replica_set_endpoints(reported);
    if claims.len() > 1 {
        slog::warn!(logger, "Multiple primaries reported (transitioning?): {:?}", claims);
    }

    reported
        .iter()
        .map(|endpoint| endpoint.as_ref().trim())
        .find(|endpoint| !endpoint.is_empty())
        .map(str::to_string)
}
