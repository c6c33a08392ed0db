use crate::datastore::Document;
use serde_json::Value;

/// ServerStatusSummary holds the traffic counters of one member's `serverStatus` reply, or
/// their total across members. A counter nobody reported stays `None`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ServerStatusSummary {
    pub op_inserts: Option<u64>,
    pub op_queries: Option<u64>,
    pub op_updates: Option<u64>,
    pub op_deletes: Option<u64>,
    pub op_getmores: Option<u64>,
    pub op_commands: Option<u64>,
    pub network_bytes_in: Option<u64>,
    pub network_bytes_out: Option<u64>,
    pub network_num_requests: Option<u64>,
}

impl ServerStatusSummary {
    pub fn from_document(server_status: &Document) -> Self {
        let opcounter = |name| counter(server_status, "opcounters", name);
        let network = |name| counter(server_status, "network", name);

        ServerStatusSummary {
            op_inserts: opcounter("insert"),
            op_queries: opcounter("query"),
            op_updates: opcounter("update"),
            op_deletes: opcounter("delete"),
            op_getmores: opcounter("getmore"),
            op_commands: opcounter("command"),
            network_bytes_in: network("bytesIn"),
            network_bytes_out: network("bytesOut"),
            network_num_requests: network("numRequests"),
        }
    }

    pub fn sum<'a, I: IntoIterator<Item = &'a ServerStatusSummary>>(summaries: I) -> Self {
        summaries
            .into_iter()
            .fold(ServerStatusSummary::default(), |total, next| ServerStatusSummary {
                op_inserts: add(total.op_inserts, next.op_inserts),
                op_queries: add(total.op_queries, next.op_queries),
                op_updates: add(total.op_updates, next.op_updates),
                op_deletes: add(total.op_deletes, next.op_deletes),
                op_getmores: add(total.op_getmores, next.op_getmores),
                op_commands: add(total.op_commands, next.op_commands),
                network_bytes_in: add(total.network_bytes_in, next.network_bytes_in),
                network_bytes_out: add(total.network_bytes_out, next.network_bytes_out),
                network_num_requests: add(total.network_num_requests, next.network_num_requests),
            })
    }
}

fn counter(server_status: &Document, section: &str, name: &str) -> Option<u64> {
    match server_status.get(section)?.get(name)? {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        _ => None,
    }
}

fn add(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.saturating_add(b)),
        (a, None) => a,
        (None, b) => b,
    }
}
