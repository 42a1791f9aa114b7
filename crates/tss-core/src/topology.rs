//! Party topology of a signing ceremony
//!
//! Servers occupy party positions `0..parties-1` in node-index order and the
//! client always takes the last position. Endpoint lists are aligned with the
//! party list; the client's own slot carries no endpoint.

use crate::{Error, PartyId, Result, DEFAULT_PARTIES};
use serde::Serialize;

/// Path segment removed from an endpoint to obtain its socket endpoint
const TSS_PATH: &str = "/tss";

/// Resolved parties and endpoints for one ceremony
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartyTopology {
    /// Total party count, client included
    pub parties: usize,
    /// Client party position (always `parties - 1`)
    pub client_index: PartyId,
    /// Party positions, servers first
    pub party_indexes: Vec<PartyId>,
    /// 1-based DKG index of each server, in party order
    pub server_indexes: Vec<u32>,
    /// HTTP endpoint per party
    pub endpoints: Vec<Option<String>>,
    /// Socket endpoint per party
    pub socket_endpoints: Vec<Option<String>>,
}

impl PartyTopology {
    /// Resolve the topology from an account's node indexes and endpoints.
    ///
    /// An empty `node_indexes` selects [`DEFAULT_PARTIES`] parties, with
    /// server `i` assigned DKG index `i + 1`.
    pub fn resolve(node_indexes: &[u32], tss_endpoints: &[String]) -> Result<Self> {
        let parties = if node_indexes.is_empty() {
            DEFAULT_PARTIES
        } else {
            node_indexes.len() + 1
        };
        let client_index = parties - 1;

        let mut party_indexes = Vec::with_capacity(parties);
        let mut server_indexes = Vec::with_capacity(parties - 1);
        let mut endpoints = Vec::with_capacity(parties);
        let mut socket_endpoints = Vec::with_capacity(parties);

        for party in 0..parties {
            party_indexes.push(party);

            if party == client_index {
                endpoints.push(None);
                socket_endpoints.push(None);
                continue;
            }

            let dkg_index = match node_indexes.get(party) {
                Some(0) => {
                    return Err(Error::Topology("node indexes are 1-based, got 0".into()));
                }
                Some(&index) => index,
                None => party as u32 + 1,
            };

            let endpoint = tss_endpoints
                .get(dkg_index as usize - 1)
                .ok_or_else(|| {
                    Error::Topology(format!(
                        "no endpoint for node {dkg_index}: {} endpoints configured",
                        tss_endpoints.len()
                    ))
                })?;

            server_indexes.push(dkg_index);
            socket_endpoints.push(Some(socket_endpoint(endpoint)));
            endpoints.push(Some(endpoint.clone()));
        }

        Ok(Self {
            parties,
            client_index,
            party_indexes,
            server_indexes,
            endpoints,
            socket_endpoints,
        })
    }
}

/// Drop a trailing `/tss` path segment; other endpoints pass through unchanged
fn socket_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.strip_suffix('/').unwrap_or(endpoint);
    match trimmed.strip_suffix(TSS_PATH) {
        Some(base) => base.to_string(),
        None => endpoint.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sapphire_endpoints(n: usize) -> Vec<String> {
        (1..=n)
            .map(|i| format!("https://sapphire-{i}.auth.network/tss"))
            .collect()
    }

    #[test]
    fn test_default_topology() {
        let topology = PartyTopology::resolve(&[], &sapphire_endpoints(5)).unwrap();

        assert_eq!(topology.parties, 4);
        assert_eq!(topology.client_index, 3);
        assert_eq!(topology.party_indexes, vec![0, 1, 2, 3]);
        assert_eq!(topology.server_indexes, vec![1, 2, 3]);
        assert_eq!(topology.endpoints[3], None);
        assert_eq!(
            topology.endpoints[0].as_deref(),
            Some("https://sapphire-1.auth.network/tss")
        );
        assert_eq!(
            topology.socket_endpoints[2].as_deref(),
            Some("https://sapphire-3.auth.network")
        );
    }

    #[test]
    fn test_default_topology_ignores_endpoint_count() {
        for n in 3..8 {
            let topology = PartyTopology::resolve(&[], &sapphire_endpoints(n)).unwrap();
            assert_eq!(topology.parties, 4);
            assert_eq!(topology.client_index, 3);
        }
    }

    #[test]
    fn test_explicit_node_indexes() {
        let topology = PartyTopology::resolve(&[2, 4, 5], &sapphire_endpoints(5)).unwrap();

        assert_eq!(topology.parties, 4);
        assert_eq!(topology.client_index, 3);
        assert_eq!(topology.server_indexes, vec![2, 4, 5]);
        assert_eq!(
            topology.endpoints[1].as_deref(),
            Some("https://sapphire-4.auth.network/tss")
        );
        assert_eq!(
            topology.socket_endpoints[2].as_deref(),
            Some("https://sapphire-5.auth.network")
        );
        assert_eq!(topology.endpoints.len(), topology.party_indexes.len());
        assert_eq!(topology.socket_endpoints.len(), topology.party_indexes.len());
    }

    #[test]
    fn test_two_servers() {
        let topology = PartyTopology::resolve(&[1, 3], &sapphire_endpoints(3)).unwrap();

        assert_eq!(topology.parties, 3);
        assert_eq!(topology.client_index, 2);
        assert_eq!(topology.party_indexes, vec![0, 1, 2]);
    }

    #[test]
    fn test_missing_endpoint() {
        let err = PartyTopology::resolve(&[], &sapphire_endpoints(2)).unwrap_err();
        assert!(matches!(err, Error::Topology(_)));

        let err = PartyTopology::resolve(&[1, 6], &sapphire_endpoints(5)).unwrap_err();
        assert!(matches!(err, Error::Topology(_)));
    }

    #[test]
    fn test_zero_node_index() {
        let err = PartyTopology::resolve(&[0, 1], &sapphire_endpoints(5)).unwrap_err();
        assert!(matches!(err, Error::Topology(_)));
    }

    #[test]
    fn test_socket_endpoint_keeps_host() {
        let endpoints: Vec<String> = (1..=5)
            .map(|i| format!("https://tss-node{i}.example.com/tss"))
            .collect();
        let topology = PartyTopology::resolve(&[], &endpoints).unwrap();

        assert_eq!(
            topology.socket_endpoints[0].as_deref(),
            Some("https://tss-node1.example.com")
        );
    }

    #[test]
    fn test_socket_endpoint_forms() {
        assert_eq!(socket_endpoint("https://node.example/tss/"), "https://node.example");
        assert_eq!(socket_endpoint("https://node.example/api"), "https://node.example/api");
        assert_eq!(
            socket_endpoint("https://node.example/tss-api"),
            "https://node.example/tss-api"
        );
    }
}
