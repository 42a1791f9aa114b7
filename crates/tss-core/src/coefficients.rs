//! Threshold coefficient engine
//!
//! The account key is split in two layers. The client share sits at index
//! `u` and the servers jointly hold the point at index 1 of a degree-1
//! polynomial whose value at 0 is the secret; the servers' point is itself
//! Shamir-shared across their 1-based DKG indexes.
//!
//! The interactive protocol numbers its parties `1..=N` and interpolates
//! their shares over that set. To make its result equal the account secret,
//! every party's input is pre-multiplied by
//!
//! ```text
//! dkls_p = additive_p / λ_{p+1}({1..N})
//! ```
//!
//! where `additive_p` is the coefficient that turns the party's real share
//! into an additive share of the secret.

use crate::encoding::{scalar_from_hex, scalar_to_biguint};
use crate::{Error, PartyId, Result};
use k256::{elliptic_curve::Field, Scalar};
use std::collections::BTreeMap;

/// Lagrange basis coefficient of `my_index` over `indexes`, evaluated at `target`
pub fn lagrange_coefficient(indexes: &[Scalar], my_index: &Scalar, target: &Scalar) -> Result<Scalar> {
    for (i, a) in indexes.iter().enumerate() {
        if indexes[i + 1..].contains(a) {
            return Err(Error::Topology("duplicate index in interpolation set".into()));
        }
    }
    if !indexes.contains(my_index) {
        return Err(Error::Topology("index is not part of the interpolation set".into()));
    }

    let mut numerator = Scalar::ONE;
    let mut denominator = Scalar::ONE;
    for j in indexes.iter().filter(|j| *j != my_index) {
        numerator *= *target - j;
        denominator *= *my_index - j;
    }

    let inverse = Option::<Scalar>::from(denominator.invert())
        .ok_or_else(|| Error::Topology("degenerate interpolation set".into()))?;
    Ok(numerator * inverse)
}

/// Coefficient turning a party's real share into an additive share of the secret
pub fn additive_coefficient(
    server_indexes: &[Scalar],
    user_index: &Scalar,
    server_index: Option<&Scalar>,
) -> Result<Scalar> {
    let user_set = [Scalar::ONE, *user_index];

    match server_index {
        None => lagrange_coefficient(&user_set, user_index, &Scalar::ZERO),
        Some(server_index) => {
            let server = lagrange_coefficient(server_indexes, server_index, &Scalar::ZERO)?;
            let master = lagrange_coefficient(&user_set, &Scalar::ONE, &Scalar::ZERO)?;
            Ok(server * master)
        }
    }
}

/// Inverse of the coefficient the protocol applies to party `party` of `n_parties`
pub fn denormalise_coefficient(party: PartyId, n_parties: usize) -> Result<Scalar> {
    if party >= n_parties {
        return Err(Error::Topology(format!(
            "party {party} out of range for {n_parties} parties"
        )));
    }

    let indexes: Vec<Scalar> = (1..=n_parties as u64).map(Scalar::from).collect();
    let coefficient = lagrange_coefficient(&indexes, &Scalar::from(party as u64 + 1), &Scalar::ZERO)?;
    Option::<Scalar>::from(coefficient.invert())
        .ok_or_else(|| Error::Topology("zero protocol coefficient".into()))
}

/// Coefficient applied to one party's share before it enters the protocol.
///
/// `server_indexes` are the participating DKG indexes in party order and
/// must be strictly ascending. `server_index` is `None` for the client.
pub fn dkls_coefficient(server_indexes: &[u32], user_index: &Scalar, server_index: Option<u32>) -> Result<Scalar> {
    if server_indexes.windows(2).any(|w| w[0] >= w[1]) {
        return Err(Error::Topology("server indexes must be strictly ascending".into()));
    }

    let n_parties = server_indexes.len() + 1;
    let servers: Vec<Scalar> = server_indexes.iter().map(|&i| Scalar::from(i as u64)).collect();

    let (party, additive) = match server_index {
        None => (n_parties - 1, additive_coefficient(&servers, user_index, None)?),
        Some(index) => {
            let party = server_indexes
                .iter()
                .position(|&i| i == index)
                .ok_or_else(|| Error::Topology(format!("server {index} is not participating")))?;
            let additive = additive_coefficient(&servers, user_index, Some(&Scalar::from(index as u64)))?;
            (party, additive)
        }
    };

    Ok(denormalise_coefficient(party, n_parties)? * additive)
}

/// Coefficients handed to the servers, keyed by DKG index
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServerCoefficients(BTreeMap<u32, Scalar>);

impl ServerCoefficients {
    pub fn get(&self, index: u32) -> Option<&Scalar> {
        self.0.get(&index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &Scalar)> {
        self.0.iter().map(|(k, v)| (*k, v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Wire form: decimal DKG index to hex coefficient without leading zeros
    pub fn to_wire(&self) -> BTreeMap<String, String> {
        self.0
            .iter()
            .map(|(index, coefficient)| {
                (
                    index.to_string(),
                    scalar_to_biguint(coefficient).to_str_radix(16),
                )
            })
            .collect()
    }
}

/// Everything the client derives from its share for one ceremony
#[derive(Clone)]
pub struct CoefficientSet {
    pub server: ServerCoefficients,
    pub denormalized_share: Scalar,
}

impl CoefficientSet {
    /// Compute server coefficients and the client's denormalized share
    pub fn compute(server_indexes: &[u32], tss_index: &str, tss_share: &str) -> Result<Self> {
        let user_index = scalar_from_hex(tss_index)?;
        if user_index == Scalar::ZERO || user_index == Scalar::ONE {
            return Err(Error::InvalidShare(format!(
                "share index {tss_index} collides with a reserved point"
            )));
        }

        let share = scalar_from_hex(tss_share)?;
        if bool::from(share.is_zero()) {
            return Err(Error::InvalidShare("share is zero".into()));
        }

        let mut server = BTreeMap::new();
        for &index in server_indexes {
            server.insert(index, dkls_coefficient(server_indexes, &user_index, Some(index))?);
        }

        let denormalized_share = dkls_coefficient(server_indexes, &user_index, None)? * share;

        Ok(Self {
            server: ServerCoefficients(server),
            denormalized_share,
        })
    }
}

impl std::fmt::Debug for CoefficientSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoefficientSet")
            .field("server", &self.server)
            .field("denormalized_share", &"<redacted>")
            .finish()
    }
}
