//! Legacy Ethereum transactions with EIP-155 replay protection

use crate::{keccak256, rlp, Address};
use num_bigint::BigUint;
use tss_core::Signature;

/// Unsigned legacy transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub nonce: u64,
    /// Gas price in wei
    pub gas_price: BigUint,
    pub gas_limit: u64,
    /// `None` for contract creation
    pub to: Option<Address>,
    /// Value in wei
    pub value: BigUint,
    pub data: Vec<u8>,
    pub chain_id: u64,
}

impl Transaction {
    fn base_fields(&self) -> Vec<Vec<u8>> {
        let to = match &self.to {
            Some(address) => rlp::encode_bytes(address.as_bytes()),
            None => rlp::encode_bytes(&[]),
        };
        vec![
            rlp::encode_u64(self.nonce),
            rlp::encode_uint(&self.gas_price),
            rlp::encode_u64(self.gas_limit),
            to,
            rlp::encode_uint(&self.value),
            rlp::encode_bytes(&self.data),
        ]
    }

    /// RLP payload hashed for signing: the fields followed by `chainId, 0, 0`
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut fields = self.base_fields();
        fields.push(rlp::encode_u64(self.chain_id));
        fields.push(rlp::encode_u64(0));
        fields.push(rlp::encode_u64(0));
        rlp::encode_list(&fields)
    }

    pub fn signing_hash(&self) -> [u8; 32] {
        keccak256(self.signing_payload())
    }

    /// Attach a signature, deriving `v = parity + chainId * 2 + 35`
    pub fn into_signed(self, signature: Signature) -> SignedTransaction {
        let v = signature.parity() as u64 + self.chain_id * 2 + 35;

        let mut fields = self.base_fields();
        fields.push(rlp::encode_u64(v));
        fields.push(rlp::encode_uint(&BigUint::from_bytes_be(&signature.r)));
        fields.push(rlp::encode_uint(&BigUint::from_bytes_be(&signature.s)));
        let raw = rlp::encode_list(&fields);
        let hash = keccak256(&raw);

        SignedTransaction {
            transaction: self,
            signature,
            v,
            raw,
            hash,
        }
    }
}

/// Transaction with its signature and broadcastable encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub transaction: Transaction,
    pub signature: Signature,
    /// EIP-155 `v`
    pub v: u64,
    /// RLP-encoded signed transaction
    pub raw: Vec<u8>,
    /// Transaction hash
    pub hash: [u8; 32],
}

impl SignedTransaction {
    pub fn raw_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.raw))
    }

    pub fn hash_hex(&self) -> String {
        format!("0x{}", hex::encode(self.hash))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::units;

    /// Example transaction from EIP-155
    pub(crate) fn eip155_transaction() -> Transaction {
        Transaction {
            nonce: 9,
            gas_price: units::parse_units("20", 9).unwrap(),
            gas_limit: 21_000,
            to: Some("0x3535353535353535353535353535353535353535".parse().unwrap()),
            value: units::to_wei("1").unwrap(),
            data: vec![],
            chain_id: 1,
        }
    }

    #[test]
    fn test_eip155_signing_payload() {
        let tx = eip155_transaction();

        assert_eq!(
            hex::encode(tx.signing_payload()),
            "ec098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a764000080018080"
        );
        assert_eq!(
            hex::encode(tx.signing_hash()),
            "daf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53"
        );
    }

    #[test]
    fn test_eip155_signed_encoding() {
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        hex::decode_to_slice(
            "28ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276",
            &mut r,
        )
        .unwrap();
        hex::decode_to_slice(
            "67cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83",
            &mut s,
        )
        .unwrap();

        let signed = eip155_transaction().into_signed(Signature::new(r, s, 0));

        assert_eq!(signed.v, 37);
        assert_eq!(
            hex::encode(&signed.raw),
            "f86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a76400008025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83"
        );
        assert_eq!(signed.hash_hex().len(), 66);
    }

    #[test]
    fn test_v_uses_parity_with_offset() {
        let mut tx = eip155_transaction();
        tx.chain_id = 137;

        let signed = tx.into_signed(Signature::new([1u8; 32], [2u8; 32], 28));
        assert_eq!(signed.v, 1 + 137 * 2 + 35);
    }

    #[test]
    fn test_contract_creation_encodes_empty_to() {
        let mut tx = eip155_transaction();
        tx.to = None;
        let payload = tx.signing_payload();

        // nonce, gas price and gas limit are followed by an empty string
        let to_offset = 1 + 1 + 6 + 3;
        assert_eq!(payload[to_offset], 0x80);
    }
}
