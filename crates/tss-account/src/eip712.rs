//! EIP-712 typed structured data hashing

use crate::{keccak256, AccountError, Address, Result};
use num_bigint::{BigInt, BigUint, Sign};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

const DOMAIN_TYPE: &str = "EIP712Domain";

/// One member of a struct type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedField {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Typed data payload in its JSON form
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedData {
    pub types: BTreeMap<String, Vec<TypedField>>,
    pub primary_type: String,
    pub domain: Value,
    pub message: Value,
}

impl TypedData {
    /// `keccak256(0x19 0x01 || domainSeparator || hashStruct(message))`
    pub fn signable_hash(&self) -> Result<[u8; 32]> {
        let encoder = self.encoder();

        let mut payload = vec![0x19, 0x01];
        payload.extend_from_slice(&encoder.hash_struct(DOMAIN_TYPE, &self.domain)?);
        if self.primary_type != DOMAIN_TYPE {
            payload.extend_from_slice(&encoder.hash_struct(&self.primary_type, &self.message)?);
        }
        Ok(keccak256(payload))
    }

    pub fn domain_separator(&self) -> Result<[u8; 32]> {
        self.encoder().hash_struct(DOMAIN_TYPE, &self.domain)
    }

    pub fn message_hash(&self) -> Result<[u8; 32]> {
        self.encoder().hash_struct(&self.primary_type, &self.message)
    }

    pub fn encode_type(&self, name: &str) -> Result<String> {
        self.encoder().encode_type(name)
    }

    fn encoder(&self) -> Encoder {
        let mut types = self.types.clone();
        if !types.contains_key(DOMAIN_TYPE) {
            types.insert(DOMAIN_TYPE.to_string(), infer_domain_type(&self.domain));
        }
        Encoder { types }
    }
}

/// Domain members present in `domain`, in their canonical order
fn infer_domain_type(domain: &Value) -> Vec<TypedField> {
    [
        ("name", "string"),
        ("version", "string"),
        ("chainId", "uint256"),
        ("verifyingContract", "address"),
        ("salt", "bytes32"),
    ]
    .into_iter()
    .filter(|(name, _)| domain.get(name).is_some_and(|v| !v.is_null()))
    .map(|(name, kind)| TypedField {
        name: name.to_string(),
        kind: kind.to_string(),
    })
    .collect()
}

struct Encoder {
    types: BTreeMap<String, Vec<TypedField>>,
}

impl Encoder {
    fn fields(&self, name: &str) -> Result<&[TypedField]> {
        self.types
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| AccountError::TypedData(format!("unknown type {name}")))
    }

    fn collect_dependencies(&self, name: &str, found: &mut BTreeSet<String>) -> Result<()> {
        if found.contains(name) || !self.types.contains_key(name) {
            return Ok(());
        }
        found.insert(name.to_string());
        for field in self.fields(name)? {
            self.collect_dependencies(base_type(&field.kind), found)?;
        }
        Ok(())
    }

    /// Primary type first, then referenced struct types sorted by name
    fn encode_type(&self, name: &str) -> Result<String> {
        let mut deps = BTreeSet::new();
        self.collect_dependencies(name, &mut deps)?;
        if deps.is_empty() {
            return Err(AccountError::TypedData(format!("unknown type {name}")));
        }
        deps.remove(name);

        let mut encoded = String::new();
        for ty in std::iter::once(name).chain(deps.iter().map(String::as_str)) {
            let members: Vec<String> = self
                .fields(ty)?
                .iter()
                .map(|f| format!("{} {}", f.kind, f.name))
                .collect();
            encoded.push_str(&format!("{ty}({})", members.join(",")));
        }
        Ok(encoded)
    }

    fn hash_struct(&self, name: &str, data: &Value) -> Result<[u8; 32]> {
        let mut encoded = keccak256(self.encode_type(name)?).to_vec();
        for field in self.fields(name)? {
            let value = data.get(&field.name).unwrap_or(&Value::Null);
            encoded.extend_from_slice(&self.encode_value(&field.kind, value)?);
        }
        Ok(keccak256(encoded))
    }

    fn encode_value(&self, kind: &str, value: &Value) -> Result<[u8; 32]> {
        if value.is_null() {
            return Err(AccountError::TypedData(format!("missing value of type {kind}")));
        }

        if let Some(element) = kind.strip_suffix(']').and_then(|k| k.rsplit_once('[')).map(|(k, _)| k) {
            let items = value
                .as_array()
                .ok_or_else(|| AccountError::TypedData(format!("expected array for {kind}")))?;
            let mut encoded = Vec::with_capacity(items.len() * 32);
            for item in items {
                encoded.extend_from_slice(&self.encode_value(element, item)?);
            }
            return Ok(keccak256(encoded));
        }

        if self.types.contains_key(kind) {
            return self.hash_struct(kind, value);
        }

        match kind {
            "string" => {
                let s = value
                    .as_str()
                    .ok_or_else(|| AccountError::TypedData("expected string".into()))?;
                Ok(keccak256(s.as_bytes()))
            }
            "bytes" => Ok(keccak256(hex_value(value)?)),
            "bool" => {
                let flag = value
                    .as_bool()
                    .ok_or_else(|| AccountError::TypedData("expected bool".into()))?;
                let mut word = [0u8; 32];
                word[31] = flag as u8;
                Ok(word)
            }
            "address" => {
                let s = value
                    .as_str()
                    .ok_or_else(|| AccountError::TypedData("expected address string".into()))?;
                let address: Address = s.parse()?;
                let mut word = [0u8; 32];
                word[12..].copy_from_slice(address.as_bytes());
                Ok(word)
            }
            _ if kind.starts_with("uint") => {
                let n = integer_value(value)?;
                if n.sign() == Sign::Minus {
                    return Err(AccountError::TypedData(format!("negative value for {kind}")));
                }
                left_pad(&n.magnitude().to_bytes_be())
            }
            _ if kind.starts_with("int") => {
                let n = integer_value(value)?;
                let bytes = n.to_signed_bytes_be();
                if bytes.len() > 32 {
                    return Err(AccountError::TypedData(format!("{kind} out of range")));
                }
                let fill = if n.sign() == Sign::Minus { 0xff } else { 0x00 };
                let mut word = [fill; 32];
                word[32 - bytes.len()..].copy_from_slice(&bytes);
                Ok(word)
            }
            _ if kind.starts_with("bytes") => {
                let bytes = hex_value(value)?;
                if bytes.len() > 32 {
                    return Err(AccountError::TypedData(format!("{kind} longer than 32 bytes")));
                }
                let mut word = [0u8; 32];
                word[..bytes.len()].copy_from_slice(&bytes);
                Ok(word)
            }
            _ => Err(AccountError::TypedData(format!("unsupported type {kind}"))),
        }
    }
}

fn base_type(kind: &str) -> &str {
    kind.split('[').next().unwrap_or(kind)
}

fn hex_value(value: &Value) -> Result<Vec<u8>> {
    let s = value
        .as_str()
        .ok_or_else(|| AccountError::TypedData("expected hex string".into()))?;
    Ok(hex::decode(s.strip_prefix("0x").unwrap_or(s))?)
}

/// JSON number, decimal string or `0x` hex string
fn integer_value(value: &Value) -> Result<BigInt> {
    let parsed = match value {
        Value::Number(n) => BigInt::parse_bytes(n.to_string().as_bytes(), 10),
        Value::String(s) => match s.strip_prefix("0x") {
            Some(hex_digits) if all_digits(hex_digits, 16) => {
                BigUint::parse_bytes(hex_digits.as_bytes(), 16).map(BigInt::from)
            }
            Some(_) => None,
            None if all_digits(s.strip_prefix('-').unwrap_or(s), 10) => {
                BigInt::parse_bytes(s.as_bytes(), 10)
            }
            None => None,
        },
        _ => None,
    };
    parsed.ok_or_else(|| AccountError::TypedData(format!("expected integer, got {value}")))
}

/// Non-empty run of digits in `radix`, with no sign or separators
fn all_digits(digits: &str, radix: u32) -> bool {
    !digits.is_empty() && digits.chars().all(|c| c.is_digit(radix))
}

fn left_pad(bytes: &[u8]) -> Result<[u8; 32]> {
    if bytes.len() > 32 {
        return Err(AccountError::TypedData("integer wider than 256 bits".into()));
    }
    let mut word = [0u8; 32];
    word[32 - bytes.len()..].copy_from_slice(bytes);
    Ok(word)
}
