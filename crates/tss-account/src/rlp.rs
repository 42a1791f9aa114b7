//! Recursive Length Prefix encoding

use num_bigint::BigUint;

/// Encode a byte string
pub fn encode_bytes(bytes: &[u8]) -> Vec<u8> {
    if bytes.len() == 1 && bytes[0] < 0x80 {
        return bytes.to_vec();
    }
    let mut out = length_prefix(bytes.len(), 0x80);
    out.extend_from_slice(bytes);
    out
}

/// Encode a list of already-encoded items
pub fn encode_list(items: &[Vec<u8>]) -> Vec<u8> {
    let payload: Vec<u8> = items.concat();
    let mut out = length_prefix(payload.len(), 0xc0);
    out.extend(payload);
    out
}

/// Encode an unsigned integer as its minimal big-endian byte string
pub fn encode_uint(value: &BigUint) -> Vec<u8> {
    if value.bits() == 0 {
        return encode_bytes(&[]);
    }
    encode_bytes(&value.to_bytes_be())
}

pub fn encode_u64(value: u64) -> Vec<u8> {
    encode_bytes(trim_leading_zeros(&value.to_be_bytes()))
}

fn length_prefix(len: usize, offset: u8) -> Vec<u8> {
    if len < 56 {
        return vec![offset + len as u8];
    }
    let len_bytes = trim_leading_zeros(&len.to_be_bytes()).to_vec();
    let mut out = vec![offset + 55 + len_bytes.len() as u8];
    out.extend(len_bytes);
    out
}

fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strings() {
        assert_eq!(encode_bytes(b"dog"), hex::decode("83646f67").unwrap());
        assert_eq!(encode_bytes(b""), vec![0x80]);
        assert_eq!(encode_bytes(&[0x00]), vec![0x00]);
        assert_eq!(encode_bytes(&[0x7f]), vec![0x7f]);
        assert_eq!(encode_bytes(&[0x80]), vec![0x81, 0x80]);

        let lorem = b"Lorem ipsum dolor sit amet, consectetur adipisicing elit";
        let encoded = encode_bytes(lorem);
        assert_eq!(&encoded[..2], &[0xb8, 0x38]);
        assert_eq!(&encoded[2..], lorem);
    }

    #[test]
    fn test_integers() {
        assert_eq!(encode_u64(0), vec![0x80]);
        assert_eq!(encode_u64(15), vec![0x0f]);
        assert_eq!(encode_u64(1024), vec![0x82, 0x04, 0x00]);
        assert_eq!(encode_uint(&BigUint::from(0u32)), vec![0x80]);
        assert_eq!(encode_uint(&BigUint::from(1024u32)), vec![0x82, 0x04, 0x00]);
    }

    #[test]
    fn test_lists() {
        assert_eq!(encode_list(&[]), vec![0xc0]);
        assert_eq!(
            encode_list(&[encode_bytes(b"cat"), encode_bytes(b"dog")]),
            hex::decode("c88363617483646f67").unwrap()
        );

        // [ [], [[]], [ [], [[]] ] ]
        let empty = encode_list(&[]);
        let one = encode_list(&[empty.clone()]);
        let two = encode_list(&[empty.clone(), one.clone()]);
        assert_eq!(
            encode_list(&[empty, one, two]),
            hex::decode("c7c0c1c0c3c0c1c0").unwrap()
        );
    }
}
