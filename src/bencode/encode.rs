//! Canonical bencode encoder
//!
//! Dictionary keys come out in ascending byte order because [`Dict`] is a
//! `BTreeMap`; the info hash depends on that ordering.
//!
//! [`Dict`]: crate::bencode::Dict

use bytes::{BufMut, BytesMut};

use crate::bencode::value::Value;

/// Encode a value into a fresh buffer
pub fn encode(value: &Value) -> Vec<u8> {
    let mut buf = BytesMut::new();
    encode_into(value, &mut buf);
    buf.to_vec()
}

/// Append the encoding of `value` to `buf`
pub fn encode_into(value: &Value, buf: &mut BytesMut) {
    match value {
        Value::Integer(i) => {
            buf.put_u8(b'i');
            buf.put_slice(i.to_string().as_bytes());
            buf.put_u8(b'e');
        }
        Value::Bytes(bytes) => put_bytes(bytes, buf),
        Value::List(items) => {
            buf.put_u8(b'l');
            for item in items {
                encode_into(item, buf);
            }
            buf.put_u8(b'e');
        }
        Value::Dict(dict) => {
            buf.put_u8(b'd');
            for (key, item) in dict {
                put_bytes(key, buf);
                encode_into(item, buf);
            }
            buf.put_u8(b'e');
        }
    }
}

fn put_bytes(bytes: &[u8], buf: &mut BytesMut) {
    buf.put_slice(bytes.len().to_string().as_bytes());
    buf.put_u8(b':');
    buf.put_slice(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bencode::{decode, decode_at, Dict};

    #[test]
    fn test_encode_scalars() {
        assert_eq!(encode(&Value::from("hello")), b"5:hello");
        assert_eq!(encode(&Value::Bytes(vec![])), b"0:");
        assert_eq!(encode(&Value::Integer(52)), b"i52e");
        assert_eq!(encode(&Value::Integer(-3)), b"i-3e");
        assert_eq!(encode(&Value::Integer(0)), b"i0e");
    }

    #[test]
    fn test_encode_list() {
        let value = Value::List(vec![Value::from("hello"), Value::Integer(52)]);
        assert_eq!(encode(&value), b"l5:helloi52ee");
    }

    #[test]
    fn test_encode_sorts_keys() {
        let mut dict = Dict::new();
        dict.insert(b"spam".to_vec(), Value::from("eggs"));
        dict.insert(b"cow".to_vec(), Value::from("moo"));
        assert_eq!(encode(&Value::Dict(dict)), b"d3:cow3:moo4:spam4:eggse");
    }

    #[test]
    fn test_canonicalizes_unsorted_input() {
        // Keys out of order on the wire come back sorted
        let value = decode(b"d4:spam4:eggs3:cow3:mooe").unwrap();
        assert_eq!(encode(&value), b"d3:cow3:moo4:spam4:eggse");
    }

    #[test]
    fn test_keys_sort_by_bytes_not_text() {
        let mut dict = Dict::new();
        dict.insert(vec![0xc3, 0xa9], Value::Integer(1));
        dict.insert(b"z".to_vec(), Value::Integer(2));
        dict.insert(b"A".to_vec(), Value::Integer(3));
        let encoded = encode(&Value::Dict(dict));
        assert_eq!(encoded, b"d1:Ai3e1:zi2e2:\xc3\xa9i1ee".to_vec());
    }

    #[test]
    fn test_binary_bytes_survive() {
        let raw: Vec<u8> = (0..=255u8).collect();
        let encoded = encode(&Value::Bytes(raw.clone()));
        let (decoded, consumed) = decode_at(&encoded, 0).unwrap();
        assert_eq!(consumed, encoded.len());
        assert_eq!(decoded, Value::Bytes(raw));
    }

    #[test]
    fn test_reencode_is_stable() {
        let input = b"d8:announce9:localhost4:infod6:lengthi10e4:name1:x12:piece lengthi4e6:pieces0:ee";
        let first = decode(input).unwrap();
        let encoded = encode(&first);
        assert_eq!(encoded, input.to_vec());
        assert_eq!(decode(&encoded).unwrap(), first);
    }

    #[test]
    fn test_matches_serde_bencode() {
        // Independent encoder as an oracle for canonical output
        let input = b"d4:infod6:pieces3:\x00\xff\x10e1:zli1ei-2ee1:a0:e";
        let ours = encode(&decode(input).unwrap());
        let theirs: serde_bencode::value::Value = serde_bencode::from_bytes(input).unwrap();
        assert_eq!(ours, serde_bencode::to_bytes(&theirs).unwrap());
    }
}
