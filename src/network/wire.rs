use num_bigint_dig::{BigInt, Sign};

use crate::error::ProtocolError;

use super::Message;

const SIGN_PLUS: u8 = 0;
const SIGN_MINUS: u8 = 1;

/// Sign byte followed by the big-endian magnitude; the container supplies
/// the length prefix.
pub fn encode_int(v: &BigInt) -> Vec<u8> {
    let (sign, magnitude) = v.to_bytes_be();
    let mut out = Vec::with_capacity(magnitude.len() + 1);
    out.push(if sign == Sign::Minus { SIGN_MINUS } else { SIGN_PLUS });
    out.extend_from_slice(&magnitude);
    out
}

pub fn decode_int(bytes: &[u8]) -> Result<BigInt, ProtocolError> {
    let (&sign, magnitude) = bytes
        .split_first()
        .ok_or_else(|| ProtocolError::decode("wire.int", "empty integer payload"))?;
    let sign = match (sign, magnitude.is_empty()) {
        (SIGN_PLUS, true) => Sign::NoSign,
        (SIGN_PLUS, false) => Sign::Plus,
        (SIGN_MINUS, false) => Sign::Minus,
        _ => {
            return Err(ProtocolError::decode(
                "wire.int",
                format!("invalid sign byte {sign:#04x}"),
            ))
        }
    };
    Ok(BigInt::from_bytes_be(sign, magnitude))
}

pub fn encode(msg: &Message) -> Result<Vec<u8>, ProtocolError> {
    bincode::serialize(msg).map_err(|e| ProtocolError::decode("wire.encode", e.to_string()))
}

pub fn decode(bytes: &[u8]) -> Result<Message, ProtocolError> {
    bincode::deserialize(bytes).map_err(|e| ProtocolError::decode("wire.decode", e.to_string()))
}

/// serde adapter for a single `BigInt` field.
pub mod big_int {
    use num_bigint_dig::BigInt;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &BigInt, serializer: S) -> Result<S::Ok, S::Error> {
        super::encode_int(value).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigInt, D::Error> {
        let bytes = Vec::<u8>::deserialize(deserializer)?;
        super::decode_int(&bytes).map_err(D::Error::custom)
    }
}

/// serde adapter for a vector of `BigInt` fields.
pub mod big_int_vec {
    use num_bigint_dig::BigInt;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(values: &[BigInt], serializer: S) -> Result<S::Ok, S::Error> {
        let encoded: Vec<Vec<u8>> = values.iter().map(|v| super::encode_int(v)).collect();
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<BigInt>, D::Error> {
        let encoded = Vec::<Vec<u8>>::deserialize(deserializer)?;
        encoded
            .iter()
            .map(|bytes| super::decode_int(bytes).map_err(D::Error::custom))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::Zero;

    #[test]
    fn test_int_round_trip() {
        for v in [
            BigInt::zero(),
            BigInt::from(1u32),
            BigInt::from(-1i32),
            BigInt::from(0xdead_beefu64),
            -BigInt::from(u64::MAX) * BigInt::from(u64::MAX),
        ] {
            assert_eq!(decode_int(&encode_int(&v)).unwrap(), v);
        }
    }

    #[test]
    fn test_truncated_int_rejected() {
        let err = decode_int(&[]);
        assert!(matches!(err, Err(ProtocolError::Decode { .. })));

        // minus sign with no magnitude
        let err = decode_int(&[1]);
        assert!(matches!(err, Err(ProtocolError::Decode { .. })));
    }

    #[test]
    fn test_message_round_trip() {
        let msg = Message::LsicB {
            index: 3,
            tb: BigInt::from(123_456u64),
            bi: BigInt::from(789u64),
        };
        let bytes = encode(&msg).unwrap();
        match decode(&bytes).unwrap() {
            Message::LsicB { index, tb, bi } => {
                assert_eq!(index, 3);
                assert_eq!(tb, BigInt::from(123_456u64));
                assert_eq!(bi, BigInt::from(789u64));
            }
            other => panic!("wrong variant {}", other.label()),
        }
    }

    #[test]
    fn test_truncated_message_rejected() {
        let msg = Message::DgkResult(BigInt::from(5u32));
        let bytes = encode(&msg).unwrap();
        let err = decode(&bytes[..bytes.len() - 2]);
        assert!(matches!(err, Err(ProtocolError::Decode { .. })));
    }
}
