//! Property tests for the wire codec round-trip law.

use enerex::codec::{Field, Message, Value, WireVersion};
use proptest::collection::vec;
use proptest::prelude::*;

fn arb_name() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-z_][a-z0-9_]{0,11}").expect("valid regex")
}

fn arb_text() -> impl Strategy<Value = String> {
    // Includes multi-byte UTF-8 to exercise byte-length prefixes.
    proptest::string::string_regex("[a-zA-Z0-9 µ€ネ]{0,16}").expect("valid regex")
}

fn arb_scalar(allow_bytes: bool) -> BoxedStrategy<Value> {
    let base = prop_oneof![
        any::<i64>().prop_map(Value::Int),
        arb_text().prop_map(Value::Str),
    ];
    if allow_bytes {
        prop_oneof![base, vec(any::<u8>(), 0..24).prop_map(Value::Bytes)].boxed()
    } else {
        base.boxed()
    }
}

fn arb_object(allow_bytes: bool, depth: u32) -> BoxedStrategy<Value> {
    vec(arb_field(allow_bytes, depth), 0..4)
        .prop_map(Value::Object)
        .boxed()
}

/// Lists are uniformly typed: ints, strings, or objects.
fn arb_list(allow_bytes: bool, depth: u32) -> BoxedStrategy<Value> {
    prop_oneof![
        vec(any::<i64>().prop_map(Value::Int), 0..5).prop_map(Value::List),
        vec(arb_text().prop_map(Value::Str), 0..5).prop_map(Value::List),
        vec(arb_object(allow_bytes, depth), 0..3).prop_map(Value::List),
    ]
    .boxed()
}

fn arb_value(allow_bytes: bool, depth: u32) -> BoxedStrategy<Value> {
    if depth == 0 {
        arb_scalar(allow_bytes)
    } else {
        prop_oneof![
            3 => arb_scalar(allow_bytes),
            1 => arb_list(allow_bytes, depth - 1),
            1 => arb_object(allow_bytes, depth - 1),
        ]
        .boxed()
    }
}

fn arb_field(allow_bytes: bool, depth: u32) -> BoxedStrategy<Field> {
    (arb_name(), arb_value(allow_bytes, depth))
        .prop_map(|(name, value)| Field { name, value })
        .boxed()
}

fn arb_message(allow_bytes: bool) -> impl Strategy<Value = Message> {
    vec(arb_field(allow_bytes, 2), 0..6).prop_map(Message::from_fields)
}

proptest! {
    #[test]
    fn roundtrip_v2(message in arb_message(true)) {
        let encoded = message.encode(WireVersion::V2).expect("encode v2");
        let (version, decoded) = Message::decode(&encoded).expect("decode v2");
        prop_assert_eq!(version, WireVersion::V2);
        prop_assert_eq!(decoded, message);
    }

    #[test]
    fn roundtrip_v1(message in arb_message(false)) {
        let encoded = match message.encode(WireVersion::V1) {
            Ok(encoded) => encoded,
            // Generated value exceeded the 16-bit caps; not a round-trip case.
            Err(_) => return Ok(()),
        };
        let (version, decoded) = Message::decode(&encoded).expect("decode v1");
        prop_assert_eq!(version, WireVersion::V1);
        prop_assert_eq!(decoded, message);
    }

    #[test]
    fn v1_frames_decode_with_the_v2_capable_decoder(message in arb_message(false)) {
        // The decoder dispatches on the version byte, so v1 frames are
        // always accepted by the same decoder that handles v2.
        if let Ok(encoded) = message.encode(WireVersion::V1) {
            let (_, decoded) = Message::decode(&encoded).expect("decode");
            prop_assert_eq!(decoded, message);
        }
    }

    #[test]
    fn same_message_both_versions_agree(message in arb_message(false)) {
        let v1 = message.encode(WireVersion::V1);
        let v2 = message.encode(WireVersion::V2).expect("encode v2");
        let (_, from_v2) = Message::decode(&v2).expect("decode v2");
        prop_assert_eq!(&from_v2, &message);
        if let Ok(v1) = v1 {
            let (_, from_v1) = Message::decode(&v1).expect("decode v1");
            prop_assert_eq!(&from_v1, &message);
        }
    }
}
