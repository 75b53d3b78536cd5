use fieldlink_codec::{
    bytes_to_values, pack_bools, reorder_chunks, reorder_words, unpack_bools, values_to_bytes,
    Endian, TextEncoding, Value, ValueKind, WordOrder,
};
use proptest::prelude::*;

fn order_strategy() -> impl Strategy<Value = WordOrder> {
    prop_oneof![
        Just(WordOrder::Abcd),
        Just(WordOrder::Badc),
        Just(WordOrder::Cdab),
        Just(WordOrder::Dcba),
    ]
}

fn endian_strategy() -> impl Strategy<Value = Endian> {
    prop_oneof![Just(Endian::Little), Just(Endian::Big)]
}

fn round_trip(values: Vec<Value>, kind: ValueKind, endian: Endian) -> Vec<Value> {
    let packed = values_to_bytes(&values, kind, TextEncoding::Utf8, endian).unwrap();
    bytes_to_values(&packed, kind, 0, values.len(), TextEncoding::Utf8, endian).unwrap()
}

proptest! {
    /// Property: every order is its own inverse, on any length.
    #[test]
    fn prop_reorder_is_involution(
        buf in prop::collection::vec(any::<u8>(), 0..64),
        order in order_strategy(),
    ) {
        let once = reorder_words(&buf, order);
        let twice = reorder_words(&once, order);
        prop_assert_eq!(&twice[..], &buf[..]);
    }

    #[test]
    fn prop_abcd_is_identity(buf in prop::collection::vec(any::<u8>(), 0..64)) {
        prop_assert_eq!(&reorder_words(&buf, WordOrder::Abcd)[..], &buf[..]);
    }

    #[test]
    fn prop_chunked_reorder_preserves_length(
        buf in prop::collection::vec(any::<u8>(), 0..64),
        order in order_strategy(),
        width in prop_oneof![Just(2usize), Just(4usize), Just(8usize)],
    ) {
        prop_assert_eq!(reorder_chunks(&buf, order, width).len(), buf.len());
    }

    /// Property: N booleans pack into ceil(N/8) bytes and unpack exactly.
    #[test]
    fn prop_bool_packing_is_exact(bits in prop::collection::vec(any::<bool>(), 0..70)) {
        let packed = pack_bools(&bits);
        prop_assert_eq!(packed.len(), bits.len().div_ceil(8));
        prop_assert_eq!(unpack_bools(&packed, bits.len()), bits);
    }

    #[test]
    fn prop_i16_round_trip(
        values in prop::collection::vec(any::<i16>(), 1..16),
        endian in endian_strategy(),
    ) {
        let values: Vec<Value> = values.into_iter().map(Value::from).collect();
        prop_assert_eq!(round_trip(values.clone(), ValueKind::Int16Array, endian), values);
    }

    #[test]
    fn prop_u32_round_trip(
        values in prop::collection::vec(any::<u32>(), 1..16),
        endian in endian_strategy(),
    ) {
        let values: Vec<Value> = values.into_iter().map(Value::from).collect();
        prop_assert_eq!(round_trip(values.clone(), ValueKind::UInt32Array, endian), values);
    }

    #[test]
    fn prop_i64_round_trip(
        values in prop::collection::vec(any::<i64>(), 1..16),
        endian in endian_strategy(),
    ) {
        let values: Vec<Value> = values.into_iter().map(Value::from).collect();
        prop_assert_eq!(round_trip(values.clone(), ValueKind::Int64Array, endian), values);
    }

    #[test]
    fn prop_f64_round_trip(
        values in prop::collection::vec(-1.0e12f64..1.0e12, 1..16),
        endian in endian_strategy(),
    ) {
        let values: Vec<Value> = values.into_iter().map(Value::from).collect();
        prop_assert_eq!(round_trip(values.clone(), ValueKind::DoubleArray, endian), values);
    }
}

#[test]
fn round_trip_spans_kind_extremes() {
    let cases: Vec<(ValueKind, Vec<Value>)> = vec![
        (ValueKind::Int8Array, vec![i8::MIN.into(), 0i8.into(), i8::MAX.into()]),
        (ValueKind::UInt8Array, vec![u8::MIN.into(), u8::MAX.into()]),
        (ValueKind::UInt16Array, vec![u16::MIN.into(), u16::MAX.into()]),
        (ValueKind::Int32Array, vec![i32::MIN.into(), i32::MAX.into()]),
        (ValueKind::UInt64Array, vec![u64::MIN.into(), u64::MAX.into()]),
        (ValueKind::FloatArray, vec![f32::MIN.into(), f32::MAX.into()]),
        (ValueKind::BoolArray, vec![true.into(), false.into(), true.into()]),
    ];
    for (kind, values) in cases {
        for endian in [Endian::Little, Endian::Big] {
            assert_eq!(round_trip(values.clone(), kind, endian), values, "{kind} {endian}");
        }
    }
}

#[test]
fn byte_array_round_trips_as_one_slice() {
    let raw = Value::from(vec![0x68u8, 0x03, 0xAA]);
    let packed = values_to_bytes(
        std::slice::from_ref(&raw),
        ValueKind::ByteArray,
        TextEncoding::Utf8,
        Endian::Little,
    )
    .unwrap();
    let back = bytes_to_values(
        &packed,
        ValueKind::ByteArray,
        0,
        packed.len(),
        TextEncoding::Utf8,
        Endian::Little,
    )
    .unwrap();
    assert_eq!(back, vec![raw]);
}
