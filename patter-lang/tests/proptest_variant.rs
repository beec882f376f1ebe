// patter-lang - Property-based tests for Variant serialization and hashing
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Property-based tests for the Variant value model.
//!
//! Exercises the serialization round-trip contract
//! (`deserialize(serialize(v)) == v` for every serializable type) and the
//! hash contract (equal values hash equally), which map keys depend on.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use proptest::prelude::*;

use patter_lang::{BinaryReader, BinaryWriter, Collection, ValueType, Variant};

fn round_trip(v: &Variant) -> Variant {
    let mut w = BinaryWriter::new();
    v.write(&mut w).expect("serializable");
    let data = w.into_inner();
    Variant::read(&mut BinaryReader::new(&data)).expect("deserializable")
}

fn hash_of(v: &Variant) -> u64 {
    let mut h = DefaultHasher::new();
    v.hash(&mut h);
    h.finish()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn integer_round_trip(n in any::<i64>()) {
        let v = Variant::Integer(n);
        prop_assert_eq!(round_trip(&v), v);
    }

    #[test]
    fn number_round_trip(n in any::<f64>().prop_filter("finite", |f| f.is_finite())) {
        let v = Variant::Number(n);
        prop_assert_eq!(round_trip(&v), v);
    }

    #[test]
    fn boolean_round_trip(b in any::<bool>()) {
        let v = Variant::Boolean(b);
        prop_assert_eq!(round_trip(&v), v);
    }

    #[test]
    fn string_round_trip(s in ".*") {
        let v = Variant::String(s);
        prop_assert_eq!(round_trip(&v), v.clone());
    }

    #[test]
    fn guid_round_trip(bytes in any::<[u8; 16]>()) {
        let v = Variant::Guid(patter_lang::Uuid::from_bytes(bytes));
        prop_assert_eq!(round_trip(&v), v);
    }

    #[test]
    fn collection_round_trip(entries in prop::collection::vec((any::<i64>(), ".{0,12}"), 0..8)) {
        let coll = Collection::from_pairs(
            entries
                .iter()
                .map(|(k, v)| (Variant::Integer(*k), Variant::String(v.clone()))),
        );
        let expected = coll.snapshot();
        let restored = round_trip(&Variant::Collection(coll));
        let inner = restored.as_collection().expect("collection");
        prop_assert_eq!(inner.snapshot(), expected);
    }

    #[test]
    fn hash_consistent_with_numeric_equality(n in -1_000_000i64..1_000_000) {
        let int = Variant::Integer(n);
        let num = Variant::Number(n as f64);
        prop_assert_eq!(&int, &num);
        prop_assert_eq!(hash_of(&int), hash_of(&num));
    }

    #[test]
    fn serialized_form_is_deterministic(n in any::<i64>(), s in ".{0,16}") {
        let v = Variant::Collection(Collection::from_pairs(vec![
            (Variant::Integer(n), Variant::String(s)),
        ]));
        let mut w1 = BinaryWriter::new();
        let mut w2 = BinaryWriter::new();
        v.write(&mut w1).expect("serializable");
        v.write(&mut w2).expect("serializable");
        prop_assert_eq!(w1.into_inner(), w2.into_inner());
    }

    #[test]
    fn value_type_tags_stable(tag in 0u8..10) {
        let t = ValueType::from_byte(tag).expect("valid tag");
        prop_assert_eq!(t.to_byte(), tag);
    }
}
