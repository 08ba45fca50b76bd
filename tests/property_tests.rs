//! Property-based tests for scalar round trips
//!
//! These tests verify that every supported scalar type survives an
//! insert followed by a primary-key read unchanged, including:
//! - Integer boundaries of every width
//! - Empty, quoted and non-ASCII text
//! - Absent nullable scalars

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use sqlorm::test_utils::DatabaseFixture;
    use sqlorm::{Query, SqlValue};

    sqlorm::orm_entity! {
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct Scalars as "scalars" {
            pub id: i64,
            pub tiny: i8,
            pub small: i16,
            pub int: i32,
            pub big: i64,
            pub byte: u8,
            pub word: u16,
            pub dword: u32,
            pub real: f32,
            pub double: f64,
            pub text: String,
            pub flag: bool,
            pub maybe: Option<i32>,
            pub maybe_text: Option<String>,
        }
    }

    fn round_trip(value: &Scalars) -> Scalars {
        let fixture = DatabaseFixture::new("scalars").unwrap();
        let mapper = fixture.map::<Scalars>().unwrap();
        assert_eq!(fixture.store(&mapper, std::slice::from_ref(value)).unwrap(), vec![1]);
        let mut loaded = fixture
            .load::<Scalars>(&mapper, Query::PrimaryKey(SqlValue::Integer(value.id)))
            .unwrap();
        assert_eq!(loaded.len(), 1);
        loaded.remove(0)
    }

    fn arb_finite_f64() -> impl Strategy<Value = f64> {
        prop::num::f64::NORMAL | prop::num::f64::ZERO | prop::num::f64::SUBNORMAL
    }

    fn arb_finite_f32() -> impl Strategy<Value = f32> {
        prop::num::f32::NORMAL | prop::num::f32::ZERO
    }

    #[allow(clippy::type_complexity)]
    fn arb_integers() -> impl Strategy<Value = (i64, i8, i16, i32, i64, u8, u16, u32)> {
        (
            any::<i64>(),
            any::<i8>(),
            any::<i16>(),
            any::<i32>(),
            any::<i64>(),
            any::<u8>(),
            any::<u16>(),
            any::<u32>(),
        )
    }

    prop_compose! {
        fn arb_scalars()(
            (id, tiny, small, int, big, byte, word, dword) in arb_integers(),
            real in arb_finite_f32(),
            double in arb_finite_f64(),
            text in "\\PC{0,40}",
            flag in any::<bool>(),
            maybe in proptest::option::of(any::<i32>()),
            maybe_text in proptest::option::of("[a-z' ]{0,12}"),
        ) -> Scalars {
            Scalars { id, tiny, small, int, big, byte, word, dword, real, double, text, flag, maybe, maybe_text }
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Any finite scalar row reads back equal to what was written
        #[test]
        fn prop_scalars_round_trip(value in arb_scalars()) {
            let loaded = round_trip(&value);
            prop_assert_eq!(loaded, value);
        }
    }

    #[test]
    fn test_integer_boundaries() {
        let extremes = [
            Scalars {
                id: i64::MIN,
                tiny: i8::MIN,
                small: i16::MIN,
                int: i32::MIN,
                big: i64::MIN,
                byte: u8::MIN,
                word: u16::MIN,
                dword: u32::MIN,
                real: f32::MIN_POSITIVE,
                double: f64::MIN,
                ..Scalars::default()
            },
            Scalars {
                id: i64::MAX,
                tiny: i8::MAX,
                small: i16::MAX,
                int: i32::MAX,
                big: i64::MAX,
                byte: u8::MAX,
                word: u16::MAX,
                dword: u32::MAX,
                real: f32::MAX,
                double: f64::MAX,
                flag: true,
                ..Scalars::default()
            },
        ];
        for value in &extremes {
            assert_eq!(&round_trip(value), value);
        }
    }

    #[test]
    fn test_text_edge_cases() {
        for text in ["", "it's", "\"quoted\"", "naïve 東京", "line\nbreak"] {
            let value = Scalars { id: 1, text: text.to_string(), ..Scalars::default() };
            assert_eq!(round_trip(&value).text, text);
        }
    }

    #[test]
    fn test_absent_nullable_scalars_stay_absent() {
        let value = Scalars { id: 4, maybe: None, maybe_text: None, ..Scalars::default() };
        let loaded = round_trip(&value);
        assert_eq!(loaded.maybe, None);
        assert_eq!(loaded.maybe_text, None);

        let present = Scalars { id: 5, maybe: Some(0), maybe_text: Some(String::new()), ..Scalars::default() };
        let loaded = round_trip(&present);
        assert_eq!(loaded.maybe, Some(0));
        assert_eq!(loaded.maybe_text, Some(String::new()));
    }
}
