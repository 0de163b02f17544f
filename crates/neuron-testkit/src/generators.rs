//! Proptest generators for property-based testing.

use proptest::prelude::*;

use neuron_core::{Request, Timestamp};

/// A request field that passes validation.
pub fn field() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 _.-]{5,40}".prop_map(String::from)
}

/// A request field that fails validation.
pub fn short_field() -> impl Strategy<Value = String> {
    "[a-z0-9]{0,4}".prop_map(String::from)
}

/// A request that passes validation.
pub fn valid_request() -> impl Strategy<Value = Request> {
    prop_oneof![
        (field(), field(), field()).prop_map(|(owner, content, name)| Request::add(
            owner, content, name
        )),
        field().prop_map(Request::get),
        field().prop_map(Request::list),
    ]
}

/// A request with exactly one field too short.
pub fn invalid_request() -> impl Strategy<Value = Request> {
    prop_oneof![
        (short_field(), field(), field()).prop_map(|(owner, content, name)| Request::add(
            owner, content, name
        )),
        (field(), short_field(), field()).prop_map(|(owner, content, name)| Request::add(
            owner, content, name
        )),
        (field(), field(), short_field()).prop_map(|(owner, content, name)| Request::add(
            owner, content, name
        )),
        short_field().prop_map(Request::get),
        short_field().prop_map(Request::list),
    ]
}

/// Payload bytes up to `max_len`, including empty.
pub fn payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// A timestamp within a day of `base`.
pub fn timestamp_near(base: Timestamp) -> impl Strategy<Value = Timestamp> {
    const DAY_MICROS: i64 = 86_400 * 1_000_000;
    (-DAY_MICROS..=DAY_MICROS)
        .prop_map(move |offset| Timestamp::from_micros(base.as_micros() + offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use neuron_core::{validate_request, MIN_FIELD_LEN};

    proptest! {
        #[test]
        fn prop_valid_requests_validate(request in valid_request()) {
            prop_assert!(validate_request(&request).is_ok());
        }

        #[test]
        fn prop_short_fields_are_short(value in short_field()) {
            prop_assert!(value.chars().count() < MIN_FIELD_LEN);
        }

        #[test]
        fn prop_invalid_requests_fail(request in invalid_request()) {
            prop_assert!(validate_request(&request).is_err());
        }
    }
}
