//! Request validation, applied before any storage access.

use crate::error::Status;
use crate::request::Request;

/// Minimum length, in characters, of every request field.
///
/// Counted in Unicode scalar values, not UTF-8 bytes: `"éééé"` is four
/// characters (eight bytes) and is rejected. Earlier deployments counted
/// bytes and accepted it.
pub const MIN_FIELD_LEN: usize = 5;

/// Maximum number of documents returned by one `List`.
pub const LIST_LIMIT: usize = 100;

/// Validate a decoded request.
///
/// Failures are `InvalidArgument` and scoped to the single message; the
/// session stays usable.
pub fn validate_request(request: &Request) -> Result<(), Status> {
    match request {
        Request::Add(add) => {
            check_len("owner", &add.owner)?;
            check_len("name", &add.name)?;
            check_len("content", &add.content)
        }
        Request::Get(get) => check_len("id", &get.id),
        Request::List(list) => check_len("owner", &list.owner),
    }
}

fn check_len(field: &str, value: &str) -> Result<(), Status> {
    if value.chars().count() < MIN_FIELD_LEN {
        return Err(Status::invalid_argument(format!("{} is too short", field)));
    }
    Ok(())
}
