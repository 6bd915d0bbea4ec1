use crate::error::ApiError;

/// Parse the `:id` path segment. Anything but a plain positive integer is a 400.
pub fn parse_note_id(raw: &str) -> Result<i32, ApiError> {
    raw.parse::<i32>()
        .ok()
        .filter(|id| *id > 0 && !raw.starts_with('+'))
        .ok_or_else(|| ApiError::bad_request("Invalid note ID"))
}
