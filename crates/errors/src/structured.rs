use std::borrow::Cow;

/// Behavior shared by domain errors that end up in front of a user.
///
/// `user_message` is the text shown in a notification; `user_hint` is an
/// optional actionable follow-up; `is_retryable` drives retry/backoff
/// policies in front-ends.
pub trait UserFacingError {
    fn user_message(&self) -> Cow<'_, str>;

    fn user_hint(&self) -> Option<&'static str> {
        None
    }

    fn is_retryable(&self) -> bool {
        false
    }
}
