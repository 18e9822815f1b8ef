use crate::error::ApiError;

/// Hard product policy for the demo, not an engine limit.
pub const MAX_PROMPT_CHARS: usize = 200;
pub const MIN_PROMPT_CHARS: usize = 2;

/// Gate a submission before any model call: consent first, then prompt
/// length in characters (200 exactly is still accepted).
pub fn validate_speech_request(text: &str, consent: bool) -> Result<(), ApiError> {
    if !consent {
        return Err(ApiError::ConsentRequired);
    }

    let chars = text.chars().count();
    if chars < MIN_PROMPT_CHARS {
        return Err(ApiError::PromptTooShort);
    }
    if chars > MAX_PROMPT_CHARS {
        return Err(ApiError::PromptTooLong);
    }

    Ok(())
}
