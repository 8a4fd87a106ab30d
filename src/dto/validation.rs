//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest free-text guess accepted, in characters.
pub const MAX_GUESS_CHARS: usize = 200;

/// Validates a free-text guess: at most [`MAX_GUESS_CHARS`] characters and no control
/// characters other than whitespace.
///
/// # Examples
///
/// ```ignore
/// validate_guess("Soda Stereo")   // Ok
/// validate_guess("")              // Ok - blank guesses are allowed
/// validate_guess("bell\u{7}")     // Err - control character
/// ```
pub fn validate_guess(guess: &str) -> Result<(), ValidationError> {
    let length = guess.chars().count();
    if length > MAX_GUESS_CHARS {
        let mut err = ValidationError::new("guess_length");
        err.message = Some(
            format!("Guess must be at most {MAX_GUESS_CHARS} characters (got {length})").into(),
        );
        return Err(err);
    }

    if guess.chars().any(|c| c.is_control() && !c.is_whitespace()) {
        let mut err = ValidationError::new("guess_format");
        err.message = Some("Guess must not contain control characters".into());
        return Err(err);
    }

    Ok(())
}
