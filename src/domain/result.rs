//! Result type alias for cardsync
//!
//! This module provides a convenient Result type alias that uses CardSyncError
//! as the error type.

use super::errors::CardSyncError;

/// Result type alias for cardsync operations
///
/// # Examples
///
/// ```
/// use cardsync::domain::result::Result;
/// use cardsync::domain::errors::CardSyncError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(CardSyncError::Validation("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, CardSyncError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::CardSyncError;

    #[test]
    fn test_result_err() {
        let result: Result<i32> = Err(CardSyncError::Validation("test error".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_result_with_question_mark() -> Result<()> {
        fn inner() -> Result<i32> {
            Ok(42)
        }

        let value = inner()?;
        assert_eq!(value, 42);
        Ok(())
    }
}
