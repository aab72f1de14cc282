//! Result type alias for Cartograph
//!
//! This module provides a convenient Result type alias that uses CartographError
//! as the error type.

use super::errors::CartographError;

/// Result type alias for Cartograph operations
///
/// # Examples
///
/// ```
/// use cartograph::domain::result::Result;
/// use cartograph::domain::errors::CartographError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(CartographError::Validation("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, CartographError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_err() {
        let result: Result<i32> = Err(CartographError::Validation("test error".to_string()));
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
