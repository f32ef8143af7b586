//! Error types shared across today-test crates.

/// Type-erased error returned by user-supplied extension points such as
/// context loaders and context close hooks.
///
/// Any `std::error::Error + Send + Sync` converts into it with `?` or `.into()`,
/// and so do plain strings:
///
/// ```
/// use today_test_core::BoxError;
///
/// fn bootstrap(ok: bool) -> Result<(), BoxError> {
///     if !ok {
///         return Err("no configuration classes declared".into());
///     }
///     Ok(())
/// }
///
/// assert!(bootstrap(true).is_ok());
/// assert_eq!(
///     bootstrap(false).unwrap_err().to_string(),
///     "no configuration classes declared"
/// );
/// ```
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
