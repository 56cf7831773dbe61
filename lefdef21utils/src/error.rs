//!
//! # LefDef21 Error-Helper Utilities
//!
//! ```rust
//! use lefdef21utils::error::{ErrorHelper, Unwrapper};
//!
//! /// Example implementer of [`ErrorHelper`].
//! /// Loaders typically report their current file and token upon failure.
//! struct AtToken(&'static str);
//! impl ErrorHelper for AtToken {
//!     type Error = String;
//!
//!     fn err(&self, msg: impl Into<String>) -> Self::Error {
//!         format!("{} (at token `{}`)", msg.into(), self.0)
//!     }
//! }
//! impl AtToken {
//!     fn lookup(&self) -> Result<i32, String> {
//!         // Unwrap an [`Option`]
//!         let x = Some(5).unwrapper(self, "Missing value")?;
//!         // Unwrap a [`Result`]
//!         let y = "7".parse::<i32>().unwrapper(self, "Invalid integer")?;
//!         Ok(x + y)
//!     }
//! }
//! assert_eq!(AtToken("END").lookup(), Ok(12));
//! ```
//!

///
/// # ErrorHelper
///
/// Helper trait for re-use among the several token-stream walkers.
/// Each implementer will generally have some internal state to report upon failure,
/// which it can inject in the implementation-required `err` method.
/// The `fail` method, provided by default, simply returns the `err` value.
///
pub trait ErrorHelper {
    type Error;

    /// Create and return a [Self::Error] value.
    fn err(&self, msg: impl Into<String>) -> Self::Error;
    /// Return failure
    fn fail<T>(&self, msg: impl Into<String>) -> Result<T, Self::Error> {
        Err(self.err(msg))
    }
    /// Unwrap the [Option] `opt` if it is [Some], and return our error if not.
    fn unwrap<T>(&self, opt: Option<T>, msg: impl Into<String>) -> Result<T, Self::Error> {
        match opt {
            Some(val) => Ok(val),
            None => self.fail(msg),
        }
    }
    /// Assert a boolean condition. Returns through `self.fail` if it is not satisfied.
    fn assert(&self, b: bool, msg: impl Into<String>) -> Result<(), Self::Error> {
        match b {
            true => Ok(()),
            false => self.fail(msg),
        }
    }
}

///
/// # Unwrapper
///
/// Post-fix application of [`ErrorHelper`] handling,
/// for the particularly common cases of unwrapping [`Option`]s and [`Result`]s.
///
/// The typical usage is not to implement [`Unwrapper`] for new types,
/// but to import the trait and use it on the standard library [`Option`] and [`Result`] types.
///
pub trait Unwrapper {
    type Ok;
    fn unwrapper<H>(self, helper: &H, msg: impl Into<String>) -> Result<Self::Ok, H::Error>
    where
        H: ErrorHelper;
}

/// # Unwrapper for [`Option`]
impl<T> Unwrapper for Option<T> {
    type Ok = T;
    fn unwrapper<H>(self, helper: &H, msg: impl Into<String>) -> Result<Self::Ok, H::Error>
    where
        H: ErrorHelper,
    {
        match self {
            Some(t) => Ok(t),
            None => helper.fail(msg),
        }
    }
}

/// # Unwrapper for [`Result`]
///
/// The original error is discarded in favor of the helper's.
impl<T, E> Unwrapper for Result<T, E> {
    type Ok = T;
    fn unwrapper<H>(
        self,
        helper: &H,
        msg: impl Into<String>,
    ) -> Result<<Self as Unwrapper>::Ok, H::Error>
    where
        H: ErrorHelper,
    {
        match self {
            Ok(t) => Ok(t),
            Err(_) => helper.fail(msg),
        }
    }
}
