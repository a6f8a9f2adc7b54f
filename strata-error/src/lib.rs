#![feature(error_generic_member_access)]
#![deny(missing_docs)]

//! Error handling for the Strata storage engine.
//!
//! Every fallible operation in the workspace returns a [`StrataResult`]. Errors fall into a small
//! set of categories: malformed files, precondition violations (bad arguments, out-of-range
//! indices, unsupported conversions), internal consistency failures, and I/O failures. None of
//! them are swallowed by the engine; recovery is left to the caller.

mod ext;

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::fmt::{Debug, Display, Formatter};
use std::ops::Deref;
use std::{env, fmt, io};

pub use ext::*;

/// A string that can be used as an error message.
#[derive(Debug)]
pub struct ErrString(Cow<'static, str>);

#[allow(clippy::fallible_impl_from, clippy::panic)]
impl<T> From<T> for ErrString
where
    T: Into<Cow<'static, str>>,
{
    fn from(msg: T) -> Self {
        if env::var("STRATA_PANIC_ON_ERR").as_deref().unwrap_or("") == "1" {
            panic!("{}\nBacktrace:\n{}", msg.into(), Backtrace::capture());
        } else {
            Self(msg.into())
        }
    }
}

impl AsRef<str> for ErrString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for ErrString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for ErrString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// The top-level error type for Strata.
#[derive(thiserror::Error)]
#[non_exhaustive]
pub enum StrataError {
    /// An index is out of bounds.
    #[error("index {0} out of bounds from {1} to {2}\nBacktrace:\n{3}")]
    OutOfBounds(usize, usize, usize, Backtrace),
    /// A value does not fit the range of the requested type.
    #[error("{0} is out of range\nBacktrace:\n{1}")]
    OutOfRange(ErrString, Backtrace),
    /// An invalid argument was provided by the caller.
    #[error("{0}\nBacktrace:\n{1}")]
    InvalidArgument(ErrString, Backtrace),
    /// A file or encoded block could not be parsed.
    #[error("malformed: {0}\nBacktrace:\n{1}")]
    Malformed(ErrString, Backtrace),
    /// An operation is not supported for the given type.
    #[error("function {0} not implemented for {1}\nBacktrace:\n{2}")]
    NotImplemented(ErrString, ErrString, Backtrace),
    /// A value did not have the type the caller expected.
    #[error("expected type: {0} but instead got {1}\nBacktrace:\n{2}")]
    MismatchedTypes(ErrString, ErrString, Backtrace),
    /// The engine disagrees with itself. Always a bug, never a data condition.
    #[error("internal error: {0}\nBacktrace:\n{1}")]
    Internal(ErrString, Backtrace),
    /// The resource has already been released.
    #[error("{0} has already been disposed\nBacktrace:\n{1}")]
    Disposed(ErrString, Backtrace),
    /// An error wrapped with additional context.
    #[error("{0}: {1}")]
    Context(ErrString, #[source] Box<StrataError>),
    /// A wrapper for IO errors.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// A wrapper for integer conversion failures.
    #[error(transparent)]
    TryFromInt(#[from] std::num::TryFromIntError),
    /// A wrapper for JSON (de)serialization errors.
    #[cfg(feature = "serde")]
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl StrataError {
    /// Adds additional context to an error.
    pub fn with_context<T: Into<ErrString>>(self, msg: T) -> Self {
        StrataError::Context(msg.into(), Box::new(self))
    }

    /// Returns true if the error, or any error it wraps, is an out-of-bounds index or an
    /// out-of-range value.
    pub fn is_out_of_bounds(&self) -> bool {
        match self {
            StrataError::OutOfBounds(..) | StrataError::OutOfRange(..) => true,
            StrataError::Context(_, inner) => inner.is_out_of_bounds(),
            _ => false,
        }
    }

    /// Returns true if the error, or any error it wraps, reports a malformed file.
    pub fn is_malformed(&self) -> bool {
        match self {
            StrataError::Malformed(..) => true,
            StrataError::Context(_, inner) => inner.is_malformed(),
            _ => false,
        }
    }

    /// Returns true if the error, or any error it wraps, reports a disposed resource.
    pub fn is_disposed(&self) -> bool {
        match self {
            StrataError::Disposed(..) => true,
            StrataError::Context(_, inner) => inner.is_disposed(),
            _ => false,
        }
    }

    /// Returns true if the error, or any error it wraps, reports an unsupported operation.
    pub fn is_not_implemented(&self) -> bool {
        match self {
            StrataError::NotImplemented(..) => true,
            StrataError::Context(_, inner) => inner.is_not_implemented(),
            _ => false,
        }
    }
}

impl Debug for StrataError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl From<StrataError> for io::Error {
    fn from(value: StrataError) -> Self {
        match value {
            StrataError::Io(io) => io,
            StrataError::Malformed(..) => io::Error::new(io::ErrorKind::InvalidData, value),
            other => io::Error::other(other),
        }
    }
}

/// A type alias for Results that return StrataErrors as their error type.
pub type StrataResult<T> = Result<T, StrataError>;

/// A trait for unwrapping a StrataResult.
pub trait StrataUnwrap {
    /// The type of the value being unwrapped.
    type Output;

    /// Returns the value of the result if it is Ok, otherwise panics with the error.
    /// Should be called only in contexts where the error condition represents a bug (programmer error).
    fn strata_unwrap(self) -> Self::Output;
}

/// A trait for expect-ing a StrataResult or an Option.
pub trait StrataExpect {
    /// The type of the value being expected.
    type Output;

    /// Returns the value of the result if it is Ok, otherwise panics with the error.
    /// Should be called only in contexts where the error condition represents a bug (programmer error).
    fn strata_expect(self, msg: &str) -> Self::Output;
}

#[allow(clippy::panic)]
impl<T, E> StrataUnwrap for Result<T, E>
where
    E: Into<StrataError>,
{
    type Output = T;

    #[inline(always)]
    fn strata_unwrap(self) -> Self::Output {
        self.map_err(|err| err.into())
            .unwrap_or_else(|err| crate::strata_panic!(err))
    }
}

#[allow(clippy::panic)]
impl<T, E> StrataExpect for Result<T, E>
where
    E: Into<StrataError>,
{
    type Output = T;

    #[inline(always)]
    fn strata_expect(self, msg: &str) -> Self::Output {
        self.map_err(|err| err.into())
            .unwrap_or_else(|e| crate::strata_panic!(e.with_context(msg.to_string())))
    }
}

#[allow(clippy::panic)]
impl<T> StrataExpect for Option<T> {
    type Output = T;

    #[inline(always)]
    fn strata_expect(self, msg: &str) -> Self::Output {
        self.unwrap_or_else(|| {
            let err = StrataError::Internal(msg.to_string().into(), Backtrace::capture());
            crate::strata_panic!(err)
        })
    }
}

/// A convenient macro for creating a StrataError.
#[macro_export]
macro_rules! strata_err {
    (OutOfBounds: $idx:expr, $start:expr, $stop:expr) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use(
            $crate::StrataError::OutOfBounds($idx, $start, $stop, Backtrace::capture())
        )
    }};
    (NotImplemented: $func:expr, $by_whom:expr) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use(
            $crate::StrataError::NotImplemented($func.into(), format!("{}", $by_whom).into(), Backtrace::capture())
        )
    }};
    (MismatchedTypes: $expected:literal, $actual:expr) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use(
            $crate::StrataError::MismatchedTypes($expected.into(), $actual.to_string().into(), Backtrace::capture())
        )
    }};
    (MismatchedTypes: $expected:expr, $actual:expr) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use(
            $crate::StrataError::MismatchedTypes($expected.to_string().into(), $actual.to_string().into(), Backtrace::capture())
        )
    }};
    (Context: $msg:literal, $err:expr) => {{
        $crate::__private::must_use(
            $crate::StrataError::Context($msg.into(), Box::new($err))
        )
    }};
    ($variant:ident: $fmt:literal $(, $arg:expr)* $(,)?) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use(
            $crate::StrataError::$variant(format!($fmt, $($arg),*).into(), Backtrace::capture())
        )
    }};
    ($variant:ident: $err:expr $(,)?) => {
        $crate::__private::must_use(
            $crate::StrataError::$variant($err)
        )
    };
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::strata_err!(InvalidArgument: $fmt, $($arg),*)
    };
}

/// A convenient macro for returning a StrataError.
#[macro_export]
macro_rules! strata_bail {
    ($($tt:tt)+) => {
        return Err($crate::strata_err!($($tt)+))
    };
}

/// A convenient macro for panicking with a StrataError in the presence of a programmer error
/// (e.g., an invariant has been violated).
#[macro_export]
macro_rules! strata_panic {
    (OutOfBounds: $idx:expr, $start:expr, $stop:expr) => {{
        $crate::strata_panic!($crate::strata_err!(OutOfBounds: $idx, $start, $stop))
    }};
    (Context: $msg:literal, $err:expr) => {{
        $crate::strata_panic!($crate::strata_err!(Context: $msg, $err))
    }};
    ($variant:ident: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::strata_panic!($crate::strata_err!($variant: $fmt, $($arg),*))
    };
    ($err:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
        let err: $crate::StrataError = $err;
        panic!("{}", err.with_context(format!($fmt, $($arg),*)))
    }};
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::strata_panic!($crate::strata_err!($fmt, $($arg),*))
    };
    ($err:expr) => {{
        let err: $crate::StrataError = $err;
        panic!("{}", err)
    }};
}

#[doc(hidden)]
pub mod __private {
    #[doc(hidden)]
    #[inline]
    #[must_use]
    pub const fn must_use(error: crate::StrataError) -> crate::StrataError {
        error
    }
}
