use crate::{ErrString, StrataResult};

/// Extension trait for [`StrataResult`].
pub trait ResultExt<T>: private::Sealed {
    /// Wrap the error, if any, with a lazily built context message.
    fn with_context<F, S>(self, context: F) -> StrataResult<T>
    where
        F: FnOnce() -> S,
        S: Into<ErrString>;
}

mod private {
    use crate::StrataResult;

    pub trait Sealed {}

    impl<T> Sealed for StrataResult<T> {}
}

impl<T> ResultExt<T> for StrataResult<T> {
    fn with_context<F, S>(self, context: F) -> StrataResult<T>
    where
        F: FnOnce() -> S,
        S: Into<ErrString>,
    {
        self.map_err(|e| e.with_context(context()))
    }
}
