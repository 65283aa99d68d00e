//! Call-site macros that take the symbolic name from the binding itself.
//!
//! ```
//! use numalloc::{calloc, free, malloc, realloc};
//!
//! calloc!(x, 4, f64);
//! assert_eq!(x.as_slice(), &[0.0; 4]);
//!
//! malloc!(y, 3, i32);
//! y.copy_from_slice(&[7, 8, 9]);
//! realloc!(y, 5);
//! assert_eq!(&y[..3], &[7, 8, 9]);
//!
//! free!(y);
//! assert!(!y.is_owning());
//! ```

/// Declare `let mut $name` and ALLOCATE `$len` elements of `$ty` into it.
///
/// `malloc!(facade => name, len, ty)` binds the handle to an explicit façade.
#[macro_export]
macro_rules! malloc {
    ($facade:expr => $name:ident, $len:expr, $ty:ty) => {
        let mut $name = $facade.buffer::<$ty>(::core::stringify!($name));
        $name.allocate($len);
    };
    ($name:ident, $len:expr, $ty:ty) => {
        let mut $name = $crate::Buffer::<$ty>::new(::core::stringify!($name));
        $name.allocate($len);
    };
}

/// Declare `let mut $name` and ZERO-ALLOCATE `$len` elements of `$ty` into it.
#[macro_export]
macro_rules! calloc {
    ($facade:expr => $name:ident, $len:expr, $ty:ty) => {
        let mut $name = $facade.buffer::<$ty>(::core::stringify!($name));
        $name.zero_allocate($len);
    };
    ($name:ident, $len:expr, $ty:ty) => {
        let mut $name = $crate::Buffer::<$ty>::new(::core::stringify!($name));
        $name.zero_allocate($len);
    };
}

/// RESIZE an existing handle to `$len` elements.
#[macro_export]
macro_rules! realloc {
    ($name:ident, $len:expr) => {
        $name.resize($len);
    };
}

/// RELEASE an existing handle.
#[macro_export]
macro_rules! free {
    ($name:ident) => {
        $name.release();
    };
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::backend::SystemBackend;
    use crate::config::FacadeConfig;
    use crate::facade::Facade;
    use crate::sink::RecordingSink;
    use crate::trace::TraceOp;

    #[test]
    fn macros_stringify_binding_names() {
        let sink = Arc::new(RecordingSink::new());
        let facade = Facade::from_parts(SystemBackend, sink.clone(), FacadeConfig::new());

        malloc!(facade => lambda, 10, i32);
        calloc!(facade => grad, 3, f64);
        realloc!(lambda, 20);
        free!(grad);
        free!(lambda);

        let seen: Vec<(TraceOp, &str)> = sink.events().iter().map(|e| (e.op, e.name)).collect();
        assert_eq!(
            seen,
            vec![
                (TraceOp::Malloc, "lambda"),
                (TraceOp::Calloc, "grad"),
                (TraceOp::Realloc, "lambda"),
                (TraceOp::Free, "grad"),
                (TraceOp::Free, "lambda"),
            ]
        );
    }
}
