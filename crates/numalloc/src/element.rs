//! Element types storable in a [`Buffer`](crate::Buffer).

use std::fmt;

/// A plain numeric value that can live in a façade-managed region.
///
/// # Safety
///
/// Implementors must be plain old data: no drop glue, every bit pattern of
/// `size_of::<Self>()` bytes is a valid value, and the all-zero bit pattern
/// is [`Element::ZERO`]. The façade relies on this when it hands freshly
/// zeroed backend memory to safe code.
pub unsafe trait Element: Copy + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Diagnostic type name (`int32`, `float64`, ...).
    const TYPE_NAME: &'static str;
    /// The zero value written by ZERO-ALLOCATE.
    const ZERO: Self;
}

macro_rules! impl_element {
    ($($ty:ty => $name:literal, $zero:expr;)*) => {
        $(
            // SAFETY: primitive numeric type; all-zero bytes is `0`/`0.0`.
            unsafe impl Element for $ty {
                const TYPE_NAME: &'static str = $name;
                const ZERO: Self = $zero;
            }
        )*
    };
}

impl_element! {
    i8 => "int8", 0;
    i16 => "int16", 0;
    i32 => "int32", 0;
    i64 => "int64", 0;
    isize => "isize", 0;
    u8 => "uint8", 0;
    u16 => "uint16", 0;
    u32 => "uint32", 0;
    u64 => "uint64", 0;
    usize => "usize", 0;
    f32 => "float32", 0.0;
    f64 => "float64", 0.0;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zero_bytes_match<T: Element>() -> bool {
        let zero = T::ZERO;
        // SAFETY: reading the bytes of a live `Copy` value.
        let bytes = unsafe {
            std::slice::from_raw_parts((&zero as *const T).cast::<u8>(), size_of::<T>())
        };
        bytes.iter().all(|&b| b == 0)
    }

    #[test]
    fn zero_constants_are_all_zero_bytes() {
        assert!(zero_bytes_match::<i8>());
        assert!(zero_bytes_match::<i32>());
        assert!(zero_bytes_match::<u64>());
        assert!(zero_bytes_match::<usize>());
        assert!(zero_bytes_match::<f32>());
        assert!(zero_bytes_match::<f64>());
    }

    #[test]
    fn type_names_follow_width_convention() {
        assert_eq!(i32::TYPE_NAME, "int32");
        assert_eq!(f64::TYPE_NAME, "float64");
        assert_eq!(u8::TYPE_NAME, "uint8");
        assert_eq!(f32::TYPE_NAME, "float32");
    }
}
