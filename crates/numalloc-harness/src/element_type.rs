//! Runtime element-type selection.

use clap::ValueEnum;
use serde::Serialize;

use numalloc::Element;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
}

impl ElementType {
    /// Name used in diagnostic lines; matches [`Element::TYPE_NAME`].
    #[must_use]
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::Int8 => i8::TYPE_NAME,
            Self::Int16 => i16::TYPE_NAME,
            Self::Int32 => i32::TYPE_NAME,
            Self::Int64 => i64::TYPE_NAME,
            Self::Uint8 => u8::TYPE_NAME,
            Self::Uint16 => u16::TYPE_NAME,
            Self::Uint32 => u32::TYPE_NAME,
            Self::Uint64 => u64::TYPE_NAME,
            Self::Float32 => f32::TYPE_NAME,
            Self::Float64 => f64::TYPE_NAME,
        }
    }
}

/// Expand `$body` with `$t` bound to the Rust type selected by `$ty`.
#[macro_export]
macro_rules! with_element_type {
    ($ty:expr, $t:ident => $body:expr) => {
        match $ty {
            $crate::ElementType::Int8 => {
                type $t = i8;
                $body
            }
            $crate::ElementType::Int16 => {
                type $t = i16;
                $body
            }
            $crate::ElementType::Int32 => {
                type $t = i32;
                $body
            }
            $crate::ElementType::Int64 => {
                type $t = i64;
                $body
            }
            $crate::ElementType::Uint8 => {
                type $t = u8;
                $body
            }
            $crate::ElementType::Uint16 => {
                type $t = u16;
                $body
            }
            $crate::ElementType::Uint32 => {
                type $t = u32;
                $body
            }
            $crate::ElementType::Uint64 => {
                type $t = u64;
                $body
            }
            $crate::ElementType::Float32 => {
                type $t = f32;
                $body
            }
            $crate::ElementType::Float64 => {
                type $t = f64;
                $body
            }
        }
    };
}
