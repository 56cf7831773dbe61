//!
//! # Enum-String Mapping Module
//!
//! Primarily defines the [enumstr] macro and paired [EnumStr] trait,
//! for defining a mapping between an enum and a closed set of strings.
//! LEF, DEF and Verilog all expose enumerated values (macro classes, pin directions,
//! orientations, and the like) as one of a fixed set of keywords.
//!
//! The [EnumStr] trait defines three methods:
//! * `to_str(&self) -> &'static str` converts the enum to its String value.
//! * `from_str(&str) -> Option<Self>` does the opposite, returning an [Option] indicator of success or failure.
//! * `variants() -> &'static [&'static str]` lists every accepted string, for error reporting.
//!
//! Example:
//!
//! ```rs
//! use lefdef21utils::enumstr;
//!
//! enumstr!(
//! /// # Placement Status
//! PlaceStatus {
//!     Placed: "PLACED",
//!     Fixed: "FIXED",
//!  }
//! );
//! ```
//!

///
/// # String-Enumeration Trait
///
/// While [EnumStr] can be implemented by any type, its primary intent is
/// for implementation by the [enumstr] macro.
///
pub trait EnumStr: std::marker::Sized {
    fn to_str(&self) -> &'static str;
    fn from_str(txt: &str) -> Option<Self>;
    fn variants() -> &'static [&'static str];
}

///
/// # Enum-String Pairing Macro
///
/// For creating an `enum` which:
/// * (a) Has paired string-values, as commonly arrive in text-format fields.
/// * (b) Automatically implements the [EnumStr] trait for conversions to and from these strings.
/// * (c) Automatically implements [std::fmt::Display] writing the string-values
///
/// All variants are fieldless. Derived implementations include `serde::{Serialize,Deserialize}`
/// (which must be in scope at the invocation site) and [Hash].
/// Additional derives can be passed as attributes ahead of the enum name.
///
#[macro_export]
macro_rules! enumstr {
    (   $(#[$meta: meta])*
        $enum_name: ident {
        $( $variant: ident : $strval: literal ),* $(,)?
    }) => {
        $(#[$meta])*
        #[allow(dead_code)]
        #[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
        pub enum $enum_name {
            $( #[doc=$strval]
                $variant ),*
        }
        impl EnumStr for $enum_name {
            /// Convert a [$enum_name] variant to its paired (static) string value.
            fn to_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $strval),*,
                }
            }
            /// Create a [$enum_name] from one of its string-values.
            /// Returns `None` if input `txt` does not match one of [$enum_name]'s variants.
            /// Matching is case *sensitive*. All three formats write their keywords in a single case.
            fn from_str(txt: &str) -> Option<Self> {
                match txt {
                    $( $strval => Some(Self::$variant)),*,
                    _ => None,
                }
            }
            /// List all string-values, in declaration order.
            fn variants() -> &'static [&'static str] {
                &[$( $strval ),*]
            }
        }
        impl ::std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                write!(f, "{}", self.to_str())
            }
        }
    }
}
