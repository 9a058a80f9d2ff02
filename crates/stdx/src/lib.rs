//! Small convenience macros shared by every crate in the workspace.

/// Appends formatted text to a `String`, ignoring the (infallible) result.
#[macro_export]
macro_rules! format_to {
    ($buf:expr) => ();
    ($buf:expr, $lit:literal $($arg:tt)*) => {
        { use ::std::fmt::Write as _; let _ = ::std::write!($buf, $lit $($arg)*); }
    };
}

/// Generates `From<Foo> for E` and `TryFrom<E> for Foo` impls for
/// single-field enum variants.
#[macro_export]
macro_rules! impl_from {
    ($($variant:ident),* for $enum:ident) => {
        $(
            impl From<$variant> for $enum {
                fn from(it: $variant) -> $enum {
                    $enum::$variant(it)
                }
            }
            impl TryFrom<$enum> for $variant {
                type Error = ();

                fn try_from(it: $enum) -> Result<$variant, ()> {
                    if let $enum::$variant(it) = it {
                        Ok(it)
                    } else {
                        Err(())
                    }
                }
            }
        )*
    }
}

/// Generates the `From` conversions that make a newtype wrapping a small
/// integer usable as a dense index (`TiVec` key, bit-set element).
#[macro_export]
macro_rules! impl_idx_from {
    ($ty:ident($raw:ident)) => {
        impl From<$raw> for $ty {
            #[inline(always)]
            fn from(it: $raw) -> $ty {
                $ty(it)
            }
        }

        impl From<$ty> for $raw {
            #[inline(always)]
            fn from(it: $ty) -> $raw {
                it.0
            }
        }

        impl From<usize> for $ty {
            #[inline(always)]
            fn from(it: usize) -> $ty {
                ::std::debug_assert!(it < $raw::MAX as usize);
                $ty(it as $raw)
            }
        }

        impl From<$ty> for usize {
            #[inline(always)]
            fn from(it: $ty) -> usize {
                it.0 as usize
            }
        }
    };
}

/// Generates an implementation of the specified `fmt` trait.
///
/// # Example
///
/// ```rust
/// # use stdx::impl_display;
/// # struct Test(u32);
/// impl_display! {
///     match Test { Test(i) => "test{}", i; }
/// }
/// ```
#[macro_export]
macro_rules! impl_fmt {
    ($trait:ident match $ty:ident { $($variant:pat => $fmt:literal $(, $fmt_arg:expr)*;)* }) => {
        impl std::fmt::$trait for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $( $variant => write!(f, $fmt $(, $fmt_arg)*)),*
                }
            }
        }
    };
}

#[macro_export]
macro_rules! impl_debug {
    ($($args:tt)*) => {
        $crate::impl_fmt!(Debug $($args)*);
    };
}

#[macro_export]
macro_rules! impl_display {
    ($($args:tt)*) => {
        $crate::impl_fmt!(Display $($args)*);
    };
}

#[macro_export]
macro_rules! impl_debug_display {
    ($($args:tt)*) => {
        $crate::impl_fmt!(Debug $($args)*);
        $crate::impl_fmt!(Display $($args)*);
    };
}
