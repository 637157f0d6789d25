//! The [`decl_keyword!`] macro, used to declare the keyword enum for one
//! kind of network document.

/// Declare an enum implementing [`Keyword`](crate::parse::keyword::Keyword).
///
/// ```ignore
/// decl_keyword! {
///     pub(crate) HsOuterKwd {
///         "hs-descriptor" => HS_DESCRIPTOR,
///         "descriptor-lifetime" => DESCRIPTOR_LIFETIME,
///     }
/// }
/// ```
///
/// generates an enum `HsOuterKwd` with one variant per right-hand-side
/// identifier, plus a trailing `UNRECOGNIZED` catch-all variant used for any
/// keyword string that doesn't appear in the table. More than one string may
/// map to the same variant (as happens for legacy keyword aliases); a
/// keyword string beginning with `@` denotes an annotation.
macro_rules! decl_keyword {
    {
        $(#[$meta:meta])*
        $v:vis $name:ident {
            $( $s:literal => $variant:ident ),* $(,)?
        }
    } => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
        #[allow(non_camel_case_types)]
        #[allow(clippy::exhaustive_enums)]
        $v enum $name {
            $( $variant, )*
            /// Catch-all for any keyword not recognized by this table.
            UNRECOGNIZED,
        }

        #[allow(non_upper_case_globals, dead_code)]
        impl $name {
            /// Every distinct variant, in declaration order, followed by
            /// the catch-all.
            const ALL: &'static [$name] = &[ $($name::$variant,)* $name::UNRECOGNIZED ];
        }

        impl $crate::parse::keyword::Keyword for $name {
            fn idx(self) -> usize {
                #[allow(clippy::unwrap_used)]
                Self::ALL.iter().position(|k| *k == self).unwrap()
            }
            fn n_vals() -> usize {
                Self::ALL.len()
            }
            fn all_values() -> &'static [Self] {
                Self::ALL
            }
            fn from_str(s: &str) -> Self {
                match s {
                    $( $s => $name::$variant, )*
                    _ => $name::UNRECOGNIZED,
                }
            }
            #[allow(unreachable_patterns)]
            fn to_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $s, )*
                    $name::UNRECOGNIZED => "<unrecognized>",
                }
            }
            #[allow(unreachable_patterns)]
            fn is_annotation(&self) -> bool {
                match self {
                    $( $name::$variant => $s.as_bytes()[0] == b'@', )*
                    $name::UNRECOGNIZED => false,
                }
            }
            fn unrecognized() -> Self {
                $name::UNRECOGNIZED
            }
        }
    };
}

#[cfg(test)]
pub(crate) mod test {
    //! Fixture keyword table, shared by the tokenizer and parser tests.
    #![allow(clippy::missing_docs_in_private_items)]

    decl_keyword! {
        pub(crate) Fruit {
            "@tasty" => ANN_TASTY,
            "apple" => APPLE,
            "cherry" => STONEFRUIT,
            "plum" => STONEFRUIT,
            "orange" => ORANGE,
            "guava" => GUAVA,
        }
    }
}
