//! The [`Keyword`] trait, implemented by the per-document keyword enums that
//! [`decl_keyword!`](crate::decl_keyword) generates.

use crate::parse::parser::RuleBuilder;

/// A keyword recognized within one particular kind of network document.
///
/// Every document type (the outer, middle, and inner layers of a hidden
/// service descriptor; the plaintext document wrapping them; and so on) has
/// its own closed set of keywords, declared with
/// [`decl_keyword!`](crate::decl_keyword). Unknown keywords parse to the
/// [`Keyword::unrecognized`] value rather than failing outright, so that a
/// document carrying lines we don't understand can still be parsed.
///
/// There should be no reason to implement this trait by hand: use
/// [`decl_keyword!`](crate::decl_keyword) instead.
pub(crate) trait Keyword: Copy + Eq + std::fmt::Debug + Sized + 'static {
    /// Return the position of this keyword within [`Keyword::all_values`].
    ///
    /// Used by [`SectionRules`](crate::parse::parser::SectionRules) to index
    /// per-keyword state in a flat array instead of a map.
    fn idx(self) -> usize;

    /// Return the number of distinct values of this type, including the
    /// catch-all [`Keyword::unrecognized`] value.
    fn n_vals() -> usize;

    /// Return every distinct value of this type, in declaration order,
    /// followed by the catch-all value.
    fn all_values() -> &'static [Self];

    /// Parse a keyword string into a value of this type.
    ///
    /// Returns [`Keyword::unrecognized`] if `s` does not appear in the
    /// table.
    fn from_str(s: &str) -> Self;

    /// Return a human-readable name for this keyword, for use in error
    /// messages. Not necessarily the keyword string itself, since more than
    /// one keyword string can map to the same variant.
    fn to_str(&self) -> &'static str;

    /// Return true if this keyword denotes an `@`-prefixed annotation
    /// rather than an ordinary document entry.
    fn is_annotation(&self) -> bool;

    /// Return the catch-all value used for keyword strings that do not
    /// appear in the table.
    fn unrecognized() -> Self;

    /// Begin describing how this keyword may appear within a document
    /// section.
    fn rule(self) -> RuleBuilder<Self> {
        RuleBuilder::new(self)
    }
}
