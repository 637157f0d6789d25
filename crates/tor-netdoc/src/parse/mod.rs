//! Parsing helpers for the dir-spec.txt metaformat.
//!
//! A network document is a sequence of newline-terminated lines, each
//! beginning with a keyword and followed by whitespace-separated arguments
//! and an optional base64 "object". [`tokenize`] turns a string into a
//! stream of these [`tokenize::Item`]s; [`keyword`] gives every kind of
//! document its own closed set of recognized keywords; [`parser`] declares,
//! for each section of a document, which keywords are required, optional,
//! repeatable, or must carry an object.

#[macro_use]
pub(crate) mod macros;
pub(crate) mod keyword;
pub(crate) mod parser;
pub(crate) mod tokenize;
