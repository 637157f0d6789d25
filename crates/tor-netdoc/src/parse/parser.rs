//! Declarative rules about which keywords may appear in a section of a
//! network document, how many times, with how many arguments, and whether
//! they carry an object.
//!
//! A [`SectionRules`] is built once (typically into a `once_cell::Lazy`) per
//! document section, then used to validate and index every
//! [`Item`](crate::parse::tokenize::Item) that a
//! [`NetDocReader`](crate::parse::tokenize::NetDocReader) (or a sub-iterator
//! of one) produces.

use crate::parse::keyword::Keyword;
use crate::parse::tokenize::Item;
use crate::{NetdocErrorKind as EK, Pos, Result};

use std::ops::{Bound, RangeBounds};

/// Whether, and how, an item may carry a base64 object.
#[derive(Clone, Copy, PartialEq, Eq)]
enum ObjRule {
    /// No object is allowed.
    NotAllowed,
    /// An object may be present or absent.
    Optional,
    /// An object must be present.
    Required,
}

/// A constraint on how a single keyword may appear within a section: how
/// many times, with how many arguments, and whether it carries an object.
#[derive(Clone)]
struct Rule<K> {
    /// The keyword this rule applies to.
    kwd: K,
    /// Whether at least one instance of this keyword must appear.
    required: bool,
    /// Whether more than one instance of this keyword may appear.
    may_repeat: bool,
    /// The smallest number of arguments a matching item may have.
    min_args: usize,
    /// The largest number of arguments a matching item may have, if bounded.
    max_args: Option<usize>,
    /// Whether a matching item may, must, or must not carry an object.
    obj: ObjRule,
}

/// Incrementally describes the rule for a single keyword.
///
/// Constructed with [`Keyword::rule`].
pub(crate) struct RuleBuilder<K> {
    /// The rule being built.
    rule: Rule<K>,
}

impl<K: Keyword> RuleBuilder<K> {
    /// Start describing a new rule for `kwd`, with no constraints beyond
    /// "may appear zero or one times, with any number of arguments, and no
    /// object."
    pub(crate) fn new(kwd: K) -> Self {
        RuleBuilder {
            rule: Rule {
                kwd,
                required: false,
                may_repeat: false,
                min_args: 0,
                max_args: None,
                obj: ObjRule::NotAllowed,
            },
        }
    }

    /// Require that this keyword appear at least once in the section.
    pub(crate) fn required(mut self) -> Self {
        self.rule.required = true;
        self
    }

    /// Allow this keyword to appear more than once in the section.
    pub(crate) fn may_repeat(mut self) -> Self {
        self.rule.may_repeat = true;
        self
    }

    /// Constrain the number of arguments a matching item may have.
    pub(crate) fn args<R: RangeBounds<usize>>(mut self, bounds: R) -> Self {
        self.rule.min_args = match bounds.start_bound() {
            Bound::Included(n) => *n,
            Bound::Excluded(n) => n + 1,
            Bound::Unbounded => 0,
        };
        self.rule.max_args = match bounds.end_bound() {
            Bound::Included(n) => Some(*n),
            Bound::Excluded(n) => Some(n.saturating_sub(1)),
            Bound::Unbounded => None,
        };
        self
    }

    /// Require that a matching item carry an object.
    pub(crate) fn obj_required(mut self) -> Self {
        self.rule.obj = ObjRule::Required;
        self
    }

    /// Allow (but do not require) a matching item to carry an object.
    pub(crate) fn obj_optional(mut self) -> Self {
        self.rule.obj = ObjRule::Optional;
        self
    }
}

/// Accumulates [`RuleBuilder`]s into a [`SectionRules`].
pub(crate) struct SectionRulesBuilder<K: Keyword> {
    /// Per-keyword rule, indexed by [`Keyword::idx`].
    rules: Vec<Option<Rule<K>>>,
}

impl<K: Keyword> SectionRulesBuilder<K> {
    /// Start with no rules at all.
    fn new() -> Self {
        SectionRulesBuilder {
            rules: (0..K::n_vals()).map(|_| None).collect(),
        }
    }

    /// Add a rule, replacing any previous rule for the same keyword.
    pub(crate) fn add(&mut self, rule: RuleBuilder<K>) -> &mut Self {
        let idx = rule.rule.kwd.idx();
        self.rules[idx] = Some(rule.rule);
        self
    }

    /// Finish building, producing an immutable [`SectionRules`].
    pub(crate) fn build(self) -> SectionRules<K> {
        SectionRules { rules: self.rules }
    }
}

/// The set of rules governing one section of a network document: which
/// keywords are allowed, required, repeatable, and how many arguments or
/// whether an object each one takes.
pub(crate) struct SectionRules<K: Keyword> {
    /// Per-keyword rule, indexed by [`Keyword::idx`].
    rules: Vec<Option<Rule<K>>>,
}

impl<K: Keyword> SectionRules<K> {
    /// Start building a new `SectionRules`.
    pub(crate) fn builder() -> SectionRulesBuilder<K> {
        SectionRulesBuilder::new()
    }

    /// Read items from `tokens` until exhaustion, checking each against this
    /// section's rules, and return the resulting [`Section`].
    ///
    /// `tokens` will usually be a [`NetDocReader`](crate::parse::tokenize::NetDocReader)
    /// or a sub-iterator produced by splitting one into batches.
    pub(crate) fn parse<'a, I>(&self, tokens: &mut I) -> Result<Section<'a, K>>
    where
        I: Iterator<Item = Result<Item<'a, K>>>,
    {
        let mut by_kwd: Vec<Vec<Item<'a, K>>> = (0..K::n_vals()).map(|_| Vec::new()).collect();
        let mut all: Vec<Item<'a, K>> = Vec::new();

        for tok in tokens {
            let item = tok?;
            by_kwd[item.kwd().idx()].push(item.clone());
            all.push(item);
        }

        for rule in self.rules.iter().flatten() {
            let items = &by_kwd[rule.kwd.idx()];
            if rule.required && items.is_empty() {
                return Err(EK::MissingToken
                    .with_msg(rule.kwd.to_str())
                    .at_pos(Pos::None));
            }
            if !rule.may_repeat && items.len() > 1 {
                return Err(EK::DuplicateToken
                    .with_msg(rule.kwd.to_str())
                    .at_pos(items[1].pos()));
            }
            for item in items {
                let n = item.n_args();
                if n < rule.min_args {
                    return Err(EK::TooFewArguments
                        .with_msg(rule.kwd.to_str())
                        .at_pos(item.pos()));
                }
                if rule.max_args.is_some_and(|max| n > max) {
                    return Err(EK::TooManyArguments
                        .with_msg(rule.kwd.to_str())
                        .at_pos(item.pos()));
                }
                match rule.obj {
                    ObjRule::NotAllowed if item.has_obj() => {
                        return Err(EK::UnexpectedObject
                            .with_msg(rule.kwd.to_str())
                            .at_pos(item.pos()));
                    }
                    ObjRule::Required if !item.has_obj() => {
                        return Err(EK::MissingObject
                            .with_msg(rule.kwd.to_str())
                            .at_pos(item.end_pos()));
                    }
                    _ => (),
                }
            }
        }

        Ok(Section { by_kwd, all })
    }
}

/// The result of matching a section of a document against its
/// [`SectionRules`]: every item that appeared, indexed by keyword and also
/// kept in document order.
pub(crate) struct Section<'a, K: Keyword> {
    /// Items with a given keyword, indexed by [`Keyword::idx`].
    by_kwd: Vec<Vec<Item<'a, K>>>,
    /// Every item, in the order it appeared in the document.
    all: Vec<Item<'a, K>>,
}

impl<'a, K: Keyword> Section<'a, K> {
    /// Return the first item with keyword `kwd`, if any appeared.
    pub(crate) fn get(&self, kwd: K) -> Option<&Item<'a, K>> {
        self.by_kwd[kwd.idx()].first()
    }

    /// Return the first item with keyword `kwd`, or an error if none
    /// appeared.
    ///
    /// Should only be called for a keyword whose rule says `required()`;
    /// otherwise, the error returned here won't correspond to anything the
    /// rules actually enforced.
    pub(crate) fn required(&self, kwd: K) -> Result<&Item<'a, K>> {
        self.get(kwd)
            .ok_or_else(|| EK::MissingToken.with_msg(kwd.to_str()).at_pos(Pos::None))
    }

    /// Return every item with keyword `kwd`, in document order.
    pub(crate) fn slice(&self, kwd: K) -> &[Item<'a, K>] {
        &self.by_kwd[kwd.idx()]
    }

    /// Return the first item in the section, regardless of keyword.
    pub(crate) fn first_item(&self) -> Option<&Item<'a, K>> {
        self.all.first()
    }

    /// Return the last item in the section, regardless of keyword.
    pub(crate) fn last_item(&self) -> Option<&Item<'a, K>> {
        self.all.last()
    }
}

#[cfg(test)]
mod test {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::parse::macros::test::Fruit;
    use crate::parse::tokenize::NetDocReader;

    #[test]
    fn basic_rules() {
        use Fruit::*;

        let rules = {
            let mut b = SectionRules::<Fruit>::builder();
            b.add(APPLE.rule().required().args(1..));
            b.add(ORANGE.rule().may_repeat());
            b.add(STONEFRUIT.rule().obj_optional());
            b.build()
        };

        let s = "apple 3\norange\norange\n";
        let mut reader: NetDocReader<'_, Fruit> = NetDocReader::new(s);
        let section = rules.parse(&mut reader).unwrap();
        assert_eq!(section.required(APPLE).unwrap().arg(0), Some("3"));
        assert_eq!(section.slice(ORANGE).len(), 2);
        assert!(section.get(STONEFRUIT).is_none());
    }

    #[test]
    fn missing_required() {
        use Fruit::*;
        let rules = {
            let mut b = SectionRules::<Fruit>::builder();
            b.add(APPLE.rule().required());
            b.build()
        };
        let mut reader: NetDocReader<'_, Fruit> = NetDocReader::new("orange\n");
        assert!(rules.parse(&mut reader).is_err());
    }

    #[test]
    fn duplicate_not_allowed() {
        use Fruit::*;
        let rules = {
            let mut b = SectionRules::<Fruit>::builder();
            b.add(APPLE.rule());
            b.build()
        };
        let mut reader: NetDocReader<'_, Fruit> = NetDocReader::new("apple 1\napple 2\n");
        assert!(rules.parse(&mut reader).is_err());
    }
}
