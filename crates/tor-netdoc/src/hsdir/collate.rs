//! Collation of per-authority votes into a single deterministic ordering,
//! for use by a consensus-building process outside this crate.
//!
//! Grounded on `dircollate.c`'s `dircollator_t`. The reference
//! implementation collates `vote_routerstatus_t` rows specifically; this
//! version is generic over the payload type `T` so it can collate whatever
//! per-relay (or per-descriptor) data the caller has parsed, while
//! preserving the original's two-index, dual-procedure structure exactly.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A SHA1 RSA identity digest, as used to index `by_rsa_sha1`.
pub type RsaDigest = [u8; 20];
/// An Ed25519 identity key, as used (paired with an [`RsaDigest`]) to index
/// `by_both_ids`.
pub type Ed25519Id = [u8; 32];

/// The directory-consensus method number an authority voted for.
///
/// Grounded on `dircollate.c`'s `consensus_method` parameter to
/// `dircollator_collate`, and the `MIN_METHOD_FOR_ED25519_ID_VOTING`
/// constant that selects between the two collation procedures.
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub struct ConsensusMethod(u32);

/// The lowest consensus method number under which authorities vote using
/// Ed25519 identities. Below this, only RSA identities are collated.
///
/// This constant is carried over from `dirvote.h`, which is not part of
/// this crate's reference pack; the value matches the reference
/// implementation's long-stable definition.
const MIN_METHOD_FOR_ED25519_ID_VOTING: u32 = 27;

impl ConsensusMethod {
    /// Construct a consensus method from its wire-format number.
    pub fn new(method: u32) -> Self {
        ConsensusMethod(method)
    }

    /// Whether this method collates by `(Ed25519, RSA)` pairs rather than
    /// RSA identity alone.
    fn uses_ed25519_id_voting(self) -> bool {
        self.0 >= MIN_METHOD_FOR_ED25519_ID_VOTING
    }
}

/// An error from [`VoteCollator`].
#[derive(Clone, Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CollateError {
    /// `add_vote` was called more times than the collator was constructed
    /// to accept.
    #[error("received more votes than configured n_votes")]
    TooManyVotes,
    /// A single vote listed the same RSA identity more than once.
    ///
    /// The reference implementation asserts this can't happen because the
    /// parser already rejects duplicate routerstatus entries within one
    /// vote; this crate does not parse votes itself, so a caller-supplied
    /// duplicate is reported rather than asserted away.
    #[error("vote contains duplicate entry for one RSA identity")]
    DuplicateEntry,
    /// `collate` was called on an already-collated collator.
    #[error("collate() already called")]
    AlreadyCollated,
    /// `n_routers` or `votes_for_router` was called before `collate`.
    #[error("collate() has not been called yet")]
    NotCollated,
}

impl tor_error::HasKind for CollateError {
    fn kind(&self) -> tor_error::ErrorKind {
        tor_error::ErrorKind::BadApiUsage
    }
}

/// The state shared between a row's appearance in `by_rsa_sha1` and (if it
/// has an Ed25519 key) its appearance in `by_both_ids`.
///
/// The reference implementation stores a single `vote_routerstatus_t*` in
/// both hash tables, so a mutation made while walking one index (setting
/// `ed25519_reflects_consensus`) is visible from the other. `Rc<RefCell<_>>`
/// reproduces that aliasing in safe Rust.
struct RowState<T> {
    /// The voting authority's claimed RSA identity digest for this row.
    rsa_sha1: RsaDigest,
    /// The voting authority's claimed Ed25519 identity key, if any.
    ed25519_id: Option<Ed25519Id>,
    /// Set during [`VoteCollator::collate`] when this row's Ed25519 key
    /// was part of an accepted `(ed, rsa)` pair.
    ed25519_reflects_consensus: bool,
    /// The caller-supplied payload (e.g. a parsed routerstatus or
    /// descriptor summary).
    payload: T,
}

/// A handle to one voter's row, shared between whichever indexes reference
/// it.
pub struct VoteRowHandle<T>(Rc<RefCell<RowState<T>>>);

impl<T> Clone for VoteRowHandle<T> {
    fn clone(&self) -> Self {
        VoteRowHandle(Rc::clone(&self.0))
    }
}

impl<T> VoteRowHandle<T> {
    /// The RSA identity digest this row was filed under.
    pub fn rsa_sha1(&self) -> RsaDigest {
        self.0.borrow().rsa_sha1
    }

    /// The Ed25519 identity key this row claimed, if any.
    pub fn ed25519_id(&self) -> Option<Ed25519Id> {
        self.0.borrow().ed25519_id
    }

    /// Whether this row's Ed25519 key was confirmed by the collation (i.e.
    /// the `(ed, rsa)` pair it belongs to met the acceptance threshold).
    pub fn ed25519_reflects_consensus(&self) -> bool {
        self.0.borrow().ed25519_reflects_consensus
    }

    /// Borrow the caller-supplied payload for this row.
    pub fn payload(&self) -> std::cell::Ref<'_, T> {
        std::cell::Ref::map(self.0.borrow(), |s| &s.payload)
    }
}

/// A per-voter row vector: `votes[i]` is voter `i`'s row, or `None` if voter
/// `i` did not list this identity.
type VoteRow<T> = Vec<Option<VoteRowHandle<T>>>;

/// The result of a completed [`VoteCollator::collate`] call.
struct Collated<T> {
    /// Accepted RSA digests, deduplicated and sorted: the collation order.
    order: Vec<RsaDigest>,
    /// Per-digest, per-voter rows for every accepted identity.
    by_collated_rsa_sha1: HashMap<RsaDigest, VoteRow<T>>,
}

/// Collates per-authority votes about a set of identities into one
/// deterministic, deduplicated ordering.
///
/// Grounded on `dircollate.c`'s `dircollator_t`. Used by a consensus
/// builder, not by this crate directly: callers feed each authority's vote
/// in with [`add_vote`](Self::add_vote), then call
/// [`collate`](Self::collate) once to decide, for each identity, whether
/// enough authorities agreed on it to include it in the consensus.
pub struct VoteCollator<T> {
    /// The number of votes that will be added via `add_vote`.
    n_votes: usize,
    /// The total number of directory authorities (the quorum denominator).
    n_authorities: usize,
    /// How many `add_vote` calls have happened so far.
    next_vote_num: usize,
    /// Every row seen so far, indexed by RSA digest alone.
    by_rsa_sha1: HashMap<RsaDigest, VoteRow<T>>,
    /// Every row with an Ed25519 key, indexed by `(rsa, ed)`.
    by_both_ids: HashMap<(RsaDigest, Ed25519Id), VoteRow<T>>,
    /// Set once `collate` has run.
    collated: Option<Collated<T>>,
}

impl<T> VoteCollator<T> {
    /// Create a new collator that will accept exactly `n_votes` votes out
    /// of `n_authorities` total directory authorities.
    pub fn new(n_votes: usize, n_authorities: usize) -> Self {
        assert!(n_votes <= n_authorities);
        VoteCollator {
            n_votes,
            n_authorities,
            next_vote_num: 0,
            by_rsa_sha1: HashMap::new(),
            by_both_ids: HashMap::new(),
            collated: None,
        }
    }

    /// Add one authority's vote: every `(rsa_sha1, ed25519_id, payload)`
    /// triple the authority listed.
    ///
    /// Must be called exactly once per vote, before any call to
    /// [`collate`](Self::collate).
    pub fn add_vote<I>(&mut self, rows: I) -> Result<(), CollateError>
    where
        I: IntoIterator<Item = (RsaDigest, Option<Ed25519Id>, T)>,
    {
        if self.collated.is_some() {
            return Err(CollateError::AlreadyCollated);
        }
        if self.next_vote_num >= self.n_votes {
            return Err(CollateError::TooManyVotes);
        }
        let vote_num = self.next_vote_num;
        let n_votes = self.n_votes;

        for (rsa_sha1, ed25519_id, payload) in rows {
            let row = Rc::new(RefCell::new(RowState {
                rsa_sha1,
                ed25519_id,
                ed25519_reflects_consensus: false,
                payload,
            }));

            let slot = self
                .by_rsa_sha1
                .entry(rsa_sha1)
                .or_insert_with(|| vec![None; n_votes]);
            if slot[vote_num].is_some() {
                return Err(CollateError::DuplicateEntry);
            }
            slot[vote_num] = Some(VoteRowHandle(Rc::clone(&row)));

            if let Some(ed) = ed25519_id {
                let slot2 = self
                    .by_both_ids
                    .entry((rsa_sha1, ed))
                    .or_insert_with(|| vec![None; n_votes]);
                slot2[vote_num] = Some(VoteRowHandle(row));
            }
        }

        self.next_vote_num += 1;
        Ok(())
    }

    /// Decide, for each identity seen in any vote, whether to include it in
    /// the consensus, using the procedure appropriate to `method`.
    ///
    /// May be called only once.
    pub fn collate(&mut self, method: ConsensusMethod) -> Result<(), CollateError> {
        if self.collated.is_some() {
            return Err(CollateError::AlreadyCollated);
        }
        let (mut order, by_collated_rsa_sha1) = if method.uses_ed25519_id_voting() {
            self.collate_by_ed25519()
        } else {
            self.collate_by_rsa()
        };
        order.sort();
        self.collated = Some(Collated {
            order,
            by_collated_rsa_sha1,
        });
        Ok(())
    }

    /// RSA-only collation: accept a digest iff more than half of the
    /// authorities listed it.
    ///
    /// Grounded on `dircollator_collate_by_rsa`.
    fn collate_by_rsa(&self) -> (Vec<RsaDigest>, HashMap<RsaDigest, VoteRow<T>>) {
        let threshold = self.n_authorities / 2;
        let mut order = Vec::new();
        for (digest, rows) in &self.by_rsa_sha1 {
            let n = rows.iter().filter(|r| r.is_some()).count();
            if n > threshold {
                order.push(*digest);
            }
        }
        (order, self.by_rsa_sha1.clone())
    }

    /// Ed25519-aware collation: accept `(ed, rsa)` pairs with majority
    /// support, folding in RSA-only voters for the same RSA key; then add
    /// any remaining RSA-only identity with majority support on its own.
    ///
    /// Grounded on `dircollator_collate_by_ed25519`.
    fn collate_by_ed25519(&self) -> (Vec<RsaDigest>, HashMap<RsaDigest, VoteRow<T>>) {
        let threshold = self.n_authorities / 2;
        let mut by_collated: HashMap<RsaDigest, VoteRow<T>> = HashMap::new();
        let mut order = Vec::new();

        for ((rsa, _ed), rows) in &self.by_both_ids {
            let n = rows.iter().filter(|r| r.is_some()).count();
            if n <= threshold {
                continue;
            }

            let rsa_only_rows = self
                .by_rsa_sha1
                .get(rsa)
                .expect("a row indexed by (rsa, ed) is always also indexed by rsa alone");

            let mut merged = rows.clone();
            for i in 0..self.n_votes {
                if let Some(row) = &merged[i] {
                    row.0.borrow_mut().ed25519_reflects_consensus = true;
                } else if let Some(alt) = &rsa_only_rows[i] {
                    if alt.0.borrow().ed25519_id.is_none() {
                        merged[i] = Some(alt.clone());
                    }
                }
            }
            by_collated.insert(*rsa, merged);
            order.push(*rsa);
        }

        for (rsa, rows) in &self.by_rsa_sha1 {
            if by_collated.contains_key(rsa) {
                continue;
            }
            let n = rows.iter().filter(|r| r.is_some()).count();
            if n <= threshold {
                continue;
            }
            by_collated.insert(*rsa, rows.clone());
            order.push(*rsa);
        }

        (order, by_collated)
    }

    /// The number of identities accepted into the consensus.
    ///
    /// Panics if called before [`collate`](Self::collate).
    pub fn n_routers(&self) -> usize {
        self.require_collated().order.len()
    }

    /// The per-voter rows for the `idx`th accepted identity, in collation
    /// order. `votes[i]` is `None` if voter `i` did not contribute to this
    /// identity's consensus row.
    ///
    /// Panics if called before [`collate`](Self::collate), or if `idx` is
    /// out of range.
    pub fn votes_for_router(&self, idx: usize) -> &[Option<VoteRowHandle<T>>] {
        let collated = self.require_collated();
        let digest = collated.order[idx];
        collated
            .by_collated_rsa_sha1
            .get(&digest)
            .expect("every digest in `order` has a corresponding row vector")
    }

    /// Access the completed collation, panicking if `collate` hasn't run.
    fn require_collated(&self) -> &Collated<T> {
        self.collated
            .as_ref()
            .expect("VoteCollator::collate must be called before reading results")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn digest(b: u8) -> RsaDigest {
        [b; 20]
    }
    fn ed(b: u8) -> Ed25519Id {
        [b; 32]
    }

    #[test]
    fn rsa_only_majority_accepted() {
        let mut c: VoteCollator<&'static str> = VoteCollator::new(3, 5);
        c.add_vote(vec![(digest(1), None, "a1")]).unwrap();
        c.add_vote(vec![(digest(1), None, "a2")]).unwrap();
        c.add_vote(vec![(digest(1), None, "a3")]).unwrap();
        c.collate(ConsensusMethod::new(1)).unwrap();

        assert_eq!(c.n_routers(), 1);
        let votes = c.votes_for_router(0);
        assert_eq!(votes.len(), 3);
        assert!(votes.iter().all(|v| v.is_some()));
    }

    #[test]
    fn rsa_only_minority_rejected() {
        let mut c: VoteCollator<&'static str> = VoteCollator::new(5, 5);
        c.add_vote(vec![(digest(1), None, "a1")]).unwrap();
        c.add_vote(vec![]).unwrap();
        c.add_vote(vec![]).unwrap();
        c.add_vote(vec![]).unwrap();
        c.add_vote(vec![]).unwrap();
        c.collate(ConsensusMethod::new(1)).unwrap();
        assert_eq!(c.n_routers(), 0);
    }

    #[test]
    fn ed25519_pair_majority_marks_consensus_flag() {
        let mut c: VoteCollator<()> = VoteCollator::new(3, 5);
        for _ in 0..3 {
            c.add_vote(vec![(digest(9), Some(ed(9)), ())]).unwrap();
        }
        c.collate(ConsensusMethod::new(MIN_METHOD_FOR_ED25519_ID_VOTING))
            .unwrap();

        assert_eq!(c.n_routers(), 1);
        let votes = c.votes_for_router(0);
        for v in votes {
            let row = v.as_ref().unwrap();
            assert_eq!(row.ed25519_id(), Some(ed(9)));
            assert!(row.ed25519_reflects_consensus());
        }
    }

    #[test]
    fn ed25519_pair_absorbs_rsa_only_voters() {
        let mut c: VoteCollator<()> = VoteCollator::new(3, 5);
        c.add_vote(vec![(digest(9), Some(ed(9)), ())]).unwrap();
        c.add_vote(vec![(digest(9), Some(ed(9)), ())]).unwrap();
        // Third authority only saw the RSA key (e.g. hadn't upgraded).
        c.add_vote(vec![(digest(9), None, ())]).unwrap();
        c.collate(ConsensusMethod::new(MIN_METHOD_FOR_ED25519_ID_VOTING))
            .unwrap();

        assert_eq!(c.n_routers(), 1);
        let votes = c.votes_for_router(0);
        assert!(votes[0].as_ref().unwrap().ed25519_reflects_consensus());
        assert!(votes[1].as_ref().unwrap().ed25519_reflects_consensus());
        // Absorbed from by_rsa_sha1; does not itself carry a confirmed ed key.
        assert!(!votes[2].as_ref().unwrap().ed25519_reflects_consensus());
        assert_eq!(votes[2].as_ref().unwrap().ed25519_id(), None);
    }

    #[test]
    fn ed25519_method_still_falls_back_to_rsa_only_entries() {
        let mut c: VoteCollator<()> = VoteCollator::new(3, 5);
        // No authority ever claims an Ed25519 key for this digest, but a
        // majority still lists the bare RSA identity.
        c.add_vote(vec![(digest(4), None, ())]).unwrap();
        c.add_vote(vec![(digest(4), None, ())]).unwrap();
        c.add_vote(vec![]).unwrap();
        c.collate(ConsensusMethod::new(MIN_METHOD_FOR_ED25519_ID_VOTING))
            .unwrap();

        assert_eq!(c.n_routers(), 1);
        assert_eq!(c.votes_for_router(0)[0].as_ref().unwrap().rsa_sha1(), digest(4));
    }

    #[test]
    fn collation_order_is_sorted_by_digest() {
        let mut c: VoteCollator<()> = VoteCollator::new(2, 2);
        c.add_vote(vec![(digest(9), None, ()), (digest(1), None, ())])
            .unwrap();
        c.add_vote(vec![(digest(9), None, ()), (digest(1), None, ())])
            .unwrap();
        c.collate(ConsensusMethod::new(1)).unwrap();
        assert_eq!(c.n_routers(), 2);
        assert_eq!(c.votes_for_router(0)[0].as_ref().unwrap().rsa_sha1(), digest(1));
        assert_eq!(c.votes_for_router(1)[0].as_ref().unwrap().rsa_sha1(), digest(9));
    }
}
