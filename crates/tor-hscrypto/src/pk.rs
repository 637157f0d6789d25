//! Key type wrappers of various kinds used in onion services.
//
// NOTE: We define wrappers here as a safety net against confusing one kind of
// key for another: without a system like this, it can get pretty hard making
// sure that each key is used only in the right way.

use tor_llcrypto::pk::{curve25519, ed25519};

use crate::macros::define_bytes;

/// The long-term identity keypair of an onion service.
///
/// This is the expanded Ed25519 keypair whose public part is encoded (after
/// further derivation) as the service's `.onion` address.  It does not sign
/// or validate anything on its own: it is used only to derive a per-period
/// blinded identity, which is this crate's responsibility to accept but not
/// to compute.  (The blinding derivation, rend-spec-v3 2.2.1, is out of scope
/// here; callers obtain an [`HsBlindId`] however suits them, typically by
/// extracting it from a descriptor-signing-key certificate.)
pub type HsIdKeypair = ed25519::ExpandedKeypair;

/// The long-term identity public key of an onion service: the decoded and
/// validated ed25519 public key encoded in a `.onion` address.
pub type HsIdKey = ed25519::PublicKey;

define_bytes! {
/// The "blinded" identity of a v3 onion service for a given time period.
///
/// This key is used for two purposes: to compute an index into the HSDir
/// ring, and to verify the certificate that authenticates a descriptor's
/// short-term signing key.
///
/// The derivation of this value from an [`HsIdKey`] and a time period is out
/// of scope for this crate; values of this type are treated as opaque,
/// externally-supplied identifiers.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct HsBlindId([u8; 32]);
}

impl From<ed25519::Ed25519Identity> for HsBlindId {
    fn from(id: ed25519::Ed25519Identity) -> HsBlindId {
        (*id.as_bytes()).into()
    }
}

impl From<HsBlindId> for ed25519::PublicKey {
    fn from(id: HsBlindId) -> ed25519::PublicKey {
        ed25519::PublicKey::from_bytes(id.as_ref())
            .expect("HsBlindId did not hold a valid curve point")
    }
}

/// A key used to identify and authenticate an onion service at a single
/// introduction point: `KP_hs_ipt_sid`.
///
/// A different one of these is used at each introduction point; introduction
/// points don't know how this key relates to the onion service, only that
/// it's the same key each time they see it.
pub type HsIntroPtSessionIdKey = ed25519::PublicKey;

/// A key used in the `hs_ntor` handshake between a client and an onion
/// service, via a particular introduction point: `KP_hss_ntor`.
///
/// The onion service picks a different one of these for each introduction
/// point, and does not need to tell the introduction point about it.
pub type HsSvcNtorKey = curve25519::PublicKey;

/// The public part of a service's restricted-discovery ephemeral key,
/// `KP_hss_desc_enc`, published in the `desc-auth-ephemeral-key` line.
///
/// Combined with a client's [`HsClientDescEncSecretKey`] via Diffie-Hellman,
/// this is used to find and decrypt the client's `auth-client` entry.
pub type HsSvcDescEncKey = curve25519::PublicKey;

/// A client's restricted-discovery authorization secret key,
/// `KS_hsc_desc_enc`.
///
/// A client holding this key can decrypt the encryption layer of a
/// descriptor published for restricted discovery, provided it has been
/// authorized by the service.
pub type HsClientDescEncSecretKey = curve25519::StaticSecret;

/// The public counterpart of a [`HsClientDescEncSecretKey`]: `KP_hsc_desc_enc`.
pub type HsClientDescEncKey = curve25519::PublicKey;
