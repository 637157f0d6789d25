//! Parsing and encoding for onion service descriptors.
//!
//! An onion service descriptor is a three-layer document, as described in
//! section 2 of rend-spec-v3: an outer (plaintext) document wraps a
//! superencrypted middle document, which in turn wraps an encrypted inner
//! document that lists the onion service's introduction points.
//!
//! This module exposes [`HsDesc`], which parses and validates a descriptor
//! all the way down to the inner layer, and (when the `hs-service` feature is
//! enabled) [`build::HsDescBuilder`], which encodes one.

#![allow(dead_code)]

use std::time::SystemTime;

use smallvec::SmallVec;
use tor_cert::{CertType, CertifiedKey, Ed25519Cert, EncodedEd25519Cert};
use tor_checkable::{SelfSigned, Timebound};
use tor_hscrypto::pk::{HsClientDescEncSecretKey, HsIntroPtSessionIdKey, HsSvcNtorKey};
use tor_hscrypto::{RevisionCounter, Subcredential};
use tor_linkspec::EncodedLinkSpec;
use tor_llcrypto::pk::curve25519;
use tor_llcrypto::pk::ed25519;
use tor_units::IntegerMinutes;

#[cfg(any(test, feature = "hs-service"))]
pub mod build;
pub(crate) mod desc_enc;
pub(crate) mod inner;
pub(crate) mod middle;
pub(crate) mod outer;

use inner::HsDescInner;
use middle::HsDescMiddle;
use outer::HsDescOuter;

/// An error that occurred while validating or decrypting an onion service
/// descriptor.
///
/// Deliberately uninformative about _why_ decryption failed, since giving a
/// detailed answer would risk creating an oracle for an attacker who wants to
/// know, e.g., whether a guessed client authorization key was correct.
#[derive(Clone, Debug, thiserror::Error)]
#[non_exhaustive]
pub enum HsDescError {
    /// We tried to decrypt the encrypted layer with a client authorization
    /// key, but it didn't work.
    #[error("tried to decrypt the onion service descriptor with the wrong key")]
    WrongDecryptionKey,
    /// We tried to decrypt a layer of the descriptor, and it failed, even
    /// though we don't think we were missing a necessary key.
    #[error("failed to decrypt onion service descriptor")]
    DecryptionFailed,
    /// We needed a client authorization key to decrypt this descriptor, and
    /// none was provided.
    #[error("client authorization key needed, but none was provided")]
    MissingDecryptionKey,
    /// The descriptor's document structure didn't parse.
    #[error("unable to parse onion service descriptor")]
    ParseError(#[source] crate::Error),
    /// A certificate or signature within the descriptor didn't check out.
    #[error("invalid signature or certificate in onion service descriptor")]
    BadSignature,
    /// The descriptor (or one of its nested layers) was not valid at the
    /// time we tried to use it.
    #[error("onion service descriptor is not currently valid")]
    NotTimely,
}

impl From<crate::Error> for HsDescError {
    fn from(e: crate::Error) -> Self {
        HsDescError::ParseError(e)
    }
}

impl From<desc_enc::DecryptionError> for HsDescError {
    fn from(_: desc_enc::DecryptionError) -> Self {
        HsDescError::DecryptionFailed
    }
}

/// A method of authenticating to an onion service's introduction point.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub(crate) enum IntroAuthType {
    /// Ed25519-based introduction-point authentication.
    Ed25519,
}

impl std::fmt::Display for IntroAuthType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntroAuthType::Ed25519 => write!(f, "ed25519"),
        }
    }
}

/// Information about a single introduction point, as presented in the inner
/// document of an onion service descriptor.
#[derive(Debug, Clone)]
pub(crate) struct IntroPointDesc {
    /// A list of link specifiers, used to contact the introduction point.
    pub(crate) link_specifiers: Vec<EncodedLinkSpec>,
    /// The `KP_ntor` onion key to use when extending a circuit to the
    /// introduction point.
    pub(crate) ipt_ntor_key: curve25519::PublicKey,
    /// The "session ID" (`KP_hs_ipt_sid`) key to use when authenticating to
    /// the introduction point.
    pub(crate) ipt_sid_key: HsIntroPtSessionIdKey,
    /// The key (`KP_hss_ntor`) to use for our ntor handshake with the onion
    /// service, via this introduction point.
    pub(crate) svc_ntor_key: HsSvcNtorKey,
}

/// A parsed, validated, and decrypted onion service descriptor.
///
/// This is the union of the information in all three layers of the
/// descriptor: the outer plaintext layer, the superencrypted middle layer,
/// and the encrypted inner layer.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct HsDesc {
    /// How long after publication this descriptor should be considered valid,
    /// absent other information.
    pub lifetime: IntegerMinutes<u16>,
    /// A revision counter, used to decide whether this descriptor is more or
    /// less recent than another with the same blinded ID.
    pub revision_counter: RevisionCounter,
    /// The authentication types that this onion service accepts from its
    /// clients when they connect at an introduction point.
    pub(crate) intro_auth_types: Option<SmallVec<[IntroAuthType; 2]>>,
    /// True if this onion service is configured not to anonymize its own
    /// location.
    pub is_single_onion_service: bool,
    /// The introduction points that this onion service currently publishes.
    pub(crate) intro_points: Vec<IntroPointDesc>,
}

impl HsDesc {
    /// Parse an onion service descriptor from `s`, decrypting its
    /// superencrypted and encrypted layers using `subcredential` and
    /// (optionally) a client authorization key, and check that every layer is
    /// correctly signed and timely as of `now`.
    pub fn parse(
        s: &str,
        subcredential: &Subcredential,
        now: SystemTime,
        client_auth_key: Option<&HsClientDescEncSecretKey>,
    ) -> std::result::Result<HsDesc, HsDescError> {
        let outer = HsDescOuter::parse(s)?
            .check_signature()
            .map_err(|_| HsDescError::BadSignature)?
            .check_valid_at(&now)
            .map_err(|_| HsDescError::NotTimely)?;

        let body = outer.decrypt_body(subcredential)?;
        let body = std::str::from_utf8(&body).map_err(|_| HsDescError::DecryptionFailed)?;
        let middle = HsDescMiddle::parse(body)?;

        let inner_body = middle.decrypt_inner(
            &outer.blinded_id(),
            outer.revision_counter(),
            subcredential,
            client_auth_key,
        )?;
        let inner_body =
            std::str::from_utf8(&inner_body).map_err(|_| HsDescError::DecryptionFailed)?;
        let (_signing_key, inner) = HsDescInner::parse(inner_body)?;
        let inner = inner
            .check_valid_at(&now)
            .map_err(|_| HsDescError::NotTimely)?
            .check_signature()
            .map_err(|_| HsDescError::BadSignature)?;

        Ok(HsDesc {
            lifetime: outer.lifetime,
            revision_counter: outer.revision_counter(),
            intro_auth_types: inner.intro_auth_types.clone(),
            is_single_onion_service: inner.single_onion_service,
            intro_points: inner.intro_points.clone(),
        })
    }
}

/// Build and sign a `descriptor-signing-key-cert`: a certificate, signed by
/// the onion service's blinded identity key, that certifies the short-term
/// descriptor signing key (`KP_hs_desc_sign`).
///
/// This is the certificate that appears in the `descriptor-signing-key-cert`
/// item of the outer layer (rend-spec-v3 2.4).
pub(crate) fn create_desc_sign_key_cert(
    subject_key: &ed25519::PublicKey,
    signing_keypair: &ed25519::Keypair,
    expiration: SystemTime,
) -> std::result::Result<EncodedEd25519Cert, tor_cert::CertEncodeError> {
    Ed25519Cert::constructor()
        .cert_type(CertType::HS_BLINDED_ID_V_SIGNING)
        .expiration(expiration)
        .signing_key(ed25519::Ed25519Identity::from(
            signing_keypair.verifying_key(),
        ))
        .cert_key(CertifiedKey::Ed25519((*subject_key).into()))
        .encode_and_sign(signing_keypair)
}
