//! Functionality for encoding onion service descriptors.
//!
//! The functionality in this module (and its submodules) builds the three
//! nested layers of an onion service descriptor (see rend-spec-v3 section
//! 2), encrypting each in turn, and signs the result. [`HsDescBuilder`] is
//! the entry point that onion services should use; the `inner`, `middle`,
//! and `outer` submodules hold private helpers for each individual layer.

use crate::doc::hsdesc::create_desc_sign_key_cert;
use crate::doc::hsdesc::desc_enc::HsDescEncryption;
use crate::doc::hsdesc::middle::AuthClient;
use crate::doc::hsdesc::{IntroAuthType, IntroPointDesc};
use crate::NetdocBuilder;

use std::time::SystemTime;

use rand::{CryptoRng, RngCore};
use smallvec::SmallVec;
use tor_bytes::EncodeError;
use tor_cell::chancell::msg::HandshakeType;
use tor_hscrypto::pk::{HsBlindId, HsSvcDescEncKey};
use tor_hscrypto::{RevisionCounter, Subcredential};
use tor_llcrypto::pk::curve25519;
use tor_llcrypto::pk::ed25519;
use tor_units::IntegerMinutes;

pub(crate) mod inner;
pub(crate) mod middle;
pub(crate) mod outer;

/// The client-authorization parameters for a restricted-discovery onion
/// service descriptor.
///
/// If an onion service is not using restricted discovery, its descriptor
/// carries no [`ClientAuth`], and the middle-layer encoder generates cover
/// traffic in its place (see [`middle::HsDescMiddle`]).
#[derive(Debug, Clone)]
pub(crate) struct ClientAuth {
    /// The ephemeral x25519 public key (`KP_hss_desc_enc`) used, along with
    /// each client's static key, to derive that client's `auth-client` entry.
    pub(crate) ephemeral_key: HsSvcDescEncKey,
    /// The authorized clients, and the key-exchange material they need to
    /// recover the descriptor cookie.
    pub(crate) auth_clients: Vec<AuthClient>,
    /// The descriptor cookie (`N_hs_desc_enc`) used to encrypt the inner
    /// document.  Each `AuthClient` entry in `auth_clients` encodes this same
    /// cookie, encrypted so only that client can recover it.
    pub(crate) descriptor_cookie: [u8; crate::doc::hsdesc::desc_enc::HS_DESC_ENC_NONCE_LEN],
}

/// A builder for constructing and signing a complete onion service
/// descriptor: the outer, middle, and inner documents, each encrypted and
/// nested as described in rend-spec-v3 section 2.
#[derive(Debug)]
pub struct HsDescBuilder<'a> {
    /// The (onion service's) blinded identity keypair (`KP_blinded_id` /
    /// `KS_blinded_id`), used to sign the descriptor-signing-key
    /// certificate, and (in un-blinded form) to key the encryption of the
    /// outer layers.
    pub blinded_id: &'a ed25519::Keypair,
    /// The short-term descriptor signing keypair (`KP_hs_desc_sign` /
    /// `KS_hs_desc_sign`).
    pub hs_desc_sign: &'a ed25519::Keypair,
    /// The onion service's subcredential, used to derive the keys protecting
    /// every encrypted layer.
    pub subcredential: &'a Subcredential,
    /// How long this descriptor should be considered valid, absent other
    /// information.
    pub lifetime: IntegerMinutes<u16>,
    /// The revision counter to publish with this descriptor.
    pub revision_counter: RevisionCounter,
    /// The CREATE handshakes that this onion service supports.
    pub create2_formats: &'a [HandshakeType],
    /// The introduction-point authentication types that this onion service
    /// accepts, if it requires authentication at all.
    pub(crate) auth_required: Option<&'a SmallVec<[IntroAuthType; 2]>>,
    /// True if the service is a "single onion service".
    pub is_single_onion_service: bool,
    /// The introduction points to advertise.
    pub(crate) intro_points: &'a [IntroPointDesc],
    /// Client-authorization parameters, if restricted discovery is enabled.
    pub(crate) client_auth: Option<&'a ClientAuth>,
    /// The expiration time to set on every certificate in this descriptor.
    pub cert_expiry: SystemTime,
}

impl<'a> NetdocBuilder for HsDescBuilder<'a> {
    fn build_sign<R: RngCore + CryptoRng>(self, rng: &mut R) -> Result<String, EncodeError> {
        let HsDescBuilder {
            blinded_id,
            hs_desc_sign,
            subcredential,
            lifetime,
            revision_counter,
            create2_formats,
            auth_required,
            is_single_onion_service,
            intro_points,
            client_auth,
            cert_expiry,
        } = self;

        let blinded_hsid: HsBlindId =
            ed25519::Ed25519Identity::from(blinded_id.verifying_key()).into();

        let inner_plaintext = inner::HsDescInner {
            hs_desc_sign,
            create2_formats,
            auth_required,
            is_single_onion_service,
            intro_points,
            intro_auth_key_cert_expiry: cert_expiry,
            intro_enc_key_cert_expiry: cert_expiry,
        }
        .build_sign(rng)?;

        let desc_enc_nonce = client_auth.map(|ca| ca.descriptor_cookie.into());
        let encrypted = HsDescEncryption {
            blinded_id: &blinded_hsid,
            desc_enc_nonce: desc_enc_nonce.as_ref(),
            subcredential,
            revision: revision_counter,
            string_const: b"hsdir-encrypted-data",
        }
        .encrypt(rng, inner_plaintext.as_bytes());

        let middle_plaintext = middle::HsDescMiddleBuilder::default()
            .client_auth(client_auth)
            .encrypted(encrypted)
            .build_sign(rng)?;

        let superencrypted = HsDescEncryption {
            blinded_id: &blinded_hsid,
            desc_enc_nonce: None,
            subcredential,
            revision: revision_counter,
            string_const: b"hsdir-superencrypted-data",
        }
        .encrypt(rng, middle_plaintext.as_bytes());

        let hs_desc_sign_cert = create_desc_sign_key_cert(
            &hs_desc_sign.verifying_key(),
            blinded_id,
            cert_expiry,
        )
        .map_err(|_| EncodeError::Bug(tor_error::internal!("failed to sign descriptor cert")))?;

        outer::HsDescOuter {
            hs_desc_sign,
            hs_desc_sign_cert,
            lifetime,
            revision_counter,
            superencrypted,
        }
        .build_sign(rng)
    }
}

#[cfg(test)]
pub(crate) mod test {
    // @@ begin test lint list maintained by maint/add_warning @@
    #![allow(clippy::bool_assert_comparison)]
    #![allow(clippy::clone_on_copy)]
    #![allow(clippy::dbg_macro)]
    #![allow(clippy::mixed_attributes_style)]
    #![allow(clippy::print_stderr)]
    #![allow(clippy::print_stdout)]
    #![allow(clippy::single_char_pattern)]
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::unchecked_duration_subtraction)]
    //! <!-- @@ end test lint list maintained by maint/add_warning @@ -->

    use super::*;
    use rand::{CryptoRng, RngCore};
    use tor_linkspec::LinkSpec;

    /// An arbitrary curve25519 public key, for use in tests that don't care
    /// about its value.
    pub(crate) const TEST_CURVE25519_PUBLIC1: [u8; 32] = [0x02; 32];

    /// An arbitrary descriptor cookie, for use in tests that don't care
    /// about its value.
    pub(crate) const TEST_DESCRIPTOR_COOKIE: [u8; crate::doc::hsdesc::desc_enc::HS_DESC_ENC_NONCE_LEN] =
        [0x03; 16];

    /// Build an [`IntroPointDesc`] with freshly-generated keys, advertising
    /// `link_specs` as its contact information.
    pub(crate) fn create_intro_point_descriptor<R: RngCore + CryptoRng>(
        rng: &mut R,
        link_specs: &[LinkSpec],
    ) -> IntroPointDesc {
        let ipt_sid_key = ed25519::Keypair::generate(&mut *rng).verifying_key();
        let ipt_ntor_secret = curve25519::StaticSecret::random_from_rng(&mut *rng);
        let ipt_ntor_key = curve25519::PublicKey::from(&ipt_ntor_secret);
        let svc_ntor_secret = curve25519::StaticSecret::random_from_rng(&mut *rng);
        let svc_ntor_key = curve25519::PublicKey::from(&svc_ntor_secret);

        IntroPointDesc {
            link_specifiers: link_specs
                .iter()
                .map(|ls| ls.encode().expect("could not encode link specifier"))
                .collect(),
            ipt_ntor_key,
            ipt_sid_key,
            svc_ntor_key,
        }
    }

    /// Extract a human-readable message from an error returned by a builder,
    /// for use in tests that check that a particular bug was detected.
    pub(crate) fn expect_bug<T: std::fmt::Debug>(err: T) -> String {
        format!("{:?}", err)
    }
}
