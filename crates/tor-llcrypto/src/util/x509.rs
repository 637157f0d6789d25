//! Minimal, non-validating extraction of an RSA public key from an X.509
//! certificate.
//!
//! Tor relays sometimes wrap an RSA key in a self-signed X.509 certificate
//! purely as a container format (for TLS link handshakes, and in legacy
//! cross-certification).  Nothing in Tor actually validates these
//! certificates as X.509: the certificate is just a place to stash a key.
//! This module reaches into the DER structure far enough to pull the key
//! back out, and no further.

use der_parser::ber::Class;
use der_parser::der::parse_der;

use crate::pk::rsa::PublicKey;

/// Extract the RSA public key from the `subjectPublicKeyInfo` field of a
/// DER-encoded X.509 certificate, without validating anything else about
/// the certificate.
///
/// This assumes (and does not check) that the certificate's subject key is
/// an RSA key in the bare `RSAPublicKey` (PKCS#1) form that Tor uses, rather
/// than an algorithm-tagged `SubjectPublicKeyInfo` wrapping some other key
/// type.  Returns `None` if the input isn't shaped the way a Tor-generated
/// certificate is.
pub fn x509_extract_rsa_subject_kludge(cert: &[u8]) -> Option<PublicKey> {
    let (_, cert) = parse_der(cert).ok()?;
    let cert = cert.as_sequence().ok()?;
    let tbs_certificate = cert.first()?.as_sequence().ok()?;

    let mut fields = tbs_certificate.iter();
    let mut field = fields.next()?;
    if field.header.class() == Class::ContextSpecific {
        // Explicit [0] version tag; present only when not defaulted.
        field = fields.next()?;
    }
    // field is now `serialNumber`; skip it, `signature`, `issuer`,
    // `validity`, and `subject` to reach `subjectPublicKeyInfo`.
    let spki = fields.nth(4)?;
    let spki = spki.as_sequence().ok()?;
    // spki[0] is the AlgorithmIdentifier; spki[1] is the subjectPublicKey
    // BIT STRING, whose content is itself a DER-encoded RSAPublicKey.
    let subject_public_key = spki.get(1)?.as_bitstring().ok()?;

    PublicKey::from_der(subject_public_key.data)
}

#[cfg(test)]
mod test {
    // @@ begin test lint list maintained by maint/add_warning @@
    #![allow(clippy::bool_assert_comparison)]
    #![allow(clippy::clone_on_copy)]
    #![allow(clippy::dbg_macro)]
    #![allow(clippy::print_stderr)]
    #![allow(clippy::print_stdout)]
    #![allow(clippy::single_char_pattern)]
    #![allow(clippy::unwrap_used)]
    //! <!-- @@ end test lint list maintained by maint/add_warning @@ -->
    use super::*;

    #[test]
    fn rejects_garbage() {
        assert!(x509_extract_rsa_subject_kludge(b"not a certificate").is_none());
        assert!(x509_extract_rsa_subject_kludge(&[]).is_none());
    }
}
