//! Conversions between curve25519 and ed25519 keys.
//!
//! Tor sometimes needs to convert a Montgomery-form (curve25519) public key
//! into an Edwards-form (ed25519) public key representing the same point, so
//! that it can be embedded in a certificate alongside "real" ed25519 keys.
//! The two curves are birationally equivalent, but the map from one to the
//! other is two-to-one: a curve25519 point corresponds to two possible
//! ed25519 points, distinguished by the sign of their `x` coordinate. The
//! caller must supply that sign bit, since it isn't recoverable from the
//! curve25519 point alone.

use crate::pk::curve25519;
use crate::pk::ed25519;

use curve25519_dalek::montgomery::MontgomeryPoint;

/// Convert a curve25519 public key into the ed25519 public key for the same
/// point, with the chosen sign bit.
///
/// Returns `None` if `pk` does not correspond to a valid point on the
/// birationally-equivalent Edwards curve (this can happen for points of low
/// order, or points that aren't actually on the curve).
///
/// `sign_bit` should be 0 or 1; any other value is treated as 1.
pub fn convert_curve25519_to_ed25519_public(
    pk: &curve25519::PublicKey,
    sign_bit: u8,
) -> Option<ed25519::PublicKey> {
    let point = MontgomeryPoint(*pk.as_bytes());
    let edwards_point = point.to_edwards(sign_bit)?;
    ed25519::PublicKey::from_bytes(edwards_point.compress().as_bytes()).ok()
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
    fn convert_is_deterministic() {
        let sk = curve25519::StaticSecret::random_from_rng(rand::rng());
        let pk = curve25519::PublicKey::from(&sk);

        let a = convert_curve25519_to_ed25519_public(&pk, 0);
        let b = convert_curve25519_to_ed25519_public(&pk, 0);
        assert_eq!(a.map(|k| k.to_bytes()), b.map(|k| k.to_bytes()));
    }

    #[test]
    fn sign_bit_changes_result() {
        let sk = curve25519::StaticSecret::random_from_rng(rand::rng());
        let pk = curve25519::PublicKey::from(&sk);

        let with_0 = convert_curve25519_to_ed25519_public(&pk, 0);
        let with_1 = convert_curve25519_to_ed25519_public(&pk, 1);
        if let (Some(a), Some(b)) = (with_0, with_1) {
            assert_ne!(a.to_bytes(), b.to_bytes());
        }
    }
}
