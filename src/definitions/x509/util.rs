use const_oid::{
    db::{
        rfc4519::COMMON_NAME,
        rfc5912::{ID_EC_PUBLIC_KEY, SECP_256_R_1, SECP_384_R_1, SECP_521_R_1},
    },
    ObjectIdentifier,
};
use x509_cert::{
    attr::AttributeValue,
    der::{
        asn1::{Ia5StringRef, PrintableStringRef, TeletexStringRef, Utf8StringRef},
        Tag, Tagged,
    },
    spki::SubjectPublicKeyInfoOwned,
    Certificate,
};

use super::Error;
use crate::cose::{Curve, Ec2Key, Ec2Y};

/// secp256k1, see RFC 5480 companion registrations in SEC 2.
const SECP_256_K_1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.10");

/// Map a named-curve OID to the COSE curve.
pub fn curve_from_oid(oid: &ObjectIdentifier) -> Option<Curve> {
    [
        (SECP_256_R_1, Curve::P256),
        (SECP_384_R_1, Curve::P384),
        (SECP_521_R_1, Curve::P521),
        (SECP_256_K_1, Curve::Secp256k1),
    ]
    .into_iter()
    .find_map(|(known, curve)| (known == *oid).then_some(curve))
}

/// Turn an `id-ecPublicKey` SubjectPublicKeyInfo into a COSE EC2 key.
///
/// The curve comes from the algorithm parameters. Compressed points keep their sign bit
/// and are expanded only when the key is used.
pub fn ec2_key_from_spki(spki: &SubjectPublicKeyInfoOwned) -> Result<Ec2Key, Error> {
    if spki.algorithm.oid != ID_EC_PUBLIC_KEY {
        return Err(Error::UnsupportedKeyType(spki.algorithm.oid.to_string()));
    }
    let curve_oid: ObjectIdentifier = spki
        .algorithm
        .parameters
        .as_ref()
        .ok_or(Error::MissingCurve)?
        .decode_as()
        .map_err(|_| Error::MissingCurve)?;
    let crv = curve_from_oid(&curve_oid).ok_or(Error::UnsupportedCurve(curve_oid.to_string()))?;

    let point = spki
        .subject_public_key
        .as_bytes()
        .ok_or(Error::InvalidPoint)?;
    let len = crv.coordinate_len();
    match point.split_first() {
        Some((0x04, coordinates)) if coordinates.len() == 2 * len => {
            let (x, y) = coordinates.split_at(len);
            Ok(Ec2Key {
                alg: None,
                crv,
                x: x.to_vec(),
                y: Ec2Y::Value(y.to_vec()),
            })
        }
        Some((prefix @ (0x02 | 0x03), x)) if x.len() == len => Ok(Ec2Key {
            alg: None,
            crv,
            x: x.to_vec(),
            y: Ec2Y::SignBit(*prefix == 0x03),
        }),
        _ => Err(Error::InvalidPoint),
    }
}

/// Get the first CommonName of the X.509 certificate, or return "Unknown".
pub fn common_name_or_unknown(certificate: &Certificate) -> &str {
    common_name(certificate).unwrap_or("Unknown")
}

fn common_name(certificate: &Certificate) -> Option<&str> {
    certificate
        .tbs_certificate
        .subject
        .0
        .iter()
        .flat_map(|rdn| rdn.0.iter())
        .filter_map(|attribute| {
            if attribute.oid == COMMON_NAME {
                attribute_value_to_str(&attribute.value)
            } else {
                None
            }
        })
        .next()
}

fn attribute_value_to_str(av: &AttributeValue) -> Option<&str> {
    match av.tag() {
        Tag::PrintableString => PrintableStringRef::try_from(av).ok().map(|s| s.as_str()),
        Tag::Utf8String => Utf8StringRef::try_from(av).ok().map(|s| s.as_str()),
        Tag::Ia5String => Ia5StringRef::try_from(av).ok().map(|s| s.as_str()),
        Tag::TeletexString => TeletexStringRef::try_from(av).ok().map(|s| s.as_str()),
        _ => None,
    }
}
