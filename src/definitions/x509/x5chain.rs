use ciborium::Value;
use pem_rfc7468::LineEnding;
use x509_cert::{
    certificate::Certificate,
    der::{Decode, Encode},
};

use super::util::{common_name_or_unknown, ec2_key_from_spki};
use super::Error;
use crate::cose::Ec2Key;

/// X.509 certificate with the DER representation held in memory for ease of serialization.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CertificateWithDer {
    pub inner: Certificate,
    der: Vec<u8>,
}

impl CertificateWithDer {
    pub fn from_der(bytes: &[u8]) -> Result<Self, Error> {
        let inner = Certificate::from_der(bytes)?;
        Ok(Self {
            inner,
            der: bytes.to_vec(),
        })
    }

    pub fn from_cert(certificate: Certificate) -> Result<Self, Error> {
        let der = certificate.to_der()?;
        Ok(Self {
            inner: certificate,
            der,
        })
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn to_pem(&self) -> Result<String, Error> {
        pem_rfc7468::encode_string("CERTIFICATE", LineEnding::LF, &self.der)
            .map_err(|e| Error::Pem(e.to_string()))
    }
}

/// A certificate chain, leaf first. Never empty.
#[derive(Debug, Clone)]
pub struct X5Chain(Vec<CertificateWithDer>);

impl X5Chain {
    /// Build from DER certificates, leaf first.
    pub fn from_der_chain<I, B>(certificates: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let certs = certificates
            .into_iter()
            .map(|der| CertificateWithDer::from_der(der.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        if certs.is_empty() {
            return Err(Error::EmptyChain);
        }
        Ok(Self(certs))
    }

    /// Decode the `x5chain` COSE header: a bare byte string or an array of them.
    pub fn from_cbor(cbor: &Value) -> Result<Self, Error> {
        match cbor {
            Value::Bytes(bytes) => Self::from_der_chain([bytes]),
            Value::Array(x509s) => {
                let ders = x509s
                    .iter()
                    .map(|x509| match x509 {
                        Value::Bytes(bytes) => Ok(bytes),
                        other => Err(Error::UnexpectedCbor(format!(
                            "expected x509 certificate in the x5chain to be a cbor encoded bytestring, but received: {other:?}"
                        ))),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Self::from_der_chain(ders)
            }
            other => Err(Error::UnexpectedCbor(format!(
                "expected x5chain to be a cbor encoded bytestring or array, but received: {other:?}"
            ))),
        }
    }

    fn end_entity(&self) -> &CertificateWithDer {
        // Constructors reject empty chains.
        &self.0[0]
    }

    /// Retrieve the end-entity certificate.
    pub fn end_entity_certificate(&self) -> &Certificate {
        &self.end_entity().inner
    }

    /// The end-entity public key as a COSE EC2 key, curve taken from the SPKI.
    pub fn end_entity_ec2_key(&self) -> Result<Ec2Key, Error> {
        ec2_key_from_spki(
            &self
                .end_entity_certificate()
                .tbs_certificate
                .subject_public_key_info,
        )
    }

    /// The end-entity certificate re-encoded as PEM, for diagnostics.
    pub fn end_entity_pem(&self) -> Result<String, Error> {
        self.end_entity().to_pem()
    }

    pub fn end_entity_common_name(&self) -> &str {
        common_name_or_unknown(self.end_entity_certificate())
    }

    /// Iterate over the certificates in the chain.
    pub fn iter(&self) -> impl Iterator<Item = &CertificateWithDer> {
        self.0.iter()
    }
}
