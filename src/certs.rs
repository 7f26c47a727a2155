use chrono::{DateTime, Utc};
use rustls::pki_types::CertificateDer;
use x509_parser::prelude::*;

use crate::errors::InspectError;

/// What a scan needs to know about a presented chain.
#[derive(Debug, Clone, PartialEq)]
pub struct CertificateSummary {
    /// Earliest `notAfter` across the leaf and every intermediate.
    pub expires_at: DateTime<Utc>,
    pub issuer: String,
    pub subject: String,
    pub chain_len: usize,
}

pub fn summarize_chain(chain: &[CertificateDer<'_>]) -> Result<CertificateSummary, InspectError> {
    let mut parsed = Vec::with_capacity(chain.len());
    for der in chain {
        let (_, cert) = X509Certificate::from_der(der.as_ref())
            .map_err(|e| InspectError::CertificateParse(e.to_string()))?;
        parsed.push(cert);
    }

    let leaf = parsed
        .first()
        .ok_or_else(|| InspectError::CertificateParse("empty certificate chain".to_string()))?;

    let mut expires_at = not_after(leaf)?;
    for cert in &parsed[1..] {
        let cert_expiry = not_after(cert)?;
        tracing::debug!(
            subject = %cert.subject(),
            issuer = %cert.issuer(),
            not_after = %cert_expiry,
            "Chain certificate"
        );
        if cert_expiry < expires_at {
            expires_at = cert_expiry;
        }
    }

    Ok(CertificateSummary {
        expires_at,
        issuer: extract_issuer(leaf),
        subject: extract_subject_common_name(leaf),
        chain_len: parsed.len(),
    })
}

pub fn not_after(cert: &X509Certificate) -> Result<DateTime<Utc>, InspectError> {
    let timestamp = cert.validity().not_after.timestamp();
    DateTime::from_timestamp(timestamp, 0).ok_or_else(|| {
        InspectError::CertificateParse(format!("notAfter {} out of range", timestamp))
    })
}

pub fn extract_subject_common_name(cert: &X509Certificate) -> String {
    let cert_subject: Vec<_> = cert
        .subject()
        .iter_common_name()
        .filter_map(|name| match name.as_str() {
            Ok(name) => Some(name.to_string()),
            Err(e) => {
                tracing::error!(error = e.to_string(), "Failed to parse subject name");
                None
            }
        })
        .collect();
    cert_subject.join(",")
}

/// Issuer organization, falling back to the issuer common name and then to the
/// whole issuer DN so the result is never empty for a parseable certificate.
pub fn extract_issuer(cert: &X509Certificate) -> String {
    let organization = cert
        .issuer()
        .iter_organization()
        .filter_map(|name| name.as_str().ok())
        .next();
    if let Some(organization) = organization {
        return organization.to_string();
    }

    let common_name = cert
        .issuer()
        .iter_common_name()
        .filter_map(|name| name.as_str().ok())
        .next();
    match common_name {
        Some(common_name) => common_name.to_string(),
        None => cert.issuer().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{CertificateParams, DnType, KeyPair};

    fn make_cert(
        common_name: &str,
        organization: Option<&str>,
        not_after: (i32, u8, u8),
    ) -> CertificateDer<'static> {
        let mut params = CertificateParams::new(vec![common_name.to_string()]).unwrap();
        params
            .distinguished_name
            .push(DnType::CommonName, common_name);
        if let Some(organization) = organization {
            params
                .distinguished_name
                .push(DnType::OrganizationName, organization);
        }
        params.not_before = rcgen::date_time_ymd(2020, 1, 1);
        params.not_after = rcgen::date_time_ymd(not_after.0, not_after.1, not_after.2);
        let key_pair = KeyPair::generate().unwrap();
        params.self_signed(&key_pair).unwrap().der().clone()
    }

    #[test]
    fn chain_expiry_is_minimum_across_chain() {
        let leaf = make_cert("example.com", Some("Leaf Org"), (2031, 6, 1));
        let intermediate = make_cert("Intermediate CA", Some("CA Org"), (2030, 1, 15));
        let root = make_cert("Root CA", Some("CA Org"), (2040, 1, 1));

        let summary = summarize_chain(&[leaf, intermediate, root]).unwrap();

        assert_eq!(summary.expires_at.date_naive().to_string(), "2030-01-15");
        assert_eq!(summary.chain_len, 3);
    }

    #[test]
    fn leaf_expiry_used_when_it_is_earliest() {
        let leaf = make_cert("example.com", Some("Leaf Org"), (2029, 3, 3));
        let intermediate = make_cert("Intermediate CA", Some("CA Org"), (2035, 1, 1));

        let summary = summarize_chain(&[leaf, intermediate]).unwrap();

        assert_eq!(summary.expires_at.date_naive().to_string(), "2029-03-03");
    }

    #[test]
    fn issuer_is_leaf_organization() {
        // Self-signed, so the issuer is the leaf's own subject.
        let leaf = make_cert("example.com", Some("Example Issuer Inc"), (2030, 1, 1));
        let summary = summarize_chain(&[leaf]).unwrap();
        assert_eq!(summary.issuer, "Example Issuer Inc");
        assert_eq!(summary.subject, "example.com");
    }

    #[test]
    fn issuer_falls_back_to_common_name() {
        let leaf = make_cert("no-org.example.com", None, (2030, 1, 1));
        let summary = summarize_chain(&[leaf]).unwrap();
        assert_eq!(summary.issuer, "no-org.example.com");
    }

    #[test]
    fn empty_chain_is_an_error() {
        assert!(matches!(
            summarize_chain(&[]),
            Err(InspectError::CertificateParse(_))
        ));
    }

    #[test]
    fn garbage_der_is_an_error() {
        let garbage = CertificateDer::from(vec![0x30, 0x03, 0x01, 0x02, 0x03]);
        assert!(matches!(
            summarize_chain(&[garbage]),
            Err(InspectError::CertificateParse(_))
        ));
    }
}
