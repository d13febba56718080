//! PCR signing key loading and fingerprinting.
//!
//! The key file holds a PEM block whose DER payload identifies the key that
//! signs PCR measurements.  Only the raw DER bytes matter: the fingerprint is
//! the SHA-256 of those bytes, rendered as upper-case hex pairs separated by
//! colons (`"AB:CD:…"`, 95 characters).

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use platsec_types::PlatError;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// Well-known location of the PCR signing key.
pub const DEFAULT_SIGNING_KEY_PATH: &str = "/usr/share/platsec/pcr-signing-key.pem";

/// The DER bytes of a signing certificate or public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningCertificate {
    raw: Vec<u8>,
}

impl SigningCertificate {
    pub fn from_der(raw: Vec<u8>) -> Self {
        Self { raw }
    }

    /// Take the DER payload of the first PEM block in `data`, whatever its
    /// label.  Text before the block is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`PlatError::SigningKey`] when `data` holds no decodable PEM
    /// block.
    pub fn from_pem(data: &[u8]) -> Result<Self, PlatError> {
        let block = pem::parse(data).map_err(|e| {
            PlatError::SigningKey(format!("failed to decode PEM block for PCR public key: {e}"))
        })?;
        debug!(label = block.tag(), len = block.contents().len(), "decoded PCR signing key block");
        Ok(Self {
            raw: block.contents().to_vec(),
        })
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(&self.raw)
    }
}

/// SHA-256 of `der` as colon-separated upper-case hex pairs.
///
/// ```
/// use platsec_controllers::signing_key::fingerprint;
///
/// let fp = fingerprint(b"");
/// assert!(fp.starts_with("E3:B0:C4:42"));
/// assert_eq!(fp.len(), 95);
/// ```
pub fn fingerprint(der: &[u8]) -> String {
    let digest = hex::encode(Sha256::digest(der));
    let mut out = String::with_capacity(digest.len() + digest.len() / 2);
    for (i, c) in digest.chars().enumerate() {
        if i > 0 && i % 2 == 0 {
            out.push(':');
        }
        out.push(c.to_ascii_uppercase());
    }
    out
}

/// Load the signing key at `path`.
///
/// Returns `Ok(None)` when there is no key to fingerprint: the file does not
/// exist, or it cannot be read (logged at warn level).
///
/// # Errors
///
/// Returns [`PlatError::SigningKey`] when the file was read but holds no
/// usable PEM block.
pub fn load(path: &Path) -> Result<Option<SigningCertificate>, PlatError> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no PCR signing key present");
            return Ok(None);
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "PCR signing key unreadable, skipping fingerprint");
            return Ok(None);
        }
    };
    SigningCertificate::from_pem(&data).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// SHA-256 of the empty input.
    const EMPTY_FINGERPRINT: &str = "E3:B0:C4:42:98:FC:1C:14:9A:FB:F4:C8:99:6F:B9:24:\
                                     27:AE:41:E4:64:9B:93:4C:A4:95:99:1B:78:52:B8:55";

    /// SHA-256 of `b"hello"`.
    const HELLO_FINGERPRINT: &str = "2C:F2:4D:BA:5F:B0:A3:0E:26:E8:3B:2A:C5:B9:E2:9E:\
                                     1B:16:1E:5C:1F:A7:42:5E:73:04:33:62:93:8B:98:24";

    fn pem(label: &str, base64_body: &str) -> String {
        format!("-----BEGIN {label}-----\n{base64_body}\n-----END {label}-----\n")
    }

    // ------------------------------------------------------------------ fingerprint

    #[test]
    fn fingerprint_of_empty_input() {
        let fp = fingerprint(b"");
        assert_eq!(fp, EMPTY_FINGERPRINT);
        assert_eq!(fp.len(), 95);
        assert_eq!(fp.matches(':').count(), 31);
    }

    #[test]
    fn fingerprint_groups_uppercase_pairs() {
        let fp = fingerprint(b"hello");
        assert_eq!(fp, HELLO_FINGERPRINT);
        assert!(fp.split(':').all(|pair| pair.len() == 2
            && pair.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())));
    }

    // ------------------------------------------------------------------ PEM

    #[test]
    fn certificate_block_yields_der_bytes() {
        // "aGVsbG8=" is base64 for "hello".
        let cert = SigningCertificate::from_pem(pem("CERTIFICATE", "aGVsbG8=").as_bytes()).unwrap();
        assert_eq!(cert.raw(), b"hello");
        assert_eq!(cert.fingerprint(), HELLO_FINGERPRINT);
    }

    #[test]
    fn first_block_wins_whatever_its_label() {
        for label in ["PUBLIC KEY", "RSA PUBLIC KEY", "PRIVATE KEY", "SOMETHING ELSE"] {
            let cert = SigningCertificate::from_pem(pem(label, "aGVsbG8=").as_bytes()).unwrap();
            assert_eq!(cert.raw(), b"hello", "label {label}");
        }
    }

    #[test]
    fn later_blocks_are_ignored() {
        // "d29ybGQ=" is base64 for "world".
        let data = format!(
            "{}{}",
            pem("RSA PUBLIC KEY", "aGVsbG8="),
            pem("CERTIFICATE", "d29ybGQ=")
        );
        let cert = SigningCertificate::from_pem(data.as_bytes()).unwrap();
        assert_eq!(cert.raw(), b"hello");
    }

    #[test]
    fn leading_text_is_skipped() {
        let data = format!("key used for PCR policy\n{}", pem("PUBLIC KEY", "aGVsbG8="));
        let cert = SigningCertificate::from_pem(data.as_bytes()).unwrap();
        assert_eq!(cert.fingerprint(), HELLO_FINGERPRINT);
    }

    #[test]
    fn non_pem_payload_is_rejected() {
        let result = SigningCertificate::from_pem(b"definitely not a certificate");
        assert!(matches!(result, Err(PlatError::SigningKey(ref msg)) if msg.contains("failed to decode PEM block")));
    }

    #[test]
    fn empty_payload_is_rejected() {
        assert!(SigningCertificate::from_pem(b"").is_err());
    }

    // ------------------------------------------------------------------ load

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let result = load(&dir.path().join("absent.pem")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn unreadable_path_is_skipped() {
        // Reading a directory fails with something other than NotFound.
        let dir = tempfile::tempdir().expect("tmp dir");
        assert!(load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn present_file_is_parsed() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("key.pem");
        fs::write(&path, pem("CERTIFICATE", "aGVsbG8=")).unwrap();

        let cert = load(&path).unwrap().expect("certificate");
        assert_eq!(cert, SigningCertificate::from_der(b"hello".to_vec()));
    }

    #[test]
    fn present_garbage_file_fails() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("key.pem");
        fs::write(&path, "garbage").unwrap();

        assert!(matches!(load(&path), Err(PlatError::SigningKey(_))));
    }
}
