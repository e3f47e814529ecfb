//! Thin wrapper around the KMS decrypt operation.
//!
//! The two service passwords are stored KMS-encrypted and base64-encoded in
//! the environment. They are decrypted once at startup; the plaintext lives
//! only in the in-memory `Config` for the duration of the run.

use anyhow::{Context, Result};
use aws_sdk_kms::primitives::Blob;
use base64::prelude::*;

/// Decrypt a base64-encoded, KMS-encrypted ciphertext into a UTF-8 string.
pub async fn decrypt(kms: &aws_sdk_kms::Client, ciphertext_b64: &str) -> Result<String> {
    let ciphertext = decode_ciphertext(ciphertext_b64)?;

    let output = kms
        .decrypt()
        .ciphertext_blob(Blob::new(ciphertext))
        .send()
        .await
        .context("KMS decrypt call failed")?;

    let plaintext = output
        .plaintext()
        .context("KMS decrypt response carried no plaintext")?;

    String::from_utf8(plaintext.as_ref().to_vec())
        .context("decrypted secret is not valid UTF-8")
}

/// Base64-decode the ciphertext as stored in the environment.
fn decode_ciphertext(ciphertext_b64: &str) -> Result<Vec<u8>> {
    BASE64_STANDARD
        .decode(ciphertext_b64.trim())
        .context("encrypted secret is not valid base64")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_ciphertext_valid_base64() {
        assert_eq!(decode_ciphertext("aGVsbG8=").unwrap(), b"hello");
    }

    #[test]
    fn decode_ciphertext_trims_whitespace() {
        assert_eq!(decode_ciphertext(" aGVsbG8=\n").unwrap(), b"hello");
    }

    #[test]
    fn decode_ciphertext_rejects_garbage() {
        let err = decode_ciphertext("not base64!!").unwrap_err();
        assert!(err.to_string().contains("base64"));
    }
}
