use anyhow::{Context, Result};

use crate::secrets;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// All operational values for one run, loaded once at startup and never
/// mutated afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    /// Relative humidity (%) above which the dehumidifier must run.
    pub humidity_threshold: f64,
    /// Current draw (A) below which a running dehumidifier is considered
    /// blocked — the water shutoff has tripped and the reservoir is full.
    pub current_alert: f64,
    pub tado_username: String,
    /// Decrypted Tado account password.
    pub tado_password: String,
    pub kasa_username: String,
    /// Decrypted Kasa cloud password.
    pub kasa_password: String,
    /// Human-readable plug alias, as shown in the Kasa app.
    pub kasa_device_alias: String,
    /// Regional Kasa cloud endpoint, e.g. `https://eu-wap.tplinkcloud.com`.
    pub kasa_endpoint: String,
    pub sender_email: String,
    pub recipient_email: String,
}

impl Config {
    /// Read every required key from the environment and decrypt the two
    /// KMS-encrypted passwords. Any missing key, unparsable threshold, or
    /// decrypt failure aborts the run before the first service call.
    pub async fn load(kms: &aws_sdk_kms::Client) -> Result<Self> {
        Ok(Self {
            humidity_threshold: parse_threshold(
                "HUMIDITY_THRESHOLD",
                &required("HUMIDITY_THRESHOLD")?,
            )?,
            current_alert: parse_threshold("CURRENT_ALERT", &required("CURRENT_ALERT")?)?,
            tado_username: required("TADO_USERNAME")?,
            tado_password: secrets::decrypt(kms, &required("TADO_PASSWORD")?)
                .await
                .context("failed to decrypt TADO_PASSWORD")?,
            kasa_username: required("KASA_USERNAME")?,
            kasa_password: secrets::decrypt(kms, &required("KASA_PASSWORD")?)
                .await
                .context("failed to decrypt KASA_PASSWORD")?,
            kasa_device_alias: required("KASA_DEVICE")?,
            kasa_endpoint: required("KASA_URL")?,
            sender_email: required("SENDER_EMAIL")?,
            recipient_email: required("RECIPIENT_EMAIL")?,
        })
    }
}

/// Parse a threshold env value into a float, naming the offending key on
/// failure.
fn parse_threshold(key: &str, raw: &str) -> Result<f64> {
    raw.trim()
        .parse()
        .with_context(|| format!("{key} must be a number, got: {raw:?}"))
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("missing required env var: {key}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_threshold_float() {
        assert_eq!(parse_threshold("HUMIDITY_THRESHOLD", "62.5").unwrap(), 62.5);
    }

    #[test]
    fn parse_threshold_integer_literal() {
        assert_eq!(parse_threshold("HUMIDITY_THRESHOLD", "60").unwrap(), 60.0);
    }

    #[test]
    fn parse_threshold_trims_whitespace() {
        assert_eq!(parse_threshold("CURRENT_ALERT", " 0.3\n").unwrap(), 0.3);
    }

    #[test]
    fn parse_threshold_garbage_names_the_key() {
        let err = parse_threshold("CURRENT_ALERT", "low").unwrap_err();
        assert!(err.to_string().contains("CURRENT_ALERT"));
    }

    #[test]
    fn parse_threshold_empty_errors() {
        assert!(parse_threshold("HUMIDITY_THRESHOLD", "").is_err());
    }
}
