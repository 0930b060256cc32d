use anyhow::{bail, Context, Result};
use contexa_sdk::{decode_payload, PushPayload, SdkErrorCode, SdkSettings};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

#[derive(Debug, Serialize, PartialEq)]
pub struct SettingsReport {
    pub app_id: String,
    pub app_secret: &'static str,
    pub feature_bits: u32,
    pub custom_error_notification: bool,
    pub disable_sdk_logging: bool,
    pub telemetry_capacity: usize,
    pub event_requirements: Vec<String>,
}

/// Loads and validates a settings file. The secret is never echoed.
pub fn check_config(path: &Path) -> Result<SettingsReport> {
    let settings = SdkSettings::from_path(path)
        .with_context(|| format!("failed to load settings from {}", path.display()))?;
    settings.validate().context("settings are invalid")?;
    log::debug!("settings for app '{}' are valid", settings.app_id);
    Ok(SettingsReport {
        app_id: settings.app_id,
        app_secret: "<set>",
        feature_bits: settings.features.bits(),
        custom_error_notification: settings.features.custom_error_notification,
        disable_sdk_logging: settings.features.disable_sdk_logging,
        telemetry_capacity: settings.telemetry_capacity,
        event_requirements: settings
            .event_requirements
            .iter()
            .map(|requirement| {
                let mut needs: Vec<&str> =
                    requirement.capabilities.iter().map(String::as_str).collect();
                needs.extend(requirement.permissions.iter().map(String::as_str));
                format!("{} <- [{}]", requirement.event.trim(), needs.join(", "))
            })
            .collect(),
    })
}

#[derive(Debug, Serialize, PartialEq)]
pub struct PushReport {
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

pub fn decode_push(raw: &str) -> Result<PushReport> {
    let payload: Value = serde_json::from_str(raw).context("push payload is not valid JSON")?;
    let decoded = decode_payload(&payload);
    let mut report = PushReport {
        kind: decoded.kind().as_str(),
        event_id: None,
        event_name: None,
        identifier: None,
        timestamp: None,
        errors: Vec::new(),
    };
    match decoded {
        PushPayload::Event(event) => {
            report.event_id = Some(event.event_id);
            report.event_name = Some(event.event_name);
            report.identifier = event.identifier;
            report.timestamp = event.timestamp;
        }
        PushPayload::Errors(batch) => {
            report.errors = batch
                .errors
                .iter()
                .map(|notice| format!("{}: {}", notice.code, notice.message))
                .collect();
        }
        PushPayload::Unrecognized => {}
    }
    Ok(report)
}

/// Accepts plain hex or the bracketed, space-separated form some platforms
/// print (`<a1b2c3d4 e5f6...>`) and returns lowercase hex.
pub fn normalize_token(input: &str) -> Result<String> {
    let compact: String = input
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '-') && !c.is_whitespace())
        .collect();
    if compact.is_empty() {
        bail!("device token is empty");
    }
    let raw = hex::decode(&compact).context("device token is not hex")?;
    Ok(hex::encode(raw))
}

pub fn error_code_rows() -> Vec<Vec<String>> {
    SdkErrorCode::ALL
        .iter()
        .map(|code| vec![code.as_u32().to_string(), code.as_str().to_owned()])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::NamedTempFile;

    fn settings_file(contents: &str) -> NamedTempFile {
        let file = NamedTempFile::new().expect("temp file");
        fs::write(file.path(), contents).expect("write settings");
        file
    }

    #[test]
    fn check_config_reports_without_the_secret() {
        let file = settings_file(
            r#"
app_id = "demo-app"
app_secret = "very-secret"

[features]
custom_error_notification = true

[[event_requirements]]
event = "event.needs.device"
capabilities = ["heart_rate"]
"#,
        );
        let report = check_config(file.path()).expect("valid settings");
        assert_eq!(report.app_id, "demo-app");
        assert_eq!(report.feature_bits, 1);
        assert!(report.custom_error_notification);
        assert_eq!(
            report.event_requirements,
            vec!["event.needs.device <- [heart_rate]".to_owned()]
        );
        let rendered = serde_json::to_string(&report).expect("serialize");
        assert!(!rendered.contains("very-secret"));
    }

    #[test]
    fn check_config_rejects_invalid_settings() {
        let file = settings_file("app_id = \"\"\napp_secret = \"s\"\n");
        let err = check_config(file.path()).expect_err("empty app id");
        assert!(format!("{err:#}").contains("app_id"));

        let missing = check_config(Path::new("/nonexistent/contexa.toml")).expect_err("missing");
        assert!(missing.to_string().contains("failed to load settings"));
    }

    #[test]
    fn decode_push_classifies_payloads() {
        let event = decode_push(
            r#"{"type":"event","event":{"id":12,"name":"user.arrived"},"identifier":"sub1"}"#,
        )
        .expect("event");
        assert_eq!(event.kind, "typed_event");
        assert_eq!(event.event_id.as_deref(), Some("12"));
        assert_eq!(event.identifier.as_deref(), Some("sub1"));

        let errors =
            decode_push(r#"{"type":"errors","errors":[{"code":1002,"message":"wifi off"}]}"#)
                .expect("errors");
        assert_eq!(errors.kind, "error_batch");
        assert_eq!(errors.errors, vec!["wifi_disabled (1002): wifi off".to_owned()]);

        assert_eq!(decode_push(r#"{"aps":{}}"#).expect("other").kind, "unrecognized");
        assert!(decode_push("not json").is_err());
    }

    #[test]
    fn tokens_normalize_to_lowercase_hex() {
        assert_eq!(normalize_token("<DEADBEEF 0102>").expect("bracketed"), "deadbeef0102");
        assert_eq!(normalize_token("de:ad").expect("colons"), "dead");
        assert!(normalize_token("<>").is_err());
        assert!(normalize_token("xyz").is_err());
    }

    #[test]
    fn error_codes_cover_the_stable_range() {
        let rows = error_code_rows();
        assert_eq!(rows.first().map(|row| row[0].as_str()), Some("1000"));
        assert_eq!(rows.last().map(|row| row[1].as_str()), Some("motion_data_disabled"));
    }
}
