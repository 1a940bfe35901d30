//! Named validators a webhook [`Integration`](notify_core::Integration) can
//! ask the dispatcher to run against a rendered message before delivery.

use serde_json::Value;

use crate::error::DispatchError;

pub enum ValidatorOutcome {
    Accepted,
    Rejected(String),
}

/// Resolve `name` and run it against `data`. Unknown validator names are a
/// `Misconfigured` condition, not a silent pass-through.
pub fn run(name: &str, data: &str) -> Result<ValidatorOutcome, DispatchError> {
    match name {
        "alertmanager" => Ok(alertmanager(data)),
        other => Err(DispatchError::UnknownValidator(other.to_string())),
    }
}

/// `data` must decode as a JSON array of objects, each carrying a `labels`
/// mapping with a non-empty `alertname` and a non-empty `startsAt` string.
fn alertmanager(data: &str) -> ValidatorOutcome {
    let parsed: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(err) => return ValidatorOutcome::Rejected(format!("payload is not valid JSON: {err}")),
    };

    let Some(alerts) = parsed.as_array() else {
        return ValidatorOutcome::Rejected("payload must be a JSON array of alerts".to_string());
    };

    for (index, alert) in alerts.iter().enumerate() {
        let alertname = alert.pointer("/labels/alertname").and_then(Value::as_str);
        if alertname.is_none_or(str::is_empty) {
            return ValidatorOutcome::Rejected(format!("alert[{index}] is missing labels.alertname"));
        }

        let starts_at = alert.pointer("/startsAt").and_then(Value::as_str);
        if starts_at.is_none_or(str::is_empty) {
            return ValidatorOutcome::Rejected(format!("alert[{index}] is missing a non-empty startsAt"));
        }
    }

    ValidatorOutcome::Accepted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_a_well_formed_alert_list() {
        let data = r#"[{"labels":{"alertname":"X"},"startsAt":"2024-01-01T00:00:00Z"}]"#;
        assert!(matches!(run("alertmanager", data).unwrap(), ValidatorOutcome::Accepted));
    }

    #[test]
    fn rejects_missing_alertname() {
        let data = r#"[{"labels":{}}]"#;
        match run("alertmanager", data).unwrap() {
            ValidatorOutcome::Rejected(hint) => assert!(hint.contains("alertname")),
            ValidatorOutcome::Accepted => panic!("expected rejection"),
        }
    }

    #[test]
    fn unknown_validator_name_is_misconfigured() {
        assert!(matches!(run("no-such-validator", "[]"), Err(DispatchError::UnknownValidator(_))));
    }
}
