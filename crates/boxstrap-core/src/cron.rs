use crate::error::{ProvisionError, Result};
use std::fmt;

/// One five-field crontab line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronEntry {
    pub minute: String,
    pub hour: String,
    pub day_of_month: String,
    pub month: String,
    pub day_of_week: String,
    pub command: String,
}

impl CronEntry {
    /// Build an entry from a `"m h dom mon dow"` schedule string.
    pub fn new(schedule: &str, command: impl Into<String>) -> Result<Self> {
        let fields: Vec<&str> = schedule.split_whitespace().collect();
        let [minute, hour, day_of_month, month, day_of_week] = fields.as_slice() else {
            return Err(ProvisionError::Settings(format!(
                "cron schedule needs 5 fields: '{schedule}'"
            )));
        };
        Ok(Self {
            minute: minute.to_string(),
            hour: hour.to_string(),
            day_of_month: day_of_month.to_string(),
            month: month.to_string(),
            day_of_week: day_of_week.to_string(),
            command: command.into(),
        })
    }

    /// Daily certificate renewal followed by a restart of `service`.
    pub fn certificate_renewal(schedule: &str, service: &str) -> Result<Self> {
        Self::new(
            schedule,
            format!("certbot renew --quiet && systemctl restart {service}"),
        )
    }
}

impl fmt::Display for CronEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {}",
            self.minute, self.hour, self.day_of_month, self.month, self.day_of_week, self.command
        )
    }
}

/// Return `existing` with `entry` appended, or None when an identical line
/// is already present.
pub fn merge_crontab(existing: &str, entry: &CronEntry) -> Option<String> {
    let line = entry.to_string();
    if existing.lines().any(|l| l.trim() == line) {
        return None;
    }
    let mut merged = existing.to_string();
    if !merged.is_empty() && !merged.ends_with('\n') {
        merged.push('\n');
    }
    merged.push_str(&line);
    merged.push('\n');
    Some(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renewal_entry_renders_five_fields_and_command() {
        let entry = CronEntry::certificate_renewal("0 3 * * *", "sing-box").unwrap();
        assert_eq!(
            entry.to_string(),
            "0 3 * * * certbot renew --quiet && systemctl restart sing-box"
        );
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert!(CronEntry::new("0 3 * *", "true").is_err());
        assert!(CronEntry::new("0 3 * * * *", "true").is_err());
    }

    #[test]
    fn merge_into_empty_crontab() {
        let entry = CronEntry::new("0 3 * * *", "true").unwrap();
        assert_eq!(merge_crontab("", &entry).unwrap(), "0 3 * * * true\n");
    }

    #[test]
    fn merge_preserves_existing_lines() {
        let entry = CronEntry::new("0 3 * * *", "true").unwrap();
        let merged = merge_crontab("MAILTO=root\n*/5 * * * * backup", &entry).unwrap();
        assert_eq!(merged, "MAILTO=root\n*/5 * * * * backup\n0 3 * * * true\n");
    }

    #[test]
    fn merge_is_idempotent() {
        let entry = CronEntry::new("0 3 * * *", "true").unwrap();
        let once = merge_crontab("", &entry).unwrap();
        assert!(merge_crontab(&once, &entry).is_none());
    }
}
