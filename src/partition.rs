//! Naming of the tenant/project/date document partitions.

use crate::error::{LogifyError, Result};
use crate::types::LogRecord;
use chrono::{DateTime, NaiveDate, Utc};

/// Which calendar day a record's partition is named after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartitionDate {
    /// UTC day on the indexer's clock when the record is written.
    #[default]
    ProcessingTime,
    /// UTC day of the record's own `timestamp`. Records whose timestamp does
    /// not parse fall back to processing time.
    RecordTime,
}

impl PartitionDate {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "processing" | "processing_time" => Ok(PartitionDate::ProcessingTime),
            "record" | "record_time" => Ok(PartitionDate::RecordTime),
            other => Err(LogifyError::Config(format!(
                "Unknown partition date '{}', expected 'processing' or 'record'",
                other
            ))),
        }
    }

    pub fn date_for(&self, record: &LogRecord, now: DateTime<Utc>) -> NaiveDate {
        match self {
            PartitionDate::ProcessingTime => now.date_naive(),
            PartitionDate::RecordTime => record
                .parsed_timestamp()
                .map(|t| t.date_naive())
                .unwrap_or_else(|| now.date_naive()),
        }
    }
}

/// `tenant-{tenant}-project-{project}-date-{YYYY-MM-DD}`
pub fn partition_name(tenant_id: &str, project_id: &str, date: NaiveDate) -> String {
    format!(
        "tenant-{}-project-{}-date-{}",
        tenant_id,
        project_id,
        date.format("%Y-%m-%d")
    )
}

/// Wildcard covering every date partition of one tenant/project.
pub fn partition_pattern(tenant_id: &str, project_id: &str) -> String {
    format!("tenant-{}-project-{}-date-*", tenant_id, project_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_partition_name() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 7).unwrap();
        assert_eq!(
            partition_name("t1", "p1", date),
            "tenant-t1-project-p1-date-2025-01-07"
        );
        assert_eq!(partition_pattern("t1", "p1"), "tenant-t1-project-p1-date-*");
    }

    #[test]
    fn test_date_strategies() {
        let now = Utc.with_ymd_and_hms(2025, 1, 8, 0, 30, 0).unwrap();
        let record = LogRecord {
            timestamp: "2025-01-07T23:59:00Z".into(),
            ..Default::default()
        };
        assert_eq!(
            PartitionDate::ProcessingTime.date_for(&record, now),
            NaiveDate::from_ymd_opt(2025, 1, 8).unwrap()
        );
        assert_eq!(
            PartitionDate::RecordTime.date_for(&record, now),
            NaiveDate::from_ymd_opt(2025, 1, 7).unwrap()
        );

        let garbled = LogRecord {
            timestamp: "yesterday".into(),
            ..Default::default()
        };
        assert_eq!(
            PartitionDate::RecordTime.date_for(&garbled, now),
            NaiveDate::from_ymd_opt(2025, 1, 8).unwrap()
        );
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            PartitionDate::parse("Record").unwrap(),
            PartitionDate::RecordTime
        );
        assert!(PartitionDate::parse("weekly").is_err());
    }
}
