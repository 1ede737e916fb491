//! Grouping of onboarding records that share a key

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use crate::reconciliation::report::DuplicateReport;
use crate::types::SchoolRecord;

/// Records sharing one key value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup<R> {
    pub key_value: String,
    pub count: usize,
    pub members: Vec<R>,
}

/// Group `records` by `key_fn` and keep groups with more than one member
///
/// Records whose key is missing or blank are ignored. Groups come out in the
/// order their key was first seen, members in input order.
pub fn find_duplicates<R, F>(records: &[R], key_fn: F) -> Vec<DuplicateGroup<R>>
where
    R: Clone,
    F: Fn(&R) -> Option<&str>,
{
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(&str, Vec<R>)> = Vec::new();

    for record in records {
        let key = match key_fn(record).map(str::trim) {
            Some(key) if !key.is_empty() => key,
            _ => continue,
        };

        match positions.get(key) {
            Some(&index) => groups[index].1.push(record.clone()),
            None => {
                positions.insert(key, groups.len());
                groups.push((key, vec![record.clone()]));
            }
        }
    }

    groups
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .map(|(key, members)| DuplicateGroup {
            key_value: key.to_string(),
            count: members.len(),
            members,
        })
        .collect()
}

/// Duplicate checks over school onboarding records
pub struct DuplicateDetector;

impl DuplicateDetector {
    pub fn by_email(records: &[SchoolRecord]) -> Vec<DuplicateGroup<SchoolRecord>> {
        find_duplicates(records, |r| r.email.as_deref())
    }

    pub fn by_client_id(records: &[SchoolRecord]) -> Vec<DuplicateGroup<SchoolRecord>> {
        find_duplicates(records, |r| r.client_id.as_deref())
    }

    pub fn by_price_key(records: &[SchoolRecord]) -> Vec<DuplicateGroup<SchoolRecord>> {
        find_duplicates(records, |r| r.price_key.as_deref())
    }

    /// Run each key separately over the same population
    pub fn scan(records: &[SchoolRecord]) -> DuplicateReport {
        let report = DuplicateReport {
            by_email: Self::by_email(records),
            by_client_id: Self::by_client_id(records),
            by_price_key: Self::by_price_key(records),
        };

        info!(
            records = records.len(),
            email_groups = report.by_email.len(),
            client_id_groups = report.by_client_id.len(),
            price_key_groups = report.by_price_key.len(),
            "duplicate scan finished"
        );

        report
    }
}
