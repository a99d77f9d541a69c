//! Flag ledger
//!
//! Remembers the last observed flag per asset between cycles, so a long
//! running watcher can fill in `previous_status` when the upstream snapshot
//! does not carry it.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

use crate::types::{BootstrapSnapshot, StatusFlag};

#[derive(Debug, Clone)]
struct LedgerEntry {
    flag: StatusFlag,
    changed_from: Option<StatusFlag>,
    changed_at: Option<DateTime<Utc>>,
}

/// Last seen flag per asset id
#[derive(Debug, Clone)]
pub struct FlagLedger {
    entries: HashMap<u32, LedgerEntry>,
    /// How long a recorded change keeps being replayed into snapshots
    retain: Duration,
}

impl Default for FlagLedger {
    fn default() -> Self {
        Self::new(24.0)
    }
}

impl FlagLedger {
    pub fn new(retain_hours: f64) -> Self {
        Self {
            entries: HashMap::new(),
            retain: Duration::seconds((retain_hours.max(0.0) * 3600.0) as i64),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last_seen(&self, asset_id: u32) -> Option<StatusFlag> {
        self.entries.get(&asset_id).map(|e| e.flag)
    }

    /// Fill in missing previous flags from what was seen in earlier cycles
    pub fn annotate(&self, snapshot: &mut BootstrapSnapshot, now: DateTime<Utc>) {
        for element in snapshot.elements.iter_mut() {
            if element.previous_status.is_some() {
                continue;
            }
            let Some(entry) = self.entries.get(&element.id) else {
                continue;
            };
            let Some(current) = StatusFlag::from_code(&element.status) else {
                continue;
            };

            if entry.flag != current {
                element.previous_status = Some(entry.flag.code().to_string());
                if element.news_added.is_none() {
                    element.news_added = Some(now);
                }
            } else if let (Some(from), Some(at)) = (entry.changed_from, entry.changed_at) {
                // Keep replaying a recent change so its lock window survives
                if at + self.retain > now {
                    element.previous_status = Some(from.code().to_string());
                    element.news_added = Some(at);
                }
            }
        }
    }

    /// Record the flags observed in this cycle
    pub fn record(&mut self, snapshot: &BootstrapSnapshot, now: DateTime<Utc>) {
        for element in &snapshot.elements {
            let Some(current) = StatusFlag::from_code(&element.status) else {
                continue;
            };

            match self.entries.get_mut(&element.id) {
                Some(entry) if entry.flag != current => {
                    entry.changed_from = Some(entry.flag);
                    entry.changed_at = Some(element.news_added.unwrap_or(now));
                    entry.flag = current;
                }
                Some(_) => {}
                None => {
                    self.entries.insert(
                        element.id,
                        LedgerEntry {
                            flag: current,
                            changed_from: None,
                            changed_at: None,
                        },
                    );
                }
            }
        }
    }
}
