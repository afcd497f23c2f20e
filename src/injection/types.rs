use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Durations travel as whole milliseconds.
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// An uploaded ledger workbook awaiting injection.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SourceDocument {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectionConfig {
    /// Pause between two consecutive items.
    #[serde(with = "duration_ms", rename = "itemDelayMs")]
    pub item_delay: Duration,
    /// Wait before resubmitting rate-limited items.
    #[serde(with = "duration_ms", rename = "cooldownMs")]
    pub cooldown: Duration,
    pub auto_retry: bool,
    /// Destination tab; `None` addresses the first tab.
    #[serde(default)]
    pub tab_name: Option<String>,
}

impl Default for InjectionConfig {
    fn default() -> Self {
        Self {
            item_delay: Duration::from_millis(300),
            cooldown: Duration::from_secs(60),
            auto_retry: true,
            tab_name: None,
        }
    }
}

impl InjectionConfig {
    pub fn with_item_delay(mut self, delay: Duration) -> Self {
        self.item_delay = delay;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_auto_retry(mut self, auto_retry: bool) -> Self {
        self.auto_retry = auto_retry;
        self
    }

    pub fn with_tab_name(mut self, tab_name: impl Into<String>) -> Self {
        self.tab_name = Some(tab_name.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Not reached yet (or never reached because the batch was cancelled).
    Pending,
    Success,
    Failed,
    /// Rate-limited during the first pass; queued for the retry pass.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectionOutcome {
    pub index: usize,
    pub name: String,
    pub status: ItemStatus,
    pub rate_limited: bool,
    pub file_id: Option<String>,
    /// 1-based destination row.
    pub row: Option<usize>,
    pub message: Option<String>,
}

impl InjectionOutcome {
    pub fn new(index: usize, name: &str) -> Self {
        Self {
            index,
            name: name.to_string(),
            status: ItemStatus::Pending,
            rate_limited: false,
            file_id: None,
            row: None,
            message: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Items submitted, including any a cancelled run never reached.
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl BatchSummary {
    pub fn from_outcomes<'a>(outcomes: impl IntoIterator<Item = &'a InjectionOutcome>) -> Self {
        let mut summary = Self::default();
        for outcome in outcomes {
            summary.total += 1;
            match outcome.status {
                ItemStatus::Pending => {}
                ItemStatus::Success => summary.success += 1,
                ItemStatus::Failed => summary.failed += 1,
                ItemStatus::Skipped => summary.skipped += 1,
            }
        }
        summary
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    /// Latest standing of every submitted item.
    pub summary: BatchSummary,
    pub first_pass: BatchSummary,
    pub outcomes: Vec<InjectionOutcome>,
    /// Indices of items that are still rate-limited and can be retried manually.
    pub pending_retry: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchState {
    Idle,
    Running,
    AwaitingRetry,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InjectionEvent {
    Started {
        total: usize,
    },
    /// Sent before each item, and once more at 100% when a pass runs to the end.
    Progress {
        current: usize,
        completed: usize,
        total: usize,
        percent: u8,
        eta_secs: Option<u64>,
    },
    ItemFinished {
        outcome: InjectionOutcome,
    },
    AwaitingRetry {
        pending: usize,
        #[serde(with = "duration_ms")]
        cooldown: Duration,
    },
    RetryStarted {
        pending: usize,
    },
    Completed {
        summary: BatchSummary,
    },
    Cancelled {
        summary: BatchSummary,
    },
}
