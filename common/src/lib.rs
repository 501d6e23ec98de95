pub mod display;

use serde::{Deserialize, Deserializer, Serialize};

pub const PAGE_SIZE: u32 = 10;

pub const OPTION_SYNC_TOKEN: &str = "GitHubSyncToken";
pub const OPTION_SYNC_REPO: &str = "GitHubSyncRepo";
pub const OPTION_SYNC_INTERVAL: &str = "GitHubSyncInterval";
pub const DEFAULT_SYNC_INTERVAL: &str = "300";

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Response wrapper used by every endpoint of the remote service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(default, deserialize_with = "null_as_default")]
    pub success: bool,
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn failed(message: impl ToString) -> Self {
        Self {
            success: false,
            message: Some(message.to_string()),
            data: None,
        }
    }

    /// The server-supplied message, or `fallback` when it is missing or blank.
    pub fn message_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        match self.message.as_deref() {
            Some(m) if !m.trim().is_empty() => m,
            _ => fallback,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<i64>", into = "i64")]
pub enum TokenStatus {
    Normal,
    Disabled,
    Expired,
    Exhausted,
    #[default]
    Unknown,
}

impl TokenStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => TokenStatus::Normal,
            2 => TokenStatus::Disabled,
            3 => TokenStatus::Expired,
            4 => TokenStatus::Exhausted,
            _ => TokenStatus::Unknown,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            TokenStatus::Normal => 1,
            TokenStatus::Disabled => 2,
            TokenStatus::Expired => 3,
            TokenStatus::Exhausted => 4,
            TokenStatus::Unknown => 0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TokenStatus::Normal => "Normal",
            TokenStatus::Disabled => "Disabled",
            TokenStatus::Expired => "Expired",
            TokenStatus::Exhausted => "Exhausted",
            TokenStatus::Unknown => "Unknown",
        }
    }

    pub fn css_class(self) -> &'static str {
        match self {
            TokenStatus::Normal => "status-normal",
            TokenStatus::Disabled => "status-disabled",
            TokenStatus::Expired => "status-expired",
            TokenStatus::Exhausted => "status-exhausted",
            TokenStatus::Unknown => "status-unknown",
        }
    }
}

impl From<Option<i64>> for TokenStatus {
    fn from(code: Option<i64>) -> Self {
        code.map(TokenStatus::from_code).unwrap_or_default()
    }
}

impl From<TokenStatus> for i64 {
    fn from(status: TokenStatus) -> Self {
        status.code()
    }
}

/// Quota figures are integer micro-units; `expired_time` is epoch milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuotaSummary {
    #[serde(default)]
    pub status: TokenStatus,
    #[serde(default)]
    pub total_quota: Option<i64>,
    #[serde(default)]
    pub used_quota: Option<i64>,
    #[serde(default)]
    pub remain_quota: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub unlimited_quota: bool,
    #[serde(default)]
    pub expired_time: Option<i64>,
}

/// One ledger entry. `created_at` is epoch seconds, unlike `QuotaSummary::expired_time`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub model_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub prompt_tokens: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub completion_tokens: u64,
    #[serde(default)]
    pub quota: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsagePage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<UsageRecord>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageState {
    pub current_page: u32,
    pub page_size: u32,
    pub total_records: u64,
}

impl Default for PageState {
    fn default() -> Self {
        Self {
            current_page: 1,
            page_size: PAGE_SIZE,
            total_records: 0,
        }
    }
}

impl PageState {
    pub fn total_pages(&self) -> u64 {
        self.total_records.div_ceil(u64::from(self.page_size.max(1)))
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next(&self) -> bool {
        u64::from(self.current_page) < self.total_pages()
    }

    /// Page 1 is always reachable, even for an empty ledger.
    pub fn accepts(&self, page: u32) -> bool {
        page == 1 || (page > 1 && u64::from(page) <= self.total_pages())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub token: String,
    pub repo: String,
    pub interval: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            repo: String::new(),
            interval: DEFAULT_SYNC_INTERVAL.to_string(),
        }
    }
}

impl SyncConfig {
    pub fn is_complete(&self) -> bool {
        !self.token.is_empty() && !self.repo.is_empty()
    }

    /// Field updates in the order they are written.
    pub fn updates(&self) -> [(&'static str, &str); 3] {
        [
            (OPTION_SYNC_TOKEN, self.token.as_str()),
            (OPTION_SYNC_REPO, self.repo.as_str()),
            (OPTION_SYNC_INTERVAL, self.interval.as_str()),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    #[serde(default, deserialize_with = "null_as_default")]
    pub enabled: bool,
    #[serde(default)]
    pub last_sync_time: Option<String>,
}

impl SyncStatus {
    pub fn last_sync(&self) -> Option<&str> {
        self.last_sync_time
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionUpdate {
    pub key: String,
    pub value: String,
}

/// Normalises `https://github.com/owner/repo`, `http://github.com/owner/repo`
/// or `owner/repo` into `owner/repo`.
pub fn repo_slug(locator: &str) -> Option<String> {
    let trimmed = locator
        .trim()
        .trim_start_matches("https://github.com/")
        .trim_start_matches("http://github.com/")
        .trim_matches('/');
    let mut parts = trimmed.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(repo), None) if !owner.is_empty() && !repo.is_empty() => {
            Some(format!("{owner}/{repo}"))
        }
        _ => None,
    }
}
