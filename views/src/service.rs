use async_trait::async_trait;
use common::{
    Envelope, QuotaSummary, SyncStatus, TokenStatus, UsagePage, UsageRecord,
    OPTION_SYNC_REPO, OPTION_SYNC_TOKEN,
};
use myerrors::QueryError;
use remote::OptionMap;
use tokio::sync::Mutex;

/// The remote service as seen by the views.
#[async_trait]
pub trait QueryApi: Send + Sync {
    async fn token_quota(&self, key: &str) -> Result<Envelope<QuotaSummary>, QueryError>;
    async fn token_history(
        &self,
        key: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Envelope<UsagePage>, QueryError>;
    async fn options(&self) -> Result<Envelope<OptionMap>, QueryError>;
    async fn update_option(
        &self,
        key: &str,
        value: &str,
    ) -> Result<Envelope<serde_json::Value>, QueryError>;
    async fn sync_status(&self) -> Result<Envelope<SyncStatus>, QueryError>;
    async fn trigger_sync(&self) -> Result<Envelope<serde_json::Value>, QueryError>;
}

pub struct RemoteQueryApi {
    pub client: remote::Client,
}

#[async_trait]
impl QueryApi for RemoteQueryApi {
    async fn token_quota(&self, key: &str) -> Result<Envelope<QuotaSummary>, QueryError> {
        remote::get_token_quota(&self.client, key).await
    }

    async fn token_history(
        &self,
        key: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Envelope<UsagePage>, QueryError> {
        remote::get_token_history(&self.client, key, page, page_size).await
    }

    async fn options(&self) -> Result<Envelope<OptionMap>, QueryError> {
        remote::get_options(&self.client).await
    }

    async fn update_option(
        &self,
        key: &str,
        value: &str,
    ) -> Result<Envelope<serde_json::Value>, QueryError> {
        remote::put_option(&self.client, key, value).await
    }

    async fn sync_status(&self) -> Result<Envelope<SyncStatus>, QueryError> {
        remote::get_sync_status(&self.client).await
    }

    async fn trigger_sync(&self) -> Result<Envelope<serde_json::Value>, QueryError> {
        remote::trigger_sync(&self.client).await
    }
}

// --- Demo service for --demo mode ---

pub const DEMO_KEY: &str = "sk-demo";
pub const DEMO_KEY_UNLIMITED: &str = "sk-demo-unlimited";
pub const DEMO_KEY_EXHAUSTED: &str = "sk-demo-exhausted";
pub const DEMO_KEY_DISABLED: &str = "sk-demo-disabled";

const DEMO_LEDGER_SIZE: u64 = 25;
const DEMO_LEDGER_START: i64 = 1_735_689_600;
const DEMO_MODELS: [&str; 3] = ["gpt-4o", "claude-3-5-sonnet", "gemini-1.5-pro"];

pub struct DemoQueryApi {
    options: Mutex<OptionMap>,
    last_sync_time: Mutex<Option<String>>,
}

impl Default for DemoQueryApi {
    fn default() -> Self {
        Self::new()
    }
}

impl DemoQueryApi {
    pub fn new() -> Self {
        Self {
            options: Mutex::new(OptionMap::new()),
            last_sync_time: Mutex::new(None),
        }
    }

    fn summary(key: &str) -> Option<QuotaSummary> {
        match key {
            DEMO_KEY => Some(QuotaSummary {
                status: TokenStatus::Normal,
                total_quota: Some(50_000_000),
                used_quota: Some(12_500_000),
                remain_quota: Some(37_500_000),
                unlimited_quota: false,
                expired_time: Some(1_798_761_600_000),
            }),
            DEMO_KEY_UNLIMITED => Some(QuotaSummary {
                status: TokenStatus::Normal,
                total_quota: Some(0),
                used_quota: Some(999_999_999),
                remain_quota: Some(0),
                unlimited_quota: true,
                expired_time: Some(-1),
            }),
            DEMO_KEY_EXHAUSTED => Some(QuotaSummary {
                status: TokenStatus::Exhausted,
                total_quota: Some(5_000_000),
                used_quota: Some(7_500_000),
                remain_quota: Some(0),
                unlimited_quota: false,
                expired_time: None,
            }),
            DEMO_KEY_DISABLED => Some(QuotaSummary {
                status: TokenStatus::Disabled,
                total_quota: Some(10_000_000),
                used_quota: Some(1_000_000),
                remain_quota: Some(9_000_000),
                unlimited_quota: false,
                expired_time: Some(1_704_067_200_000),
            }),
            _ => None,
        }
    }

    fn ledger_size(key: &str) -> u64 {
        match key {
            DEMO_KEY_UNLIMITED => 0,
            _ => DEMO_LEDGER_SIZE,
        }
    }

    /// Newest entry first, one per hour going back from the ledger start.
    fn record(index: u64) -> UsageRecord {
        let prompt_tokens = 100 + index * 7;
        let completion_tokens = 50 + index * 3;
        UsageRecord {
            created_at: DEMO_LEDGER_START - (index as i64) * 3600,
            model_name: DEMO_MODELS[(index % DEMO_MODELS.len() as u64) as usize].to_string(),
            prompt_tokens,
            completion_tokens,
            quota: Some(((prompt_tokens + completion_tokens) * 40) as i64),
        }
    }

    async fn sync_configured(&self) -> bool {
        let options = self.options.lock().await;
        let set = |k: &str| options.get(k).is_some_and(|v| !v.is_empty());
        set(OPTION_SYNC_TOKEN) && set(OPTION_SYNC_REPO)
    }
}

#[async_trait]
impl QueryApi for DemoQueryApi {
    async fn token_quota(&self, key: &str) -> Result<Envelope<QuotaSummary>, QueryError> {
        Ok(match Self::summary(key) {
            Some(summary) => Envelope::ok(summary),
            None => Envelope::failed("token not found"),
        })
    }

    async fn token_history(
        &self,
        key: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Envelope<UsagePage>, QueryError> {
        if Self::summary(key).is_none() {
            return Ok(Envelope::failed("token not found"));
        }
        let total = Self::ledger_size(key);
        let skip = u64::from(page.saturating_sub(1)) * u64::from(page_size);
        let items = (skip..total)
            .take(page_size as usize)
            .map(Self::record)
            .collect();
        Ok(Envelope::ok(UsagePage { items, total }))
    }

    async fn options(&self) -> Result<Envelope<OptionMap>, QueryError> {
        Ok(Envelope::ok(self.options.lock().await.clone()))
    }

    async fn update_option(
        &self,
        key: &str,
        value: &str,
    ) -> Result<Envelope<serde_json::Value>, QueryError> {
        self.options
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(Envelope::ok(serde_json::Value::Null))
    }

    async fn sync_status(&self) -> Result<Envelope<SyncStatus>, QueryError> {
        Ok(Envelope::ok(SyncStatus {
            enabled: self.sync_configured().await,
            last_sync_time: self.last_sync_time.lock().await.clone(),
        }))
    }

    async fn trigger_sync(&self) -> Result<Envelope<serde_json::Value>, QueryError> {
        if !self.sync_configured().await {
            return Ok(Envelope::failed(
                "GitHub sync is not configured, set the GitHub token and repository first",
            ));
        }
        let now = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        *self.last_sync_time.lock().await = Some(now);
        Ok(Envelope {
            success: true,
            message: Some("sync completed".to_string()),
            data: None,
        })
    }
}
