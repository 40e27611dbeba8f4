use crate::{ChunkupError, ChunkupResult};
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(200);
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Timeout applied to every request
    pub timeout: Duration,

    /// Total transmissions allowed per chunk, the first one included
    pub max_attempts: u32,

    /// Delay before the first retry, doubled on each following one
    pub backoff: Duration,

    pub max_backoff: Duration,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

impl UploadOptions {
    pub fn validate(&self) -> ChunkupResult<()> {
        if self.max_attempts == 0 {
            return Err(ChunkupError::invalid("max_attempts must be at least 1"));
        }

        if self.timeout == Duration::from_secs(0) {
            return Err(ChunkupError::invalid("timeout must be positive"));
        }

        Ok(())
    }

    /// Delay before transmission number `attempt` (0 is the first try).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::from_secs(0);
        }

        let factor = 2u32.saturating_pow(attempt - 1);
        self.backoff.saturating_mul(factor).min(self.max_backoff)
    }
}
