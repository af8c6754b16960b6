use std::time::Duration;

/// Tunables shared by every page's synchronizer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncConfig {
    /// Consecutive read failures before a read is flagged degraded.
    pub degraded_after: u32,
    /// Receipt hashes remembered for de-duplication.
    pub processed_hashes: usize,
    /// How long to wait for a submitted transaction to be mined.
    pub confirmation_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            degraded_after: 5,
            processed_hashes: 256,
            confirmation_timeout: Duration::from_secs(120),
        }
    }
}
