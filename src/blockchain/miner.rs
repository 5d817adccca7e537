use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{info, warn};
use tokio::task::JoinHandle;

use super::chain::Blockchain;

/// Seconds between scheduled mining runs
pub const MINING_INTERVAL_SECS: u64 = 20;

/// Drives repeated proof-of-work mining on a chain.
///
/// `start` spawns a periodic task; each tick runs the CPU-bound nonce
/// search on the blocking thread pool so request handling is never
/// starved. `stop` cancels the ticker only; an in-flight search runs to
/// completion, so cancellation takes effect between runs, never mid-search.
#[derive(Debug, Clone)]
pub struct Miner {
    chain: Blockchain,
    interval: Duration,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Miner {
    pub fn new(chain: Blockchain) -> Self {
        Miner {
            chain,
            interval: Duration::from_secs(MINING_INTERVAL_SECS),
            task: Arc::new(Mutex::new(None)),
        }
    }

    #[cfg(test)]
    fn with_interval(chain: Blockchain, interval: Duration) -> Self {
        Miner {
            chain,
            interval,
            task: Arc::new(Mutex::new(None)),
        }
    }

    /// Begins the repeating mining task. A second call while one is
    /// active is a no-op.
    pub fn start(&self) {
        let mut task = self.task.lock().unwrap();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            info!("Mining task already running");
            return;
        }

        info!("Starting mining task every {:?}", self.interval);
        let chain = self.chain.clone();
        let interval = self.interval;

        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; skip it so start() returns
            // before any work happens
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let chain = chain.clone();
                let mined = tokio::task::spawn_blocking(move || chain.mine()).await;
                if let Err(err) = mined {
                    warn!("Mining run failed to complete: {}", err);
                }
            }
        }));
    }

    /// Cancels the repeating task between runs
    pub fn stop(&self) {
        let mut task = self.task.lock().unwrap();
        if let Some(handle) = task.take() {
            handle.abort();
            info!("Mining task stopped");
        } else {
            info!("No mining task to stop");
        }
    }

    /// Whether a repeating mining task is currently active
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::crypto::Wallet;

    #[tokio::test]
    async fn test_periodic_mining_extends_chain() {
        let miner_wallet = Wallet::new();
        let chain = Blockchain::new(miner_wallet.address().clone());
        let miner = Miner::with_interval(chain.clone(), Duration::from_millis(20));

        miner.start();
        assert!(miner.is_running());

        // Difficulty 3 solves in well under a second on any machine
        tokio::time::sleep(Duration::from_millis(500)).await;
        miner.stop();

        assert!(chain.len() > 1);
        assert!(chain.is_valid());
    }

    #[tokio::test]
    async fn test_second_start_is_noop() {
        let miner_wallet = Wallet::new();
        let chain = Blockchain::new(miner_wallet.address().clone());
        let miner = Miner::with_interval(chain.clone(), Duration::from_secs(3600));

        miner.start();
        miner.start();
        assert!(miner.is_running());

        // One stop cancels the single running task
        miner.stop();
        assert!(!miner.is_running());

        // With an hour-long interval and the immediate tick skipped,
        // nothing mined in the meantime
        assert_eq!(chain.len(), 1);
    }

    #[tokio::test]
    async fn test_stop_without_start() {
        let miner_wallet = Wallet::new();
        let chain = Blockchain::new(miner_wallet.address().clone());
        let miner = Miner::new(chain);

        miner.stop();
        assert!(!miner.is_running());
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let miner_wallet = Wallet::new();
        let chain = Blockchain::new(miner_wallet.address().clone());
        let miner = Miner::with_interval(chain, Duration::from_secs(3600));

        miner.start();
        miner.stop();
        assert!(!miner.is_running());

        miner.start();
        assert!(miner.is_running());
        miner.stop();
    }
}
