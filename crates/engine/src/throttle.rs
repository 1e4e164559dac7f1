//! Rate limiting for print requests initiated by document script.

use std::time::{Duration, Instant};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Policy knobs for [`ScriptPrintThrottle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottlePolicy {
    /// Consecutive cancellations tolerated before scripted prints are blocked.
    #[serde(default = "default_threshold")]
    pub threshold: u32,
    /// Cooldown applied when the threshold is first reached.
    #[serde(default = "default_base_cooldown_secs")]
    pub base_cooldown_secs: u64,
    /// Upper bound for the doubled cooldown.
    #[serde(default = "default_max_cooldown_secs")]
    pub max_cooldown_secs: u64,
}

fn default_threshold() -> u32 {
    3
}

fn default_base_cooldown_secs() -> u64 {
    2
}

fn default_max_cooldown_secs() -> u64 {
    32
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            base_cooldown_secs: default_base_cooldown_secs(),
            max_cooldown_secs: default_max_cooldown_secs(),
        }
    }
}

impl ThrottlePolicy {
    pub(crate) fn sanitize(&mut self) {
        self.threshold = self.threshold.max(1);
        self.base_cooldown_secs = self.base_cooldown_secs.max(1);
        self.max_cooldown_secs = self.max_cooldown_secs.max(self.base_cooldown_secs);
    }

    /// Cooldown in force after `cancellations` consecutive cancellations.
    pub fn cooldown_for(&self, cancellations: u32) -> Duration {
        if cancellations < self.threshold {
            return Duration::ZERO;
        }
        let doublings = (cancellations - self.threshold).min(63);
        let secs = self
            .base_cooldown_secs
            .checked_shl(doublings)
            .filter(|secs| *secs >> doublings == self.base_cooldown_secs)
            .unwrap_or(u64::MAX)
            .min(self.max_cooldown_secs);
        Duration::from_secs(secs)
    }
}

/// Tracks consecutive user cancellations of scripted prints.
///
/// One instance lives for the whole session and is shared by every job it gates.
#[derive(Debug, Clone)]
pub struct ScriptPrintThrottle {
    policy: ThrottlePolicy,
    consecutive_cancellations: u32,
    last_cancellation: Option<Instant>,
}

impl Default for ScriptPrintThrottle {
    fn default() -> Self {
        Self::new(ThrottlePolicy::default())
    }
}

impl ScriptPrintThrottle {
    pub fn new(policy: ThrottlePolicy) -> Self {
        Self {
            policy,
            consecutive_cancellations: 0,
            last_cancellation: None,
        }
    }

    pub fn policy(&self) -> ThrottlePolicy {
        self.policy
    }

    pub fn consecutive_cancellations(&self) -> u32 {
        self.consecutive_cancellations
    }

    pub fn last_cancellation(&self) -> Option<Instant> {
        self.last_cancellation
    }

    /// Returns `false` while a scripted print must be ignored.
    pub fn check_allowed(&self, now: Instant) -> bool {
        let Some(last) = self.last_cancellation else {
            return true;
        };
        if self.consecutive_cancellations < self.policy.threshold {
            return true;
        }
        let cooldown = self.policy.cooldown_for(self.consecutive_cancellations);
        let elapsed = now.saturating_duration_since(last);
        if elapsed < cooldown {
            warn!(
                "blocking scripted print: {} consecutive cancellations, {:?} of {:?} cooldown elapsed",
                self.consecutive_cancellations, elapsed, cooldown
            );
            return false;
        }
        true
    }

    pub fn on_user_cancelled(&mut self, now: Instant) {
        self.consecutive_cancellations = self.consecutive_cancellations.saturating_add(1);
        self.last_cancellation = Some(now);
        debug!(
            "scripted print cancelled ({} in a row)",
            self.consecutive_cancellations
        );
    }

    pub fn on_user_accepted(&mut self) {
        self.reset();
    }

    pub fn on_non_script_print(&mut self) {
        self.reset();
    }

    fn reset(&mut self) {
        self.consecutive_cancellations = 0;
        self.last_cancellation = None;
    }
}
