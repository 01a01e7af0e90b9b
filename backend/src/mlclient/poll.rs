use std::time::Duration;

use crate::mlclient::services::Sleeper;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// `None` polls until a terminal state shows up.
    pub timeout: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            timeout: None,
        }
    }
}

impl PollPolicy {
    /// Sleeps one interval and adds it to `waited`. Returns `false` without sleeping
    /// once another interval would overrun the timeout.
    pub async fn pause(&self, sleeper: &dyn Sleeper, waited: &mut Duration) -> bool {
        if let Some(timeout) = self.timeout {
            if *waited + self.interval > timeout {
                return false;
            }
        }
        sleeper.sleep(self.interval).await;
        *waited += self.interval;
        true
    }
}
