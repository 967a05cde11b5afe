use std::{net::IpAddr, time::Duration};

use clap::Parser;
use fleet_common::SupervisorConfig;

#[derive(Debug, Parser)]
pub struct Cli {
    /// Verify-all period, in seconds.
    #[clap(long, env = "FLEET_INTERVAL", default_value_t = 60)]
    pub interval: u64,

    /// Restart token bucket refill period, in seconds (capacity is always
    /// 1 restart).
    #[clap(long, env = "FLEET_RESTART_REFILL", default_value_t = 60)]
    pub restart_refill: u64,

    /// Cool-down after a broker revival before rate-limited restarts
    /// resume, in seconds.
    #[clap(long, env = "FLEET_WAIT_AFTER_BROKER_REVIVED", default_value_t = 35)]
    pub wait_after_broker_revived: u64,

    /// Bound on pending requests in the hand-off queue.
    #[clap(long, env = "FLEET_QUEUE_CAPACITY", default_value_t = 1024)]
    pub queue_capacity: usize,

    /// Emit the "woke up" debug log at most once per this many dequeues.
    #[clap(long, env = "FLEET_WAKEUP_LOG_THROTTLE", default_value_t = 30)]
    pub wakeup_log_throttle: u32,

    /// Bind address for the health/metrics endpoint.
    #[clap(long = "bind", env = "FLEET_BIND_HOST", default_value = "127.0.0.1")]
    pub bind_addr: IpAddr,

    #[clap(long = "port", env = "FLEET_BIND_PORT", default_value_t = 9090)]
    pub port: u16,
}

impl Cli {
    pub fn config(&self) -> SupervisorConfig {
        SupervisorConfig {
            interval: Duration::from_secs(self.interval),
            restart_refill: Duration::from_secs(self.restart_refill),
            wait_after_broker_revived: Duration::from_secs(self.wait_after_broker_revived),
            queue_capacity: self.queue_capacity,
            wakeup_log_throttle: self.wakeup_log_throttle,
        }
    }
}
