//! Combined status snapshot.

use crate::modules::load_balancer::SystemLoad;
use crate::modules::rate_limiting::RemainingTokens;
use serde::{Deserialize, Serialize};

/// Remaining rate-limit allowance for one caller plus current system load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub rate_limits: RemainingTokens,
    pub system_load: SystemLoad,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_shape() {
        let status = SystemStatus {
            rate_limits: RemainingTokens {
                global: 10,
                ..RemainingTokens::default()
            },
            system_load: SystemLoad {
                current_requests: 1,
                queue_size: 2,
                active_requests: 0,
            },
        };

        let json = serde_json::to_value(status).unwrap();
        assert_eq!(json["rate_limits"]["global"], 10);
        assert_eq!(json["rate_limits"]["ip_day"], 0);
        assert_eq!(json["system_load"]["queue_size"], 2);
        assert_eq!(json["system_load"]["current_requests"], 1);
    }
}
