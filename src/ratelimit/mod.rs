//! Rate limiting logic and state management.

mod clock;
mod counter;
mod key;
mod limiter;
mod reload;
mod rules;
mod store;
mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use counter::RateLimitRecord;
pub use key::{client_id, RateLimitKey, UNKNOWN_CLIENT};
pub use limiter::{Decision, RateLimiter};
pub use reload::{reload_rules, spawn_rules_reloader};
pub use rules::{Limit, MatchedRule, PathRule, RuleSet, DEFAULT_NAMESPACE};
pub use store::RateLimitStore;
pub use sweeper::Sweeper;
