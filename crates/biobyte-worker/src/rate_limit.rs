/// Fixed-window request limit applied per client key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub name: &'static str,
    pub max: i32,
    pub window_secs: i64,
    pub message: &'static str,
}

pub const LOGIN: RateLimitPolicy = RateLimitPolicy {
    name: "login",
    max: 5,
    window_secs: 15 * 60,
    message: "Too many login attempts, please try again after 15 minutes.",
};

pub const API: RateLimitPolicy = RateLimitPolicy {
    name: "api",
    max: 100,
    window_secs: 60,
    message: "Too many requests, please try again later.",
};

pub const VERIFICATION: RateLimitPolicy = RateLimitPolicy {
    name: "verification",
    max: 10,
    window_secs: 60 * 60,
    message: "Too many verification attempts, please try again after an hour.",
};

/// Seconds between verification emails to one address.
pub const VERIFICATION_RESEND_COOLDOWN_SECS: i64 = 60;

impl RateLimitPolicy {
    pub fn key(&self, client: &str) -> String {
        format!("{}:{client}", self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allowed { remaining: i32 },
    Limited { retry_after: i64 },
}

/// Decide a request given the stored window after it was counted.
///
/// `count` already includes the request being decided.
pub fn verdict(policy: &RateLimitPolicy, window_start: i64, count: i32, now: i64) -> Verdict {
    if count > policy.max {
        let retry_after = (window_start + policy.window_secs - now).max(1);
        return Verdict::Limited { retry_after };
    }
    Verdict::Allowed {
        remaining: policy.max - count,
    }
}

/// Windows opened at or before this instant have elapsed.
pub fn window_cutoff(policy: &RateLimitPolicy, now: i64) -> i64 {
    now - policy.window_secs
}
