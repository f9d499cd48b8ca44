//! Abuse throttling for the credential endpoints.
//!
//! Register, login, refresh, OTP issuance and Google sign-in each ask the
//! limiter before doing any work. Decisions are advisory: the handler maps
//! `Limited` to 429 and the limiter never blocks by itself, so a stub
//! implementation keeps the flows fully testable.

/// Which credential flow is asking. Implementations key their buckets on
/// this so a login storm cannot starve OTP issuance.
#[derive(Clone, Copy, Debug)]
pub enum RateLimitAction {
    Register,
    Login,
    Refresh,
    RequestOtp,
    GoogleLogin,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

/// Seam for the throttling policy. The IP check runs first with whatever
/// `x-forwarded-for` yielded (possibly nothing), then the email check runs
/// on the normalized address for flows that carry one.
pub trait RateLimiter: Send + Sync {
    fn check_ip(&self, ip: Option<&str>, action: RateLimitAction) -> RateLimitDecision;
    fn check_email(&self, email: &str, action: RateLimitAction) -> RateLimitDecision;
}

/// Default policy: allow everything. The real limiter lives at the edge
/// proxy in current deployments.
#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check_ip(&self, _ip: Option<&str>, _action: RateLimitAction) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }

    fn check_email(&self, _email: &str, _action: RateLimitAction) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }
}
