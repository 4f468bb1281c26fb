//! Authentication system for site-cms
//!
//! This module provides authentication and authorization functionality:
//! - Signed bearer token issuance and verification
//! - Admin login with a constant-time credential check
//! - Rate limiting for login attempts
//! - Injected clock for deterministic tests

pub mod clock;
pub mod gate;
pub mod manager;
pub mod ratelimit;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use gate::{authorize, Principal, BEARER_PREFIX};
pub use manager::{AuthConfig, AuthManager, IssuedToken};
pub use ratelimit::{spawn_sweeper, RateLimitConfig, RateLimiter};
pub use token::{issue, verify, Claim, Token};
