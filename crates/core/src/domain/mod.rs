pub mod approval;
pub mod auction;
pub mod jewelry;
pub mod page;
pub mod user;

use chrono::{DateTime, Duration, SubsecRound, Utc};

/// Rounds `at` up to whole microseconds, the precision every timestamp is
/// persisted at. Rounding up keeps a stamp from preceding the instant it was
/// taken.
pub fn stored_precision(at: DateTime<Utc>) -> DateTime<Utc> {
    let truncated = at.trunc_subsecs(6);
    if truncated == at {
        return at;
    }
    truncated.checked_add_signed(Duration::microseconds(1)).unwrap_or(truncated)
}
