//! Various utility functions/macros used throughout the kernel
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{DeltaResult, Error};

/// convenient way to return an error if a condition isn't true
macro_rules! require {
    ( $cond:expr, $err:expr ) => {
        if !($cond) {
            return Err($err);
        }
    };
}

pub(crate) use require;

/// Milliseconds since the unix epoch, used for commit timestamps.
pub(crate) fn current_time_ms() -> DeltaResult<i64> {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| Error::generic(format!("System time before unix epoch: {e}")))?
        .as_millis();
    i64::try_from(millis).map_err(|_| Error::generic("System time out of range for i64"))
}
