//! Reply results and replies.

use bytes::Bytes;
use std::fmt;

/// Prefix every internal result name carries; reports strip it.
pub const RESULT_NAME_PREFIX: &str = "mc_res_";

macro_rules! reply_results {
    ($($variant:ident => $name:literal, $error:literal;)+) => {
        /// Outcome of a request, as delivered to the client and as tallied
        /// per destination.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ReplyResult {
            $($variant,)+
        }

        impl ReplyResult {
            pub const ALL: &'static [ReplyResult] = &[$(ReplyResult::$variant,)+];

            /// Name used by the routing layer, including the internal prefix.
            pub fn internal_name(self) -> &'static str {
                match self {
                    $(ReplyResult::$variant => concat!("mc_res_", $name),)+
                }
            }

            /// Whether this result counts as an error reply.
            pub fn is_error(self) -> bool {
                match self {
                    $(ReplyResult::$variant => $error,)+
                }
            }
        }
    };
}

reply_results! {
    Unknown => "unknown", true;
    Deleted => "deleted", false;
    Touched => "touched", false;
    Hit => "hit", false;
    Miss => "miss", false;
    NotStored => "notstored", false;
    Stored => "stored", false;
    Exists => "exists", false;
    Ok => "ok", false;
    Timeout => "timeout", true;
    ConnectTimeout => "connect_timeout", true;
    ConnectError => "connect_error", true;
    Busy => "busy", true;
    TryAgain => "try_again", true;
    Shutdown => "shutdown", true;
    Tko => "tko", true;
    BadCommand => "bad_command", true;
    BadKey => "bad_key", true;
    BadValue => "bad_value", true;
    Aborted => "aborted", true;
    ClientError => "client_error", true;
    LocalError => "local_error", true;
    RemoteError => "remote_error", true;
}

impl ReplyResult {
    pub const COUNT: usize = Self::ALL.len();

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Name with the internal prefix removed, as shown in reports.
    pub fn name(self) -> &'static str {
        let name = self.internal_name();
        name.strip_prefix(RESULT_NAME_PREFIX).unwrap_or(name)
    }
}

impl fmt::Display for ReplyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A reply to one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    result: ReplyResult,
    message: String,
    value: Bytes,
}

impl Reply {
    pub fn new(result: ReplyResult) -> Self {
        Self {
            result,
            message: String::new(),
            value: Bytes::new(),
        }
    }

    /// A reply carrying a human-readable message, as error replies do.
    pub fn with_message(result: ReplyResult, message: impl Into<String>) -> Self {
        Self {
            result,
            message: message.into(),
            value: Bytes::new(),
        }
    }

    pub fn with_value(mut self, value: Bytes) -> Self {
        self.value = value;
        self
    }

    pub fn result(&self) -> ReplyResult {
        self.result
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn value(&self) -> &Bytes {
        &self.value
    }

    pub fn is_error(&self) -> bool {
        self.result.is_error()
    }
}

impl From<ReplyResult> for Reply {
    fn from(result: ReplyResult) -> Self {
        Reply::new(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_strip_prefix() {
        assert_eq!(ReplyResult::Hit.internal_name(), "mc_res_hit");
        assert_eq!(ReplyResult::Hit.name(), "hit");
        assert_eq!(ReplyResult::ConnectTimeout.name(), "connect_timeout");
    }

    #[test]
    fn test_error_classification() {
        assert!(!ReplyResult::Hit.is_error());
        assert!(!ReplyResult::Stored.is_error());
        assert!(ReplyResult::LocalError.is_error());
        assert!(ReplyResult::Unknown.is_error());
        assert!(ReplyResult::BadCommand.is_error());
    }

    #[test]
    fn test_index_matches_order() {
        for (i, result) in ReplyResult::ALL.iter().enumerate() {
            assert_eq!(result.index(), i);
        }
    }
}
