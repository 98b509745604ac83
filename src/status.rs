//! Reply codes the session relies on (RFC 959, RFC 2228, RFC 2428).

// 1xx: Positive Preliminary Reply
pub const ALREADY_OPEN: u32 = 125;
pub const ABOUT_TO_SEND: u32 = 150;

// 2xx: Positive Completion Reply
pub const COMMAND_OK: u32 = 200;
pub const READY: u32 = 220;
pub const CLOSING: u32 = 221;
pub const CLOSING_DATA_CONNECTION: u32 = 226;
pub const PASSIVE_MODE: u32 = 227;
pub const EXTENDED_PASSIVE_MODE: u32 = 229;
pub const LOGGED_IN: u32 = 230;
pub const AUTH_OK: u32 = 234;
pub const REQUESTED_FILE_ACTION_OK: u32 = 250;
pub const PATH_CREATED: u32 = 257;

// 3xx: Positive intermediate Reply
pub const NEED_PASSWORD: u32 = 331;

/// Replies that open a data transfer.
pub const TRANSFER_STARTING: &[u32] = &[ALREADY_OPEN, ABOUT_TO_SEND];

/// Replies that close a data transfer successfully.
pub const TRANSFER_COMPLETE: &[u32] = &[CLOSING_DATA_CONNECTION, REQUESTED_FILE_ACTION_OK];

/// `4xx` and `5xx` replies.
pub fn is_negative(code: u32) -> bool {
    code >= 400
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_classes() {
        assert!(!is_negative(CLOSING_DATA_CONNECTION));
        assert!(!is_negative(NEED_PASSWORD));
        assert!(is_negative(421));
        assert!(is_negative(550));
    }
}
