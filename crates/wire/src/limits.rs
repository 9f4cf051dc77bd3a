//! Wire-format size limits, carried over from the original protocol.

/// Maximum length of a group name.
pub const MAX_NAME_LEN: usize = 31;

/// Maximum length of a user name.
pub const MAX_USER_LEN: usize = 19;

/// Maximum length of a chat or banner text payload.
pub const MAX_TEXT_LEN: usize = 512;

/// Length, in bytes, of the admin token before hex encoding.
pub const TOKEN_BYTES: usize = 16;

/// Length, in hex characters, of an encoded admin token.
pub const TOKEN_HEX_LEN: usize = TOKEN_BYTES * 2;

/// Maximum number of simultaneous members a single group holds.
pub const MAX_MEMBERS_PER_GROUP: usize = 64;
