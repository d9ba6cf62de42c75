//! Process exit codes

/// Successful termination
pub const OK: i32 = 0;

/// Generic failure: bad arguments, missing objects, remote errors
pub const FAILURE: i32 = 1;

/// User declined a confirmation prompt
pub const ABORTED: i32 = 3;

/// Server rejected the client's credentials
pub const AUTH: i32 = 18;

/// `data bag edit` was not given exactly a bag and an item
pub const DATA_BAG_EDIT_USAGE: i32 = 42;
