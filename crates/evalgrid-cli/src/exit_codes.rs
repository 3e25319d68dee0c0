//! Process exit codes. Per-call API failures are recorded, not fatal, so a
//! finished run always exits with SUCCESS.

pub const SUCCESS: i32 = 0;
pub const CONFIG_ERROR: i32 = 2; // bad config, missing credential, unreadable prompt, output I/O
