// bsdiff patch wire format.
//
// - `int64`   — sign-magnitude 64-bit integer codec
// - `control` — control entry triplets and their 24-byte form
// - `header`  — BSDIFF40 / BSDF2 headers

pub mod control;
pub mod header;
pub mod int64;

pub use control::{CONTROL_ENTRY_LEN, ControlEntry};
pub use header::{HEADER_LEN, PatchFormat, PatchHeader};
