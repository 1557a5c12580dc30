// Job lookup over a static catalog. No network I/O.

pub mod catalog;
pub mod lookup;
