mod rate_loader;
mod rates_cache;
mod remote_rate_loader;

pub type Error = String;

// Exports
pub use self::rate_loader::*;
pub use self::rates_cache::*;
pub use self::remote_rate_loader::*;
