pub mod bookkeeping;
pub mod io;
pub mod misc;
pub mod model;
pub mod render;
pub mod yearly_gains;

#[cfg(any(test, feature = "testlib"))]
pub mod testlib;

pub use self::model::currency::*;
pub use self::model::tx::*;
pub use self::model::txdelta::*;
