use std::{cell::RefCell, rc::Rc};

/// Shared, mutable, single-threaded ownership. Used for the output streams
/// and the test doubles whose state a test inspects after handing them off.
pub type RcRefCell<T> = Rc<RefCell<T>>;

/// Constructor namespace for RcRefCell, since a type alias cannot carry
/// its own associated functions.
pub struct RcRefCellT;

impl RcRefCellT {
    pub fn new<T>(t: T) -> RcRefCell<T> {
        Rc::new(RefCell::new(t))
    }
}
