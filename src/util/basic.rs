// Generic string error, used at the boundaries where a richer error type
// would only end up being formatted for the user anyway.
pub type SError = String;
