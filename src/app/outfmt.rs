pub mod csv;
pub mod model;
pub mod schedule3;
pub mod text;
