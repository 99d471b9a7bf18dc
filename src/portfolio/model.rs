pub mod currency;
pub mod tx;
pub mod txdelta;
