pub mod builder;
pub mod interval;
pub mod period;
pub mod range;
