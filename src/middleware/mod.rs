// HTTP middleware. The paygate itself lives in `payment::paygate`.

pub mod cors;

pub use cors::*;
