pub mod tag24;

pub use tag24::Tag24;
