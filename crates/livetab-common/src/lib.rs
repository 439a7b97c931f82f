pub mod element;
pub mod error;
pub mod kind;
pub mod value;

pub use element::*;
pub use error::*;
pub use kind::*;
pub use value::*;
