pub mod errors;
pub mod input;
pub mod parameters;
pub mod result;

pub use errors::*;
pub use input::*;
pub use parameters::*;
pub use result::*;
