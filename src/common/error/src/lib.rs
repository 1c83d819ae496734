mod error;

pub use error::{GenericError, SluiceError, SluiceResult};
