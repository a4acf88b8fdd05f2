mod as_value;
mod connection;
mod cursor;
mod driver;
mod error;
mod flags;
mod options;
mod registry;
mod row;
mod util;
mod value;

pub use ::anyhow::Context;
pub use as_value::*;
pub use connection::*;
pub use cursor::*;
pub use driver::*;
pub use error::*;
pub use flags::*;
pub use options::*;
pub use registry::*;
pub use row::*;
pub use util::*;
pub use value::*;
pub mod stream {
    pub use ::futures::stream::*;
}
pub use ::futures::future;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
