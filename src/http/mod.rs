//! Request and response types exchanged between the hosting runtime,
//! the network and the cache partitions.

mod request;
mod response;

pub use request::{Destination, Request, RequestMode};
pub use response::{Response, ResponseType};
