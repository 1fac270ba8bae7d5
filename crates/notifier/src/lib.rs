pub mod backoff;
pub mod client;
pub mod composer;
pub mod dispatcher;
pub mod error;
pub mod loader;
pub mod queue;
pub mod transport;
pub mod validator;

pub use client::DeliveryClient;
pub use dispatcher::Dispatcher;
pub use error::DeliveryError;
