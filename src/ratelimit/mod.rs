//! Rate limiting algorithms, their construction, and the client registry.

mod algorithm;
mod client;
mod factory;
mod registry;
mod ticker;

pub mod strategy;

pub use algorithm::Algorithm;
pub use client::{ClientConfig, ClientConfigBuilder, ClientSpec, DEFAULT_RATE, DEFAULT_WINDOW};
pub use factory::StrategyFactory;
pub use registry::{ClientRegistry, ClientSnapshot};
pub use strategy::Limiter;
pub use ticker::Ticker;
