pub mod adapter;
pub mod cdp;
pub mod client;
pub mod driver;
pub mod stabilize;

pub use cdp::CdpDriver;
pub use client::AgentClient;
pub use driver::UiDriver;
pub use stabilize::{Stabilizer, TextSource};
