pub mod agent;
pub mod onboard;
pub mod serve;
pub mod status;
