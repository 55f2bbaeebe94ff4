pub mod client;
pub mod export;
#[cfg(feature = "http_client")]
pub mod http_client;
#[cfg(feature = "mock_client")]
pub mod mock_client;
pub mod model;
pub mod session;
pub mod state;
pub mod table;
