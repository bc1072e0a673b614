pub mod auth_handlers;
pub mod customer_handlers;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod ledger_handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;
pub mod transaction_handlers;
pub mod waste_handlers;

pub use error::*;
pub use extract::ApiJson;
pub use routes::*;
pub use server::*;
pub use state::*;
