pub mod gateway;
pub mod rest_gateway;

pub use gateway::{DataGateway, GatewayError, IdentityProvider, QueryResult, TableQuery};
pub use rest_gateway::RestGateway;
