pub mod middleware;
pub mod routes;
pub mod state;
pub mod ws;
