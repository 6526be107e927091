pub mod routes;
pub mod signals_api;
pub mod simple;
pub mod simple_routes;
pub mod backtest_v2;

pub use simple::*;
pub use backtest_v2::{BacktestV2State, backtest_v2_router, backtest_v2_public_router};
