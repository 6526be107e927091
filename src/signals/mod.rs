pub mod correlator;
pub mod db_storage;
pub mod detector;
pub mod enrichment;
pub mod quality;
pub mod storage;
pub mod wallet_analytics;

pub use correlator::{CompositeSignal, CorrelatorConfig, SignalCorrelator};
pub use db_storage::DbSignalStorage;
pub use wallet_analytics::{EquityPoint, WalletAnalytics, WalletAnalyticsParams};
