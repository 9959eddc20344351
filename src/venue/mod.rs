pub mod exchange;
pub mod http;
pub mod info;
pub mod meta;
pub mod traits;
pub mod wire;

pub use exchange::HyperliquidGateway;
pub use http::{VenueHttp, DEFAULT_API_URL};
pub use info::{InfoClient, InfoStateReader};
pub use meta::{AssetDirectory, AssetInfo};
pub use traits::{OrderGateway, StateReader};
