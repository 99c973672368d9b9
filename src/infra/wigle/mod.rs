//! WiGLE wardriving database integration.
//!
//! [`client::WigleClient`] implements [`PointProvider`](probe_locator::provider::PointProvider)
//! over the `network/search` endpoint using HTTP Basic credentials.

pub mod client;
