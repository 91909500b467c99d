//! UDP broadcast discovery: a client broadcasts a fixed-header query and collects descriptors
//! of every host that answers within a short window (§4.8).

pub mod answerer;
pub mod descriptor;
pub mod discoverer;

pub use answerer::DiscoveryAnswerer;
pub use descriptor::DiscoverableEndpointDescriptor;
pub use discoverer::discover;
