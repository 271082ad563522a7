mod frame;
mod ids;
mod response;
mod transport;

pub use frame::{decompose, DecomposedFrame, IngestionFrame, WireMessage};
pub use ids::{ProviderUid, RequestUid};
pub use response::{ExceptionReport, IngestionResponse, IngestionResult};
pub use transport::{
    ForwardHandle, IngestionTransport, ProviderRegistrar, ProviderRegistration, ResponseSink,
    StreamMode,
};
