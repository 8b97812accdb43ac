pub mod device_response;
pub mod engagement;
pub mod envelope;
pub mod helpers;
pub mod request;

pub use device_response::DeviceResponse;
pub use engagement::{EngagementPayload, EngagementSession};
pub use envelope::HpkeEnvelope;
pub use request::VerificationRequest;
