pub mod session;
pub mod vonage;

pub use session::VideoSessionService;
pub use vonage::VonageClient;
