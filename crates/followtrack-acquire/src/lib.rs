//! Follower and subscriber acquisition: extraction strategies, the shared
//! retry combinator, the browser boundary and one acquirer per platform.

pub mod browser;
pub mod error;
pub mod extract;
pub mod http;
pub mod platforms;
pub mod retry;

pub use browser::{BrowserHost, BrowserSession, NoopBrowser, SessionGuard};
pub use error::AcquireError;
pub use http::build_client;
pub use platforms::instagram::InstagramAcquirer;
pub use platforms::kit::KitAcquirer;
pub use platforms::linkedin_company::LinkedinCompanyAcquirer;
pub use platforms::linkedin_newsletter::LinkedinNewsletterAcquirer;
pub use platforms::linkedin_profile::LinkedinProfileAcquirer;
pub use platforms::twitter::TwitterAcquirer;
pub use platforms::youtube::YoutubeAcquirer;
pub use platforms::Acquirer;
pub use retry::{retry_with_policy, Backoff, RetryPolicy};

#[cfg(feature = "chromium")]
pub use browser::chromium::ChromiumBrowser;
