//! Utility functions shared by the client and the reader UI.
//!
//! - **URL validation**: API endpoint checks and browser-open checks
//! - **Text processing**: HTML-to-text, control-char stripping, width-aware truncation
//! - **Device identity**: stable opaque device id for API requests
//!
//! # Examples
//!
//! ```
//! use gstv_feed::util::{html_to_text, truncate_to_width, validate_endpoint};
//!
//! let base = validate_endpoint("https://backend.example.com").unwrap();
//! let body = html_to_text("<p>Hello</p>");
//! let title = truncate_to_width("A very long headline", 10);
//! ```

mod device;
mod text;
mod url_validator;

pub use device::derive_device_id;
pub use text::{display_width, html_to_text, strip_control_chars, truncate_to_width};
pub use url_validator::{validate_endpoint, validate_url_for_open, UrlValidationError};
