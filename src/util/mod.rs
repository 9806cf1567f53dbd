//! Utility functions shared by the normalizers and the configuration layer.
//!
//! - **Text processing**: HTML stripping, whitespace collapsing, truncation
//! - **Duration formatting**: raw feed durations to `"18 min"` / `"1h 5m"`
//! - **URL validation**: shape checks for configured endpoints
//!
//! # Examples
//!
//! ```
//! use podfeed::util::{format_duration, sanitize_description, validate_endpoint};
//!
//! assert_eq!(format_duration(Some("600")), "10 min");
//! assert_eq!(sanitize_description("<p>Hello</p>"), "Hello");
//! assert!(validate_endpoint("https://example.com/rss").is_ok());
//! ```

mod duration;
mod text;
mod url_validator;

pub use duration::{format_duration, format_json_duration, UNKNOWN_DURATION};
pub use text::{
    clean_inline, collapse_whitespace, sanitize_description, strip_control_chars, strip_html,
    truncate_chars, DESCRIPTION_LIMIT,
};
pub use url_validator::{validate_endpoint, UrlValidationError};
