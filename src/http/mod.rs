//! HTTP response building module

pub mod response;

pub use response::{build_bad_request_response, build_error_response, build_not_found_response, render_value};
