pub mod extractor;
pub mod jwt;
pub mod rate_limit;
pub mod rbac;
pub mod test_utils;
pub mod timezone;
pub mod validation;
