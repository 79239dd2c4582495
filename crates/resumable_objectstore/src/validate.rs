use std::net::Ipv4Addr;

use once_cell::sync::Lazy;
use regex::Regex;

use super::errors::{Error, Result};

const MAX_OBJECT_NAME_BYTES: usize = 1024;

/// Enforce the strict S3 bucket naming rules.
pub fn validate_bucket_name(name: &str) -> Result<()> {
    static RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9.\-]{1,61}[a-z0-9]$").unwrap());
    let invalid = |reason| Err(Error::InvalidBucketName(name.to_string(), reason));

    if name.trim().is_empty() {
        return invalid("bucket name cannot be empty");
    }
    if name.len() < 3 {
        return invalid("bucket name cannot be shorter than 3 characters");
    }
    if name.len() > 63 {
        return invalid("bucket name cannot be longer than 63 characters");
    }
    if name.parse::<Ipv4Addr>().is_ok() {
        return invalid("bucket name cannot be an ip address");
    }
    if name.contains("..") || name.contains(".-") || name.contains("-.") {
        return invalid("bucket name contains invalid characters");
    }
    if !RE.is_match(name) {
        return invalid("bucket name contains invalid characters");
    }
    Ok(())
}

pub fn validate_object_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidObjectName("object name cannot be empty"));
    }
    if name.len() > MAX_OBJECT_NAME_BYTES {
        return Err(Error::InvalidObjectName(
            "object name cannot be longer than 1024 bytes",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use rstest::*;

    use super::*;

    #[rstest]
    #[case::simple("uploads", true)]
    #[case::dotted("my.uploads-2", true)]
    #[case::shortest("abc", true)]
    #[case::empty("", false)]
    #[case::blank("   ", false)]
    #[case::too_short("ab", false)]
    #[case::too_long(&"a".repeat(64), false)]
    #[case::uppercase("Uploads", false)]
    #[case::underscore("my_uploads", false)]
    #[case::leading_hyphen("-uploads", false)]
    #[case::trailing_dot("uploads.", false)]
    #[case::double_dot("my..uploads", false)]
    #[case::dot_hyphen("my.-uploads", false)]
    #[case::ip_address("192.168.5.4", false)]
    fn bucket_names(#[case] name: &str, #[case] valid: bool) {
        match (valid, validate_bucket_name(name)) {
            (true, Ok(())) => {}
            (false, Err(Error::InvalidBucketName(n, _))) => assert_eq!(n, name),
            (valid, actual) => assert!(false, "expected valid={valid} got {actual:?}"),
        }
    }

    #[rstest]
    #[case::fingerprint("9e107d9d372bb6826bd81d3542a419d6", true)]
    #[case::nested("a/b/c.txt", true)]
    #[case::longest(&"a".repeat(1024), true)]
    #[case::empty("", false)]
    #[case::blank(" \t", false)]
    #[case::too_long(&"a".repeat(1025), false)]
    fn object_names(#[case] name: &str, #[case] valid: bool) {
        match (valid, validate_object_name(name)) {
            (true, Ok(())) => {}
            (false, Err(Error::InvalidObjectName(_))) => {}
            (valid, actual) => assert!(false, "expected valid={valid} got {actual:?}"),
        }
    }
}
