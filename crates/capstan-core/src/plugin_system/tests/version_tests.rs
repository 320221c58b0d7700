use std::str::FromStr;

use crate::plugin_system::version::{parse_version, VersionError, VersionRange};

#[test]
fn test_parse_version_accepts_full_semver() {
    let version = parse_version(" 1.2.3 ").expect("valid version");
    assert_eq!(version.to_string(), "1.2.3");
}

#[test]
fn test_parse_version_rejects_partial_version() {
    let err = parse_version("1.2").unwrap_err();
    assert!(matches!(err, VersionError::InvalidVersion { ref value, .. } if value == "1.2"));
}

#[test]
fn test_version_range_includes() {
    let range = VersionRange::from_str("^0.1").expect("valid constraint");
    assert!(range.includes(&parse_version("0.1.0").unwrap()));
    assert!(range.includes(&parse_version("0.1.9").unwrap()));
    assert!(!range.includes(&parse_version("0.2.0").unwrap()));
    assert_eq!(range.to_string(), "^0.1");
    assert_eq!(range.constraint_string(), "^0.1");
}

#[test]
fn test_version_range_rejects_garbage() {
    let err = VersionRange::from_constraint("not a range").unwrap_err();
    assert!(matches!(err, VersionError::InvalidConstraint { .. }));
}
