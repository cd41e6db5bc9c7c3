//! Pattern & Sensitivity Analysis
//!
//! Rule tables are compiled once per process and shared read-only:
//! - Value patterns (email, uuid, phone, dates, ...) with confidence scores
//! - Sensitive data (credentials, card numbers, SSNs) with redaction placeholders
//! - Generalization of concrete values into placeholder form

pub mod generalize;
pub mod patterns;
pub mod sensitive;

pub use generalize::{generalize, generalize_text, generalize_url};
pub use patterns::{detect_patterns, detect_patterns_in_value, DetectedPattern, FieldPattern, PatternType};
pub use sensitive::{
    analyze_interactions, detect_sensitive, recommendation, severity, DataLocation,
    SensitiveDataType, SensitiveFinding, SensitiveMatch,
};
