// Copyright 2024 The Kubernetes Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Admission error types.
//!
//! Validation failures (the request is wrong) and internal failures (the
//! system cannot decide) are separate variants so that a webhook server can
//! map them to different response codes.

use crate::listers::ListerError;
use std::fmt;
use thiserror::Error;

/// Result type for admission operations.
pub type AdmissionResult<T> = Result<T, AdmissionError>;

/// AdmissionError represents errors that can occur during admission.
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// BadRequest indicates a malformed request or plugin configuration.
    #[error("{0}")]
    BadRequest(String),

    /// Invalid carries one or more field errors for the admitted object.
    #[error("{0}")]
    Invalid(InvalidError),

    /// Internal represents a failure that is not the requester's fault.
    #[error("internal error: {0}")]
    Internal(String),

    /// NotFound indicates a referenced resource does not exist.
    #[error("{kind} \"{name}\" not found")]
    NotFound { kind: String, name: String },
}

impl AdmissionError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        AdmissionError::BadRequest(msg.into())
    }

    /// Create an Invalid error from a non-empty list of field errors.
    pub fn invalid(
        kind: impl Into<String>,
        name: impl Into<String>,
        errors: FieldErrorList,
    ) -> Self {
        AdmissionError::Invalid(InvalidError {
            kind: kind.into(),
            name: name.into(),
            errors,
        })
    }

    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        AdmissionError::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn internal_error(msg: impl Into<String>) -> Self {
        AdmissionError::Internal(msg.into())
    }

    /// True for errors caused by the request rather than by the system.
    pub fn is_validation(&self) -> bool {
        matches!(self, AdmissionError::BadRequest(_) | AdmissionError::Invalid(_))
    }

    /// Field errors carried by an `Invalid` error.
    pub fn field_errors(&self) -> Vec<&FieldError> {
        match self {
            AdmissionError::Invalid(err) => err.errors.iter().collect(),
            _ => Vec::new(),
        }
    }
}

impl From<ListerError> for AdmissionError {
    fn from(err: ListerError) -> Self {
        match err {
            ListerError::NotFound { kind, name } => AdmissionError::NotFound { kind, name },
            ListerError::Unavailable(reason) => AdmissionError::Internal(reason),
        }
    }
}

/// InvalidError mirrors the API server's `StatusReasonInvalid`.
#[derive(Debug)]
pub struct InvalidError {
    pub kind: String,
    pub name: String,
    pub errors: FieldErrorList,
}

impl fmt::Display for InvalidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} \"{}\" is invalid: ", self.kind, self.name)?;
        match self.errors.as_slice() {
            [single] => write!(f, "{}", single),
            errors => {
                let joined: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
                write!(f, "[{}]", joined.join(", "))
            }
        }
    }
}

/// Path to a field inside an object, rendered as `spec.provider.workers[0].machine.type`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldPath {
    rendered: String,
}

impl FieldPath {
    /// Create a path from its leading segments.
    pub fn new(segments: &[&str]) -> Self {
        let mut path = FieldPath::default();
        for segment in segments {
            path = path.child(segment);
        }
        path
    }

    pub fn child(&self, name: &str) -> Self {
        let rendered = if self.rendered.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.rendered, name)
        };
        Self { rendered }
    }

    pub fn index(&self, index: usize) -> Self {
        Self {
            rendered: format!("{}[{}]", self.rendered, index),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.rendered
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

/// FieldErrorList collects every field error found while admitting one object.
pub type FieldErrorList = Vec<FieldError>;

/// FieldError represents a field-level error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub error_type: FieldErrorType,
    pub value: String,
    pub detail: String,
    pub supported_values: Vec<String>,
}

impl FieldError {
    fn new(path: &FieldPath, error_type: FieldErrorType, value: &str, detail: &str) -> Self {
        Self {
            field: path.to_string(),
            error_type,
            value: value.to_string(),
            detail: detail.to_string(),
            supported_values: Vec::new(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.field)?;
        match &self.error_type {
            FieldErrorType::NotFound => write!(f, "Not found: \"{}\"", self.value)?,
            FieldErrorType::Required => write!(f, "Required value")?,
            FieldErrorType::Invalid => write!(f, "Invalid value: \"{}\"", self.value)?,
            FieldErrorType::NotSupported => {
                write!(f, "Unsupported value: \"{}\"", self.value)?;
                if !self.supported_values.is_empty() {
                    let quoted: Vec<String> = self
                        .supported_values
                        .iter()
                        .map(|s| format!("\"{}\"", s))
                        .collect();
                    write!(f, ": supported values: {}", quoted.join(", "))?;
                }
            }
        }
        if !self.detail.is_empty() {
            write!(f, ": {}", self.detail)?;
        }
        Ok(())
    }
}

/// FieldErrorType represents the type of field error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldErrorType {
    NotFound,
    Required,
    Invalid,
    NotSupported,
}

pub fn field_not_found(path: &FieldPath, value: &str) -> FieldError {
    FieldError::new(path, FieldErrorType::NotFound, value, "")
}

pub fn field_required(path: &FieldPath, detail: &str) -> FieldError {
    FieldError::new(path, FieldErrorType::Required, "", detail)
}

pub fn field_invalid(path: &FieldPath, value: &str, detail: &str) -> FieldError {
    FieldError::new(path, FieldErrorType::Invalid, value, detail)
}

pub fn field_not_supported(path: &FieldPath, value: &str, supported: &[String]) -> FieldError {
    let mut err = FieldError::new(path, FieldErrorType::NotSupported, value, "");
    err.supported_values = supported.to_vec();
    err
}
