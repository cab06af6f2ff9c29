use thiserror::Error;

/// Failure to coerce one parameter value into its declared type.
///
/// `Type` means the value's shape can never satisfy the declared type, `Value` means
/// the shape is right but the content is not (a malformed URI, an empty non-empty
/// array, a missing struct field).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoercionError {
    #[error("Coercion from {from_type} to {to_type} failed for parameter '{parameter_name}'. {reason}")]
    Type {
        parameter_name: String,
        from_type: String,
        to_type: String,
        reason: String,
    },
    #[error("Coercion from {from_type} to {to_type} failed for parameter '{parameter_name}'. Coercion supported but failed: {reason}.")]
    Value {
        parameter_name: String,
        from_type: String,
        to_type: String,
        reason: String,
    },
}

impl CoercionError {
    pub fn unsupported(
        parameter_name: impl Into<String>,
        from_type: impl Into<String>,
        to_type: impl Into<String>,
    ) -> Self {
        Self::type_error(
            parameter_name,
            from_type,
            to_type,
            "Coercion not supported between these types.",
        )
    }

    pub fn type_error(
        parameter_name: impl Into<String>,
        from_type: impl Into<String>,
        to_type: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Type {
            parameter_name: parameter_name.into(),
            from_type: from_type.into(),
            to_type: to_type.into(),
            reason: reason.into(),
        }
    }

    pub fn value_error(
        parameter_name: impl Into<String>,
        from_type: impl Into<String>,
        to_type: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Value {
            parameter_name: parameter_name.into(),
            from_type: from_type.into(),
            to_type: to_type.into(),
            reason: reason.into(),
        }
    }

    pub fn parameter_name(&self) -> &str {
        match self {
            Self::Type { parameter_name, .. } | Self::Value { parameter_name, .. } => {
                parameter_name
            }
        }
    }

    pub fn is_type_error(&self) -> bool {
        matches!(self, Self::Type { .. })
    }

    pub fn is_value_error(&self) -> bool {
        matches!(self, Self::Value { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoercionError::unsupported("wf.count", "Boolean", "Int");
        assert_eq!(
            err.to_string(),
            "Coercion from Boolean to Int failed for parameter 'wf.count'. Coercion not supported between these types."
        );

        let err = CoercionError::value_error(
            "wf.files",
            "Array",
            "Array[File]",
            "Non-empty array must have at least one value",
        );
        assert!(err.is_value_error());
        assert!(err
            .to_string()
            .ends_with(
                    "Coercion supported but failed: Non-empty array must have at least one value."
                ));
        assert_eq!(err.parameter_name(), "wf.files");
    }
}
