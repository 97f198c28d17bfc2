#![forbid(unsafe_code)]

pub mod revs;

pub use revs::*;

pub mod ids {
    pub const LOCAL_PREFIX: &str = "_local/";
    pub const DESIGN_PREFIX: &str = "_design/";

    const MAX_DOC_ID_LEN: usize = 1024;

    pub fn is_local_id(value: &str) -> bool {
        value.starts_with(LOCAL_PREFIX)
    }

    #[derive(Clone, Debug, PartialEq, Eq, Hash)]
    pub struct DocId(String);

    impl DocId {
        pub fn as_str(&self) -> &str {
            &self.0
        }

        pub fn into_string(self) -> String {
            self.0
        }

        pub fn is_local(&self) -> bool {
            is_local_id(&self.0)
        }

        pub fn try_new(value: impl Into<String>) -> Result<Self, DocIdError> {
            let value = value.into();
            validate_doc_id(&value)?;
            Ok(Self(value))
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum DocIdError {
        Empty,
        TooLong,
        ReservedPrefix,
        ContainsControl,
    }

    impl DocIdError {
        pub fn message(&self) -> &'static str {
            match self {
                Self::Empty => "document id must not be empty",
                Self::TooLong => "document id is too long",
                Self::ReservedPrefix => "only reserved document ids may start with '_'",
                Self::ContainsControl => "document id contains control characters",
            }
        }
    }

    fn validate_doc_id(value: &str) -> Result<(), DocIdError> {
        if value.is_empty() {
            return Err(DocIdError::Empty);
        }
        if value.len() > MAX_DOC_ID_LEN {
            return Err(DocIdError::TooLong);
        }
        if value.chars().any(|c| c.is_control()) {
            return Err(DocIdError::ContainsControl);
        }
        if value.starts_with('_') {
            let suffix = value
                .strip_prefix(LOCAL_PREFIX)
                .or_else(|| value.strip_prefix(DESIGN_PREFIX));
            match suffix {
                Some(rest) if !rest.is_empty() => {}
                _ => return Err(DocIdError::ReservedPrefix),
            }
        }
        Ok(())
    }
}
