// Copyright (c) The suitemill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use thiserror::Error;

/// An error that occurs while serializing a [`Testsuite`](crate::Testsuite).
///
/// Returned by [`Testsuite::serialize`](crate::Testsuite::serialize) and
/// [`Testsuite::to_bytes`](crate::Testsuite::to_bytes).
#[derive(Debug, Error)]
#[error("error serializing suite report")]
pub struct SerializeError {
    #[from]
    inner: quick_xml::Error,
}

/// An error that occurs while parsing a [`Testsuite`](crate::Testsuite) from XML.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DeserializeError {
    /// The underlying XML was malformed.
    #[error("malformed suite report XML")]
    Xml(#[from] quick_xml::Error),

    /// The document has no `<testsuite>` root element.
    #[error("document has no <testsuite> element")]
    MissingTestsuite,

    /// A required attribute was missing.
    #[error("<{element}> is missing required attribute `{attribute}`")]
    MissingAttribute {
        /// The element the attribute was expected on.
        element: &'static str,
        /// The missing attribute.
        attribute: &'static str,
    },

    /// An attribute had a value that couldn't be interpreted.
    #[error("attribute `{attribute}` has invalid value `{value}`")]
    InvalidAttribute {
        /// The attribute name.
        attribute: &'static str,
        /// The value found in the document.
        value: String,
    },

    /// A count declared on `<testsuite>` disagrees with the test cases in the document.
    #[error("<testsuite> declares {declared} {kind}, but the document contains {actual}")]
    CountMismatch {
        /// The count that disagrees: `tests`, `failures` or `errors`.
        kind: &'static str,
        /// The value declared on the root element.
        declared: usize,
        /// The value derived from the test cases.
        actual: usize,
    },
}
