//! Document schemas: the named field list each document type is mapped to.
//!
//! A schema is data, not code. The built-in [`DocumentSchema::deed`] covers
//! the buyer/seller fields of property deeds; other document types are
//! loaded from TOML files so new types can be added without a rebuild:
//!
//! ```toml
//! document_type = "LEASE"
//! fields = ["Lessor Name", "Lessee Name", "Monthly Rent"]
//! # Optional extra guidance appended to the extraction prompt.
//! instructions = "Amounts are in INR."
//! ```

use crate::error::PipelineError;
use crate::store::LEADING_COLUMNS;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

const DEED_FIELDS: &[&str] = &[
    "Seller Name",
    "Seller Suffix",
    "Seller Relationship",
    "Seller Current Address",
    "Seller Same as Property address",
    "Seller City",
    "Seller State",
    "Seller Zip Code",
    "Seller Email address",
    "Seller WorkPhone /Ext:",
    "Seller Fax",
    "Seller Marketing Rep",
    "Seller Marketing Source",
    "Buyer Name",
    "Buyer Suffix",
    "Buyer Relationship",
    "Buyer Current Address",
    "Buyer Same as Property address",
    "Buyer City",
    "Buyer State",
    "Buyer Zip Code",
    "Buyer Email address",
    "Buyer WorkPhone /Ext:",
    "Buyer Fax",
    "Buyer Marketing Rep",
    "Buyer Marketing Source",
];

/// The fixed field list extracted for one document type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSchema {
    pub document_type: String,
    pub fields: Vec<String>,
    /// Extra guidance appended to the extraction prompt.
    #[serde(default)]
    pub instructions: Option<String>,
}

impl DocumentSchema {
    /// Build and validate a schema.
    pub fn new(
        document_type: impl Into<String>,
        fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, PipelineError> {
        let schema = Self {
            document_type: document_type.into(),
            fields: fields.into_iter().map(Into::into).collect(),
            instructions: None,
        };
        schema.validate()?;
        Ok(schema)
    }

    /// Buyer/seller schema for property deeds.
    pub fn deed() -> Self {
        Self {
            document_type: "DEED".to_string(),
            fields: DEED_FIELDS.iter().map(|f| f.to_string()).collect(),
            instructions: None,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Parse a schema from TOML source.
    pub fn from_toml_str(src: &str) -> Result<Self, PipelineError> {
        let schema: DocumentSchema =
            toml::from_str(src).map_err(|e| PipelineError::InvalidSchema(e.to_string()))?;
        schema.validate()?;
        Ok(schema)
    }

    /// Load a schema from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let src = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::InvalidSchema(format!("cannot read '{}': {e}", path.display()))
        })?;
        Self::from_toml_str(&src)
    }

    /// Check the invariants the extractor and the store rely on.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.document_type.trim().is_empty() {
            return Err(PipelineError::InvalidSchema(
                "document_type must not be empty".into(),
            ));
        }
        if self.fields.is_empty() {
            return Err(PipelineError::InvalidSchema(format!(
                "schema '{}' has no fields",
                self.document_type
            )));
        }
        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.trim().is_empty() {
                return Err(PipelineError::InvalidSchema(format!(
                    "schema '{}' contains a blank field name",
                    self.document_type
                )));
            }
            if LEADING_COLUMNS.contains(&field.as_str()) {
                return Err(PipelineError::InvalidSchema(format!(
                    "field '{field}' collides with a reserved column"
                )));
            }
            if !seen.insert(field.as_str()) {
                return Err(PipelineError::InvalidSchema(format!(
                    "duplicate field '{field}' in schema '{}'",
                    self.document_type
                )));
            }
        }
        Ok(())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deed_schema_is_valid() {
        let s = DocumentSchema::deed();
        s.validate().expect("built-in schema must validate");
        assert_eq!(s.fields.len(), 26);
        assert!(s.contains("Seller Current Address"));
    }

    #[test]
    fn toml_schema_roundtrip() {
        let src = r#"
document_type = "LEASE"
fields = ["Lessor Name", "Lessee Name"]
instructions = "Amounts are in INR."
"#;
        let s = DocumentSchema::from_toml_str(src).unwrap();
        assert_eq!(s.document_type, "LEASE");
        assert_eq!(s.fields, vec!["Lessor Name", "Lessee Name"]);
        assert_eq!(s.instructions.as_deref(), Some("Amounts are in INR."));
    }

    #[test]
    fn rejects_duplicates() {
        let err = DocumentSchema::new("X", ["A", "B", "A"]).unwrap_err();
        assert!(err.to_string().contains("duplicate"), "got: {err}");
    }

    #[test]
    fn rejects_reserved_column() {
        let err = DocumentSchema::new("X", ["filename"]).unwrap_err();
        assert!(err.to_string().contains("reserved"), "got: {err}");
    }

    #[test]
    fn rejects_empty_field_list() {
        assert!(DocumentSchema::new("X", Vec::<String>::new()).is_err());
        assert!(DocumentSchema::from_toml_str("document_type = \"X\"\nfields = []").is_err());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lease.toml");
        std::fs::write(&path, "document_type = \"LEASE\"\nfields = [\"Rent\"]\n").unwrap();
        let s = DocumentSchema::load(&path).unwrap();
        assert_eq!(s.fields, vec!["Rent"]);
        assert!(DocumentSchema::load(dir.path().join("missing.toml")).is_err());
    }
}
