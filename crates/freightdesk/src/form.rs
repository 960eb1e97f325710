//! Generic form view.
//!
//! A form is a field set (from any [`HasFields`]) bound to a mutable map of
//! string values. Validation runs locally and never reaches the gateway.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, FieldError, FieldProblem, Result};
use crate::record::MasterRecord;
use crate::schema::{FieldDef, HasFields, InputKind};

/// Submitted or in-progress form values, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormData(BTreeMap<String, String>);

impl FormData {
    /// An empty form.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A create form: every field present and empty.
    #[must_use]
    pub fn blank<F: HasFields + ?Sized>(fields: &F) -> Self {
        fields
            .fields()
            .iter()
            .map(|field| (field.name.clone(), String::new()))
            .collect()
    }

    /// An edit form seeded from a record's values.
    #[must_use]
    pub fn from_record(record: &MasterRecord) -> Self {
        record.payload.to_form()
    }

    /// Value of `name`, or the empty string when unset.
    #[must_use]
    pub fn get(&self, name: &str) -> &str {
        self.0.get(name).map_or("", String::as_str)
    }

    /// Set `name` to `value`.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    /// Overlay every value from `other` onto this form.
    pub fn merge(&mut self, other: FormData) {
        self.0.extend(other.0);
    }

    /// Iterate over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of fields with a value.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no field has a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// # Panics
///
/// Panics if the built-in pattern fails to compile.
fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("Invalid email pattern")
    })
}

fn check_field(field: &FieldDef, value: &str) -> Option<FieldProblem> {
    if value.is_empty() {
        return field.required.then_some(FieldProblem::Required);
    }
    match field.input {
        InputKind::Text => None,
        InputKind::Number => value.parse::<f64>().is_err().then_some(FieldProblem::NotANumber),
        InputKind::Email => (!email_pattern().is_match(value)).then_some(FieldProblem::InvalidEmail),
        // Options may not be loaded yet; only reject when there is a list to check.
        InputKind::Select => (!field.options.is_empty()
            && !field.options.iter().any(|option| option.value == value))
        .then_some(FieldProblem::UnknownOption),
    }
}

/// Validate `data` against `fields`.
///
/// # Errors
///
/// Returns [`Error::Validation`] listing every failing field.
pub fn validate(fields: &[FieldDef], data: &FormData) -> Result<()> {
    let errors: Vec<FieldError> = fields
        .iter()
        .filter_map(|field| {
            check_field(field, data.get(&field.name).trim()).map(|problem| FieldError {
                field: field.name.clone(),
                label: field.label.clone(),
                problem,
            })
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation { errors })
    }
}

/// A renderable form: title, resolved fields and the bound values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormView {
    title: String,
    fields: Vec<FieldDef>,
    data: FormData,
}

impl FormView {
    /// Create a form view over already-resolved fields.
    #[must_use]
    pub fn new(title: impl Into<String>, fields: Vec<FieldDef>, data: FormData) -> Self {
        Self {
            title: title.into(),
            fields,
            data,
        }
    }

    /// Form title, e.g. `Add Cities`.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Bound values.
    #[must_use]
    pub fn data(&self) -> &FormData {
        &self.data
    }

    /// Consume the view, keeping the bound values.
    #[must_use]
    pub fn into_data(self) -> FormData {
        self.data
    }

    /// Change one bound value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.data.set(name, value);
    }

    /// Validate the bound values against the fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] listing every failing field.
    pub fn validate(&self) -> Result<()> {
        validate(&self.fields, &self.data)
    }
}

impl HasFields for FormView {
    fn fields(&self) -> &[FieldDef] {
        &self.fields
    }
}

impl fmt::Display for FormView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        for field in &self.fields {
            let marker = if field.required { " *" } else { "" };
            let value = self.data.get(&field.name);
            if field.input == InputKind::Select {
                let shown = field
                    .options
                    .iter()
                    .find(|option| option.value == value)
                    .map_or(value, |option| option.label.as_str());
                writeln!(f, "  {}{marker}: {shown}", field.label)?;
                for option in &field.options {
                    writeln!(f, "      [{}] {}", option.value, option.label)?;
                }
            } else {
                writeln!(f, "  {}{marker}: {value}", field.label)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::MasterKind;
    use crate::schema::{SchemaRegistry, SelectOption};

    fn option(value: &str, label: &str) -> SelectOption {
        SelectOption {
            value: value.to_string(),
            label: label.to_string(),
        }
    }

    #[test]
    fn test_blank_form_has_every_field() {
        let schema = SchemaRegistry::get(MasterKind::Transporters);
        let form = FormData::blank(&schema);
        assert_eq!(form.len(), 7);
        assert!(form.iter().all(|(_, v)| v.is_empty()));
    }

    #[test]
    fn test_city_without_state_fails_validation() {
        let schema = SchemaRegistry::get(MasterKind::Cities);
        let mut form = FormData::blank(&schema);
        form.set("name", "Mysuru");

        let err = validate(&schema.fields, &form).unwrap_err();
        let errors = err.field_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "state_id");
        assert_eq!(errors[0].problem, FieldProblem::Required);
    }

    #[test]
    fn test_whitespace_only_counts_as_empty() {
        let schema = SchemaRegistry::get(MasterKind::Countries);
        let form: FormData = [("name", "   ")].into_iter().collect();
        assert!(validate(&schema.fields, &form).unwrap_err().is_validation());
    }

    #[test]
    fn test_optional_email_is_checked_only_when_filled() {
        let schema = SchemaRegistry::get(MasterKind::Transporters);
        let mut form = FormData::blank(&schema);
        form.set("name", "Acme Roadways");
        assert!(validate(&schema.fields, &form).is_ok());

        form.set("email", "not-an-address");
        let err = validate(&schema.fields, &form).unwrap_err();
        assert_eq!(err.field_errors()[0].problem, FieldProblem::InvalidEmail);

        form.set("email", "ops@acme.in");
        assert!(validate(&schema.fields, &form).is_ok());
    }

    #[test]
    fn test_number_field() {
        let field = FieldDef {
            name: "capacity".to_string(),
            label: "Capacity".to_string(),
            input: InputKind::Number,
            required: false,
            options: Vec::new(),
        };
        assert_eq!(check_field(&field, "12.5"), None);
        assert_eq!(check_field(&field, "twelve"), Some(FieldProblem::NotANumber));
    }

    #[test]
    fn test_select_value_must_be_an_option_once_loaded() {
        let mut field = SchemaRegistry::get(MasterKind::States)
            .field("country_id")
            .cloned()
            .unwrap();
        assert_eq!(check_field(&field, "anything"), None);

        field.options = vec![option("IN", "India")];
        assert_eq!(check_field(&field, "IN"), None);
        assert_eq!(check_field(&field, "US"), Some(FieldProblem::UnknownOption));
    }

    #[test]
    fn test_merge_overrides_values() {
        let mut form: FormData = [("name", "Old"), ("code", "O")].into_iter().collect();
        form.merge([("name", "New")].into_iter().collect());
        assert_eq!(form.get("name"), "New");
        assert_eq!(form.get("code"), "O");
        assert_eq!(form.get("missing"), "");
    }

    #[test]
    fn test_form_view_display_marks_required_and_shows_option_labels() {
        let mut fields = SchemaRegistry::get(MasterKind::States).fields;
        fields[0].options = vec![option("IN", "India")];
        let data: FormData = [("country_id", "IN"), ("name", "Goa")].into_iter().collect();
        let view = FormView::new("Add States", fields, data);

        let rendered = view.to_string();
        assert!(rendered.starts_with("Add States\n"));
        assert!(rendered.contains("  Country *: India\n"));
        assert!(rendered.contains("      [IN] India\n"));
        assert!(rendered.contains("  State Code: \n"));
    }

    #[test]
    fn test_form_view_validate_and_into_data() {
        let schema = SchemaRegistry::get(MasterKind::Countries);
        let mut view = FormView::new("Add Countries", schema.fields.clone(), FormData::blank(&schema));
        assert!(view.validate().is_err());
        view.set("name", "India");
        assert!(view.validate().is_ok());
        assert_eq!(view.into_data().get("name"), "India");
    }
}
