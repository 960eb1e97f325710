//! Declarative table and form shapes for every master kind.
//!
//! Descriptors are plain data: column keys are dot-paths into a joined row
//! and select fields start with no options. Nothing here touches the backend.

use serde::Serialize;

use crate::kind::MasterKind;

/// How a form field is edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    /// Free text.
    Text,
    /// A numeric value.
    Number,
    /// An email address.
    Email,
    /// One value out of a list of options.
    Select,
}

/// One choice of a select field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    /// Value written into the record (a parent `id`).
    pub value: String,
    /// Text shown to the user (the parent `name`).
    pub label: String,
}

/// A table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDef {
    /// Dot-path into the joined row, e.g. `state.country.name`.
    pub key: String,
    /// Column header.
    pub label: String,
}

impl ColumnDef {
    fn new(key: &str, label: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
        }
    }
}

/// A form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDef {
    /// Record key the field edits.
    pub name: String,
    /// Label shown next to the input.
    pub label: String,
    /// Input kind.
    pub input: InputKind,
    /// Whether the field must be filled before submitting.
    pub required: bool,
    /// Choices for select fields. Empty until the lookup resolver fills it.
    pub options: Vec<SelectOption>,
}

impl FieldDef {
    fn new(name: &str, label: &str, input: InputKind) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            input,
            required: false,
            options: Vec::new(),
        }
    }

    fn text(name: &str, label: &str) -> Self {
        Self::new(name, label, InputKind::Text)
    }

    fn email(name: &str, label: &str) -> Self {
        Self::new(name, label, InputKind::Email)
    }

    fn select(name: &str, label: &str) -> Self {
        Self::new(name, label, InputKind::Select)
    }

    fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Whether the name follows the `<parent>_id` foreign-key convention.
    #[must_use]
    pub fn is_foreign_key(&self) -> bool {
        self.name.ends_with("_id")
    }

    /// The kind this field points at, if it is a foreign key to a known kind.
    #[must_use]
    pub fn foreign_kind(&self) -> Option<MasterKind> {
        self.name
            .strip_suffix("_id")
            .and_then(MasterKind::from_singular)
    }
}

/// Anything that can be rendered as a table.
pub trait HasColumns {
    /// Columns in display order.
    fn columns(&self) -> &[ColumnDef];
}

/// Anything that can be rendered as a form.
pub trait HasFields {
    /// Fields in display order.
    fn fields(&self) -> &[FieldDef];
}

/// The full declarative shape of one master kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaDescriptor {
    /// Kind described.
    pub kind: MasterKind,
    /// Human-readable name, e.g. `Countries`.
    pub label: String,
    /// Table columns.
    pub columns: Vec<ColumnDef>,
    /// Form fields.
    pub fields: Vec<FieldDef>,
}

impl HasColumns for SchemaDescriptor {
    fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }
}

impl HasFields for SchemaDescriptor {
    fn fields(&self) -> &[FieldDef] {
        &self.fields
    }
}

impl SchemaDescriptor {
    /// Look a field up by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// Static mapping from kind to descriptor.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaRegistry;

impl SchemaRegistry {
    /// Every registered kind, in tab order.
    #[must_use]
    pub fn kinds() -> &'static [MasterKind] {
        &MasterKind::ALL
    }

    /// Descriptor for `kind`.
    #[must_use]
    pub fn get(kind: MasterKind) -> SchemaDescriptor {
        let (label, columns, fields) = match kind {
            MasterKind::Countries => (
                "Countries",
                vec![ColumnDef::new("name", "Name"), ColumnDef::new("code", "Code")],
                vec![
                    FieldDef::text("name", "Country Name").required(),
                    FieldDef::text("code", "Country Code"),
                ],
            ),
            MasterKind::States => (
                "States",
                vec![
                    ColumnDef::new("name", "Name"),
                    ColumnDef::new("code", "Code"),
                    ColumnDef::new("country.name", "Country"),
                ],
                vec![
                    FieldDef::select("country_id", "Country").required(),
                    FieldDef::text("name", "State Name").required(),
                    FieldDef::text("code", "State Code"),
                ],
            ),
            MasterKind::Cities => (
                "Cities",
                vec![
                    ColumnDef::new("name", "Name"),
                    ColumnDef::new("state.name", "State"),
                    ColumnDef::new("state.country.name", "Country"),
                ],
                vec![
                    FieldDef::select("state_id", "State").required(),
                    FieldDef::text("name", "City Name").required(),
                ],
            ),
            MasterKind::Transporters => (
                "Transporters",
                vec![
                    ColumnDef::new("name", "Name"),
                    ColumnDef::new("phone", "Phone"),
                    ColumnDef::new("city.name", "City"),
                ],
                vec![
                    FieldDef::text("name", "Transporter Name").required(),
                    FieldDef::text("contact_person", "Contact Person"),
                    FieldDef::text("phone", "Phone"),
                    FieldDef::email("email", "Email"),
                    FieldDef::text("gstin", "GSTIN"),
                    FieldDef::select("city_id", "City"),
                    FieldDef::text("address", "Address"),
                ],
            ),
        };

        SchemaDescriptor {
            kind,
            label: label.to_string(),
            columns,
            fields,
        }
    }
}
