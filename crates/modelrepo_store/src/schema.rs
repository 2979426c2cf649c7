//! Dialect-neutral table definitions and the DDL builder.

use modelrepo_model::ObjectKind;

use crate::dialect::{ColumnType, Dialect};

/// One column of a table definition.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    /// Column name.
    pub name: &'static str,
    /// Abstract type, translated per dialect.
    pub ty: ColumnType,
    /// Whether NULL values are allowed.
    pub nullable: bool,
}

impl ColumnDef {
    const fn required(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            nullable: false,
        }
    }

    const fn optional(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            nullable: true,
        }
    }
}

/// One table of the repository schema.
#[derive(Debug, Clone)]
pub struct TableDef {
    /// Table name.
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnDef>,
    /// Primary key column names, empty for keyless tables.
    pub primary_key: Vec<&'static str>,
}

impl TableDef {
    /// Renders a `CREATE TABLE` statement for the given dialect.
    #[must_use]
    pub fn create_table(&self, dialect: Dialect) -> String {
        let mut parts: Vec<String> = self
            .columns
            .iter()
            .map(|column| {
                let null = if column.nullable { "" } else { " NOT NULL" };
                format!("{} {}{null}", column.name, dialect.column_type(column.ty))
            })
            .collect();
        if !self.primary_key.is_empty() {
            parts.push(format!("PRIMARY KEY ({})", self.primary_key.join(", ")));
        }
        format!("CREATE TABLE {} ({})", self.name, parts.join(", "))
    }
}

/// The versioned table name for one object kind.
#[must_use]
pub fn object_table(kind: ObjectKind) -> String {
    format!("{}s", kind.label())
}

/// The containment junction table name for one object kind.
#[must_use]
pub fn junction_table(kind: ObjectKind) -> String {
    format!("{}s_in_model", kind.label())
}

fn version_columns() -> Vec<ColumnDef> {
    vec![
        ColumnDef::required("id", ColumnType::Id),
        ColumnDef::required("version", ColumnType::Integer),
        ColumnDef::required("checksum", ColumnType::Text),
        ColumnDef::required("created_by", ColumnType::Text),
        ColumnDef::required("created_at", ColumnType::BigInt),
    ]
}

fn versioned_table(kind: ObjectKind, extra: Vec<ColumnDef>) -> TableDef {
    let mut columns = version_columns();
    columns.extend(extra);
    TableDef {
        name: object_table(kind),
        columns,
        primary_key: vec!["id", "version"],
    }
}

fn junction(kind: ObjectKind) -> TableDef {
    TableDef {
        name: junction_table(kind),
        columns: vec![
            ColumnDef::required("model", ColumnType::Id),
            ColumnDef::required("model_version", ColumnType::Integer),
            ColumnDef::required("object", ColumnType::Id),
            ColumnDef::required("object_version", ColumnType::Integer),
            ColumnDef::optional("parent", ColumnType::Id),
            ColumnDef::required("rank", ColumnType::Integer),
        ],
        primary_key: vec!["model", "model_version", "object"],
    }
}

/// Every table of the repository schema, in creation order.
#[must_use]
pub fn repository_tables() -> Vec<TableDef> {
    let mut tables = vec![
        TableDef {
            name: "schema_version".to_string(),
            columns: vec![ColumnDef::required("version", ColumnType::Integer)],
            primary_key: vec![],
        },
        TableDef {
            name: "models".to_string(),
            columns: {
                let mut columns = version_columns();
                columns.extend([
                    ColumnDef::required("name", ColumnType::Text),
                    ColumnDef::required("purpose", ColumnType::Text),
                ]);
                columns
            },
            primary_key: vec!["id", "version"],
        },
        versioned_table(
            ObjectKind::Profile,
            vec![
                ColumnDef::required("name", ColumnType::Text),
                ColumnDef::required("applies_to", ColumnType::Text),
                ColumnDef::optional("image_path", ColumnType::Text),
            ],
        ),
        versioned_table(
            ObjectKind::Folder,
            vec![
                ColumnDef::required("name", ColumnType::Text),
                ColumnDef::required("documentation", ColumnType::Text),
                ColumnDef::required("folder_kind", ColumnType::Integer),
            ],
        ),
        versioned_table(
            ObjectKind::Element,
            vec![
                ColumnDef::required("type_name", ColumnType::Text),
                ColumnDef::required("name", ColumnType::Text),
                ColumnDef::required("documentation", ColumnType::Text),
            ],
        ),
        TableDef {
            name: "element_profiles".to_string(),
            columns: vec![
                ColumnDef::required("element", ColumnType::Id),
                ColumnDef::required("element_version", ColumnType::Integer),
                ColumnDef::required("rank", ColumnType::Integer),
                ColumnDef::required("profile", ColumnType::Id),
            ],
            primary_key: vec!["element", "element_version", "rank"],
        },
        versioned_table(
            ObjectKind::Relationship,
            vec![
                ColumnDef::required("type_name", ColumnType::Text),
                ColumnDef::required("name", ColumnType::Text),
                ColumnDef::required("documentation", ColumnType::Text),
                ColumnDef::required("source", ColumnType::Id),
                ColumnDef::required("target", ColumnType::Id),
            ],
        ),
        versioned_table(
            ObjectKind::View,
            vec![
                ColumnDef::required("name", ColumnType::Text),
                ColumnDef::required("documentation", ColumnType::Text),
                ColumnDef::optional("viewpoint", ColumnType::Text),
                ColumnDef::optional("background", ColumnType::Integer),
                ColumnDef::optional("connection_router", ColumnType::Integer),
                ColumnDef::optional("container_checksum", ColumnType::Text),
            ],
        ),
        versioned_table(
            ObjectKind::ViewNode,
            vec![
                ColumnDef::required("view", ColumnType::Id),
                ColumnDef::optional("element", ColumnType::Id),
                ColumnDef::required("x", ColumnType::Integer),
                ColumnDef::required("y", ColumnType::Integer),
                ColumnDef::required("width", ColumnType::Integer),
                ColumnDef::required("height", ColumnType::Integer),
                ColumnDef::optional("fill_color", ColumnType::Text),
                ColumnDef::optional("content", ColumnType::Text),
            ],
        ),
        versioned_table(
            ObjectKind::ViewConnection,
            vec![
                ColumnDef::required("view", ColumnType::Id),
                ColumnDef::optional("relationship", ColumnType::Id),
                ColumnDef::required("source", ColumnType::Id),
                ColumnDef::required("target", ColumnType::Id),
                ColumnDef::optional("line_color", ColumnType::Text),
            ],
        ),
        versioned_table(
            ObjectKind::Image,
            vec![
                ColumnDef::required("path", ColumnType::Text),
                ColumnDef::required("bytes", ColumnType::Blob),
            ],
        ),
        TableDef {
            name: "properties".to_string(),
            columns: vec![
                ColumnDef::required("parent", ColumnType::Id),
                ColumnDef::required("parent_version", ColumnType::Integer),
                ColumnDef::required("rank", ColumnType::Integer),
                ColumnDef::required("key", ColumnType::Text),
                ColumnDef::required("value", ColumnType::Text),
            ],
            primary_key: vec!["parent", "parent_version", "rank"],
        },
        TableDef {
            name: "features".to_string(),
            columns: vec![
                ColumnDef::required("parent", ColumnType::Id),
                ColumnDef::required("parent_version", ColumnType::Integer),
                ColumnDef::required("name", ColumnType::Text),
                ColumnDef::required("value", ColumnType::Text),
            ],
            primary_key: vec!["parent", "parent_version", "name"],
        },
        TableDef {
            name: "bendpoints".to_string(),
            columns: vec![
                ColumnDef::required("parent", ColumnType::Id),
                ColumnDef::required("parent_version", ColumnType::Integer),
                ColumnDef::required("rank", ColumnType::Integer),
                ColumnDef::required("start_x", ColumnType::Integer),
                ColumnDef::required("start_y", ColumnType::Integer),
                ColumnDef::required("end_x", ColumnType::Integer),
                ColumnDef::required("end_y", ColumnType::Integer),
            ],
            primary_key: vec!["parent", "parent_version", "rank"],
        },
    ];
    for kind in ObjectKind::ALL {
        tables.push(junction(kind));
    }
    tables
}

/// Renders the full schema for one dialect, in creation order.
#[must_use]
pub fn create_schema(dialect: Dialect) -> Vec<String> {
    repository_tables()
        .iter()
        .map(|table| table.create_table(dialect))
        .collect()
}
