//! DBC schema metadata.
//!
//! Schemas are embedded in the binary (`meta/schemas.json`) - never read
//! from disk, since the baseline tree is under user control. A schema fully
//! determines the byte layout of its file: `int32`/`uint32`/`string`/`float`
//! take 4 bytes, `uint8`/`int8` take 1, `Loc` takes 68 (16 string offsets
//! plus a flag word).

use serde::Deserialize;
use std::sync::OnceLock;

/// The 16 locale tags of a localized string bundle, in file order.
pub const LOCALES: [&str; 16] = [
    "enus", "kokr", "frfr", "dede", "zhcn", "zhtw", "eses", "esmx", "ruru", "jajp", "ptpt",
    "itit", "unused_1", "unused_2", "unused_3", "unused_4",
];

/// Logical field types as they appear in schema metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum FieldType {
    #[serde(rename = "int32")]
    Int32,
    #[serde(rename = "uint32")]
    UInt32,
    #[serde(rename = "uint8")]
    UInt8,
    #[serde(rename = "int8")]
    Int8,
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "string")]
    String,
    #[serde(rename = "Loc")]
    Loc,
}

impl FieldType {
    /// On-disk bytes per single field of this type.
    pub fn byte_size(&self) -> u32 {
        match self {
            FieldType::UInt8 | FieldType::Int8 => 1,
            FieldType::Loc => 68,
            _ => 4,
        }
    }

    /// Slots this type contributes to the header's field count.
    pub fn slot_count(&self) -> u32 {
        match self {
            FieldType::Loc => 17,
            _ => 1,
        }
    }
}

/// Expanded (relational) column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int32,
    UInt32,
    UInt8,
    Int8,
    Float,
    Text,
}

impl ColumnType {
    /// SQL column type for the working database.
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Int32 => "INT",
            ColumnType::UInt32 => "INT UNSIGNED",
            ColumnType::UInt8 => "TINYINT UNSIGNED",
            ColumnType::Int8 => "TINYINT",
            ColumnType::Float => "DECIMAL(38,16)",
            ColumnType::Text => "TEXT",
        }
    }
}

/// One expanded column.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub ctype: ColumnType,
}

fn default_count() -> u32 {
    1
}

/// One schema field; `count > 1` expands to `<name>_1`..`<name>_<count>`.
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaField {
    pub name: String,
    #[serde(rename = "type")]
    pub ftype: FieldType,
    #[serde(default = "default_count")]
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum SortDirection {
    #[serde(rename = "ASC")]
    Asc,
    #[serde(rename = "DESC")]
    Desc,
}

impl SortDirection {
    pub fn sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SortKey {
    pub name: String,
    pub direction: SortDirection,
}

/// One logical table schema.
#[derive(Debug, Clone, Deserialize)]
pub struct Schema {
    /// File name, e.g. `Talent.dbc`.
    pub file: String,
    /// SQL table name; defaults to the lower-cased file stem.
    #[serde(rename = "tableName", default)]
    pub table_name: Option<String>,
    #[serde(rename = "primaryKeys", default)]
    pub primary_keys: Vec<String>,
    #[serde(rename = "uniqueKeys", default)]
    pub unique_keys: Vec<Vec<String>>,
    #[serde(rename = "sortOrder", default)]
    pub sort_order: Vec<SortKey>,
    pub fields: Vec<SchemaField>,
}

impl Schema {
    pub fn table_name(&self) -> String {
        match &self.table_name {
            Some(name) => name.clone(),
            None => self
                .file
                .trim_end_matches(".dbc")
                .to_lowercase(),
        }
    }

    /// Header field count: non-`Loc` fields contribute 1 slot each, `Loc`
    /// fields 17, multiplied by the array count.
    pub fn field_count(&self) -> u32 {
        self.fields
            .iter()
            .map(|f| f.count * f.ftype.slot_count())
            .sum()
    }

    /// Bytes per record as determined by the schema.
    pub fn record_size(&self) -> u32 {
        self.fields
            .iter()
            .map(|f| f.count * f.ftype.byte_size())
            .sum()
    }

    /// Expanded relational columns, in file order.
    pub fn columns(&self) -> Vec<Column> {
        let mut columns = Vec::new();
        for field in &self.fields {
            for i in 1..=field.count {
                let base = if field.count > 1 {
                    format!("{}_{}", field.name, i)
                } else {
                    field.name.clone()
                };
                match field.ftype {
                    FieldType::Loc => {
                        for locale in LOCALES {
                            columns.push(Column {
                                name: format!("{}_{}", base, locale),
                                ctype: ColumnType::Text,
                            });
                        }
                        columns.push(Column {
                            name: format!("{}_flags", base),
                            ctype: ColumnType::UInt32,
                        });
                    }
                    FieldType::String => columns.push(Column {
                        name: base,
                        ctype: ColumnType::Text,
                    }),
                    FieldType::Int32 => columns.push(Column {
                        name: base,
                        ctype: ColumnType::Int32,
                    }),
                    FieldType::UInt32 => columns.push(Column {
                        name: base,
                        ctype: ColumnType::UInt32,
                    }),
                    FieldType::UInt8 => columns.push(Column {
                        name: base,
                        ctype: ColumnType::UInt8,
                    }),
                    FieldType::Int8 => columns.push(Column {
                        name: base,
                        ctype: ColumnType::Int8,
                    }),
                    FieldType::Float => columns.push(Column {
                        name: base,
                        ctype: ColumnType::Float,
                    }),
                }
            }
        }
        columns
    }

    /// Primary key columns that actually exist after expansion.
    pub fn present_primary_keys(&self) -> Vec<String> {
        let columns = self.columns();
        self.primary_keys
            .iter()
            .filter(|pk| columns.iter().any(|c| &c.name == *pk))
            .cloned()
            .collect()
    }

    /// `CREATE TABLE` DDL. Returns the SQL and whether a synthetic
    /// `auto_id` primary key had to be prepended (none of the declared
    /// primary keys exist as columns).
    pub fn create_table_sql(&self) -> (String, bool) {
        let columns = self.columns();
        let pks = self.present_primary_keys();
        let synthetic = pks.is_empty();

        let mut parts = Vec::new();
        if synthetic {
            parts.push("`auto_id` BIGINT UNSIGNED NOT NULL AUTO_INCREMENT".to_string());
        }
        for col in &columns {
            parts.push(format!("`{}` {} NOT NULL", col.name, col.ctype.sql_type()));
        }
        if synthetic {
            parts.push("PRIMARY KEY (`auto_id`)".to_string());
        } else {
            let quoted: Vec<String> = pks.iter().map(|k| format!("`{}`", k)).collect();
            parts.push(format!("PRIMARY KEY ({})", quoted.join(", ")));
        }
        for (i, group) in self.unique_keys.iter().enumerate() {
            if !group
                .iter()
                .all(|k| columns.iter().any(|c| &c.name == k))
            {
                continue;
            }
            let quoted: Vec<String> = group.iter().map(|k| format!("`{}`", k)).collect();
            parts.push(format!("UNIQUE KEY `uq_{}` ({})", i, quoted.join(", ")));
        }

        let sql = format!(
            "CREATE TABLE IF NOT EXISTS `{}` (\n  {}\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
            self.table_name(),
            parts.join(",\n  ")
        );
        (sql, synthetic)
    }

    /// `SELECT` over the expanded columns, in schema-declared sort order if
    /// any.
    pub fn select_sql(&self) -> String {
        let cols: Vec<String> = self
            .columns()
            .iter()
            .map(|c| format!("`{}`", c.name))
            .collect();
        let mut sql = format!("SELECT {} FROM `{}`", cols.join(", "), self.table_name());
        if !self.sort_order.is_empty() {
            let keys: Vec<String> = self
                .sort_order
                .iter()
                .map(|k| format!("`{}` {}", k.name, k.direction.sql()))
                .collect();
            sql.push_str(&format!(" ORDER BY {}", keys.join(", ")));
        }
        sql
    }

    /// Multi-row upsert statement with `rows` placeholder groups.
    pub fn insert_sql(&self, rows: usize) -> String {
        let columns = self.columns();
        let names: Vec<String> = columns.iter().map(|c| format!("`{}`", c.name)).collect();
        let group = format!(
            "({})",
            vec!["?"; columns.len()].join(", ")
        );
        let values = vec![group; rows].join(", ");
        let updates: Vec<String> = columns
            .iter()
            .map(|c| format!("`{}`=VALUES(`{}`)", c.name, c.name))
            .collect();
        format!(
            "INSERT INTO `{}` ({}) VALUES {} ON DUPLICATE KEY UPDATE {}",
            self.table_name(),
            names.join(", "),
            values,
            updates.join(", ")
        )
    }
}

static SCHEMAS: OnceLock<Vec<Schema>> = OnceLock::new();

/// All embedded schemas.
pub fn all() -> &'static [Schema] {
    SCHEMAS.get_or_init(|| {
        serde_json::from_str(include_str!("meta/schemas.json"))
            .expect("embedded schema metadata is valid")
    })
}

/// Look up a schema by file name (`Talent.dbc`) or table name (`talent`).
pub fn by_name(name: &str) -> Option<&'static Schema> {
    all()
        .iter()
        .find(|s| s.file == name || s.table_name() == name)
}
