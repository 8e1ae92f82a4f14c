use crate::sql::dialect::Dialect;
use model::{core::value::Value, records::record::Record};

pub struct QueryGenerator<'a> {
    dialect: &'a dyn Dialect,
}

impl<'a> QueryGenerator<'a> {
    pub fn new(dialect: &'a dyn Dialect) -> Self {
        Self { dialect }
    }

    /// Single-row `INSERT` using the row's own columns.
    pub fn insert_row(&self, table: &str, row: &Record) -> (String, Vec<Value>) {
        let columns: Vec<&str> = row.names().collect();
        let sql = self.insert_sql(table, &columns, 1);
        let params = row.iter().map(|(_, value)| value.clone()).collect();
        (sql, params)
    }

    /// Multi-row `INSERT`. The column list is the union of all row columns
    /// in first-seen order; rows missing a column bind `NULL` for it.
    pub fn insert_rows(&self, table: &str, rows: &[Record]) -> (String, Vec<Value>) {
        if rows.is_empty() {
            return (String::new(), Vec::new());
        }

        let columns = column_union(rows);
        let sql = self.insert_sql(table, &columns, rows.len());
        let mut params = Vec::with_capacity(columns.len() * rows.len());
        for row in rows {
            for col in &columns {
                params.push(row.get(col).cloned().unwrap_or(Value::Null));
            }
        }
        (sql, params)
    }

    fn insert_sql(&self, table: &str, columns: &[&str], row_count: usize) -> String {
        let col_list = columns
            .iter()
            .map(|c| self.dialect.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");

        let width = columns.len();
        let tuples = (0..row_count)
            .map(|row| {
                let placeholders = (0..width)
                    .map(|col| self.dialect.get_placeholder(row * width + col))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("({placeholders})")
            })
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.dialect.quote_table(table),
            col_list,
            tuples
        )
    }
}

/// Distinct column names across `rows`, in first-seen order.
pub fn column_union(rows: &[Record]) -> Vec<&str> {
    let mut columns: Vec<&str> = Vec::new();
    for row in rows {
        for name in row.names() {
            if !columns.contains(&name) {
                columns.push(name);
            }
        }
    }
    columns
}
