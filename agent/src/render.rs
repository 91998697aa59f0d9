//! Text rendering of query results and table descriptions for the model.

use comfy_table::Table;
use comfy_table::presets::ASCII_MARKDOWN;
use db::{DatabaseResult, TableSchema};
use serde_json::Value;

/// Longest cell value shown before it is cut.
const MAX_CELL_CHARS: usize = 100;

pub fn result_table(result: &DatabaseResult, max_chars: usize) -> String {
    if result.rows.is_empty() {
        return "The query returned no rows.".to_string();
    }

    let row_count = result.rows.len();
    let mut table = Table::new();
    table.load_preset(ASCII_MARKDOWN);
    table.set_header(
        result
            .headers
            .iter()
            .map(|(name, _)| name.clone())
            .collect::<Vec<_>>(),
    );
    for row in &result.rows {
        table.add_row(row.iter().map(cell_text).collect::<Vec<_>>());
    }

    let plural = if row_count == 1 { "" } else { "s" };
    let rendered = format!("{row_count} row{plural}\n{table}");

    if rendered.chars().count() <= max_chars {
        return rendered;
    }
    format!(
        "{}\n... output truncated ({row_count} rows in total); narrow the query to see the rest",
        truncate_chars(&rendered, max_chars)
    )
}

pub fn table_description(schema: &TableSchema, sample: Result<&DatabaseResult, &str>) -> String {
    let mut out = format!("Table: {}\nColumns:\n", schema.name);
    for column in &schema.columns {
        let null = if column.nullable { "NULL" } else { "NOT NULL" };
        out.push_str(&format!("  {} {} {null}\n", column.name, column.data_type));
    }

    if !schema.references.is_empty() {
        out.push_str("Foreign keys:\n");
        for fk in &schema.references {
            out.push_str(&format!(
                "  {} -> {}.{}\n",
                fk.column, fk.referenced_table, fk.referenced_column
            ));
        }
    }

    match sample {
        Ok(rows) if rows.rows.is_empty() => out.push_str("Sample rows: none, the table is empty\n"),
        Ok(rows) => {
            out.push_str("Sample rows:\n");
            out.push_str(&result_table(rows, usize::MAX));
            out.push('\n');
        }
        Err(reason) => out.push_str(&format!("Sample rows unavailable: {reason}\n")),
    }

    out
}

fn cell_text(value: &Value) -> String {
    let text = match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if text.chars().count() > MAX_CELL_CHARS {
        format!("{}...", truncate_chars(&text, MAX_CELL_CHARS))
    } else {
        text
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
