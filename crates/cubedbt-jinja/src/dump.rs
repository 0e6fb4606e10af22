//! YAML fragments for splicing into cube templates

use crate::error::RenderError;
use serde::Serialize;

/// Serialize `value` as YAML, indenting every line after the first
///
/// The first line lands wherever the template placed the expression, so
/// only continuation lines need the extra `indent` spaces.
pub fn dump<T: Serialize + ?Sized>(value: &T, indent: usize) -> Result<String, RenderError> {
    let yaml = serde_yaml::to_string(value)?;
    let padding = " ".repeat(indent);

    Ok(yaml
        .trim_end_matches('\n')
        .lines()
        .enumerate()
        .map(|(i, line)| {
            if i == 0 || line.is_empty() {
                line.to_string()
            } else {
                format!("{}{}", padding, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Like [`dump`], but an empty list renders as an empty string
pub fn dump_list<T: Serialize>(items: &[T], indent: usize) -> Result<String, RenderError> {
    if items.is_empty() {
        return Ok(String::new());
    }
    dump(items, indent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn mapping_continuation_lines_are_indented() {
        let out = dump(&json!({ "name": "orders", "sql_table": "public.orders" }), 4).unwrap();
        assert_eq!(out, "name: orders\n    sql_table: public.orders");
    }

    #[test]
    fn list_items_keep_relative_indent() {
        let out = dump(
            &json!([
                { "name": "id", "type": "number" },
                { "name": "status", "type": "string" }
            ]),
            6,
        )
        .unwrap();

        assert_eq!(
            out,
            "- name: id\n        type: number\n      - name: status\n        type: string"
        );
    }

    #[test]
    fn empty_list_is_empty_string() {
        let empty: Vec<serde_json::Value> = Vec::new();
        assert_eq!(dump_list(&empty, 6).unwrap(), "");
    }
}
