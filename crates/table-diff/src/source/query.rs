//! SQL generation for the MySQL backend.
//!
//! - Checksum queries: `SUM(CRC32(CONCAT(...)))` over a key segment
//! - Row queries: string projection of the diff columns over a key segment
//! - Introspection: column listing and primary key bounds
//!
//! Key bounds are bound as `?` parameters. The filter predicate comes from the
//! run configuration and is inserted verbatim, wrapped in parentheses.

use super::DiffScope;

/// Quote a MySQL identifier.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quote a possibly schema-qualified table name (`db.table`).
pub fn quote_table(name: &str) -> String {
    match name.split_once('.') {
        Some((schema, table)) => format!("{}.{}", quote_ident(schema), quote_ident(table)),
        None => quote_ident(name),
    }
}

/// Shared `WHERE` clause: half-open key range plus the filter predicate.
fn segment_predicate(scope: &DiffScope) -> String {
    let pk = quote_ident(scope.primary_key());
    format!("({pk} >= ?) AND ({pk} < ?) AND ({filter})", pk = pk, filter = scope.filter())
}

/// Generate the aggregate checksum query for one table.
///
/// NULL cells are folded to the empty string before concatenation so that a
/// row with a NULL still contributes to the sum. Binds: `head`, `tail`.
pub fn checksum_query(table: &str, scope: &DiffScope) -> String {
    let cols: Vec<String> = scope
        .columns()
        .iter()
        .map(|c| format!("IFNULL(CAST({} AS CHAR), '')", quote_ident(c)))
        .collect();

    format!(
        "SELECT CAST(IFNULL(SUM(CRC32(CONCAT({cols}))), 0) AS SIGNED) AS crc FROM {table} WHERE {predicate}",
        cols = cols.join(", "),
        table = quote_table(table),
        predicate = segment_predicate(scope),
    )
}

/// Generate the row projection query for one table. Binds: `head`, `tail`.
pub fn rows_query(table: &str, scope: &DiffScope) -> String {
    let cols: Vec<String> = scope
        .columns()
        .iter()
        .map(|c| {
            let quoted = quote_ident(c);
            format!("CAST({q} AS CHAR) AS {q}", q = quoted)
        })
        .collect();

    format!(
        "SELECT {cols} FROM {table} WHERE {predicate} ORDER BY {pk}",
        cols = cols.join(", "),
        table = quote_table(table),
        predicate = segment_predicate(scope),
        pk = quote_ident(scope.primary_key()),
    )
}

/// Generate the maximum primary key query. Returns NULL for an empty table.
pub fn max_pk_query(table: &str, primary_key: &str) -> String {
    format!(
        "SELECT CAST(MAX({pk}) AS SIGNED) AS max_pk FROM {table}",
        pk = quote_ident(primary_key),
        table = quote_table(table),
    )
}

/// Column listing for a table, in ordinal order.
///
/// Binds: `table`. When the table name is not schema-qualified, the current
/// database is used.
pub const COLUMNS_QUERY: &str = r#"
    SELECT
        CAST(COLUMN_NAME AS CHAR(255)) AS column_name,
        CAST(DATA_TYPE AS CHAR(255)) AS data_type,
        CAST(COLUMN_KEY AS CHAR(16)) AS column_key
    FROM INFORMATION_SCHEMA.COLUMNS
    WHERE TABLE_SCHEMA = COALESCE(?, DATABASE()) AND TABLE_NAME = ?
    ORDER BY ORDINAL_POSITION
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> DiffScope {
        DiffScope::new("id", vec!["id".into(), "name".into()], "true")
    }

    #[test]
    fn test_quote_ident_escapes_backquote() {
        assert_eq!(quote_ident("name"), "`name`");
        assert_eq!(quote_ident("we`ird"), "`we``ird`");
    }

    #[test]
    fn test_quote_table_schema_qualified() {
        assert_eq!(quote_table("shop.users"), "`shop`.`users`");
        assert_eq!(quote_table("users"), "`users`");
    }

    #[test]
    fn test_checksum_query() {
        let sql = checksum_query("users", &scope());
        assert_eq!(
            sql,
            "SELECT CAST(IFNULL(SUM(CRC32(CONCAT(IFNULL(CAST(`id` AS CHAR), ''), \
             IFNULL(CAST(`name` AS CHAR), '')))), 0) AS SIGNED) AS crc FROM `users` \
             WHERE (`id` >= ?) AND (`id` < ?) AND (true)"
        );
    }

    #[test]
    fn test_rows_query() {
        let sql = rows_query("users", &scope());
        assert_eq!(
            sql,
            "SELECT CAST(`id` AS CHAR) AS `id`, CAST(`name` AS CHAR) AS `name` FROM `users` \
             WHERE (`id` >= ?) AND (`id` < ?) AND (true) ORDER BY `id`"
        );
    }

    #[test]
    fn test_filter_applied_identically() {
        let scope = DiffScope::new("id", vec!["name".into()], "status = 'active' OR id < 10");
        let checksum = checksum_query("t", &scope);
        let rows = rows_query("t", &scope);
        let predicate = "AND (status = 'active' OR id < 10)";
        assert!(checksum.contains(predicate), "checksum: {}", checksum);
        assert!(rows.contains(predicate), "rows: {}", rows);
    }

    #[test]
    fn test_max_pk_query() {
        assert_eq!(
            max_pk_query("shop.orders", "order_id"),
            "SELECT CAST(MAX(`order_id`) AS SIGNED) AS max_pk FROM `shop`.`orders`"
        );
    }
}
