/// Quotes a single identifier with backticks, doubling embedded backticks.
pub fn escape_name(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// The fully qualified key under which a table's checkpoint is stored,
/// e.g. `` `db1`.`t2` ``.
pub fn unique_table_name(schema: &str, table: &str) -> String {
    format!("{}.{}", escape_name(schema), escape_name(table))
}
