use redb::TableDefinition;

/// Connection options: option name -> value (msgpack)
pub const OPTIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("options");
