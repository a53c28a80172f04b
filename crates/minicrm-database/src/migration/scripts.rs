use super::types::Migration;
use semver::Version;

pub const BASELINE_VERSION: Version = Version::new(1, 0, 0);

/// Initial schema: customer types and customers.
pub fn baseline() -> Migration {
    Migration::new(BASELINE_VERSION, "Initial customer schema")
        .statement(
            "CREATE TABLE IF NOT EXISTS customer_types (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                description TEXT,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .statement(
            "CREATE TABLE IF NOT EXISTS customers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                phone TEXT,
                email TEXT,
                address TEXT,
                contact_person TEXT,
                customer_type_id INTEGER REFERENCES customer_types(id),
                level TEXT NOT NULL DEFAULT 'normal',
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .statement("CREATE INDEX IF NOT EXISTS idx_customers_name ON customers(name)")
        .statement("CREATE INDEX IF NOT EXISTS idx_customers_phone ON customers(phone)")
        .statement("CREATE INDEX IF NOT EXISTS idx_customers_type ON customers(customer_type_id)")
}
