use rusqlite::{Connection, Result};

/// Create every table and index the bridge needs. Safe to call on every
/// startup (idempotent) and after a schema-migration step adds a missing
/// index or column.
pub fn init_db(conn: &Connection) -> Result<()> {
    create_instances_table(conn)?;
    create_listeners_table(conn)?;
    create_messages_table(conn)?;
    create_platforms_table(conn)?;
    create_rules_table(conn)?;
    create_fixed_listeners_table(conn)?;
    create_accounting_table(conn)?;
    create_config_table(conn)?;
    Ok(())
}

fn create_instances_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS instances (
            instance_id TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            base_url    TEXT NOT NULL,
            api_key     TEXT NOT NULL,
            enabled     INTEGER NOT NULL DEFAULT 1,
            created_at  INTEGER NOT NULL,
            updated_at  INTEGER NOT NULL
        );",
    )
}

fn create_listeners_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS listeners (
            instance_id      TEXT NOT NULL,
            chat_name        TEXT NOT NULL,
            status           TEXT NOT NULL DEFAULT 'active',
            last_message_time INTEGER NOT NULL DEFAULT 0,
            manual_added     INTEGER NOT NULL DEFAULT 0,
            fixed            INTEGER NOT NULL DEFAULT 0,
            created_at       INTEGER NOT NULL,
            updated_at       INTEGER NOT NULL,
            PRIMARY KEY (instance_id, chat_name)
        );
        CREATE INDEX IF NOT EXISTS idx_listeners_status
            ON listeners(status, last_message_time DESC);",
    )
}

fn create_messages_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS messages (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            message_id       TEXT NOT NULL,
            instance_id      TEXT NOT NULL,
            chat_name        TEXT NOT NULL,
            sender           TEXT NOT NULL,
            sender_remark    TEXT,
            content          TEXT NOT NULL,
            message_type     TEXT NOT NULL DEFAULT 'text',
            create_time      INTEGER NOT NULL,
            fingerprint      TEXT NOT NULL,
            processed        INTEGER NOT NULL DEFAULT 0,
            delivery_status  INTEGER NOT NULL DEFAULT 0,
            delivery_time    INTEGER,
            platform_id      TEXT,
            reply_content    TEXT,
            reply_status     INTEGER NOT NULL DEFAULT 0,
            reply_time       INTEGER,
            retry_count      INTEGER NOT NULL DEFAULT 0,
            next_retry_at    INTEGER,
            last_error       TEXT,
            UNIQUE(instance_id, chat_name, fingerprint)
        );
        CREATE INDEX IF NOT EXISTS idx_messages_unprocessed
            ON messages(processed, create_time);
        CREATE INDEX IF NOT EXISTS idx_messages_chat
            ON messages(instance_id, chat_name, create_time);",
    )
}

fn create_platforms_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS platforms (
            platform_id TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            kind        TEXT NOT NULL,
            config      TEXT NOT NULL,
            enabled     INTEGER NOT NULL DEFAULT 1,
            created_at  INTEGER NOT NULL,
            updated_at  INTEGER NOT NULL
        );",
    )
}

fn create_rules_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS rules (
            rule_id             TEXT PRIMARY KEY,
            name                TEXT NOT NULL,
            instance_selector   TEXT NOT NULL DEFAULT '*',
            chat_pattern        TEXT NOT NULL,
            platform_id         TEXT NOT NULL,
            priority            INTEGER NOT NULL DEFAULT 0,
            enabled             INTEGER NOT NULL DEFAULT 1,
            only_at_messages    INTEGER NOT NULL DEFAULT 0,
            at_name             TEXT,
            reply_at_sender     INTEGER NOT NULL DEFAULT 0,
            created_at          INTEGER NOT NULL,
            updated_at          INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_rules_enabled
            ON rules(enabled, priority DESC);",
    )
}

fn create_fixed_listeners_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS fixed_listeners (
            id           TEXT PRIMARY KEY,
            session_name TEXT NOT NULL,
            enabled      INTEGER NOT NULL DEFAULT 1,
            description  TEXT
        );",
    )
}

fn create_accounting_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS accounting_records (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            platform_id      TEXT NOT NULL,
            message_ref      TEXT NOT NULL,
            description      TEXT NOT NULL,
            amount           REAL,
            category         TEXT,
            account_book_id  TEXT,
            success          INTEGER NOT NULL,
            error_message    TEXT,
            processing_time  INTEGER NOT NULL,
            create_time      INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_accounting_platform
            ON accounting_records(platform_id, create_time DESC);",
    )
}

fn create_config_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS bridge_config (
            key        TEXT PRIMARY KEY,
            value      TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        );",
    )
}
