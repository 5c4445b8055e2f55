use crate::error::Result;
use crate::models::{AccountingRecord, NewAccountingRecord};
use crate::Store;
use rusqlite::{params, Row};
use wxbridge_core::PlatformId;

fn row_to_record(row: &Row) -> rusqlite::Result<AccountingRecord> {
    Ok(AccountingRecord {
        id: row.get(0)?,
        platform_id: PlatformId::from(row.get::<_, String>(1)?),
        message_ref: row.get(2)?,
        description: row.get(3)?,
        amount: row.get(4)?,
        category: row.get(5)?,
        account_book_id: row.get(6)?,
        success: row.get::<_, i64>(7)? != 0,
        error_message: row.get(8)?,
        processing_time: row.get(9)?,
        create_time: row.get(10)?,
    })
}

const SELECT_COLUMNS: &str = "id, platform_id, message_ref, description, amount, category, \
     account_book_id, success, error_message, processing_time, create_time";

impl Store {
    /// Append-only: bookkeeping platform records are written regardless of
    /// outcome, success or failure.
    pub fn append_accounting_record(&self, record: &NewAccountingRecord) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO accounting_records
                (platform_id, message_ref, description, amount, category, account_book_id,
                 success, error_message, processing_time, create_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.platform_id.as_str(),
                record.message_ref,
                record.description,
                record.amount,
                record.category,
                record.account_book_id,
                record.success as i64,
                record.error_message,
                record.processing_time,
                record.create_time,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list_accounting_records(&self, platform_id: &PlatformId, limit: u32) -> Result<Vec<AccountingRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM accounting_records
             WHERE platform_id = ?1 ORDER BY create_time DESC LIMIT ?2"
        ))?;
        let rows = stmt
            .query_map(params![platform_id.as_str(), limit], row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}
