use feza_database::now_rfc3339;
use sqlx::SqliteExecutor;

use crate::entities::{EntryReceipt, EntryReceiptInput};
use crate::PettyCashResult;

pub struct EntryReceiptRepository;

impl EntryReceiptRepository {
    pub async fn insert<'e>(
        executor: impl SqliteExecutor<'e>,
        transaction_id: i64,
        input: &EntryReceiptInput,
        uploaded_by: Option<i64>,
    ) -> PettyCashResult<i64> {
        let id = sqlx::query(
            "INSERT INTO petty_cash_receipts (transaction_id, file_name, content_type, file_size, \
             storage_path, uploaded_by, uploaded_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(transaction_id)
        .bind(input.file_name.trim())
        .bind(input.content_type.trim())
        .bind(input.file_size)
        .bind(input.storage_path.trim())
        .bind(uploaded_by)
        .bind(now_rfc3339())
        .execute(executor)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    pub async fn for_entry<'e>(
        executor: impl SqliteExecutor<'e>,
        transaction_id: i64,
    ) -> PettyCashResult<Vec<EntryReceipt>> {
        let receipts = sqlx::query_as::<_, EntryReceipt>(
            "SELECT id, file_name, content_type, file_size, storage_path, uploaded_by, uploaded_at \
             FROM petty_cash_receipts WHERE transaction_id = ? ORDER BY id",
        )
        .bind(transaction_id)
        .fetch_all(executor)
        .await?;
        Ok(receipts)
    }
}
