pub mod escape;
pub mod mysqldump;
pub mod source;
pub mod table;

use chrono::{DateTime, Local};
use log::info;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::dump::source::DumpSource;
use crate::dump::table::dump_table;
use crate::error::BackupError;

/// Streams a full dump of the database into `sink`: header first, then one
/// table section per table in enumeration order. Covers base tables only;
/// views, triggers and routines are left to the external tool.
pub async fn dump_database<W>(
    source: &dyn DumpSource,
    db_name: &str,
    generated_at: DateTime<Local>,
    sink: &mut W,
    cancel: &CancellationToken,
) -> Result<(), BackupError>
where
    W: AsyncWrite + Unpin + Send,
{
    let header = format!(
        "-- easydb-backup\n\
         -- Database: {}\n\
         -- Date: {}\n\
         \n\
         SET SQL_MODE = \"NO_AUTO_VALUE_ON_ZERO\";\n\
         SET time_zone = \"+00:00\";\n\
         \n",
        db_name,
        generated_at.format("%Y-%m-%d %H:%M:%S"),
    );
    sink.write_all(header.as_bytes())
        .await
        .map_err(BackupError::StorageWriteFailed)?;

    let tables = source
        .list_tables()
        .await
        .map_err(BackupError::EnumerationFailed)?;
    info!("Dumping {} tables from {}", tables.len(), db_name);

    for table in &tables {
        if cancel.is_cancelled() {
            return Err(BackupError::Cancelled);
        }
        dump_table(source, table, sink).await?;
    }

    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use super::source::DumpRow;

    /// In-memory stand-in for a live database.
    pub(crate) struct FakeSource {
        pub tables: Vec<(String, String, Vec<DumpRow>)>,
        pub fail_enumeration: bool,
        pub fail_rows_for: Option<String>,
    }

    impl FakeSource {
        pub fn new(tables: Vec<(String, String, Vec<DumpRow>)>) -> FakeSource {
            FakeSource {
                tables,
                fail_enumeration: false,
                fail_rows_for: None,
            }
        }
    }

    #[async_trait]
    impl DumpSource for FakeSource {
        async fn list_tables(&self) -> Result<Vec<String>, sqlx::Error> {
            if self.fail_enumeration {
                return Err(sqlx::Error::Protocol("enumeration refused".into()));
            }
            Ok(self.tables.iter().map(|(name, _, _)| name.clone()).collect())
        }

        async fn create_statement(&self, table: &str) -> Result<String, sqlx::Error> {
            self.tables
                .iter()
                .find(|(name, _, _)| name == table)
                .map(|(_, create, _)| create.clone())
                .ok_or(sqlx::Error::RowNotFound)
        }

        async fn table_rows(&self, table: &str) -> Result<Vec<DumpRow>, sqlx::Error> {
            if self.fail_rows_for.as_deref() == Some(table) {
                return Err(sqlx::Error::Protocol("read refused".into()));
            }
            self.tables
                .iter()
                .find(|(name, _, _)| name == table)
                .map(|(_, _, rows)| rows.clone())
                .ok_or(sqlx::Error::RowNotFound)
        }
    }

    fn row(values: &[Option<&str>]) -> DumpRow {
        values
            .iter()
            .map(|v| v.map(|s| s.as_bytes().to_vec()))
            .collect()
    }

    pub(crate) fn two_table_source() -> FakeSource {
        FakeSource::new(vec![
            (
                "users".to_string(),
                "CREATE TABLE `users` (`id` int, `name` text)".to_string(),
                vec![row(&[Some("1"), Some("alice")]), row(&[Some("2"), None])],
            ),
            (
                "posts".to_string(),
                "CREATE TABLE `posts` (`id` int, `body` text)".to_string(),
                vec![
                    row(&[Some("1"), Some("it's fine")]),
                    row(&[Some("2"), Some("a\\b")]),
                ],
            ),
        ])
    }

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 17, 10, 30, 0).unwrap()
    }

    async fn dump_to_string(source: &FakeSource) -> Result<String, BackupError> {
        let mut sink = Vec::new();
        dump_database(source, "mydb", fixed_time(), &mut sink, &CancellationToken::new()).await?;
        Ok(String::from_utf8(sink).unwrap())
    }

    #[tokio::test]
    async fn test_document_header() {
        let doc = dump_to_string(&FakeSource::new(vec![])).await.unwrap();
        assert!(doc.starts_with("-- easydb-backup\n-- Database: mydb\n-- Date: 2024-05-17 10:30:00\n"));
        assert!(doc.contains("SET SQL_MODE = \"NO_AUTO_VALUE_ON_ZERO\";\n"));
        assert!(doc.contains("SET time_zone = \"+00:00\";\n"));
    }

    #[tokio::test]
    async fn test_sections_ordered_and_not_interleaved() {
        let doc = dump_to_string(&two_table_source()).await.unwrap();

        let positions = [
            doc.find("-- Database: mydb").unwrap(),
            doc.find("DROP TABLE IF EXISTS `users`;").unwrap(),
            doc.find("CREATE TABLE `users`").unwrap(),
            doc.find("INSERT INTO `users` VALUES ('1','alice');").unwrap(),
            doc.find("INSERT INTO `users` VALUES ('2',NULL);").unwrap(),
            doc.find("DROP TABLE IF EXISTS `posts`;").unwrap(),
            doc.find("CREATE TABLE `posts`").unwrap(),
            doc.find("INSERT INTO `posts` VALUES ('1','it\\'s fine');").unwrap(),
            doc.find("INSERT INTO `posts` VALUES ('2','a\\\\b');").unwrap(),
        ];
        for pair in positions.windows(2) {
            assert!(pair[0] < pair[1], "sections out of order: {}", doc);
        }
        assert_eq!(doc.matches("INSERT INTO").count(), 4);
    }

    #[tokio::test]
    async fn test_empty_table_emits_structure_only() {
        let source = FakeSource::new(vec![(
            "empty".to_string(),
            "CREATE TABLE `empty` (`id` int)".to_string(),
            vec![],
        )]);
        let doc = dump_to_string(&source).await.unwrap();
        assert!(doc.contains("DROP TABLE IF EXISTS `empty`;"));
        assert!(doc.contains("CREATE TABLE `empty`"));
        assert!(!doc.contains("INSERT INTO"));
    }

    #[tokio::test]
    async fn test_enumeration_failure() {
        let mut source = FakeSource::new(vec![]);
        source.fail_enumeration = true;
        let err = dump_to_string(&source).await.unwrap_err();
        assert!(matches!(err, BackupError::EnumerationFailed(_)));
    }

    #[tokio::test]
    async fn test_table_read_failure_names_the_table() {
        let mut source = two_table_source();
        source.fail_rows_for = Some("posts".to_string());
        let err = dump_to_string(&source).await.unwrap_err();
        match err {
            BackupError::TableReadFailed { table, .. } => assert_eq!(table, "posts"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancellation_stops_the_dump() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut sink = Vec::new();
        let err = dump_database(&two_table_source(), "mydb", fixed_time(), &mut sink, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, BackupError::Cancelled));
    }
}
