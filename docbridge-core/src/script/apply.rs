//! Script apply engine: sequential execution of parsed statements against a
//! document source.
//!
//! Execution order is a hard invariant. Later statements may depend on
//! earlier ones, so the first failure aborts the run — except recognized
//! idempotent conflicts (index or namespace already exists), which are
//! logged as warnings and treated as success.

use mongodb::bson::Document;

use crate::error::{DocBridgeError, Result};
use crate::logging::ProgressReporter;
use crate::script::statement::{Statement, parse_script};
use crate::source::DocumentSource;

/// Minimum advance, in percentage points, between insert progress reports.
const PROGRESS_STEP: u64 = 5;

/// Parses and applies a script, statement by statement.
pub async fn apply_script(
    script: &str,
    source: &dyn DocumentSource,
    progress: &dyn ProgressReporter,
) -> Result<()> {
    let statements = parse_script(script)?;
    let total_inserts = statements
        .iter()
        .filter(|statement| matches!(statement, Statement::Insert { .. }))
        .count() as u64;

    let mut current_db = String::new();
    let mut inserted: u64 = 0;
    let mut last_reported: u64 = 0;

    progress.progress("Applying script...", "", "");

    for statement in statements {
        match statement {
            Statement::UseDb(name) => {
                current_db = name;
            }
            Statement::CreateCollection(name) => {
                let context = format!("collection {name} not created");
                match source.create_collection(&current_db, &name).await {
                    Ok(()) => {
                        progress.progress("Collection created", &current_db, &name);
                    }
                    Err(error) if error.is_idempotent_conflict() => {
                        tracing::warn!(collection = %name, "collection already exists, skipping");
                    }
                    Err(error) => {
                        return Err(DocBridgeError::statement_failed(context, error));
                    }
                }
            }
            Statement::CreateIndex {
                collection,
                keys,
                options,
            } => {
                let index_name = index_display_name(&options);
                let context = format!("index {index_name} not created");
                match source
                    .create_index(&current_db, &collection, keys, options)
                    .await
                {
                    Ok(()) => {
                        progress.progress(
                            &format!("index {index_name} created"),
                            &current_db,
                            &collection,
                        );
                    }
                    Err(error) if error.is_idempotent_conflict() => {
                        tracing::warn!(
                            collection = %collection,
                            index = %index_name,
                            "index already exists, skipping"
                        );
                    }
                    Err(error) => {
                        return Err(DocBridgeError::statement_failed(context, error));
                    }
                }
            }
            Statement::Insert {
                collection,
                document,
            } => {
                let context = format!("sample for {collection} is not inserted");
                source
                    .insert_one(&current_db, &collection, document)
                    .await
                    .map_err(|error| DocBridgeError::statement_failed(context, error))?;

                inserted += 1;
                let percent = inserted * 100 / total_inserts.max(1);
                if percent >= last_reported + PROGRESS_STEP || inserted == total_inserts {
                    last_reported = percent;
                    progress.progress(
                        &format!("Inserted {inserted} of {total_inserts} documents"),
                        &current_db,
                        &collection,
                    );
                }
            }
            Statement::RunCommand(command) => {
                match source.run_command(&current_db, command).await {
                    Ok(_) => {
                        progress.progress("Command applied", &current_db, "");
                    }
                    Err(error) if error.is_idempotent_conflict() => {
                        tracing::warn!("command target already exists, skipping");
                    }
                    Err(error) => {
                        return Err(DocBridgeError::statement_failed(
                            "command failed".to_string(),
                            error,
                        ));
                    }
                }
            }
        }
    }

    progress.progress("Script applied", "", "");
    Ok(())
}

/// The name used when reporting on one index: "unique" for unique indexes,
/// otherwise the declared name.
fn index_display_name(options: &Document) -> String {
    if options.get_bool("unique").unwrap_or(false) {
        return "unique".to_string();
    }
    options.get_str("name").unwrap_or("").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{SampleOptions, SourceError};
    use async_trait::async_trait;
    use mongodb::bson::doc;
    use std::result::Result;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemorySource {
        collections: Mutex<Vec<(String, String)>>,
        indexes: Mutex<Vec<(String, Document, Document)>>,
        inserted: Mutex<Vec<(String, Document)>>,
        commands: Mutex<Vec<Document>>,
        conflict_on_index: bool,
        fail_on_insert: bool,
    }

    #[async_trait]
    impl DocumentSource for MemorySource {
        async fn list_databases(&self) -> Result<Vec<String>, SourceError> {
            Ok(vec![])
        }

        async fn list_collections(&self, _db: &str) -> Result<Vec<String>, SourceError> {
            Ok(vec![])
        }

        async fn count(&self, _db: &str, _collection: &str) -> Result<u64, SourceError> {
            Ok(0)
        }

        async fn sample_random(
            &self,
            _db: &str,
            _collection: &str,
            _options: &SampleOptions,
        ) -> Result<Vec<Document>, SourceError> {
            Ok(vec![])
        }

        async fn find_one(
            &self,
            _db: &str,
            _collection: &str,
            _query: Document,
        ) -> Result<Option<Document>, SourceError> {
            Ok(None)
        }

        async fn list_indexes(
            &self,
            _db: &str,
            _collection: &str,
        ) -> Result<Vec<Document>, SourceError> {
            Ok(vec![])
        }

        async fn create_collection(
            &self,
            db: &str,
            collection: &str,
        ) -> Result<(), SourceError> {
            self.collections
                .lock()
                .unwrap()
                .push((db.to_string(), collection.to_string()));
            Ok(())
        }

        async fn create_index(
            &self,
            _db: &str,
            collection: &str,
            keys: Document,
            options: Document,
        ) -> Result<(), SourceError> {
            if self.conflict_on_index {
                return Err(SourceError::AlreadyExists(format!("index on {collection}")));
            }
            self.indexes
                .lock()
                .unwrap()
                .push((collection.to_string(), keys, options));
            Ok(())
        }

        async fn insert_one(
            &self,
            _db: &str,
            collection: &str,
            document: Document,
        ) -> Result<(), SourceError> {
            if self.fail_on_insert {
                return Err(SourceError::Query("write refused".to_string()));
            }
            self.inserted
                .lock()
                .unwrap()
                .push((collection.to_string(), document));
            Ok(())
        }

        async fn run_command(
            &self,
            _db: &str,
            command: Document,
        ) -> Result<Document, SourceError> {
            self.commands.lock().unwrap().push(command);
            Ok(doc! { "ok": 1 })
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        messages: Mutex<Vec<String>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn progress(&self, message: &str, _container: &str, _entity: &str) {
            self.messages.lock().unwrap().push(message.to_string());
        }
    }

    const SCRIPT: &str = concat!(
        "use admin;\n\n",
        "db.runCommand({ \"shardCollection\": \"shop.orders\", \"key\": { \"tenantId\": \"hashed\" } });\n\n",
        "use shop;\n\n",
        "db.createCollection(\"orders\");\n\n",
        "db.getCollection(\"orders\").createIndex({\n  \"tenantId\": 1,\n  \"email\": 1\n}, {\n  \"unique\": true\n});\n\n",
        "db.getCollection(\"orders\").insert({\n  \"total\": 3\n});",
    );

    #[tokio::test]
    async fn test_statements_execute_in_order_against_selected_db() {
        let source = MemorySource::default();
        let progress = RecordingProgress::default();

        apply_script(SCRIPT, &source, &progress).await.unwrap();

        assert_eq!(
            source.collections.lock().unwrap().as_slice(),
            &[("shop".to_string(), "orders".to_string())]
        );
        assert_eq!(source.indexes.lock().unwrap().len(), 1);
        assert_eq!(source.inserted.lock().unwrap().len(), 1);
        assert_eq!(source.commands.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_idempotent_conflict_is_tolerated() {
        let source = MemorySource {
            conflict_on_index: true,
            ..MemorySource::default()
        };
        let progress = RecordingProgress::default();

        apply_script(SCRIPT, &source, &progress).await.unwrap();

        // The insert after the conflicting index still ran
        assert_eq!(source.inserted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_statement_error_aborts_and_names_the_document() {
        let source = MemorySource {
            fail_on_insert: true,
            ..MemorySource::default()
        };
        let progress = RecordingProgress::default();

        let error = apply_script(SCRIPT, &source, &progress).await.unwrap_err();
        assert!(error.to_string().contains("sample for orders is not inserted"));
    }

    #[tokio::test]
    async fn test_insert_progress_is_rate_limited() {
        let source = MemorySource::default();
        let progress = RecordingProgress::default();

        let inserts: Vec<String> = (0..100)
            .map(|i| format!("db.getCollection(\"orders\").insert({{\n  \"n\": {i}\n}});"))
            .collect();
        let script = format!("use shop;\n\n{}", inserts.join("\n\n"));

        apply_script(&script, &source, &progress).await.unwrap();

        let messages = progress.messages.lock().unwrap();
        let insert_reports = messages
            .iter()
            .filter(|message| message.starts_with("Inserted"))
            .count();

        // 100 inserts at 5-point steps: 20 reports, not 100
        assert_eq!(insert_reports, 20);
        assert!(messages.iter().any(|m| m == "Inserted 100 of 100 documents"));
    }

    #[tokio::test]
    async fn test_index_name_reporting() {
        let source = MemorySource::default();
        let progress = RecordingProgress::default();

        let script = concat!(
            "use shop;\n\n",
            "db.getCollection(\"orders\").createIndex({\n  \"a\": 1\n}, {\n  \"name\": \"by_a\"\n});",
        );
        apply_script(script, &source, &progress).await.unwrap();

        let messages = progress.messages.lock().unwrap();
        assert!(messages.iter().any(|m| m == "index by_a created"));
    }
}
