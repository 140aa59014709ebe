use std::{fs, path::PathBuf, sync::Arc};

use log::{debug, info, warn};

use crate::{
    config::Config,
    executor::{
        create_table::{CreateTableHandler, DropTableHandler},
        delete::DeleteHandler,
        insert::InsertHandler,
        query::{Query, QueryResult, QueryType, WhereClause},
        select::SelectHandler,
        transaction::{ShowTablesHandler, TransactionHandler},
    },
    storage::{
        catalog::Catalog,
        table_store::TableStore,
        transaction::TransactionManager,
        wal::{RecoveryResult, WriteAheadLog},
    },
    types::{RecordIndex, TransactionId, error::DatabaseError},
};

/// Handles one family of query types.
pub trait QueryHandler {
    fn can_handle(&self, query_type: QueryType) -> bool;
    fn handle(&self, query: &Query, ctx: &mut ExecutionContext) -> Result<QueryResult, DatabaseError>;
}

/// Everything a handler needs to run a query against one database.
pub struct ExecutionContext {
    pub config: Config,
    pub store: TableStore,
    pub catalog: Catalog,
    pub wal: Arc<WriteAheadLog>,
    pub transactions: TransactionManager,
}

impl ExecutionContext {
    pub fn table_name<'q>(&self, query: &'q Query) -> Result<&'q str, DatabaseError> {
        query
            .table_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| DatabaseError::InvalidQuery {
                details: "table name is required".to_string(),
            })
    }

    /// Path to read and write `table_name` through: the shadow during a
    /// transaction, the primary otherwise.
    pub fn require_table(&self, table_name: &str) -> Result<PathBuf, DatabaseError> {
        let primary = self.config.table_path(table_name);
        if !self.catalog.is_table_exists(&primary)? {
            return Err(DatabaseError::TableNotFound {
                name: table_name.to_string(),
            });
        }
        Ok(self.transactions.get_actual_table_path(table_name))
    }

    pub fn transaction_id(&self) -> Option<String> {
        self.transactions.transaction_id().map(str::to_string)
    }

    /// Record indices matching `where_clause`, ascending. Every record when
    /// there is no clause.
    pub fn matching_indices(
        &self,
        path: &std::path::Path,
        where_clause: Option<&WhereClause>,
    ) -> Result<Vec<RecordIndex>, DatabaseError> {
        match where_clause {
            None => Ok(self.store.get_all_record_indices(path)?.collect()),
            Some(WhereClause::Constant {
                column,
                operator,
                value,
            }) => self
                .store
                .find_records_by_constant(path, *column, operator, value),
            Some(WhereClause::Columns {
                left,
                operator,
                right,
            }) => self
                .store
                .find_records_by_condition(path, *left, operator, *right),
            Some(WhereClause::Pattern {
                column,
                pattern,
                case_sensitive,
            }) => self
                .store
                .find_records_by_pattern(path, *column, pattern, *case_sensitive),
        }
    }
}

/// What `QueryExecutor::open` found and repaired.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecoveryReport {
    pub recovery: RecoveryResult,
    /// Unfinished transactions that were rolled back.
    pub rolled_back: Vec<TransactionId>,
    /// Tables whose leftover shadow copy was discarded.
    pub discarded_shadows: Vec<String>,
    /// Tables whose interrupted commit was completed.
    pub completed_commits: Vec<String>,
}

/// Engine facade: owns the catalog, the log and the transaction state of
/// one database directory and dispatches queries to handlers.
pub struct QueryExecutor {
    ctx: ExecutionContext,
    handlers: Vec<Box<dyn QueryHandler>>,
    recovery_report: RecoveryReport,
}

impl QueryExecutor {
    /// Open (or create) the database under `config.data_dir` and recover
    /// from whatever a previous process left behind.
    pub fn open(config: Config) -> Result<Self, DatabaseError> {
        fs::create_dir_all(&config.data_dir)
            .map_err(|e| DatabaseError::from_io(e, &config.data_dir))?;

        let catalog = Catalog::open_or_create(&config.catalog_path(), &config.database_name)?;
        let wal = Arc::new(WriteAheadLog::open_with_backup(
            &config.log_path(),
            &config.log_backup_path(),
        )?);
        let store = TableStore::with_page_size(config.page_size);
        let transactions = TransactionManager::new(config.clone(), store.clone(), Arc::clone(&wal));

        let ctx = ExecutionContext {
            config,
            store,
            catalog,
            wal,
            transactions,
        };
        let recovery_report = Self::recover(&ctx)?;

        info!("Opened database at {}", ctx.config.data_dir.display());
        Ok(Self {
            ctx,
            handlers: vec![
                Box::new(CreateTableHandler),
                Box::new(DropTableHandler),
                Box::new(InsertHandler),
                Box::new(SelectHandler),
                Box::new(DeleteHandler),
                Box::new(TransactionHandler),
                Box::new(ShowTablesHandler),
            ],
            recovery_report,
        })
    }

    fn recover(ctx: &ExecutionContext) -> Result<RecoveryReport, DatabaseError> {
        let recovery = ctx.wal.recover()?;
        let mut report = RecoveryReport::default();

        if recovery.unfinished.is_empty() {
            report.completed_commits = ctx.transactions.complete_interrupted_commit(&ctx.catalog)?;
            if !report.completed_commits.is_empty() {
                warn!(
                    "Completed an interrupted commit for tables {:?}",
                    report.completed_commits
                );
            }
        } else {
            report.discarded_shadows = ctx.transactions.discard_leftover_shadows(&ctx.catalog)?;
            for id in recovery.unfinished.keys() {
                ctx.wal.log_rollback_transaction(id)?;
                warn!("Rolled back unfinished transaction {}", id);
                report.rolled_back.push(id.clone());
            }
        }

        report.recovery = recovery;
        Ok(report)
    }

    pub fn recovery_report(&self) -> &RecoveryReport {
        &self.recovery_report
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut ExecutionContext {
        &mut self.ctx
    }

    /// Run a query. Failures come back as an unsuccessful result.
    pub fn execute(&mut self, query: &Query) -> QueryResult {
        match self.try_execute(query) {
            Ok(result) => result,
            Err(e) => {
                debug!("{:?} failed: {}", query.query_type, e);
                QueryResult::error(e.to_string())
            }
        }
    }

    pub fn try_execute(&mut self, query: &Query) -> Result<QueryResult, DatabaseError> {
        let handler = self
            .handlers
            .iter()
            .find(|h| h.can_handle(query.query_type))
            .ok_or_else(|| DatabaseError::InvalidQuery {
                details: format!("no handler for {:?}", query.query_type),
            })?;
        handler.handle(query, &mut self.ctx)
    }
}
