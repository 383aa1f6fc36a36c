use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use sea_orm::{
    Database, DatabaseConnection, DbBackend, DbErr, ProxyDatabaseTrait, ProxyExecResult, ProxyRow,
    RuntimeErr, Statement,
};
use worker::send::SendFuture;
use worker::{Env, Method};

use crate::error::{AppError, AppResult};
use crate::libsql::{parse_pipeline, pipeline_body, pipeline_url, StmtResult};

use super::env::env_string;
use super::outbound::send;

/// SeaORM proxy backend that speaks libSQL's HTTP pipeline protocol through `Fetch`.
#[derive(Debug)]
struct LibsqlHttp {
    url: String,
    auth_token: Option<String>,
    /// Stream handle kept between statements while a transaction is open.
    baton: Mutex<Option<String>>,
    in_transaction: AtomicBool,
}

impl LibsqlHttp {
    async fn run(&self, stmt: Statement) -> Result<StmtResult, DbErr> {
        let keep_open = self.in_transaction.load(Ordering::SeqCst);
        let baton = self.baton.lock().ok().and_then(|mut b| b.take());
        let body = pipeline_body(&stmt, baton.as_deref(), !keep_open)?.to_string();

        let url = self.url.clone();
        let bearer = self.auth_token.as_ref().map(|t| format!("Bearer {t}"));
        let (status, text) = SendFuture::new(async move {
            let mut headers = vec![("Content-Type", "application/json")];
            if let Some(bearer) = bearer.as_deref() {
                headers.push(("Authorization", bearer));
            }
            send(Method::Post, &url, &headers, Some(body)).await
        })
        .await
        .map_err(|e| DbErr::Conn(RuntimeErr::Internal(e.to_string())))?;

        if !(200..=299).contains(&status) {
            return Err(DbErr::Conn(RuntimeErr::Internal(format!(
                "libsql answered {status}: {text}"
            ))));
        }
        let (next_baton, result) = parse_pipeline(&text)?;
        if keep_open {
            if let Ok(mut slot) = self.baton.lock() {
                *slot = next_baton;
            }
        }
        Ok(result)
    }

    async fn control(&self, sql: &str) {
        if let Err(e) = self.run(Statement::from_string(DbBackend::Sqlite, sql)).await {
            tracing::warn!(sql, "libsql transaction control failed: {e}");
        }
    }
}

#[async_trait::async_trait]
impl ProxyDatabaseTrait for LibsqlHttp {
    async fn query(&self, statement: Statement) -> Result<Vec<ProxyRow>, DbErr> {
        self.run(statement).await?.into_proxy_rows()
    }

    async fn execute(&self, statement: Statement) -> Result<ProxyExecResult, DbErr> {
        Ok(self.run(statement).await?.exec_result())
    }

    async fn begin(&self) {
        self.in_transaction.store(true, Ordering::SeqCst);
        self.control("BEGIN").await;
    }

    async fn commit(&self) {
        self.in_transaction.store(false, Ordering::SeqCst);
        self.control("COMMIT").await;
    }

    async fn rollback(&self) {
        self.in_transaction.store(false, Ordering::SeqCst);
        self.control("ROLLBACK").await;
    }
}

pub async fn db_connect(env: &Env) -> AppResult<DatabaseConnection> {
    let url = env_string(env, "LIBSQL_URL")
        .ok_or_else(|| AppError::Config("LIBSQL_URL is required for libsql connections".to_string()))?;

    let backend = LibsqlHttp {
        url: pipeline_url(&url)?,
        auth_token: env_string(env, "LIBSQL_AUTH_TOKEN"),
        baton: Mutex::new(None),
        in_transaction: AtomicBool::new(false),
    };
    let proxy: Box<dyn ProxyDatabaseTrait> = Box::new(backend);
    Ok(Database::connect_proxy(DbBackend::Sqlite, Arc::new(proxy)).await?)
}
