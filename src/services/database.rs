use crate::config::Config;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt::Debug;
use surrealdb::engine::any::{connect, Any};
use surrealdb::opt::auth::Root;
use surrealdb::{Response, Surreal};
use tracing::{debug, error, info};

/// 数据库服务
///
/// SurrealDB 封装：部署环境走 HTTP，本地和测试走内嵌 mem:// 引擎。
#[derive(Clone)]
pub struct Database {
    pub client: Surreal<Any>,
    pub config: Config,
}

impl Database {
    /// 创建新的数据库实例
    pub async fn new(config: &Config) -> Result<Self> {
        info!("Initializing database connection to {}", config.database_url);

        let client = connect(config.database_url.as_str()).await?;

        // 内嵌引擎没有根用户，只有远程连接需要认证
        if config.database_url.starts_with("http") || config.database_url.starts_with("ws") {
            client
                .signin(Root {
                    username: &config.database_username,
                    password: &config.database_password,
                })
                .await?;
        }

        client
            .use_ns(&config.database_namespace)
            .use_db(&config.database_name)
            .await?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// 验证数据库连接
    pub async fn verify_connection(&self) -> Result<()> {
        match self.client.query("INFO FOR DB").await {
            Ok(_) => {
                info!("Database connection verified successfully");
                Ok(())
            }
            Err(e) => {
                error!("Failed to verify database connection: {}", e);
                Err(AppError::from(e))
            }
        }
    }

    /// 初始化表结构
    ///
    /// 所有表都是 SCHEMALESS：文档形状由模型层约束。
    /// 待处理请求的唯一性约束在 request 服务的事务里强制（SurrealDB 1.x
    /// 不支持按条件过滤的唯一索引）。
    pub async fn define_schema(&self) -> Result<()> {
        let statements = r#"
            DEFINE TABLE donor SCHEMALESS;
            DEFINE TABLE request SCHEMALESS;
            DEFINE TABLE message SCHEMALESS;
            DEFINE INDEX request_status_idx ON TABLE request COLUMNS status;
        "#;

        self.client.query(statements).await?.check()?;
        debug!("Database schema defined");
        Ok(())
    }

    /// 执行原始SQL查询
    pub async fn query(&self, sql: &str) -> Result<Response> {
        self.client.query(sql).await.map_err(AppError::from)
    }

    /// 执行带参数的查询
    pub async fn query_with_params<P>(&self, sql: &str, params: P) -> Result<Response>
    where
        P: Serialize,
    {
        self.client
            .query(sql)
            .bind(params)
            .await
            .map_err(AppError::from)
    }

    /// 通过ID获取单个记录
    ///
    /// 接受 "table:id" 或裸 id 两种形式，查询时用 type::string(id)
    /// 规范化记录 ID，避免 Thing 反序列化的格式差异。
    pub async fn get_by_id<T>(&self, table: &str, id: &str) -> Result<Option<T>>
    where
        T: for<'de> Deserialize<'de> + Send + Sync + Debug,
    {
        let prefix = format!("{}:", table);
        let pure_id = id.strip_prefix(&prefix).unwrap_or(id);

        let mut response = self
            .query_with_params(
                "SELECT *, type::string(id) AS id FROM type::thing($table, $id)",
                json!({ "table": table, "id": pure_id }),
            )
            .await?;

        let results: Vec<T> = response.take(0)?;
        Ok(results.into_iter().next())
    }

    /// 取出多语句响应的全部错误，按语句顺序排列。
    ///
    /// 事务失败时 `check()` 先返回笼统的 QueryNotExecuted，THROW 的
    /// 原因只挂在抛出它的那条语句上，匹配原因必须遍历完整列表。
    pub fn statement_errors(response: &mut Response) -> Vec<surrealdb::Error> {
        let mut errors: Vec<(usize, surrealdb::Error)> =
            response.take_errors().into_iter().collect();
        errors.sort_by_key(|(index, _)| *index);
        errors.into_iter().map(|(_, error)| error).collect()
    }

    /// 统计表内记录数，可选过滤条件必须是常量 SQL 片段
    pub async fn count(&self, table: &str, filter: Option<&str>) -> Result<usize> {
        #[derive(Debug, Deserialize)]
        struct CountRow {
            count: usize,
        }

        let sql = match filter {
            Some(clause) => format!("SELECT count() AS count FROM {} WHERE {} GROUP ALL", table, clause),
            None => format!("SELECT count() AS count FROM {} GROUP ALL", table),
        };

        let mut response = self.query(&sql).await?;
        let rows: Vec<CountRow> = response.take(0)?;
        Ok(rows.into_iter().next().map(|row| row.count).unwrap_or(0))
    }
}
