//! MySQL gateway.
//!
//! One `Gateway` per configured database. Connections are built on demand;
//! the build is strictly serial so there is no pooling.

use anyhow::{anyhow, bail, Context, Result};
use mysql::prelude::Queryable;
use mysql::{Conn, OptsBuilder};

use crate::config::DbConfig;
use crate::db::{script, SqlRunner};

pub struct Gateway {
    cfg: DbConfig,
}

impl Gateway {
    pub fn new(cfg: &DbConfig) -> Self {
        Self { cfg: cfg.clone() }
    }

    pub fn db_name(&self) -> &str {
        &self.cfg.name
    }

    fn opts(&self, with_db: bool) -> OptsBuilder {
        let mut builder = OptsBuilder::new()
            .ip_or_hostname(Some(self.cfg.host.clone()))
            .tcp_port(self.cfg.port)
            .user(Some(self.cfg.user.clone()))
            .pass(Some(self.cfg.password.clone()));
        if with_db {
            builder = builder.db_name(Some(self.cfg.name.clone()));
        }
        builder
    }

    /// Connect to the configured database.
    pub fn connect(&self) -> Result<Conn> {
        Conn::new(self.opts(true)).with_context(|| {
            format!(
                "Cannot connect to database '{}' at {}:{}",
                self.cfg.name, self.cfg.host, self.cfg.port
            )
        })
    }

    /// Connect to the server without selecting a database.
    fn connect_serverwide(&self) -> Result<Conn> {
        Conn::new(self.opts(false)).with_context(|| {
            format!(
                "Cannot connect to store at {}:{}",
                self.cfg.host, self.cfg.port
            )
        })
    }

    /// `CREATE DATABASE IF NOT EXISTS` with UTF-8 collation.
    pub fn create_database(&self) -> Result<()> {
        let mut conn = self.connect_serverwide()?;
        conn.query_drop(format!(
            "CREATE DATABASE IF NOT EXISTS `{}` CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci",
            self.cfg.name
        ))
        .with_context(|| format!("Cannot create database '{}'", self.cfg.name))?;
        Ok(())
    }

    /// Execute a multi-statement script, one statement at a time.
    ///
    /// Returns the number of statements executed. A failing statement aborts
    /// the script and is reported truncated to 200 characters.
    pub fn execute_script(&self, sql_text: &str) -> Result<usize> {
        let statements = script::split_statements(sql_text);
        if statements.is_empty() {
            return Ok(0);
        }

        let mut conn = self.connect()?;
        for stmt in &statements {
            conn.query_drop(stmt).map_err(|e| {
                anyhow!(
                    "SQL statement failed on '{}': {}\n  statement: {}",
                    self.cfg.name,
                    e,
                    script::truncate_statement(stmt)
                )
            })?;
        }
        Ok(statements.len())
    }

    /// The store's native table checksum (`CHECKSUM TABLE`).
    pub fn checksum_table(&self, table: &str) -> Result<u64> {
        let mut conn = self.connect()?;
        let row: Option<(String, Option<u64>)> = conn
            .query_first(format!("CHECKSUM TABLE `{}`", table))
            .with_context(|| format!("CHECKSUM TABLE `{}` failed on '{}'", table, self.cfg.name))?;
        match row {
            Some((_, Some(checksum))) => Ok(checksum),
            Some((_, None)) => bail!("Table `{}` does not exist on '{}'", table, self.cfg.name),
            None => bail!("CHECKSUM TABLE `{}` returned no row", table),
        }
    }

    /// Whether a table exists in the configured database.
    pub fn table_exists(&self, table: &str) -> Result<bool> {
        let mut conn = self.connect()?;
        let count: Option<u64> = conn
            .exec_first(
                "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_schema = ? AND table_name = ?",
                (self.cfg.name.as_str(), table),
            )
            .context("Cannot query information_schema")?;
        Ok(count.unwrap_or(0) > 0)
    }
}

impl SqlRunner for Gateway {
    fn run_script(&mut self, sql_text: &str) -> Result<()> {
        self.execute_script(sql_text).map(|_| ())
    }
}
