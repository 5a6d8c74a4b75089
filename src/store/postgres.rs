use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{anyhow, Context, Result};
use log::debug;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::{Column, PgPool, Row};

use crate::config::DatabaseConfig;
use crate::logic::{ColumnSplit, DesignAtVersionQuery, Projection};
use crate::model::{
    Design, DesignAction, DesignAtVersion, DesignEvent, DesignFilter, DesignId, Issue, IssueId,
    Version, VersionId,
};
use crate::store::traits::{
    DesignAtVersionStore, DesignStore, IssueStore, VersionSnapshotStore, VersionStore,
};

const DESIGN_SELECT: &str =
    "SELECT d.id, d.project_id, d.issue_id, d.filename FROM design_management_designs d";
const VERSION_SELECT: &str =
    "SELECT v.id, v.issue_id, v.sha, v.author_id, v.created_at FROM design_management_versions v";

/// A design is visible at a version when some action on it was recorded at
/// or before that version and none of those actions is a deletion.
const VISIBLE_DESIGNS_SQL: &str = r#"
    SELECT d.id, d.project_id, d.issue_id, d.filename
    FROM design_management_designs d
    WHERE d.issue_id = $1
      AND EXISTS (
          SELECT 1 FROM design_management_designs_versions a
          WHERE a.design_id = d.id AND a.version_id <= $2
      )
      AND NOT EXISTS (
          SELECT 1 FROM design_management_designs_versions a
          WHERE a.design_id = d.id AND a.version_id <= $2 AND a.event = $3
      )
      AND (cardinality($4::bigint[]) = 0 OR d.id = ANY($4))
      AND (cardinality($5::text[]) = 0 OR d.filename = ANY($5))
    ORDER BY d.id
"#;

const DESIGNS_CHANGED_IN_SQL: &str = r#"
    SELECT d.id, d.project_id, d.issue_id, d.filename
    FROM design_management_designs d
    INNER JOIN design_management_designs_versions a ON a.design_id = d.id
    WHERE a.version_id = $1 AND d.issue_id = $2
    ORDER BY d.id
"#;

const DESIGNS_BY_REFERENCE_SQL: &str = r#"
    WITH refs (issue_id, filename) AS (
        SELECT * FROM UNNEST($1::bigint[], $2::text[])
    )
    SELECT d.id, d.project_id, d.issue_id, d.filename
    FROM design_management_designs d
    INNER JOIN refs ON refs.issue_id = d.issue_id AND refs.filename = d.filename
    ORDER BY d.id
"#;

#[derive(Debug)]
pub struct PostgresStore {
    pool: PgPool,
    queries: AtomicUsize,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str) -> Result<Self> {
        Self::connect(database_url, &DatabaseConfig::default()).await
    }

    /// Connect using pool size and statement timeout from configuration
    pub async fn connect(database_url: &str, config: &DatabaseConfig) -> Result<Self> {
        let mut options: PgConnectOptions = database_url
            .parse()
            .context("Invalid PostgreSQL connection string")?;

        if let Some(timeout_ms) = config.statement_timeout_ms {
            options = options.options([("statement_timeout", timeout_ms.to_string())]);
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections.unwrap_or(20))
            .connect_with(options)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            queries: AtomicUsize::new(0),
        }
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Round trips made through this store
    pub fn queries_executed(&self) -> usize {
        self.queries.load(Ordering::Relaxed)
    }

    fn record(&self, kind: &str, rows: usize) {
        self.queries.fetch_add(1, Ordering::Relaxed);
        debug!("{} returned {} row(s)", kind, rows);
    }
}

fn design_from_row(row: &PgRow) -> Result<Design> {
    Ok(Design {
        id: row.try_get("id")?,
        project_id: row.try_get("project_id")?,
        issue_id: row.try_get("issue_id")?,
        filename: row.try_get("filename")?,
    })
}

fn version_from_row(row: &PgRow) -> Result<Version> {
    Ok(Version {
        id: row.try_get("id")?,
        issue_id: row.try_get("issue_id")?,
        sha: row.try_get("sha")?,
        author_id: row.try_get("author_id")?,
        created_at: row.try_get("created_at")?,
    })
}

fn action_from_row(row: &PgRow) -> Result<DesignAction> {
    let code: i16 = row.try_get("event")?;
    let event = DesignEvent::from_i16(code)
        .ok_or_else(|| anyhow!("Unknown design event code {}", code))?;
    Ok(DesignAction::new(
        row.try_get("design_id")?,
        row.try_get("version_id")?,
        event,
    ))
}

/// Rebuild both halves of a joined row without another round trip
fn design_at_version_from_row(row: &PgRow, split: &ColumnSplit) -> Result<DesignAtVersion> {
    let d = |name: &str| {
        split
            .design_index(name)
            .ok_or_else(|| anyhow!("Joined row has no design column '{}'", name))
    };
    let v = |name: &str| {
        split
            .version_index(name)
            .ok_or_else(|| anyhow!("Joined row has no version column '{}'", name))
    };

    let design = Design {
        id: row.try_get(d("id")?)?,
        project_id: row.try_get(d("project_id")?)?,
        issue_id: row.try_get(d("issue_id")?)?,
        filename: row.try_get(d("filename")?)?,
    };
    let version = Version {
        id: row.try_get(v("id")?)?,
        issue_id: row.try_get(v("issue_id")?)?,
        sha: row.try_get(v("sha")?)?,
        author_id: row.try_get(v("author_id")?)?,
        created_at: row.try_get(v("created_at")?)?,
    };

    DesignAtVersion::new(design, version).map_err(anyhow::Error::from)
}

#[async_trait::async_trait]
impl IssueStore for PostgresStore {
    async fn find_issue(&self, id: IssueId) -> Result<Option<Issue>> {
        let row = sqlx::query("SELECT id, project_id, iid, title FROM issues WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch issue")?;
        self.record("find_issue", row.iter().len());

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(Issue {
            id: row.try_get("id")?,
            project_id: row.try_get("project_id")?,
            iid: row.try_get("iid")?,
            title: row.try_get("title")?,
        }))
    }
}

#[async_trait::async_trait]
impl DesignStore for PostgresStore {
    async fn find_design(&self, issue_id: IssueId, id: DesignId) -> Result<Option<Design>> {
        let sql = format!("{} WHERE d.issue_id = $1 AND d.id = $2", DESIGN_SELECT);
        let row = sqlx::query(&sql)
            .bind(issue_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch design")?;
        self.record("find_design", row.iter().len());

        row.as_ref().map(design_from_row).transpose()
    }

    async fn find_design_by_filename(
        &self,
        issue_id: IssueId,
        filename: &str,
    ) -> Result<Option<Design>> {
        let sql = format!("{} WHERE d.issue_id = $1 AND d.filename = $2", DESIGN_SELECT);
        let row = sqlx::query(&sql)
            .bind(issue_id)
            .bind(filename)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch design by filename")?;
        self.record("find_design_by_filename", row.iter().len());

        row.as_ref().map(design_from_row).transpose()
    }

    async fn designs_for_issue(&self, issue_id: IssueId) -> Result<Vec<Design>> {
        let sql = format!("{} WHERE d.issue_id = $1 ORDER BY d.id", DESIGN_SELECT);
        let rows = sqlx::query(&sql)
            .bind(issue_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list designs for issue")?;
        self.record("designs_for_issue", rows.len());

        rows.iter().map(design_from_row).collect()
    }

    async fn find_designs_by_reference(
        &self,
        references: &[(IssueId, String)],
    ) -> Result<Vec<Design>> {
        if references.is_empty() {
            return Ok(Vec::new());
        }

        let (issue_ids, filenames): (Vec<i64>, Vec<String>) = references.iter().cloned().unzip();
        let rows = sqlx::query(DESIGNS_BY_REFERENCE_SQL)
            .bind(issue_ids)
            .bind(filenames)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch designs by reference")?;
        self.record("find_designs_by_reference", rows.len());

        rows.iter().map(design_from_row).collect()
    }
}

#[async_trait::async_trait]
impl VersionStore for PostgresStore {
    async fn find_version(&self, id: VersionId) -> Result<Option<Version>> {
        let sql = format!("{} WHERE v.id = $1", VERSION_SELECT);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch version")?;
        self.record("find_version", row.iter().len());

        row.as_ref().map(version_from_row).transpose()
    }

    async fn versions_for_issue(&self, issue_id: IssueId) -> Result<Vec<Version>> {
        let sql = format!("{} WHERE v.issue_id = $1 ORDER BY v.id DESC", VERSION_SELECT);
        let rows = sqlx::query(&sql)
            .bind(issue_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list versions for issue")?;
        self.record("versions_for_issue", rows.len());

        rows.iter().map(version_from_row).collect()
    }

    async fn find_version_by_sha(&self, issue_id: IssueId, sha: &str) -> Result<Option<Version>> {
        let sql = format!("{} WHERE v.issue_id = $1 AND v.sha = $2", VERSION_SELECT);
        let row = sqlx::query(&sql)
            .bind(issue_id)
            .bind(sha)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch version by sha")?;
        self.record("find_version_by_sha", row.iter().len());

        row.as_ref().map(version_from_row).transpose()
    }

    async fn actions_for_version(&self, version_id: VersionId) -> Result<Vec<DesignAction>> {
        let rows = sqlx::query(
            "SELECT design_id, version_id, event FROM design_management_designs_versions \
             WHERE version_id = $1 ORDER BY design_id",
        )
        .bind(version_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch actions for version")?;
        self.record("actions_for_version", rows.len());

        rows.iter().map(action_from_row).collect()
    }
}

#[async_trait::async_trait]
impl DesignAtVersionStore for PostgresStore {
    async fn count_design_at_versions(&self, query: &DesignAtVersionQuery) -> Result<i64> {
        let sql = query.to_sql(Projection::Count);
        let count: i64 = sqlx::query_scalar(&sql)
            .fetch_one(&self.pool)
            .await
            .context("Failed to count designs at versions")?;
        self.record("count_design_at_versions", 1);

        Ok(count)
    }

    async fn load_design_at_versions(
        &self,
        query: &DesignAtVersionQuery,
    ) -> Result<Vec<DesignAtVersion>> {
        let sql = query.to_sql(Projection::Records);
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .context("Failed to load designs at versions")?;
        self.record("load_design_at_versions", rows.len());

        let Some(first) = rows.first() else {
            return Ok(Vec::new());
        };
        let split = ColumnSplit::locate(first.columns().iter().map(|c| c.name()))
            .ok_or_else(|| anyhow!("Joined row does not contain both tables' id columns"))?;

        rows.iter()
            .map(|row| design_at_version_from_row(row, &split))
            .collect()
    }
}

#[async_trait::async_trait]
impl VersionSnapshotStore for PostgresStore {
    async fn visible_designs(
        &self,
        version: &Version,
        filter: &DesignFilter,
    ) -> Result<Vec<Design>> {
        let rows = sqlx::query(VISIBLE_DESIGNS_SQL)
            .bind(version.issue_id)
            .bind(version.id)
            .bind(DesignEvent::Deletion.as_i16())
            .bind(filter.ids.as_slice())
            .bind(filter.filenames.as_slice())
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch designs visible at version")?;
        self.record("visible_designs", rows.len());

        rows.iter().map(design_from_row).collect()
    }

    async fn designs_changed_in(&self, version: &Version) -> Result<Vec<Design>> {
        let rows = sqlx::query(DESIGNS_CHANGED_IN_SQL)
            .bind(version.id)
            .bind(version.issue_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch designs changed in version")?;
        self.record("designs_changed_in", rows.len());

        rows.iter().map(design_from_row).collect()
    }
}
