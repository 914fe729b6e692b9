// SQLite PopulationRepository Implementation

use async_trait::async_trait;
use bulkex_core::error::Result;
use bulkex_core::port::PopulationRepository;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::map_sqlx_error;

pub struct SqlitePopulationRepository {
    pool: SqlitePool,
}

impl SqlitePopulationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Attribute beneficiaries to an organization, creating unknown ones.
    /// Re-attributing an existing pair is a no-op.
    pub async fn attribute(&self, org_id: &str, blue_button_ids: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        for blue_button_id in blue_button_ids {
            sqlx::query("INSERT OR IGNORE INTO beneficiaries (blue_button_id) VALUES (?)")
                .bind(blue_button_id)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;

            sqlx::query(
                r#"
                INSERT OR IGNORE INTO organization_beneficiaries (org_id, beneficiary_id)
                SELECT ?, id FROM beneficiaries WHERE blue_button_id = ?
                "#,
            )
            .bind(org_id)
            .bind(blue_button_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        debug!(org_id = %org_id, count = blue_button_ids.len(), "Attributed beneficiaries");
        Ok(())
    }
}

#[async_trait]
impl PopulationRepository for SqlitePopulationRepository {
    async fn member_ids(&self, org_id: &str) -> Result<Vec<String>> {
        sqlx::query_scalar(
            r#"
            SELECT b.blue_button_id
            FROM organization_beneficiaries ob
            JOIN beneficiaries b ON b.id = ob.beneficiary_id
            WHERE ob.org_id = ?
            ORDER BY ob.rowid ASC
            "#,
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::migrated_pool;

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_members_in_attribution_order() {
        let repo = SqlitePopulationRepository::new(migrated_pool().await);
        repo.attribute("A0001", &ids(&["30", "10", "20"])).await.unwrap();
        repo.attribute("A0002", &ids(&["10"])).await.unwrap();

        assert_eq!(repo.member_ids("A0001").await.unwrap(), ids(&["30", "10", "20"]));
        assert_eq!(repo.member_ids("A0002").await.unwrap(), ids(&["10"]));
    }

    #[tokio::test]
    async fn test_unknown_org_has_no_members() {
        let repo = SqlitePopulationRepository::new(migrated_pool().await);
        assert!(repo.member_ids("A9999").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reattribution_is_noop() {
        let repo = SqlitePopulationRepository::new(migrated_pool().await);
        repo.attribute("A0001", &ids(&["1", "2"])).await.unwrap();
        repo.attribute("A0001", &ids(&["2", "1"])).await.unwrap();

        assert_eq!(repo.member_ids("A0001").await.unwrap(), ids(&["1", "2"]));
    }
}
