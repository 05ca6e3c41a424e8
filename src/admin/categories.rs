/// Issue categories
use crate::db::parse_timestamp;
use crate::error::{PortalError, PortalResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

/// Category record
#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Add-category form
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CategoryForm {
    pub name: String,
    pub description: String,
}

/// Outcome of a category deletion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRemoval {
    pub name: String,
    /// Issues still carrying the category name
    pub issues_in_use: i64,
}

/// Category manager
#[derive(Clone)]
pub struct CategoryManager {
    db: SqlitePool,
}

impl CategoryManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// All categories by name
    pub async fn list(&self) -> PortalResult<Vec<Category>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, created_at
            FROM categories
            ORDER BY name
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let mut categories = Vec::with_capacity(rows.len());
        for row in rows {
            let created_at: String = row.get("created_at");
            categories.push(Category {
                id: row.get("id"),
                name: row.get("name"),
                description: row.get("description"),
                created_at: parse_timestamp(&created_at)?,
            });
        }

        Ok(categories)
    }

    /// Add a category. Names are unique.
    pub async fn add(&self, form: CategoryForm) -> PortalResult<Category> {
        let name = form.name.trim();
        if name.is_empty() {
            return Err(PortalError::Validation("Category name is required.".to_string()));
        }
        let description = Some(form.description.trim().to_string()).filter(|d| !d.is_empty());
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO categories (name, description, created_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(name)
        .bind(&description)
        .bind(crate::db::timestamp(now))
        .execute(&self.db)
        .await
        .map_err(|e| PortalError::unique_violation(e, "Category already exists."))?;

        Ok(Category {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            description,
            created_at: now,
        })
    }

    /// Delete a category. Issues keep their free-text category; the count of
    /// such issues is reported back. `None` when the id does not exist.
    pub async fn delete(&self, id: i64) -> PortalResult<Option<CategoryRemoval>> {
        let Some(row) = sqlx::query("SELECT name FROM categories WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
        else {
            return Ok(None);
        };
        let name: String = row.get("name");

        let issues_in_use: i64 = sqlx::query("SELECT COUNT(*) AS count FROM issues WHERE category = ?")
            .bind(&name)
            .fetch_one(&self.db)
            .await?
            .get("count");

        sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(Some(CategoryRemoval {
            name,
            issues_in_use,
        }))
    }
}
