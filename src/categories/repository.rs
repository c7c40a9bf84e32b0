use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension};
use std::collections::{BTreeSet, HashMap};

use crate::db::models::Category;
use crate::repository::{placeholders, RepositoryError};
use crate::state::DbPool;

/// Looks up every id in `ids`, all or nothing.
///
/// Fails with `MissingCategories` naming exactly the ids that do not exist.
/// Duplicates in `ids` are ignored; the result is ordered by name.
pub fn resolve(conn: &Connection, ids: &[i64]) -> Result<Vec<Category>, RepositoryError> {
    let wanted: BTreeSet<i64> = ids.iter().copied().collect();
    if wanted.is_empty() {
        return Ok(Vec::new());
    }

    let sql = format!(
        "SELECT id, name FROM categories WHERE id IN ({}) ORDER BY name, id",
        placeholders(wanted.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let found: Vec<Category> = stmt
        .query_map(params_from_iter(wanted.iter()), row_to_category)?
        .collect::<Result<_, _>>()?;

    if found.len() != wanted.len() {
        let present: BTreeSet<i64> = found.iter().map(|c| c.id).collect();
        let missing: BTreeSet<i64> = wanted.difference(&present).copied().collect();
        return Err(RepositoryError::MissingCategories(missing));
    }

    Ok(found)
}

/// Categories for each of `item_ids`, grouped by item.
pub(crate) fn load_for_items(
    conn: &Connection,
    item_ids: &[i64],
) -> Result<HashMap<i64, Vec<Category>>, RepositoryError> {
    let mut grouped: HashMap<i64, Vec<Category>> = HashMap::new();
    if item_ids.is_empty() {
        return Ok(grouped);
    }

    let sql = format!(
        "SELECT ic.item_id, c.id, c.name FROM item_categories ic \
         JOIN categories c ON c.id = ic.category_id \
         WHERE ic.item_id IN ({}) ORDER BY c.name, c.id",
        placeholders(item_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(item_ids.iter()), |row| {
        Ok((
            row.get::<_, i64>(0)?,
            Category {
                id: row.get(1)?,
                name: row.get(2)?,
            },
        ))
    })?;
    for row in rows {
        let (item_id, category) = row?;
        grouped.entry(item_id).or_default().push(category);
    }
    Ok(grouped)
}

/// Replaces the category links of `item_id` with `categories`.
pub(crate) fn replace_links(
    conn: &Connection,
    item_id: i64,
    categories: &[Category],
) -> Result<(), RepositoryError> {
    conn.execute(
        "DELETE FROM item_categories WHERE item_id = ?1",
        params![item_id],
    )?;
    let mut stmt =
        conn.prepare("INSERT INTO item_categories (item_id, category_id) VALUES (?1, ?2)")?;
    for category in categories {
        stmt.execute(params![item_id, category.id])?;
    }
    Ok(())
}

fn row_to_category(row: &rusqlite::Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

#[derive(Clone)]
pub struct SqliteCategoryRepository {
    pool: DbPool,
}

impl SqliteCategoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// All categories, alphabetically.
    pub fn list(&self) -> Result<Vec<Category>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare("SELECT id, name FROM categories ORDER BY name, id")?;
        let categories = stmt
            .query_map([], row_to_category)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    pub fn get(&self, id: i64) -> Result<Category, RepositoryError> {
        let conn = self.pool.get()?;
        conn.query_row(
            "SELECT id, name FROM categories WHERE id = ?1",
            params![id],
            row_to_category,
        )
        .optional()?
        .ok_or_else(|| RepositoryError::NotFound(format!("category {id}")))
    }

    pub fn create(&self, name: &str) -> Result<Category, RepositoryError> {
        let conn = self.pool.get()?;
        match conn.execute("INSERT INTO categories (name) VALUES (?1)", params![name]) {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                return Err(RepositoryError::Conflict(format!(
                    "category '{name}' already exists"
                )));
            }
            Err(e) => return Err(e.into()),
        }

        let category = Category {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
        };
        tracing::info!(category_id = category.id, "Category created");
        Ok(category)
    }
}
