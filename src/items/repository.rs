// Item persistence - every write runs in a single immediate transaction
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use std::collections::HashMap;

use crate::categories::repository::{load_for_items, replace_links, resolve};
use crate::db::models::{Item, ItemImage};
use crate::items::domain::{ItemPatch, NewItem, Patch};
use crate::items::query::ItemQuery;
use crate::repository::{placeholders, RepositoryError};
use crate::state::DbPool;

const ITEM_COLUMNS: &str = "i.id, i.name, i.description, i.price_per_h, i.owner_id, i.available";

/// One page of results plus the total number of matches.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        price_per_h: row.get(3)?,
        owner_id: row.get(4)?,
        available: row.get(5)?,
        images: Vec::new(),
        categories: Vec::new(),
    })
}

/// Attaches galleries and categories to bare item rows.
fn hydrate(conn: &Connection, mut items: Vec<Item>) -> Result<Vec<Item>, RepositoryError> {
    if items.is_empty() {
        return Ok(items);
    }
    let ids: Vec<i64> = items.iter().map(|i| i.id).collect();

    let mut images: HashMap<i64, Vec<ItemImage>> = HashMap::new();
    {
        let sql = format!(
            "SELECT item_id, id, url FROM item_images WHERE item_id IN ({}) ORDER BY id",
            placeholders(ids.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(ids.iter()), |row| {
            Ok((
                row.get::<_, i64>(0)?,
                ItemImage {
                    id: row.get(1)?,
                    url: row.get(2)?,
                },
            ))
        })?;
        for row in rows {
            let (item_id, image) = row?;
            images.entry(item_id).or_default().push(image);
        }
    }
    let mut categories = load_for_items(conn, &ids)?;

    for item in &mut items {
        item.images = images.remove(&item.id).unwrap_or_default();
        item.categories = categories.remove(&item.id).unwrap_or_default();
    }
    Ok(items)
}

fn fetch_item(conn: &Connection, id: i64) -> Result<Option<Item>, RepositoryError> {
    let row = conn
        .query_row(
            &format!("SELECT {ITEM_COLUMNS} FROM items i WHERE i.id = ?1"),
            params![id],
            row_to_item,
        )
        .optional()?;
    match row {
        Some(item) => Ok(hydrate(conn, vec![item])?.pop()),
        None => Ok(None),
    }
}

fn replace_gallery(
    conn: &Connection,
    item_id: i64,
    urls: &[String],
) -> Result<(), RepositoryError> {
    conn.execute("DELETE FROM item_images WHERE item_id = ?1", params![item_id])?;
    let mut stmt = conn.prepare("INSERT INTO item_images (item_id, url) VALUES (?1, ?2)")?;
    for url in urls {
        stmt.execute(params![item_id, url])?;
    }
    Ok(())
}

/// Owner-only access: someone else's item looks exactly like a missing one.
fn ensure_owner(conn: &Connection, owner_id: i64, item_id: i64) -> Result<(), RepositoryError> {
    let owner: Option<i64> = conn
        .query_row(
            "SELECT owner_id FROM items WHERE id = ?1",
            params![item_id],
            |row| row.get(0),
        )
        .optional()?;
    match owner {
        Some(owner) if owner == owner_id => Ok(()),
        _ => Err(RepositoryError::NotFound(format!("item {item_id}"))),
    }
}

#[derive(Clone)]
pub struct SqliteItemRepository {
    pool: DbPool,
}

impl SqliteItemRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn get(&self, id: i64) -> Result<Item, RepositoryError> {
        let conn = self.pool.get()?;
        fetch_item(&conn, id)?.ok_or_else(|| RepositoryError::NotFound(format!("item {id}")))
    }

    /// Runs a filtered, ordered, paginated listing.
    ///
    /// The count and the page are read in the same transaction so `total`
    /// always describes the snapshot the page came from.
    pub fn list(&self, query: &ItemQuery) -> Result<Page<Item>, RepositoryError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        let filter = query.filter.to_sql();
        let total: i64 = tx.query_row(
            &format!("SELECT COUNT(*) FROM items i{}", filter.clause),
            params_from_iter(filter.args.iter()),
            |row| row.get(0),
        )?;

        let mut args = filter.args;
        args.push(Value::Integer(i64::from(query.limit)));
        args.push(Value::Integer(i64::from(query.skip)));
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM items i{} ORDER BY {} LIMIT ? OFFSET ?",
            filter.clause,
            query.order_clause()
        );
        let rows = {
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(args.iter()), row_to_item)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };
        let items = hydrate(&tx, rows)?;
        tx.commit()?;

        Ok(Page {
            items,
            total: total.max(0) as u64,
        })
    }

    pub fn list_by_owner(&self, owner_id: i64) -> Result<Vec<Item>, RepositoryError> {
        let conn = self.pool.get()?;
        let rows = {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ITEM_COLUMNS} FROM items i WHERE i.owner_id = ?1 ORDER BY i.id"
            ))?;
            let rows = stmt
                .query_map(params![owner_id], row_to_item)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };
        hydrate(&conn, rows)
    }

    /// Inserts an item with its gallery and categories, all or nothing.
    pub fn create(&self, owner_id: i64, new: &NewItem) -> Result<Item, RepositoryError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let categories = match &new.categories {
            Some(ids) => resolve(&tx, ids)?,
            None => Vec::new(),
        };

        tx.execute(
            "INSERT INTO items (name, description, price_per_h, owner_id, available)
             VALUES (?1, ?2, ?3, ?4, 1)",
            params![new.name, new.description, new.price_per_h, owner_id],
        )?;
        let item_id = tx.last_insert_rowid();

        replace_gallery(&tx, item_id, &new.image_urls)?;
        replace_links(&tx, item_id, &categories)?;

        let item = fetch_item(&tx, item_id)?
            .ok_or_else(|| RepositoryError::NotFound(format!("item {item_id}")))?;
        tx.commit()?;

        tracing::info!(
            item_id,
            owner_id,
            images = item.images.len(),
            "Item created"
        );
        Ok(item)
    }

    /// Applies the fields present in `patch` to an item owned by `owner_id`.
    pub fn update(
        &self,
        owner_id: i64,
        item_id: i64,
        patch: &ItemPatch,
    ) -> Result<Item, RepositoryError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        ensure_owner(&tx, owner_id, item_id)?;

        // resolve first so a bad id aborts before anything is written
        let categories = match &patch.categories {
            Patch::Value(ids) => Some(resolve(&tx, ids)?),
            _ => None,
        };

        let mut sets: Vec<&str> = Vec::new();
        let mut args: Vec<Value> = Vec::new();
        if let Patch::Value(name) = &patch.name {
            sets.push("name = ?");
            args.push(Value::Text(name.clone()));
        }
        match &patch.description {
            Patch::Value(description) => {
                sets.push("description = ?");
                args.push(Value::Text(description.clone()));
            }
            Patch::Null => {
                sets.push("description = ?");
                args.push(Value::Null);
            }
            Patch::Absent => {}
        }
        if let Patch::Value(price) = patch.price_per_h {
            sets.push("price_per_h = ?");
            args.push(Value::Real(price));
        }
        if !sets.is_empty() {
            args.push(Value::Integer(item_id));
            tx.execute(
                &format!("UPDATE items SET {} WHERE id = ?", sets.join(", ")),
                params_from_iter(args.iter()),
            )?;
        }

        if let Some(categories) = categories {
            replace_links(&tx, item_id, &categories)?;
        }
        if let Patch::Value(urls) = &patch.image_urls {
            replace_gallery(&tx, item_id, urls)?;
        }

        let item = fetch_item(&tx, item_id)?
            .ok_or_else(|| RepositoryError::NotFound(format!("item {item_id}")))?;
        tx.commit()?;

        tracing::info!(item_id, owner_id, "Item updated");
        Ok(item)
    }

    /// Deletes an item with its gallery and category links.
    ///
    /// Refused while an active rental holds the item; closed rentals keep
    /// their history with the item reference cleared.
    pub fn delete(&self, owner_id: i64, item_id: i64) -> Result<(), RepositoryError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        ensure_owner(&tx, owner_id, item_id)?;

        let active: i64 = tx.query_row(
            "SELECT COUNT(*) FROM rentals WHERE item_id = ?1 AND returned = 0",
            params![item_id],
            |row| row.get(0),
        )?;
        if active > 0 {
            return Err(RepositoryError::Conflict(format!(
                "item {item_id} has an active rental"
            )));
        }

        tx.execute("DELETE FROM items WHERE id = ?1", params![item_id])?;
        tx.commit()?;

        tracing::info!(item_id, owner_id, "Item deleted");
        Ok(())
    }
}
