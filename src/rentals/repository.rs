use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::db::models::Rental;
use crate::money::{deposit_for, Money};
use crate::rentals::domain::{parse_timestamp, NewRental};
use crate::repository::RepositoryError;
use crate::state::DbPool;

const RENTAL_COLUMNS: &str = "id, item_id, renter_id, start_at, end_at, deposit_cents, returned";

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn timestamp_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("invalid timestamp '{raw}'").into(),
        )
    })
}

fn row_to_rental(row: &rusqlite::Row<'_>) -> rusqlite::Result<Rental> {
    Ok(Rental {
        id: row.get(0)?,
        item_id: row.get(1)?,
        renter_id: row.get(2)?,
        start_at: timestamp_column(row, 3)?,
        end_at: timestamp_column(row, 4)?,
        deposit: Money::from_cents(row.get(5)?),
        returned: row.get(6)?,
    })
}

fn fetch_rental(conn: &Connection, id: i64) -> Result<Option<Rental>, RepositoryError> {
    Ok(conn
        .query_row(
            &format!("SELECT {RENTAL_COLUMNS} FROM rentals WHERE id = ?1"),
            params![id],
            row_to_rental,
        )
        .optional()?)
}

#[derive(Clone)]
pub struct SqliteRentalRepository {
    pool: DbPool,
}

impl SqliteRentalRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Rents an item: claims it, prices the deposit and records the rental
    /// in one immediate transaction.
    ///
    /// The claim is a compare-and-set on `available`, so of two concurrent
    /// requests for the same item exactly one wins; the other sees
    /// `NotAvailable`.
    pub fn create(&self, renter_id: i64, new: &NewRental) -> Result<Rental, RepositoryError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let price: f64 = tx
            .query_row(
                "SELECT price_per_h FROM items WHERE id = ?1 AND available = 1",
                params![new.item_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(RepositoryError::NotAvailable(new.item_id))?;

        let deposit =
            deposit_for(new.duration_ns(), price).ok_or(RepositoryError::InvalidAmount)?;

        let claimed = tx.execute(
            "UPDATE items SET available = 0 WHERE id = ?1 AND available = 1",
            params![new.item_id],
        )?;
        if claimed != 1 {
            return Err(RepositoryError::NotAvailable(new.item_id));
        }

        tx.execute(
            "INSERT INTO rentals (item_id, renter_id, start_at, end_at, deposit_cents, returned)
             VALUES (?1, ?2, ?3, ?4, ?5, 0)",
            params![
                new.item_id,
                renter_id,
                format_timestamp(&new.start_at),
                format_timestamp(&new.end_at),
                deposit.cents(),
            ],
        )?;
        let rental_id = tx.last_insert_rowid();
        let rental = fetch_rental(&tx, rental_id)?
            .ok_or_else(|| RepositoryError::NotFound(format!("rental {rental_id}")))?;
        tx.commit()?;

        tracing::info!(
            rental_id,
            item_id = new.item_id,
            renter_id,
            deposit = %deposit,
            "Rental created"
        );
        Ok(rental)
    }

    /// Closes a rental and puts its item back on the market.
    ///
    /// Only the renter may return it; anyone else gets `NotFound`. Returning
    /// an already returned rental changes nothing.
    pub fn mark_returned(
        &self,
        renter_id: i64,
        rental_id: i64,
    ) -> Result<Rental, RepositoryError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let rental = fetch_rental(&tx, rental_id)?
            .filter(|r| r.renter_id == renter_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("rental {rental_id}")))?;
        if rental.returned {
            return Ok(rental);
        }

        tx.execute(
            "UPDATE rentals SET returned = 1 WHERE id = ?1",
            params![rental_id],
        )?;
        if let Some(item_id) = rental.item_id {
            tx.execute(
                "UPDATE items SET available = 1 WHERE id = ?1",
                params![item_id],
            )?;
        }
        let rental = fetch_rental(&tx, rental_id)?
            .ok_or_else(|| RepositoryError::NotFound(format!("rental {rental_id}")))?;
        tx.commit()?;

        tracing::info!(rental_id, renter_id, "Rental returned");
        Ok(rental)
    }

    pub fn get(&self, id: i64) -> Result<Rental, RepositoryError> {
        let conn = self.pool.get()?;
        fetch_rental(&conn, id)?.ok_or_else(|| RepositoryError::NotFound(format!("rental {id}")))
    }

    pub fn list_by_renter(&self, renter_id: i64) -> Result<Vec<Rental>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {RENTAL_COLUMNS} FROM rentals WHERE renter_id = ?1 ORDER BY id"
        ))?;
        let rentals = stmt
            .query_map(params![renter_id], row_to_rental)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rentals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use chrono::TimeZone;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use tempfile::TempDir;

    fn create_test_repo() -> (SqliteRentalRepository, DbPool, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let pool = db::create_pool(&temp_dir.path().join("test.db"), 4).unwrap();
        db::run_migrations(&pool).unwrap();
        let conn = pool.get().unwrap();
        conn.execute_batch(
            "INSERT INTO users (id, username, email, password_hash) VALUES
                (1, 'alice', 'alice@example.com', 'x'),
                (2, 'bob', 'bob@example.com', 'x'),
                (3, 'carol', 'carol@example.com', 'x');
             INSERT INTO items (id, name, price_per_h, owner_id) VALUES (10, 'Drill', 4.5, 1);",
        )
        .unwrap();
        (SqliteRentalRepository::new(pool.clone()), pool, temp_dir)
    }

    fn two_hours(item_id: i64) -> NewRental {
        NewRental {
            item_id,
            start_at: Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap(),
            end_at: Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap(),
        }
    }

    fn item_available(pool: &DbPool, item_id: i64) -> bool {
        pool.get()
            .unwrap()
            .query_row(
                "SELECT available FROM items WHERE id = ?1",
                params![item_id],
                |r| r.get(0),
            )
            .unwrap()
    }

    #[test]
    fn rental_charges_deposit_and_claims_item() {
        let (repo, pool, _temp) = create_test_repo();
        let rental = repo.create(2, &two_hours(10)).unwrap();

        assert_eq!(rental.deposit, Money::from_cents(1080));
        assert_eq!(rental.item_id, Some(10));
        assert_eq!(rental.renter_id, 2);
        assert!(!rental.returned);
        assert_eq!(rental.start_at, two_hours(10).start_at);
        assert!(!item_available(&pool, 10));
    }

    #[test]
    fn sub_millisecond_rental_is_free() {
        let (repo, pool, _temp) = create_test_repo();
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        let new = NewRental {
            item_id: 10,
            start_at: start,
            end_at: start + chrono::Duration::microseconds(500),
        };

        let rental = repo.create(2, &new).unwrap();
        assert_eq!(rental.deposit, Money::from_cents(0));
        assert_eq!(rental.end_at, new.end_at);
        assert!(!item_available(&pool, 10));
    }

    #[test]
    fn unavailable_item_cannot_be_rented() {
        let (repo, _pool, _temp) = create_test_repo();
        repo.create(2, &two_hours(10)).unwrap();

        assert!(matches!(
            repo.create(3, &two_hours(10)),
            Err(RepositoryError::NotAvailable(10))
        ));
        // missing items look the same
        assert!(matches!(
            repo.create(3, &two_hours(404)),
            Err(RepositoryError::NotAvailable(404))
        ));
        assert_eq!(repo.list_by_renter(3).unwrap().len(), 0);
    }

    #[test]
    fn return_restores_availability() {
        let (repo, pool, _temp) = create_test_repo();
        let rental = repo.create(2, &two_hours(10)).unwrap();

        let returned = repo.mark_returned(2, rental.id).unwrap();
        assert!(returned.returned);
        assert!(item_available(&pool, 10));

        // the item can be rented again
        repo.create(3, &two_hours(10)).unwrap();
    }

    #[test]
    fn only_the_renter_can_return() {
        let (repo, pool, _temp) = create_test_repo();
        let rental = repo.create(2, &two_hours(10)).unwrap();

        assert!(matches!(
            repo.mark_returned(1, rental.id),
            Err(RepositoryError::NotFound(_))
        ));
        assert!(!item_available(&pool, 10));
        assert!(!repo.get(rental.id).unwrap().returned);
    }

    #[test]
    fn returning_twice_changes_nothing() {
        let (repo, pool, _temp) = create_test_repo();
        let first = repo.create(2, &two_hours(10)).unwrap();
        repo.mark_returned(2, first.id).unwrap();
        // someone else rents the item in between
        repo.create(3, &two_hours(10)).unwrap();

        let again = repo.mark_returned(2, first.id).unwrap();
        assert!(again.returned);
        assert!(!item_available(&pool, 10));
    }

    #[test]
    fn history_survives_item_deletion() {
        let (repo, pool, _temp) = create_test_repo();
        let rental = repo.create(2, &two_hours(10)).unwrap();
        repo.mark_returned(2, rental.id).unwrap();

        pool.get()
            .unwrap()
            .execute("DELETE FROM items WHERE id = 10", [])
            .unwrap();

        let history = repo.list_by_renter(2).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].item_id, None);
        assert_eq!(history[0].deposit, Money::from_cents(1080));
    }

    #[test]
    fn concurrent_rentals_of_one_item_have_one_winner() {
        let (repo, pool, _temp) = create_test_repo();
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = [2_i64, 3]
            .into_iter()
            .map(|renter| {
                let repo = repo.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    repo.create(renter, &two_hours(10))
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let wins = results.iter().filter(|r| r.is_ok()).count();
        let losses = results
            .iter()
            .filter(|r| matches!(r, Err(RepositoryError::NotAvailable(10))))
            .count();
        assert_eq!((wins, losses), (1, 1));

        let total: i64 = pool
            .get()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM rentals", [], |r| r.get(0))
            .unwrap();
        assert_eq!(total, 1);
    }
}
