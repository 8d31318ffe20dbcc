//! Persistence provider and order repository.
//!
//! Free async functions over a `SqlitePool`; raw SQL with binds, no macros.
//! One pooled session per caller operation — no cross-request transactions,
//! last write wins on updates.

use anyhow::{Context, Result};
use odk_schemas::{NewOrder, Order, OrderPatch};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Row, SqlitePool,
};
use std::str::FromStr;

pub const ENV_DB_URL: &str = "ODK_DATABASE_URL";
pub const DEFAULT_DB_URL: &str = "sqlite://odk.db?mode=rwc";

/// Database URL from `ODK_DATABASE_URL`, falling back to the local file default.
pub fn url_from_env() -> String {
    std::env::var(ENV_DB_URL).unwrap_or_else(|_| DEFAULT_DB_URL.to_string())
}

/// Open a SQLite pool for `url`, creating the database file if missing.
///
/// Single connection: SQLite is single-writer, and `sqlite::memory:` URLs
/// must not fan out across pooled connections.
pub async fn connect(url: &str) -> Result<SqlitePool> {
    let opts = SqliteConnectOptions::from_str(url)
        .with_context(|| format!("invalid database url: {url}"))?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(opts)
        .await
        .context("failed to connect to SQLite")?;

    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

/// Simple status query (connectivity + schema presence).
pub async fn status(pool: &SqlitePool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1 from sqlite_master
            where type = 'table' and name = 'orders'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_orders_table: exists,
    })
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_orders_table: bool,
}

// ---------------------------------------------------------------------------
// Order repository
// ---------------------------------------------------------------------------

fn order_from_row(row: &SqliteRow) -> Result<Order, sqlx::Error> {
    Ok(Order {
        id: row.try_get("id")?,
        customer_name: row.try_get("customer_name")?,
        item: row.try_get("item")?,
        quantity: row.try_get("quantity")?,
        price: row.try_get("price")?,
        is_open: row.try_get("is_open")?,
    })
}

/// All orders whose open flag is set, in store order. Unbounded by design.
pub async fn list_open_orders(pool: &SqlitePool) -> Result<Vec<Order>> {
    let rows = sqlx::query(
        r#"
        select id, customer_name, item, quantity, price, is_open
        from orders
        where is_open = 1
        "#,
    )
    .fetch_all(pool)
    .await
    .context("list_open_orders failed")?;

    rows.iter()
        .map(|r| order_from_row(r).context("decode order row"))
        .collect()
}

/// Insert a new order and return it with the store-assigned id.
pub async fn insert_order(pool: &SqlitePool, new: &NewOrder) -> Result<Order> {
    let res = sqlx::query(
        r#"
        insert into orders (customer_name, item, quantity, price, is_open)
        values (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&new.customer_name)
    .bind(&new.item)
    .bind(new.quantity)
    .bind(new.price)
    .bind(new.is_open)
    .execute(pool)
    .await
    .context("insert_order failed")?;

    Ok(Order {
        id: res.last_insert_rowid(),
        customer_name: new.customer_name.clone(),
        item: new.item.clone(),
        quantity: new.quantity,
        price: new.price,
        is_open: new.is_open,
    })
}

/// Load one order by id; `Ok(None)` when absent.
pub async fn fetch_order(pool: &SqlitePool, id: i64) -> Result<Option<Order>> {
    let row = sqlx::query(
        r#"
        select id, customer_name, item, quantity, price, is_open
        from orders
        where id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("fetch_order failed")?;

    row.map(|r| order_from_row(&r).context("decode order row"))
        .transpose()
}

/// Apply a partial update to the order with `id`.
///
/// An absent id is a domain outcome, not an error: returns `Ok(None)` and
/// writes nothing. Fields unset in `patch` keep their stored value.
pub async fn update_order(pool: &SqlitePool, id: i64, patch: &OrderPatch) -> Result<Option<Order>> {
    let Some(mut order) = fetch_order(pool, id).await? else {
        return Ok(None);
    };

    patch.apply(&mut order);

    sqlx::query(
        r#"
        update orders
        set customer_name = ?, item = ?, quantity = ?, price = ?, is_open = ?
        where id = ?
        "#,
    )
    .bind(&order.customer_name)
    .bind(&order.item)
    .bind(order.quantity)
    .bind(order.price)
    .bind(order.is_open)
    .bind(order.id)
    .execute(pool)
    .await
    .context("update_order failed")?;

    Ok(Some(order))
}
