use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    error::{Error, Result},
    models::{DailyBar, NewStock, Stock, StockPrice},
};

const STOCK_COLUMNS: &str =
    "id, symbol, name, exchange, sector, industry, market_cap, created_at, updated_at";
const PRICE_COLUMNS: &str =
    "id, stock_id, date, open, high, low, close, volume, created_at";

/// Single-statement access to the `stocks` and `stock_prices` tables.
/// Storage errors are returned as-is; nothing here retries.
#[derive(Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// A negative `limit` means no limit.
    pub async fn get_all(&self, limit: i64) -> Result<Vec<Stock>> {
        let sql = format!("SELECT {STOCK_COLUMNS} FROM stocks ORDER BY id LIMIT ?");
        let stocks = sqlx::query_as::<_, Stock>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(stocks)
    }

    pub async fn get_by_symbol(&self, symbol: &str) -> Result<Stock> {
        let sql = format!("SELECT {STOCK_COLUMNS} FROM stocks WHERE symbol = ?");
        sqlx::query_as::<_, Stock>(&sql)
            .bind(symbol)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(Error::NotFound)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Stock> {
        let sql = format!("SELECT {STOCK_COLUMNS} FROM stocks WHERE id = ?");
        sqlx::query_as::<_, Stock>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(Error::NotFound)
    }

    pub async fn create(&self, stock: &NewStock) -> Result<Stock> {
        let now = Utc::now();
        let id = sqlx::query(
            r#"
            INSERT INTO stocks (symbol, name, exchange, sector, industry, market_cap, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&stock.symbol)
        .bind(&stock.name)
        .bind(&stock.exchange)
        .bind(&stock.sector)
        .bind(&stock.industry)
        .bind(stock.market_cap)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        self.get_by_id(id).await
    }

    pub async fn update(&self, stock: &Stock) -> Result<Stock> {
        let result = sqlx::query(
            r#"
            UPDATE stocks
            SET symbol = ?, name = ?, exchange = ?, sector = ?, industry = ?, market_cap = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&stock.symbol)
        .bind(&stock.name)
        .bind(&stock.exchange)
        .bind(&stock.sector)
        .bind(&stock.industry)
        .bind(stock.market_cap)
        .bind(Utc::now())
        .bind(stock.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound);
        }
        self.get_by_id(stock.id).await
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM stocks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Newest first.
    pub async fn get_stock_prices(&self, stock_id: i64, limit: i64) -> Result<Vec<StockPrice>> {
        let sql = format!(
            "SELECT {PRICE_COLUMNS} FROM stock_prices WHERE stock_id = ? ORDER BY date DESC LIMIT ?"
        );
        let prices = sqlx::query_as::<_, StockPrice>(&sql)
            .bind(stock_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(prices)
    }

    /// Prices with `start <= date <= end`, oldest first.
    pub async fn get_prices_between(
        &self,
        stock_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<StockPrice>> {
        let sql = format!(
            "SELECT {PRICE_COLUMNS} FROM stock_prices WHERE stock_id = ? AND date >= ? AND date <= ? ORDER BY date ASC"
        );
        let prices = sqlx::query_as::<_, StockPrice>(&sql)
            .bind(stock_id)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;
        Ok(prices)
    }

    pub async fn create_stock_price(&self, stock_id: i64, bar: &DailyBar) -> Result<StockPrice> {
        let id = sqlx::query(
            r#"
            INSERT INTO stock_prices (stock_id, date, open, high, low, close, volume, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(stock_id)
        .bind(bar.date)
        .bind(bar.open)
        .bind(bar.high)
        .bind(bar.low)
        .bind(bar.close)
        .bind(bar.volume)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        let sql = format!("SELECT {PRICE_COLUMNS} FROM stock_prices WHERE id = ?");
        let price = sqlx::query_as::<_, StockPrice>(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(price)
    }

    /// Replaces any row already stored for the same (stock, date). All bars
    /// are written in one transaction. Returns the number of rows written.
    pub async fn upsert_stock_prices(&self, stock_id: i64, bars: &[DailyBar]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let written = upsert_bars(&mut tx, stock_id, bars).await?;
        tx.commit().await?;
        Ok(written)
    }

    /// Date range already fetched from the market data provider.
    pub async fn get_backfill_range(&self, stock_id: i64) -> Result<Option<(NaiveDate, NaiveDate)>> {
        let range = sqlx::query_as::<_, (NaiveDate, NaiveDate)>(
            "SELECT start_date, end_date FROM price_backfills WHERE stock_id = ?",
        )
        .bind(stock_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(range)
    }

    /// Stores bars fetched for `[start, end]` and records the range as
    /// fetched, atomically. A range overlapping or adjoining the recorded one
    /// extends it; a disjoint range replaces it.
    pub async fn store_backfill(
        &self,
        stock_id: i64,
        start: NaiveDate,
        end: NaiveDate,
        bars: &[DailyBar],
    ) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let written = upsert_bars(&mut tx, stock_id, bars).await?;

        let recorded = sqlx::query_as::<_, (NaiveDate, NaiveDate)>(
            "SELECT start_date, end_date FROM price_backfills WHERE stock_id = ?",
        )
        .bind(stock_id)
        .fetch_optional(&mut *tx)
        .await?;
        let (start, end) = merge_ranges(recorded, start, end);

        sqlx::query(
            r#"
            INSERT INTO price_backfills (stock_id, start_date, end_date, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (stock_id) DO UPDATE SET
                start_date = excluded.start_date,
                end_date = excluded.end_date,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(stock_id)
        .bind(start)
        .bind(end)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(written)
    }
}

async fn upsert_bars(conn: &mut SqliteConnection, stock_id: i64, bars: &[DailyBar]) -> Result<u64> {
    let mut written = 0;
    for bar in bars {
        written += sqlx::query(
            r#"
            INSERT INTO stock_prices (stock_id, date, open, high, low, close, volume, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (stock_id, date) DO UPDATE SET
                open = excluded.open,
                high = excluded.high,
                low = excluded.low,
                close = excluded.close,
                volume = excluded.volume
            "#,
        )
        .bind(stock_id)
        .bind(bar.date)
        .bind(bar.open)
        .bind(bar.high)
        .bind(bar.low)
        .bind(bar.close)
        .bind(bar.volume)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?
        .rows_affected();
    }
    Ok(written)
}

fn merge_ranges(
    recorded: Option<(NaiveDate, NaiveDate)>,
    start: NaiveDate,
    end: NaiveDate,
) -> (NaiveDate, NaiveDate) {
    match recorded {
        Some((from, to))
            if start <= to.succ_opt().unwrap_or(to) && end >= from.pred_opt().unwrap_or(from) =>
        {
            (from.min(start), to.max(end))
        }
        _ => (start, end),
    }
}
