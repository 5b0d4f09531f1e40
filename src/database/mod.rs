mod conversations;
mod messages;
mod unread;

use std::str::FromStr;
use std::sync::{Arc, Mutex};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Duration, OffsetDateTime};

/// Storage handle: a SQLite pool plus the store clock that assigns every
/// timestamp the core persists.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    clock: StoreClock,
}

impl Database {
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await?;

        Ok(Self {
            pool,
            clock: StoreClock::new(),
        })
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("migrations/sqlite").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Issue the next store timestamp. See [`StoreClock`].
    pub fn next_timestamp(&self) -> String {
        self.clock.next()
    }
}

/// Fixed-width UTC format (six subsecond digits) so the stored strings sort
/// lexicographically in chronological order.
const STORE_TS_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z");

/// Issues strictly increasing timestamps for this process. Two appends can
/// land in the same wall-clock microsecond; the clock nudges the second one
/// forward so `sent_at` stays a total order per conversation.
#[derive(Clone)]
struct StoreClock {
    last: Arc<Mutex<OffsetDateTime>>,
}

impl StoreClock {
    fn new() -> Self {
        Self {
            last: Arc::new(Mutex::new(OffsetDateTime::UNIX_EPOCH)),
        }
    }

    fn next(&self) -> String {
        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut now = OffsetDateTime::now_utc();
        // Truncate to the stored precision before comparing, otherwise two
        // nanosecond-distinct instants could format to the same string.
        now = now
            .replace_nanosecond((now.nanosecond() / 1_000) * 1_000)
            .unwrap();
        if now <= *last {
            now = *last + Duration::microseconds(1);
        }
        *last = now;

        now.format(STORE_TS_FORMAT).unwrap()
    }
}
