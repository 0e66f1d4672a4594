//! The Message Store: durable per-message state, retry counter, status
//! history, and daily counters. Single source of truth for every other
//! component — the Ingestion Gateway, both Channel Workers, and the Retry &
//! Scheduler Loop all go through this crate rather than touching SQL
//! directly.
//!
//! Backed by `rusqlite` behind a blocking mutex; every call runs on the
//! blocking thread pool via `tokio::task::spawn_blocking` so the async
//! runtime is never stalled waiting on the database.

mod conv;
mod schema;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex as StdMutex};

use anyhow::Context as _;
use notify_domain::{
    Channel, Classification, DomainError, DomainResult, MessageEnvelope, MessageFilters,
    MessageLog, MessageStatus, NewMessage, Site, SiteMetricsDaily, SiteStats, StatusSource,
};
use rusqlite::{params, Connection, OptionalExtension};
use time::{Date, OffsetDateTime};
use tokio::task::spawn_blocking;

pub use notify_domain as domain;

#[derive(Clone)]
pub struct MessageStore {
    conn: Arc<StdMutex<Connection>>,
}

/// A `SCHEDULED` row whose time has come, ready for the scheduler pass to
/// promote and publish.
#[derive(Debug, Clone)]
pub struct DueScheduledMessage {
    pub message_id: String,
    pub envelope: MessageEnvelope,
}

/// A `FAILED` row eligible for the retry pass to evaluate against policy.
#[derive(Debug, Clone)]
pub struct DueFailedMessage {
    pub message_id: String,
    pub envelope: MessageEnvelope,
    pub classification: Classification,
    pub retry_count: i64,
    pub updated_at: OffsetDateTime,
}

/// Result of `update_status`: whether the write actually applied, and what
/// the status was immediately beforehand (for callers that log skipped
/// no-ops, per the `DELIVERED` idempotency rule).
#[derive(Debug, Clone, Copy)]
pub struct UpdateOutcome {
    pub applied: bool,
    pub previous_status: MessageStatus,
}

impl MessageStore {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let conn = Connection::open(path).context("open sqlite database")?;
        conn.execute_batch(schema::CREATE_TABLES_SQL)
            .context("create schema")?;
        Ok(Self {
            conn: Arc::new(StdMutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite database")?;
        conn.execute_batch(schema::CREATE_TABLES_SQL)
            .context("create schema")?;
        Ok(Self {
            conn: Arc::new(StdMutex::new(conn)),
        })
    }

    async fn with_conn<F, T>(&self, f: F) -> DomainResult<T>
    where
        F: FnOnce(&mut Connection) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        spawn_blocking(move || {
            let mut guard = conn.lock().expect("sqlite connection mutex poisoned");
            f(&mut guard)
        })
        .await
        .map_err(|err| DomainError::StoreUnavailable(err.to_string()))?
        .map_err(|err| DomainError::StoreUnavailable(err.to_string()))
    }

    // ---- Sites -----------------------------------------------------

    pub async fn register_site(&self, site_name: String) -> DomainResult<(String, String)> {
        let raw_key = notify_security::generate_api_key();
        let hash = notify_security::hash_api_key(&raw_key);
        let site_id = format!("SITE-{}", nanoid::nanoid!(20));
        let now = now_rfc3339();

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO sites (site_id, site_name, api_key_hash, is_active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 1, ?4, ?4)",
                params![site_id, site_name, hash, now],
            )?;
            Ok(site_id)
        })
        .await
        .map(|site_id| (site_id, raw_key))
    }

    pub async fn authenticate_site(&self, raw_key: &str) -> DomainResult<Option<Site>> {
        let raw_key = raw_key.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT site_id, site_name, api_key_hash, whatsapp_session_name,
                        wasender_api_key_encrypted, sendgrid_api_key_encrypted,
                        sendgrid_from_email, sendgrid_from_name, is_active,
                        created_at, updated_at
                 FROM sites WHERE is_active = 1",
            )?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let hash: String = row.get(2)?;
                if notify_security::verify_api_key(&raw_key, &hash).unwrap_or(false) {
                    return Ok(Some(site_from_row(row)?));
                }
            }
            Ok(None)
        })
        .await
    }

    pub async fn get_site(&self, site_id: &str) -> DomainResult<Option<Site>> {
        let site_id = site_id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT site_id, site_name, api_key_hash, whatsapp_session_name,
                        wasender_api_key_encrypted, sendgrid_api_key_encrypted,
                        sendgrid_from_email, sendgrid_from_name, is_active,
                        created_at, updated_at
                 FROM sites WHERE site_id = ?1",
                params![site_id],
                |row| Ok(site_from_row(row)),
            )
            .optional()?
            .transpose()
        })
        .await
    }

    pub async fn get_site_id(&self, message_id: &str) -> DomainResult<Option<String>> {
        let message_id = message_id.to_string();
        self.with_conn(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT site_id FROM message_logs WHERE message_id = ?1",
                    params![message_id],
                    |row| row.get(0),
                )
                .optional()?)
        })
        .await
    }

    // ---- Messages ----------------------------------------------------

    pub async fn create_message(&self, msg: NewMessage) -> DomainResult<(String, MessageStatus)> {
        if msg.site_id.trim().is_empty() || msg.recipient.trim().is_empty() {
            return Err(DomainError::InvalidInput(
                "site_id and recipient are required".into(),
            ));
        }
        let message_id = format!("MSG-{}", nanoid::nanoid!(24));
        let status = if msg.scheduled_at.is_some() {
            MessageStatus::Scheduled
        } else {
            MessageStatus::Pending
        };
        let now = OffsetDateTime::now_utc();
        let metadata_json = serde_json::to_string(&msg.metadata).unwrap_or_else(|_| "{}".into());

        let message_id_out = message_id.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO message_logs (
                    message_id, site_id, channel, status, recipient, subject, body,
                    from_email, from_name, is_html, image_url, video_url, document_url,
                    file_name, caption, retry_count, metadata_json, created_at, updated_at,
                    scheduled_at, whatsapp_session_name
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, 0, ?16, ?17, ?17, ?18, ?19)",
                params![
                    message_id,
                    msg.site_id,
                    conv::channel_to_str(msg.channel),
                    conv::status_to_str(status),
                    msg.recipient,
                    msg.subject,
                    msg.body,
                    msg.from_email,
                    msg.from_name,
                    msg.is_html,
                    msg.image_url,
                    msg.video_url,
                    msg.document_url,
                    msg.file_name,
                    msg.caption,
                    metadata_json,
                    fmt_odt(now),
                    msg.scheduled_at.map(fmt_odt),
                    msg.whatsapp_session_name,
                ],
            )?;
            tx.execute(
                "INSERT INTO message_status_history (message_id, old_status, new_status, source, changed_at)
                 VALUES (?1, NULL, ?2, 'API', ?3)",
                params![message_id, conv::status_to_str(status), fmt_odt(now)],
            )?;
            // total_sent is keyed off created_at's UTC date regardless of
            // terminal outcome (§4.1); delivered/failed are bumped later,
            // keyed off the transition time, by `bump_daily_counter`.
            bump_sent_counter(&tx, &msg.site_id, msg.channel, now.date())?;
            tx.commit()?;
            Ok(())
        })
        .await?;

        Ok((message_id_out, status))
    }

    /// Atomic status transition: appends a history row, updates the message
    /// row and derived timestamps, and bumps the daily counter when the new
    /// status is terminal. A no-op (and `applied = false`) if the message is
    /// already `DELIVERED`.
    pub async fn update_status(
        &self,
        message_id: &str,
        new_status: MessageStatus,
        error_message: Option<String>,
        source: StatusSource,
        failure_type: Option<Classification>,
    ) -> DomainResult<UpdateOutcome> {
        let message_id = message_id.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let row: Option<(String, String, String)> = tx
                .query_row(
                    "SELECT status, site_id, channel FROM message_logs WHERE message_id = ?1",
                    params![message_id],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;
            let Some((current_status_str, site_id, channel_str)) = row else {
                anyhow::bail!("message {message_id} not found");
            };
            let current_status = conv::status_from_str(&current_status_str)?;
            let channel = conv::channel_from_str(&channel_str)?;

            if current_status == MessageStatus::Delivered && new_status != MessageStatus::Delivered
            {
                return Ok(UpdateOutcome {
                    applied: false,
                    previous_status: current_status,
                });
            }

            let now = OffsetDateTime::now_utc();
            let error_text = error_message.map(|s| bounded_error_text(&s));

            tx.execute(
                "INSERT INTO message_status_history (message_id, old_status, new_status, source, changed_at, note)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    message_id,
                    current_status_str,
                    conv::status_to_str(new_status),
                    conv::source_to_str(source),
                    fmt_odt(now),
                    error_text,
                ],
            )?;

            let sent_at = matches!(new_status, MessageStatus::Sent | MessageStatus::Delivered)
                .then(|| fmt_odt(now));
            let delivered_at = (new_status == MessageStatus::Delivered).then(|| fmt_odt(now));

            tx.execute(
                "UPDATE message_logs SET
                    status = ?1,
                    error_message = COALESCE(?2, error_message),
                    failure_type = ?3,
                    updated_at = ?4,
                    sent_at = COALESCE(?5, sent_at),
                    delivered_at = COALESCE(?6, delivered_at)
                 WHERE message_id = ?7",
                params![
                    conv::status_to_str(new_status),
                    error_text,
                    failure_type.map(conv::classification_to_str),
                    fmt_odt(now),
                    sent_at,
                    delivered_at,
                    message_id,
                ],
            )?;

            // Entering FAILED from FAILED (e.g. a republish attempt that
            // failed again) must not double-count; every other terminal
            // transition — including FAILED -> DELIVERED on a redelivered
            // message — bumps the daily counter exactly once.
            let is_repeat_failure = new_status == MessageStatus::Failed
                && current_status == MessageStatus::Failed;
            if new_status.is_terminal() && !is_repeat_failure {
                bump_daily_counter(&tx, &site_id, channel, now.date(), new_status)?;
            }

            tx.commit()?;
            Ok(UpdateOutcome {
                applied: true,
                previous_status: current_status,
            })
        })
        .await
    }

    pub async fn get_status(&self, message_id: &str) -> DomainResult<Option<MessageStatus>> {
        let message_id = message_id.to_string();
        self.with_conn(move |conn| {
            let status: Option<String> = conn
                .query_row(
                    "SELECT status FROM message_logs WHERE message_id = ?1",
                    params![message_id],
                    |row| row.get(0),
                )
                .optional()?;
            status.map(|s| conv::status_from_str(&s)).transpose()
        })
        .await
    }

    pub async fn get_message(&self, message_id: &str) -> DomainResult<Option<MessageLog>> {
        let message_id = message_id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT * FROM message_logs WHERE message_id = ?1",
                params![message_id],
                |row| Ok(message_from_row(row)),
            )
            .optional()?
            .transpose()
        })
        .await
    }

    pub async fn list_messages(
        &self,
        site_id: &str,
        filters: MessageFilters,
    ) -> DomainResult<(Vec<MessageLog>, u64)> {
        let site_id = site_id.to_string();
        self.with_conn(move |conn| {
            let mut where_clauses = vec!["site_id = ?1".to_string()];
            let mut idx = 2;
            let mut bind_status = None;
            let mut bind_channel = None;
            let mut bind_from = None;
            let mut bind_to = None;

            if let Some(status) = filters.status {
                where_clauses.push(format!("status = ?{idx}"));
                bind_status = Some(conv::status_to_str(status));
                idx += 1;
            }
            if let Some(channel) = filters.channel {
                where_clauses.push(format!("channel = ?{idx}"));
                bind_channel = Some(conv::channel_to_str(channel));
                idx += 1;
            }
            if let Some(from) = filters.from {
                where_clauses.push(format!("created_at >= ?{idx}"));
                bind_from = Some(fmt_odt(from));
                idx += 1;
            }
            if let Some(to) = filters.to {
                where_clauses.push(format!("created_at <= ?{idx}"));
                bind_to = Some(fmt_odt(to));
                idx += 1;
            }
            let where_sql = where_clauses.join(" AND ");

            let page_size = filters.page_size.max(1).min(500) as i64;
            let offset = (filters.page.max(1) - 1) as i64 * page_size;

            let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(site_id.clone())];
            for v in [bind_status, bind_channel, bind_from.as_deref(), bind_to.as_deref()]
                .into_iter()
                .flatten()
            {
                params_vec.push(Box::new(v.to_string()));
            }
            let _ = idx;

            let count_sql = format!("SELECT COUNT(*) FROM message_logs WHERE {where_sql}");
            let total: i64 = conn.query_row(
                &count_sql,
                rusqlite::params_from_iter(params_vec.iter().map(|b| b.as_ref())),
                |row| row.get(0),
            )?;

            let list_sql = format!(
                "SELECT * FROM message_logs WHERE {where_sql} ORDER BY created_at DESC LIMIT {page_size} OFFSET {offset}"
            );
            let mut stmt = conn.prepare(&list_sql)?;
            let rows = stmt
                .query_map(
                    rusqlite::params_from_iter(params_vec.iter().map(|b| b.as_ref())),
                    message_from_row,
                )?
                .collect::<Result<Vec<_>, _>>()?;

            Ok((rows, total.max(0) as u64))
        })
        .await
    }

    pub async fn stats_for_site(&self, site_id: &str) -> DomainResult<SiteStats> {
        let site_id = site_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT status, COUNT(*) FROM message_logs WHERE site_id = ?1 GROUP BY status",
            )?;
            let mut stats = SiteStats::default();
            let rows = stmt.query_map(params![site_id], |row| {
                let status: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                Ok((status, count))
            })?;
            let mut total_terminal_days: i64 = 0;
            for row in rows {
                let (status, count) = row?;
                match status.as_str() {
                    "PENDING" => stats.total_pending = count,
                    "SCHEDULED" => stats.total_scheduled = count,
                    "SENT" => stats.total_sent = count,
                    "DELIVERED" => stats.total_delivered = count,
                    "FAILED" => stats.total_failed = count,
                    "BOUNCED" => stats.total_bounced = count,
                    "REJECTED" => stats.total_rejected = count,
                    _ => {}
                }
            }
            let attempted = stats.total_delivered + stats.total_failed + stats.total_bounced + stats.total_rejected;
            stats.success_rate = if attempted > 0 {
                stats.total_delivered as f64 / attempted as f64
            } else {
                0.0
            };
            let days: i64 = conn.query_row(
                "SELECT COUNT(DISTINCT date) FROM site_metrics_daily WHERE site_id = ?1",
                params![site_id],
                |row| row.get(0),
            )?;
            total_terminal_days = days.max(1);
            stats.average_per_day = (stats.total_sent as f64) / (total_terminal_days as f64);
            Ok(stats)
        })
        .await
    }

    pub async fn daily_metrics(
        &self,
        site_id: &str,
        from: Date,
        to: Date,
    ) -> DomainResult<Vec<SiteMetricsDaily>> {
        let site_id = site_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT channel, date, total_sent, total_delivered, total_failed
                 FROM site_metrics_daily
                 WHERE site_id = ?1 AND date >= ?2 AND date <= ?3
                 ORDER BY date ASC",
            )?;
            let rows = stmt
                .query_map(
                    params![site_id, from.to_string(), to.to_string()],
                    |row| {
                        let channel_str: String = row.get(0)?;
                        let date_str: String = row.get(1)?;
                        Ok((channel_str, date_str, row.get(2)?, row.get(3)?, row.get(4)?))
                    },
                )?
                .collect::<Result<Vec<(String, String, i64, i64, i64)>, _>>()?;

            rows.into_iter()
                .map(|(channel_str, date_str, sent, delivered, failed)| {
                    Ok(SiteMetricsDaily {
                        site_id: site_id.clone(),
                        channel: conv::channel_from_str(&channel_str)?,
                        date: parse_date(&date_str)?,
                        total_sent: sent,
                        total_delivered: delivered,
                        total_failed: failed,
                    })
                })
                .collect()
        })
        .await
    }

    // ---- C5: scheduler & retry scans ----------------------------------

    pub async fn select_due_scheduled(
        &self,
        batch_size: u32,
    ) -> DomainResult<Vec<DueScheduledMessage>> {
        let now = fmt_odt(OffsetDateTime::now_utc());
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM message_logs WHERE status = 'SCHEDULED' AND scheduled_at <= ?1
                 ORDER BY scheduled_at ASC LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![now, batch_size], message_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows
                .into_iter()
                .map(|m| DueScheduledMessage {
                    message_id: m.message_id.clone(),
                    envelope: envelope_from_message(&m),
                })
                .collect())
        })
        .await
    }

    pub async fn select_due_failed(&self, batch_size: u32) -> DomainResult<Vec<DueFailedMessage>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM message_logs WHERE status = 'FAILED'
                 ORDER BY updated_at ASC LIMIT ?1",
            )?;
            let rows = stmt
                .query_map(params![batch_size], message_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows
                .into_iter()
                .filter_map(|m| {
                    m.failure_type.map(|classification| DueFailedMessage {
                        message_id: m.message_id.clone(),
                        envelope: envelope_from_message(&m),
                        classification,
                        retry_count: m.retry_count,
                        updated_at: m.updated_at,
                    })
                })
                .collect())
        })
        .await
    }

    pub async fn transition_scheduled_to_pending(&self, message_id: &str) -> DomainResult<()> {
        self.update_status(
            message_id,
            MessageStatus::Pending,
            None,
            StatusSource::Scheduler,
            None,
        )
        .await
        .map(|_| ())
    }

    pub async fn revert_to_scheduled(&self, message_id: &str) -> DomainResult<()> {
        self.update_status(
            message_id,
            MessageStatus::Scheduled,
            None,
            StatusSource::Scheduler,
            None,
        )
        .await
        .map(|_| ())
    }

    /// Republish path: transitions `FAILED -> PENDING` and increments
    /// `retry_count` in the same transaction. This is the only place in the
    /// system allowed to touch `retry_count`.
    pub async fn retry_and_increment(&self, message_id: &str) -> DomainResult<()> {
        let message_id = message_id.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let current_status: String = tx.query_row(
                "SELECT status FROM message_logs WHERE message_id = ?1",
                params![message_id],
                |row| row.get(0),
            )?;
            let now = fmt_odt(OffsetDateTime::now_utc());
            tx.execute(
                "INSERT INTO message_status_history (message_id, old_status, new_status, source, changed_at)
                 VALUES (?1, ?2, 'PENDING', 'RETRY', ?3)",
                params![message_id, current_status, now],
            )?;
            tx.execute(
                "UPDATE message_logs SET status = 'PENDING', retry_count = retry_count + 1, updated_at = ?2
                 WHERE message_id = ?1",
                params![message_id, now],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Revert path when republish fails: back to `FAILED` without touching
    /// `retry_count`, so the next cycle retries at the same attempt number.
    pub async fn revert_retry_to_failed(&self, message_id: &str) -> DomainResult<()> {
        self.update_status(
            message_id,
            MessageStatus::Failed,
            None,
            StatusSource::Retry,
            None,
        )
        .await
        .map(|_| ())
    }

    /// Marks a message as DLQ-routed: stays `FAILED`, retains its
    /// classification, appends a history note.
    pub async fn mark_dlq_routed(&self, message_id: &str) -> DomainResult<()> {
        self.update_status(
            message_id,
            MessageStatus::Failed,
            Some("DLQ routed".to_string()),
            StatusSource::Retry,
            None,
        )
        .await
        .map(|_| ())
    }
}

fn bump_daily_counter(
    tx: &rusqlite::Transaction,
    site_id: &str,
    channel: Channel,
    date: Date,
    new_status: MessageStatus,
) -> anyhow::Result<()> {
    let date_str = date.to_string();
    tx.execute(
        "INSERT INTO site_metrics_daily (site_id, channel, date, total_sent, total_delivered, total_failed)
         VALUES (?1, ?2, ?3, 0, 0, 0)
         ON CONFLICT(site_id, channel, date) DO NOTHING",
        params![site_id, conv::channel_to_str(channel), date_str],
    )?;
    let column = match new_status {
        MessageStatus::Delivered => "total_delivered",
        MessageStatus::Failed | MessageStatus::Bounced | MessageStatus::Rejected => "total_failed",
        _ => return Ok(()),
    };
    tx.execute(
        &format!(
            "UPDATE site_metrics_daily SET {column} = {column} + 1
             WHERE site_id = ?1 AND channel = ?2 AND date = ?3"
        ),
        params![site_id, conv::channel_to_str(channel), date_str],
    )?;
    Ok(())
}

fn bump_sent_counter(
    tx: &rusqlite::Transaction,
    site_id: &str,
    channel: Channel,
    date: Date,
) -> anyhow::Result<()> {
    let date_str = date.to_string();
    tx.execute(
        "INSERT INTO site_metrics_daily (site_id, channel, date, total_sent, total_delivered, total_failed)
         VALUES (?1, ?2, ?3, 1, 0, 0)
         ON CONFLICT(site_id, channel, date) DO UPDATE SET total_sent = total_sent + 1",
        params![site_id, conv::channel_to_str(channel), date_str],
    )?;
    Ok(())
}

fn bounded_error_text(raw: &str) -> String {
    const MAX_LEN: usize = 4096;
    if raw.len() > MAX_LEN {
        format!("{}... [truncated]", &raw[..MAX_LEN])
    } else {
        raw.to_string()
    }
}

fn now_rfc3339() -> String {
    fmt_odt(OffsetDateTime::now_utc())
}

fn fmt_odt(dt: OffsetDateTime) -> String {
    dt.format(&time::format_description::well_known::Rfc3339)
        .expect("rfc3339 formatting never fails for a valid OffsetDateTime")
}

fn parse_odt(s: &str) -> anyhow::Result<OffsetDateTime> {
    Ok(OffsetDateTime::parse(
        s,
        &time::format_description::well_known::Rfc3339,
    )?)
}

fn parse_date(s: &str) -> anyhow::Result<Date> {
    let format = time::macros::format_description!("[year]-[month]-[day]");
    Ok(Date::parse(s, &format)?)
}

fn site_from_row(row: &rusqlite::Row) -> rusqlite::Result<Site> {
    Ok(Site {
        site_id: row.get(0)?,
        site_name: row.get(1)?,
        api_key_hash: row.get(2)?,
        whatsapp_session_name: row.get(3)?,
        wasender_api_key_encrypted: row.get(4)?,
        sendgrid_api_key_encrypted: row.get(5)?,
        sendgrid_from_email: row.get(6)?,
        sendgrid_from_name: row.get(7)?,
        is_active: row.get::<_, i64>(8)? != 0,
        created_at: parse_odt(&row.get::<_, String>(9)?)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(e.into()))?,
        updated_at: parse_odt(&row.get::<_, String>(10)?)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(e.into()))?,
    })
}

fn message_from_row(row: &rusqlite::Row) -> rusqlite::Result<MessageLog> {
    let metadata_json: String = row.get("metadata_json")?;
    let metadata: HashMap<String, String> = serde_json::from_str(&metadata_json).unwrap_or_default();
    let channel_str: String = row.get("channel")?;
    let status_str: String = row.get("status")?;
    let failure_type_str: Option<String> = row.get("failure_type")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let scheduled_at: Option<String> = row.get("scheduled_at")?;
    let sent_at: Option<String> = row.get("sent_at")?;
    let delivered_at: Option<String> = row.get("delivered_at")?;

    let map_err = |e: anyhow::Error| rusqlite::Error::ToSqlConversionFailure(e.into());

    Ok(MessageLog {
        message_id: row.get("message_id")?,
        site_id: row.get("site_id")?,
        channel: conv::channel_from_str(&channel_str).map_err(map_err)?,
        status: conv::status_from_str(&status_str).map_err(map_err)?,
        recipient: row.get("recipient")?,
        subject: row.get("subject")?,
        body: row.get("body")?,
        from_email: row.get("from_email")?,
        from_name: row.get("from_name")?,
        is_html: row.get::<_, i64>("is_html")? != 0,
        image_url: row.get("image_url")?,
        video_url: row.get("video_url")?,
        document_url: row.get("document_url")?,
        file_name: row.get("file_name")?,
        caption: row.get("caption")?,
        error_message: row.get("error_message")?,
        retry_count: row.get("retry_count")?,
        failure_type: failure_type_str
            .map(|s| conv::classification_from_str(&s))
            .transpose()
            .map_err(map_err)?,
        metadata,
        created_at: parse_odt(&created_at).map_err(map_err)?,
        updated_at: parse_odt(&updated_at).map_err(map_err)?,
        scheduled_at: scheduled_at.map(|s| parse_odt(&s)).transpose().map_err(map_err)?,
        sent_at: sent_at.map(|s| parse_odt(&s)).transpose().map_err(map_err)?,
        delivered_at: delivered_at.map(|s| parse_odt(&s)).transpose().map_err(map_err)?,
        whatsapp_session_name: row.get("whatsapp_session_name")?,
    })
}

fn envelope_from_message(m: &MessageLog) -> MessageEnvelope {
    MessageEnvelope {
        message_id: m.message_id.clone(),
        site_id: m.site_id.clone(),
        channel: m.channel,
        recipient: m.recipient.clone(),
        subject: m.subject.clone(),
        body: m.body.clone(),
        from_email: m.from_email.clone(),
        from_name: m.from_name.clone(),
        is_html: m.is_html,
        image_url: m.image_url.clone(),
        video_url: m.video_url.clone(),
        document_url: m.document_url.clone(),
        file_name: m.file_name.clone(),
        caption: m.caption.clone(),
        whatsapp_session_name: m.whatsapp_session_name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify_domain::Channel;

    fn sample(site_id: &str) -> NewMessage {
        NewMessage {
            site_id: site_id.to_string(),
            channel: Channel::Email,
            recipient: "user@example.test".into(),
            subject: Some("hi".into()),
            body: "hello".into(),
            from_email: None,
            from_name: None,
            is_html: false,
            image_url: None,
            video_url: None,
            document_url: None,
            file_name: None,
            caption: None,
            metadata: HashMap::new(),
            scheduled_at: None,
            whatsapp_session_name: None,
        }
    }

    #[tokio::test]
    async fn register_then_authenticate_round_trips() {
        let store = MessageStore::open_in_memory().unwrap();
        let (_, raw_key) = store.register_site("acme".into()).await.unwrap();
        let site = store.authenticate_site(&raw_key).await.unwrap();
        assert!(site.is_some());

        let mut mutated = raw_key.clone();
        mutated.push('x');
        assert!(store.authenticate_site(&mutated).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_then_history_row_exists() {
        let store = MessageStore::open_in_memory().unwrap();
        let (site_id, _) = store.register_site("acme".into()).await.unwrap();
        let (message_id, status) = store.create_message(sample(&site_id)).await.unwrap();
        assert_eq!(status, MessageStatus::Pending);
        assert_eq!(
            store.get_status(&message_id).await.unwrap(),
            Some(MessageStatus::Pending)
        );
    }

    #[tokio::test]
    async fn delivered_is_sticky() {
        let store = MessageStore::open_in_memory().unwrap();
        let (site_id, _) = store.register_site("acme".into()).await.unwrap();
        let (message_id, _) = store.create_message(sample(&site_id)).await.unwrap();

        let outcome = store
            .update_status(
                &message_id,
                MessageStatus::Delivered,
                None,
                StatusSource::WorkerEmail,
                None,
            )
            .await
            .unwrap();
        assert!(outcome.applied);

        let outcome2 = store
            .update_status(
                &message_id,
                MessageStatus::Failed,
                Some("should be ignored".into()),
                StatusSource::WorkerEmail,
                Some(Classification::Transient),
            )
            .await
            .unwrap();
        assert!(!outcome2.applied);
        assert_eq!(
            store.get_status(&message_id).await.unwrap(),
            Some(MessageStatus::Delivered)
        );
    }

    #[tokio::test]
    async fn terminal_transition_bumps_daily_counter() {
        let store = MessageStore::open_in_memory().unwrap();
        let (site_id, _) = store.register_site("acme".into()).await.unwrap();
        let (message_id, _) = store.create_message(sample(&site_id)).await.unwrap();
        store
            .update_status(
                &message_id,
                MessageStatus::Delivered,
                None,
                StatusSource::WorkerEmail,
                None,
            )
            .await
            .unwrap();

        let today = OffsetDateTime::now_utc().date();
        let metrics = store.daily_metrics(&site_id, today, today).await.unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].total_delivered, 1);
    }

    #[tokio::test]
    async fn tenant_isolation_lookup() {
        let store = MessageStore::open_in_memory().unwrap();
        let (site_id, _) = store.register_site("acme".into()).await.unwrap();
        let (message_id, _) = store.create_message(sample(&site_id)).await.unwrap();
        assert_eq!(store.get_site_id(&message_id).await.unwrap(), Some(site_id));
    }

    #[tokio::test]
    async fn retry_increments_only_via_retry_path() {
        let store = MessageStore::open_in_memory().unwrap();
        let (site_id, _) = store.register_site("acme".into()).await.unwrap();
        let (message_id, _) = store.create_message(sample(&site_id)).await.unwrap();
        store
            .update_status(
                &message_id,
                MessageStatus::Failed,
                Some("boom".into()),
                StatusSource::WorkerEmail,
                Some(Classification::Transient),
            )
            .await
            .unwrap();

        let due = store.select_due_failed(10).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].retry_count, 0);

        store.retry_and_increment(&message_id).await.unwrap();
        let msg = store.get_message(&message_id).await.unwrap().unwrap();
        assert_eq!(msg.retry_count, 1);
        assert_eq!(msg.status, MessageStatus::Pending);
    }
}
