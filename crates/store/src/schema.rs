pub const CREATE_TABLES_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS sites (
    site_id TEXT PRIMARY KEY,
    site_name TEXT NOT NULL UNIQUE,
    api_key_hash TEXT NOT NULL UNIQUE,
    whatsapp_session_name TEXT,
    wasender_api_key_encrypted TEXT,
    sendgrid_api_key_encrypted TEXT,
    sendgrid_from_email TEXT,
    sendgrid_from_name TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS message_logs (
    message_id TEXT PRIMARY KEY,
    site_id TEXT NOT NULL REFERENCES sites(site_id),
    channel TEXT NOT NULL,
    status TEXT NOT NULL,
    recipient TEXT NOT NULL,
    subject TEXT,
    body TEXT NOT NULL,
    from_email TEXT,
    from_name TEXT,
    is_html INTEGER NOT NULL DEFAULT 0,
    image_url TEXT,
    video_url TEXT,
    document_url TEXT,
    file_name TEXT,
    caption TEXT,
    error_message TEXT,
    retry_count INTEGER NOT NULL DEFAULT 0,
    failure_type TEXT,
    metadata_json TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    scheduled_at TEXT,
    sent_at TEXT,
    delivered_at TEXT,
    whatsapp_session_name TEXT
);

CREATE INDEX IF NOT EXISTS idx_message_logs_site ON message_logs(site_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_message_logs_status ON message_logs(status);

CREATE TABLE IF NOT EXISTS message_status_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    message_id TEXT NOT NULL REFERENCES message_logs(message_id),
    old_status TEXT,
    new_status TEXT NOT NULL,
    source TEXT NOT NULL,
    changed_at TEXT NOT NULL,
    note TEXT
);

CREATE INDEX IF NOT EXISTS idx_status_history_message ON message_status_history(message_id, changed_at DESC);

CREATE TABLE IF NOT EXISTS site_metrics_daily (
    site_id TEXT NOT NULL,
    channel TEXT NOT NULL,
    date TEXT NOT NULL,
    total_sent INTEGER NOT NULL DEFAULT 0,
    total_delivered INTEGER NOT NULL DEFAULT 0,
    total_failed INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (site_id, channel, date)
);
"#;
