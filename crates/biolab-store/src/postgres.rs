//! PostgreSQL store
//!
//! Users, sessions and lab records in one database using SQLx. Enumerations
//! are stored as text and parsed back into their closed types on read.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;

use biolab_core::{
    CredentialStore, DashboardStats, DatabaseConfig, LabError, LabStore, NewNotification,
    NewProtocol, NewReport, NewSample, NewSensorReading, NewUser, Notification, Protocol,
    ProtocolPatch, Report, ReportPatch, Result, Sample, SamplePatch, SensorReading,
    SessionRecord, SessionStore, User, UserPatch,
};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Make `%`, `_` and `\` match themselves in an `ESCAPE '\'` pattern
fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Human-readable conflict messages keyed by unique constraint
fn conflict_message(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some("users_username_key") => "Username already exists",
        Some("users_email_key") => "Email already exists",
        Some("samples_sample_id_key") => "Sample ID already exists",
        _ => "Record already exists",
    }
}

fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> LabError {
    move |e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            LabError::Conflict(conflict_message(db.constraint()).to_string())
        }
        _ => LabError::DatabaseError(format!("{context}: {e}")),
    }
}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new connection pool
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(|e| LabError::DatabaseError(format!("PostgreSQL connection failed: {e}")))?;

        Ok(Self { pool })
    }

    /// Create from an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending schema migrations
    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| LabError::DatabaseError(format!("Migration failed: {e}")))?;
        tracing::info!("Database migrations applied");
        Ok(())
    }
}

// ============================================================================
// Rows
// ============================================================================

const USER_COLUMNS: &str = "id, username, password, first_name, last_name, email, mobile, role, \
                            city, profile_picture, created_at";

#[derive(Debug, FromRow)]
struct UserRow {
    id: i32,
    username: String,
    password: String,
    first_name: String,
    last_name: String,
    email: String,
    mobile: Option<String>,
    role: String,
    city: Option<String>,
    profile_picture: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = LabError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: row.id,
            username: row.username,
            password_hash: row.password,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            mobile: row.mobile,
            role: row.role.parse()?,
            city: row.city,
            profile_picture: row.profile_picture,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct SessionRow {
    token_hash: String,
    user_id: i32,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl From<SessionRow> for SessionRecord {
    fn from(row: SessionRow) -> Self {
        SessionRecord {
            token_hash: row.token_hash,
            user_id: row.user_id,
            created_at: row.created_at,
            expires_at: row.expires_at,
        }
    }
}

const SAMPLE_COLUMNS: &str = "id, sample_id, user_id, sample_type, collection_date, \
                              collection_time, location, geolocation, temperature, ph, salinity, \
                              conductivity, field_conditions, status, qr_code, barcode, created_at";

#[derive(Debug, FromRow)]
struct SampleRow {
    id: i32,
    sample_id: String,
    user_id: i32,
    sample_type: String,
    collection_date: DateTime<Utc>,
    collection_time: String,
    location: Option<String>,
    geolocation: Option<serde_json::Value>,
    temperature: Option<f64>,
    ph: Option<f64>,
    salinity: Option<f64>,
    conductivity: Option<f64>,
    field_conditions: Option<serde_json::Value>,
    status: String,
    qr_code: Option<String>,
    barcode: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<SampleRow> for Sample {
    type Error = LabError;

    fn try_from(row: SampleRow) -> Result<Self> {
        Ok(Sample {
            id: row.id,
            sample_id: row.sample_id,
            user_id: row.user_id,
            sample_type: row.sample_type.parse()?,
            collection_date: row.collection_date,
            collection_time: row.collection_time,
            location: row.location,
            geolocation: row.geolocation,
            temperature: row.temperature,
            ph: row.ph,
            salinity: row.salinity,
            conductivity: row.conductivity,
            field_conditions: row.field_conditions,
            status: row.status.parse()?,
            qr_code: row.qr_code,
            barcode: row.barcode,
            created_at: row.created_at,
        })
    }
}

const PROTOCOL_COLUMNS: &str =
    "id, title, description, category, content, status, created_by, created_at, updated_at";

#[derive(Debug, FromRow)]
struct ProtocolRow {
    id: i32,
    title: String,
    description: String,
    category: String,
    content: String,
    status: String,
    created_by: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProtocolRow> for Protocol {
    type Error = LabError;

    fn try_from(row: ProtocolRow) -> Result<Self> {
        Ok(Protocol {
            id: row.id,
            title: row.title,
            description: row.description,
            category: row.category,
            content: row.content,
            status: row.status.parse()?,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const REPORT_COLUMNS: &str =
    "id, sample_id, title, content, generated_by, status, pdf_path, created_at, updated_at";

#[derive(Debug, FromRow)]
struct ReportRow {
    id: i32,
    sample_id: i32,
    title: String,
    content: serde_json::Value,
    generated_by: i32,
    status: String,
    pdf_path: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReportRow> for Report {
    type Error = LabError;

    fn try_from(row: ReportRow) -> Result<Self> {
        Ok(Report {
            id: row.id,
            sample_id: row.sample_id,
            title: row.title,
            content: row.content,
            generated_by: row.generated_by,
            status: row.status.parse()?,
            pdf_path: row.pdf_path,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const NOTIFICATION_COLUMNS: &str = "id, user_id, title, message, type, read, created_at";

#[derive(Debug, FromRow)]
struct NotificationRow {
    id: i32,
    user_id: i32,
    title: String,
    message: String,
    #[sqlx(rename = "type")]
    kind: String,
    read: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = LabError;

    fn try_from(row: NotificationRow) -> Result<Self> {
        Ok(Notification {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            message: row.message,
            kind: row.kind.parse()?,
            read: row.read,
            created_at: row.created_at,
        })
    }
}

const SENSOR_COLUMNS: &str = "id, sample_id, sensor_type, value, unit, timestamp";

#[derive(Debug, FromRow)]
struct SensorRow {
    id: i32,
    sample_id: i32,
    sensor_type: String,
    value: f64,
    unit: String,
    timestamp: DateTime<Utc>,
}

impl From<SensorRow> for SensorReading {
    fn from(row: SensorRow) -> Self {
        SensorReading {
            id: row.id,
            sample_id: row.sample_id,
            sensor_type: row.sensor_type,
            value: row.value,
            unit: row.unit,
            timestamp: row.timestamp,
        }
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>>
where
    T: TryFrom<R, Error = LabError>,
{
    rows.into_iter().map(T::try_from).collect()
}

// ============================================================================
// Credentials
// ============================================================================

#[async_trait]
impl CredentialStore for PgStore {
    async fn get_user(&self, id: i32) -> Result<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error("Failed to get user"))?;

        row.map(User::try_from).transpose()
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1"))
                .bind(username)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error("Failed to get user by username"))?;

        row.map(User::try_from).transpose()
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to get user by email"))?;

        row.map(User::try_from).transpose()
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let row: UserRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO users (
                username, password, first_name, last_name, email,
                mobile, role, city, profile_picture
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.mobile)
        .bind(user.role.as_str())
        .bind(&user.city)
        .bind(&user.profile_picture)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to create user"))?;

        row.try_into()
    }

    async fn update_user(&self, id: i32, patch: &UserPatch) -> Result<User> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            r#"
            UPDATE users SET
                username = COALESCE($2, username),
                password = COALESCE($3, password),
                first_name = COALESCE($4, first_name),
                last_name = COALESCE($5, last_name),
                email = COALESCE($6, email),
                mobile = COALESCE($7, mobile),
                role = COALESCE($8, role),
                city = COALESCE($9, city),
                profile_picture = COALESCE($10, profile_picture)
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.username.as_deref().map(biolab_core::normalize_username))
        .bind(&patch.password_hash)
        .bind(&patch.first_name)
        .bind(&patch.last_name)
        .bind(&patch.email)
        .bind(&patch.mobile)
        .bind(patch.role.map(|r| r.as_str()))
        .bind(&patch.city)
        .bind(&patch.profile_picture)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to update user"))?;

        row.ok_or_else(|| LabError::NotFound(format!("user {id}")))?
            .try_into()
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list users"))?;

        convert_all(rows)
    }

    async fn delete_user(&self, id: i32) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to delete user"))?;

        Ok(result.rows_affected() > 0)
    }
}

// ============================================================================
// Sessions
// ============================================================================

#[async_trait]
impl SessionStore for PgStore {
    async fn create_session(&self, session: SessionRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO sessions (token_hash, user_id, created_at, expires_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(&session.token_hash)
        .bind(session.user_id)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to create session"))?;

        Ok(())
    }

    async fn find_session(&self, token_hash: &str) -> Result<Option<SessionRecord>> {
        let row: Option<SessionRow> = sqlx::query_as(
            "SELECT token_hash, user_id, created_at, expires_at FROM sessions WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to find session"))?;

        Ok(row.map(SessionRecord::from))
    }

    async fn touch_session(&self, token_hash: &str, expires_at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE sessions SET expires_at = $2 WHERE token_hash = $1")
            .bind(token_hash)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to touch session"))?;

        Ok(())
    }

    async fn destroy_session(&self, token_hash: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to destroy session"))?;

        Ok(())
    }

    async fn destroy_sessions_for_user(&self, user_id: i32) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to destroy user sessions"))?;

        Ok(result.rows_affected())
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to purge sessions"))?;

        Ok(result.rows_affected())
    }
}

// ============================================================================
// Lab records
// ============================================================================

#[async_trait]
impl LabStore for PgStore {
    async fn get_sample(&self, id: i32) -> Result<Option<Sample>> {
        let row: Option<SampleRow> =
            sqlx::query_as(&format!("SELECT {SAMPLE_COLUMNS} FROM samples WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error("Failed to get sample"))?;

        row.map(Sample::try_from).transpose()
    }

    async fn get_sample_by_code(&self, sample_id: &str) -> Result<Option<Sample>> {
        let row: Option<SampleRow> = sqlx::query_as(&format!(
            "SELECT {SAMPLE_COLUMNS} FROM samples WHERE sample_id = $1"
        ))
        .bind(sample_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to get sample by code"))?;

        row.map(Sample::try_from).transpose()
    }

    async fn list_samples(&self) -> Result<Vec<Sample>> {
        let rows: Vec<SampleRow> = sqlx::query_as(&format!(
            "SELECT {SAMPLE_COLUMNS} FROM samples ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list samples"))?;

        convert_all(rows)
    }

    async fn list_samples_by_user(&self, user_id: i32) -> Result<Vec<Sample>> {
        let rows: Vec<SampleRow> = sqlx::query_as(&format!(
            "SELECT {SAMPLE_COLUMNS} FROM samples WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list samples"))?;

        convert_all(rows)
    }

    async fn create_sample(&self, sample: NewSample) -> Result<Sample> {
        let row: SampleRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO samples (
                sample_id, user_id, sample_type, collection_date, collection_time,
                location, geolocation, temperature, ph, salinity,
                conductivity, field_conditions, status, qr_code, barcode
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {SAMPLE_COLUMNS}
            "#
        ))
        .bind(&sample.sample_id)
        .bind(sample.user_id)
        .bind(sample.sample_type.as_str())
        .bind(sample.collection_date)
        .bind(&sample.collection_time)
        .bind(&sample.location)
        .bind(&sample.geolocation)
        .bind(sample.temperature)
        .bind(sample.ph)
        .bind(sample.salinity)
        .bind(sample.conductivity)
        .bind(&sample.field_conditions)
        .bind(sample.status.as_str())
        .bind(&sample.qr_code)
        .bind(&sample.barcode)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to create sample"))?;

        row.try_into()
    }

    async fn update_sample(&self, id: i32, patch: &SamplePatch) -> Result<Sample> {
        let row: Option<SampleRow> = sqlx::query_as(&format!(
            r#"
            UPDATE samples SET
                sample_id = COALESCE($2, sample_id),
                sample_type = COALESCE($3, sample_type),
                collection_date = COALESCE($4, collection_date),
                collection_time = COALESCE($5, collection_time),
                location = COALESCE($6, location),
                geolocation = COALESCE($7, geolocation),
                temperature = COALESCE($8, temperature),
                ph = COALESCE($9, ph),
                salinity = COALESCE($10, salinity),
                conductivity = COALESCE($11, conductivity),
                field_conditions = COALESCE($12, field_conditions),
                status = COALESCE($13, status),
                qr_code = COALESCE($14, qr_code),
                barcode = COALESCE($15, barcode)
            WHERE id = $1
            RETURNING {SAMPLE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&patch.sample_id)
        .bind(patch.sample_type.map(|t| t.as_str()))
        .bind(patch.collection_date)
        .bind(&patch.collection_time)
        .bind(&patch.location)
        .bind(&patch.geolocation)
        .bind(patch.temperature)
        .bind(patch.ph)
        .bind(patch.salinity)
        .bind(patch.conductivity)
        .bind(&patch.field_conditions)
        .bind(patch.status.map(|s| s.as_str()))
        .bind(&patch.qr_code)
        .bind(&patch.barcode)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to update sample"))?;

        row.ok_or_else(|| LabError::NotFound(format!("sample {id}")))?
            .try_into()
    }

    async fn delete_sample(&self, id: i32) -> Result<bool> {
        let result = sqlx::query("DELETE FROM samples WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to delete sample"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_protocol(&self, id: i32) -> Result<Option<Protocol>> {
        let row: Option<ProtocolRow> =
            sqlx::query_as(&format!("SELECT {PROTOCOL_COLUMNS} FROM protocols WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error("Failed to get protocol"))?;

        row.map(Protocol::try_from).transpose()
    }

    async fn list_protocols(&self) -> Result<Vec<Protocol>> {
        let rows: Vec<ProtocolRow> = sqlx::query_as(&format!(
            "SELECT {PROTOCOL_COLUMNS} FROM protocols ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list protocols"))?;

        convert_all(rows)
    }

    async fn search_protocols(&self, query: &str) -> Result<Vec<Protocol>> {
        let pattern = format!("%{}%", escape_like(query));
        let rows: Vec<ProtocolRow> = sqlx::query_as(&format!(
            r#"
            SELECT {PROTOCOL_COLUMNS} FROM protocols
            WHERE title ILIKE $1 ESCAPE '\'
               OR description ILIKE $1 ESCAPE '\'
               OR category ILIKE $1 ESCAPE '\'
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to search protocols"))?;

        convert_all(rows)
    }

    async fn create_protocol(&self, protocol: NewProtocol) -> Result<Protocol> {
        let row: ProtocolRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO protocols (title, description, category, content, status, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PROTOCOL_COLUMNS}
            "#
        ))
        .bind(&protocol.title)
        .bind(&protocol.description)
        .bind(&protocol.category)
        .bind(&protocol.content)
        .bind(protocol.status.as_str())
        .bind(protocol.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to create protocol"))?;

        row.try_into()
    }

    async fn update_protocol(&self, id: i32, patch: &ProtocolPatch) -> Result<Protocol> {
        let row: Option<ProtocolRow> = sqlx::query_as(&format!(
            r#"
            UPDATE protocols SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                category = COALESCE($4, category),
                content = COALESCE($5, content),
                status = COALESCE($6, status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PROTOCOL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&patch.title)
        .bind(&patch.description)
        .bind(&patch.category)
        .bind(&patch.content)
        .bind(patch.status.map(|s| s.as_str()))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to update protocol"))?;

        row.ok_or_else(|| LabError::NotFound(format!("protocol {id}")))?
            .try_into()
    }

    async fn delete_protocol(&self, id: i32) -> Result<bool> {
        let result = sqlx::query("DELETE FROM protocols WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to delete protocol"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_report(&self, id: i32) -> Result<Option<Report>> {
        let row: Option<ReportRow> =
            sqlx::query_as(&format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error("Failed to get report"))?;

        row.map(Report::try_from).transpose()
    }

    async fn list_reports(&self) -> Result<Vec<Report>> {
        let rows: Vec<ReportRow> = sqlx::query_as(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list reports"))?;

        convert_all(rows)
    }

    async fn list_reports_by_user(&self, user_id: i32) -> Result<Vec<Report>> {
        let rows: Vec<ReportRow> = sqlx::query_as(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports WHERE generated_by = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list reports"))?;

        convert_all(rows)
    }

    async fn list_reports_by_sample(&self, sample_id: i32) -> Result<Vec<Report>> {
        let rows: Vec<ReportRow> = sqlx::query_as(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports WHERE sample_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(sample_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list reports"))?;

        convert_all(rows)
    }

    async fn create_report(&self, report: NewReport) -> Result<Report> {
        let row: ReportRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO reports (sample_id, title, content, generated_by, status, pdf_path)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {REPORT_COLUMNS}
            "#
        ))
        .bind(report.sample_id)
        .bind(&report.title)
        .bind(&report.content)
        .bind(report.generated_by)
        .bind(report.status.as_str())
        .bind(&report.pdf_path)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to create report"))?;

        row.try_into()
    }

    async fn update_report(&self, id: i32, patch: &ReportPatch) -> Result<Report> {
        let row: Option<ReportRow> = sqlx::query_as(&format!(
            r#"
            UPDATE reports SET
                title = COALESCE($2, title),
                content = COALESCE($3, content),
                status = COALESCE($4, status),
                pdf_path = COALESCE($5, pdf_path),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {REPORT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&patch.title)
        .bind(&patch.content)
        .bind(patch.status.map(|s| s.as_str()))
        .bind(&patch.pdf_path)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to update report"))?;

        row.ok_or_else(|| LabError::NotFound(format!("report {id}")))?
            .try_into()
    }

    async fn delete_report(&self, id: i32) -> Result<bool> {
        let result = sqlx::query("DELETE FROM reports WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to delete report"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_notification(&self, id: i32) -> Result<Option<Notification>> {
        let row: Option<NotificationRow> = sqlx::query_as(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to get notification"))?;

        row.map(Notification::try_from).transpose()
    }

    async fn list_notifications(&self) -> Result<Vec<Notification>> {
        let rows: Vec<NotificationRow> = sqlx::query_as(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list notifications"))?;

        convert_all(rows)
    }

    async fn list_notifications_by_user(&self, user_id: i32) -> Result<Vec<Notification>> {
        let rows: Vec<NotificationRow> = sqlx::query_as(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list notifications"))?;

        convert_all(rows)
    }

    async fn create_notification(&self, notification: NewNotification) -> Result<Notification> {
        let row: NotificationRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO notifications (user_id, title, message, type)
            VALUES ($1, $2, $3, $4)
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(notification.user_id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.kind.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to create notification"))?;

        row.try_into()
    }

    async fn mark_notification_read(&self, id: i32) -> Result<()> {
        let result = sqlx::query("UPDATE notifications SET read = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to mark notification as read"))?;

        if result.rows_affected() == 0 {
            return Err(LabError::NotFound(format!("notification {id}")));
        }
        Ok(())
    }

    async fn delete_notification(&self, id: i32) -> Result<bool> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to delete notification"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_sensor_reading(&self, id: i32) -> Result<Option<SensorReading>> {
        let row: Option<SensorRow> =
            sqlx::query_as(&format!("SELECT {SENSOR_COLUMNS} FROM sensor_data WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error("Failed to get sensor reading"))?;

        Ok(row.map(SensorReading::from))
    }

    async fn list_sensor_readings(&self, sample_id: i32) -> Result<Vec<SensorReading>> {
        let rows: Vec<SensorRow> = sqlx::query_as(&format!(
            "SELECT {SENSOR_COLUMNS} FROM sensor_data WHERE sample_id = $1 ORDER BY timestamp DESC, id DESC"
        ))
        .bind(sample_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list sensor readings"))?;

        Ok(rows.into_iter().map(SensorReading::from).collect())
    }

    async fn create_sensor_reading(&self, reading: NewSensorReading) -> Result<SensorReading> {
        let row: SensorRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO sensor_data (sample_id, sensor_type, value, unit)
            VALUES ($1, $2, $3, $4)
            RETURNING {SENSOR_COLUMNS}
            "#
        ))
        .bind(reading.sample_id)
        .bind(&reading.sensor_type)
        .bind(reading.value)
        .bind(&reading.unit)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to create sensor reading"))?;

        Ok(row.into())
    }

    async fn delete_sensor_reading(&self, id: i32) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sensor_data WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to delete sensor reading"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn dashboard_stats(&self) -> Result<DashboardStats> {
        let (total_samples, active_users, pending_reports, completed_samples): (
            i64,
            i64,
            i64,
            i64,
        ) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM samples),
                (SELECT COUNT(*) FROM users),
                (SELECT COUNT(*) FROM reports WHERE status = 'draft'),
                (SELECT COUNT(*) FROM samples WHERE status = 'completed')
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to compute dashboard stats"))?;

        Ok(DashboardStats {
            total_samples,
            active_users,
            pending_reports,
            completed_samples,
        })
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_error("Database ping failed"))?;
        Ok(())
    }
}
