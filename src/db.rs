use async_trait::async_trait;
use deadpool_postgres::{Config, Object, Pool, Runtime};
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use postgres_types::ToSql;
use tokio_postgres::Row;
use tracing::{error, info, warn};

use crate::config::DatabaseConfig;
use crate::error::AppError;
use crate::models::{
    Comment, Follow, Group, GroupRef, NewComment, NewGroup, NewPost, NewUser, Post, PostChanges,
    User,
};
use crate::store::{PostScope, Store};

/// 起動時に順番に流す DDL。すべて `IF NOT EXISTS` なので何度実行しても安全。
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "users table",
        r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGSERIAL PRIMARY KEY,
                username VARCHAR(150) NOT NULL,
                email VARCHAR(254) NOT NULL DEFAULT '',
                first_name VARCHAR(150) NOT NULL DEFAULT '',
                last_name VARCHAR(150) NOT NULL DEFAULT '',
                password_hash TEXT NOT NULL,
                date_joined TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                CONSTRAINT users_username_key UNIQUE (username)
            )
        "#,
    ),
    (
        "post_groups table",
        r#"
            CREATE TABLE IF NOT EXISTS post_groups (
                id BIGSERIAL PRIMARY KEY,
                title VARCHAR(200) NOT NULL,
                slug VARCHAR(50) NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                CONSTRAINT post_groups_slug_key UNIQUE (slug)
            )
        "#,
    ),
    (
        "posts table",
        r#"
            CREATE TABLE IF NOT EXISTS posts (
                id BIGSERIAL PRIMARY KEY,
                text TEXT NOT NULL,
                pub_date TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                author_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                group_id BIGINT REFERENCES post_groups(id) ON DELETE SET NULL,
                image VARCHAR(255)
            )
        "#,
    ),
    (
        "posts pub_date index",
        "CREATE INDEX IF NOT EXISTS idx_posts_pub_date ON posts(pub_date DESC, id DESC)",
    ),
    (
        "posts author index",
        "CREATE INDEX IF NOT EXISTS idx_posts_author_id ON posts(author_id)",
    ),
    (
        "posts group index",
        "CREATE INDEX IF NOT EXISTS idx_posts_group_id ON posts(group_id)",
    ),
    (
        "comments table",
        r#"
            CREATE TABLE IF NOT EXISTS comments (
                id BIGSERIAL PRIMARY KEY,
                post_id BIGINT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                author_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                text TEXT NOT NULL,
                created TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
        "#,
    ),
    (
        "comments post index",
        "CREATE INDEX IF NOT EXISTS idx_comments_post_id ON comments(post_id, created DESC)",
    ),
    (
        "follows table",
        r#"
            CREATE TABLE IF NOT EXISTS follows (
                id BIGSERIAL PRIMARY KEY,
                user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                author_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                CONSTRAINT one_following UNIQUE (user_id, author_id),
                CONSTRAINT user_not_author CHECK (user_id <> author_id)
            )
        "#,
    ),
];

const USER_COLUMNS: &str =
    "id, username, email, first_name, last_name, password_hash, date_joined";

/// 投稿一覧・詳細で共通の SELECT。著者名とグループを JOIN して一度に取る。
const POST_SELECT: &str = r#"
    SELECT p.id, p.text, p.image, p.pub_date, p.author_id, u.username, g.id, g.title, g.slug
    FROM posts p
    JOIN users u ON u.id = p.author_id
    LEFT JOIN post_groups g ON g.id = p.group_id
"#;

const COMMENT_SELECT: &str = r#"
    SELECT c.id, c.post_id, c.author_id, u.username, c.text, c.created
    FROM comments c
    JOIN users u ON u.id = c.author_id
"#;

/// PostgreSQL への接続プールを握るリポジトリ層。
/// Deadpool の `Pool` を内部に保持し、`Store` トレイトの各操作を実装する。
#[derive(Clone)]
pub struct Database {
    pool: Pool,
}

impl Database {
    /// 接続プールを構築し、起動時に疎通確認まで実施する。
    pub async fn new(config: DatabaseConfig) -> Result<Self, AppError> {
        info!("Creating PostgreSQL connection pool for host: {}:{}", config.host, config.port);

        let pool = Self::create_pool(config).await?;

        let db = Database { pool };
        db.test_connection().await?;

        Ok(db)
    }

    /// Deadpool 用の `Config` を組み立ててプールを生成する内部関数。
    /// `match` で SSL モードを切り替え、`native_tls` で TLS コネクタを差し込んでいる。
    async fn create_pool(config: DatabaseConfig) -> Result<Pool, AppError> {
        let mut pg_config = Config::new();

        pg_config.host = Some(config.host);
        pg_config.port = Some(config.port);
        pg_config.dbname = Some(config.database);
        pg_config.user = Some(config.username);
        pg_config.password = Some(config.password);

        match config.ssl_mode.as_str() {
            "disable" => {
                pg_config.ssl_mode = Some(deadpool_postgres::SslMode::Disable);
            }
            "prefer" => {
                pg_config.ssl_mode = Some(deadpool_postgres::SslMode::Prefer);
            }
            "require" => {
                pg_config.ssl_mode = Some(deadpool_postgres::SslMode::Require);
            }
            _ => {
                warn!("Unknown SSL mode '{}', defaulting to 'prefer'", config.ssl_mode);
                pg_config.ssl_mode = Some(deadpool_postgres::SslMode::Prefer);
            }
        }

        pg_config.manager = Some(deadpool_postgres::ManagerConfig {
            recycling_method: deadpool_postgres::RecyclingMethod::Fast,
        });

        let mut pool_config = deadpool_postgres::PoolConfig::new(config.max_connections as usize);
        pool_config.timeouts.wait = Some(config.connection_timeout);
        pg_config.pool = Some(pool_config);

        let tls_connector = TlsConnector::builder()
            .build()
            .map_err(|e| {
                error!("Failed to create TLS connector: {}", e);
                AppError::Database(format!("TLS connector creation failed: {}", e))
            })?;
        let tls = MakeTlsConnector::new(tls_connector);

        pg_config.create_pool(Some(Runtime::Tokio1), tls)
            .map_err(|e| {
                error!("Failed to create connection pool: {}", e);
                AppError::Database(format!("Connection pool creation failed: {}", e))
            })
    }

    /// プールから接続を借りる小さなラッパー。
    async fn get_connection(&self) -> Result<Object, AppError> {
        self.pool.get().await.map_err(AppError::from)
    }

    /// アプリ起動時にテーブル群を CREATE する簡易マイグレーター。
    pub async fn migrate(&self) -> Result<(), AppError> {
        info!("Running database migrations");

        let client = self.get_connection().await?;

        for (name, statement) in MIGRATIONS {
            client.execute(*statement, &[])
                .await
                .map_err(|e| {
                    error!("Migration '{}' failed: {}", name, e);
                    AppError::Database(format!("Migration '{}' failed: {}", name, e))
                })?;
        }

        info!("Database migrations completed successfully ({} statements)", MIGRATIONS.len());
        Ok(())
    }

    /// `Database::new` 直後にプール全体が機能するかの確認に使う。
    pub async fn test_connection(&self) -> Result<(), AppError> {
        let client = self.get_connection().await?;

        client.execute("SELECT 1", &[])
            .await
            .map_err(|e| {
                error!("Database connection test failed: {}", e);
                AppError::Database(format!("Connection test failed: {}", e))
            })?;

        info!("Database connection test successful");
        Ok(())
    }
}

fn user_from_row(row: &Row) -> User {
    User {
        id: row.get(0),
        username: row.get(1),
        email: row.get(2),
        first_name: row.get(3),
        last_name: row.get(4),
        password_hash: row.get(5),
        date_joined: row.get(6),
    }
}

fn group_from_row(row: &Row) -> Group {
    Group {
        id: row.get(0),
        title: row.get(1),
        slug: row.get(2),
        description: row.get(3),
    }
}

fn post_from_row(row: &Row) -> Post {
    let group_id: Option<i64> = row.get(6);
    Post {
        id: row.get(0),
        text: row.get(1),
        image: row.get(2),
        pub_date: row.get(3),
        author_id: row.get(4),
        author: row.get(5),
        group: group_id.map(|id| GroupRef {
            id,
            title: row.get(7),
            slug: row.get(8),
        }),
    }
}

fn comment_from_row(row: &Row) -> Comment {
    Comment {
        id: row.get(0),
        post_id: row.get(1),
        author_id: row.get(2),
        author: row.get(3),
        text: row.get(4),
        created: row.get(5),
    }
}

/// スコープごとの WHERE 句と、そのプレースホルダ `$1` に渡す値。
fn scope_filter(scope: PostScope) -> (&'static str, Option<i64>) {
    match scope {
        PostScope::All => ("", None),
        PostScope::Group(group_id) => ("WHERE p.group_id = $1", Some(group_id)),
        PostScope::Author(author_id) => ("WHERE p.author_id = $1", Some(author_id)),
        PostScope::FollowedBy(user_id) => (
            "WHERE p.author_id IN (SELECT author_id FROM follows WHERE user_id = $1)",
            Some(user_id),
        ),
    }
}

#[async_trait]
impl Store for Database {
    /// `SELECT 1` を投げて DB が生きているか確認する。
    async fn health_check(&self) -> Result<(), AppError> {
        let client = self.get_connection().await?;

        client.execute("SELECT 1", &[])
            .await
            .map_err(|e| {
                error!("Database health check failed: {}", e);
                AppError::Database(format!("Health check failed: {}", e))
            })?;

        Ok(())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        user.validate().map_err(AppError::Validation)?;

        let client = self.get_connection().await?;
        let query = format!(
            "INSERT INTO users (username, email, first_name, last_name, password_hash) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            USER_COLUMNS
        );

        let row = client.query_one(
            &query,
            &[&user.username, &user.email, &user.first_name, &user.last_name, &user.password_hash],
        )
        .await
        .map_err(AppError::from)?;

        let created_user = user_from_row(&row);
        info!("Created user with id: {}", created_user.id);
        Ok(created_user)
    }

    async fn get_user_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        let client = self.get_connection().await?;
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);

        let row = client.query_opt(&query, &[&id])
            .await
            .map_err(AppError::from)?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let client = self.get_connection().await?;
        let query = format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS);

        let row = client.query_opt(&query, &[&username])
            .await
            .map_err(AppError::from)?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn create_group(&self, group: NewGroup) -> Result<Group, AppError> {
        group.validate().map_err(AppError::Validation)?;

        let client = self.get_connection().await?;
        let query = r#"
            INSERT INTO post_groups (title, slug, description)
            VALUES ($1, $2, $3)
            RETURNING id, title, slug, description
        "#;

        let title = group.title.trim();
        let row = client.query_one(query, &[&title, &group.slug, &group.description])
            .await
            .map_err(AppError::from)?;

        Ok(group_from_row(&row))
    }

    async fn get_group_by_slug(&self, slug: &str) -> Result<Group, AppError> {
        let client = self.get_connection().await?;
        let query = "SELECT id, title, slug, description FROM post_groups WHERE slug = $1";

        let row = client.query_opt(query, &[&slug])
            .await
            .map_err(AppError::from)?;

        row.as_ref()
            .map(group_from_row)
            .ok_or_else(|| AppError::NotFound(format!("Group {}", slug)))
    }

    async fn list_groups(&self) -> Result<Vec<Group>, AppError> {
        let client = self.get_connection().await?;
        let query = "SELECT id, title, slug, description FROM post_groups ORDER BY title";

        let rows = client.query(query, &[])
            .await
            .map_err(AppError::from)?;

        Ok(rows.iter().map(group_from_row).collect())
    }

    /// INSERT してから JOIN 付きの SELECT で読み直し、著者名とグループを揃えて返す。
    async fn create_post(&self, post: NewPost) -> Result<Post, AppError> {
        let client = self.get_connection().await?;
        let query = r#"
            INSERT INTO posts (text, author_id, group_id, image)
            VALUES ($1, $2, $3, $4)
            RETURNING id
        "#;

        let row = client.query_one(
            query,
            &[&post.text, &post.author_id, &post.group_id, &post.image],
        )
        .await
        .map_err(AppError::from)?;
        let id: i64 = row.get(0);
        drop(client);

        info!("Created post with id: {}", id);
        self.get_post(id).await
    }

    async fn get_post(&self, id: i64) -> Result<Post, AppError> {
        let client = self.get_connection().await?;
        let query = format!("{} WHERE p.id = $1", POST_SELECT);

        let row = client.query_opt(&query, &[&id])
            .await
            .map_err(AppError::from)?;

        row.as_ref()
            .map(post_from_row)
            .ok_or_else(|| AppError::NotFound(format!("Post with id {}", id)))
    }

    /// 画像は新しいファイルがある時だけ差し替えるため `COALESCE` を使う。
    async fn update_post(&self, id: i64, changes: PostChanges) -> Result<Post, AppError> {
        let client = self.get_connection().await?;
        let query = r#"
            UPDATE posts
            SET text = $1, group_id = $2, image = COALESCE($3, image)
            WHERE id = $4
        "#;

        let rows_affected = client.execute(
            query,
            &[&changes.text, &changes.group_id, &changes.image, &id],
        )
        .await
        .map_err(AppError::from)?;

        if rows_affected == 0 {
            return Err(AppError::NotFound(format!("Post with id {}", id)));
        }
        drop(client);

        info!("Updated post with id: {}", id);
        self.get_post(id).await
    }

    async fn count_posts(&self, scope: PostScope) -> Result<u64, AppError> {
        let client = self.get_connection().await?;
        let (filter, value) = scope_filter(scope);
        let query = format!("SELECT COUNT(*) FROM posts p {}", filter);

        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::new();
        if let Some(ref value) = value {
            params.push(value);
        }

        let row = client.query_one(&query, &params)
            .await
            .map_err(AppError::from)?;
        let count: i64 = row.get(0);

        Ok(count.max(0) as u64)
    }

    /// `Option<i64>` のフィルタ値がある時だけパラメータが一つ増えるので、
    /// LIMIT / OFFSET のプレースホルダ番号もそれに合わせてずらす。
    async fn list_posts(&self, scope: PostScope, limit: u64, offset: u64) -> Result<Vec<Post>, AppError> {
        let client = self.get_connection().await?;
        let (filter, value) = scope_filter(scope);

        let limit = i64::try_from(limit)
            .map_err(|_| AppError::validation(format!("Page size {} is out of range", limit)))?;
        let offset = i64::try_from(offset)
            .map_err(|_| AppError::validation(format!("Page offset {} is out of range", offset)))?;

        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::new();
        if let Some(ref value) = value {
            params.push(value);
        }
        let first = params.len() + 1;
        params.push(&limit);
        params.push(&offset);

        let query = format!(
            "{} {} ORDER BY p.pub_date DESC, p.id DESC LIMIT ${} OFFSET ${}",
            POST_SELECT,
            filter,
            first,
            first + 1
        );

        let rows = client.query(&query, &params)
            .await
            .map_err(AppError::from)?;

        Ok(rows.iter().map(post_from_row).collect())
    }

    async fn create_comment(&self, comment: NewComment) -> Result<Comment, AppError> {
        let client = self.get_connection().await?;
        let query = r#"
            INSERT INTO comments (post_id, author_id, text)
            VALUES ($1, $2, $3)
            RETURNING id
        "#;

        let row = client.query_one(query, &[&comment.post_id, &comment.author_id, &comment.text])
            .await
            .map_err(AppError::from)?;
        let id: i64 = row.get(0);

        let query = format!("{} WHERE c.id = $1", COMMENT_SELECT);
        let row = client.query_one(&query, &[&id])
            .await
            .map_err(AppError::from)?;

        info!("Created comment with id: {} on post {}", id, comment.post_id);
        Ok(comment_from_row(&row))
    }

    async fn list_comments(&self, post_id: i64) -> Result<Vec<Comment>, AppError> {
        let client = self.get_connection().await?;
        let query = format!("{} WHERE c.post_id = $1 ORDER BY c.created DESC, c.id DESC", COMMENT_SELECT);

        let rows = client.query(&query, &[&post_id])
            .await
            .map_err(AppError::from)?;

        Ok(rows.iter().map(comment_from_row).collect())
    }

    /// 重複は `ON CONFLICT DO NOTHING` で吸収し、自己フォローは CHECK 制約で弾く。
    async fn create_follow(&self, user: &User, author: &User) -> Result<Option<Follow>, AppError> {
        let client = self.get_connection().await?;
        let query = r#"
            INSERT INTO follows (user_id, author_id)
            VALUES ($1, $2)
            ON CONFLICT ON CONSTRAINT one_following DO NOTHING
            RETURNING id
        "#;

        let row = client.query_opt(query, &[&user.id, &author.id])
            .await
            .map_err(AppError::from)?;

        Ok(row.map(|row| Follow {
            id: row.get(0),
            user_id: user.id,
            user: user.username.clone(),
            author_id: author.id,
            author: author.username.clone(),
        }))
    }

    async fn delete_follow(&self, user_id: i64, author_id: i64) -> Result<bool, AppError> {
        let client = self.get_connection().await?;
        let query = "DELETE FROM follows WHERE user_id = $1 AND author_id = $2";

        let rows_affected = client.execute(query, &[&user_id, &author_id])
            .await
            .map_err(AppError::from)?;

        Ok(rows_affected > 0)
    }

    async fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool, AppError> {
        let client = self.get_connection().await?;
        let query = "SELECT EXISTS (SELECT 1 FROM follows WHERE user_id = $1 AND author_id = $2)";

        let row = client.query_one(query, &[&user_id, &author_id])
            .await
            .map_err(AppError::from)?;

        Ok(row.get(0))
    }
}
