//! PostgreSQL store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::models::{
    NewOrder, NewOrderItem, NewProduct, NewUser, Order, OrderItem, OrderStatus, Product,
    ProductChanges, ProductImage, Role, User, UserChanges,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};

use super::{
    NewRefreshToken, OrderRepo, ProductRepo, ProductStock, RefreshTokenRecord, RefreshTokenRepo,
    Store, StoreError, StoreTx, UserRepo,
};

/// sqlx-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and run embedded migrations
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }
}

/// Open PostgreSQL transaction; rolled back by sqlx on drop
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}

// ── Rows ──

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    name: String,
    email: String,
    password_hash: String,
    photo: Option<String>,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role: Role = row
            .role
            .parse()
            .map_err(|e: shared::models::UnknownRole| StoreError::Database(e.to_string()))?;
        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            photo: row.photo,
            role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    description: Option<String>,
    price: Decimal,
    stock: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProductRow {
    fn into_product(self, images: Vec<ProductImage>) -> Product {
        Product {
            id: self.id,
            name: self.name,
            description: self.description,
            price: self.price,
            stock: self.stock,
            images,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ProductImageRow {
    id: i64,
    product_id: i64,
    url: String,
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i64,
    user_id: i64,
    total_amount: Decimal,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, StoreError> {
        let status: OrderStatus = self
            .status
            .parse()
            .map_err(|e: shared::models::UnknownOrderStatus| StoreError::Database(e.to_string()))?;
        Ok(Order {
            id: self.id,
            user_id: self.user_id,
            total_amount: self.total_amount,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
            items,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RefreshTokenRow {
    id: i64,
    user_id: i64,
    token: String,
    expires_at: DateTime<Utc>,
    revoked: bool,
    created_at: DateTime<Utc>,
}

impl From<RefreshTokenRow> for RefreshTokenRecord {
    fn from(row: RefreshTokenRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            token: row.token,
            expires_at: row.expires_at,
            revoked: row.revoked,
            created_at: row.created_at,
        }
    }
}

const USER_COLUMNS: &str = "id, name, email, password_hash, photo, role, created_at, updated_at";
const PRODUCT_COLUMNS: &str = "id, name, description, price, stock, created_at, updated_at";
const ORDER_COLUMNS: &str = "id, user_id, total_amount, status, created_at, updated_at";
const ITEM_SELECT: &str = "SELECT oi.id, oi.order_id, oi.product_id, p.name AS product_name, \
     oi.quantity, oi.price \
     FROM order_items oi LEFT JOIN products p ON p.id = oi.product_id";

impl PgTx {
    async fn images_for(&mut self, product_ids: &[i64]) -> Result<Vec<ProductImageRow>, StoreError> {
        let rows: Vec<ProductImageRow> = sqlx::query_as(
            "SELECT id, product_id, url FROM product_images WHERE product_id = ANY($1) ORDER BY id",
        )
        .bind(product_ids)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn attach_images(&mut self, rows: Vec<ProductRow>) -> Result<Vec<Product>, StoreError> {
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut images = self.images_for(&ids).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let (mine, rest): (Vec<_>, Vec<_>) =
                    images.drain(..).partition(|img| img.product_id == row.id);
                images = rest;
                let mine = mine
                    .into_iter()
                    .map(|img| ProductImage {
                        id: img.id,
                        url: img.url,
                    })
                    .collect();
                row.into_product(mine)
            })
            .collect())
    }

    async fn attach_items(&mut self, rows: Vec<OrderRow>) -> Result<Vec<Order>, StoreError> {
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let items: Vec<OrderItem> =
            sqlx::query_as(&format!("{ITEM_SELECT} WHERE oi.order_id = ANY($1) ORDER BY oi.id"))
                .bind(&ids)
                .fetch_all(&mut *self.tx)
                .await?;

        rows.into_iter()
            .map(|row| {
                let mine = items
                    .iter()
                    .filter(|item| item.order_id == row.id)
                    .cloned()
                    .collect();
                row.into_order(mine)
            })
            .collect()
    }
}

#[async_trait]
impl UserRepo for PgTx {
    async fn find_user_by_id(&mut self, id: i64) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(&mut *self.tx)
                .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
                .bind(email)
                .fetch_optional(&mut *self.tx)
                .await?;
        row.map(User::try_from).transpose()
    }

    async fn insert_user(&mut self, user: NewUser) -> Result<User, StoreError> {
        let row: UserRow = sqlx::query_as(&format!(
            "INSERT INTO users (name, email, password_hash, photo, role) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.photo)
        .bind(user.role.as_str())
        .fetch_one(&mut *self.tx)
        .await?;
        row.try_into()
    }

    async fn update_user(
        &mut self,
        id: i64,
        changes: UserChanges,
    ) -> Result<Option<User>, StoreError> {
        let (photo_set, photo) = match changes.photo {
            Some(photo) => (true, photo),
            None => (false, None),
        };
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "UPDATE users SET \
                name = COALESCE($2, name), \
                email = COALESCE($3, email), \
                password_hash = COALESCE($4, password_hash), \
                photo = CASE WHEN $5 THEN $6 ELSE photo END, \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.email)
        .bind(&changes.password_hash)
        .bind(photo_set)
        .bind(&photo)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn count_users(&mut self) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl ProductRepo for PgTx {
    async fn lock_product(&mut self, id: i64) -> Result<Option<ProductStock>, StoreError> {
        let row: Option<(i64, String, Decimal, i32)> =
            sqlx::query_as("SELECT id, name, price, stock FROM products WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *self.tx)
                .await?;
        Ok(row.map(|(id, name, price, stock)| ProductStock {
            id,
            name,
            price,
            stock,
        }))
    }

    async fn find_product(&mut self, id: i64) -> Result<Option<Product>, StoreError> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
                .bind(id)
                .fetch_optional(&mut *self.tx)
                .await?;
        match row {
            Some(row) => Ok(self.attach_images(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn update_product_stock(&mut self, id: i64, stock: i32) -> Result<(), StoreError> {
        sqlx::query("UPDATE products SET stock = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(stock)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn list_products(&mut self, skip: i64, take: i64) -> Result<Vec<Product>, StoreError> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id LIMIT $1 OFFSET $2"
        ))
        .bind(take)
        .bind(skip)
        .fetch_all(&mut *self.tx)
        .await?;
        self.attach_images(rows).await
    }

    async fn count_products(&mut self) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(count)
    }

    async fn insert_product(&mut self, product: NewProduct) -> Result<i64, StoreError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO products (name, description, price, stock) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.stock)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    async fn update_product(
        &mut self,
        id: i64,
        changes: ProductChanges,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE products SET \
                name = COALESCE($2, name), \
                description = COALESCE($3, description), \
                price = COALESCE($4, price), \
                stock = COALESCE($5, stock), \
                updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.description)
        .bind(changes.price)
        .bind(changes.stock)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_product(&mut self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_product_images(
        &mut self,
        product_id: i64,
        urls: &[String],
    ) -> Result<(), StoreError> {
        for url in urls {
            sqlx::query("INSERT INTO product_images (product_id, url) VALUES ($1, $2)")
                .bind(product_id)
                .bind(url)
                .execute(&mut *self.tx)
                .await?;
        }
        Ok(())
    }

    async fn delete_product_images(
        &mut self,
        product_id: i64,
        image_ids: &[i64],
    ) -> Result<Vec<ProductImage>, StoreError> {
        if image_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut removed: Vec<ProductImage> = sqlx::query_as(
            "DELETE FROM product_images WHERE product_id = $1 AND id = ANY($2) RETURNING id, url",
        )
        .bind(product_id)
        .bind(image_ids)
        .fetch_all(&mut *self.tx)
        .await?;
        removed.sort_by_key(|img| img.id);
        Ok(removed)
    }
}

#[async_trait]
impl OrderRepo for PgTx {
    async fn create_order(&mut self, order: NewOrder) -> Result<i64, StoreError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO orders (user_id, total_amount, status) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(order.user_id)
        .bind(order.total_amount)
        .bind(order.status.as_str())
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    async fn create_order_items(
        &mut self,
        order_id: i64,
        items: &[NewOrderItem],
    ) -> Result<(), StoreError> {
        for item in items {
            sqlx::query(
                "INSERT INTO order_items (order_id, product_id, quantity, price) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(order_id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(item.price)
            .execute(&mut *self.tx)
            .await?;
        }
        Ok(())
    }

    async fn find_order_by_id(
        &mut self,
        id: i64,
        user_id: i64,
    ) -> Result<Option<Order>, StoreError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        match row {
            Some(row) => Ok(self.attach_items(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn count_orders(&mut self, user_id: i64) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(count)
    }

    async fn list_orders(
        &mut self,
        user_id: i64,
        skip: i64,
        take: i64,
    ) -> Result<Vec<Order>, StoreError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(take)
        .bind(skip)
        .fetch_all(&mut *self.tx)
        .await?;
        self.attach_items(rows).await
    }
}

#[async_trait]
impl RefreshTokenRepo for PgTx {
    async fn find_refresh_token(
        &mut self,
        token: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let row: Option<RefreshTokenRow> = sqlx::query_as(
            "SELECT id, user_id, token, expires_at, revoked, created_at \
             FROM refresh_tokens WHERE token = $1 FOR UPDATE",
        )
        .bind(token)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn insert_refresh_token(&mut self, record: NewRefreshToken) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO refresh_tokens (user_id, token, expires_at) VALUES ($1, $2, $3)")
            .bind(record.user_id)
            .bind(&record.token)
            .bind(record.expires_at)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn update_refresh_token(
        &mut self,
        id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE refresh_tokens SET token = $2, expires_at = $3 WHERE id = $1")
            .bind(id)
            .bind(token)
            .bind(expires_at)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn delete_refresh_token(&mut self, token: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token = $1")
            .bind(token)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
