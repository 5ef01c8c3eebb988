//! In-memory store
//!
//! Used when no `DATABASE_URL` is configured and by the test suite.
//! `begin` takes the store-wide lock and works on a staged copy of every
//! table; `commit` swaps the copy in, dropping the handle discards it.
//! Transactions are therefore fully serialized. A task must not open a
//! second transaction while it still holds one.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::models::{
    NewOrder, NewOrderItem, NewProduct, NewUser, Order, OrderItem, OrderStatus, Product,
    ProductChanges, ProductImage, User, UserChanges,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{
    NewRefreshToken, OrderRepo, ProductRepo, ProductStock, RefreshTokenRecord, RefreshTokenRepo,
    Store, StoreError, StoreTx, UserRepo,
};

#[derive(Debug, Clone)]
struct ProductRow {
    id: i64,
    name: String,
    description: Option<String>,
    price: Decimal,
    stock: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct ImageRow {
    product_id: i64,
    url: String,
}

#[derive(Debug, Clone)]
struct OrderRow {
    id: i64,
    user_id: i64,
    total_amount: Decimal,
    status: OrderStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct ItemRow {
    order_id: i64,
    product_id: i64,
    quantity: i32,
    price: Decimal,
}

/// Last id handed out per table
#[derive(Debug, Clone, Default)]
struct Sequences {
    users: i64,
    products: i64,
    images: i64,
    orders: i64,
    items: i64,
    refresh_tokens: i64,
}

fn next_id(seq: &mut i64) -> i64 {
    *seq += 1;
    *seq
}

#[derive(Debug, Clone, Default)]
struct Tables {
    seq: Sequences,
    users: BTreeMap<i64, User>,
    products: BTreeMap<i64, ProductRow>,
    images: BTreeMap<i64, ImageRow>,
    orders: BTreeMap<i64, OrderRow>,
    items: BTreeMap<i64, ItemRow>,
    refresh_tokens: BTreeMap<i64, RefreshTokenRecord>,
}

impl Tables {
    fn email_taken(&self, email: &str, except: Option<i64>) -> bool {
        self.users
            .values()
            .any(|u| u.email == email && Some(u.id) != except)
    }

    fn product(&self, row: &ProductRow) -> Product {
        Product {
            id: row.id,
            name: row.name.clone(),
            description: row.description.clone(),
            price: row.price,
            stock: row.stock,
            images: self
                .images
                .iter()
                .filter(|(_, img)| img.product_id == row.id)
                .map(|(id, img)| ProductImage {
                    id: *id,
                    url: img.url.clone(),
                })
                .collect(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }

    fn order(&self, row: &OrderRow) -> Order {
        Order {
            id: row.id,
            user_id: row.user_id,
            total_amount: row.total_amount,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
            items: self
                .items
                .iter()
                .filter(|(_, item)| item.order_id == row.id)
                .map(|(id, item)| OrderItem {
                    id: *id,
                    order_id: item.order_id,
                    product_id: item.product_id,
                    product_name: self.products.get(&item.product_id).map(|p| p.name.clone()),
                    quantity: item.quantity,
                    price: item.price,
                })
                .collect(),
        }
    }
}

/// Process-local store
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let guard = self.tables.clone().lock_owned().await;
        let staged = (*guard).clone();
        Ok(Box::new(MemoryTx { guard, staged }))
    }
}

/// Staged copy of the tables plus the lock that keeps other transactions out
pub struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTx { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}

#[async_trait]
impl UserRepo for MemoryTx {
    async fn find_user_by_id(&mut self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.staged.users.get(&id).cloned())
    }

    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .staged
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn insert_user(&mut self, user: NewUser) -> Result<User, StoreError> {
        if self.staged.email_taken(&user.email, None) {
            return Err(StoreError::UniqueViolation("users.email".into()));
        }
        let now = Utc::now();
        let id = next_id(&mut self.staged.seq.users);
        let user = User {
            id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            photo: user.photo,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        self.staged.users.insert(id, user.clone());
        Ok(user)
    }

    async fn update_user(
        &mut self,
        id: i64,
        changes: UserChanges,
    ) -> Result<Option<User>, StoreError> {
        if let Some(email) = &changes.email
            && self.staged.email_taken(email, Some(id))
        {
            return Err(StoreError::UniqueViolation("users.email".into()));
        }
        let Some(user) = self.staged.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(hash) = changes.password_hash {
            user.password_hash = hash;
        }
        if let Some(photo) = changes.photo {
            user.photo = photo;
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn count_users(&mut self) -> Result<i64, StoreError> {
        Ok(self.staged.users.len() as i64)
    }
}

#[async_trait]
impl ProductRepo for MemoryTx {
    async fn lock_product(&mut self, id: i64) -> Result<Option<ProductStock>, StoreError> {
        // the transaction already holds the store-wide lock
        Ok(self.staged.products.get(&id).map(|p| ProductStock {
            id: p.id,
            name: p.name.clone(),
            price: p.price,
            stock: p.stock,
        }))
    }

    async fn find_product(&mut self, id: i64) -> Result<Option<Product>, StoreError> {
        Ok(self
            .staged
            .products
            .get(&id)
            .map(|row| self.staged.product(row)))
    }

    async fn update_product_stock(&mut self, id: i64, stock: i32) -> Result<(), StoreError> {
        if stock < 0 {
            return Err(StoreError::Database(
                "products.stock violates check constraint".into(),
            ));
        }
        if let Some(p) = self.staged.products.get_mut(&id) {
            p.stock = stock;
            p.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn list_products(&mut self, skip: i64, take: i64) -> Result<Vec<Product>, StoreError> {
        Ok(self
            .staged
            .products
            .values()
            .skip(skip.max(0) as usize)
            .take(take.max(0) as usize)
            .map(|row| self.staged.product(row))
            .collect())
    }

    async fn count_products(&mut self) -> Result<i64, StoreError> {
        Ok(self.staged.products.len() as i64)
    }

    async fn insert_product(&mut self, product: NewProduct) -> Result<i64, StoreError> {
        if product.stock < 0 {
            return Err(StoreError::Database(
                "products.stock violates check constraint".into(),
            ));
        }
        let now = Utc::now();
        let id = next_id(&mut self.staged.seq.products);
        self.staged.products.insert(
            id,
            ProductRow {
                id,
                name: product.name,
                description: product.description,
                price: product.price,
                stock: product.stock,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn update_product(
        &mut self,
        id: i64,
        changes: ProductChanges,
    ) -> Result<bool, StoreError> {
        if changes.stock.is_some_and(|s| s < 0) {
            return Err(StoreError::Database(
                "products.stock violates check constraint".into(),
            ));
        }
        let Some(p) = self.staged.products.get_mut(&id) else {
            return Ok(false);
        };
        if let Some(name) = changes.name {
            p.name = name;
        }
        if let Some(description) = changes.description {
            p.description = Some(description);
        }
        if let Some(price) = changes.price {
            p.price = price;
        }
        if let Some(stock) = changes.stock {
            p.stock = stock;
        }
        p.updated_at = Utc::now();
        Ok(true)
    }

    async fn delete_product(&mut self, id: i64) -> Result<bool, StoreError> {
        if !self.staged.products.contains_key(&id) {
            return Ok(false);
        }
        if self.staged.items.values().any(|i| i.product_id == id) {
            return Err(StoreError::ForeignKeyViolation(
                "order_items.product_id".into(),
            ));
        }
        self.staged.products.remove(&id);
        self.staged.images.retain(|_, img| img.product_id != id);
        Ok(true)
    }

    async fn insert_product_images(
        &mut self,
        product_id: i64,
        urls: &[String],
    ) -> Result<(), StoreError> {
        if !self.staged.products.contains_key(&product_id) {
            return Err(StoreError::ForeignKeyViolation(
                "product_images.product_id".into(),
            ));
        }
        for url in urls {
            let id = next_id(&mut self.staged.seq.images);
            self.staged.images.insert(
                id,
                ImageRow {
                    product_id,
                    url: url.clone(),
                },
            );
        }
        Ok(())
    }

    async fn delete_product_images(
        &mut self,
        product_id: i64,
        image_ids: &[i64],
    ) -> Result<Vec<ProductImage>, StoreError> {
        let mut removed = Vec::new();
        for id in image_ids {
            let owned = self
                .staged
                .images
                .get(id)
                .is_some_and(|img| img.product_id == product_id);
            if owned && let Some(img) = self.staged.images.remove(id) {
                removed.push(ProductImage {
                    id: *id,
                    url: img.url,
                });
            }
        }
        removed.sort_by_key(|img| img.id);
        Ok(removed)
    }
}

#[async_trait]
impl OrderRepo for MemoryTx {
    async fn create_order(&mut self, order: NewOrder) -> Result<i64, StoreError> {
        if !self.staged.users.contains_key(&order.user_id) {
            return Err(StoreError::ForeignKeyViolation("orders.user_id".into()));
        }
        let now = Utc::now();
        let id = next_id(&mut self.staged.seq.orders);
        self.staged.orders.insert(
            id,
            OrderRow {
                id,
                user_id: order.user_id,
                total_amount: order.total_amount,
                status: order.status,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn create_order_items(
        &mut self,
        order_id: i64,
        items: &[NewOrderItem],
    ) -> Result<(), StoreError> {
        if !self.staged.orders.contains_key(&order_id) {
            return Err(StoreError::ForeignKeyViolation("order_items.order_id".into()));
        }
        for item in items {
            if !self.staged.products.contains_key(&item.product_id) {
                return Err(StoreError::ForeignKeyViolation(
                    "order_items.product_id".into(),
                ));
            }
            let id = next_id(&mut self.staged.seq.items);
            self.staged.items.insert(
                id,
                ItemRow {
                    order_id,
                    product_id: item.product_id,
                    quantity: item.quantity,
                    price: item.price,
                },
            );
        }
        Ok(())
    }

    async fn find_order_by_id(
        &mut self,
        id: i64,
        user_id: i64,
    ) -> Result<Option<Order>, StoreError> {
        Ok(self
            .staged
            .orders
            .get(&id)
            .filter(|o| o.user_id == user_id)
            .map(|row| self.staged.order(row)))
    }

    async fn count_orders(&mut self, user_id: i64) -> Result<i64, StoreError> {
        Ok(self
            .staged
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .count() as i64)
    }

    async fn list_orders(
        &mut self,
        user_id: i64,
        skip: i64,
        take: i64,
    ) -> Result<Vec<Order>, StoreError> {
        let mut rows: Vec<&OrderRow> = self
            .staged
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .collect();
        rows.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(rows
            .into_iter()
            .skip(skip.max(0) as usize)
            .take(take.max(0) as usize)
            .map(|row| self.staged.order(row))
            .collect())
    }
}

#[async_trait]
impl RefreshTokenRepo for MemoryTx {
    async fn find_refresh_token(
        &mut self,
        token: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        Ok(self
            .staged
            .refresh_tokens
            .values()
            .find(|r| r.token == token)
            .cloned())
    }

    async fn insert_refresh_token(&mut self, record: NewRefreshToken) -> Result<(), StoreError> {
        if self
            .staged
            .refresh_tokens
            .values()
            .any(|r| r.token == record.token)
        {
            return Err(StoreError::UniqueViolation("refresh_tokens.token".into()));
        }
        if !self.staged.users.contains_key(&record.user_id) {
            return Err(StoreError::ForeignKeyViolation(
                "refresh_tokens.user_id".into(),
            ));
        }
        let id = next_id(&mut self.staged.seq.refresh_tokens);
        self.staged.refresh_tokens.insert(
            id,
            RefreshTokenRecord {
                id,
                user_id: record.user_id,
                token: record.token,
                expires_at: record.expires_at,
                revoked: false,
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn update_refresh_token(
        &mut self,
        id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if self
            .staged
            .refresh_tokens
            .values()
            .any(|r| r.token == token && r.id != id)
        {
            return Err(StoreError::UniqueViolation("refresh_tokens.token".into()));
        }
        if let Some(record) = self.staged.refresh_tokens.get_mut(&id) {
            record.token = token.to_string();
            record.expires_at = expires_at;
        }
        Ok(())
    }

    async fn delete_refresh_token(&mut self, token: &str) -> Result<bool, StoreError> {
        let before = self.staged.refresh_tokens.len();
        self.staged.refresh_tokens.retain(|_, r| r.token != token);
        Ok(self.staged.refresh_tokens.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::Role;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Test".into(),
            email: email.into(),
            password_hash: "hash".into(),
            photo: None,
            role: Role::Customer,
        }
    }

    #[tokio::test]
    async fn uncommitted_changes_are_discarded() {
        let store = MemoryStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_user(new_user("a@example.com")).await.unwrap();
            // dropped without commit
        }
        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.count_users().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn committed_changes_are_visible() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_user(new_user("a@example.com")).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let user = tx.find_user_by_email("a@example.com").await.unwrap();
        assert!(user.is_some());
    }

    #[tokio::test]
    async fn duplicate_email_is_unique_violation() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_user(new_user("a@example.com")).await.unwrap();
        let err = tx.insert_user(new_user("a@example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn negative_stock_is_rejected() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let id = tx
            .insert_product(NewProduct {
                name: "Pen".into(),
                description: None,
                price: Decimal::new(150, 2),
                stock: 1,
            })
            .await
            .unwrap();
        let err = tx.update_product_stock(id, -1).await.unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
    }

    #[tokio::test]
    async fn only_owned_images_are_deleted() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let product = |name: &str| NewProduct {
            name: name.into(),
            description: None,
            price: Decimal::ONE,
            stock: 1,
        };
        let a = tx.insert_product(product("A")).await.unwrap();
        let b = tx.insert_product(product("B")).await.unwrap();
        tx.insert_product_images(a, &["a.png".into()]).await.unwrap();
        tx.insert_product_images(b, &["b.png".into()]).await.unwrap();

        let b_image = tx.find_product(b).await.unwrap().unwrap().images[0].id;
        let removed = tx.delete_product_images(a, &[b_image]).await.unwrap();
        assert!(removed.is_empty());
        assert_eq!(tx.find_product(b).await.unwrap().unwrap().images.len(), 1);
    }
}
