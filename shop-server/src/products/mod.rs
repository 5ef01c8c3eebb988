//! Product catalog service
//!
//! Image rows store the file name under `<upload_dir>/products`. Files of
//! removed images are deleted only after the transaction commits.

use std::sync::Arc;

use rust_decimal::Decimal;
use shared::error::{AppError, ErrorCode};
use shared::models::{AMOUNT_SCALE, MAX_AMOUNT, NewProduct, Product, ProductChanges};
use shared::request::PageQuery;
use shared::response::Paged;

use crate::db::{Store, StoreError};
use crate::error::{ServiceError, ServiceResult};
use crate::uploads::{UploadKind, UploadStorage};

/// Create payload after multipart parsing
#[derive(Debug, Clone)]
pub struct NewProductInput {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub image_urls: Vec<String>,
}

/// Update payload after multipart parsing
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub changes: ProductChanges,
    pub new_image_urls: Vec<String>,
    pub remove_image_ids: Vec<i64>,
}

pub struct ProductService {
    store: Arc<dyn Store>,
    uploads: Arc<UploadStorage>,
}

impl ProductService {
    pub fn new(store: Arc<dyn Store>, uploads: Arc<UploadStorage>) -> Self {
        Self { store, uploads }
    }

    pub async fn list(&self, query: PageQuery) -> ServiceResult<Paged<Product>> {
        let query = query.clamped();
        let mut tx = self.store.begin().await?;
        let total = tx.count_products().await?;
        let products = tx.list_products(query.offset(), query.limit()).await?;
        Ok(Paged::new(products, query, total.max(0) as u64))
    }

    pub async fn find(&self, id: i64) -> ServiceResult<Product> {
        let mut tx = self.store.begin().await?;
        tx.find_product(id)
            .await?
            .ok_or_else(|| product_not_found(id).into())
    }

    pub async fn create(&self, input: NewProductInput) -> ServiceResult<Product> {
        let name = input.name.trim().to_string();
        validate_fields(Some(&name), Some(input.price), Some(input.stock))?;

        let mut tx = self.store.begin().await?;
        let id = tx
            .insert_product(NewProduct {
                name,
                description: input.description,
                price: input.price,
                stock: input.stock,
            })
            .await?;
        if !input.image_urls.is_empty() {
            tx.insert_product_images(id, &input.image_urls).await?;
        }
        let Some(product) = tx.find_product(id).await? else {
            return Err(AppError::internal("Product vanished before commit").into());
        };
        tx.commit().await?;

        tracing::info!(product_id = id, images = product.images.len(), "Product created");
        Ok(product)
    }

    /// Apply field changes, attach new images and drop the listed ones
    ///
    /// Image ids that belong to another product are ignored.
    pub async fn update(&self, id: i64, update: ProductUpdate) -> ServiceResult<Product> {
        let mut changes = update.changes;
        changes.name = changes.name.map(|n| n.trim().to_string());
        validate_fields(changes.name.as_deref(), changes.price, changes.stock)?;

        let mut tx = self.store.begin().await?;
        if tx.find_product(id).await?.is_none() {
            return Err(product_not_found(id).into());
        }

        let removed = if update.remove_image_ids.is_empty() {
            Vec::new()
        } else {
            tx.delete_product_images(id, &update.remove_image_ids)
                .await?
        };
        if !update.new_image_urls.is_empty() {
            tx.insert_product_images(id, &update.new_image_urls).await?;
        }
        if !changes.is_empty() && !tx.update_product(id, changes).await? {
            return Err(product_not_found(id).into());
        }

        let Some(product) = tx.find_product(id).await? else {
            return Err(product_not_found(id).into());
        };
        tx.commit().await?;

        let removed: Vec<String> = removed.into_iter().map(|img| img.url).collect();
        self.uploads.remove_all(UploadKind::Product, &removed).await;

        tracing::info!(
            product_id = id,
            added = update.new_image_urls.len(),
            removed = removed.len(),
            "Product updated"
        );
        Ok(product)
    }

    /// Delete a product with its images; fails while order items reference it
    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        let mut tx = self.store.begin().await?;
        let Some(product) = tx.find_product(id).await? else {
            return Err(product_not_found(id).into());
        };

        match tx.delete_product(id).await {
            Ok(true) => {}
            Ok(false) => return Err(product_not_found(id).into()),
            Err(StoreError::ForeignKeyViolation(_)) => {
                return Err(AppError::conflict(
                    ErrorCode::ProductInUse,
                    format!("Product with ID {id} is referenced by existing orders"),
                )
                .with_detail("product_id", id)
                .into());
            }
            Err(e) => return Err(ServiceError::Db(e)),
        }
        tx.commit().await?;

        let files: Vec<String> = product.images.into_iter().map(|img| img.url).collect();
        self.uploads.remove_all(UploadKind::Product, &files).await;

        tracing::info!(product_id = id, "Product deleted");
        Ok(())
    }
}

fn product_not_found(id: i64) -> AppError {
    AppError::with_message(
        ErrorCode::ProductNotFound,
        format!("Product with ID {id} not found"),
    )
}

/// Checks the fields that are present
fn validate_fields(
    name: Option<&str>,
    price: Option<Decimal>,
    stock: Option<i32>,
) -> Result<(), AppError> {
    let mut failures = Vec::new();
    if name.is_some_and(str::is_empty) {
        failures.push(("name", "Name is required"));
    }
    if price.is_some_and(|p| p <= Decimal::ZERO) {
        failures.push(("price", "Price must be a positive number"));
    }
    if price.is_some_and(|p| p > MAX_AMOUNT) {
        failures.push(("price", "Price must not exceed 9999999999.99"));
    }
    if price.is_some_and(|p| p.normalize().scale() > AMOUNT_SCALE) {
        failures.push(("price", "Price must have at most 2 decimal places"));
    }
    if stock.is_some_and(|s| s < 0) {
        failures.push(("stock", "Stock must be a non-negative integer"));
    }

    let Some((_, first)) = failures.first() else {
        return Ok(());
    };
    let err = failures
        .iter()
        .fold(AppError::validation(*first), |err, (field, msg)| {
            err.with_field_error(*field, *msg)
        });
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use shared::models::{NewOrder, NewOrderItem, NewUser, OrderStatus, Role};

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn service(root: &std::path::Path) -> (ProductService, Arc<dyn Store>) {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let uploads = Arc::new(UploadStorage::new(root));
        (ProductService::new(store.clone(), uploads), store)
    }

    fn input(name: &str, price: Decimal, stock: i32) -> NewProductInput {
        NewProductInput {
            name: name.into(),
            description: Some("desc".into()),
            price,
            stock,
            image_urls: vec![],
        }
    }

    #[test]
    fn field_validation() {
        assert!(validate_fields(Some("Mug"), Some(dec("1.50")), Some(0)).is_ok());
        assert!(validate_fields(None, None, None).is_ok());

        let err = validate_fields(Some(""), Some(dec("0")), Some(-1)).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert_eq!(err.message, "Name is required");
        let fields = err.errors.unwrap();
        assert!(fields.contains_key("price"));
        assert!(fields.contains_key("stock"));
    }

    #[test]
    fn price_is_bounded_by_column_precision() {
        assert!(validate_fields(None, Some(MAX_AMOUNT), None).is_ok());
        assert!(validate_fields(None, Some(dec("1.500")), None).is_ok());

        let err = validate_fields(None, Some(MAX_AMOUNT + dec("0.01")), None).unwrap_err();
        assert_eq!(err.message, "Price must not exceed 9999999999.99");
        assert_eq!(err.errors.unwrap()["price"].len(), 1);

        let err = validate_fields(None, Some(dec("1.005")), None).unwrap_err();
        assert_eq!(err.message, "Price must have at most 2 decimal places");

        let err = validate_fields(None, Some(Decimal::MAX), None).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
    }

    #[tokio::test]
    async fn create_then_list() {
        let dir = tempfile::tempdir().unwrap();
        let (svc, _) = service(dir.path());

        let mut with_images = input("Mug", dec("12.50"), 3);
        with_images.image_urls = vec!["a.png".into(), "b.png".into()];
        let created = svc.create(with_images).await.unwrap();
        assert_eq!(created.images.len(), 2);
        svc.create(input("Cap", dec("8"), 1)).await.unwrap();

        let page = svc.list(PageQuery::new(1, 1)).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].name, "Mug");
        assert_eq!(page.paging.total_data, 2);
        assert_eq!(page.paging.total_page, 2);
    }

    #[tokio::test]
    async fn missing_product_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (svc, _) = service(dir.path());
        let err: AppError = svc.find(42).await.unwrap_err().into();
        assert_eq!(err.code, ErrorCode::ProductNotFound);
        assert_eq!(err.message, "Product with ID 42 not found");
    }

    #[tokio::test]
    async fn update_removes_only_owned_images() {
        let dir = tempfile::tempdir().unwrap();
        let (svc, _) = service(dir.path());

        let mut a = input("A", dec("1"), 1);
        a.image_urls = vec!["a1.png".into()];
        let a = svc.create(a).await.unwrap();
        let mut b = input("B", dec("1"), 1);
        b.image_urls = vec!["b1.png".into()];
        let b = svc.create(b).await.unwrap();

        let updated = svc
            .update(
                a.id,
                ProductUpdate {
                    changes: ProductChanges {
                        price: Some(dec("2")),
                        ..Default::default()
                    },
                    new_image_urls: vec!["a2.png".into()],
                    remove_image_ids: vec![a.images[0].id, b.images[0].id],
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.price, dec("2"));
        let urls: Vec<_> = updated.images.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(urls, vec!["a2.png"]);

        assert_eq!(svc.find(b.id).await.unwrap().images.len(), 1);
    }

    #[tokio::test]
    async fn delete_referenced_product_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let (svc, store) = service(dir.path());
        let product = svc.create(input("Mug", dec("5"), 5)).await.unwrap();

        {
            let mut tx = store.begin().await.unwrap();
            let user = tx
                .insert_user(NewUser {
                    name: "Buyer".into(),
                    email: "buyer@example.com".into(),
                    password_hash: "x".into(),
                    photo: None,
                    role: Role::Customer,
                })
                .await
                .unwrap();
            let order_id = tx
                .create_order(NewOrder {
                    user_id: user.id,
                    total_amount: dec("5"),
                    status: OrderStatus::Pending,
                })
                .await
                .unwrap();
            tx.create_order_items(
                order_id,
                &[NewOrderItem {
                    product_id: product.id,
                    quantity: 1,
                    price: dec("5"),
                }],
            )
            .await
            .unwrap();
            tx.commit().await.unwrap();
        }

        let err: AppError = svc.delete(product.id).await.unwrap_err().into();
        assert_eq!(err.code, ErrorCode::ProductInUse);
        assert!(svc.find(product.id).await.is_ok());
    }

    #[tokio::test]
    async fn delete_removes_image_files() {
        let dir = tempfile::tempdir().unwrap();
        let (svc, _) = service(dir.path());
        let products_dir = dir.path().join("products");
        std::fs::create_dir_all(&products_dir).unwrap();
        std::fs::write(products_dir.join("p.png"), b"img").unwrap();

        let mut p = input("Mug", dec("5"), 5);
        p.image_urls = vec!["p.png".into()];
        let p = svc.create(p).await.unwrap();

        svc.delete(p.id).await.unwrap();
        assert!(!products_dir.join("p.png").exists());
        let err: AppError = svc.find(p.id).await.unwrap_err().into();
        assert_eq!(err.code, ErrorCode::ProductNotFound);
    }
}
