//! Demo data for fresh development databases

use rust_decimal::Decimal;
use shared::models::{NewProduct, NewUser, Role};

use crate::auth::hash_password;
use crate::config::BoxError;
use crate::db::Store;

pub const DEMO_PASSWORD: &str = "123123";

const DEMO_PRODUCTS: [(&str, &str, i64, i32); 5] = [
    ("Mechanical Keyboard", "Hot-swappable switches, aluminium case", 8999, 25),
    ("Wireless Mouse", "Ergonomic 2.4GHz mouse with silent buttons", 2499, 40),
    ("27\" Monitor", "1440p IPS panel, 144Hz", 32900, 10),
    ("USB-C Hub", "7-in-1 hub with HDMI and card reader", 3999, 60),
    ("Laptop Stand", "Adjustable stand, folds flat", 2950, 35),
];

/// Insert demo users and products when the store has no users
///
/// Returns `false` when the store was already populated.
pub async fn seed_demo_data(store: &dyn Store) -> Result<bool, BoxError> {
    let mut tx = store.begin().await?;
    if tx.count_users().await? > 0 {
        tracing::debug!("Store already has users, skipping demo seed");
        return Ok(false);
    }

    let password_hash = hash_password(DEMO_PASSWORD).map_err(|e| e.to_string())?;
    for (name, email, role) in [
        ("Admin User", "admin@example.com", Role::Admin),
        ("Customer", "customer@example.com", Role::Customer),
    ] {
        tx.insert_user(NewUser {
            name: name.into(),
            email: email.into(),
            password_hash: password_hash.clone(),
            photo: None,
            role,
        })
        .await?;
    }

    for (name, description, cents, stock) in DEMO_PRODUCTS {
        tx.insert_product(NewProduct {
            name: name.into(),
            description: Some(description.into()),
            price: Decimal::new(cents, 2),
            stock,
        })
        .await?;
    }

    tx.commit().await?;
    tracing::info!(
        users = 2,
        products = DEMO_PRODUCTS.len(),
        "Seeded demo data (password: {DEMO_PASSWORD})"
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    #[tokio::test]
    async fn seeds_once() {
        let store = MemoryStore::new();
        assert!(seed_demo_data(&store).await.unwrap());
        assert!(!seed_demo_data(&store).await.unwrap());

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.count_users().await.unwrap(), 2);
        assert_eq!(tx.count_products().await.unwrap(), 5);
        let admin = tx
            .find_user_by_email("admin@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.role, Role::Admin);
    }
}
