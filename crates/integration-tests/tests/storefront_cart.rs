//! Integration tests for the cart.
//!
//! These tests require a running storefront with at least one product in the
//! catalog (mercato seed products crates/cli/data/products.yaml).
//!
//! Run with: cargo test -p mercato-integration-tests -- --ignored

use mercato_client::{ApiClient, Product};
use tokio::task::JoinSet;
use mercato_integration_tests::{client, signed_in_customer};

async fn any_product(client: &ApiClient) -> Product {
    client
        .recommendations()
        .await
        .expect("recommendations")
        .into_iter()
        .next()
        .expect("catalog is empty; seed products first")
}

#[tokio::test]
#[ignore = "Requires running storefront server and seeded catalog"]
async fn test_cart_requires_session() {
    let err = client().cart().await.expect_err("anonymous cart");
    assert_eq!(err.status(), Some(401));
    assert_eq!(err.code(), Some("missing_token"));
}

#[tokio::test]
#[ignore = "Requires running storefront server and seeded catalog"]
async fn test_adding_twice_increments_quantity() {
    let (client, _) = signed_in_customer().await;
    let product = any_product(&client).await;

    client.add_to_cart(product.id).await.expect("first add");
    let lines = client.add_to_cart(product.id).await.expect("second add");

    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].product_id, product.id);
    assert_eq!(lines[0].quantity, 2);

    let items = client.cart().await.expect("cart");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].product.name, product.name);

    let totals = client.cart_totals(None).await.expect("totals");
    assert_eq!(totals.subtotal.as_minor(), product.price.as_minor() * 2);
    assert_eq!(totals.discount.as_minor(), 0);
    assert_eq!(totals.total, totals.subtotal);
}

#[tokio::test]
#[ignore = "Requires running storefront server and seeded catalog"]
async fn test_zero_quantity_removes_line() {
    let (client, _) = signed_in_customer().await;
    let product = any_product(&client).await;

    client.add_to_cart(product.id).await.expect("add");
    let lines = client
        .update_quantity(product.id, 0)
        .await
        .expect("set quantity 0");
    assert!(lines.is_empty());

    let err = client
        .update_quantity(product.id, 3)
        .await
        .expect_err("update absent line");
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
#[ignore = "Requires running storefront server and seeded catalog"]
async fn test_remove_without_id_clears_cart() {
    let (client, _) = signed_in_customer().await;
    let product = any_product(&client).await;

    client.add_to_cart(product.id).await.expect("add");
    let lines = client.remove_from_cart(None).await.expect("clear");
    assert!(lines.is_empty());
    assert!(client.cart().await.expect("cart").is_empty());
}

#[tokio::test]
#[ignore = "Requires running storefront server and seeded catalog"]
async fn test_empty_cart_cannot_check_out() {
    let (client, _) = signed_in_customer().await;

    let err = client
        .create_checkout_session(None)
        .await
        .expect_err("checkout with empty cart");
    assert_eq!(err.status(), Some(400));
    assert_eq!(err.message(), Some("Invalid or empty product list"));
}

#[tokio::test]
#[ignore = "Requires running storefront server and seeded catalog"]
async fn test_concurrent_updates_lose_with_conflict() {
    let (client, _) = signed_in_customer().await;
    let product = any_product(&client).await;
    client.add_to_cart(product.id).await.expect("add");

    let mut conflicts = 0;
    for _round in 0..10 {
        let mut updates = JoinSet::new();
        for quantity in 1..=12 {
            let client = client.clone();
            updates.spawn(async move { client.update_quantity(product.id, quantity).await });
        }

        while let Some(joined) = updates.join_next().await {
            match joined.expect("update task") {
                Ok(_) => {}
                Err(err) => {
                    assert_eq!(err.status(), Some(409), "unexpected failure: {err}");
                    assert_eq!(err.code(), Some("conflict"));
                    conflicts += 1;
                }
            }
        }
        if conflicts > 0 {
            break;
        }
    }
    assert!(conflicts > 0, "no concurrent cart update was rejected");

    // The winner's write is intact: one line with one of the requested quantities.
    let items = client.cart().await.expect("cart");
    assert_eq!(items.len(), 1);
    assert!((1..=12).contains(&items[0].quantity));
}
