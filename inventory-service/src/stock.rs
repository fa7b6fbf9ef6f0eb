use num_traits::Zero;
use shared::validation::require_non_blank;
use shared::{CheckoutError, NewProduct, Product, ProductRepository, Result};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

fn product_not_found(id: Uuid) -> CheckoutError {
    CheckoutError::NotFound(format!("Product with ID {} not found", id))
}

fn insufficient(available: i32, requested: i32) -> CheckoutError {
    CheckoutError::InsufficientStock(format!(
        "Insufficient stock. Available: {}, requested: {}",
        available, requested
    ))
}

/// Catalogue operations and the only stock-debiting path.
#[derive(Clone)]
pub struct StockService {
    products: Arc<dyn ProductRepository>,
}

impl StockService {
    pub fn new(products: Arc<dyn ProductRepository>) -> Self {
        Self { products }
    }

    pub async fn find_product(&self, id: Uuid) -> Result<Product> {
        self.products
            .find_by_id(id)
            .await?
            .ok_or_else(|| product_not_found(id))
    }

    pub async fn list_products(&self) -> Result<Vec<Product>> {
        self.products.list().await
    }

    pub async fn create_product(&self, input: NewProduct) -> Result<Product> {
        require_non_blank("name", &input.name)?;
        require_non_blank("description", &input.description)?;

        let price = input
            .price
            .ok_or_else(|| CheckoutError::Validation("price is required".to_string()))?;
        if price <= bigdecimal::BigDecimal::zero() {
            return Err(CheckoutError::Validation(
                "price must be greater than zero".to_string(),
            ));
        }

        let stock = input
            .stock
            .ok_or_else(|| CheckoutError::Validation("stock is required".to_string()))?;
        if stock < 0 {
            return Err(CheckoutError::Validation(
                "stock cannot be negative".to_string(),
            ));
        }

        let product = Product::new(
            input.name.trim().to_string(),
            input.description.trim().to_string(),
            price,
            stock,
        );
        self.products.save(&product).await?;

        info!("Product {} created with stock {}", product.id, product.stock);
        Ok(product)
    }

    /// Debits `quantity` units, re-reading the product first. The write itself
    /// is conditional, so a concurrent debit that wins the race surfaces here
    /// as insufficient stock rather than a negative count.
    pub async fn decrease_stock(&self, product_id: Uuid, quantity: i32) -> Result<Product> {
        if quantity <= 0 {
            return Err(CheckoutError::Validation(
                "Quantity must be greater than zero".to_string(),
            ));
        }

        let product = self.find_product(product_id).await?;
        if product.stock < quantity {
            return Err(insufficient(product.stock, quantity));
        }

        match self.products.decrement_stock(product_id, quantity).await? {
            Some(updated) => {
                info!(
                    "Stock for product {} decreased by {} to {}",
                    product_id, quantity, updated.stock
                );
                Ok(updated)
            }
            None => {
                let current = self.find_product(product_id).await?;
                warn!(
                    "Stock decrement for product {} lost a race, {} left",
                    product_id, current.stock
                );
                Err(insufficient(current.stock, quantity))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use shared::memory::InMemoryProductRepository;

    fn setup(stock: i32) -> (StockService, Arc<InMemoryProductRepository>, Product) {
        let product = Product::new("Producto".into(), "Demo".into(), BigDecimal::from(10), stock);
        let repo = Arc::new(InMemoryProductRepository::with_products([product.clone()]));
        (StockService::new(repo.clone()), repo, product)
    }

    #[tokio::test]
    async fn test_rejects_non_positive_quantity() {
        let (service, _, product) = setup(10);

        for quantity in [0, -5] {
            let err = service.decrease_stock(product.id, quantity).await.unwrap_err();
            assert_eq!(err.to_string(), "Quantity must be greater than zero");
        }
    }

    #[tokio::test]
    async fn test_unknown_product() {
        let (service, _, _) = setup(10);
        let id = Uuid::new_v4();

        let err = service.decrease_stock(id, 1).await.unwrap_err();
        assert_eq!(err, CheckoutError::NotFound(format!("Product with ID {} not found", id)));
    }

    #[tokio::test]
    async fn test_insufficient_stock_reports_available_and_requested() {
        let (service, repo, product) = setup(2);

        let err = service.decrease_stock(product.id, 5).await.unwrap_err();
        assert_eq!(
            err,
            CheckoutError::InsufficientStock("Insufficient stock. Available: 2, requested: 5".into())
        );
        assert_eq!(repo.stock_of(product.id), Some(2));
    }

    #[tokio::test]
    async fn test_decreases_stock() {
        let (service, repo, product) = setup(10);

        let updated = service.decrease_stock(product.id, 3).await.unwrap();

        assert_eq!(updated.stock, 7);
        assert!(updated.updated_at >= product.updated_at);
        assert_eq!(repo.stock_of(product.id), Some(7));
    }

    #[tokio::test]
    async fn test_create_product_validates_fields() {
        let (service, _, _) = setup(0);

        let missing_name = NewProduct {
            name: " ".into(),
            description: "Desk lamp".into(),
            price: Some(BigDecimal::from(5)),
            stock: Some(1),
        };
        assert_eq!(
            service.create_product(missing_name).await.unwrap_err().to_string(),
            "name is required"
        );

        let free = NewProduct {
            name: "Lamp".into(),
            description: "Desk lamp".into(),
            price: Some(BigDecimal::from(0)),
            stock: Some(1),
        };
        assert!(matches!(
            service.create_product(free).await,
            Err(CheckoutError::Validation(_))
        ));

        let negative = NewProduct {
            name: "Lamp".into(),
            description: "Desk lamp".into(),
            price: Some(BigDecimal::from(5)),
            stock: Some(-1),
        };
        assert!(matches!(
            service.create_product(negative).await,
            Err(CheckoutError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_created_product_is_listed() {
        let (service, _, existing) = setup(3);

        let created = service
            .create_product(NewProduct {
                name: "Lamp".into(),
                description: "Desk lamp".into(),
                price: Some(BigDecimal::from(25)),
                stock: Some(4),
            })
            .await
            .unwrap();

        let ids: Vec<Uuid> = service.list_products().await.unwrap().iter().map(|p| p.id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&existing.id));
        assert!(ids.contains(&created.id));
    }
}
