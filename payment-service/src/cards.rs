use chrono::Utc;
use shared::validation::{require_card_fields, require_non_blank, validate_card};
use shared::{CheckoutError, Customer, CustomerRepository, Result};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::EncryptionService;

fn customer_not_found(id: Uuid) -> CheckoutError {
    CheckoutError::NotFound(format!("Customer with ID {} not found", id))
}

/// Customers and the card each one keeps on file.
#[derive(Clone)]
pub struct CardService {
    customers: Arc<dyn CustomerRepository>,
    encryption: Arc<EncryptionService>,
}

impl CardService {
    pub fn new(customers: Arc<dyn CustomerRepository>, encryption: Arc<EncryptionService>) -> Self {
        Self {
            customers,
            encryption,
        }
    }

    pub async fn create_customer(&self, name: &str, email: &str) -> Result<Customer> {
        require_non_blank("name", name)?;
        require_non_blank("email", email)?;

        let customer = Customer::new(name.trim().to_string(), email.trim().to_string());
        self.customers.save(&customer).await?;

        info!("Customer {} created", customer.id);
        Ok(customer)
    }

    /// Encrypts and stores the card. Nothing is written unless every check passes.
    pub async fn save_card(
        &self,
        customer_id: Uuid,
        card_number: &str,
        card_type: &str,
    ) -> Result<Customer> {
        require_card_fields(card_number, card_type)?;
        validate_card(card_number, card_type)?;

        let mut customer = self
            .customers
            .find_by_id(customer_id)
            .await?
            .ok_or_else(|| customer_not_found(customer_id))?;

        customer.saved_card = Some(self.encryption.encrypt(card_number));
        customer.updated_at = Utc::now();
        self.customers.update(&customer).await?;

        info!("Card saved for customer {}", customer_id);
        Ok(customer)
    }

    /// The saved card masked down to its last four digits.
    pub async fn card_on_file(&self, customer_id: Uuid) -> Result<Option<String>> {
        let customer = self
            .customers
            .find_by_id(customer_id)
            .await?
            .ok_or_else(|| customer_not_found(customer_id))?;

        let Some(ciphertext) = customer.saved_card else {
            return Ok(None);
        };
        let card_number = self.encryption.decrypt(&ciphertext)?;
        Ok(Some(mask(&card_number)))
    }
}

fn mask(card_number: &str) -> String {
    let visible = card_number.len().saturating_sub(4);
    card_number
        .chars()
        .enumerate()
        .map(|(i, c)| if i < visible { '*' } else { c })
        .collect()
}
