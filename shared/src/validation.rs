//! Input checks shared by direct payment and saved-card storage.

use crate::{CheckoutError, PaymentInfo, Result};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardType {
    Visa,
    Mastercard,
}

impl FromStr for CardType {
    type Err = CheckoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "VISA" => Ok(CardType::Visa),
            "MASTERCARD" => Ok(CardType::Mastercard),
            _ => Err(CheckoutError::Validation(
                "Only VISA and MASTERCARD are allowed".to_string(),
            )),
        }
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

pub fn require_card_fields(card_number: &str, card_type: &str) -> Result<()> {
    if is_blank(card_number) || is_blank(card_type) {
        return Err(CheckoutError::Validation(
            "Card number and type are required".to_string(),
        ));
    }
    Ok(())
}

/// Checks a card number is exactly 16 ASCII digits and the network is allow-listed.
pub fn validate_card(card_number: &str, card_type: &str) -> Result<CardType> {
    if card_number.len() != 16 || !card_number.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CheckoutError::Validation(
            "Card number must be 16 digits".to_string(),
        ));
    }
    card_type.parse()
}

pub fn validate_payment_info(info: &PaymentInfo) -> Result<CardType> {
    require_card_fields(&info.card_number, &info.card_type)?;
    if is_blank(&info.customer_address) {
        return Err(CheckoutError::Validation(
            "Delivery address is required".to_string(),
        ));
    }
    validate_card(&info.card_number, &info.card_type)
}

pub fn require_non_blank(field: &str, value: &str) -> Result<()> {
    if is_blank(value) {
        return Err(CheckoutError::Validation(format!("{} is required", field)));
    }
    Ok(())
}
